use std::sync::Arc;
use std::time::Duration;
use log::{info, warn};
use tokio_cron_scheduler::{Job, JobScheduler};
use crate::errors::{CustomResult, Error};

use crate::modules::robis_api::RobisApi;

/// Polls the ochecklist endpoint as a background consistency check. The
/// response body is not consumed yet; only reachability matters. Shut the
/// returned scheduler down to stop polling.
pub async fn register_ochecklist_job(
    api: Arc<RobisApi>,
    api_key: String,
) -> CustomResult<JobScheduler> {
    let scheduler = JobScheduler::new().await.map_err(|e| Error::Scheduler {
        message: e.to_string(),
    })?;

    // run every minute
    let job = Job::new_repeated_async(Duration::from_secs(60), move |_uuid, _l| {
        let api = Arc::clone(&api);
        let api_key = api_key.clone();
        Box::pin(async move {
            match api.fetch_ochecklist(&api_key).await {
                Ok(reply) if reply.ok() => {
                    info!(target: "ochecklist", "poll ok");
                }
                Ok(reply) => {
                    warn!(target: "ochecklist", "poll returned {}", reply.status);
                }
                Err(err) => {
                    warn!(target: "ochecklist", "poll failed: {}", err);
                }
            }
        })
    })
    .map_err(|e| Error::Scheduler {
        message: e.to_string(),
    })?;

    scheduler.add(job).await.map_err(|e| Error::Scheduler {
        message: e.to_string(),
    })?;
    scheduler.start().await.map_err(|e| Error::Scheduler {
        message: e.to_string(),
    })?;

    Ok(scheduler)
}
