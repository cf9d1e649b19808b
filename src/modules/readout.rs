use std::sync::Arc;

use serde::Serialize;

use crate::errors::CustomResult;
use crate::modules::export::active_api_key;
use crate::modules::helpers::time::format_delta;
use crate::modules::models::general::HostDb;
use crate::modules::models::result::CategoryResult;
use crate::modules::oplog::OperatorLog;
use crate::modules::robis_api::RobisApi;

/// Punch code reserved for the finish beacon transmitter.
const BEACON_CODE: &str = "M";

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct PunchPayload {
    pub code: String,
    pub control_type: &'static str,
    pub punch_status: String,
    pub split_time: String,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct ResultPayload {
    pub run_time: String,
    pub punch_count: i64,
    pub result_status: String,
    pub punches: Vec<PunchPayload>,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct CompetitorPayload {
    pub competitor_index: String,
    pub si_number: i64,
    pub last_name: String,
    pub first_name: String,
    pub category_name: String,
    pub result: ResultPayload,
}

/// Which competitors one readout publication covers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadoutScope {
    /// The runner owning this SI chip, found via their category's results.
    Single { si: i64 },
    /// Every competitor of every category.
    All,
}

/// Builds the remote representation of one computed result: ordered punches
/// with per-leg split times measured from the start time, then a synthetic
/// finish entry when a finish punch exists.
pub fn competitor_payload(category: &str, result: &CategoryResult) -> CompetitorPayload {
    let mut punches = Vec::new();
    let mut last = result.start;
    for punch in &result.order {
        punches.push(PunchPayload {
            code: punch.code.clone(),
            control_type: if punch.code == BEACON_CODE {
                "BEACON"
            } else {
                "CONTROL"
            },
            punch_status: punch.status.clone(),
            split_time: format_delta((punch.time - last).num_seconds()),
        });
        last = punch.time;
    }
    if let Some(finish) = result.finish {
        punches.push(PunchPayload {
            code: "F".to_string(),
            control_type: "FINISH",
            punch_status: "OK".to_string(),
            split_time: format_delta((finish - last).num_seconds()),
        });
    }

    let (last_name, first_name) = match result.name.split_once(", ") {
        Some((last, first)) => (last.to_string(), first.to_string()),
        None => (result.name.clone(), String::new()),
    };
    CompetitorPayload {
        competitor_index: result.reg.clone(),
        si_number: result.si,
        last_name,
        first_name,
        category_name: category.to_string(),
        result: ResultPayload {
            run_time: format_delta(result.time),
            punch_count: result.tx,
            result_status: result.status.clone(),
            punches,
        },
    }
}

/// Current results of every category, one payload entry per competitor.
/// Also the body of the final-results push.
pub fn full_results(db: &dyn HostDb) -> Vec<CompetitorPayload> {
    let mut payloads = Vec::new();
    for category in db.categories() {
        for result in db.calculate_category(&category.name) {
            payloads.push(competitor_payload(&category.name, &result));
        }
    }
    payloads
}

/// Publishes live results for one SI chip, or for everyone. Batches are
/// dispatched fire-and-forget; each outcome lands in the operator log and
/// is never retried. Must run inside a tokio runtime.
pub fn publish_readout(
    api: &Arc<RobisApi>,
    db: &dyn HostDb,
    scope: ReadoutScope,
    log: &OperatorLog,
) -> CustomResult<()> {
    let api_key = active_api_key(db)?;

    let batches: Vec<Vec<CompetitorPayload>> = match scope {
        ReadoutScope::Single { si } => {
            let Some(runner) = db.runner_by_si(si) else {
                return Ok(());
            };
            let Some(category) = runner.category else {
                return Ok(());
            };
            // recompute only this runner's category, then keep just them;
            // reg is the identity, the chip may have been reassigned
            let batch: Vec<CompetitorPayload> = db
                .calculate_category(&category)
                .iter()
                .filter(|result| result.reg == runner.reg)
                .map(|result| competitor_payload(&category, result))
                .collect();
            vec![batch]
        }
        ReadoutScope::All => db
            .categories()
            .iter()
            .map(|category| {
                db.calculate_category(&category.name)
                    .iter()
                    .map(|result| competitor_payload(&category.name, result))
                    .collect()
            })
            .collect(),
    };

    for batch in batches {
        if batch.is_empty() {
            continue;
        }
        let api = Arc::clone(api);
        let api_key = api_key.clone();
        let log = log.clone();
        tokio::spawn(async move {
            match api.post_live_results(&api_key, &batch).await {
                Ok(reply) if reply.ok() => {
                    log.append(&format!("online results: OK {}", reply.body));
                }
                Ok(reply) => {
                    log.append(&format!(
                        "online results: ERROR {} {}",
                        reply.status, reply.body
                    ));
                }
                Err(err) => log.append(&format!("online results: ERROR {err}")),
            }
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, NaiveDateTime};

    use super::*;
    use crate::errors::Error;
    use crate::modules::models::general::MemoryDb;
    use crate::modules::models::result::PunchRecord;
    use crate::modules::models::runner::Runner;

    fn t0() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 6, 13)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    fn result_with_punches() -> CategoryResult {
        CategoryResult {
            reg: "CZE-1".to_string(),
            si: 50001,
            name: "Novak, Jiri".to_string(),
            start: t0(),
            finish: Some(t0() + Duration::seconds(120)),
            time: 120,
            tx: 2,
            status: "OK".to_string(),
            order: vec![
                PunchRecord {
                    code: "31".to_string(),
                    time: t0() + Duration::seconds(30),
                    status: "OK".to_string(),
                },
                PunchRecord {
                    code: "32".to_string(),
                    time: t0() + Duration::seconds(75),
                    status: "OK".to_string(),
                },
            ],
        }
    }

    #[test]
    fn split_times_are_deltas_between_consecutive_punches() {
        let payload = competitor_payload("M20", &result_with_punches());
        let splits: Vec<(&str, &str)> = payload
            .result
            .punches
            .iter()
            .map(|p| (p.code.as_str(), p.split_time.as_str()))
            .collect();
        assert_eq!(
            splits,
            vec![("31", "0:30"), ("32", "0:45"), ("F", "0:45")]
        );
        assert_eq!(payload.result.punches[2].control_type, "FINISH");
        assert_eq!(payload.result.punches[2].punch_status, "OK");
    }

    #[test]
    fn only_the_reserved_code_is_a_beacon() {
        let mut result = result_with_punches();
        result.order[0].code = "M".to_string();
        let payload = competitor_payload("M20", &result);
        assert_eq!(payload.result.punches[0].control_type, "BEACON");
        assert_eq!(payload.result.punches[1].control_type, "CONTROL");
    }

    #[test]
    fn no_finish_means_no_synthetic_punch() {
        let mut result = result_with_punches();
        result.finish = None;
        let payload = competitor_payload("M20", &result);
        assert_eq!(payload.result.punches.len(), 2);
        assert!(payload.result.punches.iter().all(|p| p.code != "F"));
    }

    #[test]
    fn payload_serializes_with_the_remote_field_names() {
        let payload = competitor_payload("M20", &result_with_punches());
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["competitor_index"], "CZE-1");
        assert_eq!(json["si_number"], 50001);
        assert_eq!(json["last_name"], "Novak");
        assert_eq!(json["first_name"], "Jiri");
        assert_eq!(json["category_name"], "M20");
        assert_eq!(json["result"]["run_time"], "2:00");
        assert_eq!(json["result"]["punch_count"], 2);
        assert_eq!(json["result"]["result_status"], "OK");
        assert_eq!(json["result"]["punches"][0]["split_time"], "0:30");
    }

    #[tokio::test]
    async fn readout_without_an_api_key_is_a_locked_no_op() {
        let api = Arc::new(RobisApi::with_base_url("http://localhost:9").unwrap());
        let db = MemoryDb::default();
        let log = OperatorLog::new();

        let err = publish_readout(&api, &db, ReadoutScope::All, &log).unwrap_err();
        assert!(matches!(err, Error::LockedRace));
        assert!(log.lines().is_empty());
    }

    #[tokio::test]
    async fn unknown_si_chip_publishes_nothing() {
        let api = Arc::new(RobisApi::with_base_url("http://localhost:9").unwrap());
        let mut db = MemoryDb::default();
        db.info.robis_api = Some("key-1".to_string());
        db.add_runner(Runner {
            si: 50001,
            reg: "CZE-1".to_string(),
            category: Some("M20".to_string()),
            ..Runner::default()
        });

        let log = OperatorLog::new();
        assert!(publish_readout(&api, &db, ReadoutScope::Single { si: 1 }, &log).is_ok());
        assert!(log.lines().is_empty());
    }
}
