use serde::Serialize;

use crate::errors::{CustomResult, Error};
use crate::modules::models::category::Category;
use crate::modules::models::control::Control;
use crate::modules::models::general::HostDb;
use crate::modules::models::runner::Runner;
use crate::modules::oplog::OperatorLog;
use crate::modules::readout;
use crate::modules::robis_api::{ApiReply, RobisApi};

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct StartlistEntry {
    pub last_name: String,
    pub first_name: String,
    pub competitor_club: String,
    pub si_number: i64,
    pub competitor_index: String,
    pub competitor_category: Option<String>,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct ControlPointPayload {
    pub si_code: String,
    pub control_type: &'static str,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct CategoryPayload {
    pub category_name: String,
    pub category_control_points: Vec<ControlPointPayload>,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct AliasPayload {
    pub alias_si_code: String,
    pub alias_name: String,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct RaceSetupPayload {
    pub categories: Vec<CategoryPayload>,
    pub aliases: Vec<AliasPayload>,
}

/// The race api key all writes run under. Absent or empty means the race
/// is locked and nothing may go out.
pub(crate) fn active_api_key(db: &dyn HostDb) -> CustomResult<String> {
    match db.basic_info().robis_api {
        Some(key) if !key.is_empty() => Ok(key),
        _ => Err(Error::LockedRace),
    }
}

pub fn startlist_payload(runners: &[Runner]) -> Vec<StartlistEntry> {
    runners
        .iter()
        .map(|runner| StartlistEntry {
            last_name: runner.last_name().to_string(),
            first_name: runner.first_name().to_string(),
            competitor_club: runner.club.clone(),
            si_number: runner.si,
            competitor_index: runner.reg.clone(),
            competitor_category: runner.category.clone(),
        })
        .collect()
}

pub fn race_setup_payload(categories: &[Category], controls: &[Control]) -> RaceSetupPayload {
    let categories = categories
        .iter()
        .map(|category| CategoryPayload {
            category_name: category.name.clone(),
            category_control_points: category
                .controls
                .iter()
                .map(|control| ControlPointPayload {
                    si_code: control.code.clone(),
                    control_type: if control.mandatory { "BEACON" } else { "CONTROL" },
                })
                .collect(),
        })
        .collect();

    // controls sharing a code collapse into one alias, names joined in
    // first-seen order
    let mut aliases: Vec<AliasPayload> = Vec::new();
    for control in controls {
        match aliases.iter_mut().find(|a| a.alias_si_code == control.code) {
            Some(alias) => {
                alias.alias_name.push('/');
                alias.alias_name.push_str(&control.name);
            }
            None => aliases.push(AliasPayload {
                alias_si_code: control.code.clone(),
                alias_name: control.name.clone(),
            }),
        }
    }

    RaceSetupPayload { categories, aliases }
}

/// Logs the raw reply, status and body verbatim, and turns a non-success
/// status into the error the caller surfaces. Failed writes are never
/// retried and never roll anything back.
fn reply_outcome(label: &str, outcome: CustomResult<ApiReply>, log: &OperatorLog) -> Option<Error> {
    match outcome {
        Ok(reply) => {
            log.append(&format!("{label}: {} {}", reply.status, reply.body));
            if reply.ok() {
                None
            } else {
                Some(Error::RemoteWriteFailure {
                    label: label.to_string(),
                    status: reply.status,
                    body: reply.body,
                })
            }
        }
        Err(err) => {
            log.append(&format!("{label}: {err}"));
            Some(err)
        }
    }
}

/// Pushes the startlist and the category/control configuration. The two
/// calls are independent: a failure in one is logged and does not stop
/// the other; the first failure is returned once both have run.
pub async fn push_startlist_and_controls(
    api: &RobisApi,
    db: &dyn HostDb,
    log: &OperatorLog,
) -> CustomResult<()> {
    let api_key = active_api_key(db)?;

    let startlist = startlist_payload(&db.runners());
    let startlist_failure = reply_outcome(
        "startlist",
        api.post_startlist(&api_key, &startlist).await,
        log,
    );

    let setup = race_setup_payload(&db.categories(), &db.controls());
    let controls_failure =
        reply_outcome("controls", api.put_race_setup(&api_key, &setup).await, log);

    match startlist_failure.or(controls_failure) {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Pushes the final results snapshot of every category.
pub async fn push_results(api: &RobisApi, db: &dyn HostDb, log: &OperatorLog) -> CustomResult<()> {
    let api_key = active_api_key(db)?;

    let results = readout::full_results(db);
    match reply_outcome("final results", api.post_results(&api_key, &results).await, log) {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::models::category::CategoryControl;
    use crate::modules::models::general::MemoryDb;

    #[test]
    fn mandatory_controls_export_as_beacons() {
        let categories = vec![Category {
            name: "M20".to_string(),
            controls: vec![
                CategoryControl {
                    code: "31".to_string(),
                    mandatory: true,
                },
                CategoryControl {
                    code: "32".to_string(),
                    mandatory: false,
                },
            ],
        }];
        let payload = race_setup_payload(&categories, &[]);
        assert_eq!(
            payload.categories[0].category_control_points,
            vec![
                ControlPointPayload {
                    si_code: "31".to_string(),
                    control_type: "BEACON"
                },
                ControlPointPayload {
                    si_code: "32".to_string(),
                    control_type: "CONTROL"
                },
            ]
        );
    }

    #[test]
    fn controls_sharing_a_code_merge_into_one_alias() {
        let controls = vec![
            Control {
                code: "31".to_string(),
                name: "Alpha".to_string(),
            },
            Control {
                code: "32".to_string(),
                name: "Gamma".to_string(),
            },
            Control {
                code: "31".to_string(),
                name: "Beta".to_string(),
            },
        ];
        let payload = race_setup_payload(&[], &controls);
        assert_eq!(
            payload.aliases,
            vec![
                AliasPayload {
                    alias_si_code: "31".to_string(),
                    alias_name: "Alpha/Beta".to_string()
                },
                AliasPayload {
                    alias_si_code: "32".to_string(),
                    alias_name: "Gamma".to_string()
                },
            ]
        );
    }

    #[test]
    fn race_setup_serializes_with_the_remote_field_names() {
        let payload = race_setup_payload(
            &[Category {
                name: "M20".to_string(),
                controls: vec![CategoryControl {
                    code: "31".to_string(),
                    mandatory: true,
                }],
            }],
            &[Control {
                code: "31".to_string(),
                name: "Alpha".to_string(),
            }],
        );
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            json["categories"][0]["category_control_points"][0]["si_code"],
            "31"
        );
        assert_eq!(
            json["categories"][0]["category_control_points"][0]["control_type"],
            "BEACON"
        );
        assert_eq!(json["aliases"][0]["alias_si_code"], "31");
        assert_eq!(json["aliases"][0]["alias_name"], "Alpha");
    }

    #[test]
    fn startlist_splits_runner_names() {
        let runners = vec![Runner {
            name: "Novak, Jiri".to_string(),
            club: "ROB Praha".to_string(),
            si: 50001,
            reg: "CZE-1".to_string(),
            category: Some("M20".to_string()),
            call: String::new(),
        }];
        let payload = startlist_payload(&runners);
        assert_eq!(payload[0].last_name, "Novak");
        assert_eq!(payload[0].first_name, "Jiri");
        assert_eq!(payload[0].competitor_index, "CZE-1");
    }

    #[test]
    fn failed_writes_are_logged_verbatim_and_surfaced() {
        let log = OperatorLog::new();
        let failure = reply_outcome(
            "startlist",
            Ok(ApiReply {
                status: 403,
                body: "forbidden".to_string(),
            }),
            &log,
        );
        assert!(matches!(
            failure,
            Some(Error::RemoteWriteFailure { status: 403, .. })
        ));
        assert!(log.lines()[0].ends_with("startlist: 403 forbidden"));

        let success = reply_outcome(
            "controls",
            Ok(ApiReply {
                status: 200,
                body: "ok".to_string(),
            }),
            &log,
        );
        assert!(success.is_none());
        assert!(log.lines()[1].ends_with("controls: 200 ok"));
    }

    #[tokio::test]
    async fn exports_refuse_a_locked_race() {
        let api = RobisApi::with_base_url("http://localhost:9").unwrap();
        let db = MemoryDb::default();
        let log = OperatorLog::new();

        let err = push_startlist_and_controls(&api, &db, &log)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::LockedRace));

        let err = push_results(&api, &db, &log).await.unwrap_err();
        assert!(matches!(err, Error::LockedRace));

        // locked exports never reach the log either
        assert!(log.lines().is_empty());
    }
}
