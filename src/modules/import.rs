use crate::errors::CustomResult;
use crate::modules::helpers::time::parse_start_time;
use crate::modules::models::category::Category;
use crate::modules::models::event::{Band, BasicInfo};
use crate::modules::models::general::{HostDb, ImportPlan};
use crate::modules::models::runner::Runner;
use crate::modules::oplog::OperatorLog;
use crate::modules::robis_api::{RemoteEvent, RemoteRace, RobisApi};

#[derive(Clone, Debug, PartialEq)]
pub struct ImportOutcome {
    pub title: String,
    pub added_categories: Vec<String>,
    pub runner_count: usize,
}

/// Downloads the event and race detail for `api_key` and replaces the local
/// competitor data with it. Nothing is written unless both fetches succeed
/// and every field maps cleanly; the plan then lands in one commit.
pub async fn import(
    api: &RobisApi,
    db: &mut dyn HostDb,
    api_key: &str,
    log: &OperatorLog,
) -> CustomResult<ImportOutcome> {
    log.append("starting import");

    let event = api.fetch_event(api_key).await?;
    let race = api.fetch_race(api_key).await?;

    let plan = build_plan(&event, &race, db.basic_info(), &db.categories(), api_key)?;
    let outcome = ImportOutcome {
        title: plan.info.name.clone(),
        added_categories: plan.new_categories.iter().map(|c| c.name.clone()).collect(),
        runner_count: plan.runners.len(),
    };
    for name in &outcome.added_categories {
        log.append(&format!("adding category {name}"));
    }

    db.apply_import(plan);
    log.append("import finished");
    Ok(outcome)
}

fn build_plan(
    event: &RemoteEvent,
    race: &RemoteRace,
    mut info: BasicInfo,
    existing: &[Category],
    api_key: &str,
) -> CustomResult<ImportPlan> {
    info.name = format!("{} - {}", event.event_name, race.race_name);
    info.date_tzero = parse_start_time(&race.race_start)?;
    info.organizer = event.event_organiser.clone();
    info.limit = race.race_time_limit;
    info.band = Band::from_remote(&race.race_band)?;
    info.robis_api = Some(api_key.to_string());

    // remote categories arrive name-only; ones already present keep their
    // configured controls
    let mut known: Vec<String> = existing.iter().map(|c| c.name.clone()).collect();
    let mut new_categories = Vec::new();
    for category in &race.categories {
        if known.iter().any(|name| name == &category.category_name) {
            continue;
        }
        known.push(category.category_name.clone());
        new_categories.push(Category {
            name: category.category_name.clone(),
            controls: Vec::new(),
        });
    }

    let mut runners = Vec::new();
    for competitor in &race.competitors {
        let category = known
            .iter()
            .find(|name| **name == competitor.competitor_category)
            .cloned();
        runners.push(Runner {
            name: format!("{}, {}", competitor.last_name, competitor.first_name),
            club: competitor.competitor_club.clone(),
            si: competitor.si_number.unwrap_or(0),
            reg: competitor.competitor_index.clone(),
            category,
            call: String::new(),
        });
    }

    Ok(ImportPlan {
        info,
        new_categories,
        runners,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Error;
    use crate::modules::models::general::MemoryDb;
    use crate::modules::robis_api::{RemoteCategory, RemoteCompetitor};

    fn remote_event() -> RemoteEvent {
        RemoteEvent {
            event_name: "MCR ARDF".to_string(),
            event_organiser: "ROB Praha".to_string(),
        }
    }

    fn remote_race() -> RemoteRace {
        RemoteRace {
            race_name: "Stage 1".to_string(),
            race_start: "2026-06-13T10:00:00".to_string(),
            race_time_limit: 120,
            race_band: "M80".to_string(),
            categories: vec![
                RemoteCategory {
                    category_name: "M20".to_string(),
                },
                RemoteCategory {
                    category_name: "W20".to_string(),
                },
            ],
            competitors: vec![
                competitor("Novak", "Jiri", "CZE-1", Some(50001), "M20"),
                competitor("Svoboda", "Petr", "CZE-2", None, "M20"),
                competitor("Horak", "Tomas", "CZE-3", Some(50003), "M21"),
            ],
        }
    }

    fn competitor(
        last: &str,
        first: &str,
        reg: &str,
        si: Option<i64>,
        category: &str,
    ) -> RemoteCompetitor {
        RemoteCompetitor {
            last_name: last.to_string(),
            first_name: first.to_string(),
            competitor_club: "ROB Praha".to_string(),
            si_number: si,
            competitor_index: reg.to_string(),
            competitor_category: category.to_string(),
        }
    }

    #[test]
    fn plan_carries_the_combined_title_and_mapped_metadata() {
        let plan = build_plan(
            &remote_event(),
            &remote_race(),
            BasicInfo::default(),
            &[],
            "key-1",
        )
        .unwrap();
        assert_eq!(plan.info.name, "MCR ARDF - Stage 1");
        assert_eq!(plan.info.organizer, "ROB Praha");
        assert_eq!(plan.info.limit, 120);
        assert_eq!(plan.info.band, Band::M80);
        assert_eq!(plan.info.robis_api.as_deref(), Some("key-1"));
        assert_eq!(plan.info.date_tzero.format("%H:%M").to_string(), "10:00");
    }

    #[test]
    fn unknown_band_aborts_before_any_write() {
        let mut race = remote_race();
        race.race_band = "M160".to_string();

        let mut db = MemoryDb::default();
        for i in 0..5 {
            db.runners.push(Runner {
                reg: format!("OLD-{i}"),
                ..Runner::default()
            });
        }

        let err = build_plan(
            &remote_event(),
            &race,
            db.basic_info(),
            &db.categories(),
            "key-1",
        )
        .unwrap_err();
        assert!(matches!(err, Error::MalformedRemoteData { .. }));
        // nothing applied, all five stay
        assert_eq!(db.runners.len(), 5);
    }

    #[test]
    fn existing_categories_are_not_duplicated() {
        let existing = vec![Category {
            name: "M20".to_string(),
            controls: vec![],
        }];
        let plan = build_plan(
            &remote_event(),
            &remote_race(),
            BasicInfo::default(),
            &existing,
            "key-1",
        )
        .unwrap();
        assert_eq!(
            plan.new_categories.iter().map(|c| &c.name).collect::<Vec<_>>(),
            vec!["W20"]
        );
    }

    #[test]
    fn import_replaces_runners_and_tolerates_unmatched_categories() {
        let mut db = MemoryDb::default();
        for i in 0..5 {
            db.runners.push(Runner {
                reg: format!("OLD-{i}"),
                ..Runner::default()
            });
        }

        let plan = build_plan(
            &remote_event(),
            &remote_race(),
            db.basic_info(),
            &db.categories(),
            "key-1",
        )
        .unwrap();
        db.apply_import(plan);

        assert_eq!(db.runners.len(), 3);
        assert_eq!(db.runners[0].name, "Novak, Jiri");
        assert_eq!(db.runners[0].category.as_deref(), Some("M20"));
        // null si becomes 0
        assert_eq!(db.runners[1].si, 0);
        // "M21" matches no category: runner kept, category left empty
        assert_eq!(db.runners[2].category, None);
    }
}
