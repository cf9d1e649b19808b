use std::collections::HashMap;

use crate::modules::models::category::Category;
use crate::modules::models::control::Control;
use crate::modules::models::event::BasicInfo;
use crate::modules::models::result::CategoryResult;
use crate::modules::models::runner::Runner;

/// Everything one import produces, staged before anything touches the host.
#[derive(Clone, Debug, PartialEq)]
pub struct ImportPlan {
    pub info: BasicInfo,
    pub new_categories: Vec<Category>,
    /// Full replacement set; existing runners are cleared first.
    pub runners: Vec<Runner>,
}

/// The host application's data store. The host owns the canonical data and
/// the results engine; this crate reads slices of it and commits import
/// plans through it.
pub trait HostDb {
    fn basic_info(&self) -> BasicInfo;
    fn set_basic_info(&mut self, info: BasicInfo);

    fn categories(&self) -> Vec<Category>;
    fn add_category(&mut self, category: Category);

    fn runners(&self) -> Vec<Runner>;
    fn clear_runners(&mut self);
    fn add_runner(&mut self, runner: Runner);

    fn controls(&self) -> Vec<Control>;

    /// Recompute and return the results of one category.
    fn calculate_category(&self, category: &str) -> Vec<CategoryResult>;

    fn runner_by_si(&self, si: i64) -> Option<Runner> {
        self.runners().into_iter().find(|r| r.si == si)
    }

    /// Commits a finished import as one visible change. Transactional hosts
    /// should override this and wrap it in a single transaction.
    fn apply_import(&mut self, plan: ImportPlan) {
        self.set_basic_info(plan.info);
        for category in plan.new_categories {
            self.add_category(category);
        }
        self.clear_runners();
        for runner in plan.runners {
            self.add_runner(runner);
        }
    }
}

/// In-memory store, used by tests and as a reference implementation for
/// host integration.
#[derive(Clone, Debug, Default)]
pub struct MemoryDb {
    pub info: BasicInfo,
    pub categories: Vec<Category>,
    pub runners: Vec<Runner>,
    pub controls: Vec<Control>,
    /// Canned results per category name, standing in for the host's results
    /// engine.
    pub results: HashMap<String, Vec<CategoryResult>>,
}

impl HostDb for MemoryDb {
    fn basic_info(&self) -> BasicInfo {
        self.info.clone()
    }

    fn set_basic_info(&mut self, info: BasicInfo) {
        self.info = info;
    }

    fn categories(&self) -> Vec<Category> {
        self.categories.clone()
    }

    fn add_category(&mut self, category: Category) {
        self.categories.push(category);
    }

    fn runners(&self) -> Vec<Runner> {
        self.runners.clone()
    }

    fn clear_runners(&mut self) {
        self.runners.clear();
    }

    fn add_runner(&mut self, runner: Runner) {
        self.runners.push(runner);
    }

    fn controls(&self) -> Vec<Control> {
        self.controls.clone()
    }

    fn calculate_category(&self, category: &str) -> Vec<CategoryResult> {
        self.results.get(category).cloned().unwrap_or_default()
    }
}
