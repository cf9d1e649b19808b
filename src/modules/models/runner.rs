use serde::{Deserialize, Serialize};

/// A competitor as the host stores it. Identity for reconciliation is the
/// registration index `reg`; `si` chips get reassigned at check-in.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Runner {
    /// "Last, First"
    pub name: String,
    pub club: String,
    pub si: i64,
    pub reg: String,
    /// Name of the assigned category, if any.
    pub category: Option<String>,
    pub call: String,
}

impl Runner {
    pub fn last_name(&self) -> &str {
        self.name.split(", ").next().unwrap_or(&self.name)
    }

    pub fn first_name(&self) -> &str {
        self.name.split(", ").nth(1).unwrap_or("")
    }
}
