use serde::{Deserialize, Serialize};

/// One control point in a category's ordered course.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CategoryControl {
    pub code: String,
    /// Mandatory controls are beacons on the remote side.
    pub mandatory: bool,
}

/// Competitor grouping with its ordered set of controls. Names are unique
/// within a race.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    pub controls: Vec<CategoryControl>,
}
