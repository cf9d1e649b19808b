use serde::{Deserialize, Serialize};

/// A physical checkpoint. Several controls may share a punch code; exports
/// merge those into one alias record.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Control {
    pub code: String,
    pub name: String,
}
