use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::errors::{CustomResult, Error};

/// Frequency band a race is run on. The remote service sends the band as a
/// string; locally the host keys its band table by position, so the order
/// here is part of the contract.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Band {
    #[default]
    M2,
    M80,
    Combined,
}

impl Band {
    pub fn from_remote(raw: &str) -> CustomResult<Band> {
        match raw {
            "M2" => Ok(Band::M2),
            "M80" => Ok(Band::M80),
            "COMBINED" => Ok(Band::Combined),
            other => Err(Error::MalformedRemoteData {
                detail: format!("unknown band {other:?}"),
            }),
        }
    }

    /// Position in the host's band table.
    pub fn index(self) -> usize {
        match self {
            Band::M2 => 0,
            Band::M80 => 1,
            Band::Combined => 2,
        }
    }
}

/// Top-level race metadata as the host stores it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BasicInfo {
    pub name: String,
    pub date_tzero: NaiveDateTime,
    pub organizer: String,
    pub limit: i64,
    pub band: Band,
    /// Api key of the race currently open for synchronization. `None` (or
    /// empty) means every write path is locked.
    pub robis_api: Option<String>,
}
