use chrono::NaiveDateTime;

/// One recorded punch: control code, timestamp and validity status as the
/// host's results engine evaluated it.
#[derive(Clone, Debug, PartialEq)]
pub struct PunchRecord {
    pub code: String,
    pub time: NaiveDateTime,
    pub status: String,
}

/// A competitor's computed result within one category. Produced by the
/// host's results engine; this crate only serializes snapshots of it.
#[derive(Clone, Debug, PartialEq)]
pub struct CategoryResult {
    pub reg: String,
    pub si: i64,
    /// "Last, First"
    pub name: String,
    pub start: NaiveDateTime,
    pub finish: Option<NaiveDateTime>,
    /// Total run time in seconds.
    pub time: i64,
    /// Number of scored punches.
    pub tx: i64,
    pub status: String,
    /// Punches in punching order.
    pub order: Vec<PunchRecord>,
}
