use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::errors::{CustomResult, Error};

/// Formats an elapsed time the way the remote service displays splits:
/// `M:SS`, with an hour field only when needed.
pub fn format_delta(total_seconds: i64) -> String {
    let secs = total_seconds.max(0);
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}

/// Parses the ISO-ish start times the service emits. Seen in the wild with
/// and without a time component and with an optional offset.
pub fn parse_start_time(raw: &str) -> CustomResult<NaiveDateTime> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.naive_local());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(dt);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::MIN));
    }
    Err(Error::MalformedRemoteData {
        detail: format!("unparseable start time {raw:?}"),
    })
}
