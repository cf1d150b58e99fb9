use chrono::{DateTime, Utc};

/// Format an epoch as a UTC `YYYYMMDD` integer-like string.
pub fn utc_day(epoch: i64) -> String {
    match DateTime::<Utc>::from_timestamp(epoch, 0) {
        Some(dt) => dt.format("%Y%m%d").to_string(),
        // Out-of-range epochs can never equal a real day.
        None => String::from("00000000"),
    }
}

/// Calendar-day equality in UTC. Deliberately a day-string comparison, not
/// elapsed-seconds arithmetic: sensitive to the midnight boundary, not to a
/// rolling 24h window.
pub fn same_utc_day(a: i64, b: i64) -> bool {
    utc_day(a) == utc_day(b)
}
