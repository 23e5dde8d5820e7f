//! Timestamp utilities

use chrono::{DateTime, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Convert seconds to duration
pub fn secs_to_duration(secs: u64) -> std::time::Duration {
    std::time::Duration::from_secs(secs)
}

/// Hour bucket key used for hourly breakdowns (`2024-05-01 13:00`)
pub fn hour_bucket(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:00").to_string()
}

/// Compact stamp used in report file names (`20240501_134502`)
pub fn file_stamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%Y%m%d_%H%M%S").to_string()
}

/// Elapsed wall-clock hours between two timestamps (negative spans clamp to zero)
pub fn hours_between(first: &DateTime<Utc>, last: &DateTime<Utc>) -> f64 {
    let millis = last.signed_duration_since(*first).num_milliseconds().max(0);
    millis as f64 / 3_600_000.0
}
