//! Timestamp utilities.

use chrono::{DateTime, TimeZone, Utc};

/// Returns the current time in milliseconds since the Unix epoch.
#[must_use]
pub fn epoch_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Converts epoch milliseconds to a UTC timestamp.
///
/// Returns `None` for values outside the representable range.
#[must_use]
pub fn millis_to_datetime(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}
