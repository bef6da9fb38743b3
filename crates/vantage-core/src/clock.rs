//! Epoch-millisecond clock helpers.
//!
//! Session records carry `lastUpdate` as milliseconds since the Unix epoch.
//! The registry clamps refreshes with [`monotonic_refresh`] so a record's
//! timestamp never moves backwards even if the wall clock does.

use chrono::Utc;

/// Current wall-clock time as milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Refresh a stored timestamp without ever decreasing it.
pub fn monotonic_refresh(previous: i64) -> i64 {
    now_millis().max(previous)
}
