//! Record identifiers and timestamps for the offline queue.

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch.
///
/// All mutation, detection and resolution times in this workspace use this
/// unit so that values coming from the CRUD layer can be compared directly.
pub type TimestampMillis = i64;

/// Generate a fresh identifier for a queued operation or conflict record.
///
/// UUID v4 format, rendered as the hyphenated lowercase string.
pub fn new_record_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Current wall-clock time in epoch milliseconds.
///
/// Returns 0 if the system clock is set before the epoch.
pub fn now_millis() -> TimestampMillis {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
