use std::time::{SystemTime, UNIX_EPOCH};

/// Current time as integer UTC seconds since the Unix epoch.
///
/// A clock set before the epoch reads as `0`.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
