//! Wall-clock helpers.

/// Milliseconds since the Unix epoch, `0` if the clock is before the epoch.
pub fn current_time_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
