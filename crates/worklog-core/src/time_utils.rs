/// Returns the current Unix timestamp in seconds.
pub fn current_unix_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Renders elapsed seconds as "X hour(s) Y minute(s)".
///
/// Integer division throughout; the remainder below one minute is dropped.
pub fn format_seconds(seconds: i64) -> String {
    let hours = seconds / 3_600;
    let minutes = (seconds % 3_600) / 60;
    format!("{hours} hour(s) {minutes} minute(s)")
}
