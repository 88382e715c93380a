//! Parsing helpers for human-readable configuration values

use std::time::Duration;

/// Split a trimmed, lowercased value into its numeric part and unit suffix.
fn split_unit(s: &str) -> (String, String) {
    let s = s.trim().to_lowercase();
    let idx = s
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(s.len());
    let (num, unit) = s.split_at(idx);
    (num.to_string(), unit.trim().to_string())
}

/// Parse a size string such as `"16KB"`, `"1MB"` or `"512"` into bytes.
///
/// Returns `None` when the number or the unit is not recognised.
pub fn parse_size(s: &str) -> Option<usize> {
    let (num, unit) = split_unit(s);
    let multiplier = match unit.as_str() {
        "" | "b" => 1,
        "kb" => 1024,
        "mb" => 1024 * 1024,
        "gb" => 1024 * 1024 * 1024,
        _ => return None,
    };
    num.parse::<usize>().ok()?.checked_mul(multiplier)
}

/// Parse a duration string such as `"600s"`, `"10m"`, `"1h"` or `"250ms"`.
///
/// A bare number is read as seconds. Returns `None` on anything else.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let (num, unit) = split_unit(s);
    let n = num.parse::<u64>().ok()?;
    match unit.as_str() {
        "ms" => Some(Duration::from_millis(n)),
        "" | "s" => Some(Duration::from_secs(n)),
        "m" => n.checked_mul(60).map(Duration::from_secs),
        "h" => n.checked_mul(60 * 60).map(Duration::from_secs),
        _ => None,
    }
}
