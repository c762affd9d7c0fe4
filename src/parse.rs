//! Parsing of human-readable configuration values

use std::time::Duration;

/// Parse a duration such as `"8h"`, `"30m"`, `"45s"` or `"100ms"`.
///
/// A bare number is read as seconds. Returns `None` for anything else,
/// including zero-length input and overflowing values.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim().to_lowercase();
    let (num_str, millis_per_unit): (&str, u64) = if let Some(n) = s.strip_suffix("ms") {
        (n, 1)
    } else if let Some(n) = s.strip_suffix('s') {
        (n, 1000)
    } else if let Some(n) = s.strip_suffix('m') {
        (n, 60 * 1000)
    } else if let Some(n) = s.strip_suffix('h') {
        (n, 60 * 60 * 1000)
    } else {
        (s.as_str(), 1000)
    };

    let n = num_str.trim().parse::<u64>().ok()?;
    n.checked_mul(millis_per_unit).map(Duration::from_millis)
}
