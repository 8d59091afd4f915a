//! Common utility functions

use chrono::{TimeZone, Utc};
use uuid::Uuid;

use crate::types::UtcDateTime;

const BASE36_ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Encode an unsigned integer in lowercase base 36
pub fn to_base36(mut value: u128) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(BASE36_ALPHABET[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8(digits).unwrap_or_default()
}

/// Generate a prefixed, time-ordered identifier: `{prefix}-{base36 millis}-{random}`
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use folio_core::generate_id;
///
/// let id = generate_id("s", Utc::now());
/// assert!(id.starts_with("s-"));
/// assert_eq!(id.split('-').count(), 3);
/// ```
pub fn generate_id(prefix: &str, now: UtcDateTime) -> String {
    let timestamp = to_base36(now.timestamp_millis().max(0) as u128);
    let random: String = to_base36(Uuid::new_v4().as_u128()).chars().take(13).collect();
    format!("{}-{}-{}", prefix, timestamp, random)
}

/// Milliseconds since the Unix epoch
pub fn epoch_millis(dt: UtcDateTime) -> i64 {
    dt.timestamp_millis()
}

/// Inverse of [`epoch_millis`]
pub fn from_epoch_millis(millis: i64) -> Option<UtcDateTime> {
    Utc.timestamp_millis_opt(millis).single()
}

/// Whole milliseconds elapsed between two instants, saturating at zero
pub fn elapsed_millis(from: UtcDateTime, to: UtcDateTime) -> u64 {
    (to - from).num_milliseconds().max(0) as u64
}

/// Human readable session duration (`1h 5m`, `3m 12s`, `42s`)
pub fn format_duration(ms: u64) -> String {
    let seconds = ms / 1000;
    let minutes = seconds / 60;
    let hours = minutes / 60;

    if hours > 0 {
        format!("{}h {}m", hours, minutes % 60)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds % 60)
    } else {
        format!("{}s", seconds)
    }
}

/// Human readable time on page (`2m 5s`, `9s`)
pub fn format_time_on_page(ms: u64) -> String {
    let seconds = ms / 1000;
    let minutes = seconds / 60;

    if minutes > 0 {
        format!("{}m {}s", minutes, seconds % 60)
    } else {
        format!("{}s", seconds)
    }
}

/// Hostname without a leading `www.`
pub fn strip_www(hostname: &str) -> &str {
    hostname.strip_prefix("www.").unwrap_or(hostname)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(to_base36(1_700_000_000_000), "loyw3v28");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(42_000), "42s");
        assert_eq!(format_duration(192_000), "3m 12s");
        assert_eq!(format_duration(3_900_000), "1h 5m");
    }

    #[test]
    fn test_format_time_on_page() {
        assert_eq!(format_time_on_page(9_400), "9s");
        assert_eq!(format_time_on_page(125_000), "2m 5s");
    }

    #[test]
    fn test_strip_www() {
        assert_eq!(strip_www("www.example.com"), "example.com");
        assert_eq!(strip_www("blog.example.com"), "blog.example.com");
    }
}
