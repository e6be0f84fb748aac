//! Refresh interval parsing and formatting
//!
//! Accepts plain seconds (`"600"`) or a number with a unit
//! (`"10m"`, `"2 hours"`, `"45 sec"`).

use crate::error::{RemoteInfoError, Result};

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;

/// Parse a human interval into seconds. Zero and overflow are rejected.
pub fn parse_interval(text: &str) -> Result<u64> {
    let trimmed = text.trim();
    let invalid = || RemoteInfoError::InvalidInterval(text.to_string());

    let digits_end = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    if digits_end == 0 {
        return Err(invalid());
    }

    let value: u64 = trimmed[..digits_end].parse().map_err(|_| invalid())?;
    let unit = trimmed[digits_end..].trim().to_ascii_lowercase();

    let multiplier = match unit.as_str() {
        "" | "s" | "sec" | "secs" | "second" | "seconds" => 1,
        "m" | "min" | "mins" | "minute" | "minutes" => MINUTE,
        "h" | "hr" | "hrs" | "hour" | "hours" => HOUR,
        _ => return Err(invalid()),
    };

    let seconds = value.checked_mul(multiplier).ok_or_else(invalid)?;
    validate_interval(seconds)
}

/// Reject a zero interval, or one too large to persist
pub fn validate_interval(seconds: u64) -> Result<u64> {
    if seconds == 0 {
        return Err(RemoteInfoError::InvalidInterval(
            "interval must be greater than zero".to_string(),
        ));
    }
    if seconds > i64::MAX as u64 {
        return Err(RemoteInfoError::InvalidInterval(format!(
            "interval {} is too large",
            seconds
        )));
    }
    Ok(seconds)
}

/// Format seconds for listings: the largest unit that divides evenly
pub fn format_interval(seconds: u64) -> String {
    let (value, unit) = if seconds >= HOUR && seconds % HOUR == 0 {
        (seconds / HOUR, "hour")
    } else if seconds >= MINUTE && seconds % MINUTE == 0 {
        (seconds / MINUTE, "minute")
    } else {
        (seconds, "second")
    };

    if value == 1 {
        format!("1 {}", unit)
    } else {
        format!("{} {}s", value, unit)
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_parse_seconds() {
        assert_eq!(parse_interval("600").unwrap(), 600);
        assert_eq!(parse_interval(" 45s ").unwrap(), 45);
        assert_eq!(parse_interval("30 seconds").unwrap(), 30);
    }

    #[test]
    fn test_parse_units() {
        assert_eq!(parse_interval("10m").unwrap(), 600);
        assert_eq!(parse_interval("1 minute").unwrap(), 60);
        assert_eq!(parse_interval("2h").unwrap(), 7200);
        assert_eq!(parse_interval("3 Hours").unwrap(), 10800);
    }

    #[test]
    fn test_parse_rejects() {
        for bad in ["", "0", "0m", "m", "-5", "10 days", "1.5h", "abc"] {
            assert!(
                matches!(parse_interval(bad), Err(RemoteInfoError::InvalidInterval(_))),
                "expected InvalidInterval for {:?}",
                bad
            );
        }
        assert!(parse_interval("18446744073709551615h").is_err());
    }

    #[test]
    fn test_format() {
        assert_eq!(format_interval(600), "10 minutes");
        assert_eq!(format_interval(60), "1 minute");
        assert_eq!(format_interval(7200), "2 hours");
        assert_eq!(format_interval(90), "90 seconds");
        assert_eq!(format_interval(1), "1 second");
    }
}
