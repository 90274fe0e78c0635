use std::time::{SystemTime, UNIX_EPOCH};

// Returns 0 on a clock before the epoch instead of failing.
#[inline]
pub fn current_time_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[inline]
pub fn current_time_seconds() -> i64 {
    current_time_millis() / 1000
}

/// Formats epoch milliseconds as an RFC 3339 string in UTC.
pub fn format_millis(millis: i64) -> Option<String> {
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|dt| dt.to_rfc3339_opts(chrono::SecondsFormat::Millis, true))
}

/// Parses an RFC 3339 string into epoch milliseconds.
pub fn parse_millis(text: &str) -> Option<i64> {
    chrono::DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|dt| dt.timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_time() {
        assert!(current_time_millis() > 0);
        assert!(current_time_seconds() > 1_600_000_000);
    }

    #[test]
    fn test_format_and_parse() {
        assert_eq!(format_millis(0).as_deref(), Some("1970-01-01T00:00:00.000Z"));
        assert_eq!(parse_millis("2024-01-15T10:30:00.000Z"), Some(1_705_314_600_000));
        assert_eq!(parse_millis("2024-01-15T12:30:00+02:00"), Some(1_705_314_600_000));
        assert_eq!(parse_millis("not a date"), None);
    }
}
