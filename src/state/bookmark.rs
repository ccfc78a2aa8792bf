//! Bookmark timestamp helpers

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde_json::Value;

/// Parse a bookmark or replication value into a UTC timestamp
///
/// Accepts RFC 3339 strings, zone-less datetimes and plain dates (read as
/// UTC), and epoch seconds.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_str(s.trim()),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
        _ => None,
    }
}

fn parse_str(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Format a timestamp the way bookmarks are written
pub fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_rfc3339() {
        let dt = parse_timestamp(&json!("2021-03-04T05:06:07Z")).unwrap();
        assert_eq!(format_timestamp(dt), "2021-03-04T05:06:07Z");

        let dt = parse_timestamp(&json!("2021-03-04T07:06:07+02:00")).unwrap();
        assert_eq!(format_timestamp(dt), "2021-03-04T05:06:07Z");
    }

    #[test]
    fn test_parse_without_zone() {
        let dt = parse_timestamp(&json!("2021-12-25")).unwrap();
        assert_eq!(format_timestamp(dt), "2021-12-25T00:00:00Z");

        let dt = parse_timestamp(&json!("2021-03-04T05:06:07")).unwrap();
        assert_eq!(format_timestamp(dt), "2021-03-04T05:06:07Z");
    }

    #[test]
    fn test_parse_epoch() {
        let dt = parse_timestamp(&json!(1_609_459_200)).unwrap();
        assert_eq!(format_timestamp(dt), "2021-01-01T00:00:00Z");
    }

    #[test]
    fn test_parse_invalid() {
        assert!(parse_timestamp(&json!("not a date")).is_none());
        assert!(parse_timestamp(&json!(null)).is_none());
        assert!(parse_timestamp(&json!({"a": 1})).is_none());
    }

    #[test]
    fn test_fractional_seconds_kept() {
        let dt = parse_timestamp(&json!("2021-01-01T00:00:00.250Z")).unwrap();
        assert_eq!(format_timestamp(dt), "2021-01-01T00:00:00.250Z");
    }
}
