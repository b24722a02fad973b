//! ISO-8601 date helpers backing YEAR/MONTH/DAY/DAYNAME/DAYOFWEEK/NOW/DATE_SUB
//!
//! Dates are stored as plain strings. Everything written by the engine uses
//! one fixed-width format, `YYYY-MM-DDTHH:MM:SS.ffffff`, so lexicographic
//! comparison of stored strings matches chronological order.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Weekday};

const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Parse the date shapes clients send: date only, `T` or space separated
/// date-time with optional fraction, or RFC 3339 with an offset.
pub fn parse_iso(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }

    let stripped = value.strip_suffix('Z').unwrap_or(value);
    for fmt in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(stripped, fmt) {
            return Some(dt);
        }
    }

    NaiveDate::parse_from_str(stripped, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Render in the engine's canonical ISO format
pub fn format_iso(dt: &NaiveDateTime) -> String {
    dt.format(ISO_FORMAT).to_string()
}

/// English day name (`Monday` ... `Sunday`)
pub fn day_name(dt: &NaiveDateTime) -> &'static str {
    match dt.weekday() {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Day of week, 1 = Sunday through 7 = Saturday
pub fn day_of_week(dt: &NaiveDateTime) -> i64 {
    dt.weekday().number_from_sunday() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_parse_shapes() {
        let full = parse_iso("2024-03-15T10:30:00.123456").unwrap();
        assert_eq!((full.year(), full.month(), full.day()), (2024, 3, 15));
        assert_eq!(full.hour(), 10);

        assert!(parse_iso("2024-03-15").is_some());
        assert!(parse_iso("2024-03-15 08:00:00").is_some());
        assert!(parse_iso("2024-03-15T08:00:00Z").is_some());
        assert!(parse_iso("2024-03-15T08:00:00+03:00").is_some());
        assert!(parse_iso("not a date").is_none());
        assert!(parse_iso("").is_none());
    }

    #[test]
    fn test_weekday_helpers() {
        // 2024-03-17 was a Sunday
        let sunday = parse_iso("2024-03-17").unwrap();
        assert_eq!(day_name(&sunday), "Sunday");
        assert_eq!(day_of_week(&sunday), 1);

        let saturday = parse_iso("2024-03-16").unwrap();
        assert_eq!(day_of_week(&saturday), 7);
    }

    #[test]
    fn test_format_round_trip() {
        let dt = parse_iso("2024-01-02T03:04:05").unwrap();
        assert_eq!(format_iso(&dt), "2024-01-02T03:04:05.000000");
        assert_eq!(parse_iso(&format_iso(&dt)), Some(dt));
    }
}
