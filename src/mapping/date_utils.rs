//! Date, time and timestamp parsing from strings.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

use crate::config::DateFormatConfig;

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const TIME_FORMATS: [&str; 2] = ["%H:%M:%S%.f", "%H:%M"];

/// Parse a date string with multiple format attempts
#[must_use]
pub fn parse_date_string(s: &str, config: &DateFormatConfig) -> Option<NaiveDate> {
    let s = s.trim();
    for format in &config.date_formats {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return Some(date);
        }
    }

    if config.enable_format_detection {
        return infer_numeric_date(s);
    }

    None
}

/// Parse a timestamp string
///
/// Accepts ISO-8601 date-times with or without fractional seconds, RFC 3339
/// strings with an offset (normalised to UTC) and plain dates, which become
/// midnight.
#[must_use]
pub fn parse_datetime_string(s: &str, config: &DateFormatConfig) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(with_offset) = DateTime::parse_from_rfc3339(s) {
        return Some(with_offset.naive_utc());
    }
    for format in DATETIME_FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(s, format) {
            return Some(datetime);
        }
    }
    parse_date_string(s, config).and_then(|date| date.and_hms_opt(0, 0, 0))
}

/// Parse a time-of-day string such as `13:45`, `13:45:10` or `13:45:10.250`
#[must_use]
pub fn parse_time_string(s: &str) -> Option<NaiveTime> {
    let s = s.trim();
    TIME_FORMATS
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(s, format).ok())
}

/// Format a date with the configured default format
#[must_use]
pub fn format_date(date: NaiveDate, config: &DateFormatConfig) -> String {
    date.format(&config.default_format).to_string()
}

/// Read an all-numeric date whose layout matches no configured format
///
/// The four-digit component is the year. Year-first dates read as
/// year-month-day; year-last dates read day first, then month first when that
/// is the only valid reading. Eight bare digits read as `YYYYMMDD`.
fn infer_numeric_date(s: &str) -> Option<NaiveDate> {
    let parts: Vec<&str> = if s.len() == 8 && s.bytes().all(|b| b.is_ascii_digit()) {
        vec![&s[..4], &s[4..6], &s[6..]]
    } else {
        s.split(['-', '/', '.', ' ']).collect()
    };
    let [first, second, third] = parts[..] else {
        return None;
    };
    let date = |year: &str, month: &str, day: &str| {
        NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
    };

    match (first.len(), third.len()) {
        (4, _) => date(first, second, third),
        (_, 4) => date(third, second, first).or_else(|| date(third, first, second)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_configured_formats() {
        let config = DateFormatConfig::default();
        assert_eq!(parse_date_string("2023-01-15", &config), Some(ymd(2023, 1, 15)));
        assert_eq!(parse_date_string("15.01.2023", &config), Some(ymd(2023, 1, 15)));
        assert_eq!(parse_date_string("20230115", &config), Some(ymd(2023, 1, 15)));
        assert_eq!(parse_date_string("15 January 2023", &config), Some(ymd(2023, 1, 15)));
        assert_eq!(parse_date_string("not a date", &config), None);
    }

    #[test]
    fn test_detection_when_formats_miss() {
        let config = DateFormatConfig {
            date_formats: Vec::new(),
            ..DateFormatConfig::default()
        };
        assert_eq!(parse_date_string("2023/01/15", &config), Some(ymd(2023, 1, 15)));
        assert_eq!(parse_date_string("2023.1.5", &config), Some(ymd(2023, 1, 5)));
        assert_eq!(parse_date_string("25/12/2020", &config), Some(ymd(2020, 12, 25)));
        assert_eq!(parse_date_string("12/25/2020", &config), Some(ymd(2020, 12, 25)));
        assert_eq!(parse_date_string("04/05/2020", &config), Some(ymd(2020, 5, 4)));
        assert_eq!(parse_date_string("20230115", &config), Some(ymd(2023, 1, 15)));
        assert_eq!(parse_date_string("15/2020", &config), None);
        assert_eq!(parse_date_string("32/13/2020", &config), None);

        let strict = DateFormatConfig {
            date_formats: Vec::new(),
            enable_format_detection: false,
            ..DateFormatConfig::default()
        };
        assert_eq!(parse_date_string("2023/01/15", &strict), None);
    }

    #[test]
    fn test_parse_datetimes() {
        let config = DateFormatConfig::default();
        let expected = ymd(2024, 3, 1).and_hms_milli_opt(12, 30, 5, 250).unwrap();
        assert_eq!(parse_datetime_string("2024-03-01T12:30:05.250", &config), Some(expected));
        assert_eq!(parse_datetime_string("2024-03-01 12:30:05.250", &config), Some(expected));
        assert_eq!(
            parse_datetime_string("2024-03-01T14:30:05.250+02:00", &config),
            Some(expected)
        );
        assert_eq!(
            parse_datetime_string("2024-03-01", &config),
            ymd(2024, 3, 1).and_hms_opt(0, 0, 0)
        );
    }

    #[test]
    fn test_parse_times() {
        assert_eq!(parse_time_string("07:05"), NaiveTime::from_hms_opt(7, 5, 0));
        assert_eq!(parse_time_string("07:05:09.5"), NaiveTime::from_hms_milli_opt(7, 5, 9, 500));
        assert_eq!(parse_time_string("25:00"), None);
    }

    #[test]
    fn test_format_date() {
        let config = DateFormatConfig::default();
        assert_eq!(format_date(ymd(2023, 1, 5), &config), "2023-01-05");
    }
}
