//! Timestamp parsing and calendar-date helpers.
//!
//! All calendar arithmetic happens in UTC: a timestamp belongs to the UTC date
//! it falls on, and "today" is the current UTC date.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, TimeZone, Utc};

const NAIVE_DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
];

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%d/%m/%Y"];

/// Parses the timestamp shapes the source system is known to emit.
///
/// Accepts RFC 3339 (any offset), naive ISO date-times (taken as UTC),
/// `YYYY-MM-DD` and `DD/MM/YYYY` (midnight UTC).
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return Some(Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)));
        }
    }

    None
}

/// Canonical storage form: RFC 3339, UTC, millisecond precision, `Z` suffix.
///
/// Every stored timestamp uses this shape, so string ordering matches time ordering.
pub fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Calendar date (UTC) a timestamp falls on.
pub fn to_calendar_date(value: &DateTime<Utc>) -> NaiveDate {
    value.date_naive()
}

pub fn today_utc() -> NaiveDate {
    Utc::now().date_naive()
}
