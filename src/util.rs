// Utility helpers for cell parsing and console formatting.
//
// Spreadsheet exports are messy: dates arrive in several layouts, names carry
// stray whitespace and empty cells show up as blank strings. Everything that
// deals with that lives here so the pipeline only sees typed values.
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use num_format::{Locale, ToFormattedString};
use std::borrow::Cow;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y"];

/// Decode a raw cell as UTF-8, falling back to Latin-1 for exports saved
/// with a Windows code page (`instala\xe7\xe3o`).
pub fn decode_cell(raw: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(raw) {
        Ok(s) => Cow::Borrowed(s),
        Err(_) => Cow::Owned(raw.iter().map(|&b| char::from(b)).collect()),
    }
}

/// Trim a cell and turn blank content into `None`.
pub fn non_blank(s: Option<&str>) -> Option<String> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    Some(s.to_string())
}

/// Parse a date cell, with or without a time part.
///
/// - Accepts ISO (`2024-01-05`, `2024-01-05 08:30:00`, `2024-01-05T08:30:00`)
///   and day-first (`05/01/2024`, `05/01/2024 08:30`) layouts.
/// - A date without a time is placed at midnight.
/// - Anything else yields `None`, which the pipeline treats as an unknown date.
pub fn parse_datetime_safe(s: Option<&str>) -> Option<NaiveDateTime> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d.and_time(NaiveTime::MIN));
        }
    }
    None
}

/// Whole days from `earlier` to `later`, truncated.
pub fn days_between(earlier: NaiveDateTime, later: NaiveDateTime) -> i64 {
    (later - earlier).num_days()
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    // Counts in console messages (e.g. `9,855 records`).
    n.to_formatted_string(&Locale::en)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_supported_date_layouts() {
        assert_eq!(
            parse_datetime_safe(Some("2024-01-05")),
            Some(ymd(2024, 1, 5).and_time(NaiveTime::MIN))
        );
        assert_eq!(
            parse_datetime_safe(Some(" 2024-01-05 08:30:15 ")),
            ymd(2024, 1, 5).and_hms_opt(8, 30, 15)
        );
        assert_eq!(
            parse_datetime_safe(Some("2024-01-05T08:30:15.250")),
            ymd(2024, 1, 5).and_hms_milli_opt(8, 30, 15, 250)
        );
        assert_eq!(
            parse_datetime_safe(Some("05/01/2024 08:30")),
            ymd(2024, 1, 5).and_hms_opt(8, 30, 0)
        );
        assert_eq!(
            parse_datetime_safe(Some("05/01/2024")),
            Some(ymd(2024, 1, 5).and_time(NaiveTime::MIN))
        );
    }

    #[test]
    fn malformed_dates_become_unknown() {
        assert_eq!(parse_datetime_safe(Some("")), None);
        assert_eq!(parse_datetime_safe(Some("amanhã")), None);
        assert_eq!(parse_datetime_safe(Some("2024-13-01")), None);
        assert_eq!(parse_datetime_safe(None), None);
    }

    #[test]
    fn cells_decode_as_utf8_or_latin1() {
        assert!(matches!(decode_cell("instalação".as_bytes()), Cow::Borrowed("instalação")));
        assert_eq!(decode_cell(b"instala\xe7\xe3o"), "instalação");
        assert_eq!(decode_cell(b"Jos\xe9"), "José");
        assert_eq!(decode_cell(b""), "");
    }

    #[test]
    fn blank_cells_are_none() {
        assert_eq!(non_blank(Some("  ")), None);
        assert_eq!(non_blank(None), None);
        assert_eq!(non_blank(Some(" ana ")), Some("ana".to_string()));
    }

    #[test]
    fn day_spread_truncates() {
        let start = ymd(2024, 1, 1).and_hms_opt(10, 0, 0).unwrap();
        let later = ymd(2024, 1, 31).and_hms_opt(15, 0, 0).unwrap();
        assert_eq!(days_between(start, later), 30);
        assert_eq!(format_int(1234567u64), "1,234,567");
    }
}
