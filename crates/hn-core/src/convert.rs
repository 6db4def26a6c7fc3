//! Field-level conversion rules.
//!
//! Every raw string taken from a record file passes through [`convert`],
//! which dispatches on the field's declared [`FieldKind`].

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::enums::{AnnotationType, ContentType, UpRel};
use crate::fields::{FieldKind, FieldValue};

/// Host+path prefixes that older archive exports baked into their URLs.
const LEGACY_URL_PREFIXES: [&str; 2] = [
    "https://hypernews.cern.ch/HyperNews/CMS",
    "https://cmshypernews02.cern.ch/HyperNews/CMS",
];

/// Zone abbreviations seen in the archive, in seconds east of UTC.
/// Several of these (CET, CEST, MET, MEST) are unknown to RFC 2822 parsers.
const ZONE_OFFSETS: [(&str, i32); 19] = [
    ("GMT", 0),
    ("UT", 0),
    ("UTC", 0),
    ("Z", 0),
    ("WET", 0),
    ("WEST", 3600),
    ("CET", 3600),
    ("MET", 3600),
    ("CEST", 7200),
    ("MEST", 7200),
    ("EST", -5 * 3600),
    ("EDT", -4 * 3600),
    ("CST", -6 * 3600),
    ("CDT", -5 * 3600),
    ("MST", -7 * 3600),
    ("MDT", -6 * 3600),
    ("PST", -8 * 3600),
    ("PDT", -7 * 3600),
    ("HST", -10 * 3600),
];

/// Why a raw value could not be converted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Token outside an enumeration table
    Unrecognized,
    /// Malformed integer or date
    Invalid,
}

/// Convert a trimmed, non-empty raw value according to `kind`.
pub fn convert(kind: FieldKind, raw: &str) -> Result<FieldValue, Rejection> {
    match kind {
        FieldKind::Int => raw
            .parse::<i64>()
            .map(FieldValue::Int)
            .map_err(|_| Rejection::Invalid),
        FieldKind::Text => Ok(FieldValue::Text(raw.to_string())),
        FieldKind::Date => parse_date(raw)
            .map(FieldValue::Date)
            .ok_or(Rejection::Invalid),
        FieldKind::Url => Ok(FieldValue::Url(convert_url(raw))),
        FieldKind::ContentType => ContentType::from_token(raw)
            .map(FieldValue::ContentType)
            .ok_or(Rejection::Unrecognized),
        FieldKind::AnnotationType => AnnotationType::from_token(raw)
            .map(FieldValue::AnnotationType)
            .ok_or(Rejection::Unrecognized),
        FieldKind::UpRel => UpRel::from_token(raw)
            .map(FieldValue::UpRel)
            .ok_or(Rejection::Unrecognized),
    }
}

/// Strip the legacy host prefixes, each in turn, and make sure the result
/// ends in `.html`.
///
/// Applying it twice gives the same result as applying it once.
pub fn convert_url(raw: &str) -> String {
    let mut url = raw;
    for prefix in LEGACY_URL_PREFIXES {
        // Plain-http spellings of the same hosts are still accepted on input.
        let insecure = prefix.replacen("https://", "http://", 1);
        url = url
            .strip_prefix(prefix)
            .or_else(|| url.strip_prefix(insecure.as_str()))
            .unwrap_or(url);
    }

    if url.ends_with(".html") {
        url.to_string()
    } else {
        format!("{url}.html")
    }
}

/// Parse any of the date spellings found in the archive into a UTC instant.
///
/// Accepted:
/// - `Mon, 05 Dec 2005 01:55:14 GMT` (RFC 2822, any zone from the table)
/// - `Thu Feb 14 22:20:48 CET 2008` (asctime with a zone)
/// - `Thu Feb 14 22:20:48 2008` (asctime, taken as UTC)
/// - RFC 3339 and `2008-02-14 21:20:48` (taken as UTC)
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let normalized = raw
        .split_whitespace()
        .map(zone_to_offset)
        .collect::<Vec<_>>()
        .join(" ");
    let s = normalized.as_str();

    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%a %b %d %H:%M:%S %z %Y") {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Some(dt) = parse_naive(s) {
        return Some(dt);
    }

    // An unknown zone abbreviation is dropped and the wall clock read as UTC.
    let kept: Vec<&str> = s.split(' ').filter(|t| !is_zone_name(t)).collect();
    if kept.len() == s.split(' ').count() {
        return None;
    }
    let stripped = kept.join(" ");
    log::debug!("Ignoring unknown time zone in {raw:?}");
    parse_naive(&stripped)
}

fn parse_naive(s: &str) -> Option<DateTime<Utc>> {
    ["%a %b %d %H:%M:%S %Y", "%Y-%m-%d %H:%M:%S", "%a, %d %b %Y %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// All-caps alphabetic tokens such as `XYZ` or `(AEST)`.
fn is_zone_name(token: &str) -> bool {
    let name = token.trim_matches(|c| c == '(' || c == ')');
    (1..=5).contains(&name.len()) && name.chars().all(|c| c.is_ascii_uppercase())
}

/// Replace a named zone token with its numeric `+HHMM` spelling.
fn zone_to_offset(token: &str) -> String {
    let name = token.trim_matches(|c| c == '(' || c == ')');
    ZONE_OFFSETS
        .iter()
        .find(|(zone, _)| zone.eq_ignore_ascii_case(name))
        .map(|&(_, secs)| {
            let sign = if secs < 0 { '-' } else { '+' };
            let secs = secs.abs();
            format!("{sign}{:02}{:02}", secs / 3600, (secs % 3600) / 60)
        })
        .unwrap_or_else(|| token.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn rfc2822_date() {
        let dt = parse_date("Mon, 05 Dec 2005 01:55:14 GMT").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2005, 12, 5, 1, 55, 14).unwrap());
    }

    #[test]
    fn asctime_with_cet() {
        let dt = parse_date("Thu Feb 14 22:20:48 CET 2008").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2008, 2, 14, 21, 20, 48).unwrap());
    }

    #[test]
    fn equivalent_wall_clocks_agree() {
        let cet = parse_date("Thu Feb 14 22:20:48 CET 2008").unwrap();
        let cest = parse_date("Thu Feb 14 23:20:48 CEST 2008").unwrap();
        let gmt = parse_date("Thu, 14 Feb 2008 21:20:48 GMT").unwrap();
        let rfc_cet = parse_date("Thu, 14 Feb 2008 22:20:48 CET").unwrap();
        assert_eq!(cet, cest);
        assert_eq!(cet, gmt);
        assert_eq!(cet, rfc_cet);
    }

    #[test]
    fn single_digit_day_and_extra_spaces() {
        let dt = parse_date("Mon Feb  4 08:00:00 MET 2008").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2008, 2, 4, 7, 0, 0).unwrap());
    }

    #[test]
    fn zoneless_dates_are_utc() {
        let asctime = parse_date("Thu Feb 14 21:20:48 2008").unwrap();
        let iso = parse_date("2008-02-14 21:20:48").unwrap();
        assert_eq!(asctime, iso);
        assert_eq!(parse_date("2008-02-14T22:20:48+01:00").unwrap(), iso);
    }

    #[test]
    fn garbage_date_is_rejected() {
        assert_eq!(parse_date("yesterday afternoon"), None);
        assert_eq!(convert(FieldKind::Date, "31/12/99"), Err(Rejection::Invalid));
    }

    #[test]
    fn url_prefixes_are_stripped() {
        assert_eq!(
            convert_url("https://hypernews.cern.ch/HyperNews/CMS/get/hnTest/6.html"),
            "/get/hnTest/6.html"
        );
        assert_eq!(
            convert_url("https://cmshypernews02.cern.ch/HyperNews/CMS/get/hnTest/6"),
            "/get/hnTest/6.html"
        );
        assert_eq!(
            convert_url("http://hypernews.cern.ch/HyperNews/CMS/get/hnTest"),
            "/get/hnTest.html"
        );
        assert_eq!(convert_url("/get/hnTest/6/1"), "/get/hnTest/6/1.html");
    }

    #[test]
    fn url_prefixes_are_stripped_in_turn() {
        assert_eq!(
            convert_url(
                "http://hypernews.cern.ch/HyperNews/CMShttps://cmshypernews02.cern.ch/HyperNews/CMS/get/hnTest/6"
            ),
            "/get/hnTest/6.html"
        );
    }

    #[test]
    fn unknown_zone_falls_back_to_utc() {
        let expected = Utc.with_ymd_and_hms(2008, 2, 14, 22, 20, 48).unwrap();
        assert_eq!(parse_date("Thu Feb 14 22:20:48 XYZ 2008"), Some(expected));
        assert_eq!(parse_date("Thu, 14 Feb 2008 22:20:48 (XYZ)"), Some(expected));
        assert_eq!(parse_date("Thu Feb 14 XYZ 2008"), None);
    }

    #[test]
    fn url_conversion_is_idempotent() {
        let once = convert_url("https://hypernews.cern.ch/HyperNews/CMS/get/hnTest/6/1");
        assert_eq!(convert_url(&once), once);
    }

    #[test]
    fn ints_and_enums() {
        assert_eq!(convert(FieldKind::Int, "688"), Ok(FieldValue::Int(688)));
        assert_eq!(convert(FieldKind::Int, "six"), Err(Rejection::Invalid));
        assert_eq!(
            convert(FieldKind::ContentType, "Smart Text"),
            Ok(FieldValue::ContentType(ContentType::SmartText))
        );
        assert_eq!(convert(FieldKind::UpRel, "Bored"), Err(Rejection::Unrecognized));
    }
}
