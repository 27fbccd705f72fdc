// Field-level cleaning and canonicalization. Everything here is pure and total:
// bad input maps to a fallback value or `None`, never to an error.

use crate::constants::{AUSTRALIAN_STATES, MAX_FUTURE_YEARS, MAX_TEXT_LENGTH, MIN_DATE_YEAR, STATE_NAMES};
use crate::types::{AbnStatus, EntityType, GstStatus};
use chrono::{Datelike, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static NON_TEXT_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\x20-\x7E\x{A0}-\x{10FFFF}]").unwrap());
static NON_DATE_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\d\-/]").unwrap());

// Slash dates without a leading year are month first.
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// Trim, collapse whitespace runs, drop non-printable characters, cap at 200 chars.
pub fn clean_text(text: &str) -> String {
    let collapsed = WHITESPACE_RUN.replace_all(text.trim(), " ");
    let printable = NON_TEXT_CHARS.replace_all(&collapsed, "");
    printable.chars().take(MAX_TEXT_LENGTH).collect()
}

pub fn normalize_abn_status(status: &str) -> AbnStatus {
    match status.trim().to_uppercase().as_str() {
        "ACTIVE" | "A" => AbnStatus::Active,
        "CANCELLED" | "C" => AbnStatus::Cancelled,
        _ => AbnStatus::Unknown,
    }
}

pub fn normalize_gst_status(status: &str) -> GstStatus {
    match status.trim().to_uppercase().as_str() {
        "ACTIVE" | "Y" | "YES" => GstStatus::Active,
        "INACTIVE" | "N" | "NO" => GstStatus::Inactive,
        _ => GstStatus::Unknown,
    }
}

pub fn normalize_entity_type(code: &str) -> EntityType {
    EntityType::from_code(&code.trim().to_uppercase())
}

/// Parses a registry date into a calendar date.
///
/// Accepts `YYYYMMDD`, `YYYY-MM-DD`, `YYYY/MM/DD` and `MM/DD/YYYY` after stripping
/// everything but digits, hyphens and slashes. Dates before 1900 or more than ten
/// years ahead are treated as absent.
pub fn parse_date(date: &str) -> Option<NaiveDate> {
    let cleaned = NON_DATE_CHARS.replace_all(date, "");
    if cleaned.is_empty() {
        return None;
    }

    let parsed = parse_calendar_date(&cleaned)?;
    let max_year = Utc::now().year() + MAX_FUTURE_YEARS;
    if parsed.year() < MIN_DATE_YEAR || parsed.year() > max_year {
        return None;
    }
    Some(parsed)
}

fn parse_calendar_date(cleaned: &str) -> Option<NaiveDate> {
    if cleaned.len() == 8 && cleaned.bytes().all(|b| b.is_ascii_digit()) {
        let year = cleaned[0..4].parse().ok()?;
        let month = cleaned[4..6].parse().ok()?;
        let day = cleaned[6..8].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(cleaned, fmt).ok())
}

/// Canonical state abbreviation; known full names are mapped, anything else is uppercased.
pub fn normalize_state_code(state: Option<&str>) -> Option<String> {
    let upper = state?.trim().to_uppercase();
    if upper.is_empty() {
        return None;
    }
    if AUSTRALIAN_STATES.contains(&upper.as_str()) {
        return Some(upper);
    }
    let mapped = STATE_NAMES
        .iter()
        .find(|(name, _)| *name == upper)
        .map(|(_, code)| code.to_string());
    Some(mapped.unwrap_or(upper))
}

/// Digits only; three-digit postcodes regain their leading zero.
pub fn normalize_postcode(postcode: Option<&str>) -> Option<String> {
    let digits: String = postcode?.chars().filter(char::is_ascii_digit).collect();
    match digits.len() {
        0 => None,
        3 => Some(format!("0{}", digits)),
        _ => Some(digits),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("  ACME   WIDGETS\t\nPTY  LTD "), "ACME WIDGETS PTY LTD");
        assert_eq!(clean_text("BELL\u{7}S"), "BELLS");
        assert_eq!(clean_text("CAFÉ ÉCLAIR"), "CAFÉ ÉCLAIR");
        assert_eq!(clean_text(""), "");
        assert_eq!(clean_text(&"X".repeat(250)).chars().count(), 200);
    }

    #[test]
    fn test_abn_status() {
        assert_eq!(normalize_abn_status("A"), AbnStatus::Active);
        assert_eq!(normalize_abn_status("active"), AbnStatus::Active);
        assert_eq!(normalize_abn_status("c"), AbnStatus::Cancelled);
        assert_eq!(normalize_abn_status("Cancelled"), AbnStatus::Cancelled);
        assert_eq!(normalize_abn_status("SUS"), AbnStatus::Unknown);
        assert_eq!(normalize_abn_status(""), AbnStatus::Unknown);
    }

    #[test]
    fn test_gst_status() {
        assert_eq!(normalize_gst_status("ACTIVE"), GstStatus::Active);
        assert_eq!(normalize_gst_status("y"), GstStatus::Active);
        assert_eq!(normalize_gst_status("Yes"), GstStatus::Active);
        assert_eq!(normalize_gst_status("INACTIVE"), GstStatus::Inactive);
        assert_eq!(normalize_gst_status("no"), GstStatus::Inactive);
        assert_eq!(normalize_gst_status(""), GstStatus::Unknown);
        assert_eq!(normalize_gst_status("ACT"), GstStatus::Unknown);
    }

    #[test]
    fn test_entity_type() {
        assert_eq!(normalize_entity_type("PRV"), EntityType::PrivateCompany);
        assert_eq!(normalize_entity_type(" trt "), EntityType::Trust);
        assert_eq!(normalize_entity_type("DTT"), EntityType::Other);
        assert_eq!(normalize_entity_type(""), EntityType::Other);
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("20230615"), NaiveDate::from_ymd_opt(2023, 6, 15));
        assert_eq!(parse_date("2023-06-15"), NaiveDate::from_ymd_opt(2023, 6, 15));
        assert_eq!(parse_date("2023/06/15"), NaiveDate::from_ymd_opt(2023, 6, 15));
        assert_eq!(parse_date("06/15/2023"), NaiveDate::from_ymd_opt(2023, 6, 15));
        assert_eq!(parse_date("01/02/2020"), NaiveDate::from_ymd_opt(2020, 1, 2));
        assert_eq!(parse_date("15/06/2023"), None);
        assert_eq!(parse_date("19001301"), None);
        assert_eq!(parse_date("18991231"), None);
        assert_eq!(parse_date("not a date"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn test_parse_date_rejects_far_future() {
        let far = format!("{}0101", Utc::now().year() + 11);
        assert_eq!(parse_date(&far), None);
        let near = format!("{}0101", Utc::now().year() + 1);
        assert!(parse_date(&near).is_some());
    }

    #[test]
    fn test_state_code() {
        assert_eq!(normalize_state_code(Some("nsw")).as_deref(), Some("NSW"));
        assert_eq!(normalize_state_code(Some("New South Wales")).as_deref(), Some("NSW"));
        assert_eq!(normalize_state_code(Some("Northern Territory")).as_deref(), Some("NT"));
        assert_eq!(normalize_state_code(Some("Overseas")).as_deref(), Some("OVERSEAS"));
        assert_eq!(normalize_state_code(Some("")), None);
        assert_eq!(normalize_state_code(None), None);
    }

    #[test]
    fn test_postcode() {
        assert_eq!(normalize_postcode(Some("200")).as_deref(), Some("0200"));
        assert_eq!(normalize_postcode(Some("2000")).as_deref(), Some("2000"));
        assert_eq!(normalize_postcode(Some("abc")), None);
        assert_eq!(normalize_postcode(Some("20001")).as_deref(), Some("20001"));
        assert_eq!(normalize_postcode(Some(" 3 000 ")).as_deref(), Some("3000"));
        assert_eq!(normalize_postcode(None), None);
    }
}
