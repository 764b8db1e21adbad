//! Custom field rules used by request validation.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use validator::ValidationError;

/// Letters only, in any script.
pub fn letters_only(value: &str) -> Result<(), ValidationError> {
    if value.chars().all(char::is_alphabetic) {
        Ok(())
    } else {
        Err(ValidationError::new("letters_only"))
    }
}

/// A `.jpg` or `.png` file name. The empty string means "no image".
pub fn image_file(value: &str) -> Result<(), ValidationError> {
    let lower = value.to_lowercase();
    if value.is_empty() || lower.ends_with(".jpg") || lower.ends_with(".png") {
        Ok(())
    } else {
        Err(ValidationError::new("image_extension"))
    }
}

pub fn iso_date(value: &str) -> Result<(), ValidationError> {
    match parse_iso_date(value) {
        Some(_) => Ok(()),
        None => Err(ValidationError::new("iso_date")),
    }
}

/// Parse an ISO 8601 calendar date or date-time.
/// Date-times without an offset are taken as UTC.
pub fn parse_iso_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt.and_utc());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M") {
        return Some(dt.and_utc());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Normalise a date to RFC 3339 UTC with second precision, e.g.
/// `2020-09-10T00:00:00Z`. Normalised dates sort correctly as text.
pub fn normalize_date(value: &str) -> Option<String> {
    parse_iso_date(value).map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
}
