//! Cell-level transforms shared by the vendor formats.

use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Deserializer};

/// Vendor timestamps are always `YYYY/MM/DD HH:MM:SS`, interpreted as UTC.
pub const VENDOR_DATETIME_FORMAT: &str = "%Y/%m/%d %H:%M:%S";
/// Date-only cells (eligibility windows) drop the time part.
pub const VENDOR_DATE_FORMAT: &str = "%Y/%m/%d";

/// Reason a single record could not be encoded. Always record-scoped; the
/// caller excludes the record and keeps going.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    #[error("phone number '{0}' is not in international format")]
    Phone(String),
    #[error("no ISO alpha-3 mapping for country '{0}'")]
    Country(String),
    #[error("{field} contains a tab or line break")]
    Control { field: &'static str },
}

pub fn format_datetime(value: DateTime<Utc>) -> String {
    value.format(VENDOR_DATETIME_FORMAT).to_string()
}

pub fn format_date(value: NaiveDate) -> String {
    value.format(VENDOR_DATE_FORMAT).to_string()
}

pub fn parse_datetime(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    NaiveDateTime::parse_from_str(value.trim(), VENDOR_DATETIME_FORMAT)
        .map(|naive| naive.and_utc())
}

/// The national number and calling code of an international-format phone
/// number, split for the vendor's Phone / PhoneCountryCode columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhoneParts {
    pub country_code: String,
    pub number: String,
}

fn phone_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\+(?P<code>\d{1,3}) (?P<number>.+)$").expect("static phone pattern")
    })
}

/// Split `+<calling code> <national number>`; the national part keeps digits
/// only. Anything else is an encode-time failure for the record.
pub fn split_phone(raw: &str) -> Result<PhoneParts, FieldError> {
    let captures = phone_pattern()
        .captures(raw.trim())
        .ok_or_else(|| FieldError::Phone(raw.to_string()))?;
    let number: String = captures["number"]
        .chars()
        .filter(char::is_ascii_digit)
        .collect();
    if number.is_empty() {
        return Err(FieldError::Phone(raw.to_string()));
    }
    Ok(PhoneParts {
        country_code: captures["code"].to_string(),
        number,
    })
}

/// The vendor wants ISO 3166-1 alpha-3; profiles store alpha-2.
pub fn country_alpha3(alpha2: &str) -> Result<String, FieldError> {
    rust_iso3166::from_alpha2(alpha2.trim().to_ascii_uppercase().as_str())
        .map(|country| country.alpha3.to_string())
        .ok_or_else(|| FieldError::Country(alpha2.to_string()))
}

/// `US-MA` style subdivision codes lose their country prefix on the wire.
pub fn state_code(value: &str) -> String {
    value
        .split_once('-')
        .map(|(_, state)| state)
        .unwrap_or(value)
        .to_string()
}

/// Free-text cells must not smuggle a delimiter past the unquoted dialect.
pub fn flat(field: &'static str, value: &str) -> Result<String, FieldError> {
    if value.contains(['\t', '\r', '\n']) {
        return Err(FieldError::Control { field });
    }
    Ok(value.to_string())
}

pub fn flat_opt(
    field: &'static str,
    value: Option<&str>,
) -> Result<Option<String>, FieldError> {
    value.map(|value| flat(field, value)).transpose()
}

pub(crate) fn vendor_datetime_de<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    parse_datetime(&value).map_err(serde::de::Error::custom)
}

pub(crate) fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|value| !value.trim().is_empty()))
}

pub(crate) fn empty_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<f64>()
        .map(Some)
        .map_err(serde::de::Error::custom)
}

pub(crate) fn empty_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<i64>()
        .map(Some)
        .map_err(serde::de::Error::custom)
}

pub(crate) fn empty_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<u32>()
        .map(Some)
        .map_err(serde::de::Error::custom)
}

pub(crate) fn vendor_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "y" | "yes" | "true" => Ok(true),
        "" | "0" | "n" | "no" | "false" => Ok(false),
        other => Err(serde::de::Error::custom(format!(
            "unrecognized boolean cell '{other}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn split_phone_keeps_digits_only() {
        let parts = split_phone("+1 617 293-3423").expect("valid phone");
        assert_eq!(parts.country_code, "1");
        assert_eq!(parts.number, "6172933423");
    }

    #[test]
    fn split_phone_accepts_long_calling_codes() {
        let parts = split_phone("+358 40 1234567").expect("valid phone");
        assert_eq!(parts.country_code, "358");
        assert_eq!(parts.number, "401234567");
    }

    #[test]
    fn split_phone_rejects_national_format() {
        assert_eq!(
            split_phone("617-293-3423"),
            Err(FieldError::Phone("617-293-3423".to_string()))
        );
        assert!(split_phone("+1617 293 3423").is_err());
        assert!(split_phone("+1 ---").is_err());
    }

    #[test]
    fn country_alpha3_converts_known_codes() {
        assert_eq!(country_alpha3("US").expect("known country"), "USA");
        assert_eq!(country_alpha3("fi").expect("case-insensitive"), "FIN");
    }

    #[test]
    fn country_alpha3_rejects_unknown_codes() {
        assert_eq!(
            country_alpha3("ZZ"),
            Err(FieldError::Country("ZZ".to_string()))
        );
    }

    #[test]
    fn state_code_strips_country_prefix() {
        assert_eq!(state_code("US-MA"), "MA");
        assert_eq!(state_code("MA"), "MA");
    }

    #[test]
    fn vendor_datetime_round_trips() {
        let moment = Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();
        let formatted = format_datetime(moment);
        assert_eq!(formatted, "2026/03/04 05:06:07");
        assert_eq!(parse_datetime(&formatted).expect("parses back"), moment);
    }

    #[test]
    fn flat_rejects_embedded_delimiters() {
        assert!(flat("Address1", "1 Main St, Room B345").is_ok());
        assert_eq!(
            flat("Address1", "1 Main\tSt"),
            Err(FieldError::Control { field: "Address1" })
        );
    }
}
