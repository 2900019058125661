// src/matching/phone.rs
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::models::record::scalar_to_string;

/// Country prefix applied to local Saudi mobile numbers.
pub const COUNTRY_PREFIX: &str = "966";

static LOOKUP_STRIP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s\-()]").unwrap());

/// Turn a raw phone cell into the digits-only key used for matching.
///
/// - empty or null input yields an empty key
/// - a trailing ".0" spreadsheet float artifact is dropped before digit extraction
/// - `05XXXXXXXX` (10 digits) becomes `9665XXXXXXXX`
/// - `5XXXXXXXX` (9 digits) becomes `9665XXXXXXXX`
/// - anything else passes through as its digits
///
/// An empty result means "no key": the row participates in no match.
pub fn normalize_phone_key(raw: &Value) -> String {
    match raw {
        Value::Null => String::new(),
        Value::String(s) if s.is_empty() => String::new(),
        other => match scalar_to_string(other) {
            Some(s) => normalize_phone_str(&s),
            None => String::new(),
        },
    }
}

/// String form of [`normalize_phone_key`].
pub fn normalize_phone_str(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    let mut s = lowered.trim();
    if let Some(stripped) = s.strip_suffix(".0") {
        s = stripped;
    }

    let digits: String = s.chars().filter(|c| c.is_ascii_digit()).collect();

    if digits.starts_with("05") && digits.len() == 10 {
        return format!("{}{}", COUNTRY_PREFIX, &digits[1..]);
    }
    if digits.starts_with('5') && digits.len() == 9 {
        return format!("{}{}", COUNTRY_PREFIX, digits);
    }
    if digits.is_empty() && !raw.is_empty() {
        debug!("Phone value '{}' has no digits; treating as no key", raw);
    }
    digits
}

/// Clean a phone cell into the search value sent to the shipment-list lookup.
///
/// Separators (whitespace, dashes, parentheses) and leading zeros are removed;
/// a bare 9-digit local number gains the country prefix. This is looser than
/// [`normalize_phone_key`]: letters and other punctuation are kept, since the
/// lookup service performs its own matching.
pub fn lookup_search_value(raw: &Value) -> String {
    let text = scalar_to_string(raw).unwrap_or_default();
    let stripped = LOOKUP_STRIP_RE.replace_all(&text, "");
    let clean = stripped.trim_start_matches('0');
    if clean.chars().count() == 9 {
        format!("{}{}", COUNTRY_PREFIX, clean)
    } else {
        clean.to_string()
    }
}
