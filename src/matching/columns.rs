// src/matching/columns.rs
use crate::models::record::Record;

/// Aliases recognised for the phone column when merging two exports.
pub const MERGE_MOBILE_ALIASES: [&str; 6] = [
    "mobile",
    "consignee phone",
    "phone",
    "contact number",
    "tel",
    "consignee_phone",
];

/// Aliases recognised for the phone column of an uploaded enrichment sheet.
pub const UPLOAD_MOBILE_ALIASES: [&str; 6] = [
    "mobile",
    "phone",
    "tel",
    "cell",
    "consignee phone",
    "consignee_phone",
];

pub const MOBILE_HINT: &str = "mobile";

/// Locate a logical column in a sample record whose field casing is unknown.
///
/// The first field (in the record's own order) whose lowercased name equals
/// one of `candidates` wins. Failing that, the first field whose lowercased
/// name contains `hint` is returned.
pub fn resolve_column(record: &Record, candidates: &[&str], hint: &str) -> Option<String> {
    let wanted: Vec<String> = candidates.iter().map(|c| c.to_lowercase()).collect();
    let hint = hint.to_lowercase();

    record
        .keys()
        .find(|k| wanted.contains(&k.to_lowercase()))
        .or_else(|| {
            if hint.is_empty() {
                None
            } else {
                record.keys().find(|k| k.to_lowercase().contains(&hint))
            }
        })
        .cloned()
}

/// Use the caller's column when given, otherwise detect it from the first row.
pub fn effective_column(
    supplied: Option<&str>,
    sample: Option<&Record>,
    candidates: &[&str],
    hint: &str,
) -> Option<String> {
    match supplied.map(str::trim).filter(|s| !s.is_empty()) {
        Some(col) => Some(col.to_string()),
        None => sample.and_then(|row| resolve_column(row, candidates, hint)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_exact_alias_case_insensitive() {
        let row = record(json!({"Order": 1, "Consignee Phone": "0512345678"}));
        assert_eq!(
            resolve_column(&row, &MERGE_MOBILE_ALIASES, MOBILE_HINT),
            Some("Consignee Phone".to_string())
        );
    }

    #[test]
    fn test_first_field_in_record_order_wins() {
        let row = record(json!({"TEL": "1", "Mobile": "2"}));
        assert_eq!(
            resolve_column(&row, &MERGE_MOBILE_ALIASES, MOBILE_HINT),
            Some("TEL".to_string())
        );
    }

    #[test]
    fn test_falls_back_to_hint_substring() {
        let row = record(json!({"name": "a", "Customer Mobile No": "0512345678"}));
        assert_eq!(
            resolve_column(&row, &MERGE_MOBILE_ALIASES, MOBILE_HINT),
            Some("Customer Mobile No".to_string())
        );
    }

    #[test]
    fn test_none_when_nothing_qualifies() {
        let row = record(json!({"name": "a", "city": "Riyadh"}));
        assert_eq!(resolve_column(&row, &MERGE_MOBILE_ALIASES, MOBILE_HINT), None);
        assert_eq!(resolve_column(&Record::new(), &MERGE_MOBILE_ALIASES, MOBILE_HINT), None);
    }

    #[test]
    fn test_effective_column_prefers_supplied() {
        let row = record(json!({"mobile": "1"}));
        assert_eq!(
            effective_column(Some("phone_2"), Some(&row), &MERGE_MOBILE_ALIASES, MOBILE_HINT),
            Some("phone_2".to_string())
        );
        assert_eq!(
            effective_column(Some("  "), Some(&row), &MERGE_MOBILE_ALIASES, MOBILE_HINT),
            Some("mobile".to_string())
        );
        assert_eq!(effective_column(None, None, &MERGE_MOBILE_ALIASES, MOBILE_HINT), None);
    }
}
