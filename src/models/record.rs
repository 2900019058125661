// src/models/record.rs
//! Schema-less shipment rows.
//!
//! A `Record` is an insertion-ordered map from field name to a JSON value
//! (`serde_json` is built with `preserve_order`). Rows from the tracking
//! platform, the courier API and the satisfaction export all share this
//! shape; only a handful of well-known fields get typed accessors here.

use serde_json::{Map, Number, Value};

pub type Record = Map<String, Value>;

pub const TRACK_NUMBER_FIELD: &str = "track_number";

/// True for values a spreadsheet export would leave "empty": null or "".
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Render a scalar cell the way it would print in a spreadsheet cell.
/// Returns `None` for null; arrays and objects render as compact JSON.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(number_to_string(n)),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

/// Integral floats print without a fraction (`991.0` -> `"991"`), so a cell
/// that went through a spreadsheet still keys the same as its integer form.
fn number_to_string(n: &Number) -> String {
    if n.is_f64() {
        if let Some(f) = n.as_f64() {
            if f.is_finite() && f.fract() == 0.0 && f.abs() < 9_007_199_254_740_992.0 {
                return format!("{}", f as i64);
            }
        }
    }
    n.to_string()
}

/// Find the actual field name for `column`: exact match first, then the
/// first field whose name matches case-insensitively.
pub fn find_field_name<'a>(record: &'a Record, column: &str) -> Option<&'a str> {
    if let Some((key, _)) = record.get_key_value(column) {
        return Some(key.as_str());
    }
    let wanted = column.to_lowercase();
    record
        .keys()
        .find(|k| k.to_lowercase() == wanted)
        .map(|k| k.as_str())
}

/// Look up `column` with the same exact-then-case-insensitive rule.
pub fn get_field<'a>(record: &'a Record, column: &str) -> Option<&'a Value> {
    find_field_name(record, column).and_then(|name| record.get(name))
}

/// Non-empty string form of `column`, if present.
pub fn get_non_blank_string(record: &Record, column: &str) -> Option<String> {
    get_field(record, column)
        .filter(|v| !is_blank(v))
        .and_then(scalar_to_string)
}

/// The shipment tracking identifier, when the row carries one.
pub fn track_number(record: &Record) -> Option<String> {
    record
        .get(TRACK_NUMBER_FIELD)
        .filter(|v| !is_blank(v) && !matches!(v, Value::Bool(false)))
        .and_then(scalar_to_string)
}

/// Raw mobile value in `mobile_col`, skipping blank and whitespace-only cells.
pub fn mobile_value<'a>(record: &'a Record, mobile_col: &str) -> Option<&'a Value> {
    record.get(mobile_col).filter(|v| match v {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        _ => true,
    })
}

/// Copy `value` unless it is falsy (null, "", false, 0), in which case an
/// empty string is stored instead. Used when flattening API payloads.
pub fn value_or_empty(value: Option<&Value>) -> Value {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => Value::String(String::new()),
        Some(Value::String(s)) if s.is_empty() => Value::String(String::new()),
        Some(Value::Number(n)) if n.as_f64() == Some(0.0) => Value::String(String::new()),
        Some(v) => v.clone(),
    }
}
