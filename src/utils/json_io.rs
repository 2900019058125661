// src/utils/json_io.rs - Record files for the CLI
use anyhow::{bail, Context, Result};
use log::info;
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::Path;

use crate::models::record::Record;

/// Parse a JSON document holding an array of row objects. A top-level
/// object with a `records` array is accepted too.
pub fn parse_records(text: &str) -> Result<Vec<Record>> {
    let doc: Value = serde_json::from_str(text).context("Input is not valid JSON")?;
    let rows = match doc {
        Value::Array(rows) => rows,
        Value::Object(mut obj) => match obj.remove("records") {
            Some(Value::Array(rows)) => rows,
            _ => bail!("Expected a JSON array of records or an object with a 'records' array"),
        },
        _ => bail!("Expected a JSON array of records"),
    };

    rows.into_iter()
        .enumerate()
        .map(|(i, row)| match row {
            Value::Object(record) => Ok(record),
            other => bail!("Row {} is not an object: {}", i + 1, other),
        })
        .collect()
}

pub fn read_records(path: &Path) -> Result<Vec<Record>> {
    let text = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let records = parse_records(&text).with_context(|| format!("Failed to load records from {}", path.display()))?;
    info!("Loaded {} records from {}", records.len(), path.display());
    Ok(records)
}

/// Write `doc` as pretty JSON to `path`, or to stdout when no path is given.
pub fn write_output<T: Serialize>(doc: &T, path: Option<&Path>) -> Result<()> {
    let text = serde_json::to_string_pretty(doc).context("Failed to serialize output")?;
    match path {
        Some(path) => {
            fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote output to {}", path.display());
        }
        None => println!("{}", text),
    }
    Ok(())
}
