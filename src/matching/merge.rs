// src/matching/merge.rs
use log::{debug, info};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Instant;

use crate::errors::ReconcileError;
use crate::matching::columns::{effective_column, MERGE_MOBILE_ALIASES, MOBILE_HINT};
use crate::matching::phone::normalize_phone_key;
use crate::models::record::{find_field_name, get_field, is_blank, Record};
use crate::models::stats::MergeStats;

const DEBUG_SAMPLE_SIZE: usize = 5;
pub const SECONDARY_SUFFIX: &str = "_secondary";

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeySample {
    pub raw: Value,
    pub normalized: String,
}

/// Diagnostics for spotting key-format mismatches between the two files.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeDebugInfo {
    pub sample_main_keys: Vec<KeySample>,
    pub sample_secondary_keys: Vec<String>,
    pub secondary_index_size: usize,
    pub unmatched_samples: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MergeOutcome {
    pub merged: Vec<Record>,
    pub stats: MergeStats,
    pub debug: MergeDebugInfo,
}

/// One-to-many index from normalized phone key to secondary rows, in
/// insertion order per key.
struct SecondaryIndex<'a> {
    by_key: HashMap<String, Vec<&'a Record>>,
    key_order: Vec<String>,
}

impl<'a> SecondaryIndex<'a> {
    fn build(rows: &'a [Record], key_col: Option<&str>) -> Self {
        let mut index = SecondaryIndex {
            by_key: HashMap::new(),
            key_order: Vec::new(),
        };
        let Some(col) = key_col else {
            return index;
        };
        for row in rows {
            let Some(raw) = get_field(row, col).filter(|v| !is_blank(v)) else {
                continue;
            };
            let key = normalize_phone_key(raw);
            if key.is_empty() {
                continue;
            }
            if !index.by_key.contains_key(&key) {
                index.key_order.push(key.clone());
            }
            index.by_key.entry(key).or_default().push(row);
        }
        index
    }

    fn matches(&self, key: &str) -> &[&'a Record] {
        if key.is_empty() {
            return &[];
        }
        self.by_key.get(key).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Union `main` with one matched secondary row. Main fields are never
/// overwritten; a colliding secondary field lands under `<name>_secondary`
/// (last write wins if that name already exists). The secondary's own key
/// column is dropped.
fn merge_pair(main: &Record, secondary: &Record, secondary_key_field: Option<&str>) -> Record {
    let mut merged = main.clone();
    for (field, value) in secondary {
        if Some(field.as_str()) == secondary_key_field {
            continue;
        }
        if merged.contains_key(field) {
            merged.insert(format!("{}{}", field, SECONDARY_SUFFIX), value.clone());
        } else {
            merged.insert(field.clone(), value.clone());
        }
    }
    merged
}

/// Join `main` against `secondary` on normalized phone key.
///
/// Each main row produces one output row per matching secondary row (in
/// secondary order), or passes through unchanged when nothing matches.
/// Output keeps one contiguous run per main row in main's order.
///
/// Fails with a configuration error only when the main key column can be
/// neither taken from `main_key_col` nor detected from the first main row.
/// An unresolved secondary column means no row matches.
pub fn merge_records(
    main: &[Record],
    secondary: &[Record],
    main_key_col: Option<&str>,
    secondary_key_col: Option<&str>,
) -> Result<MergeOutcome, ReconcileError> {
    let start_time = Instant::now();

    let main_col = effective_column(main_key_col, main.first(), &MERGE_MOBILE_ALIASES, MOBILE_HINT)
        .ok_or_else(|| ReconcileError::configuration("Could not detect mobile column in main file"))?;
    let secondary_col = effective_column(
        secondary_key_col,
        secondary.first(),
        &MERGE_MOBILE_ALIASES,
        MOBILE_HINT,
    );
    if secondary_col.is_none() {
        info!("Merge: no mobile column in secondary file; every main row will pass through unmatched");
    }

    let index = SecondaryIndex::build(secondary, secondary_col.as_deref());
    info!(
        "Merge: indexed {} secondary rows under {} distinct keys (main column '{}', secondary column {:?})",
        secondary.len(),
        index.by_key.len(),
        main_col,
        secondary_col
    );

    let mut debug_info = MergeDebugInfo {
        sample_secondary_keys: index.key_order.iter().take(DEBUG_SAMPLE_SIZE).cloned().collect(),
        secondary_index_size: index.by_key.len(),
        ..Default::default()
    };

    let mut merged = Vec::with_capacity(main.len());
    let mut match_count = 0;

    for (idx, main_row) in main.iter().enumerate() {
        let raw = get_field(main_row, &main_col).cloned().unwrap_or(Value::Null);
        let key = normalize_phone_key(&raw);
        if idx < DEBUG_SAMPLE_SIZE {
            debug_info.sample_main_keys.push(KeySample {
                raw,
                normalized: key.clone(),
            });
        }

        let matches = index.matches(&key);
        if matches.is_empty() {
            if debug_info.unmatched_samples.len() < DEBUG_SAMPLE_SIZE {
                debug_info.unmatched_samples.push(key);
            }
            merged.push(main_row.clone());
            continue;
        }

        match_count += matches.len();
        for secondary_row in matches {
            let key_field = secondary_col
                .as_deref()
                .and_then(|col| find_field_name(secondary_row, col));
            merged.push(merge_pair(main_row, secondary_row, key_field));
        }
    }

    let stats = MergeStats {
        main_rows: main.len(),
        secondary_rows: secondary.len(),
        merged_rows: merged.len(),
        match_count,
    };
    debug!("Merge debug info: {:?}", debug_info);
    info!(
        "Merge complete in {:.2?}: {} main rows + {} secondary rows -> {} rows ({} matches)",
        start_time.elapsed(),
        stats.main_rows,
        stats.secondary_rows,
        stats.merged_rows,
        stats.match_count
    );

    Ok(MergeOutcome {
        merged,
        stats,
        debug: debug_info,
    })
}
