// src/matching/clean.rs
use log::info;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::errors::ReconcileError;
use crate::matching::dedup::{dedup_records, KeepPolicy, RandomSource};
use crate::models::record::Record;
use crate::models::stats::CleanStats;
use crate::timeline::window::within_margin;

static WHITESPACE_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

pub const DEFAULT_MARGIN_DAYS: i64 = 1;

/// The row-level operations offered by the final cleaning step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanAction {
    /// Trim and collapse whitespace in string cells; drop fully empty rows.
    Clean,
    /// Keep one row per value of `group_key_col`.
    Dedup {
        group_key_col: Option<String>,
        keep: KeepPolicy,
    },
    /// Keep rows whose delivery and submission dates are within `margin_days`.
    Filter {
        delivery_col: String,
        submitted_col: String,
        margin_days: i64,
    },
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanOutcome {
    pub results: Vec<Record>,
    pub stats: CleanStats,
}

fn is_empty_cell(value: &Value) -> bool {
    matches!(value, Value::Null) || matches!(value, Value::String(s) if s.is_empty())
}

/// Drop rows where every cell is null or "", then trim every string cell and
/// collapse internal whitespace runs to a single space.
pub fn clean_records(records: &[Record]) -> Vec<Record> {
    records
        .iter()
        .filter(|row| !row.values().all(is_empty_cell))
        .map(|row| {
            row.iter()
                .map(|(field, value)| {
                    let cleaned = match value {
                        Value::String(s) => {
                            Value::String(WHITESPACE_RUN_RE.replace_all(s.trim(), " ").into_owned())
                        }
                        other => other.clone(),
                    };
                    (field.clone(), cleaned)
                })
                .collect()
        })
        .collect()
}

fn filter_by_margin(
    records: &[Record],
    delivery_col: &str,
    submitted_col: &str,
    margin_days: i64,
) -> Vec<Record> {
    records
        .iter()
        .filter(|row| within_margin(row.get(delivery_col), row.get(submitted_col), margin_days))
        .cloned()
        .collect()
}

/// Run one cleaning action and report row counts before and after.
pub fn apply_clean_action(
    records: &[Record],
    action: &CleanAction,
    rng: &mut dyn RandomSource,
) -> Result<CleanOutcome, ReconcileError> {
    let results = match action {
        CleanAction::Clean => clean_records(records),
        CleanAction::Dedup {
            group_key_col,
            keep,
        } => {
            let col = group_key_col.as_deref().unwrap_or_default();
            dedup_records(records, col, *keep, rng)?
        }
        CleanAction::Filter {
            delivery_col,
            submitted_col,
            margin_days,
        } => filter_by_margin(records, delivery_col, submitted_col, *margin_days),
    };

    let stats = CleanStats::new(records.len(), results.len());
    info!(
        "Clean action {:?}: {} rows -> {} rows ({} removed)",
        action, stats.initial_rows, stats.final_rows, stats.removed
    );
    Ok(CleanOutcome { results, stats })
}
