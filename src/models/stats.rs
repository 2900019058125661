// src/models/stats.rs
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Row counts reported by a merge. `match_count` counts emitted matched rows,
/// so a main row with three secondary matches contributes three.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeStats {
    pub main_rows: usize,
    pub secondary_rows: usize,
    pub merged_rows: usize,
    pub match_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanStats {
    pub initial_rows: usize,
    pub final_rows: usize,
    pub removed: usize,
}

impl CleanStats {
    pub fn new(initial_rows: usize, final_rows: usize) -> Self {
        Self {
            initial_rows,
            final_rows,
            removed: initial_rows.saturating_sub(final_rows),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchStats {
    pub total_items: usize,
    pub total_batches: usize,
    pub failed_batches: usize,
    pub processed_items: usize,
    pub output_rows: usize,
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }
}
