// src/matching/dedup.rs
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::str::FromStr;

use crate::errors::ReconcileError;
use crate::models::record::{is_blank, Record};

/// Which row of a duplicate group survives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeepPolicy {
    First,
    #[default]
    Last,
    Random,
}

impl FromStr for KeepPolicy {
    type Err = std::convert::Infallible;

    /// Unknown policy names fall back to `Last`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "first" => KeepPolicy::First,
            "random" => KeepPolicy::Random,
            _ => KeepPolicy::Last,
        })
    }
}

impl KeepPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeepPolicy::First => "first",
            KeepPolicy::Last => "last",
            KeepPolicy::Random => "random",
        }
    }
}

/// Source of the index picked by `KeepPolicy::Random`.
pub trait RandomSource {
    /// Return an index in `0..len`. `len` is always at least 1.
    fn pick(&mut self, len: usize) -> usize;
}

/// Thread-local RNG; selection differs between runs.
#[derive(Debug, Default)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn pick(&mut self, len: usize) -> usize {
        rand::thread_rng().gen_range(0..len)
    }
}

/// Reproducible selection from a fixed seed.
#[derive(Debug)]
pub struct SeededRandom(StdRng);

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }
}

impl RandomSource for SeededRandom {
    fn pick(&mut self, len: usize) -> usize {
        self.0.gen_range(0..len)
    }
}

/// Reduce each group of rows sharing the raw value of `group_key_col` to one
/// representative.
///
/// Rows with an empty or missing key are dropped. Output follows the order
/// in which each distinct key first appeared. Values are compared by their
/// JSON form, so the number `1` and the string `"1"` are different keys.
pub fn dedup_records(
    records: &[Record],
    group_key_col: &str,
    keep: KeepPolicy,
    rng: &mut dyn RandomSource,
) -> Result<Vec<Record>, ReconcileError> {
    if group_key_col.trim().is_empty() {
        return Err(ReconcileError::configuration("a group key column is required for dedup"));
    }

    let mut group_order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<&Record>> = HashMap::new();
    let mut skipped_missing_key = 0usize;

    for row in records {
        let Some(value) = row.get(group_key_col).filter(|v| !is_blank(v)) else {
            skipped_missing_key += 1;
            continue;
        };
        let key = value.to_string();
        if !groups.contains_key(&key) {
            group_order.push(key.clone());
        }
        groups.entry(key).or_default().push(row);
    }

    let mut kept = Vec::with_capacity(group_order.len());
    for key in &group_order {
        let members = &groups[key];
        let idx = match keep {
            KeepPolicy::First => 0,
            KeepPolicy::Last => members.len() - 1,
            // an out-of-range pick falls back to the last member
            KeepPolicy::Random => rng.pick(members.len()).min(members.len() - 1),
        };
        kept.push(members[idx].clone());
    }

    if skipped_missing_key > 0 {
        debug!(
            "Dedup: dropped {} rows with no value in '{}'",
            skipped_missing_key, group_key_col
        );
    }
    info!(
        "Dedup on '{}' (keep={}): {} rows -> {} groups",
        group_key_col,
        keep.as_str(),
        records.len(),
        kept.len()
    );
    Ok(kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn rows(value: Value) -> Vec<Record> {
        value
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_object().cloned().unwrap())
            .collect()
    }

    /// Always picks the same position, clamped to the group size.
    struct PinnedPick(usize);

    impl RandomSource for PinnedPick {
        fn pick(&mut self, len: usize) -> usize {
            self.0.min(len - 1)
        }
    }

    /// Ignores the bound it is given.
    struct OutOfRangePick;

    impl RandomSource for OutOfRangePick {
        fn pick(&mut self, len: usize) -> usize {
            len + 5
        }
    }

    fn sample() -> Vec<Record> {
        rows(json!([{"id": "A", "v": 1}, {"id": "A", "v": 2}, {"id": "B", "v": 3}]))
    }

    #[test]
    fn test_keep_first_and_last() {
        let first = dedup_records(&sample(), "id", KeepPolicy::First, &mut ThreadRandom).unwrap();
        assert_eq!(first, rows(json!([{"id": "A", "v": 1}, {"id": "B", "v": 3}])));

        let last = dedup_records(&sample(), "id", KeepPolicy::Last, &mut ThreadRandom).unwrap();
        assert_eq!(last, rows(json!([{"id": "A", "v": 2}, {"id": "B", "v": 3}])));
    }

    #[test]
    fn test_random_uses_injected_source() {
        let picked = dedup_records(&sample(), "id", KeepPolicy::Random, &mut PinnedPick(1)).unwrap();
        // group B has one member, so the pick is clamped to 0
        assert_eq!(picked, rows(json!([{"id": "A", "v": 2}, {"id": "B", "v": 3}])));
    }

    #[test]
    fn test_out_of_range_pick_keeps_last_member() {
        let picked = dedup_records(&sample(), "id", KeepPolicy::Random, &mut OutOfRangePick).unwrap();
        assert_eq!(picked, rows(json!([{"id": "A", "v": 2}, {"id": "B", "v": 3}])));
    }

    #[test]
    fn test_seeded_random_is_reproducible() {
        let data: Vec<Record> = (0..20)
            .map(|i| rows(json!([{"id": i % 3, "v": i}])).remove(0))
            .collect();
        let a = dedup_records(&data, "id", KeepPolicy::Random, &mut SeededRandom::new(7)).unwrap();
        let b = dedup_records(&data, "id", KeepPolicy::Random, &mut SeededRandom::new(7)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 3);
    }

    #[test]
    fn test_output_follows_first_appearance() {
        let data = rows(json!([
            {"id": "B", "v": 1},
            {"id": "A", "v": 2},
            {"id": "B", "v": 3}
        ]));
        let out = dedup_records(&data, "id", KeepPolicy::Last, &mut ThreadRandom).unwrap();
        assert_eq!(out, rows(json!([{"id": "B", "v": 3}, {"id": "A", "v": 2}])));
    }

    #[test]
    fn test_rows_without_key_are_dropped() {
        let data = rows(json!([
            {"id": "", "v": 1},
            {"v": 2},
            {"id": null, "v": 3},
            {"id": "A", "v": 4}
        ]));
        let out = dedup_records(&data, "id", KeepPolicy::First, &mut ThreadRandom).unwrap();
        assert_eq!(out, rows(json!([{"id": "A", "v": 4}])));
    }

    #[test]
    fn test_number_and_string_keys_differ() {
        let data = rows(json!([{"id": 1, "v": 1}, {"id": "1", "v": 2}]));
        let out = dedup_records(&data, "id", KeepPolicy::Last, &mut ThreadRandom).unwrap();
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_empty_group_column_is_configuration_error() {
        let err = dedup_records(&sample(), "", KeepPolicy::Last, &mut ThreadRandom).unwrap_err();
        assert!(matches!(err, ReconcileError::Configuration(_)));
    }

    #[test]
    fn test_keep_policy_parsing() {
        assert_eq!("first".parse::<KeepPolicy>().unwrap(), KeepPolicy::First);
        assert_eq!("RANDOM".parse::<KeepPolicy>().unwrap(), KeepPolicy::Random);
        assert_eq!("newest".parse::<KeepPolicy>().unwrap(), KeepPolicy::Last);
        assert_eq!(KeepPolicy::default(), KeepPolicy::Last);
    }
}
