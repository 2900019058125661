// src/enrichment/mod.rs - Enrichment stages that call external lookup services per item
pub mod client;
pub mod courier;
pub mod history;
pub mod mobile;

use serde_json::Value;

use crate::models::record::Record;

pub use client::{HttpLookupService, LookupService, RequestStyle};
pub use courier::{CourierStage, CourierStatus, RiderInfo};
pub use history::{annotate_with_history, DeliveredWindowStage, FilterStatus};
pub use mobile::{prepare_mobile_items, MobileLookupItem, MobileStage};

/// Tally of a status column in first-seen order, for stage summaries.
pub fn status_counts(records: &[Record], field: &str) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for record in records {
        let status = match record.get(field) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Bool(b)) => b.to_string(),
            Some(other) if !other.is_null() => other.to_string(),
            _ => "none".to_string(),
        };
        match counts.iter_mut().find(|(s, _)| *s == status) {
            Some((_, n)) => *n += 1,
            None => counts.push((status, 1)),
        }
    }
    counts
}
