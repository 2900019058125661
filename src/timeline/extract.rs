// src/timeline/extract.rs
use log::debug;
use serde_json::Value;

use crate::models::timeline::{EventRecord, Timeline};
use crate::timeline::clock::{timestamp_or_epoch, LocalTimeConverter};

const HUB_SCAN_KEYWORDS: [&str; 4] = ["hub", "facility", "arrival", "scan"];
const OUT_FOR_DELIVERY_KEYWORDS: [&str; 3] = ["ofd", "out for delivery", "accept"];
const ATTEMPT_KEYWORDS: [&str; 1] = ["attempt"];
const DELIVERED: &str = "delivered";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Milestone {
    HubScan,
    OutForDelivery,
    Attempt,
    Delivered,
}

fn contains_any(haystack: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| haystack.contains(k))
}

impl Milestone {
    fn matches(self, event: &EventRecord) -> bool {
        let name = event.name.to_lowercase();
        let kind = event.kind.to_lowercase();
        match self {
            Milestone::HubScan => {
                contains_any(&name, &HUB_SCAN_KEYWORDS) || contains_any(&kind, &HUB_SCAN_KEYWORDS)
            }
            Milestone::OutForDelivery => {
                let status = event.status.as_deref().unwrap_or_default().to_lowercase();
                contains_any(&name, &OUT_FOR_DELIVERY_KEYWORDS)
                    || contains_any(&kind, &OUT_FOR_DELIVERY_KEYWORDS)
                    || status.contains("out for delivery")
            }
            Milestone::Attempt => {
                contains_any(&name, &ATTEMPT_KEYWORDS) || contains_any(&kind, &ATTEMPT_KEYWORDS)
            }
            Milestone::Delivered => name == DELIVERED || kind == DELIVERED,
        }
    }
}

/// Derives the five milestone timestamps from an unordered event history.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimelineExtractor {
    converter: LocalTimeConverter,
}

impl TimelineExtractor {
    pub fn new(converter: LocalTimeConverter) -> Self {
        Self { converter }
    }

    pub fn converter(&self) -> &LocalTimeConverter {
        &self.converter
    }

    /// Hub scan, out-for-delivery and first attempt take the earliest
    /// matching event; last attempt and delivered take the latest. Ties keep
    /// input order when ascending and reverse it when descending.
    pub fn extract(&self, events: &[EventRecord]) -> Timeline {
        if events.is_empty() {
            return Timeline::default();
        }

        let mut ascending: Vec<&EventRecord> = events.iter().collect();
        ascending.sort_by_key(|ev| timestamp_or_epoch(&ev.timestamp));
        let descending: Vec<&EventRecord> = ascending.iter().rev().copied().collect();

        let find = |order: &[&EventRecord], milestone: Milestone| -> String {
            order
                .iter()
                .find(|ev| milestone.matches(ev))
                .map(|ev| self.converter.convert(&ev.timestamp))
                .unwrap_or_default()
        };

        let timeline = Timeline {
            first_hub_scan: find(&ascending, Milestone::HubScan),
            out_for_delivery: find(&ascending, Milestone::OutForDelivery),
            first_delivery_attempt: find(&ascending, Milestone::Attempt),
            last_delivery_attempt: find(&descending, Milestone::Attempt),
            delivered: find(&descending, Milestone::Delivered),
        };
        debug!("Extracted timeline from {} events: {:?}", events.len(), timeline);
        timeline
    }

    /// Same as [`extract`](Self::extract) for a raw JSON history; anything
    /// other than an array yields an empty timeline.
    pub fn extract_json(&self, history: &Value) -> Timeline {
        EventRecord::list_from_json(history)
            .map(|events| self.extract(&events))
            .unwrap_or_default()
    }
}

/// Extract with the default UTC+3 conversion.
pub fn extract_timeline(events: &[EventRecord]) -> Timeline {
    TimelineExtractor::default().extract(events)
}
