// src/enrichment/history.rs - Delivered-in-window filter over tracking histories
use futures::future::join_all;
use log::{debug, warn};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::dispatch::batch::{BatchDispatcher, BatchTask, DispatchReport};
use crate::enrichment::client::LookupService;
use crate::errors::ReconcileError;
use crate::models::record::{track_number, Record};
use crate::models::timeline::{EventRecord, TimelineNaming};
use crate::timeline::extract::TimelineExtractor;
use crate::timeline::window::{delivered_events_in_window, DeliveryWindow};

pub const FILTER_STATUS_FIELD: &str = "filter_status";
pub const FILTER_ERROR_FIELD: &str = "filter_error";
pub const DELIVERED_EVENTS_FIELD: &str = "delivered_events";
/// Field holding an already-fetched history when no lookup is made.
pub const EVENT_HISTORY_FIELD: &str = "event_history";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterStatus {
    SkippedNoTrackNumber,
    SkippedNoHistory,
    FilteredOutNotDeliveredInRange,
    Kept,
    Error,
}

impl FilterStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterStatus::SkippedNoTrackNumber => "skipped_no_track_number",
            FilterStatus::SkippedNoHistory => "skipped_no_history",
            FilterStatus::FilteredOutNotDeliveredInRange => "filtered_out_not_delivered_in_range",
            FilterStatus::Kept => "kept",
            FilterStatus::Error => "error",
        }
    }
}

fn with_status(mut record: Record, status: FilterStatus) -> Record {
    record.insert(FILTER_STATUS_FIELD.to_string(), Value::from(status.as_str()));
    record
}

fn with_error(record: Record, message: &str) -> Record {
    let mut record = with_status(record, FilterStatus::Error);
    record.insert(FILTER_ERROR_FIELD.to_string(), Value::from(message));
    record
}

/// Tag `record` from its event history.
///
/// A missing or non-array history is `skipped_no_history`. Kept rows gain
/// the qualifying delivered events (as a JSON string) and the timeline.
pub fn annotate_with_history(
    record: Record,
    history: Option<&Value>,
    window: &DeliveryWindow,
    extractor: &TimelineExtractor,
) -> Record {
    let Some(events) = history.and_then(EventRecord::list_from_json) else {
        return with_status(record, FilterStatus::SkippedNoHistory);
    };

    let delivered = delivered_events_in_window(&events, window);
    if delivered.is_empty() {
        return with_status(record, FilterStatus::FilteredOutNotDeliveredInRange);
    }

    let delivered_json = Value::Array(delivered.iter().map(|ev| ev.raw.clone()).collect()).to_string();
    let mut record = with_status(record, FilterStatus::Kept);
    record.insert(DELIVERED_EVENTS_FIELD.to_string(), Value::String(delivered_json));
    extractor.extract(&events).write_into(&mut record, TimelineNaming::Plain);
    record
}

/// Window filter for records that already carry their history under
/// `event_history`. Runs without any lookups.
pub fn filter_embedded_histories(
    records: Vec<Record>,
    window: &DeliveryWindow,
    extractor: &TimelineExtractor,
) -> Vec<Record> {
    records
        .into_iter()
        .map(|record| {
            let history = record.get(EVENT_HISTORY_FIELD).cloned();
            annotate_with_history(record, history.as_ref(), window, extractor)
        })
        .collect()
}

/// Drop every record not tagged `kept`, leaving the dataset the merge step
/// expects as input.
pub fn retain_kept(records: Vec<Record>) -> Vec<Record> {
    let kept = FilterStatus::Kept.as_str();
    records
        .into_iter()
        .filter(|r| r.get(FILTER_STATUS_FIELD).and_then(Value::as_str) == Some(kept))
        .collect()
}

#[derive(Clone)]
pub struct DeliveredWindowStage {
    service: Arc<dyn LookupService>,
    window: DeliveryWindow,
    extractor: TimelineExtractor,
}

impl DeliveredWindowStage {
    pub fn new(service: Arc<dyn LookupService>, window: DeliveryWindow, extractor: TimelineExtractor) -> Self {
        Self {
            service,
            window,
            extractor,
        }
    }

    pub fn window(&self) -> &DeliveryWindow {
        &self.window
    }

    /// Look up one record's history and tag it. Never fails: lookup errors
    /// become `filter_status = error`.
    pub async fn process_record(&self, record: Record) -> Record {
        let Some(track) = track_number(&record) else {
            return with_status(record, FilterStatus::SkippedNoTrackNumber);
        };

        match self.service.lookup(&track).await {
            Ok(body) => {
                debug!("History lookup for {} returned", track);
                annotate_with_history(record, body.get(track.as_str()), &self.window, &self.extractor)
            }
            Err(e) => {
                let err = ReconcileError::item(track.as_str(), format!("{:#}", e));
                warn!("Error processing history: {}", err);
                with_error(record, &format!("{:#}", e))
            }
        }
    }

    /// All records of a batch are looked up concurrently.
    pub async fn process_batch(&self, records: Vec<Record>) -> Vec<Record> {
        join_all(records.into_iter().map(|r| self.process_record(r))).await
    }

    /// Every input record comes back exactly once, tagged.
    pub async fn run(&self, records: Vec<Record>, dispatcher: &BatchDispatcher) -> DispatchReport<Record> {
        let stage = self.clone();
        dispatcher
            .run(
                records,
                move |task: BatchTask<Record>| {
                    let stage = stage.clone();
                    async move { Ok::<_, anyhow::Error>(stage.process_batch(task.items).await) }
                },
                |task: &BatchTask<Record>, err: &anyhow::Error| {
                    let message = format!("{:#}", err);
                    task.items.iter().cloned().map(|r| with_error(r, &message)).collect()
                },
            )
            .await
    }
}
