// src/enrichment/courier.rs - Rider and timeline enrichment from the courier platform
use futures::future::join_all;
use log::{debug, warn};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::dispatch::batch::{BatchDispatcher, BatchTask, DispatchReport};
use crate::enrichment::client::LookupService;
use crate::errors::ReconcileError;
use crate::models::record::{is_blank, scalar_to_string, track_number, Record};
use crate::models::timeline::{EventRecord, TimelineNaming};
use crate::timeline::clock::{parse_timestamp, LocalTimeConverter};
use crate::timeline::extract::TimelineExtractor;

pub const COURIER_STATUS_FIELD: &str = "courier_status";
pub const COURIER_ERROR_FIELD: &str = "courier_error";
/// Event `type` that carries the rider details.
pub const DELIVERED_EVENT_TYPE: &str = "delivered";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CourierStatus {
    SkippedNoTrackNumber,
    SkippedNoApiResponse,
    SkippedNoDeliveredEvent,
    Found,
    Error,
}

impl CourierStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CourierStatus::SkippedNoTrackNumber => "skipped_no_track_number",
            CourierStatus::SkippedNoApiResponse => "skipped_no_api_response",
            CourierStatus::SkippedNoDeliveredEvent => "skipped_no_delivered_event",
            CourierStatus::Found => "found",
            CourierStatus::Error => "error",
        }
    }
}

/// Who delivered the shipment, taken from its delivered event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RiderInfo {
    pub worker_name: String,
    pub worker_code: String,
    pub worker_phone: String,
    pub vehicle_number: String,
    pub hub_name: String,
    pub hub_code: String,
    pub location: String,
    pub delivery_time_riyadh: String,
    /// UTC date, `YYYY-MM-DD`.
    pub delivery_date: String,
    /// UTC time of day, `HH:MM:SS`.
    pub delivery_time: String,
}

fn raw_string(event: &EventRecord, key: &str) -> String {
    event
        .raw
        .get(key)
        .filter(|v| !is_blank(v) && !matches!(v, Value::Bool(false)))
        .and_then(scalar_to_string)
        .unwrap_or_default()
}

impl RiderInfo {
    /// From the first event (in payload order) whose type is exactly
    /// `delivered`. `None` when there is no such event.
    pub fn from_events(events: &[EventRecord], converter: &LocalTimeConverter) -> Option<Self> {
        let delivered = events.iter().find(|ev| ev.kind == DELIVERED_EVENT_TYPE)?;
        let utc_raw = raw_string(delivered, "event_time_utc");
        let utc = parse_timestamp(&utc_raw);

        Some(Self {
            worker_name: raw_string(delivered, "worker_name"),
            worker_code: raw_string(delivered, "worker_code"),
            worker_phone: raw_string(delivered, "worker_phone"),
            vehicle_number: raw_string(delivered, "vehicle_number"),
            hub_name: raw_string(delivered, "hub_name"),
            hub_code: raw_string(delivered, "hub_code"),
            location: raw_string(delivered, "location"),
            delivery_time_riyadh: converter.convert(&utc_raw),
            delivery_date: utc.map(|dt| dt.format("%Y-%m-%d").to_string()).unwrap_or_default(),
            delivery_time: utc.map(|dt| dt.format("%H:%M:%S").to_string()).unwrap_or_default(),
        })
    }

    pub fn write_into(&self, record: &mut Record) {
        let fields = [
            ("worker_name", &self.worker_name),
            ("worker_code", &self.worker_code),
            ("worker_phone", &self.worker_phone),
            ("vehicle_number", &self.vehicle_number),
            ("hub_name", &self.hub_name),
            ("hub_code", &self.hub_code),
            ("location", &self.location),
            ("delivery_time_riyadh", &self.delivery_time_riyadh),
            ("delivery_date", &self.delivery_date),
            ("delivery_time", &self.delivery_time),
        ];
        for (name, value) in fields {
            record.insert(name.to_string(), Value::String(value.clone()));
        }
    }
}

fn with_status(mut record: Record, status: CourierStatus) -> Record {
    record.insert(COURIER_STATUS_FIELD.to_string(), Value::from(status.as_str()));
    record
}

fn with_error(record: Record, message: &str) -> Record {
    let mut record = with_status(record, CourierStatus::Error);
    record.insert(COURIER_ERROR_FIELD.to_string(), Value::from(message));
    record
}

/// Tag `record` from a courier tracking response body.
pub fn annotate_with_courier_response(record: Record, body: &Value, extractor: &TimelineExtractor) -> Record {
    if body.is_null() {
        return with_status(record, CourierStatus::SkippedNoApiResponse);
    }
    let events = body.get("events").and_then(EventRecord::list_from_json);
    let rider = events
        .as_deref()
        .and_then(|evs| RiderInfo::from_events(evs, extractor.converter()));

    match (rider, events) {
        (Some(rider), Some(events)) => {
            let mut record = with_status(record, CourierStatus::Found);
            rider.write_into(&mut record);
            extractor.extract(&events).write_into(&mut record, TimelineNaming::LocalSuffixed);
            record
        }
        _ => with_status(record, CourierStatus::SkippedNoDeliveredEvent),
    }
}

#[derive(Clone)]
pub struct CourierStage {
    service: Arc<dyn LookupService>,
    extractor: TimelineExtractor,
}

impl CourierStage {
    pub fn new(service: Arc<dyn LookupService>, extractor: TimelineExtractor) -> Self {
        Self { service, extractor }
    }

    pub async fn process_record(&self, record: Record) -> Record {
        let Some(track) = track_number(&record) else {
            return with_status(record, CourierStatus::SkippedNoTrackNumber);
        };

        match self.service.lookup(&track).await {
            Ok(body) => {
                debug!("Courier lookup for {} returned", track);
                annotate_with_courier_response(record, &body, &self.extractor)
            }
            Err(e) => {
                let err = ReconcileError::item(track.as_str(), format!("{:#}", e));
                warn!("Error processing courier tracking: {}", err);
                with_error(record, &format!("{:#}", e))
            }
        }
    }

    pub async fn process_batch(&self, records: Vec<Record>) -> Vec<Record> {
        join_all(records.into_iter().map(|r| self.process_record(r))).await
    }

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
