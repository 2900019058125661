// src/models/timeline.rs
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::record::{scalar_to_string, Record};

/// One entry of a shipment's event history.
///
/// Tracking-platform events carry `event_name` / `event_date`; courier events
/// carry `type` / `event_time_utc` and `status_external`. The original JSON is
/// kept in `raw` so callers can echo it back or pull source-specific fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub name: String,
    pub kind: String,
    pub timestamp: String,
    pub location: Option<String>,
    pub status: Option<String>,
    #[serde(skip)]
    pub raw: Value,
}

fn str_field(obj: &Value, key: &str) -> Option<String> {
    obj.get(key).and_then(scalar_to_string).filter(|s| !s.is_empty())
}

impl EventRecord {
    pub fn new(name: &str, kind: &str, timestamp: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: kind.to_string(),
            timestamp: timestamp.to_string(),
            ..Default::default()
        }
    }

    /// Map one event object of either upstream schema.
    pub fn from_json(obj: &Value) -> Self {
        let timestamp = str_field(obj, "event_time_utc")
            .or_else(|| str_field(obj, "event_date"))
            .or_else(|| str_field(obj, "timestamp"))
            .unwrap_or_default();
        Self {
            name: str_field(obj, "event_name").unwrap_or_default(),
            kind: str_field(obj, "type").unwrap_or_default(),
            timestamp,
            location: str_field(obj, "location"),
            status: str_field(obj, "status_external").or_else(|| str_field(obj, "status")),
            raw: obj.clone(),
        }
    }

    /// Map a JSON array of events. Non-array input yields `None`.
    pub fn list_from_json(value: &Value) -> Option<Vec<EventRecord>> {
        value
            .as_array()
            .map(|events| events.iter().map(EventRecord::from_json).collect())
    }
}

/// Which column names a timeline is written under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelineNaming {
    /// `first_hub_scan`, `ofd_time`, ... (tracking history stage)
    Plain,
    /// `first_hub_scan_time_riyadh`, ... (courier stage)
    LocalSuffixed,
}

/// The five derived milestones. Unresolved milestones hold an empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeline {
    pub first_hub_scan: String,
    pub out_for_delivery: String,
    pub first_delivery_attempt: String,
    pub last_delivery_attempt: String,
    pub delivered: String,
}

impl Timeline {
    pub fn is_empty(&self) -> bool {
        self.fields().iter().all(|(_, v)| v.is_empty())
    }

    fn fields(&self) -> [(&'static str, &String); 5] {
        [
            ("first_hub_scan", &self.first_hub_scan),
            ("ofd", &self.out_for_delivery),
            ("first_delivery_attempt", &self.first_delivery_attempt),
            ("last_delivery_attempt", &self.last_delivery_attempt),
            ("delivered", &self.delivered),
        ]
    }

    /// Write the milestones into `record` using the stage's column names.
    pub fn write_into(&self, record: &mut Record, naming: TimelineNaming) {
        for (stem, value) in self.fields() {
            let column = match (naming, stem) {
                (TimelineNaming::Plain, "first_hub_scan")
                | (TimelineNaming::Plain, "first_delivery_attempt")
                | (TimelineNaming::Plain, "last_delivery_attempt") => stem.to_string(),
                (TimelineNaming::Plain, _) => format!("{}_time", stem),
                (TimelineNaming::LocalSuffixed, _) => format!("{}_time_riyadh", stem),
            };
            record.insert(column, Value::String(value.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_from_courier_json() {
        let ev = EventRecord::from_json(&json!({
            "type": "delivered",
            "event_time_utc": "2024-03-01T09:00:00Z",
            "status_external": "Delivered",
            "worker_name": "Sami"
        }));
        assert_eq!(ev.kind, "delivered");
        assert_eq!(ev.timestamp, "2024-03-01T09:00:00Z");
        assert_eq!(ev.status.as_deref(), Some("Delivered"));
        assert_eq!(ev.raw["worker_name"], "Sami");
    }

    #[test]
    fn test_event_list_rejects_non_array() {
        assert!(EventRecord::list_from_json(&json!({"events": []})).is_none());
        assert_eq!(
            EventRecord::list_from_json(&json!([{"event_name": "Delivered"}]))
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn test_timeline_write_into_naming() {
        let timeline = Timeline {
            delivered: "2024-03-01 12:00:00".to_string(),
            ..Default::default()
        };
        let mut plain = Record::new();
        timeline.write_into(&mut plain, TimelineNaming::Plain);
        let keys: Vec<&str> = plain.keys().map(|k| k.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "first_hub_scan",
                "ofd_time",
                "first_delivery_attempt",
                "last_delivery_attempt",
                "delivered_time"
            ]
        );
        assert_eq!(plain["delivered_time"], "2024-03-01 12:00:00");

        let mut local = Record::new();
        timeline.write_into(&mut local, TimelineNaming::LocalSuffixed);
        assert_eq!(local["delivered_time_riyadh"], "2024-03-01 12:00:00");
        assert_eq!(local["ofd_time_riyadh"], "");
        assert!(local.contains_key("first_hub_scan_time_riyadh"));
    }
}
