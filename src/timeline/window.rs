// src/timeline/window.rs
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::errors::ReconcileError;
use crate::models::record::{is_blank, scalar_to_string};
use crate::models::timeline::EventRecord;
use crate::timeline::clock::parse_timestamp;

/// Exact, case-sensitive event name the window filter looks for.
pub const DELIVERED_EVENT_NAME: &str = "Delivered";

const SECONDS_PER_DAY: i64 = 86_400;

/// Inclusive time window. The window only constrains events when both
/// bounds are present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryWindow {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl DeliveryWindow {
    pub fn new(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        Self { from, to }
    }

    /// Build a window from caller-supplied strings. A bound that is present
    /// but unparseable is rejected rather than silently ignored.
    pub fn parse(from: Option<&str>, to: Option<&str>) -> Result<Self, ReconcileError> {
        let parse_bound = |label: &str, raw: Option<&str>| -> Result<Option<DateTime<Utc>>, ReconcileError> {
            match raw.map(str::trim).filter(|s| !s.is_empty()) {
                None => Ok(None),
                Some(s) => parse_timestamp(s).map(Some).ok_or_else(|| {
                    ReconcileError::configuration(format!("invalid {} time '{}'", label, s))
                }),
            }
        };
        Ok(Self {
            from: parse_bound("from", from)?,
            to: parse_bound("to", to)?,
        })
    }

    pub fn is_bounded(&self) -> bool {
        self.from.is_some() && self.to.is_some()
    }

    fn admits(&self, event: &EventRecord) -> bool {
        match (self.from, self.to) {
            (Some(from), Some(to)) => match parse_timestamp(&event.timestamp) {
                Some(ts) => ts >= from && ts <= to,
                None => false,
            },
            _ => true,
        }
    }
}

/// Events named exactly "Delivered" that fall inside `window`.
pub fn delivered_events_in_window<'a>(
    events: &'a [EventRecord],
    window: &DeliveryWindow,
) -> Vec<&'a EventRecord> {
    events
        .iter()
        .filter(|ev| ev.name == DELIVERED_EVENT_NAME && window.admits(ev))
        .collect()
}

/// Whether the shipment has at least one qualifying delivered event.
pub fn is_delivered_in_window(events: &[EventRecord], window: &DeliveryWindow) -> bool {
    !delivered_events_in_window(events, window).is_empty()
}

/// Accept when the two dates are at most `margin_days` apart, counting any
/// partial day as a whole one. Missing or unparseable dates always reject.
pub fn within_margin(delivery: Option<&Value>, submitted: Option<&Value>, margin_days: i64) -> bool {
    let parse = |value: Option<&Value>| {
        value
            .filter(|v| !is_blank(v))
            .and_then(scalar_to_string)
            .and_then(|s| parse_timestamp(&s))
    };
    let (Some(delivery), Some(submitted)) = (parse(delivery), parse(submitted)) else {
        return false;
    };
    let diff_ms = (delivery - submitted).num_milliseconds().abs();
    let day_ms = SECONDS_PER_DAY * 1000;
    let diff_days = (diff_ms + day_ms - 1) / day_ms;
    diff_days <= margin_days
}
