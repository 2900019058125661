//! Pipeline configuration loaded from environment variables.

use log::{debug, info, warn};
use std::time::Duration;

use crate::errors::ReconcileError;
use crate::timeline::clock::{LocalTimeConverter, DEFAULT_LOCAL_OFFSET_HOURS};
use crate::utils::env::{env_or, env_string_or};

pub const DEFAULT_MOBILE_BATCH_SIZE: usize = 3;
pub const DEFAULT_HISTORY_BATCH_SIZE: usize = 50;
pub const DEFAULT_COURIER_BATCH_SIZE: usize = 20;
pub const DEFAULT_CONCURRENCY: usize = 2;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

pub const DEFAULT_TRACKING_HISTORY_URL: &str = "https://starlinksapi.app/api/v1/shipment/history";
pub const DEFAULT_TRACKING_LIST_URL: &str = "https://starlinksapi.app/api/v1/shipments/get-list";
pub const DEFAULT_COURIER_TRACK_URL: &str =
    "https://app.shipsy.in/api/client/integration/consignment/track";

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub mobile_batch_size: usize,
    pub history_batch_size: usize,
    pub courier_batch_size: usize,
    pub concurrency: usize,
    pub request_timeout: Duration,
    pub tracking_history_url: String,
    pub tracking_list_url: String,
    pub tracking_api_key: String,
    pub courier_track_url: String,
    pub courier_api_key: String,
    pub local_offset_hours: i32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mobile_batch_size: DEFAULT_MOBILE_BATCH_SIZE,
            history_batch_size: DEFAULT_HISTORY_BATCH_SIZE,
            courier_batch_size: DEFAULT_COURIER_BATCH_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            tracking_history_url: DEFAULT_TRACKING_HISTORY_URL.to_string(),
            tracking_list_url: DEFAULT_TRACKING_LIST_URL.to_string(),
            tracking_api_key: String::new(),
            courier_track_url: DEFAULT_COURIER_TRACK_URL.to_string(),
            courier_api_key: String::new(),
            local_offset_hours: DEFAULT_LOCAL_OFFSET_HOURS,
        }
    }
}

impl PipelineConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Self {
        let config = Self {
            mobile_batch_size: env_or("RECONCILE_BATCH_SIZE", DEFAULT_MOBILE_BATCH_SIZE),
            history_batch_size: env_or("RECONCILE_HISTORY_BATCH_SIZE", DEFAULT_HISTORY_BATCH_SIZE),
            courier_batch_size: env_or("RECONCILE_COURIER_BATCH_SIZE", DEFAULT_COURIER_BATCH_SIZE),
            concurrency: env_or("RECONCILE_CONCURRENCY", DEFAULT_CONCURRENCY),
            request_timeout: Duration::from_secs(env_or(
                "RECONCILE_REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )),
            tracking_history_url: env_string_or("TRACKING_HISTORY_URL", DEFAULT_TRACKING_HISTORY_URL),
            tracking_list_url: env_string_or("TRACKING_LIST_URL", DEFAULT_TRACKING_LIST_URL),
            tracking_api_key: env_string_or("TRACKING_API_KEY", ""),
            courier_track_url: env_string_or("COURIER_TRACK_URL", DEFAULT_COURIER_TRACK_URL),
            courier_api_key: env_string_or("COURIER_API_KEY", ""),
            local_offset_hours: env_or("LOCAL_OFFSET_HOURS", DEFAULT_LOCAL_OFFSET_HOURS),
        };
        debug!("Pipeline config: {:?}", config.redacted());
        config
    }

    /// Reject settings no stage can run with.
    pub fn validate(&self) -> Result<(), ReconcileError> {
        let sizes = [
            ("RECONCILE_BATCH_SIZE", self.mobile_batch_size),
            ("RECONCILE_HISTORY_BATCH_SIZE", self.history_batch_size),
            ("RECONCILE_COURIER_BATCH_SIZE", self.courier_batch_size),
            ("RECONCILE_CONCURRENCY", self.concurrency),
        ];
        for (name, value) in sizes {
            if value == 0 {
                return Err(ReconcileError::configuration(format!("{} must be at least 1", name)));
            }
        }
        if self.request_timeout.is_zero() {
            return Err(ReconcileError::configuration(
                "RECONCILE_REQUEST_TIMEOUT_SECS must be at least 1",
            ));
        }
        Ok(())
    }

    pub fn local_time_converter(&self) -> LocalTimeConverter {
        LocalTimeConverter::from_hours(self.local_offset_hours)
    }

    /// Copy with API keys masked, for logging.
    pub fn redacted(&self) -> Self {
        let mask = |key: &str| if key.is_empty() { String::new() } else { "***".to_string() };
        Self {
            tracking_api_key: mask(&self.tracking_api_key),
            courier_api_key: mask(&self.courier_api_key),
            ..self.clone()
        }
    }

    /// Log the current configuration
    pub fn log_config(&self) {
        info!(
            "⚙️ Batch sizes: mobile={}, history={}, courier={} | concurrency={} | timeout={:?} | UTC{:+}",
            self.mobile_batch_size,
            self.history_batch_size,
            self.courier_batch_size,
            self.concurrency,
            self.request_timeout,
            self.local_offset_hours
        );
        if self.tracking_api_key.is_empty() {
            warn!("TRACKING_API_KEY is not set; tracking lookups will likely be rejected");
        }
        if self.courier_api_key.is_empty() {
            warn!("COURIER_API_KEY is not set; courier lookups will likely be rejected");
        }
    }
}
