// src/enrichment/client.rs - External lookup boundary for the enrichment stages
use anyhow::{Context, Result};
use futures::future::BoxFuture;
use log::debug;
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use std::time::Duration;

use crate::config::PipelineConfig;

/// One opaque request/response per item: a tracking or phone number in,
/// arbitrary JSON out. Stages own the mapping of that JSON.
pub trait LookupService: Send + Sync {
    fn name(&self) -> &str;

    fn lookup<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Value>>;
}

/// How the key and credentials are attached to the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStyle {
    /// `?api_key=..&tracking_number=..`, body keyed by tracking number.
    TrackingHistory,
    /// `?search_value=..&include_completed=true` with a bearer token.
    ShipmentSearch,
    /// `?reference_number=..` with an `api-key` header.
    CourierTrack,
}

impl RequestStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStyle::TrackingHistory => "tracking_history",
            RequestStyle::ShipmentSearch => "shipment_search",
            RequestStyle::CourierTrack => "courier_track",
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpLookupService {
    client: Client,
    url: String,
    api_key: String,
    style: RequestStyle,
}

impl HttpLookupService {
    pub fn new(style: RequestStyle, url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            url: url.to_string(),
            api_key: api_key.to_string(),
            style,
        })
    }

    pub fn tracking_history(config: &PipelineConfig) -> Result<Self> {
        Self::new(
            RequestStyle::TrackingHistory,
            &config.tracking_history_url,
            &config.tracking_api_key,
            config.request_timeout,
        )
    }

    pub fn shipment_search(config: &PipelineConfig) -> Result<Self> {
        Self::new(
            RequestStyle::ShipmentSearch,
            &config.tracking_list_url,
            &config.tracking_api_key,
            config.request_timeout,
        )
    }

    pub fn courier_track(config: &PipelineConfig) -> Result<Self> {
        Self::new(
            RequestStyle::CourierTrack,
            &config.courier_track_url,
            &config.courier_api_key,
            config.request_timeout,
        )
    }

    pub fn style(&self) -> RequestStyle {
        self.style
    }

    fn build_request(&self, key: &str) -> RequestBuilder {
        match self.style {
            RequestStyle::TrackingHistory => self
                .client
                .get(&self.url)
                .query(&[("api_key", self.api_key.as_str()), ("tracking_number", key)]),
            RequestStyle::ShipmentSearch => self
                .client
                .get(&self.url)
                .query(&[("search_value", key), ("include_completed", "true")])
                .bearer_auth(&self.api_key)
                .header("Content-Type", "application/json"),
            RequestStyle::CourierTrack => self
                .client
                .get(&self.url)
                .query(&[("reference_number", key)])
                .header("api-key", &self.api_key)
                .header("Content-Type", "application/json"),
        }
    }

    async fn fetch(&self, key: &str) -> Result<Value> {
        debug!("{} lookup for {}", self.style.as_str(), key);
        let response = self
            .build_request(key)
            .send()
            .await
            .with_context(|| format!("{} request failed", self.style.as_str()))?;

        let status = response.status();
        if !status.is_success() {
            let body: Value = response.json().await.unwrap_or(Value::Null);
            return Err(anyhow::anyhow!(error_message(&body, status.as_u16())));
        }

        let text = response
            .text()
            .await
            .context("Failed to read lookup response body")?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).context("Failed to parse lookup response")
    }
}

impl LookupService for HttpLookupService {
    fn name(&self) -> &str {
        self.style.as_str()
    }

    fn lookup<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Value>> {
        Box::pin(self.fetch(key))
    }
}

/// Upstream error bodies carry a `message`; fall back to the status code.
pub fn error_message(body: &Value, status: u16) -> String {
    body.get("message")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {}", status))
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory lookup: known keys answer with their JSON, keys listed in
    /// `failures` error, everything else answers `null`.
    #[derive(Default)]
    pub struct FakeLookup {
        pub responses: HashMap<String, Value>,
        pub failures: HashMap<String, String>,
        pub calls: AtomicUsize,
    }

    impl FakeLookup {
        pub fn with_response(mut self, key: &str, value: Value) -> Self {
            self.responses.insert(key.to_string(), value);
            self
        }

        pub fn with_failure(mut self, key: &str, message: &str) -> Self {
            self.failures.insert(key.to_string(), message.to_string());
            self
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl LookupService for FakeLookup {
        fn name(&self) -> &str {
            "fake"
        }

        fn lookup<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Value>> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                if let Some(msg) = self.failures.get(key) {
                    anyhow::bail!("{}", msg);
                }
                Ok(self.responses.get(key).cloned().unwrap_or(Value::Null))
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn service(style: RequestStyle) -> HttpLookupService {
        HttpLookupService::new(style, "http://localhost:9/lookup", "secret", Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn test_error_message_prefers_body() {
        assert_eq!(error_message(&json!({"message": "Invalid token"}), 401), "Invalid token");
        assert_eq!(error_message(&json!({"message": ""}), 500), "HTTP 500");
        assert_eq!(error_message(&Value::Null, 404), "HTTP 404");
    }

    #[test]
    fn test_tracking_history_query() {
        let req = service(RequestStyle::TrackingHistory).build_request("TRK1").build().unwrap();
        assert_eq!(req.url().query(), Some("api_key=secret&tracking_number=TRK1"));
    }

    #[test]
    fn test_shipment_search_uses_bearer() {
        let req = service(RequestStyle::ShipmentSearch).build_request("966512345678").build().unwrap();
        assert_eq!(
            req.url().query(),
            Some("search_value=966512345678&include_completed=true")
        );
        assert_eq!(req.headers()["authorization"], "Bearer secret");
    }

    #[test]
    fn test_courier_uses_api_key_header() {
        let req = service(RequestStyle::CourierTrack).build_request("TRK9").build().unwrap();
        assert_eq!(req.url().query(), Some("reference_number=TRK9"));
        assert_eq!(req.headers()["api-key"], "secret");
    }

    #[tokio::test]
    async fn test_unreachable_host_is_an_error() {
        let svc = service(RequestStyle::CourierTrack);
        assert!(svc.lookup("TRK9").await.is_err());
    }
}
