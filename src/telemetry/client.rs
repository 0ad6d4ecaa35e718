//! Fire-and-forget HTTP delivery of telemetry events.

use super::{AuditSink, TelemetryEvent};
use crate::config::Config;
use crate::errors::TelemetryError;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

/// Posts [`TelemetryEvent`]s as JSON to a configured endpoint.
///
/// Delivery is attempted once. Failures never reach the caller; with `debug`
/// enabled they are logged.
///
/// # Example
///
/// ```no_run
/// use nis2_shield::telemetry::TelemetryClient;
/// use serde_json::json;
///
/// # async fn run() {
/// let client = TelemetryClient::new(Some("https://audit.example/events".to_string()), "app://local", true);
/// let event = client.event("LOGIN", json!({ "method": "password" }));
/// client.send(&event).await;
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct TelemetryClient {
    endpoint: Option<String>,
    page_url: String,
    debug: bool,
    client: Client,
}

impl TelemetryClient {
    /// Creates a client. With no endpoint every event is dropped.
    pub fn new(endpoint: Option<String>, page_url: impl Into<String>, debug: bool) -> Self {
        Self {
            endpoint,
            page_url: page_url.into(),
            debug,
            client: Client::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.telemetry_endpoint.clone(),
            config.page_url.clone(),
            config.debug,
        )
    }

    pub fn is_enabled(&self) -> bool {
        self.endpoint.is_some()
    }

    /// Builds an event carrying this client's page URL.
    pub fn event(&self, event_type: &str, payload: Value) -> TelemetryEvent {
        TelemetryEvent::new(event_type, payload, self.page_url.clone())
    }

    /// Delivers `event`, swallowing any failure.
    pub async fn send(&self, event: &TelemetryEvent) {
        if let Err(e) = self.try_send(event).await {
            if self.debug {
                debug!(event_type = %event.event_type, "Telemetry delivery failed: {}", e);
            }
        }
    }

    async fn try_send(&self, event: &TelemetryEvent) -> Result<(), TelemetryError> {
        let Some(endpoint) = &self.endpoint else {
            return Ok(());
        };

        let response = self
            .client
            .post(endpoint)
            .json(event)
            .send()
            .await
            .map_err(TelemetryError::Transport)?;

        if !response.status().is_success() {
            return Err(TelemetryError::Status(response.status().as_u16()));
        }

        if self.debug {
            debug!(event_type = %event.event_type, "Telemetry delivered");
        }
        Ok(())
    }
}

impl AuditSink for TelemetryClient {
    /// Sends in a background task. Outside a tokio runtime the event is dropped.
    fn emit(&self, event_type: &str, payload: Value) {
        if !self.is_enabled() {
            return;
        }
        let event = self.event(event_type, payload);
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let client = self.clone();
                runtime.spawn(async move { client.send(&event).await });
            }
            Err(_) => {
                if self.debug {
                    debug!(event_type = %event.event_type, "No runtime; telemetry event dropped");
                }
            }
        }
    }
}
