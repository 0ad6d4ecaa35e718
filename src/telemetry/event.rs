//! The JSON document POSTed to the telemetry endpoint.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One audit event.
///
/// Serializes as `{"type": ..., "payload": {...}, "timestamp": ..., "url": ...}`
/// with an RFC 3339 UTC timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub payload: Value,
    pub timestamp: String,
    pub url: String,
}

impl TelemetryEvent {
    /// Builds an event stamped with the current time.
    pub fn new(event_type: impl Into<String>, payload: Value, url: impl Into<String>) -> Self {
        Self::at(event_type, payload, url, Utc::now())
    }

    /// Builds an event stamped with `time`.
    pub fn at(
        event_type: impl Into<String>,
        payload: Value,
        url: impl Into<String>,
        time: DateTime<Utc>,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
            timestamp: time.to_rfc3339_opts(SecondsFormat::Millis, true),
            url: url.into(),
        }
    }
}
