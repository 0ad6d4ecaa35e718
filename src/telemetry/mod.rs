//! Audit telemetry.
//!
//! Everything that leaves the process for the audit trail goes through an
//! [`AuditSink`]. The production sink is [`TelemetryClient`], which POSTs JSON
//! to a configured endpoint and never lets a delivery failure reach its caller.
//!
//! # Module Structure
//!
//! - `event`: The wire document
//! - `client`: HTTP delivery
//! - `crash`: Incident reporting for failing components
//! - `session`: Guardian transitions forwarded as audit events

pub mod client;
pub mod crash;
pub mod event;
pub mod session;

use serde_json::Value;

// Re-export commonly used types
pub use self::client::TelemetryClient;
pub use self::crash::{CrashReport, CrashReporter};
pub use self::event::TelemetryEvent;
pub use self::session::SessionAudit;

/// Destination for audit events.
///
/// `emit` must not block and must not fail; implementations deliver in the
/// background or drop the event.
pub trait AuditSink: Send + Sync {
    fn emit(&self, event_type: &str, payload: Value);
}
