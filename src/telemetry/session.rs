//! Binds session guardian transitions to the audit trail and to application callbacks.

use super::AuditSink;
use crate::constants::{EVENT_SESSION_ACTIVE, EVENT_SESSION_IDLE};
use crate::session::{SessionGuardian, Transition, TransitionEvent};
use serde_json::json;
use std::sync::Arc;

type Callback = Arc<dyn Fn(TransitionEvent) + Send + Sync>;

/// Forwards guardian transitions to an [`AuditSink`] and to optional
/// `on_idle` / `on_active` callbacks.
///
/// # Example
///
/// ```no_run
/// use nis2_shield::session::{GuardianSettings, SessionGuardian};
/// use nis2_shield::telemetry::{SessionAudit, TelemetryClient};
/// use std::sync::Arc;
///
/// let guardian = SessionGuardian::new(GuardianSettings::default());
/// let telemetry = TelemetryClient::new(None, "app://local", false);
/// SessionAudit::new(Arc::new(telemetry))
///     .on_idle(|_| println!("redirecting to logout"))
///     .attach(&guardian);
/// ```
pub struct SessionAudit {
    sink: Arc<dyn AuditSink>,
    on_idle: Option<Callback>,
    on_active: Option<Callback>,
}

impl SessionAudit {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self {
            sink,
            on_idle: None,
            on_active: None,
        }
    }

    pub fn on_idle<F>(mut self, callback: F) -> Self
    where
        F: Fn(TransitionEvent) + Send + Sync + 'static,
    {
        self.on_idle = Some(Arc::new(callback));
        self
    }

    pub fn on_active<F>(mut self, callback: F) -> Self
    where
        F: Fn(TransitionEvent) + Send + Sync + 'static,
    {
        self.on_active = Some(Arc::new(callback));
        self
    }

    /// Registers the forwarding listener on `guardian`.
    ///
    /// Idle events report the timeout in force when the session went idle.
    pub fn attach(self, guardian: &SessionGuardian) {
        guardian.on_transition(move |event| match event.transition {
            Transition::BecameIdle => {
                self.sink.emit(
                    EVENT_SESSION_IDLE,
                    json!({
                        "reason": "inactivity",
                        "timeoutSeconds": event.timeout.as_secs(),
                    }),
                );
                if let Some(callback) = &self.on_idle {
                    callback(event);
                }
            }
            Transition::BecameActive => {
                self.sink
                    .emit(EVENT_SESSION_ACTIVE, json!({ "reason": "user_activity" }));
                if let Some(callback) = &self.on_active {
                    callback(event);
                }
            }
        });
    }
}
