//! Crash reporting for failing components.
//!
//! A [`CrashReporter`] sits one level above a component: it runs the
//! component, and if the component fails or panics it reports an incident and
//! hands back a fallback instead. Nothing else is affected by the failure.

use super::AuditSink;
use crate::constants::EVENT_UI_CRASH;
use serde_json::json;
use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::fmt::Display;
use std::panic::{self, UnwindSafe};
use std::sync::{Arc, Once};
use tracing::warn;
use uuid::Uuid;

thread_local! {
    static GUARDING: Cell<bool> = Cell::new(false);
    static PANIC_TRACE: RefCell<Option<String>> = RefCell::new(None);
}

static PANIC_HOOK: Once = Once::new();

/// Chains a hook that records the panic-site backtrace while a guard is active.
fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if GUARDING.with(Cell::get) {
                let trace = Backtrace::force_capture().to_string();
                PANIC_TRACE.with(|slot| *slot.borrow_mut() = Some(trace));
            }
            previous(info);
        }));
    });
}

/// What gets reported about a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrashReport {
    pub error_message: String,
    pub stack_trace: String,
    pub component_trace: String,
}

/// Reports component failures to an [`AuditSink`] under `CRITICAL_UI_CRASH`.
#[derive(Clone)]
pub struct CrashReporter {
    sink: Arc<dyn AuditSink>,
}

impl CrashReporter {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    /// Sends `report` and returns the incident id attached to it.
    pub fn report(&self, report: &CrashReport) -> Uuid {
        let incident_id = Uuid::new_v4();
        warn!(%incident_id, component = %report.component_trace, "Component failure reported");
        self.sink.emit(
            EVENT_UI_CRASH,
            json!({
                "incidentId": incident_id.to_string(),
                "errorMessage": report.error_message,
                "stackTrace": report.stack_trace,
                "componentTrace": report.component_trace,
            }),
        );
        incident_id
    }

    /// Runs `component`, reporting an error or panic and returning `fallback()` in its place.
    ///
    /// A panic's stack trace is recorded by a process-wide panic hook (installed
    /// on first use, chained to the existing one) before the stack unwinds, so
    /// it names the panicking frames. A returned error has no such frames; its
    /// trace is captured at this call and is empty unless `RUST_BACKTRACE` is set.
    ///
    /// # Example
    ///
    /// ```
    /// use nis2_shield::telemetry::{AuditSink, CrashReporter};
    /// use serde_json::Value;
    /// use std::sync::Arc;
    ///
    /// struct Discard;
    /// impl AuditSink for Discard {
    ///     fn emit(&self, _event_type: &str, _payload: Value) {}
    /// }
    ///
    /// let reporter = CrashReporter::new(Arc::new(Discard));
    /// let view = reporter.guard(
    ///     "Dashboard > Chart",
    ///     || Err::<String, _>("division by zero"),
    ///     || "Something went wrong".to_string(),
    /// );
    /// assert_eq!(view, "Something went wrong");
    /// ```
    pub fn guard<T, E, F, G>(&self, component: &str, component_fn: F, fallback: G) -> T
    where
        F: FnOnce() -> Result<T, E> + UnwindSafe,
        E: Display,
        G: FnOnce() -> T,
    {
        install_panic_hook();
        let was_guarding = GUARDING.with(|guarding| guarding.replace(true));
        let outcome = panic::catch_unwind(component_fn);
        GUARDING.with(|guarding| guarding.set(was_guarding));
        let panic_trace = PANIC_TRACE.with(|slot| slot.borrow_mut().take());

        let (error_message, stack_trace) = match outcome {
            Ok(Ok(value)) => return value,
            Ok(Err(e)) => (e.to_string(), Backtrace::capture().to_string()),
            Err(panic_payload) => (
                panic_message(panic_payload.as_ref()),
                panic_trace.unwrap_or_else(|| Backtrace::capture().to_string()),
            ),
        };

        self.report(&CrashReport {
            error_message,
            stack_trace,
            component_trace: component.to_string(),
        });
        fallback()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "component panicked".to_string()
    }
}
