//! Session idle detection.
//!
//! This module tracks whether a session is active or idle from a stream of
//! user-interaction and page-visibility signals.
//!
//! # Module Structure
//!
//! - `state`: The pure active/idle state machine and its signal types
//! - `guardian`: The tokio task that drives the machine with a rearmable timer
//!
//! Hiding the page does not pause the idle clock. An application that wants
//! backgrounded time to be excluded has to stop the guardian on `hidden` and
//! start it again on `visible`.

pub mod guardian;
pub mod state;

// Re-export commonly used types
pub use self::guardian::{GuardianSettings, SessionGuardian, TransitionEvent};
pub use self::state::{
    clamp_timeout, ActivityKind, IdleStateMachine, SessionPhase, SessionState, Signal,
    SignalOutcome, Transition, Visibility, MAX_TIMEOUT,
};
