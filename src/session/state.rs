//! The idle/activity state machine.
//!
//! Everything here is synchronous and takes the current instant as an
//! argument, so the transition rules can be exercised without a runtime.
//! [`super::SessionGuardian`] feeds it from real signals and a timer.

use crate::constants::MAX_IDLE_TIMEOUT_MINUTES;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tokio::time::Instant;

/// Longest idle timeout a machine will arm.
pub const MAX_TIMEOUT: Duration = Duration::from_secs(MAX_IDLE_TIMEOUT_MINUTES * 60);

/// Limits `timeout` to [`MAX_TIMEOUT`].
pub fn clamp_timeout(timeout: Duration) -> Duration {
    timeout.min(MAX_TIMEOUT)
}

fn deadline_after(at: Instant, timeout: Duration) -> Option<Instant> {
    at.checked_add(timeout)
}

/// Whether the session is currently in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Activity was seen within the idle timeout.
    Active,
    /// The idle timeout elapsed without qualifying activity.
    Idle,
}

/// Read-only snapshot of the guardian's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionState {
    /// `true` once the idle timeout has elapsed without activity.
    pub is_idle: bool,
    /// When the last processed (non-debounced) activity happened.
    pub last_active_at: Instant,
}

/// User interactions that count as activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivityKind {
    PointerDown,
    PointerMove,
    KeyDown,
    Scroll,
    TouchStart,
}

impl ActivityKind {
    /// Every qualifying activity source.
    pub const ALL: [ActivityKind; 5] = [
        ActivityKind::PointerDown,
        ActivityKind::PointerMove,
        ActivityKind::KeyDown,
        ActivityKind::Scroll,
        ActivityKind::TouchStart,
    ];

    /// The DOM-style event name for this activity.
    pub fn as_str(self) -> &'static str {
        match self {
            ActivityKind::PointerDown => "pointerdown",
            ActivityKind::PointerMove => "pointermove",
            ActivityKind::KeyDown => "keydown",
            ActivityKind::Scroll => "scroll",
            ActivityKind::TouchStart => "touchstart",
        }
    }
}

/// Page visibility as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Hidden,
    Visible,
}

/// An input to the guardian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// A qualifying user interaction.
    Activity(ActivityKind),
    /// The page moved to the background or back to the foreground.
    Visibility(Visibility),
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Activity(kind) => f.write_str(kind.as_str()),
            Signal::Visibility(Visibility::Hidden) => f.write_str("hidden"),
            Signal::Visibility(Visibility::Visible) => f.write_str("visible"),
        }
    }
}

impl FromStr for Signal {
    type Err = String;

    /// Parses DOM event names, accepting the mouse aliases of pointer events.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let signal = match s.trim().to_ascii_lowercase().as_str() {
            "pointerdown" | "mousedown" => Signal::Activity(ActivityKind::PointerDown),
            "pointermove" | "mousemove" => Signal::Activity(ActivityKind::PointerMove),
            "keydown" | "keypress" => Signal::Activity(ActivityKind::KeyDown),
            "scroll" => Signal::Activity(ActivityKind::Scroll),
            "touchstart" => Signal::Activity(ActivityKind::TouchStart),
            "hidden" => Signal::Visibility(Visibility::Hidden),
            "visible" => Signal::Visibility(Visibility::Visible),
            other => return Err(format!("unknown signal '{}'", other)),
        };
        Ok(signal)
    }
}

/// A change of [`SessionPhase`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    BecameIdle,
    BecameActive,
}

/// What a signal did to the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalOutcome {
    /// Arrived within the debounce window of the last processed activity.
    Debounced,
    /// Noted without affecting the countdown (the page was hidden).
    Recorded,
    /// Restarted the countdown while already active.
    Rearmed,
    /// Ended an idle period.
    Resumed,
}

impl SignalOutcome {
    /// The transition this outcome produced, if any.
    pub fn transition(self) -> Option<Transition> {
        match self {
            SignalOutcome::Resumed => Some(Transition::BecameActive),
            _ => None,
        }
    }
}

/// Active/idle state machine with a single rearmable deadline.
///
/// While active there is exactly one deadline; reaching it moves the machine
/// to idle and clears it. The next qualifying activity moves it back to active
/// and arms a new deadline.
#[derive(Debug, Clone)]
pub struct IdleStateMachine {
    phase: SessionPhase,
    last_active_at: Instant,
    last_processed: Option<Instant>,
    deadline: Option<Instant>,
    timeout: Duration,
    debounce: Duration,
    visible: bool,
}

impl IdleStateMachine {
    /// Starts active at `now` with the countdown armed.
    ///
    /// Timeouts longer than [`MAX_TIMEOUT`] are clamped.
    pub fn new(now: Instant, timeout: Duration, debounce: Duration) -> Self {
        let timeout = clamp_timeout(timeout);
        Self {
            phase: SessionPhase::Active,
            last_active_at: now,
            last_processed: None,
            deadline: deadline_after(now, timeout),
            timeout,
            debounce,
            visible: true,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn state(&self) -> SessionState {
        SessionState {
            is_idle: self.phase == SessionPhase::Idle,
            last_active_at: self.last_active_at,
        }
    }

    /// When the machine will go idle absent further activity. `None` while idle.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Applies a signal received at `at`.
    ///
    /// Hiding the page is recorded but leaves the countdown running; showing it
    /// again counts as activity.
    pub fn handle(&mut self, signal: Signal, at: Instant) -> SignalOutcome {
        match signal {
            Signal::Activity(_) => self.record_activity(at),
            Signal::Visibility(Visibility::Hidden) => {
                self.visible = false;
                SignalOutcome::Recorded
            }
            Signal::Visibility(Visibility::Visible) => {
                self.visible = true;
                self.record_activity(at)
            }
        }
    }

    fn record_activity(&mut self, at: Instant) -> SignalOutcome {
        if let Some(last) = self.last_processed {
            if at.saturating_duration_since(last) < self.debounce {
                return SignalOutcome::Debounced;
            }
        }

        self.last_processed = Some(at);
        self.last_active_at = at;
        self.deadline = deadline_after(at, self.timeout);

        match self.phase {
            SessionPhase::Active => SignalOutcome::Rearmed,
            SessionPhase::Idle => {
                self.phase = SessionPhase::Active;
                SignalOutcome::Resumed
            }
        }
    }

    /// Goes idle if the deadline has passed by `now`.
    pub fn expire(&mut self, now: Instant) -> Option<Transition> {
        match (self.phase, self.deadline) {
            (SessionPhase::Active, Some(deadline)) if now >= deadline => {
                self.phase = SessionPhase::Idle;
                self.deadline = None;
                Some(Transition::BecameIdle)
            }
            _ => None,
        }
    }

    /// Marks the session active at `at` regardless of debounce, rearming the countdown.
    pub fn force_active(&mut self, at: Instant) -> Option<Transition> {
        self.last_processed = Some(at);
        self.last_active_at = at;
        self.deadline = deadline_after(at, self.timeout);

        match self.phase {
            SessionPhase::Active => None,
            SessionPhase::Idle => {
                self.phase = SessionPhase::Active;
                Some(Transition::BecameActive)
            }
        }
    }

    /// Replaces the timeout, clamped to [`MAX_TIMEOUT`]. An active countdown
    /// restarts from `now` with the new value.
    pub fn set_timeout(&mut self, timeout: Duration, now: Instant) {
        self.timeout = clamp_timeout(timeout);
        if self.phase == SessionPhase::Active {
            self.deadline = deadline_after(now, self.timeout);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE: Duration = Duration::from_secs(60);
    const SECOND: Duration = Duration::from_secs(1);

    fn machine(t0: Instant) -> IdleStateMachine {
        IdleStateMachine::new(t0, MINUTE, SECOND)
    }

    #[test]
    fn test_starts_active_with_deadline_armed() {
        let t0 = Instant::now();
        let m = machine(t0);

        assert_eq!(m.phase(), SessionPhase::Active);
        assert!(!m.state().is_idle);
        assert_eq!(m.deadline(), Some(t0 + MINUTE));
    }

    #[test]
    fn test_expires_only_after_deadline() {
        let t0 = Instant::now();
        let mut m = machine(t0);

        assert_eq!(m.expire(t0 + Duration::from_millis(59_999)), None);
        assert_eq!(m.expire(t0 + MINUTE), Some(Transition::BecameIdle));
        assert!(m.state().is_idle);
        assert_eq!(m.deadline(), None);

        // Idle is not re-announced.
        assert_eq!(m.expire(t0 + 5 * MINUTE), None);
    }

    #[test]
    fn test_activity_pushes_deadline_forward() {
        let t0 = Instant::now();
        let mut m = machine(t0);

        let at = t0 + 30 * SECOND;
        assert_eq!(
            m.handle(Signal::Activity(ActivityKind::KeyDown), at),
            SignalOutcome::Rearmed
        );
        assert_eq!(m.deadline(), Some(t0 + 90 * SECOND));
        assert_eq!(m.expire(t0 + MINUTE), None);
        assert_eq!(m.expire(t0 + 90 * SECOND), Some(Transition::BecameIdle));
    }

    #[test]
    fn test_debounce_ignores_rapid_signals() {
        let t0 = Instant::now();
        let mut m = machine(t0);
        m.expire(t0 + MINUTE);

        let first = t0 + 2 * MINUTE;
        assert_eq!(
            m.handle(Signal::Activity(ActivityKind::PointerMove), first),
            SignalOutcome::Resumed
        );
        assert_eq!(
            m.handle(
                Signal::Activity(ActivityKind::PointerMove),
                first + Duration::from_millis(400)
            ),
            SignalOutcome::Debounced
        );
        assert_eq!(m.deadline(), Some(first + MINUTE));
        assert_eq!(m.state().last_active_at, first);

        assert_eq!(
            m.handle(Signal::Activity(ActivityKind::Scroll), first + SECOND),
            SignalOutcome::Rearmed
        );
    }

    #[test]
    fn test_hidden_does_not_touch_countdown() {
        let t0 = Instant::now();
        let mut m = machine(t0);

        assert_eq!(
            m.handle(Signal::Visibility(Visibility::Hidden), t0 + 10 * SECOND),
            SignalOutcome::Recorded
        );
        assert!(!m.is_visible());
        assert_eq!(m.deadline(), Some(t0 + MINUTE));
        assert_eq!(m.state().last_active_at, t0);
    }

    #[test]
    fn test_visible_counts_as_activity() {
        let t0 = Instant::now();
        let mut m = machine(t0);
        m.handle(Signal::Visibility(Visibility::Hidden), t0);
        m.expire(t0 + MINUTE);

        let restored = t0 + 90 * SECOND;
        let outcome = m.handle(Signal::Visibility(Visibility::Visible), restored);

        assert_eq!(outcome, SignalOutcome::Resumed);
        assert_eq!(outcome.transition(), Some(Transition::BecameActive));
        assert!(m.is_visible());
        assert_eq!(m.state().last_active_at, restored);
    }

    #[test]
    fn test_force_active_bypasses_debounce() {
        let t0 = Instant::now();
        let mut m = machine(t0);
        m.handle(Signal::Activity(ActivityKind::KeyDown), t0);
        m.expire(t0 + MINUTE);

        // Within the debounce window of nothing relevant, but force_active never debounces.
        let at = t0 + MINUTE;
        assert_eq!(m.force_active(at), Some(Transition::BecameActive));
        assert_eq!(m.force_active(at), None);
        assert_eq!(m.deadline(), Some(at + MINUTE));
    }

    #[test]
    fn test_set_timeout_reschedules_from_now() {
        let t0 = Instant::now();
        let mut m = machine(t0);

        let now = t0 + 20 * SECOND;
        m.set_timeout(5 * MINUTE, now);
        assert_eq!(m.timeout(), 5 * MINUTE);
        assert_eq!(m.deadline(), Some(now + 5 * MINUTE));
    }

    #[test]
    fn test_set_timeout_while_idle_waits_for_activity() {
        let t0 = Instant::now();
        let mut m = machine(t0);
        m.expire(t0 + MINUTE);

        m.set_timeout(2 * MINUTE, t0 + MINUTE);
        assert_eq!(m.deadline(), None);

        let at = t0 + 3 * MINUTE;
        m.handle(Signal::Activity(ActivityKind::TouchStart), at);
        assert_eq!(m.deadline(), Some(at + 2 * MINUTE));
    }

    #[test]
    fn test_oversized_timeouts_are_clamped() {
        let t0 = Instant::now();
        let mut m = IdleStateMachine::new(t0, Duration::MAX, SECOND);
        assert_eq!(m.timeout(), MAX_TIMEOUT);
        assert_eq!(m.deadline(), Some(t0 + MAX_TIMEOUT));

        let now = t0 + SECOND;
        m.set_timeout(Duration::from_secs(u64::MAX), now);
        assert_eq!(m.timeout(), MAX_TIMEOUT);
        assert_eq!(m.deadline(), Some(now + MAX_TIMEOUT));

        m.handle(Signal::Activity(ActivityKind::KeyDown), now + MINUTE);
        assert_eq!(m.deadline(), Some(now + MINUTE + MAX_TIMEOUT));
    }

    #[test]
    fn test_signal_parsing() {
        assert_eq!(
            "mousedown".parse::<Signal>(),
            Ok(Signal::Activity(ActivityKind::PointerDown))
        );
        assert_eq!(
            " KeyDown ".parse::<Signal>(),
            Ok(Signal::Activity(ActivityKind::KeyDown))
        );
        assert_eq!(
            "hidden".parse::<Signal>(),
            Ok(Signal::Visibility(Visibility::Hidden))
        );
        assert!("resize".parse::<Signal>().is_err());

        for kind in ActivityKind::ALL {
            let signal = Signal::Activity(kind);
            assert_eq!(signal.to_string().parse::<Signal>(), Ok(signal));
        }
    }
}
