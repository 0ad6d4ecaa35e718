//! Async driver for the idle/activity state machine.
//!
//! A running guardian is one tokio task that owns an [`IdleStateMachine`],
//! reads commands from an unbounded channel, and sleeps until the machine's
//! single deadline. Signals are stamped when they are sent, so debounce and
//! rearm decisions use arrival time rather than processing time.

use super::state::{
    clamp_timeout, ActivityKind, IdleStateMachine, SessionState, Signal, SignalOutcome,
    Transition, Visibility,
};
use crate::constants::{DEFAULT_DEBOUNCE_MS, DEFAULT_IDLE_TIMEOUT_MINUTES};
use crate::errors::{AppResult, GuardianError};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

/// Timing parameters of a guardian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardianSettings {
    /// Inactivity after which the session goes idle.
    pub timeout: Duration,
    /// Minimum spacing between processed activity signals.
    pub debounce: Duration,
}

impl Default for GuardianSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_IDLE_TIMEOUT_MINUTES * 60),
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
        }
    }
}

/// A transition, the instant it took effect and the idle timeout in force then.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionEvent {
    pub transition: Transition,
    pub at: Instant,
    pub timeout: Duration,
}

type Listener = Arc<dyn Fn(TransitionEvent) + Send + Sync>;
type Listeners = Arc<RwLock<Vec<Listener>>>;

#[derive(Debug)]
enum Command {
    Signal(Signal, Instant),
    ForceActive(Instant),
    SetTimeout(Duration, Instant),
    Stop,
}

struct Running {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<SessionState>,
    task: JoinHandle<()>,
}

/// Tracks whether a session is active or idle.
///
/// # Example
///
/// ```no_run
/// use nis2_shield::session::{ActivityKind, GuardianSettings, SessionGuardian, Transition};
/// use std::time::Duration;
///
/// # async fn run() -> nis2_shield::AppResult<()> {
/// let mut guardian = SessionGuardian::new(GuardianSettings {
///     timeout: Duration::from_secs(15 * 60),
///     ..GuardianSettings::default()
/// });
/// guardian.on_transition(|event| {
///     if event.transition == Transition::BecameIdle {
///         println!("session idle, logging out");
///     }
/// });
/// guardian.start()?;
/// guardian.activity(ActivityKind::KeyDown);
/// guardian.stop().await;
/// # Ok(())
/// # }
/// ```
pub struct SessionGuardian {
    settings: GuardianSettings,
    listeners: Listeners,
    running: Option<Running>,
}

impl SessionGuardian {
    /// Creates a stopped guardian. A timeout longer than
    /// [`super::state::MAX_TIMEOUT`] is clamped.
    pub fn new(settings: GuardianSettings) -> Self {
        Self {
            settings: GuardianSettings {
                timeout: clamp_timeout(settings.timeout),
                ..settings
            },
            listeners: Arc::new(RwLock::new(Vec::new())),
            running: None,
        }
    }

    pub fn settings(&self) -> GuardianSettings {
        self.settings
    }

    /// Registers a callback invoked once per transition.
    ///
    /// Callbacks run on the guardian task and should return quickly. They may be
    /// added before or after `start`.
    pub fn on_transition<F>(&self, callback: F)
    where
        F: Fn(TransitionEvent) + Send + Sync + 'static,
    {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(callback));
    }

    /// Starts tracking from now, in the active state.
    ///
    /// # Errors
    ///
    /// Returns `GuardianError::AlreadyRunning` if called twice without `stop`,
    /// or `GuardianError::NoRuntime` outside a tokio runtime.
    pub fn start(&mut self) -> AppResult<()> {
        if self.running.is_some() {
            return Err(GuardianError::AlreadyRunning.into());
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| GuardianError::NoRuntime(e.to_string()))?;

        let machine =
            IdleStateMachine::new(Instant::now(), self.settings.timeout, self.settings.debounce);
        let (state_tx, state_rx) = watch::channel(machine.state());
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let listeners = Arc::clone(&self.listeners);

        let task = runtime.spawn(run(machine, command_rx, state_tx, listeners));

        info!(
            timeout_secs = self.settings.timeout.as_secs(),
            debounce_ms = self.settings.debounce.as_millis() as u64,
            "Session guardian started"
        );
        self.running = Some(Running {
            commands: command_tx,
            state: state_rx,
            task,
        });
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Feeds a signal to the guardian. Ignored when not running.
    pub fn signal(&self, signal: Signal) {
        self.send(Command::Signal(signal, Instant::now()));
    }

    pub fn activity(&self, kind: ActivityKind) {
        self.signal(Signal::Activity(kind));
    }

    pub fn visibility(&self, visibility: Visibility) {
        self.signal(Signal::Visibility(visibility));
    }

    /// Requests an immediate transition to active, rearming the countdown.
    pub fn force_active(&self) {
        self.send(Command::ForceActive(Instant::now()));
    }

    /// Changes the idle timeout, clamped to [`super::state::MAX_TIMEOUT`]. A
    /// running, active guardian restarts its countdown from now with the new value.
    pub fn set_timeout(&mut self, timeout: Duration) {
        let timeout = clamp_timeout(timeout);
        self.settings.timeout = timeout;
        self.send(Command::SetTimeout(timeout, Instant::now()));
    }

    /// Latest state published by the guardian task, or `None` when not running.
    pub fn state(&self) -> Option<SessionState> {
        self.running.as_ref().map(|running| *running.state.borrow())
    }

    /// Cancels the countdown and detaches all inputs.
    ///
    /// Once this returns, no further transitions are delivered. Calling it on a
    /// stopped guardian does nothing.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };
        let _ = running.commands.send(Command::Stop);
        drop(running.commands);
        if let Err(e) = running.task.await {
            warn!("Session guardian task ended abnormally: {}", e);
        }
        info!("Session guardian stopped");
    }

    fn send(&self, command: Command) {
        if let Some(running) = &self.running {
            if running.commands.send(command).is_err() {
                debug!("Session guardian task is gone; dropping command");
            }
        }
    }
}

impl Drop for SessionGuardian {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            running.task.abort();
        }
    }
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn run(
    mut machine: IdleStateMachine,
    mut commands: mpsc::UnboundedReceiver<Command>,
    state: watch::Sender<SessionState>,
    listeners: Listeners,
) {
    loop {
        let deadline = machine.deadline();
        let event = tokio::select! {
            biased;
            command = commands.recv() => match command {
                Some(Command::Signal(signal, at)) => {
                    let outcome = machine.handle(signal, at);
                    match outcome {
                        SignalOutcome::Debounced => {}
                        SignalOutcome::Recorded => debug!(%signal, "Page hidden; idle countdown keeps running"),
                        SignalOutcome::Rearmed | SignalOutcome::Resumed => {
                            debug!(%signal, "Activity rearmed idle countdown")
                        }
                    }
                    outcome.transition().map(|transition| (transition, at))
                }
                Some(Command::ForceActive(at)) => {
                    debug!("Forced active");
                    machine.force_active(at).map(|transition| (transition, at))
                }
                Some(Command::SetTimeout(timeout, at)) => {
                    debug!(timeout_secs = timeout.as_secs(), "Idle timeout reconfigured");
                    machine.set_timeout(timeout, at);
                    None
                }
                Some(Command::Stop) | None => break,
            },
            _ = wait_for(deadline) => {
                let now = Instant::now();
                machine.expire(now).map(|transition| (transition, now))
            }
        };

        state.send_replace(machine.state());

        if let Some((transition, at)) = event {
            let event = TransitionEvent {
                transition,
                at,
                timeout: machine.timeout(),
            };
            match event.transition {
                Transition::BecameIdle => info!(
                    timeout_secs = machine.timeout().as_secs(),
                    "Session became idle"
                ),
                Transition::BecameActive => info!("Session became active"),
            }
            notify(&listeners, event);
        }
    }
}

fn notify(listeners: &Listeners, event: TransitionEvent) {
    let snapshot: Vec<Listener> = listeners
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();
    for listener in snapshot {
        listener(event);
    }
}
