//! Timer engine: the single owner of the live timer state.
//!
//! This module provides:
//! - Command dispatch through the state machine
//! - The one-second ticker (a cancellable tokio task)
//! - Persistence of every applied transition
//! - Change notification via `watch` and engine events via `mpsc`
//! - Alarm and automatic completion when a session runs out
//! - The pending restore prompt and its two resolutions

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::clock::Clock;
use super::machine::{self, Command, Rejection};
use super::restore::{self, RestoreDecision, RestoreOffer};
use super::snapshot;
use super::storage::SnapshotStorage;
use crate::sound::Alarm;
use crate::types::{RestoreChoice, RestorePreview, SessionKind, SessionRecord, TimerState};

/// Interval between ticks.
const TICK_INTERVAL: Duration = Duration::from_secs(1);

// ============================================================================
// TimerEvent
// ============================================================================

/// Engine events for logging and external integrations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerEvent {
    /// A session started
    Started {
        /// Kind of the started session
        session: SessionKind,
        /// Task recorded when it completes
        task: String,
    },
    /// The countdown was paused
    Paused {
        /// Seconds left at the pause
        remaining_seconds: u32,
    },
    /// The countdown was resumed
    Resumed {
        /// Seconds left at the resume
        remaining_seconds: u32,
    },
    /// One second elapsed
    Tick {
        /// Seconds left
        remaining_seconds: u32,
    },
    /// The countdown reached zero
    Expired {
        /// Kind of the session that ran out
        session: SessionKind,
    },
    /// A session was recorded
    SessionCompleted {
        /// The appended record
        record: SessionRecord,
        /// Kind of the session that follows
        next: SessionKind,
    },
    /// Back to defaults
    Reset,
    /// The task label changed
    TaskChanged {
        /// New label
        task: String,
    },
    /// A saved state is waiting for the user's answer
    RestoreOffered {
        /// What the prompt shows
        preview: RestorePreview,
    },
    /// The restore prompt was answered
    Restored {
        /// The answer
        choice: RestoreChoice,
    },
    /// A saved session ran out while the daemon was down
    CompletedWhileAway {
        /// The record appended for it
        record: SessionRecord,
    },
}

// ============================================================================
// EngineError
// ============================================================================

/// Reasons an engine operation is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The state machine rejected the command
    #[error(transparent)]
    Rejected(#[from] Rejection),

    /// A restore prompt has to be answered first
    #[error("前回のタイマー状態が残っています。`restore continue` または `restore fresh` を実行してください")]
    RestorePending,

    /// `restore` was called without a pending prompt
    #[error("復元待ちのタイマー状態はありません")]
    NoPendingRestore,

    /// A command only the ticker or the restore protocol may apply
    #[error("この操作は直接実行できません: {0}")]
    InternalCommand(&'static str),
}

// ============================================================================
// Ticker
// ============================================================================

/// Owns the task that sends one tick per second while the timer runs.
///
/// Every schedule or cancel bumps the generation. Ticks carry the generation
/// they were sent under, and only the current one is accepted.
#[derive(Debug)]
struct Ticker {
    tick_tx: mpsc::UnboundedSender<u64>,
    handle: Option<JoinHandle<()>>,
    generation: u64,
}

impl Ticker {
    fn new(tick_tx: mpsc::UnboundedSender<u64>) -> Self {
        Self {
            tick_tx,
            handle: None,
            generation: 0,
        }
    }

    fn is_active(&self) -> bool {
        self.handle.is_some()
    }

    fn accepts(&self, generation: u64) -> bool {
        self.is_active() && generation == self.generation
    }

    fn schedule(&mut self) {
        self.cancel();

        let generation = self.generation;
        let tick_tx = self.tick_tx.clone();
        self.handle = Some(tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + TICK_INTERVAL, TICK_INTERVAL);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                interval.tick().await;
                if tick_tx.send(generation).is_err() {
                    break;
                }
            }
        }));
        debug!("Ticker scheduled (generation {})", generation);
    }

    fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            debug!("Ticker cancelled (generation {})", self.generation);
        }
        self.generation += 1;
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

// ============================================================================
// TimerEngine
// ============================================================================

/// Timer engine that owns the timer state and its side effects.
pub struct TimerEngine {
    /// Current timer state
    state: TimerState,
    /// Snapshot store written after every applied transition
    storage: Arc<dyn SnapshotStorage>,
    /// Wall clock
    clock: Arc<dyn Clock>,
    /// Alarm played when a session runs out
    alarm: Option<Alarm>,
    /// Latest state for subscribers
    state_tx: watch::Sender<TimerState>,
    /// Event sender channel
    event_tx: mpsc::UnboundedSender<TimerEvent>,
    /// One-second ticker
    ticker: Ticker,
    /// Saved state waiting for Continue / Start Fresh
    pending_restore: Option<RestoreOffer>,
}

impl TimerEngine {
    /// Creates an engine with default state.
    ///
    /// Ticks are sent to `tick_tx`; feed the receiving end to [`run_ticks`].
    pub fn new(
        storage: Arc<dyn SnapshotStorage>,
        clock: Arc<dyn Clock>,
        event_tx: mpsc::UnboundedSender<TimerEvent>,
        tick_tx: mpsc::UnboundedSender<u64>,
    ) -> Self {
        let state = TimerState::new();
        let (state_tx, _) = watch::channel(state.clone());

        Self {
            state,
            storage,
            clock,
            alarm: None,
            state_tx,
            event_tx,
            ticker: Ticker::new(tick_tx),
            pending_restore: None,
        }
    }

    /// Sets the alarm played when a session runs out.
    #[must_use]
    pub fn with_alarm(mut self, alarm: Alarm) -> Self {
        self.alarm = Some(alarm);
        self
    }

    // ------------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------------

    /// Applies a user command.
    ///
    /// `Tick` and `Restore` are refused with `EngineError::InternalCommand`;
    /// they go through [`handle_tick`](Self::handle_tick) and the restore
    /// protocol only.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::RestorePending` while a restore prompt is open,
    /// or the state machine's rejection. The state is unchanged on error.
    pub(crate) fn dispatch(&mut self, command: Command) -> Result<&TimerState, EngineError> {
        if matches!(command, Command::Tick | Command::Restore { .. }) {
            debug!("{} refused: internal command", command.name());
            return Err(EngineError::InternalCommand(command.name()));
        }
        if self.pending_restore.is_some() {
            debug!("{} refused: restore prompt pending", command.name());
            return Err(EngineError::RestorePending);
        }

        self.apply(command)?;
        Ok(&self.state)
    }

    /// Starts the current session.
    ///
    /// # Errors
    ///
    /// Returns an error unless the timer is idle and a task is available.
    pub fn start(&mut self, task: Option<String>) -> Result<&TimerState, EngineError> {
        self.dispatch(Command::Start { task })
    }

    /// Pauses the running countdown.
    ///
    /// # Errors
    ///
    /// Returns an error if the timer is not running.
    pub fn pause(&mut self) -> Result<&TimerState, EngineError> {
        self.dispatch(Command::Pause)
    }

    /// Resumes a paused countdown.
    ///
    /// # Errors
    ///
    /// Returns an error if the timer is not paused.
    pub fn resume(&mut self) -> Result<&TimerState, EngineError> {
        self.dispatch(Command::Resume)
    }

    /// Resets to defaults, keeping the history.
    ///
    /// # Errors
    ///
    /// Returns an error while a restore prompt is pending.
    pub fn reset(&mut self) -> Result<&TimerState, EngineError> {
        self.dispatch(Command::Reset)
    }

    /// Changes the task label.
    ///
    /// # Errors
    ///
    /// Returns an error while a restore prompt is pending.
    pub fn set_task(&mut self, task: impl Into<String>) -> Result<&TimerState, EngineError> {
        self.dispatch(Command::SetTask { task: task.into() })
    }

    /// Records the current session now and moves to the next kind.
    ///
    /// # Errors
    ///
    /// Returns an error while a restore prompt is pending.
    pub fn complete_session(&mut self) -> Result<&TimerState, EngineError> {
        self.dispatch(Command::Complete)
    }

    /// Applies a tick sent under `generation`. Stale ticks are dropped.
    pub fn handle_tick(&mut self, generation: u64) {
        if !self.ticker.accepts(generation) {
            debug!(
                "Dropping stale tick (generation {}, current {})",
                generation, self.ticker.generation
            );
            return;
        }

        if let Err(e) = self.apply(Command::Tick) {
            debug!("Tick ignored: {}", e);
        }
    }

    // ------------------------------------------------------------------------
    // Restore
    // ------------------------------------------------------------------------

    /// Classifies the stored snapshot and applies the outcome.
    ///
    /// Returns the prompt preview when the user has to decide.
    pub fn restore_on_startup(&mut self) -> Option<RestorePreview> {
        let decision = restore::load(self.storage.as_ref(), self.clock.now());
        self.apply_restore_decision(decision)
    }

    /// Applies a restore classification.
    ///
    /// Returns the prompt preview when the user has to decide.
    pub fn apply_restore_decision(&mut self, decision: RestoreDecision) -> Option<RestorePreview> {
        match decision {
            RestoreDecision::NoSnapshot => {
                debug!("No saved state, starting with defaults");
                None
            }
            RestoreDecision::Clean => {
                debug!("Saved state is clean, nothing to restore");
                None
            }
            RestoreDecision::Offer(offer) => {
                let preview = offer.preview();
                info!(
                    "Saved state found ({:?}, {}s left), waiting for restore choice",
                    preview.reason, preview.remaining_seconds
                );
                self.pending_restore = Some(offer);
                self.emit(TimerEvent::RestoreOffered {
                    preview: preview.clone(),
                });
                Some(preview)
            }
            RestoreDecision::CompletedWhileAway { state, record } => {
                info!(
                    "Saved {} session ran out while the daemon was down, recorded it",
                    record.kind.as_str()
                );
                if let Err(e) = self.apply(Command::Restore { state }) {
                    warn!("Failed to apply completed session: {}", e);
                }
                self.emit(TimerEvent::CompletedWhileAway { record });
                None
            }
        }
    }

    /// Returns the open restore prompt, if any.
    #[must_use]
    pub fn pending_restore(&self) -> Option<RestorePreview> {
        self.pending_restore.as_ref().map(RestoreOffer::preview)
    }

    /// Answers the restore prompt.
    ///
    /// Continue applies the offered state without restarting the countdown.
    /// Start Fresh resets and erases the stored snapshot.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::NoPendingRestore` if no prompt is open.
    pub fn resolve_restore(&mut self, choice: RestoreChoice) -> Result<&TimerState, EngineError> {
        let offer = self
            .pending_restore
            .take()
            .ok_or(EngineError::NoPendingRestore)?;

        match choice {
            RestoreChoice::Continue => {
                self.apply(Command::Restore { state: offer.state })?;
            }
            RestoreChoice::StartFresh => {
                self.apply(Command::Reset)?;
                if let Err(e) = self.storage.clear() {
                    warn!("Failed to erase saved state: {}", e);
                }
            }
        }

        info!("Restore prompt answered: {:?}", choice);
        self.emit(TimerEvent::Restored { choice });
        Ok(&self.state)
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    /// Returns a reference to the current timer state.
    pub fn state(&self) -> &TimerState {
        &self.state
    }

    /// Returns a receiver notified after every applied transition.
    pub fn subscribe(&self) -> watch::Receiver<TimerState> {
        self.state_tx.subscribe()
    }

    /// Returns true while a ticker task is scheduled.
    pub fn is_ticking(&self) -> bool {
        self.ticker.is_active()
    }

    /// Generation carried by the ticks currently accepted.
    pub fn tick_generation(&self) -> u64 {
        self.ticker.generation
    }

    /// Returns a mutable reference to the timer state (for testing).
    #[cfg(test)]
    pub(crate) fn state_mut(&mut self) -> &mut TimerState {
        &mut self.state
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn apply(&mut self, command: Command) -> Result<(), EngineError> {
        let now = self.clock.now();
        let name = command.name();
        let was_running = self.state.running;

        let next = machine::transition(&self.state, command.clone(), now).map_err(|r| {
            debug!("{} rejected: {}", name, r);
            r
        })?;
        self.state = next;

        self.sync_ticker(was_running);
        self.persist();
        self.state_tx.send_replace(self.state.clone());
        if let Some(event) = self.event_for(&command) {
            self.emit(event);
        }

        if was_running && self.state.is_expired() {
            self.on_expired()?;
        }
        Ok(())
    }

    fn on_expired(&mut self) -> Result<(), EngineError> {
        let session = self.state.current_session;
        info!("{} session finished", session.as_str());
        self.emit(TimerEvent::Expired { session });

        if let Some(alarm) = &self.alarm {
            alarm.ring();
        }

        self.apply(Command::Complete)
    }

    fn sync_ticker(&mut self, was_running: bool) {
        match (was_running, self.state.running) {
            (false, true) => self.ticker.schedule(),
            (true, false) => self.ticker.cancel(),
            _ => {}
        }
    }

    fn persist(&self) {
        let encoded = match snapshot::encode(&self.state) {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!("Failed to encode timer state: {}", e);
                return;
            }
        };

        if let Err(e) = self.storage.save(&encoded) {
            warn!("Failed to persist timer state: {}", e);
        }
    }

    fn event_for(&self, command: &Command) -> Option<TimerEvent> {
        let state = &self.state;
        match command {
            Command::Start { .. } => Some(TimerEvent::Started {
                session: state.current_session,
                task: state.active_task.clone().unwrap_or_default(),
            }),
            Command::Pause => Some(TimerEvent::Paused {
                remaining_seconds: state.time_left,
            }),
            Command::Resume => Some(TimerEvent::Resumed {
                remaining_seconds: state.time_left,
            }),
            Command::Tick => Some(TimerEvent::Tick {
                remaining_seconds: state.time_left,
            }),
            Command::Complete => state.sessions.last().map(|record| {
                TimerEvent::SessionCompleted {
                    record: record.clone(),
                    next: state.current_session,
                }
            }),
            Command::Reset => Some(TimerEvent::Reset),
            Command::SetTask { task } => Some(TimerEvent::TaskChanged { task: task.clone() }),
            Command::Restore { .. } => None,
        }
    }

    fn emit(&self, event: TimerEvent) {
        if self.event_tx.send(event).is_err() {
            debug!("No event listener");
        }
    }
}

/// Feeds ticks from the engine's ticker back into the engine.
///
/// Runs until every tick sender is gone; spawn it next to the engine.
pub async fn run_ticks(engine: Arc<Mutex<TimerEngine>>, mut ticks: mpsc::UnboundedReceiver<u64>) {
    while let Some(generation) = ticks.recv().await {
        engine.lock().await.handle_tick(generation);
    }
}

// ============================================================================
// Tests
// ============================================================================
