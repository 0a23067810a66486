//! Session state machine.
//!
//! Every change to [`TimerState`] is a [`Command`] fed through the single
//! [`transition`] function. A command that is not valid for the current
//! status is rejected and leaves the state untouched.
//!
//! ```text
//!            start             tick (0 left)
//!   Idle ──────────▶ Active ────────────────▶ Expired
//!    ▲               │   ▲                       │
//!    │         pause │   │ resume                │ complete
//!    │               ▼   │                       │
//!    │              Paused                       │
//!    └───────────────────────────────────────────┘
//!          (next kind, full duration, not started)
//! ```

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::reconcile;
use crate::types::{SessionKind, SessionRecord, TimerState, TimerStatus};

// ============================================================================
// Command
// ============================================================================

/// Operations accepted by the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Start the current session, optionally with a new task label
    Start {
        /// Task label; `None` keeps the previously set task
        task: Option<String>,
    },
    /// Pause the running countdown
    Pause,
    /// Resume a paused countdown
    Resume,
    /// One second passed
    Tick,
    /// Record the current session and move to the next kind
    Complete,
    /// Back to defaults, keeping the history
    Reset,
    /// Change the task label
    SetTask {
        /// New task label
        task: String,
    },
    /// Replace the state with a restored snapshot (never running)
    Restore {
        /// Snapshot to apply
        state: TimerState,
    },
}

impl Command {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Start { .. } => "start",
            Command::Pause => "pause",
            Command::Resume => "resume",
            Command::Tick => "tick",
            Command::Complete => "complete",
            Command::Reset => "reset",
            Command::SetTask { .. } => "set_task",
            Command::Restore { .. } => "restore",
        }
    }
}

// ============================================================================
// Rejection
// ============================================================================

/// Reasons a command is not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    /// `start` while the countdown runs
    #[error("タイマーは既に実行中です")]
    AlreadyRunning,

    /// `pause` or `tick` while nothing runs
    #[error("タイマーは実行されていません")]
    NotRunning,

    /// `resume` without a paused session
    #[error("タイマーは一時停止していません")]
    NotPaused,

    /// `start` while a session is paused part-way
    #[error("一時停止中のセッションがあります。再開するかリセットしてください")]
    SessionInProgress,

    /// `start` after the countdown reached zero
    #[error("セッションは終了しています。完了してから次を開始してください")]
    SessionExpired,

    /// `start` without any task label
    #[error("タスク名を指定してください")]
    MissingTask,
}

// ============================================================================
// Transition
// ============================================================================

/// Applies `command` to `state` at wall-clock time `now`.
///
/// Returns the next state, or the reason the command was rejected.
///
/// # Errors
///
/// Returns a [`Rejection`] when the command is not valid for the current
/// status. The input state is never modified.
pub fn transition(
    state: &TimerState,
    command: Command,
    now: DateTime<Utc>,
) -> Result<TimerState, Rejection> {
    let mut next = state.clone();

    match command {
        Command::Start { task } => start(&mut next, task, now)?,
        Command::Pause => pause(&mut next, now)?,
        Command::Resume => resume(&mut next, now)?,
        Command::Tick => tick(&mut next, now)?,
        Command::Complete => {
            complete(&mut next, now);
        }
        Command::Reset => next.reset_keeping_history(),
        Command::SetTask { task } => next.current_task = task,
        Command::Restore { state } => restore(&mut next, state),
    }

    Ok(next)
}

fn start(state: &mut TimerState, task: Option<String>, now: DateTime<Utc>) -> Result<(), Rejection> {
    match state.status() {
        TimerStatus::Idle => {}
        TimerStatus::Active => return Err(Rejection::AlreadyRunning),
        TimerStatus::Paused => return Err(Rejection::SessionInProgress),
        TimerStatus::Expired => return Err(Rejection::SessionExpired),
    }

    let task = task
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());
    match task {
        Some(task) => state.current_task = task,
        None if state.current_task.trim().is_empty() => return Err(Rejection::MissingTask),
        None => {}
    }

    state.active_task = Some(state.current_task.clone());
    state.time_left = state.duration_secs();
    state.running = true;
    state.started_at = Some(now);
    Ok(())
}

fn pause(state: &mut TimerState, now: DateTime<Utc>) -> Result<(), Rejection> {
    if !state.running {
        return Err(Rejection::NotRunning);
    }

    if let Some(anchor) = state.started_at {
        state.time_left =
            reconcile::reconcile_running(state.current_session, state.time_left, anchor, now);
    }
    state.running = false;
    state.started_at = None;
    Ok(())
}

fn resume(state: &mut TimerState, now: DateTime<Utc>) -> Result<(), Rejection> {
    match state.status() {
        TimerStatus::Paused => {}
        TimerStatus::Active => return Err(Rejection::AlreadyRunning),
        TimerStatus::Idle | TimerStatus::Expired => return Err(Rejection::NotPaused),
    }

    state.running = true;
    state.started_at = Some(reconcile::resume_anchor(
        state.current_session,
        state.time_left,
        now,
    ));
    Ok(())
}

fn tick(state: &mut TimerState, now: DateTime<Utc>) -> Result<(), Rejection> {
    if !state.running {
        return Err(Rejection::NotRunning);
    }

    let mut time_left = state.time_left.saturating_sub(1);
    if let Some(anchor) = state.started_at {
        time_left = reconcile::reconcile_running(state.current_session, time_left, anchor, now);
    }
    state.time_left = time_left;

    if time_left == 0 {
        state.running = false;
        state.started_at = None;
    }
    Ok(())
}

/// Records the current session and lands idle on the next kind.
///
/// Returns the kind that follows.
pub(crate) fn complete(state: &mut TimerState, now: DateTime<Utc>) -> SessionKind {
    let finished = state.current_session;
    let task = state
        .active_task
        .take()
        .unwrap_or_else(|| state.current_task.clone());

    let record = SessionRecord {
        id: state.next_session_id(),
        task,
        completed_at: now,
        kind: finished,
    };
    state.sessions.push(record);

    if finished == SessionKind::Work {
        state.completed_work_count = state.completed_work_count.saturating_add(1);
    }

    let next = finished.next(state.completed_work_count);
    state.current_session = next;
    state.time_left = next.duration_secs();
    state.running = false;
    state.started_at = None;
    next
}

fn restore(state: &mut TimerState, snapshot: TimerState) {
    *state = snapshot;
    state.running = false;
    state.started_at = None;
    state.clamp_time_left();
}

// ============================================================================
// Tests
// ============================================================================
