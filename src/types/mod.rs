//! Core data types for the study timer.
//!
//! This module defines the data structures used for:
//! - Session kinds and their fixed durations
//! - Completed session records (the append-only history)
//! - The mutable timer state and its derived status
//! - IPC request/response serialization

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Constants
// ============================================================================

/// Length of a work session in seconds (25 minutes).
pub const WORK_SECONDS: u32 = 25 * 60;

/// Length of a short break in seconds (5 minutes).
pub const SHORT_BREAK_SECONDS: u32 = 5 * 60;

/// Length of a long break in seconds (30 minutes).
pub const LONG_BREAK_SECONDS: u32 = 30 * 60;

/// Every n-th completed work session is followed by a long break.
pub const LONG_BREAK_INTERVAL: u32 = 4;

// ============================================================================
// SessionKind
// ============================================================================

/// The kind of interval the timer is counting down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionKind {
    /// Focused work
    Work,
    /// Rest after a work session
    ShortBreak,
    /// Rest after every fourth work session
    LongBreak,
}

impl SessionKind {
    /// Returns the wire representation of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionKind::Work => "work",
            SessionKind::ShortBreak => "shortBreak",
            SessionKind::LongBreak => "longBreak",
        }
    }

    /// Returns the full duration of this kind in seconds.
    pub fn duration_secs(&self) -> u32 {
        match self {
            SessionKind::Work => WORK_SECONDS,
            SessionKind::ShortBreak => SHORT_BREAK_SECONDS,
            SessionKind::LongBreak => LONG_BREAK_SECONDS,
        }
    }

    /// Returns true for short and long breaks.
    pub fn is_break(&self) -> bool {
        !matches!(self, SessionKind::Work)
    }

    /// Chooses the kind that follows this one.
    ///
    /// `completed_work_count` is the count *after* the just-finished session
    /// was accounted for, so the 4th, 8th, 12th... work sessions lead to a
    /// long break. Any break is followed by work.
    pub fn next(&self, completed_work_count: u32) -> SessionKind {
        match self {
            SessionKind::Work if completed_work_count % LONG_BREAK_INTERVAL == 0 => {
                SessionKind::LongBreak
            }
            SessionKind::Work => SessionKind::ShortBreak,
            SessionKind::ShortBreak | SessionKind::LongBreak => SessionKind::Work,
        }
    }
}

impl Default for SessionKind {
    fn default() -> Self {
        SessionKind::Work
    }
}

// ============================================================================
// SessionRecord
// ============================================================================

/// A finished session. Never modified after it is appended to the history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    /// Unique identifier, one greater than the previous record's
    pub id: u64,
    /// Task label at completion time (may be empty)
    pub task: String,
    /// When the session was completed
    pub completed_at: DateTime<Utc>,
    /// Kind of the completed session
    #[serde(rename = "type")]
    pub kind: SessionKind,
}

impl SessionRecord {
    /// Returns true if the record was completed on `day` in the time zone `tz`.
    pub fn completed_on<Tz: TimeZone>(&self, day: NaiveDate, tz: &Tz) -> bool {
        self.completed_at.with_timezone(tz).date_naive() == day
    }
}

// ============================================================================
// TimerStatus
// ============================================================================

/// Status derived from the timer state. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerStatus {
    /// Not running, full duration left
    Idle,
    /// Counting down
    Active,
    /// Not running, partially elapsed
    Paused,
    /// Reached zero, waiting for the session to be completed
    Expired,
}

impl TimerStatus {
    /// Returns the string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerStatus::Idle => "idle",
            TimerStatus::Active => "active",
            TimerStatus::Paused => "paused",
            TimerStatus::Expired => "expired",
        }
    }
}

// ============================================================================
// TimerState
// ============================================================================

/// The mutable timer aggregate.
///
/// Field names follow the persisted snapshot layout. Missing fields fall back
/// to their defaults when a snapshot is read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimerState {
    /// Whether the countdown is running
    pub running: bool,
    /// Seconds remaining in the current session
    pub time_left: u32,
    /// Kind of the current session
    pub current_session: SessionKind,
    /// Number of completed work sessions
    pub completed_work_count: u32,
    /// Label for the in-progress session
    pub current_task: String,
    /// Completed sessions in chronological order
    pub sessions: Vec<SessionRecord>,
    /// Anchor of the current run (`None` unless running)
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub started_at: Option<DateTime<Utc>>,
    /// Task captured when the current session was started
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_task: Option<String>,
}

impl Default for TimerState {
    fn default() -> Self {
        Self {
            running: false,
            time_left: WORK_SECONDS,
            current_session: SessionKind::Work,
            completed_work_count: 0,
            current_task: String::new(),
            sessions: Vec::new(),
            started_at: None,
            active_task: None,
        }
    }
}

impl TimerState {
    /// Creates a timer state with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Full duration of the current session in seconds.
    pub fn duration_secs(&self) -> u32 {
        self.current_session.duration_secs()
    }

    /// Derives the state-machine status.
    pub fn status(&self) -> TimerStatus {
        if self.running {
            TimerStatus::Active
        } else if self.time_left == 0 {
            TimerStatus::Expired
        } else if self.time_left >= self.duration_secs() {
            TimerStatus::Idle
        } else {
            TimerStatus::Paused
        }
    }

    /// Returns true if the timer is counting down.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Returns true if the countdown reached zero and awaits completion.
    pub fn is_expired(&self) -> bool {
        self.status() == TimerStatus::Expired
    }

    /// Returns true if the state carries anything worth offering to restore.
    ///
    /// Compares against the default work duration regardless of the current
    /// kind, so an idle break also counts as progress.
    pub fn has_progress(&self) -> bool {
        self.time_left != WORK_SECONDS
            || self.completed_work_count > 0
            || !self.sessions.is_empty()
    }

    /// Identifier for the next completed session record.
    ///
    /// Saturates at `u64::MAX`, so a stored history ending there repeats the
    /// last id instead of overflowing.
    pub fn next_session_id(&self) -> u64 {
        self.sessions
            .last()
            .map_or(1, |record| record.id.saturating_add(1))
    }

    /// Restores defaults while keeping the completed session history.
    pub fn reset_keeping_history(&mut self) {
        let sessions = std::mem::take(&mut self.sessions);
        *self = Self {
            sessions,
            ..Self::default()
        };
    }

    /// Forces `time_left` back into `0..=duration`.
    pub fn clamp_time_left(&mut self) {
        self.time_left = self.time_left.min(self.duration_secs());
    }
}

// ============================================================================
// Restore Types
// ============================================================================

/// How a pending restore prompt is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum RestoreChoice {
    /// Apply the saved state without restarting the countdown
    #[serde(rename = "continue")]
    #[value(name = "continue")]
    Continue,
    /// Discard the saved state and start from defaults
    #[serde(rename = "fresh")]
    #[value(name = "fresh")]
    StartFresh,
}

/// Why a saved state is offered for restoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestoreReason {
    /// The countdown was running when the daemon went away
    WasRunning,
    /// The timer was stopped but had progress or history
    HasProgress,
}

/// Summary of a pending restore prompt, as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestorePreview {
    /// Why the prompt is shown
    pub reason: RestoreReason,
    /// Session kind that would be restored
    pub session: SessionKind,
    /// Seconds left after reconciliation
    pub remaining_seconds: u32,
    /// Completed work sessions in the saved state
    pub completed_work_count: u32,
    /// Saved task label
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_name: Option<String>,
    /// Seconds that passed since the saved run began (running snapshots only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_seconds: Option<u32>,
}

// ============================================================================
// IPC Types
// ============================================================================

/// IPC request from client to daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "lowercase")]
pub enum IpcRequest {
    /// Start the current session
    Start {
        /// Task label (falls back to the previously set task)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        task: Option<String>,
    },
    /// Pause the running countdown
    Pause,
    /// Resume a paused countdown
    Resume,
    /// Reset to defaults, keeping history
    Reset,
    /// Change the task label
    Task {
        /// New task label
        task: String,
    },
    /// Complete (or skip) the current session
    Complete,
    /// Query the current status
    Status,
    /// Query the completed session history
    History,
    /// Resolve a pending restore prompt
    Restore {
        /// Chosen resolution
        choice: RestoreChoice,
    },
}

/// Response data for IPC responses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseData {
    /// Current status ("idle", "active", ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// Current session kind
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionKind>,
    /// Remaining seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_seconds: Option<u32>,
    /// Full duration of the current session
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_seconds: Option<u32>,
    /// Completed work session count
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_work_count: Option<u32>,
    /// Current task label (omitted when empty)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_name: Option<String>,
    /// Completed session history (history requests only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sessions: Option<Vec<SessionRecord>>,
    /// Restore prompt waiting for an answer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_restore: Option<RestorePreview>,
}

impl ResponseData {
    /// Creates response data from timer state.
    pub fn from_timer_state(state: &TimerState) -> Self {
        Self {
            state: Some(state.status().as_str().to_string()),
            session: Some(state.current_session),
            remaining_seconds: Some(state.time_left),
            total_seconds: Some(state.duration_secs()),
            completed_work_count: Some(state.completed_work_count),
            task_name: (!state.current_task.is_empty()).then(|| state.current_task.clone()),
            sessions: None,
            pending_restore: None,
        }
    }

    /// Attaches the completed session history.
    pub fn with_sessions(mut self, sessions: Vec<SessionRecord>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    /// Attaches a pending restore prompt.
    pub fn with_pending_restore(mut self, preview: Option<RestorePreview>) -> Self {
        self.pending_restore = preview;
        self
    }

    /// Returns true while the timer has nothing to show: not counting down,
    /// a full work session left and no completed work.
    pub fn is_pristine(&self) -> bool {
        self.state.as_deref() != Some("active")
            && self.remaining_seconds == Some(WORK_SECONDS)
            && self.completed_work_count.unwrap_or(0) == 0
    }
}

/// IPC response from daemon to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpcResponse {
    /// Response status ("success" or "error")
    pub status: String,
    /// Human-readable message
    pub message: String,
    /// Optional response data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ResponseData>,
}

impl IpcResponse {
    /// Creates a success response.
    pub fn success(message: impl Into<String>, data: Option<ResponseData>) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
            data,
        }
    }

    /// Creates an error response.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            data: None,
        }
    }

    /// Returns true for error responses.
    pub fn is_error(&self) -> bool {
        self.status == "error"
    }
}

// ============================================================================
// Tests
// ============================================================================
