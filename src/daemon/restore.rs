//! Restore protocol run when the daemon starts.
//!
//! The persisted snapshot is classified into one of four outcomes. A running
//! countdown is never resumed automatically: if time is left, the user is
//! offered the reconciled state and has to start or resume it explicitly.
//!
//! | Snapshot                          | Outcome                        |
//! |-----------------------------------|--------------------------------|
//! | absent / unreadable / malformed   | `NoSnapshot` (defaults)        |
//! | running, time left after catch-up | `Offer` (`WasRunning`)         |
//! | running, ran out while away       | `CompletedWhileAway`           |
//! | stopped with progress or history  | `Offer` (`HasProgress`)        |
//! | stopped at defaults               | `Clean` (defaults)             |

use chrono::{DateTime, Utc};
use tracing::debug;

use super::machine;
use super::reconcile;
use super::snapshot;
use super::storage::SnapshotStorage;
use crate::types::{RestorePreview, RestoreReason, SessionRecord, TimerState};

// ============================================================================
// RestoreOffer
// ============================================================================

/// A saved state waiting for the user's Continue / Start Fresh answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreOffer {
    /// State applied on Continue (never running)
    pub state: TimerState,
    /// Why it is offered
    pub reason: RestoreReason,
    /// Seconds since the saved run began, for running snapshots
    pub elapsed_secs: Option<u32>,
}

impl RestoreOffer {
    /// Summary shown by the restore prompt.
    pub fn preview(&self) -> RestorePreview {
        RestorePreview {
            reason: self.reason,
            session: self.state.current_session,
            remaining_seconds: self.state.time_left,
            completed_work_count: self.state.completed_work_count,
            task_name: (!self.state.current_task.is_empty())
                .then(|| self.state.current_task.clone()),
            elapsed_seconds: self.elapsed_secs,
        }
    }
}

// ============================================================================
// RestoreDecision
// ============================================================================

/// Outcome of classifying the persisted snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreDecision {
    /// Nothing usable was stored
    NoSnapshot,
    /// The stored state equals the defaults
    Clean,
    /// Ask the user whether to continue
    Offer(RestoreOffer),
    /// The saved session ran out while the daemon was down and was recorded
    CompletedWhileAway {
        /// State after the retroactive completion
        state: TimerState,
        /// The record appended for the finished session
        record: SessionRecord,
    },
}

/// Reads the snapshot from `storage` and classifies it.
///
/// Read failures are treated like a missing snapshot.
pub fn load(storage: &dyn SnapshotStorage, now: DateTime<Utc>) -> RestoreDecision {
    match storage.load() {
        Ok(raw) => classify(raw.as_deref(), now),
        Err(e) => {
            debug!("Ignoring unreadable snapshot: {}", e);
            RestoreDecision::NoSnapshot
        }
    }
}

/// Classifies raw snapshot text at wall-clock time `now`.
pub fn classify(raw: Option<&str>, now: DateTime<Utc>) -> RestoreDecision {
    let Some(raw) = raw else {
        return RestoreDecision::NoSnapshot;
    };

    match snapshot::decode(raw) {
        Ok(saved) => classify_state(saved, now),
        Err(e) => {
            debug!("Ignoring malformed snapshot: {}", e);
            RestoreDecision::NoSnapshot
        }
    }
}

fn classify_state(saved: TimerState, now: DateTime<Utc>) -> RestoreDecision {
    if let (true, Some(anchor)) = (saved.running, saved.started_at) {
        let kind = saved.current_session;
        let elapsed = reconcile::elapsed_secs(anchor, now);
        let remaining = reconcile::reconcile_running(kind, saved.time_left, anchor, now);

        if remaining == 0 {
            return complete_while_away(saved, anchor, now);
        }

        return RestoreDecision::Offer(RestoreOffer {
            state: TimerState {
                running: false,
                started_at: None,
                time_left: remaining,
                ..saved
            },
            reason: RestoreReason::WasRunning,
            elapsed_secs: Some(elapsed),
        });
    }

    if saved.has_progress() {
        return RestoreDecision::Offer(RestoreOffer {
            state: saved,
            reason: RestoreReason::HasProgress,
            elapsed_secs: None,
        });
    }

    RestoreDecision::Clean
}

fn complete_while_away(
    mut state: TimerState,
    anchor: DateTime<Utc>,
    now: DateTime<Utc>,
) -> RestoreDecision {
    let finished_at = reconcile::expiry_instant(state.current_session, anchor).min(now);

    state.running = false;
    state.started_at = None;
    state.time_left = 0;
    machine::complete(&mut state, finished_at);

    match state.sessions.last().cloned() {
        Some(record) => RestoreDecision::CompletedWhileAway { state, record },
        None => RestoreDecision::Clean,
    }
}
