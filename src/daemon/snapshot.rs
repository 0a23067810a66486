//! Persisted snapshot format.
//!
//! A snapshot is the full [`TimerState`] as one JSON object with a `version`
//! tag next to the state fields:
//!
//! ```json
//! {"version":1,"running":true,"timeLeft":1432,"currentSession":"work",
//!  "completedWorkCount":2,"currentTask":"Essay","sessions":[...],
//!  "startedAt":1767261600000}
//! ```
//!
//! Reading is defensive: missing fields take their defaults, a missing
//! version is read as version 1, and values that break the state invariants
//! are repaired rather than trusted.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::TimerState;

/// Version written by this build.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Errors while decoding a snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The text is not a valid snapshot object
    #[error("スナップショットの解析に失敗しました: {0}")]
    Parse(#[from] serde_json::Error),

    /// Written by a newer build
    #[error("未対応のスナップショットバージョンです: {0}")]
    UnsupportedVersion(u32),
}

#[derive(Serialize)]
struct SnapshotOut<'a> {
    version: u32,
    #[serde(flatten)]
    state: &'a TimerState,
}

#[derive(Deserialize)]
struct SnapshotIn {
    #[serde(default = "unversioned")]
    version: u32,
    #[serde(flatten)]
    state: TimerState,
}

fn unversioned() -> u32 {
    SNAPSHOT_VERSION
}

/// Serializes `state` for storage.
///
/// A stopped timer carries no meaningful anchor, so `startedAt` is written as
/// null whenever `running` is false.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode(state: &TimerState) -> Result<String, SnapshotError> {
    if state.running {
        return Ok(serde_json::to_string(&SnapshotOut {
            version: SNAPSHOT_VERSION,
            state,
        })?);
    }

    let stopped = TimerState {
        started_at: None,
        ..state.clone()
    };
    Ok(serde_json::to_string(&SnapshotOut {
        version: SNAPSHOT_VERSION,
        state: &stopped,
    })?)
}

/// Parses a stored snapshot.
///
/// # Errors
///
/// Returns an error if the text cannot be parsed or was written by a newer
/// snapshot version.
pub fn decode(raw: &str) -> Result<TimerState, SnapshotError> {
    let snapshot: SnapshotIn = serde_json::from_str(raw)?;
    if snapshot.version > SNAPSHOT_VERSION {
        return Err(SnapshotError::UnsupportedVersion(snapshot.version));
    }

    let mut state = snapshot.state;
    state.clamp_time_left();
    if state.running && state.started_at.is_none() {
        state.running = false;
    }
    if !state.running {
        state.started_at = None;
    }
    Ok(state)
}
