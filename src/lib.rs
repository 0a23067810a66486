//! Study Timer Library
//!
//! This library provides the core functionality for the study timer CLI.
//! It includes:
//! - Session state machine and timer engine (work / short break / long break)
//! - Snapshot persistence and restore with elapsed-time reconciliation
//! - IPC server/client for daemon-CLI communication
//! - CLI command parsing, display utilities and the watch indicator
//! - Best-effort alarm playback when a session finishes

pub mod cli;
pub mod daemon;
pub mod sound;
pub mod types;

// Re-export commonly used types for convenience
pub use types::{
    IpcRequest, IpcResponse, ResponseData, RestoreChoice, RestorePreview, RestoreReason,
    SessionKind, SessionRecord, TimerState, TimerStatus,
};

// Re-export engine types
pub use daemon::{
    run_daemon, Clock, Command, DaemonConfig, EngineError, FileStorage, ManualClock,
    MemoryStorage, Rejection, SnapshotStorage, SystemClock, TimerEngine, TimerEvent,
};

// Re-export sound types
pub use sound::{Alarm, MockSoundPlayer, SoundError, SoundPlayer, SoundSource};
