//! Daemon module for the study timer.
//!
//! This module contains the core daemon functionality:
//! - `machine`: session state machine (commands and transitions)
//! - `reconcile`: wall-clock elapsed-time math
//! - `clock`: wall-clock abstraction
//! - `snapshot` / `storage`: persisted state format and stores
//! - `restore`: startup restore classification
//! - `timer`: timer engine owning the live state
//! - `ipc`: Unix socket server
//!
//! [`run_daemon`] wires them together.

pub mod clock;
pub mod ipc;
pub mod machine;
pub mod reconcile;
pub mod restore;
pub mod snapshot;
pub mod storage;
pub mod timer;

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::sound::{self, Alarm, SoundSource, EMBEDDED_CHIME_NAME};

pub use clock::{Clock, ManualClock, SystemClock};
pub use ipc::{IpcServer, RequestHandler};
pub use machine::{Command, Rejection};
pub use restore::{RestoreDecision, RestoreOffer};
pub use storage::{FileStorage, MemoryStorage, SnapshotStorage, StorageError};
pub use timer::{run_ticks, EngineError, TimerEngine, TimerEvent};

// ============================================================================
// Constants
// ============================================================================

/// Environment variable overriding the data directory
pub const DATA_DIR_ENV: &str = "STUDY_TIMER_HOME";

/// Data directory name under the home directory
pub const DATA_DIR_NAME: &str = ".study-timer";

/// Snapshot file name
pub const STATE_FILE: &str = "state.json";

/// Socket file name
pub const SOCKET_FILE: &str = "study-timer.sock";

// ============================================================================
// DaemonConfig
// ============================================================================

/// Runtime configuration of the daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonConfig {
    /// Directory holding the snapshot, the socket and an optional alarm file
    pub data_dir: PathBuf,
    /// Snapshot file
    pub state_path: PathBuf,
    /// Unix socket
    pub socket_path: PathBuf,
    /// Whether the alarm plays when a session finishes
    pub sound_enabled: bool,
    /// Alarm file given on the command line
    pub alarm_path: Option<PathBuf>,
}

impl DaemonConfig {
    /// Configuration for the data directory taken from the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if neither `STUDY_TIMER_HOME` nor a home directory
    /// is available.
    pub fn from_env() -> Result<Self> {
        Ok(Self::with_data_dir(resolve_data_dir()?))
    }

    /// Configuration rooted at `data_dir`, with sound enabled.
    #[must_use]
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            state_path: data_dir.join(STATE_FILE),
            socket_path: data_dir.join(SOCKET_FILE),
            data_dir,
            sound_enabled: true,
            alarm_path: None,
        }
    }

    /// Enables or disables the alarm.
    #[must_use]
    pub fn with_sound(mut self, enabled: bool) -> Self {
        self.sound_enabled = enabled;
        self
    }

    /// Sets the alarm file.
    #[must_use]
    pub fn with_alarm_path(mut self, path: Option<PathBuf>) -> Self {
        self.alarm_path = path;
        self
    }
}

/// Returns the data directory: `$STUDY_TIMER_HOME`, else `~/.study-timer`.
///
/// # Errors
///
/// Returns an error if neither is available.
pub fn resolve_data_dir() -> Result<PathBuf> {
    data_dir_from(std::env::var_os(DATA_DIR_ENV), dirs::home_dir())
        .context("ホームディレクトリが見つかりません。STUDY_TIMER_HOME を設定してください")
}

/// Returns the socket path of the daemon for the current environment.
///
/// # Errors
///
/// Returns an error if the data directory cannot be resolved.
pub fn default_socket_path() -> Result<PathBuf> {
    Ok(resolve_data_dir()?.join(SOCKET_FILE))
}

fn data_dir_from(env_value: Option<OsString>, home: Option<PathBuf>) -> Option<PathBuf> {
    match env_value {
        Some(value) if !value.is_empty() => Some(PathBuf::from(value)),
        _ => home.map(|home| home.join(DATA_DIR_NAME)),
    }
}

// ============================================================================
// run_daemon
// ============================================================================

/// Runs the daemon until Ctrl-C.
///
/// Restores the saved state (opening a restore prompt if needed), then serves
/// IPC requests while the ticker drives the countdown.
///
/// # Errors
///
/// Returns an error if the data directory or the socket cannot be set up.
pub async fn run_daemon(config: DaemonConfig) -> Result<()> {
    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("Failed to create data directory: {:?}", config.data_dir))?;

    let storage = Arc::new(FileStorage::new(&config.state_path));
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (tick_tx, tick_rx) = mpsc::unbounded_channel();

    let mut engine = TimerEngine::new(storage, Arc::new(SystemClock), event_tx, tick_tx);
    if let Some(alarm) = build_alarm(&config) {
        engine = engine.with_alarm(alarm);
    }
    if engine.restore_on_startup().is_some() {
        info!("Restore prompt open; answer it with `study-timer restore continue|fresh`");
    }
    let engine = Arc::new(Mutex::new(engine));

    let server = IpcServer::new(&config.socket_path)?;
    info!("Daemon listening on {}", server.socket_path().display());

    let ticks = tokio::spawn(run_ticks(engine.clone(), tick_rx));
    let events = tokio::spawn(log_events(event_rx));
    let handler = RequestHandler::new(engine);

    tokio::select! {
        () = server.serve(handler) => {}
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl-C")?;
            info!("Shutting down");
        }
    }

    ticks.abort();
    events.abort();
    Ok(())
}

/// Builds the alarm for `config`, or `None` when sound is off or unavailable.
///
/// An unusable `--alarm` file falls back to the embedded chime.
pub fn build_alarm(config: &DaemonConfig) -> Option<Alarm> {
    if !config.sound_enabled {
        debug!("Alarm disabled by configuration");
        return None;
    }

    let source = resolve_alarm_source(config.alarm_path.as_deref(), &config.data_dir);
    let player = sound::try_create_player(false)?;
    info!("Alarm: {}", source.name());
    Some(Alarm::new(player, source))
}

fn resolve_alarm_source(explicit: Option<&Path>, data_dir: &Path) -> SoundSource {
    sound::resolve_alarm(explicit, data_dir).unwrap_or_else(|e| {
        warn!("{} ({})", e, e.suggestion());
        SoundSource::embedded(EMBEDDED_CHIME_NAME)
    })
}

async fn log_events(mut events: mpsc::UnboundedReceiver<TimerEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            TimerEvent::Tick { remaining_seconds } => debug!("tick: {}s left", remaining_seconds),
            TimerEvent::Started { session, task } => {
                info!("{} session started: {}", session.as_str(), task)
            }
            TimerEvent::SessionCompleted { record, next } => info!(
                "{} session #{} completed ({}), next: {}",
                record.kind.as_str(),
                record.id,
                record.task,
                next.as_str()
            ),
            other => info!("{:?}", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_dir_prefers_env() {
        let dir = data_dir_from(
            Some(OsString::from("/srv/timer")),
            Some(PathBuf::from("/home/kim")),
        );
        assert_eq!(dir, Some(PathBuf::from("/srv/timer")));
    }

    #[test]
    fn test_data_dir_falls_back_to_home() {
        let dir = data_dir_from(None, Some(PathBuf::from("/home/kim")));
        assert_eq!(dir, Some(PathBuf::from("/home/kim/.study-timer")));

        let dir = data_dir_from(Some(OsString::new()), Some(PathBuf::from("/home/kim")));
        assert_eq!(dir, Some(PathBuf::from("/home/kim/.study-timer")));
    }

    #[test]
    fn test_data_dir_unavailable() {
        assert_eq!(data_dir_from(None, None), None);
    }

    #[test]
    fn test_config_paths() {
        let config = DaemonConfig::with_data_dir("/tmp/st");

        assert_eq!(config.state_path, PathBuf::from("/tmp/st/state.json"));
        assert_eq!(config.socket_path, PathBuf::from("/tmp/st/study-timer.sock"));
        assert!(config.sound_enabled);
        assert_eq!(config.alarm_path, None);
    }

    #[test]
    fn test_config_builders() {
        let config = DaemonConfig::with_data_dir("/tmp/st")
            .with_sound(false)
            .with_alarm_path(Some(PathBuf::from("/tmp/bell.wav")));

        assert!(!config.sound_enabled);
        assert_eq!(config.alarm_path, Some(PathBuf::from("/tmp/bell.wav")));
    }

    #[test]
    fn test_build_alarm_disabled() {
        let config = DaemonConfig::with_data_dir("/tmp/st").with_sound(false);
        assert!(build_alarm(&config).is_none());
    }

    #[test]
    fn test_unusable_alarm_falls_back_to_chime() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.wav");

        let source = resolve_alarm_source(Some(&missing), dir.path());
        assert_eq!(source, SoundSource::embedded(EMBEDDED_CHIME_NAME));
    }
}
