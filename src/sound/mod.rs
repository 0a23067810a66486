//! Alarm playback for finished sessions.
//!
//! Playback is best effort: a missing device, a broken file or a build
//! without the `audio` feature only costs the sound, never the completion.
//!
//! ```text
//! ┌──────────────┐  ring()   ┌──────────────────┐   channel   ┌──────────────┐
//! │ TimerEngine  │──────────▶│      Alarm       │────────────▶│ audio thread │
//! └──────────────┘           │ player + source  │             │   (rodio)    │
//!                            └──────────────────┘             └──────────────┘
//! ```
//!
//! The real player lives behind the `audio` cargo feature because it links
//! against the system audio libraries.

mod embedded;
mod error;
#[cfg(feature = "audio")]
mod player;
mod source;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

pub use embedded::embedded_chime;
pub use error::SoundError;
#[cfg(feature = "audio")]
pub use player::{try_create_player, RodioSoundPlayer};
pub use source::{find_alarm_in, resolve_alarm, SoundSource, EMBEDDED_CHIME_NAME};

/// Sound playback implementations.
pub trait SoundPlayer: Send + Sync {
    /// Starts playing `source` without waiting for it to finish.
    ///
    /// # Errors
    ///
    /// Returns an error if playback cannot be started.
    fn play(&self, source: &SoundSource) -> Result<(), SoundError>;

    /// Returns true if sound playback is disabled.
    fn is_disabled(&self) -> bool;
}

/// Without the `audio` feature there is no device to open.
#[cfg(not(feature = "audio"))]
#[must_use]
pub fn try_create_player(_disabled: bool) -> Option<Arc<dyn SoundPlayer>> {
    debug!("Built without the audio feature, alarm sound disabled");
    None
}

// ============================================================================
// Alarm
// ============================================================================

/// The chosen alarm sound bound to a player.
#[derive(Clone)]
pub struct Alarm {
    player: Arc<dyn SoundPlayer>,
    source: SoundSource,
}

impl Alarm {
    /// Binds `source` to `player`.
    #[must_use]
    pub fn new(player: Arc<dyn SoundPlayer>, source: SoundSource) -> Self {
        Self { player, source }
    }

    /// Returns the alarm source.
    #[must_use]
    pub fn source(&self) -> &SoundSource {
        &self.source
    }

    /// Plays the alarm, logging instead of failing.
    ///
    /// Returns true if playback was started.
    pub fn ring(&self) -> bool {
        if self.player.is_disabled() {
            debug!("Alarm muted");
            return false;
        }

        match self.player.play(&self.source) {
            Ok(()) => {
                debug!("Alarm '{}' started", self.source.name());
                true
            }
            Err(e) => {
                warn!("Alarm playback failed: {}", e);
                false
            }
        }
    }
}

impl std::fmt::Debug for Alarm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Alarm")
            .field("source", &self.source)
            .field("disabled", &self.player.is_disabled())
            .finish()
    }
}

// ============================================================================
// MockSoundPlayer
// ============================================================================

/// Sound player that records calls, for tests.
#[derive(Debug)]
pub struct MockSoundPlayer {
    play_calls: Mutex<Vec<SoundSource>>,
    disabled: AtomicBool,
    should_fail: AtomicBool,
}

impl Default for MockSoundPlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSoundPlayer {
    /// Creates an enabled mock.
    #[must_use]
    pub fn new() -> Self {
        Self {
            play_calls: Mutex::new(Vec::new()),
            disabled: AtomicBool::new(false),
            should_fail: AtomicBool::new(false),
        }
    }

    /// Sets what `is_disabled` reports.
    pub fn set_disabled(&self, disabled: bool) {
        self.disabled.store(disabled, Ordering::SeqCst);
    }

    /// Makes every following `play` fail.
    pub fn set_should_fail(&self, should_fail: bool) {
        self.should_fail.store(should_fail, Ordering::SeqCst);
    }

    /// Number of recorded plays.
    #[must_use]
    pub fn play_count(&self) -> usize {
        self.calls().len()
    }

    /// Sources played so far.
    #[must_use]
    pub fn get_play_calls(&self) -> Vec<SoundSource> {
        self.calls().clone()
    }

    fn calls(&self) -> std::sync::MutexGuard<'_, Vec<SoundSource>> {
        self.play_calls.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SoundPlayer for MockSoundPlayer {
    fn play(&self, source: &SoundSource) -> Result<(), SoundError> {
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(SoundError::PlaybackError("Mock failure".to_string()));
        }
        if self.disabled.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.calls().push(source.clone());
        Ok(())
    }

    fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chime() -> SoundSource {
        SoundSource::embedded(EMBEDDED_CHIME_NAME)
    }

    #[test]
    fn test_alarm_ring_plays_source() {
        let mock = Arc::new(MockSoundPlayer::new());
        let alarm = Alarm::new(mock.clone(), chime());

        assert!(alarm.ring());
        assert_eq!(mock.get_play_calls(), vec![chime()]);
    }

    #[test]
    fn test_alarm_ring_swallows_failure() {
        let mock = Arc::new(MockSoundPlayer::new());
        mock.set_should_fail(true);
        let alarm = Alarm::new(mock.clone(), chime());

        assert!(!alarm.ring());
        assert_eq!(mock.play_count(), 0);
    }

    #[test]
    fn test_alarm_ring_muted() {
        let mock = Arc::new(MockSoundPlayer::new());
        mock.set_disabled(true);
        let alarm = Alarm::new(mock.clone(), chime());

        assert!(!alarm.ring());
        assert_eq!(mock.play_count(), 0);

        mock.set_disabled(false);
        assert!(alarm.ring());
    }

    #[test]
    fn test_alarm_debug() {
        let alarm = Alarm::new(Arc::new(MockSoundPlayer::new()), chime());
        let debug_str = format!("{:?}", alarm);
        assert!(debug_str.contains("chime"));
    }

    #[cfg(not(feature = "audio"))]
    #[test]
    fn test_try_create_player_without_audio_feature() {
        assert!(try_create_player(false).is_none());
    }
}
