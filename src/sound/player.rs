//! Alarm player backed by rodio.
//!
//! rodio's output stream must stay on the thread that opened it, so the
//! player owns a dedicated audio thread and hands it sources over a channel.
//! Sinks are detached, which keeps playback non-blocking.

use std::fs::File;
use std::io::{BufReader, Cursor};
use std::sync::{mpsc, Arc};
use std::thread;

use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
use tracing::{debug, warn};

use super::embedded::embedded_chime;
use super::error::SoundError;
use super::source::SoundSource;
use super::SoundPlayer;

/// Sound player that plays on a background audio thread.
pub struct RodioSoundPlayer {
    requests: mpsc::Sender<SoundSource>,
    disabled: bool,
}

impl RodioSoundPlayer {
    /// Opens the default output device on a new audio thread.
    ///
    /// # Errors
    ///
    /// Returns `SoundError::DeviceNotAvailable` if no output device can be
    /// opened.
    pub fn new(disabled: bool) -> Result<Self, SoundError> {
        let (request_tx, request_rx) = mpsc::channel::<SoundSource>();
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<(), SoundError>>(1);

        thread::Builder::new()
            .name("study-timer-audio".to_string())
            .spawn(move || {
                let (_stream, handle) = match OutputStream::try_default() {
                    Ok(pair) => pair,
                    Err(e) => {
                        let _ = ready_tx.send(Err(SoundError::DeviceNotAvailable(e.to_string())));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));
                debug!("Audio output stream initialized");

                for source in request_rx {
                    if let Err(e) = play_on(&handle, &source) {
                        warn!("Failed to play '{}': {}", source.name(), e);
                    }
                }
            })
            .map_err(|e| SoundError::DeviceNotAvailable(e.to_string()))?;

        ready_rx
            .recv()
            .map_err(|e| SoundError::DeviceNotAvailable(e.to_string()))??;

        Ok(Self {
            requests: request_tx,
            disabled,
        })
    }
}

fn play_on(handle: &OutputStreamHandle, source: &SoundSource) -> Result<(), SoundError> {
    match source {
        SoundSource::File { name, path } => {
            debug!("Playing alarm file: {}", name);
            let played = File::open(path)
                .map_err(|e| SoundError::FileNotFound(format!("{}: {}", path.display(), e)))
                .and_then(|file| {
                    let decoder = Decoder::new(BufReader::new(file))
                        .map_err(|e| SoundError::DecodeError(e.to_string()))?;
                    play_decoder(handle, decoder)
                });
            match played {
                Ok(()) => Ok(()),
                Err(e) => {
                    warn!("Alarm file '{}' failed ({}), playing the chime", name, e);
                    play_chime(handle)
                }
            }
        }
        SoundSource::Embedded { name } => {
            debug!("Playing embedded sound: {}", name);
            play_chime(handle)
        }
    }
}

fn play_chime(handle: &OutputStreamHandle) -> Result<(), SoundError> {
    let decoder = Decoder::new(Cursor::new(embedded_chime()))
        .map_err(|e| SoundError::DecodeError(format!("embedded chime: {}", e)))?;
    play_decoder(handle, decoder)
}

fn play_decoder<R>(handle: &OutputStreamHandle, decoder: Decoder<R>) -> Result<(), SoundError>
where
    R: std::io::Read + std::io::Seek + Send + Sync + 'static,
{
    let sink = Sink::try_new(handle).map_err(|e| SoundError::StreamError(e.to_string()))?;
    sink.append(decoder);
    sink.detach();
    Ok(())
}

impl SoundPlayer for RodioSoundPlayer {
    fn play(&self, source: &SoundSource) -> Result<(), SoundError> {
        if self.is_disabled() {
            debug!("Sound playback disabled, skipping");
            return Ok(());
        }

        self.requests
            .send(source.clone())
            .map_err(|e| SoundError::PlaybackError(e.to_string()))
    }

    fn is_disabled(&self) -> bool {
        self.disabled
    }
}

impl std::fmt::Debug for RodioSoundPlayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RodioSoundPlayer")
            .field("disabled", &self.is_disabled())
            .finish_non_exhaustive()
    }
}

/// Opens the audio device, returning `None` if it is unavailable.
#[must_use]
pub fn try_create_player(disabled: bool) -> Option<Arc<dyn SoundPlayer>> {
    match RodioSoundPlayer::new(disabled) {
        Ok(player) => Some(Arc::new(player)),
        Err(e) => {
            warn!("Audio not available, sound disabled: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // These tests return early on machines without an output device.

    #[test]
    fn test_disabled_player_skips_playback() {
        let Ok(player) = RodioSoundPlayer::new(true) else {
            return;
        };

        assert!(player.is_disabled());
        assert!(player.play(&SoundSource::embedded("chime")).is_ok());
    }

    #[test]
    fn test_try_create_player_does_not_panic() {
        let _ = try_create_player(true);
    }
}
