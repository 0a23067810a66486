//! Sound system error types.
//!
//! None of these stop the timer: the engine logs them and carries on.

use thiserror::Error;

/// Errors that can occur while preparing or playing the alarm.
#[derive(Debug, Error)]
pub enum SoundError {
    /// No audio output device (or the `audio` feature is off).
    #[error("オーディオデバイスが利用できません: {0}")]
    DeviceNotAvailable(String),

    /// The alarm file does not exist.
    #[error("サウンドファイルが見つかりません: {0}")]
    FileNotFound(String),

    /// The alarm file has an extension the decoder does not handle.
    #[error("対応していないサウンド形式です: {0}")]
    UnsupportedFormat(String),

    /// The audio data could not be decoded.
    #[error("サウンドファイルのデコードに失敗しました: {0}")]
    DecodeError(String),

    /// Failed to create an output sink.
    #[error("オーディオストリームの作成に失敗しました: {0}")]
    StreamError(String),

    /// The playback thread is gone or refused the request.
    #[error("サウンド再生エラー: {0}")]
    PlaybackError(String),
}

impl SoundError {
    /// Returns true if this error is related to device availability.
    #[must_use]
    pub fn is_device_error(&self) -> bool {
        matches!(self, Self::DeviceNotAvailable(_) | Self::StreamError(_))
    }

    /// Returns true if this error is about the alarm file itself.
    #[must_use]
    pub fn is_file_error(&self) -> bool {
        matches!(
            self,
            Self::FileNotFound(_) | Self::UnsupportedFormat(_) | Self::DecodeError(_)
        )
    }

    /// Hint printed next to the error when the daemon starts.
    #[must_use]
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::DeviceNotAvailable(_) => "--no-sound を指定するとサウンドなしで起動します",
            Self::FileNotFound(_) => "--alarm のパスを確認してください",
            Self::UnsupportedFormat(_) => "wav / mp3 / ogg / flac のいずれかを指定してください",
            Self::DecodeError(_) => "サウンドファイルが破損している可能性があります",
            Self::StreamError(_) => "オーディオ設定を確認してください",
            Self::PlaybackError(_) => "デーモンを再起動してください",
        }
    }
}
