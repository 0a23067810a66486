//! Alarm sound sources.
//!
//! The alarm is chosen once when the daemon starts:
//!
//! 1. the file passed with `--alarm`, if any (it must exist);
//! 2. `alarm.<ext>` in the data directory, for the supported extensions;
//! 3. the generated chime compiled into the binary.

use std::path::{Path, PathBuf};

use super::error::SoundError;

/// Where the alarm sound comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SoundSource {
    /// An audio file on disk.
    File {
        /// Display name (the file stem).
        name: String,
        /// Full path to the file.
        path: PathBuf,
    },
    /// The chime compiled into the binary.
    Embedded {
        /// Display name.
        name: String,
    },
}

impl SoundSource {
    /// Creates a file source without checking the path.
    #[must_use]
    pub fn file(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::File {
            name: name.into(),
            path: path.into(),
        }
    }

    /// Creates a file source from an existing path, named after its stem.
    ///
    /// # Errors
    ///
    /// Returns `SoundError::FileNotFound` if `path` is not a file, and
    /// `SoundError::UnsupportedFormat` if its extension cannot be decoded.
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self, SoundError> {
        let path = path.into();
        if !path.is_file() {
            return Err(SoundError::FileNotFound(path.display().to_string()));
        }
        if !has_supported_extension(&path) {
            return Err(SoundError::UnsupportedFormat(path.display().to_string()));
        }

        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| ALARM_STEM.to_string());
        Ok(Self::File { name, path })
    }

    /// Creates an embedded source.
    #[must_use]
    pub fn embedded(name: impl Into<String>) -> Self {
        Self::Embedded { name: name.into() }
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::File { name, .. } | Self::Embedded { name } => name,
        }
    }

    /// Returns true for a file source.
    #[must_use]
    pub fn is_file(&self) -> bool {
        matches!(self, Self::File { .. })
    }

    /// Returns true for the embedded chime.
    #[must_use]
    pub fn is_embedded(&self) -> bool {
        matches!(self, Self::Embedded { .. })
    }

    /// Returns the file path of a file source.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::File { path, .. } => Some(path),
            Self::Embedded { .. } => None,
        }
    }
}

/// File stem looked up in the data directory.
const ALARM_STEM: &str = "alarm";

/// Name of the embedded chime.
pub const EMBEDDED_CHIME_NAME: &str = "chime";

/// Extensions the decoder handles, in lookup order.
const SUPPORTED_EXTENSIONS: &[&str] = &["wav", "mp3", "ogg", "flac"];

fn has_supported_extension(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
}

/// Looks for `alarm.<ext>` in `data_dir`.
#[must_use]
pub fn find_alarm_in(data_dir: &Path) -> Option<SoundSource> {
    SUPPORTED_EXTENSIONS
        .iter()
        .map(|ext| data_dir.join(format!("{}.{}", ALARM_STEM, ext)))
        .find(|path| path.is_file())
        .map(|path| SoundSource::file(ALARM_STEM, path))
}

/// Picks the alarm sound for a daemon using `data_dir`.
///
/// # Errors
///
/// Returns an error if `explicit` is given but is not a playable file. The
/// data-directory lookup never fails; it falls back to the embedded chime.
pub fn resolve_alarm(explicit: Option<&Path>, data_dir: &Path) -> Result<SoundSource, SoundError> {
    if let Some(path) = explicit {
        return SoundSource::from_path(path);
    }

    Ok(find_alarm_in(data_dir).unwrap_or_else(|| SoundSource::embedded(EMBEDDED_CHIME_NAME)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sound_source_file() {
        let source = SoundSource::file("bell", "/tmp/bell.wav");
        assert!(source.is_file());
        assert!(!source.is_embedded());
        assert_eq!(source.name(), "bell");
        assert_eq!(source.path(), Some(Path::new("/tmp/bell.wav")));
    }

    #[test]
    fn test_sound_source_embedded() {
        let source = SoundSource::embedded(EMBEDDED_CHIME_NAME);
        assert!(source.is_embedded());
        assert_eq!(source.name(), "chime");
        assert_eq!(source.path(), None);
    }

    #[test]
    fn test_from_path_requires_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.wav");

        let err = SoundSource::from_path(&missing).unwrap_err();
        assert!(matches!(err, SoundError::FileNotFound(_)));
    }

    #[test]
    fn test_from_path_rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "not audio").unwrap();

        let err = SoundSource::from_path(&path).unwrap_err();
        assert!(matches!(err, SoundError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_from_path_uses_file_stem() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Bell.MP3");
        std::fs::write(&path, b"ID3").unwrap();

        let source = SoundSource::from_path(&path).unwrap();
        assert_eq!(source.name(), "Bell");
    }

    #[test]
    fn test_resolve_alarm_falls_back_to_chime() {
        let dir = tempfile::tempdir().unwrap();
        let source = resolve_alarm(None, dir.path()).unwrap();
        assert_eq!(source, SoundSource::embedded(EMBEDDED_CHIME_NAME));
    }

    #[test]
    fn test_resolve_alarm_finds_data_dir_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("alarm.mp3"), b"ID3").unwrap();

        let source = resolve_alarm(None, dir.path()).unwrap();
        assert_eq!(source.path(), Some(dir.path().join("alarm.mp3").as_path()));
    }

    #[test]
    fn test_resolve_alarm_prefers_wav() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("alarm.mp3"), b"ID3").unwrap();
        std::fs::write(dir.path().join("alarm.wav"), b"RIFF").unwrap();

        let source = resolve_alarm(None, dir.path()).unwrap();
        assert_eq!(source.path(), Some(dir.path().join("alarm.wav").as_path()));
    }

    #[test]
    fn test_resolve_alarm_explicit_path_wins() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("alarm.wav"), b"RIFF").unwrap();
        let custom = dir.path().join("gong.ogg");
        std::fs::write(&custom, b"OggS").unwrap();

        let source = resolve_alarm(Some(&custom), dir.path()).unwrap();
        assert_eq!(source.name(), "gong");
    }

    #[test]
    fn test_resolve_alarm_explicit_missing_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gong.ogg");

        assert!(resolve_alarm(Some(&missing), dir.path()).is_err());
    }
}
