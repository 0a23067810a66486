//! Snapshot storage backends.
//!
//! The engine keeps exactly one persisted record: the latest snapshot text.
//! [`FileStorage`] keeps it in a JSON file in the data directory;
//! [`MemoryStorage`] keeps it in memory and can simulate write failures.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use thiserror::Error;
use tracing::debug;

/// Errors from a snapshot store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading the stored record failed
    #[error("状態ファイルの読み込みに失敗しました: {0}")]
    Read(String),

    /// Writing the record failed
    #[error("状態ファイルの書き込みに失敗しました: {0}")]
    Write(String),

    /// Removing the record failed
    #[error("状態ファイルの削除に失敗しました: {0}")]
    Remove(String),
}

/// A single-record key-value store for the timer snapshot.
pub trait SnapshotStorage: Send + Sync {
    /// Returns the stored snapshot text, or `None` if nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the record exists but cannot be read.
    fn load(&self) -> Result<Option<String>, StorageError>;

    /// Replaces the stored snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be written.
    fn save(&self, contents: &str) -> Result<(), StorageError>;

    /// Removes the stored snapshot. Removing a missing record succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the record exists but cannot be removed.
    fn clear(&self) -> Result<(), StorageError>;
}

// ============================================================================
// FileStorage
// ============================================================================

/// Snapshot stored as a JSON file, replaced atomically on every save.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    /// Creates a store for the file at `path`. Nothing is touched until the
    /// first save.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the snapshot file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        self.path.with_extension("json.tmp")
    }
}

impl SnapshotStorage for FileStorage {
    fn load(&self) -> Result<Option<String>, StorageError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Read(format!("{}: {}", self.path.display(), e))),
        }
    }

    fn save(&self, contents: &str) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StorageError::Write(format!("{}: {}", parent.display(), e)))?;
        }

        // Write to a sibling file first so a crash never leaves half a snapshot.
        let tmp_path = self.tmp_path();
        std::fs::write(&tmp_path, contents.as_bytes())
            .map_err(|e| StorageError::Write(format!("{}: {}", tmp_path.display(), e)))?;
        std::fs::rename(&tmp_path, &self.path)
            .map_err(|e| StorageError::Write(format!("{}: {}", self.path.display(), e)))?;

        debug!("Snapshot written to {}", self.path.display());
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Remove(format!(
                "{}: {}",
                self.path.display(),
                e
            ))),
        }
    }
}

// ============================================================================
// MemoryStorage
// ============================================================================

/// In-memory store for tests and ephemeral engines.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    value: Mutex<Option<String>>,
    fail_writes: AtomicBool,
    save_count: AtomicUsize,
}

impl MemoryStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already holds `contents`.
    #[must_use]
    pub fn with_contents(contents: impl Into<String>) -> Self {
        Self {
            value: Mutex::new(Some(contents.into())),
            ..Self::default()
        }
    }

    /// Makes every following save fail, as a full or disabled store would.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Returns the stored text.
    #[must_use]
    pub fn contents(&self) -> Option<String> {
        self.value
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of successful saves.
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.save_count.load(Ordering::SeqCst)
    }
}

impl SnapshotStorage for MemoryStorage {
    fn load(&self) -> Result<Option<String>, StorageError> {
        Ok(self.contents())
    }

    fn save(&self, contents: &str) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Write("quota exceeded".to_string()));
        }
        *self.value.lock().unwrap_or_else(|e| e.into_inner()) = Some(contents.to_string());
        self.save_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        *self.value.lock().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod file_storage_tests {
        use super::*;

        #[test]
        fn test_load_missing_file_is_none() {
            let dir = tempfile::tempdir().unwrap();
            let storage = FileStorage::new(dir.path().join("state.json"));

            assert_eq!(storage.load().unwrap(), None);
        }

        #[test]
        fn test_save_then_load() {
            let dir = tempfile::tempdir().unwrap();
            let storage = FileStorage::new(dir.path().join("state.json"));

            storage.save(r#"{"version":1}"#).unwrap();

            assert_eq!(storage.load().unwrap().as_deref(), Some(r#"{"version":1}"#));
            assert!(!dir.path().join("state.json.tmp").exists());
        }

        #[test]
        fn test_save_creates_parent_directory() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("nested").join("state.json");
            let storage = FileStorage::new(&path);

            storage.save("{}").unwrap();
            assert!(path.exists());
        }

        #[test]
        fn test_save_overwrites() {
            let dir = tempfile::tempdir().unwrap();
            let storage = FileStorage::new(dir.path().join("state.json"));

            storage.save("first").unwrap();
            storage.save("second").unwrap();

            assert_eq!(storage.load().unwrap().as_deref(), Some("second"));
        }

        #[test]
        fn test_clear() {
            let dir = tempfile::tempdir().unwrap();
            let storage = FileStorage::new(dir.path().join("state.json"));

            storage.save("{}").unwrap();
            storage.clear().unwrap();
            assert_eq!(storage.load().unwrap(), None);

            // Clearing twice is fine
            storage.clear().unwrap();
        }

        #[test]
        fn test_save_into_unwritable_location_fails() {
            let dir = tempfile::tempdir().unwrap();
            let blocker = dir.path().join("blocker");
            std::fs::write(&blocker, "file, not a directory").unwrap();

            let storage = FileStorage::new(blocker.join("state.json"));
            let err = storage.save("{}").unwrap_err();
            assert!(matches!(err, StorageError::Write(_)));
        }
    }

    mod memory_storage_tests {
        use super::*;

        #[test]
        fn test_round_trip() {
            let storage = MemoryStorage::new();
            assert_eq!(storage.load().unwrap(), None);

            storage.save("abc").unwrap();
            assert_eq!(storage.load().unwrap().as_deref(), Some("abc"));
            assert_eq!(storage.save_count(), 1);
        }

        #[test]
        fn test_with_contents() {
            let storage = MemoryStorage::with_contents("seed");
            assert_eq!(storage.contents().as_deref(), Some("seed"));
        }

        #[test]
        fn test_fail_writes() {
            let storage = MemoryStorage::with_contents("old");
            storage.set_fail_writes(true);

            assert!(storage.save("new").is_err());
            assert_eq!(storage.contents().as_deref(), Some("old"));
            assert_eq!(storage.save_count(), 0);
        }

        #[test]
        fn test_clear() {
            let storage = MemoryStorage::with_contents("x");
            storage.clear().unwrap();
            assert!(storage.contents().is_none());
        }
    }
}
