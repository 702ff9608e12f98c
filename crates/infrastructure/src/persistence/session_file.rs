//! File-backed session storage.
//!
//! The session lives in one JSON object in the platform data directory:
//! - Linux: ~/.local/share/mystic/session.json
//! - macOS: ~/Library/Application Support/mystic/session.json
//! - Windows: %APPDATA%/mystic/session.json
//!
//! ```json
//! {
//!   "access_token": "eyJhbGciOi...",
//!   "refresh_token": "eyJhbGciOi...",
//!   "user": "{\"_id\":\"...\",\"email\":\"...\"}"
//! }
//! ```
//!
//! Every write goes to a sibling temp file that is then renamed over the
//! session file, so a batch of keys is either fully visible or not at all.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use mystic_application::{SessionStorage, StorageError};
use mystic_domain::ClientSettings;
use tokio::sync::Mutex;
use tracing::warn;

use super::file_system::{FileSystem, FileSystemError};
use crate::serialization::{from_json_bytes, to_json_stable_bytes};

/// Name of the session file inside the storage directory.
pub const SESSION_FILE_NAME: &str = "session.json";

/// Platform data directory for the client, if the platform has one.
#[must_use]
pub fn default_data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("mystic"))
}

type Entries = BTreeMap<String, String>;

/// Session storage in a single JSON file.
#[derive(Debug)]
pub struct FileSessionStorage<F> {
    fs: F,
    path: PathBuf,
    /// Serializes read-modify-write cycles on the file.
    write_lock: Mutex<()>,
}

impl<F: FileSystem> FileSessionStorage<F> {
    /// Creates a storage keeping `session.json` in `dir`.
    pub fn new(fs: F, dir: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            path: dir.into().join(SESSION_FILE_NAME),
            write_lock: Mutex::new(()),
        }
    }

    /// Creates a storage in the configured directory, or the platform data
    /// directory when none is configured.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if no directory is configured and the platform
    /// has no data directory.
    pub fn for_settings(fs: F, settings: &ClientSettings) -> Result<Self, StorageError> {
        let dir = settings
            .storage_dir
            .clone()
            .or_else(default_data_dir)
            .ok_or_else(|| StorageError::Unavailable("no data directory on this platform".to_string()))?;
        Ok(Self::new(fs, dir))
    }

    /// Path of the session file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        self.path.with_extension("json.tmp")
    }

    async fn read_entries(&self) -> Result<Entries, StorageError> {
        match self.fs.read_file(&self.path).await {
            Ok(bytes) => from_json_bytes(&bytes).map_err(|e| StorageError::Serialization(e.to_string())),
            Err(FileSystemError::NotFound(_)) => Ok(Entries::new()),
            Err(e) => Err(unavailable(&e)),
        }
    }

    /// Current entries for an update. A corrupt file is replaced.
    async fn entries_for_update(&self) -> Result<Entries, StorageError> {
        match self.read_entries().await {
            Err(StorageError::Serialization(reason)) => {
                warn!(path = %self.path.display(), %reason, "session file is corrupt, replacing it");
                Ok(Entries::new())
            }
            other => other,
        }
    }

    async fn write_entries(&self, entries: &Entries) -> Result<(), StorageError> {
        if entries.is_empty() {
            return match self.fs.remove_file(&self.path).await {
                Ok(()) | Err(FileSystemError::NotFound(_)) => Ok(()),
                Err(e) => Err(unavailable(&e)),
            };
        }

        let bytes = to_json_stable_bytes(entries).map_err(|e| StorageError::Serialization(e.to_string()))?;
        let temp = self.temp_path();
        self.fs
            .write_file(&temp, &bytes)
            .await
            .map_err(|e| unavailable(&e))?;
        if let Err(e) = self.fs.rename(&temp, &self.path).await {
            if let Err(cleanup) = self.fs.remove_file(&temp).await {
                warn!(path = %temp.display(), error = %cleanup, "could not remove temporary session file");
            }
            return Err(unavailable(&e));
        }
        Ok(())
    }
}

#[async_trait]
impl<F: FileSystem> SessionStorage for FileSessionStorage<F> {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.read_entries().await?.remove(key))
    }

    async fn set_many(&self, entries: &[(&str, String)]) -> Result<(), StorageError> {
        let _lock = self.write_lock.lock().await;
        let mut stored = self.entries_for_update().await?;
        for (key, value) in entries {
            stored.insert((*key).to_string(), value.clone());
        }
        self.write_entries(&stored).await
    }

    async fn remove_many(&self, keys: &[&str]) -> Result<(), StorageError> {
        let _lock = self.write_lock.lock().await;
        let mut stored = self.entries_for_update().await?;
        for key in keys {
            stored.remove(*key);
        }
        self.write_entries(&stored).await
    }
}

fn unavailable(error: &FileSystemError) -> StorageError {
    StorageError::Unavailable(error.to_string())
}
