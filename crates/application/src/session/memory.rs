//! In-memory session storage.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::StorageError;
use crate::ports::SessionStorage;

/// Thread-safe in-memory session storage.
///
/// Nothing survives the process. Reads and writes can be made to fail on
/// demand to exercise storage-unavailable paths.
#[derive(Debug, Default)]
pub struct InMemorySessionStorage {
    entries: Mutex<HashMap<String, String>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl InMemorySessionStorage {
    /// Creates an empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a storage pre-populated with the given entries.
    #[must_use]
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let storage = Self::new();
        storage
            .entries
            .lock()
            .extend(entries.into_iter().map(|(k, v)| (k.into(), v.into())));
        storage
    }

    /// Makes subsequent reads fail (or succeed again).
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Makes subsequent writes fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Returns the raw stored value for a key.
    #[must_use]
    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    /// Returns the number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    fn check_writable(&self) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("storage is read-only".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStorage for InMemorySessionStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("storage is unreadable".to_string()));
        }
        Ok(self.raw(key))
    }

    async fn set_many(&self, entries: &[(&str, String)]) -> Result<(), StorageError> {
        self.check_writable()?;
        let mut stored = self.entries.lock();
        for (key, value) in entries {
            stored.insert((*key).to_string(), value.clone());
        }
        Ok(())
    }

    async fn remove_many(&self, keys: &[&str]) -> Result<(), StorageError> {
        self.check_writable()?;
        let mut stored = self.entries.lock();
        for key in keys {
            stored.remove(*key);
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_set_get_remove() {
        let storage = InMemorySessionStorage::new();
        storage.set("k", "v".to_string()).await.unwrap();
        assert_eq!(storage.get("k").await.unwrap().as_deref(), Some("v"));

        storage.remove_many(&["k", "missing"]).await.unwrap();
        assert_eq!(storage.get("k").await.unwrap(), None);
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn test_failing_writes_leave_entries_untouched() {
        let storage = InMemorySessionStorage::with_entries([("k", "old")]);
        storage.set_fail_writes(true);

        let result = storage.set_many(&[("k", "new".to_string())]).await;
        assert!(matches!(result, Err(StorageError::Unavailable(_))));
        assert_eq!(storage.raw("k").as_deref(), Some("old"));
    }

    #[tokio::test]
    async fn test_failing_reads() {
        let storage = InMemorySessionStorage::with_entries([("k", "v")]);
        storage.set_fail_reads(true);
        assert!(storage.get("k").await.is_err());
    }
}
