//! Session storage port
//!
//! Durable key-value storage for the session. Production uses device
//! storage; tests inject an in-memory backend.

use async_trait::async_trait;

use crate::error::StorageError;

/// Key-value backend holding the persisted session strings.
#[async_trait]
pub trait SessionStorage: Send + Sync {
    /// Reads one key. A missing key is `Ok(None)`.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Writes all entries as one unit.
    ///
    /// # Errors
    /// Returns an error if the backend cannot be written. On error no
    /// entry of the batch may be observable.
    async fn set_many(&self, entries: &[(&str, String)]) -> Result<(), StorageError>;

    /// Removes all keys. Missing keys are not an error.
    ///
    /// # Errors
    /// Returns an error if the backend cannot be written.
    async fn remove_many(&self, keys: &[&str]) -> Result<(), StorageError>;

    /// Writes a single key.
    ///
    /// # Errors
    /// Returns an error if the backend cannot be written.
    async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        self.set_many(&[(key, value)]).await
    }
}
