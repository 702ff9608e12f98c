//! Persisted token storage with an in-memory snapshot.
//!
//! The store is the only shared mutable state of the client. Readers see a
//! snapshot that is swapped only after the backend write has succeeded, so
//! a reader never observes one token of a pair updated without the other.

use std::sync::Arc;

use mystic_domain::{Session, TokenPair, User};
use tokio::sync::{Mutex, RwLock, broadcast};
use tracing::{debug, warn};

use super::events::SessionEvent;
use super::memory::InMemorySessionStorage;
use crate::error::StorageError;
use crate::ports::SessionStorage;

/// Storage key of the access token.
pub const ACCESS_TOKEN_KEY: &str = "access_token";
/// Storage key of the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
/// Storage key of the JSON-serialized user profile.
pub const USER_KEY: &str = "user";

const EVENT_CAPACITY: usize = 16;

/// Process-wide session store.
pub struct TokenStore {
    storage: Arc<dyn SessionStorage>,
    snapshot: RwLock<Session>,
    /// Serializes writers so the snapshot matches the last persisted write.
    write_gate: Mutex<()>,
    events: broadcast::Sender<SessionEvent>,
}

impl TokenStore {
    /// Restores the session from the storage backend.
    ///
    /// Read failures and undecodable values are treated as absent. A stored
    /// access token without its refresh token (or the reverse) is discarded.
    pub async fn load(storage: Arc<dyn SessionStorage>) -> Self {
        let access_token = read_key(storage.as_ref(), ACCESS_TOKEN_KEY).await;
        let refresh_token = read_key(storage.as_ref(), REFRESH_TOKEN_KEY).await;
        let user = read_key(storage.as_ref(), USER_KEY)
            .await
            .and_then(|json| match serde_json::from_str::<User>(&json) {
                Ok(user) => Some(user),
                Err(e) => {
                    warn!(error = %e, "stored user profile is unreadable, ignoring it");
                    None
                }
            });

        let session = match (access_token, refresh_token) {
            (Some(access_token), Some(refresh_token)) => Session {
                access_token: Some(access_token),
                refresh_token: Some(refresh_token),
                user,
            },
            (None, None) => Session {
                access_token: None,
                refresh_token: None,
                user,
            },
            _ => {
                warn!("stored session holds only one token, treating it as logged out");
                Session::empty()
            }
        };

        debug!(
            authenticated = session.has_credentials(),
            has_user = session.user.is_some(),
            "session restored"
        );
        Self::from_parts(storage, session)
    }

    /// Creates an empty store backed by in-memory storage.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_parts(Arc::new(InMemorySessionStorage::new()), Session::empty())
    }

    fn from_parts(storage: Arc<dyn SessionStorage>, session: Session) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            storage,
            snapshot: RwLock::new(session),
            write_gate: Mutex::new(()),
            events,
        }
    }

    /// Persists both tokens as one write.
    ///
    /// # Errors
    /// Returns the backend error; the snapshot is left unchanged.
    pub async fn save(&self, tokens: TokenPair) -> Result<(), StorageError> {
        let _gate = self.write_gate.lock().await;
        self.storage
            .set_many(&[
                (ACCESS_TOKEN_KEY, tokens.access_token.clone()),
                (REFRESH_TOKEN_KEY, tokens.refresh_token.clone()),
            ])
            .await?;
        self.snapshot.write().await.set_tokens(tokens);
        Ok(())
    }

    /// Persists a refreshed pair only if the session still holds `expected_refresh`.
    ///
    /// Returns `false` and changes nothing when the session was cleared or
    /// replaced while the refresh was in flight.
    ///
    /// # Errors
    /// Returns the backend error; the snapshot is left unchanged.
    pub async fn save_if_current(&self, expected_refresh: &str, tokens: TokenPair) -> Result<bool, StorageError> {
        let _gate = self.write_gate.lock().await;
        if !self.holds_refresh_token(expected_refresh).await {
            return Ok(false);
        }
        self.storage
            .set_many(&[
                (ACCESS_TOKEN_KEY, tokens.access_token.clone()),
                (REFRESH_TOKEN_KEY, tokens.refresh_token.clone()),
            ])
            .await?;
        self.snapshot.write().await.set_tokens(tokens);
        Ok(true)
    }

    /// Persists the profile independently of the tokens.
    ///
    /// # Errors
    /// Returns a serialization or backend error; the snapshot is left unchanged.
    pub async fn save_user(&self, user: &User) -> Result<(), StorageError> {
        let json = encode_user(user)?;
        let _gate = self.write_gate.lock().await;
        self.storage.set(USER_KEY, json).await?;
        self.snapshot.write().await.user = Some(user.clone());
        Ok(())
    }

    /// Persists tokens and profile of a fresh login as one write.
    ///
    /// # Errors
    /// Returns a serialization or backend error; the snapshot is left unchanged.
    pub async fn save_login(&self, tokens: TokenPair, user: &User) -> Result<(), StorageError> {
        let json = encode_user(user)?;
        let _gate = self.write_gate.lock().await;
        self.storage
            .set_many(&[
                (ACCESS_TOKEN_KEY, tokens.access_token.clone()),
                (REFRESH_TOKEN_KEY, tokens.refresh_token.clone()),
                (USER_KEY, json),
            ])
            .await?;

        let mut snapshot = self.snapshot.write().await;
        snapshot.set_tokens(tokens);
        snapshot.user = Some(user.clone());
        Ok(())
    }

    /// Removes all three keys.
    ///
    /// The snapshot is emptied even when the backend fails, so no credential
    /// stays usable in this process.
    ///
    /// # Errors
    /// Returns the backend error after emptying the snapshot.
    pub async fn clear(&self) -> Result<(), StorageError> {
        let _gate = self.write_gate.lock().await;
        self.clear_locked().await
    }

    /// Clears the session only if it still holds `expected_refresh`.
    ///
    /// Returns `false` and changes nothing when a newer session has replaced
    /// the one whose refresh failed.
    ///
    /// # Errors
    /// Returns the backend error after emptying the snapshot.
    pub async fn clear_if_current(&self, expected_refresh: &str) -> Result<bool, StorageError> {
        let _gate = self.write_gate.lock().await;
        if !self.holds_refresh_token(expected_refresh).await {
            return Ok(false);
        }
        self.clear_locked().await.map(|()| true)
    }

    async fn holds_refresh_token(&self, expected: &str) -> bool {
        self.snapshot.read().await.refresh_token.as_deref() == Some(expected)
    }

    /// Caller holds `write_gate`.
    async fn clear_locked(&self) -> Result<(), StorageError> {
        let result = self
            .storage
            .remove_many(&[ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY])
            .await;
        *self.snapshot.write().await = Session::empty();
        if let Err(e) = &result {
            warn!(error = %e, "session cleared in memory but storage removal failed");
        }
        result
    }

    /// Current access token.
    pub async fn access_token(&self) -> Option<String> {
        self.snapshot.read().await.access_token.clone()
    }

    /// Current refresh token.
    pub async fn refresh_token(&self) -> Option<String> {
        self.snapshot.read().await.refresh_token.clone()
    }

    /// Cached user profile.
    pub async fn user(&self) -> Option<User> {
        self.snapshot.read().await.user.clone()
    }

    /// Copy of the whole session.
    pub async fn session(&self) -> Session {
        self.snapshot.read().await.clone()
    }

    /// Subscribes to session lifecycle events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Broadcasts a session event. Having no listener is not an error.
    pub fn notify(&self, event: SessionEvent) {
        debug!(?event, "session event");
        let _ = self.events.send(event);
    }
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore").finish_non_exhaustive()
    }
}

async fn read_key(storage: &dyn SessionStorage, key: &str) -> Option<String> {
    match storage.get(key).await {
        Ok(value) => value,
        Err(e) => {
            warn!(key, error = %e, "session storage read failed, treating as absent");
            None
        }
    }
}

fn encode_user(user: &User) -> Result<String, StorageError> {
    serde_json::to_string(user).map_err(|e| StorageError::Serialization(e.to_string()))
}
