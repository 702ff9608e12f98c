//! Mystic client composition root.
//!
//! Wires settings, file-backed session storage, the reqwest transport and
//! the request pipeline into one [`MysticClient`].

use std::sync::Arc;

use mystic_application::{
    ApplicationError, AuthService, HistoryApi, RequestPipeline, SessionEvent, StorageError,
    TarotApi, TokenStore,
};
use mystic_domain::{ClientSettings, User};
use mystic_infrastructure::{FileSessionStorage, ReqwestTransport, TokioFileSystem};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Failure to assemble the client.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// No usable session storage location.
    #[error("session storage: {0}")]
    Storage(#[from] StorageError),

    /// The transport could not be built from the settings.
    #[error("transport: {0}")]
    Transport(#[from] ApplicationError),
}

/// Where the app should go after start-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Splash {
    /// No usable session; show the login flow.
    LoginRequired,
    /// Session verified with the backend.
    Ready(User),
    /// Credentials exist but the backend is unreachable; the cached profile
    /// is shown until the next request.
    Offline(Option<User>),
}

/// Fully wired client.
pub struct MysticClient {
    /// Shared pipeline.
    pub pipeline: Arc<RequestPipeline<ReqwestTransport>>,
    /// Login, logout and profile.
    pub auth: AuthService<ReqwestTransport>,
    /// Tarot catalogue and analyses.
    pub tarot: TarotApi<ReqwestTransport>,
    /// Reading history.
    pub history: HistoryApi<ReqwestTransport>,
}

impl MysticClient {
    /// Builds the client and restores the persisted session.
    ///
    /// # Errors
    ///
    /// Returns an error if no storage directory is available or the base
    /// URL is invalid.
    pub async fn open(settings: &ClientSettings) -> Result<Self, StartupError> {
        let storage = FileSessionStorage::for_settings(TokioFileSystem::new(), settings)?;
        info!(path = %storage.path().display(), "using session file");

        let store = Arc::new(TokenStore::load(Arc::new(storage)).await);
        let transport = Arc::new(ReqwestTransport::new(settings)?);
        let pipeline = Arc::new(RequestPipeline::new(transport, store));

        Ok(Self {
            auth: AuthService::new(Arc::clone(&pipeline)),
            tarot: TarotApi::new(Arc::clone(&pipeline)),
            history: HistoryApi::new(Arc::clone(&pipeline)),
            pipeline,
        })
    }

    /// The process-wide token store.
    #[must_use]
    pub fn store(&self) -> &Arc<TokenStore> {
        self.pipeline.store()
    }

    /// Start-up check: is there a session, and is it still accepted?
    ///
    /// # Errors
    ///
    /// Returns errors other than an ended session or an unreachable backend.
    pub async fn splash(&self) -> Result<Splash, ApplicationError> {
        if !self.auth.is_authenticated().await {
            return Ok(Splash::LoginRequired);
        }

        match self.auth.fetch_profile().await {
            Ok(user) => Ok(Splash::Ready(user)),
            Err(e) if e.is_auth() => Ok(Splash::LoginRequired),
            Err(e) if e.is_network() => {
                warn!(error = %e, "backend unreachable, continuing with cached profile");
                Ok(Splash::Offline(self.auth.current_user().await))
            }
            Err(e) => Err(e),
        }
    }

    /// Logs session lifecycle events until the store is dropped.
    ///
    /// This is the hook a navigation layer would replace to redirect to login.
    #[must_use]
    pub fn watch_session(&self) -> JoinHandle<()> {
        let mut events = self.store().subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) if event.ends_session() => {
                        info!(?event, "session ended, login required");
                    }
                    Ok(SessionEvent::LoggedIn { user_id }) => info!(%user_id, "session started"),
                    Ok(_) => {}
                    Err(RecvError::Lagged(missed)) => warn!(missed, "session events dropped"),
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}
