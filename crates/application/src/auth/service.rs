//! Authentication service.

use std::sync::Arc;

use mystic_domain::{ApiRequest, LoginRequest, LoginResponse, RegisterRequest, User};
use tracing::info;

use crate::error::ApplicationResult;
use crate::pipeline::RequestPipeline;
use crate::ports::HttpTransport;
use crate::session::{SessionEvent, TokenStore};

/// Path of the login endpoint.
pub const LOGIN_PATH: &str = "/auth/login";
/// Path of the registration endpoint.
pub const REGISTER_PATH: &str = "/auth/register";
/// Path of the current user's profile.
pub const PROFILE_PATH: &str = "/users/me";

/// Login, logout and profile operations on top of the request pipeline.
///
/// # Example
///
/// ```ignore
/// let auth = AuthService::new(pipeline.clone());
/// let login = auth.login("luna@example.com", "secret").await?;
/// assert!(auth.is_authenticated().await);
/// auth.logout().await?;
/// ```
pub struct AuthService<T: HttpTransport> {
    pipeline: Arc<RequestPipeline<T>>,
}

impl<T: HttpTransport> AuthService<T> {
    /// Creates a service sharing the given pipeline.
    pub const fn new(pipeline: Arc<RequestPipeline<T>>) -> Self {
        Self { pipeline }
    }

    fn store(&self) -> &TokenStore {
        self.pipeline.store()
    }

    /// Exchanges credentials for a session and persists it.
    ///
    /// # Errors
    ///
    /// `Api` for rejected credentials (401 is not recovered here), `Network`
    /// if the backend is unreachable, `Storage` if the session could not be
    /// persisted.
    pub async fn login(
        &self,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> ApplicationResult<LoginResponse> {
        let request = ApiRequest::post(LOGIN_PATH).with_body(&LoginRequest::new(email, password))?;
        let response: LoginResponse = self.pipeline.execute_public_json(request).await?;

        self.store()
            .save_login(response.tokens(), &response.user)
            .await?;
        info!(user_id = %response.user.id, "logged in");
        self.store().notify(SessionEvent::LoggedIn {
            user_id: response.user.id.clone(),
        });
        Ok(response)
    }

    /// Creates an account. Does not log in.
    ///
    /// # Errors
    ///
    /// `Api` with the server's validation payload, or `Network`.
    pub async fn register(&self, registration: &RegisterRequest) -> ApplicationResult<serde_json::Value> {
        let request = ApiRequest::post(REGISTER_PATH).with_body(registration)?;
        let created = self.pipeline.execute_public_json(request).await?;
        info!(email = %registration.email, "account registered");
        Ok(created)
    }

    /// Ends the session.
    ///
    /// # Errors
    ///
    /// `Storage` if the persisted keys could not be removed; the in-memory
    /// session is empty either way.
    pub async fn logout(&self) -> ApplicationResult<()> {
        let cleared = self.store().clear().await;
        info!("logged out");
        self.store().notify(SessionEvent::LoggedOut);
        cleared?;
        Ok(())
    }

    /// The cached profile, if logged in.
    pub async fn current_user(&self) -> Option<User> {
        self.store().user().await
    }

    /// Fetches the authoritative profile and refreshes the cache.
    ///
    /// # Errors
    ///
    /// Any pipeline error; `Auth` means the session is gone.
    pub async fn fetch_profile(&self) -> ApplicationResult<User> {
        let user: User = self.pipeline.execute_json(ApiRequest::get(PROFILE_PATH)).await?;
        self.store().save_user(&user).await?;
        Ok(user)
    }

    /// Returns true if an access token is stored.
    pub async fn is_authenticated(&self) -> bool {
        self.store().access_token().await.is_some()
    }
}
