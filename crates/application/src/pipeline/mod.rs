//! Request pipeline
//!
//! Every API call goes through [`RequestPipeline`]. It attaches the current
//! access token and recovers from one expired token per request: the 401 is
//! intercepted, a single shared refresh runs, and the request is replayed
//! once with the new token.

mod single_flight;

pub use single_flight::SingleFlight;

use std::sync::Arc;

use mystic_domain::{ApiRequest, ApiResponse, RefreshRequest, TokenPair, token_preview};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::error::{ApiError, ApplicationError, ApplicationResult, AuthError};
use crate::ports::HttpTransport;
use crate::session::{SessionEvent, TokenStore};

/// Path of the token refresh endpoint.
pub const REFRESH_PATH: &str = "/auth/refresh";

/// HTTP client wrapper owning authentication concerns.
pub struct RequestPipeline<T: HttpTransport> {
    transport: Arc<T>,
    store: Arc<TokenStore>,
    refresh: SingleFlight<ApplicationResult<String>>,
}

impl<T: HttpTransport> RequestPipeline<T> {
    /// Creates a pipeline over the given transport and token store.
    pub fn new(transport: Arc<T>, store: Arc<TokenStore>) -> Self {
        Self {
            transport,
            store,
            refresh: SingleFlight::new(),
        }
    }

    /// The token store this pipeline reads credentials from.
    #[must_use]
    pub const fn store(&self) -> &Arc<TokenStore> {
        &self.store
    }

    /// Sends an authenticated request.
    ///
    /// A 401 triggers at most one refresh and one replay. The replayed
    /// request's own outcome is returned; a second 401 is not recovered.
    ///
    /// # Errors
    ///
    /// - `Network` if no response was received (never retried)
    /// - `Auth` if the session could not be refreshed or is still rejected
    /// - `Api` for any other non-2xx status, with the server payload
    /// - `Storage` if refreshed tokens could not be persisted
    pub async fn execute(&self, mut request: ApiRequest) -> ApplicationResult<ApiResponse> {
        request.validate()?;
        request.authorize(self.store.access_token().await);

        loop {
            let response = self.send(&request).await?;
            if !response.is_unauthorized() {
                return into_result(response);
            }

            if request.auth().is_retried() {
                warn!(
                    request_id = %request.id,
                    path = %request.path,
                    "request still unauthorized after refresh"
                );
                return Err(AuthError::RetryExhausted.into());
            }

            let stale = request.auth().token().map(str::to_owned);
            let token = self
                .refresh
                .run(|| self.refresh_or_reuse(stale.as_deref()))
                .await?;
            request.authorize(Some(token));
            request.mark_retried();
        }
    }

    /// Sends an authenticated request and decodes the 2xx body.
    ///
    /// # Errors
    ///
    /// Same as [`execute`](Self::execute), plus `Decode` if the body does not
    /// match `R`.
    pub async fn execute_json<R: DeserializeOwned>(&self, request: ApiRequest) -> ApplicationResult<R> {
        let response = self.execute(request).await?;
        decode(&response)
    }

    /// Sends a request without credentials and without 401 recovery.
    ///
    /// Used for login and registration, where a 401 means wrong credentials
    /// and is reported as an `Api` error.
    ///
    /// # Errors
    ///
    /// `Network` if no response was received, `Api` for any non-2xx status.
    pub async fn execute_public(&self, mut request: ApiRequest) -> ApplicationResult<ApiResponse> {
        request.validate()?;
        request.authorize(None);
        let response = self.send(&request).await?;
        into_result(response)
    }

    /// Sends an unauthenticated request and decodes the 2xx body.
    ///
    /// # Errors
    ///
    /// Same as [`execute_public`](Self::execute_public), plus `Decode`.
    pub async fn execute_public_json<R: DeserializeOwned>(&self, request: ApiRequest) -> ApplicationResult<R> {
        let response = self.execute_public(request).await?;
        decode(&response)
    }

    async fn send(&self, request: &ApiRequest) -> ApplicationResult<ApiResponse> {
        let response = self.transport.execute(request).await?;
        debug!(
            request_id = %request.id,
            method = %request.method,
            path = %request.path,
            status = response.status,
            retried = request.auth().is_retried(),
            elapsed_ms = u64::try_from(response.duration.as_millis()).unwrap_or(u64::MAX),
            "response received"
        );
        Ok(response)
    }

    /// Body of a refresh flight.
    ///
    /// A request rejected with `stale` returns the current token without a
    /// refresh call when another flight has already replaced it.
    async fn refresh_or_reuse(&self, stale: Option<&str>) -> ApplicationResult<String> {
        if let Some(current) = self.store.access_token().await {
            if stale != Some(current.as_str()) {
                debug!(token = %token_preview(&current), "token already refreshed, replaying");
                return Ok(current);
            }
        }

        let Some(presented) = self.store.refresh_token().await else {
            return self.end_session(None, AuthError::MissingRefreshToken).await;
        };

        match self.exchange_refresh_token(&presented).await {
            Ok(tokens) => {
                let access_token = tokens.access_token.clone();
                if !self.store.save_if_current(&presented, tokens).await? {
                    warn!("session ended during token refresh, discarding new tokens");
                    return Err(AuthError::SessionEnded.into());
                }
                info!(token = %token_preview(&access_token), "access token refreshed");
                self.store.notify(SessionEvent::Refreshed);
                Ok(access_token)
            }
            Err(error) => self.end_session(Some(&presented), error).await,
        }
    }

    /// Clears the session whose refresh failed and reports `error`.
    ///
    /// A session that was replaced during the flight (by a new login) is
    /// left alone.
    async fn end_session(&self, presented: Option<&str>, error: AuthError) -> ApplicationResult<String> {
        warn!(%error, "token refresh failed");
        let cleared = match presented {
            Some(token) => self.store.clear_if_current(token).await,
            None => self.store.clear().await.map(|()| true),
        };
        if matches!(cleared, Ok(false)) {
            debug!("session replaced during refresh, keeping it");
        } else {
            self.store.notify(SessionEvent::Expired {
                reason: error.to_string(),
            });
        }
        cleared?;
        Err(error.into())
    }

    /// Exchanges `refresh_token` for a new pair.
    ///
    /// Goes straight to the transport so a 401 here is never intercepted.
    async fn exchange_refresh_token(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let request = ApiRequest::post(REFRESH_PATH)
            .with_body(&RefreshRequest {
                refresh_token: refresh_token.to_string(),
            })
            .map_err(|e| AuthError::RefreshFailed {
                reason: e.to_string(),
            })?;

        let response = self
            .transport
            .execute(&request)
            .await
            .map_err(|e| AuthError::RefreshFailed {
                reason: e.to_string(),
            })?;

        if !response.is_success() {
            return Err(AuthError::RefreshRejected {
                status: response.status,
            });
        }

        response
            .json::<TokenPair>()
            .map_err(|e| AuthError::RefreshFailed {
                reason: format!("malformed refresh response: {e}"),
            })
    }
}

impl<T: HttpTransport> std::fmt::Debug for RequestPipeline<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestPipeline")
            .field("refresh_in_flight", &self.refresh.is_in_flight())
            .finish_non_exhaustive()
    }
}

fn into_result(response: ApiResponse) -> ApplicationResult<ApiResponse> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(ApiError::new(response.status, response.payload()).into())
    }
}

fn decode<R: DeserializeOwned>(response: &ApiResponse) -> ApplicationResult<R> {
    response
        .json()
        .map_err(|e| ApplicationError::Decode(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::NetworkError;
    use crate::session::InMemorySessionStorage;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::VecDeque;
    use tokio::sync::Notify;

    /// Transport answering from a fixed script, recording what was sent.
    #[derive(Default)]
    struct ScriptedTransport {
        script: Mutex<VecDeque<Result<ApiResponse, NetworkError>>>,
        sent: Mutex<Vec<ApiRequest>>,
    }

    impl ScriptedTransport {
        fn new(script: impl IntoIterator<Item = Result<ApiResponse, NetworkError>>) -> Self {
            Self {
                script: Mutex::new(script.into_iter().collect()),
                sent: Mutex::default(),
            }
        }

        fn sent(&self) -> Vec<(String, Option<String>, bool)> {
            self.sent
                .lock()
                .iter()
                .map(|r| {
                    (
                        r.path.clone(),
                        r.auth().token().map(str::to_owned),
                        r.auth().is_retried(),
                    )
                })
                .collect()
        }
    }

    impl HttpTransport for ScriptedTransport {
        async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, NetworkError> {
            self.sent.lock().push(request.clone());
            self.script
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(NetworkError::Other("script exhausted".to_string())))
        }
    }

    /// Holds `/auth/refresh` open until released.
    struct HeldRefresh {
        inner: ScriptedTransport,
        started: Notify,
        release: Notify,
    }

    impl HeldRefresh {
        fn new(script: impl IntoIterator<Item = Result<ApiResponse, NetworkError>>) -> Self {
            Self {
                inner: ScriptedTransport::new(script),
                started: Notify::new(),
                release: Notify::new(),
            }
        }
    }

    impl HttpTransport for HeldRefresh {
        async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, NetworkError> {
            if request.path == REFRESH_PATH {
                self.started.notify_one();
                self.release.notified().await;
            }
            self.inner.execute(request).await
        }
    }

    fn ok(body: serde_json::Value) -> Result<ApiResponse, NetworkError> {
        Ok(ApiResponse::json_body(200, &body))
    }

    fn status(code: u16, body: serde_json::Value) -> Result<ApiResponse, NetworkError> {
        Ok(ApiResponse::json_body(code, &body))
    }

    fn unauthorized() -> Result<ApiResponse, NetworkError> {
        status(401, json!({ "message": "Unauthorized", "statusCode": 401 }))
    }

    async fn logged_in_store() -> (Arc<InMemorySessionStorage>, Arc<TokenStore>) {
        let storage = Arc::new(InMemorySessionStorage::new());
        let store = Arc::new(TokenStore::load(storage.clone()).await);
        store.save(TokenPair::new("old-access", "old-refresh")).await.unwrap();
        (storage, store)
    }

    fn pipeline(
        transport: ScriptedTransport,
        store: &Arc<TokenStore>,
    ) -> (Arc<ScriptedTransport>, RequestPipeline<ScriptedTransport>) {
        let transport = Arc::new(transport);
        let pipeline = RequestPipeline::new(transport.clone(), store.clone());
        (transport, pipeline)
    }

    fn call(path: &str, token: Option<&str>, retried: bool) -> (String, Option<String>, bool) {
        (path.to_string(), token.map(str::to_owned), retried)
    }

    #[tokio::test]
    async fn test_attaches_current_token() {
        let (_, store) = logged_in_store().await;
        let (transport, pipeline) = pipeline(ScriptedTransport::new([ok(json!({ "id": 1 }))]), &store);

        let response = pipeline.execute(ApiRequest::get("/tarot/contexts")).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(
            transport.sent(),
            vec![call("/tarot/contexts", Some("old-access"), false)]
        );
        assert_eq!(
            transport.sent.lock()[0].authorization().as_deref(),
            Some("Bearer old-access")
        );
    }

    #[tokio::test]
    async fn test_sends_without_token_when_logged_out() {
        let store = Arc::new(TokenStore::in_memory());
        let (transport, pipeline) = pipeline(ScriptedTransport::new([ok(json!([]))]), &store);

        pipeline.execute(ApiRequest::get("/tarot/cards/all")).await.unwrap();
        assert_eq!(transport.sent(), vec![call("/tarot/cards/all", None, false)]);
    }

    #[tokio::test]
    async fn test_api_error_carries_payload() {
        let (_, store) = logged_in_store().await;
        let (_, pipeline) = pipeline(
            ScriptedTransport::new([status(404, json!({ "message": "Reading not found" }))]),
            &store,
        );

        let error = pipeline.execute(ApiRequest::get("/x")).await.unwrap_err();
        let api = error.as_api().expect("api error");
        assert_eq!(api.status, 404);
        assert_eq!(api.message(), Some("Reading not found"));
    }

    #[tokio::test]
    async fn test_network_error_is_not_retried() {
        let (_, store) = logged_in_store().await;
        let (transport, pipeline) = pipeline(
            ScriptedTransport::new([Err(NetworkError::Timeout { timeout_ms: 10_000 })]),
            &store,
        );

        let error = pipeline.execute(ApiRequest::get("/x")).await.unwrap_err();
        assert_eq!(
            error,
            ApplicationError::Network(NetworkError::Timeout { timeout_ms: 10_000 })
        );
        assert_eq!(transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_refreshes_and_replays_once() {
        let (storage, store) = logged_in_store().await;
        let mut events = store.subscribe();
        let (transport, pipeline) = pipeline(
            ScriptedTransport::new([
                unauthorized(),
                ok(json!({ "access_token": "new-access", "refresh_token": "new-refresh" })),
                ok(json!({ "readings": 3 })),
            ]),
            &store,
        );

        let body: serde_json::Value = pipeline.execute_json(ApiRequest::get("/users/me")).await.unwrap();

        assert_eq!(body, json!({ "readings": 3 }));
        assert_eq!(
            transport.sent(),
            vec![
                call("/users/me", Some("old-access"), false),
                call(REFRESH_PATH, None, false),
                call("/users/me", Some("new-access"), true),
            ]
        );
        assert_eq!(
            transport.sent.lock()[1].body,
            Some(json!({ "refresh_token": "old-refresh" }))
        );
        assert_eq!(store.access_token().await.as_deref(), Some("new-access"));
        assert_eq!(storage.raw("refresh_token").as_deref(), Some("new-refresh"));
        assert_eq!(events.recv().await.unwrap(), SessionEvent::Refreshed);
        assert!(!pipeline.refresh.is_in_flight());
    }

    #[tokio::test]
    async fn test_second_unauthorized_is_retry_exhausted() {
        let (_, store) = logged_in_store().await;
        let (transport, pipeline) = pipeline(
            ScriptedTransport::new([
                unauthorized(),
                ok(json!({ "access_token": "new-access", "refresh_token": "new-refresh" })),
                unauthorized(),
            ]),
            &store,
        );

        let error = pipeline.execute(ApiRequest::get("/users/me")).await.unwrap_err();

        assert_eq!(error, ApplicationError::Auth(AuthError::RetryExhausted));
        assert_eq!(transport.sent().len(), 3);
        assert_eq!(store.access_token().await.as_deref(), Some("new-access"));
    }

    #[tokio::test]
    async fn test_replayed_request_failure_is_surfaced() {
        let (_, store) = logged_in_store().await;
        let (_, pipeline) = pipeline(
            ScriptedTransport::new([
                unauthorized(),
                ok(json!({ "access_token": "new-access", "refresh_token": "new-refresh" })),
                status(500, json!({ "message": "kaboom" })),
            ]),
            &store,
        );

        let error = pipeline.execute(ApiRequest::get("/x")).await.unwrap_err();
        assert_eq!(error.as_api().map(|e| e.status), Some(500));
    }

    #[tokio::test]
    async fn test_rejected_refresh_clears_session() {
        let (storage, store) = logged_in_store().await;
        let mut events = store.subscribe();
        let (transport, pipeline) = pipeline(
            ScriptedTransport::new([
                unauthorized(),
                status(401, json!({ "message": "Invalid refresh token" })),
            ]),
            &store,
        );

        let error = pipeline.execute(ApiRequest::get("/users/me")).await.unwrap_err();

        assert_eq!(
            error,
            ApplicationError::Auth(AuthError::RefreshRejected { status: 401 })
        );
        assert_eq!(transport.sent().len(), 2);
        assert!(store.session().await.is_empty());
        assert!(storage.is_empty());
        assert!(matches!(
            events.recv().await.unwrap(),
            SessionEvent::Expired { .. }
        ));
    }

    #[tokio::test]
    async fn test_malformed_refresh_body_clears_session() {
        let (_, store) = logged_in_store().await;
        let (_, pipeline) = pipeline(
            ScriptedTransport::new([unauthorized(), ok(json!({ "token": "nope" }))]),
            &store,
        );

        let error = pipeline.execute(ApiRequest::get("/x")).await.unwrap_err();
        assert!(matches!(
            error,
            ApplicationError::Auth(AuthError::RefreshFailed { .. })
        ));
        assert!(store.session().await.is_empty());
    }

    #[tokio::test]
    async fn test_network_failure_during_refresh_clears_session() {
        let (_, store) = logged_in_store().await;
        let (_, pipeline) = pipeline(
            ScriptedTransport::new([
                unauthorized(),
                Err(NetworkError::Connection("reset".to_string())),
            ]),
            &store,
        );

        let error = pipeline.execute(ApiRequest::get("/x")).await.unwrap_err();
        assert!(error.is_auth());
        assert!(store.session().await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_refresh_token_skips_refresh_call() {
        let store = Arc::new(TokenStore::in_memory());
        let (transport, pipeline) = pipeline(ScriptedTransport::new([unauthorized()]), &store);

        let error = pipeline.execute(ApiRequest::get("/users/me")).await.unwrap_err();

        assert_eq!(error, ApplicationError::Auth(AuthError::MissingRefreshToken));
        assert_eq!(transport.sent(), vec![call("/users/me", None, false)]);
    }

    #[tokio::test]
    async fn test_failed_clear_surfaces_storage_error() {
        let (storage, store) = logged_in_store().await;
        let (_, pipeline) = pipeline(
            ScriptedTransport::new([unauthorized(), status(403, json!({}))]),
            &store,
        );
        storage.set_fail_writes(true);

        let error = pipeline.execute(ApiRequest::get("/x")).await.unwrap_err();
        assert!(matches!(error, ApplicationError::Storage(_)));
        assert!(store.session().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_save_after_refresh_surfaces_storage_error() {
        let (storage, store) = logged_in_store().await;
        let (transport, pipeline) = pipeline(
            ScriptedTransport::new([
                unauthorized(),
                ok(json!({ "access_token": "new-access", "refresh_token": "new-refresh" })),
            ]),
            &store,
        );
        storage.set_fail_writes(true);

        let error = pipeline.execute(ApiRequest::get("/x")).await.unwrap_err();
        assert!(matches!(error, ApplicationError::Storage(_)));
        assert_eq!(transport.sent().len(), 2);
        assert_eq!(store.access_token().await.as_deref(), Some("old-access"));
    }

    #[tokio::test]
    async fn test_logout_during_refresh_discards_new_tokens() {
        let (storage, store) = logged_in_store().await;
        let transport = Arc::new(HeldRefresh::new([
            unauthorized(),
            ok(json!({ "access_token": "new-access", "refresh_token": "new-refresh" })),
        ]));
        let pipeline = RequestPipeline::new(transport.clone(), store.clone());

        let logout = async {
            transport.started.notified().await;
            store.clear().await.unwrap();
            transport.release.notify_one();
        };
        let (result, ()) = tokio::join!(pipeline.execute(ApiRequest::get("/users/me")), logout);

        assert_eq!(result.unwrap_err(), ApplicationError::Auth(AuthError::SessionEnded));
        assert!(store.session().await.is_empty());
        assert!(storage.is_empty());
        assert_eq!(transport.inner.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_session_from_newer_login() {
        let (storage, store) = logged_in_store().await;
        let mut events = store.subscribe();
        let transport = Arc::new(HeldRefresh::new([
            unauthorized(),
            status(401, json!({ "message": "Invalid refresh token" })),
        ]));
        let pipeline = RequestPipeline::new(transport.clone(), store.clone());

        let relogin = async {
            transport.started.notified().await;
            store.clear().await.unwrap();
            store.save(TokenPair::new("login-access", "login-refresh")).await.unwrap();
            transport.release.notify_one();
        };
        let (result, ()) = tokio::join!(pipeline.execute(ApiRequest::get("/users/me")), relogin);

        assert!(result.unwrap_err().is_auth());
        assert_eq!(store.access_token().await.as_deref(), Some("login-access"));
        assert_eq!(storage.raw("refresh_token").as_deref(), Some("login-refresh"));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_public_request_never_refreshes() {
        let (_, store) = logged_in_store().await;
        let (transport, pipeline) = pipeline(
            ScriptedTransport::new([status(401, json!({ "message": "Invalid credentials" }))]),
            &store,
        );

        let error = pipeline
            .execute_public(ApiRequest::post("/auth/login"))
            .await
            .unwrap_err();

        assert_eq!(error.as_api().and_then(ApiError::message), Some("Invalid credentials"));
        assert_eq!(transport.sent(), vec![call("/auth/login", None, false)]);
        assert_eq!(store.access_token().await.as_deref(), Some("old-access"));
    }

    #[tokio::test]
    async fn test_invalid_path_is_rejected_before_sending() {
        let store = Arc::new(TokenStore::in_memory());
        let (transport, pipeline) = pipeline(ScriptedTransport::default(), &store);

        let error = pipeline.execute(ApiRequest::get("users/me")).await.unwrap_err();
        assert!(matches!(error, ApplicationError::Domain(_)));
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_decode_error() {
        let store = Arc::new(TokenStore::in_memory());
        let (_, pipeline) = pipeline(ScriptedTransport::new([ok(json!({ "unexpected": true }))]), &store);

        let result = pipeline
            .execute_json::<Vec<String>>(ApiRequest::get("/tarot/cards/all"))
            .await;
        assert!(matches!(result, Err(ApplicationError::Decode(_))));
    }
}
