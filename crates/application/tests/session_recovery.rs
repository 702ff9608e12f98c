//! End-to-end session recovery against an in-process fake backend.

#![allow(clippy::unwrap_used, clippy::expect_used, missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use mystic_application::{
    ApplicationError, AuthError, AuthService, HttpTransport, InMemorySessionStorage, NetworkError, RequestPipeline,
    SessionEvent, TokenStore,
};
use mystic_domain::{ApiRequest, ApiResponse, TokenPair};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tokio::sync::Barrier;

const EXPIRED: &str = "expired-access";

/// Backend with one valid access token and one valid refresh token.
///
/// Refreshing rotates both. Protected requests carrying the expired token
/// wait on the barrier before being rejected, so every concurrent caller is
/// guaranteed to observe its 401 before anyone can finish a refresh.
struct FakeBackend {
    valid_access: Mutex<Option<String>>,
    valid_refresh: Mutex<Option<String>>,
    generation: AtomicUsize,
    refresh_calls: AtomicUsize,
    protected_calls: Mutex<Vec<(Option<String>, bool)>>,
    expired_gate: Option<Barrier>,
}

impl FakeBackend {
    fn new(valid_access: Option<&str>, valid_refresh: Option<&str>) -> Self {
        Self {
            valid_access: Mutex::new(valid_access.map(str::to_owned)),
            valid_refresh: Mutex::new(valid_refresh.map(str::to_owned)),
            generation: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            protected_calls: Mutex::default(),
            expired_gate: None,
        }
    }

    fn with_gate(mut self, callers: usize) -> Self {
        self.expired_gate = Some(Barrier::new(callers));
        self
    }

    fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    fn protected_calls(&self) -> Vec<(Option<String>, bool)> {
        self.protected_calls.lock().clone()
    }

    async fn refresh(&self, request: &ApiRequest) -> ApiResponse {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;

        let presented = request
            .body
            .as_ref()
            .and_then(|b| b.get("refresh_token"))
            .and_then(Value::as_str)
            .map(str::to_owned);
        let accepted = {
            let mut refresh = self.valid_refresh.lock();
            if presented.is_some() && *refresh == presented {
                let n = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
                let pair = (format!("access-{n}"), format!("refresh-{n}"));
                *refresh = Some(pair.1.clone());
                *self.valid_access.lock() = Some(pair.0.clone());
                Some(pair)
            } else {
                None
            }
        };

        match accepted {
            Some((access, refresh)) => {
                ApiResponse::json_body(200, &json!({ "access_token": access, "refresh_token": refresh }))
            }
            None => ApiResponse::json_body(401, &json!({ "message": "Invalid refresh token" })),
        }
    }

    async fn protected(&self, request: &ApiRequest) -> ApiResponse {
        let token = request.auth().token().map(str::to_owned);
        self.protected_calls
            .lock()
            .push((token.clone(), request.auth().is_retried()));

        let valid = self.valid_access.lock().clone();
        if token.is_some() && token == valid {
            return ApiResponse::json_body(200, &json!({ "_id": "u1", "email": "luna@example.com" }));
        }
        if token.as_deref() == Some(EXPIRED) {
            if let Some(gate) = &self.expired_gate {
                gate.wait().await;
            }
        }
        ApiResponse::json_body(401, &json!({ "message": "Unauthorized", "statusCode": 401 }))
    }
}

impl HttpTransport for FakeBackend {
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, NetworkError> {
        match request.path.as_str() {
            "/auth/refresh" => Ok(self.refresh(request).await),
            "/auth/login" => Ok(ApiResponse::json_body(
                200,
                &json!({
                    "access_token": "login-access",
                    "refresh_token": "login-refresh",
                    "user": { "_id": "u1", "email": "luna@example.com", "roles": ["user"] }
                }),
            )),
            _ => Ok(self.protected(request).await),
        }
    }
}

async fn expired_session(
    backend: FakeBackend,
) -> (Arc<FakeBackend>, Arc<InMemorySessionStorage>, Arc<RequestPipeline<FakeBackend>>) {
    let storage = Arc::new(InMemorySessionStorage::new());
    let store = Arc::new(TokenStore::load(storage.clone()).await);
    store
        .save(TokenPair::new(EXPIRED, "refresh-0"))
        .await
        .unwrap();
    let backend = Arc::new(backend);
    let pipeline = Arc::new(RequestPipeline::new(backend.clone(), store));
    (backend, storage, pipeline)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_unauthorized_requests_share_one_refresh() {
    const CALLERS: usize = 6;
    let (backend, _, pipeline) =
        expired_session(FakeBackend::new(None, Some("refresh-0")).with_gate(CALLERS)).await;

    let handles: Vec<_> = (0..CALLERS)
        .map(|_| {
            let pipeline = Arc::clone(&pipeline);
            tokio::spawn(async move { pipeline.execute(ApiRequest::get("/users/me")).await })
        })
        .collect();

    for handle in handles {
        let response = handle.await.unwrap().unwrap();
        assert_eq!(response.status, 200);
    }

    assert_eq!(backend.refresh_calls(), 1);

    let calls = backend.protected_calls();
    let first_tries: Vec<_> = calls.iter().filter(|(_, retried)| !retried).collect();
    let replays: Vec<_> = calls.iter().filter(|(_, retried)| *retried).collect();
    assert_eq!(first_tries.len(), CALLERS);
    assert_eq!(replays.len(), CALLERS);
    assert!(
        replays
            .iter()
            .all(|(token, _)| token.as_deref() == Some("access-1"))
    );
    assert_eq!(
        pipeline.store().access_token().await.as_deref(),
        Some("access-1")
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_rejected_refresh_fails_every_waiter_and_clears_store() {
    const CALLERS: usize = 5;
    let (backend, storage, pipeline) =
        expired_session(FakeBackend::new(None, None).with_gate(CALLERS)).await;
    let mut events = pipeline.store().subscribe();

    let handles: Vec<_> = (0..CALLERS)
        .map(|_| {
            let pipeline = Arc::clone(&pipeline);
            tokio::spawn(async move { pipeline.execute(ApiRequest::get("/users/me")).await })
        })
        .collect();

    for handle in handles {
        let error = handle.await.unwrap().unwrap_err();
        assert!(error.is_auth(), "expected an auth error, got {error:?}");
    }

    assert_eq!(backend.refresh_calls(), 1);
    assert!(pipeline.store().session().await.is_empty());
    assert!(storage.is_empty());
    assert!(matches!(
        events.recv().await.unwrap(),
        SessionEvent::Expired { .. }
    ));
}

#[tokio::test]
async fn test_expired_access_with_valid_refresh_is_transparent() {
    let (backend, storage, pipeline) =
        expired_session(FakeBackend::new(None, Some("refresh-0"))).await;

    let body: Value = pipeline
        .execute_json(ApiRequest::get("/users/me"))
        .await
        .unwrap();

    assert_eq!(body["_id"], "u1");
    assert_eq!(backend.refresh_calls(), 1);
    assert_eq!(storage.raw("access_token").as_deref(), Some("access-1"));
    assert_eq!(storage.raw("refresh_token").as_deref(), Some("refresh-1"));
}

#[tokio::test]
async fn test_both_tokens_invalid_ends_session() {
    let (backend, storage, pipeline) = expired_session(FakeBackend::new(None, None)).await;

    let error = pipeline
        .execute(ApiRequest::get("/users/me"))
        .await
        .unwrap_err();

    assert_eq!(
        error,
        ApplicationError::Auth(AuthError::RefreshRejected { status: 401 })
    );
    assert_eq!(backend.refresh_calls(), 1);
    assert!(storage.is_empty());
}

#[tokio::test]
async fn test_sequential_expiries_refresh_each_time() {
    let (backend, _, pipeline) = expired_session(FakeBackend::new(None, Some("refresh-0"))).await;

    pipeline.execute(ApiRequest::get("/users/me")).await.unwrap();
    *backend.valid_access.lock() = Some("rotated-server-side".to_string());
    pipeline.execute(ApiRequest::get("/users/me")).await.unwrap();

    assert_eq!(backend.refresh_calls(), 2);
    assert_eq!(
        pipeline.store().refresh_token().await.as_deref(),
        Some("refresh-2")
    );
}

#[tokio::test]
async fn test_login_then_logout_round_trip() {
    let storage = Arc::new(InMemorySessionStorage::new());
    let store = Arc::new(TokenStore::load(storage.clone()).await);
    let backend = Arc::new(FakeBackend::new(Some("login-access"), Some("login-refresh")));
    let pipeline = Arc::new(RequestPipeline::new(backend.clone(), store.clone()));
    let auth = AuthService::new(pipeline);

    let login = auth.login("luna@example.com", "secret").await.unwrap();

    let session = store.session().await;
    assert_eq!(session.access_token.as_deref(), Some("login-access"));
    assert_eq!(session.refresh_token.as_deref(), Some("login-refresh"));
    assert_eq!(session.user, Some(login.user));
    assert_eq!(storage.len(), 3);

    let profile = auth.fetch_profile().await.unwrap();
    assert_eq!(profile.email, "luna@example.com");
    assert_eq!(backend.refresh_calls(), 0);

    auth.logout().await.unwrap();
    assert!(store.session().await.is_empty());
    assert!(storage.is_empty());
}

#[tokio::test]
async fn test_restored_session_survives_process_restart() {
    let storage = Arc::new(InMemorySessionStorage::new());
    {
        let store = TokenStore::load(storage.clone()).await;
        store
            .save(TokenPair::new("access-1", "refresh-1"))
            .await
            .unwrap();
    }

    let store = Arc::new(TokenStore::load(storage).await);
    let backend = Arc::new(FakeBackend::new(Some("access-1"), Some("refresh-1")));
    let pipeline = RequestPipeline::new(backend.clone(), store);

    pipeline.execute(ApiRequest::get("/users/me")).await.unwrap();
    assert_eq!(backend.protected_calls(), vec![(Some("access-1".to_string()), false)]);
}
