//! Request descriptor passed through the request pipeline

use std::borrow::Cow;
use std::fmt;

use serde::Serialize;
use url::Url;
use uuid::Uuid;

use super::HttpMethod;
use crate::error::{DomainError, DomainResult};
use crate::session::{bearer, token_preview};

/// Per-request authentication context.
///
/// Records which access token the request was sent with and whether it
/// has already been replayed after a refresh. The retry flag lives on the
/// request itself so it survives the request being resubmitted through a
/// different code path.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AuthAttempt {
    token: Option<String>,
    retried: bool,
}

impl AuthAttempt {
    /// The access token attached to the last send, if any.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Returns true once the request has been replayed.
    #[must_use]
    pub const fn is_retried(&self) -> bool {
        self.retried
    }
}

impl fmt::Debug for AuthAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthAttempt")
            .field("token", &self.token.as_deref().map(token_preview))
            .field("retried", &self.retried)
            .finish()
    }
}

/// Percent-encodes a value so it occupies exactly one path segment.
///
/// Use for ids, slugs and user-entered text interpolated into a path:
/// `love/career` stays one segment and `why?` does not start a query.
#[must_use]
pub fn path_segment(value: &str) -> Cow<'_, str> {
    urlencoding::encode(value)
}

/// An outbound API call: method, path relative to the base URL, query,
/// headers and an optional JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// Correlation id used in logs.
    pub id: Uuid,
    /// HTTP method
    pub method: HttpMethod,
    /// Path relative to the API base, starting with `/`
    pub path: String,
    /// Query parameters in insertion order
    pub query: Vec<(String, String)>,
    /// Extra headers (the pipeline owns `Authorization`)
    pub headers: Vec<(String, String)>,
    /// JSON body
    pub body: Option<serde_json::Value>,
    auth: AuthAttempt,
}

impl ApiRequest {
    /// Creates a request with the given method and path.
    #[must_use]
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
            auth: AuthAttempt::default(),
        }
    }

    /// Creates a GET request.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    /// Creates a POST request.
    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    /// Creates a PUT request.
    #[must_use]
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, path)
    }

    /// Creates a DELETE request.
    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path)
    }

    /// Sets a raw JSON body.
    #[must_use]
    pub fn with_json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Serializes `body` as the JSON body.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be represented as JSON.
    pub fn with_body<T: Serialize + ?Sized>(self, body: &T) -> DomainResult<Self> {
        let value =
            serde_json::to_value(body).map_err(|e| DomainError::InvalidBody(e.to_string()))?;
        Ok(self.with_json(value))
    }

    /// Appends a query parameter.
    #[must_use]
    pub fn with_query(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((name.into(), value.to_string()));
        self
    }

    /// Sets a header, replacing any existing header with the same name.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
        self
    }

    /// Attaches (or removes) the access token for the next send.
    pub fn authorize(&mut self, token: Option<String>) {
        self.auth.token = token;
    }

    /// Marks the request as replayed after a refresh.
    pub const fn mark_retried(&mut self) {
        self.auth.retried = true;
    }

    /// The authentication context of this request.
    #[must_use]
    pub const fn auth(&self) -> &AuthAttempt {
        &self.auth
    }

    /// The `Authorization` header value, if a token is attached.
    #[must_use]
    pub fn authorization(&self) -> Option<String> {
        self.auth.token().map(bearer)
    }

    /// Headers other than `Authorization`.
    pub fn extra_headers(&self) -> impl Iterator<Item = &(String, String)> {
        self.headers
            .iter()
            .filter(|(name, _)| !name.eq_ignore_ascii_case("authorization"))
    }

    /// Checks that the path is rooted and non-empty.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPath` for an empty or relative path.
    pub fn validate(&self) -> DomainResult<()> {
        if !self.path.starts_with('/') || self.path.trim_matches('/').trim().is_empty() {
            return Err(DomainError::InvalidPath(self.path.clone()));
        }
        if self.path.contains(['?', '#']) {
            return Err(DomainError::InvalidPath(self.path.clone()));
        }
        Ok(())
    }

    /// Resolves the request against the API base URL.
    ///
    /// Path segments are appended to the base path, so a base of
    /// `http://host/api` and a path of `/auth/login` resolve to
    /// `http://host/api/auth/login`. Each segment is decoded and re-encoded,
    /// so segments built with [`path_segment`] are sent unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is invalid or the base cannot carry a path.
    pub fn resolve_url(&self, base: &Url) -> DomainResult<Url> {
        self.validate()?;

        let mut url = base.clone();
        url.set_query(None);
        url.set_fragment(None);
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| DomainError::InvalidBaseUrl(base.to_string()))?;
            segments.pop_if_empty();
            for segment in self.path.split('/').filter(|s| !s.is_empty()) {
                let decoded = urlencoding::decode(segment)
                    .map_err(|_| DomainError::InvalidPath(self.path.clone()))?;
                segments.push(&decoded);
            }
        }

        if !self.query.is_empty() {
            url.query_pairs_mut().extend_pairs(self.query.iter());
        }

        Ok(url)
    }
}
