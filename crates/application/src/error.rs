//! Application error types
//!
//! The pipeline recovers from exactly one failure (an expired access token
//! with a valid refresh token). Everything else reaches the caller as one of
//! these variants.

use std::fmt;

use mystic_domain::DomainError;
use thiserror::Error;

/// The request never produced a response.
///
/// Recoverable by the caller (retry, backoff); the pipeline never retries it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkError {
    /// Request timed out.
    #[error("request timed out after {timeout_ms}ms")]
    Timeout {
        /// Deadline that was exceeded.
        timeout_ms: u64,
    },

    /// Connection refused by the host.
    #[error("connection refused: {host}:{port}")]
    ConnectionRefused {
        /// Target host
        host: String,
        /// Target port
        port: u16,
    },

    /// DNS resolution failed.
    #[error("DNS resolution failed for {host}: {message}")]
    Dns {
        /// Host that failed to resolve
        host: String,
        /// Resolver message
        message: String,
    },

    /// Connection failed for another reason (TLS, reset, ...).
    #[error("connection failed: {0}")]
    Connection(String),

    /// The request could not be built or the body could not be read.
    #[error("transport error: {0}")]
    Other(String),
}

/// The session is invalid and could not be recovered by a refresh.
///
/// Terminal for the current session: the caller must re-authenticate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No refresh token is stored, so no refresh can be attempted.
    #[error("no refresh token stored")]
    MissingRefreshToken,

    /// The backend rejected the refresh token.
    #[error("refresh token rejected with status {status}")]
    RefreshRejected {
        /// Status returned by `/auth/refresh`
        status: u16,
    },

    /// The refresh call failed without a usable answer.
    #[error("token refresh failed: {reason}")]
    RefreshFailed {
        /// Underlying cause
        reason: String,
    },

    /// The session was logged out or replaced while its refresh was in flight.
    ///
    /// The refreshed tokens were discarded.
    #[error("session ended while the token was being refreshed")]
    SessionEnded,

    /// The request was still unauthorized after its one replay.
    #[error("request still unauthorized after token refresh")]
    RetryExhausted,
}

/// The server answered with a non-2xx status other than a recoverable 401.
///
/// The payload is the server's body, passed through verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct ApiError {
    /// HTTP status code
    pub status: u16,
    /// Server payload (JSON, a JSON string for text bodies, or null)
    pub payload: serde_json::Value,
}

impl ApiError {
    /// Creates an API error.
    #[must_use]
    pub const fn new(status: u16, payload: serde_json::Value) -> Self {
        Self { status, payload }
    }

    /// The server's `message` field, or a plain-text body.
    ///
    /// NestJS-style validation errors carry `message` as an array; the first
    /// entry is returned.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        match &self.payload {
            serde_json::Value::String(text) => Some(text.as_str()),
            serde_json::Value::Object(map) => match map.get("message") {
                Some(serde_json::Value::String(message)) => Some(message.as_str()),
                Some(serde_json::Value::Array(messages)) => {
                    messages.first().and_then(serde_json::Value::as_str)
                }
                _ => None,
            },
            _ => None,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "API error {}: {}",
            self.status,
            self.message().unwrap_or("no message")
        )
    }
}

/// Persistence failure of the session storage backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// The backend could not be read or written.
    #[error("session storage unavailable: {0}")]
    Unavailable(String),

    /// A stored value could not be encoded or decoded.
    #[error("session serialization failed: {0}")]
    Serialization(String),
}

/// Application-level errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApplicationError {
    /// The request descriptor is invalid.
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),

    /// No response was received.
    #[error("network error: {0}")]
    Network(#[from] NetworkError),

    /// The session is invalid; re-authentication is required.
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    /// The server reported an error.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// A session write failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// A 2xx body did not match the expected shape.
    #[error("invalid response body: {0}")]
    Decode(String),
}

impl ApplicationError {
    /// Returns true if the session must be torn down and the user sent to login.
    #[must_use]
    pub const fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }

    /// Returns true if the request never reached the server.
    #[must_use]
    pub const fn is_network(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    /// The API error, if the server answered with one.
    #[must_use]
    pub const fn as_api(&self) -> Option<&ApiError> {
        match self {
            Self::Api(error) => Some(error),
            _ => None,
        }
    }
}

/// Result type alias for application operations.
pub type ApplicationResult<T> = Result<T, ApplicationError>;
