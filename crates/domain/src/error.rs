//! Domain error types

use thiserror::Error;

/// Domain-level errors that can occur during validation or processing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// The configured base URL is invalid or cannot carry a path.
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),

    /// A request path is empty or not rooted.
    #[error("invalid request path: {0}")]
    InvalidPath(String),

    /// A header name is invalid.
    #[error("invalid header name: {0}")]
    InvalidHeaderName(String),

    /// A request body cannot be encoded as JSON.
    #[error("invalid body: {0}")]
    InvalidBody(String),

    /// The HTTP method is not supported.
    #[error("unsupported HTTP method: {0}")]
    UnsupportedMethod(String),

    /// A spread cannot be built from the given cards.
    #[error("invalid spread: {0}")]
    InvalidSpread(String),
}

/// Result type alias for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
