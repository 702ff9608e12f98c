//! HTTP transport port

use std::future::Future;

use mystic_domain::{ApiRequest, ApiResponse};

use crate::error::NetworkError;

/// Port for sending one API request to the backend.
///
/// Implementations resolve the request against the configured base URL,
/// attach `request.authorization()` when present and return whatever the
/// server answered. Any status code is a successful send; only the absence
/// of a response is an error.
pub trait HttpTransport: Send + Sync {
    /// Sends the request and returns the raw response.
    ///
    /// # Errors
    ///
    /// Returns a `NetworkError` if no response was received, including
    /// when the per-request deadline expires.
    fn execute(
        &self,
        request: &ApiRequest,
    ) -> impl Future<Output = Result<ApiResponse, NetworkError>> + Send;
}
