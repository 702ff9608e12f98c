//! Client Settings Domain Model
//!
//! Deployment-dependent settings for reaching the backend.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{DomainError, DomainResult};

/// Default backend address used during development.
pub const DEFAULT_BASE_URL: &str = "http://localhost:3001";

/// Default per-request deadline.
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Settings for the API client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Backend base URL; request paths are appended to its path.
    pub base_url: String,
    /// Per-request deadline in milliseconds. Expiry surfaces as a network error.
    pub timeout_ms: u64,
    /// `User-Agent` sent with every request.
    pub user_agent: String,
    /// Directory holding the persisted session. `None` uses the platform data dir.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_dir: Option<PathBuf>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            user_agent: format!("Mystic/{}", env!("CARGO_PKG_VERSION")),
            storage_dir: None,
        }
    }
}

impl ClientSettings {
    /// Creates settings for the given base URL with defaults elsewhere.
    #[must_use]
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Parses and validates the base URL.
    ///
    /// # Errors
    ///
    /// Returns `InvalidBaseUrl` unless the URL is absolute `http(s)` and can
    /// carry a path.
    pub fn parsed_base_url(&self) -> DomainResult<Url> {
        let url = Url::parse(self.base_url.trim())
            .map_err(|e| DomainError::InvalidBaseUrl(format!("{e}: {}", self.base_url)))?;

        if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
            return Err(DomainError::InvalidBaseUrl(self.base_url.clone()));
        }

        Ok(url)
    }

    /// The request deadline as a `Duration`.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
