//! HTTP transport implementation using reqwest.
//!
//! This adapter implements the `HttpTransport` port. It resolves each
//! request against the configured API base, attaches the bearer header
//! chosen by the pipeline and returns every status code as a response.

use std::collections::HashMap;
use std::error::Error as _;
use std::time::{Duration, Instant};

use mystic_application::{ApplicationResult, HttpTransport, NetworkError};
use mystic_domain::{ApiRequest, ApiResponse, ClientSettings, HttpMethod};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, Method, Url};
use tracing::trace;

const MAX_REDIRECTS: usize = 10;

/// HTTP transport backed by `reqwest::Client`.
///
/// One instance is shared by the whole process so connections are pooled.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    base_url: Url,
    timeout_ms: u64,
}

impl ReqwestTransport {
    /// Creates a transport from client settings.
    ///
    /// Configuration:
    /// - Base URL and per-request timeout from `settings`
    /// - Follow redirects: up to 10
    /// - TLS verification: enabled
    /// - User-Agent: `settings.user_agent`
    ///
    /// # Errors
    ///
    /// Returns `Domain` if the base URL is invalid, `Network` if the client
    /// cannot be built.
    pub fn new(settings: &ClientSettings) -> ApplicationResult<Self> {
        let base_url = settings.parsed_base_url()?;
        let client = Client::builder()
            .user_agent(settings.user_agent.as_str())
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(|e| NetworkError::Other(e.to_string()))?;

        Ok(Self::with_client(client, base_url, settings.timeout_ms))
    }

    /// Creates a transport around an existing reqwest client.
    #[must_use]
    pub const fn with_client(client: Client, base_url: Url, timeout_ms: u64) -> Self {
        Self {
            client,
            base_url,
            timeout_ms,
        }
    }

    /// The API base every request path is resolved against.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Converts domain `HttpMethod` to reqwest `Method`.
    const fn to_reqwest_method(method: HttpMethod) -> Method {
        match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Delete => Method::DELETE,
        }
    }

    /// Maps reqwest errors to the port's `NetworkError`.
    fn map_error(error: &reqwest::Error, timeout_ms: u64) -> NetworkError {
        if error.is_timeout() {
            return NetworkError::Timeout { timeout_ms };
        }

        let host = || {
            error
                .url()
                .and_then(Url::host_str)
                .unwrap_or("unknown")
                .to_string()
        };

        if error.is_connect() {
            let message = error_chain(error);
            let lower = message.to_lowercase();
            if lower.contains("dns") || lower.contains("resolve") {
                return NetworkError::Dns {
                    host: host(),
                    message,
                };
            }
            if lower.contains("refused") {
                return NetworkError::ConnectionRefused {
                    host: host(),
                    port: error
                        .url()
                        .and_then(Url::port_or_known_default)
                        .unwrap_or(80),
                };
            }
            return NetworkError::Connection(message);
        }

        NetworkError::Other(error_chain(error))
    }
}

impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, NetworkError> {
        let url = request
            .resolve_url(&self.base_url)
            .map_err(|e| NetworkError::Other(e.to_string()))?;
        let timeout_ms = self.timeout_ms;

        let mut builder = self
            .client
            .request(Self::to_reqwest_method(request.method), url)
            .timeout(Duration::from_millis(timeout_ms))
            .header(ACCEPT, "application/json");

        if let Some(authorization) = request.authorization() {
            builder = builder.header(AUTHORIZATION, authorization);
        }
        for (name, value) in request.extra_headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }
        // Sets Content-Type: application/json as well.
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let start = Instant::now();
        let response = builder
            .send()
            .await
            .map_err(|e| Self::map_error(&e, timeout_ms))?;

        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("<binary>").to_string()))
            .collect();

        let body = response
            .bytes()
            .await
            .map_err(|e| Self::map_error(&e, timeout_ms))?
            .to_vec();
        let duration = start.elapsed();

        trace!(request_id = %request.id, status, bytes = body.len(), "body read");
        Ok(ApiResponse::new(status, headers, body, duration))
    }
}

/// Joins an error with its sources; reqwest keeps the useful part in the chain.
fn error_chain(error: &reqwest::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
