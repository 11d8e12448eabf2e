//! HTTP client for the scan endpoint.
//!
//! One decoded payload becomes one JSON `POST` of
//! `{ "qr_code": ..., "event_id": ... }`. Any non-2xx status is a hard
//! error regardless of the body.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use thiserror::Error;

use crate::scanner::verdict::{ScanRequest, ScanResponse};

/// Errors from one scan round trip.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// The request could not be sent or the response not received.
    #[error("network error: {0}")]
    Network(String),

    /// The server answered with a non-success status.
    #[error("HTTP error! status: {0}")]
    Http(u16),

    /// The response body was not the expected JSON.
    #[error("invalid response body: {0}")]
    Decode(String),
}

/// Sends decoded payloads to the server.
#[async_trait]
pub trait VerdictClient: Send + Sync {
    /// Submit one scan and return the server's raw response.
    async fn submit(&self, request: &ScanRequest) -> Result<ScanResponse, DispatchError>;
}

/// Errors building the HTTP client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The endpoint could not be resolved against the server URL.
    #[error("invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    /// reqwest refused the client configuration.
    #[error("failed to build HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}

/// Resolve `endpoint` against `server_url`.
///
/// Absolute endpoints are used as-is; relative ones (the default
/// `/api/scan-qr`) are joined onto the server URL.
///
/// # Errors
///
/// Returns [`ClientError::InvalidEndpoint`] if either part does not parse.
pub fn resolve_endpoint(server_url: &str, endpoint: &str) -> Result<Url, ClientError> {
    let invalid = |reason: String| ClientError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason,
    };

    if let Ok(url) = Url::parse(endpoint) {
        return Ok(url);
    }
    let base = Url::parse(server_url).map_err(|e| invalid(e.to_string()))?;
    base.join(endpoint).map_err(|e| invalid(e.to_string()))
}

/// [`VerdictClient`] over `reqwest`.
#[derive(Clone)]
pub struct HttpVerdictClient {
    http: Client,
    endpoint: Url,
}

impl HttpVerdictClient {
    /// Build a client posting to `endpoint` with the given request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Build`] if the TLS backend cannot initialise.
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self, ClientError> {
        let http = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            // Redirects would turn the POST into a GET.
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(concat!("qrattend/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, endpoint })
    }

    /// The resolved endpoint URL.
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl VerdictClient for HttpVerdictClient {
    async fn submit(&self, request: &ScanRequest) -> Result<ScanResponse, DispatchError> {
        log::debug!(
            "POST {} (event {}, {} byte payload)",
            self.endpoint,
            request.event_id,
            request.qr_code.len()
        );

        let response = self
            .http
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .await
            .map_err(|e| DispatchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DispatchError::Http(status.as_u16()));
        }

        response
            .json::<ScanResponse>()
            .await
            .map_err(|e| DispatchError::Decode(e.to_string()))
    }
}
