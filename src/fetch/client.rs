//! HTTP page client: the trait seam for outbound GETs and its reqwest
//! implementation.
//!
//! The [`PageClient`] trait is the engine's only network surface. Production
//! code uses [`HttpClient`]; tests substitute instrumented stubs to observe
//! concurrency and inject failures without a real server.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::FetchError;

/// Default connect timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default per-request timeout.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// User agent sent with every request.
const USER_AGENT: &str = concat!("webtoon-dl/", env!("CARGO_PKG_VERSION"));

/// Object-safe async GET used for every outbound fetch.
#[async_trait]
pub trait PageClient: Send + Sync {
    /// Fetches the resource at `url` and returns its payload bytes.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] describing the network, timeout, or HTTP
    /// status failure.
    async fn get(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Reqwest-backed [`PageClient`] with connect/read timeouts.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Creates a client with default timeouts (30s connect, 120s request).
    #[must_use]
    pub fn new() -> Self {
        Self::new_with_timeouts(DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Creates a client with custom timeouts.
    #[must_use]
    pub fn new_with_timeouts(connect_timeout: Duration, request_timeout: Duration) -> Self {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .user_agent(USER_AGENT)
            .build()
            // Builder only fails on TLS backend misconfiguration; fall back
            // to the default client rather than poisoning construction.
            .unwrap_or_else(|_| Client::new());
        Self { client }
    }

    /// Wraps this client for shared use by the fetch pipeline.
    #[must_use]
    pub fn shared(self) -> Arc<dyn PageClient> {
        Arc::new(self)
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PageClient for HttpClient {
    async fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        if reqwest::Url::parse(url).is_err() {
            return Err(FetchError::invalid_url(url));
        }

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::timeout(url)
            } else {
                FetchError::network(url, e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::http_status(url, status.as_u16()));
        }

        let bytes = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::timeout(url)
            } else {
                FetchError::network(url, e)
            }
        })?;

        debug!(url, bytes = bytes.len(), "fetched resource");
        Ok(bytes.to_vec())
    }
}
