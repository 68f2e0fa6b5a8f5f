//! HTTP seam for the `/models` request.

use std::{sync::LazyLock, time::Duration};

use {
    async_trait::async_trait,
    reqwest::header::{HeaderMap, RETRY_AFTER},
    tracing::debug,
};

/// A single GET the discovery service wants performed.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub url: String,
    pub headers: HeaderMap,
    pub timeout: Duration,
}

/// Status, body and rate-limit hint of a completed request.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
    pub retry_after: Option<Duration>,
}

impl TransportResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
            retry_after: None,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("response body exceeds {limit} bytes")]
    TooLarge { limit: usize },

    #[error("response body is not valid UTF-8")]
    NotUtf8,

    #[error("request failed: {0}")]
    Other(String),
}

/// Performs HTTP GETs. Swapped for an in-process double in tests.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

/// Shared HTTP client so every transport reuses one connection pool,
/// DNS cache and TLS session store.
pub fn shared_http_client() -> &'static reqwest::Client {
    static CLIENT: LazyLock<reqwest::Client> = LazyLock::new(reqwest::Client::new);
    &CLIENT
}

/// Parse `Retry-After` as delta-seconds. HTTP-date values are ignored.
pub fn retry_after_from_headers(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?;
    let seconds = value.to_str().ok()?.trim().parse::<u64>().ok()?;
    Some(Duration::from_secs(seconds))
}

/// [`HttpTransport`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    max_body_bytes: usize,
}

impl ReqwestTransport {
    pub fn new(max_body_bytes: usize) -> Self {
        Self::with_client(shared_http_client().clone(), max_body_bytes)
    }

    pub fn with_client(client: reqwest::Client, max_body_bytes: usize) -> Self {
        Self {
            client,
            max_body_bytes,
        }
    }

    fn classify(&self, error: reqwest::Error, timeout: Duration) -> TransportError {
        if error.is_timeout() {
            TransportError::Timeout(timeout)
        } else if error.is_connect() {
            TransportError::Connect(error.without_url().to_string())
        } else {
            TransportError::Other(error.without_url().to_string())
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let timeout = request.timeout;
        let mut response = self
            .client
            .get(&request.url)
            .headers(request.headers)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| self.classify(e, timeout))?;

        let status = response.status().as_u16();
        let retry_after = retry_after_from_headers(response.headers());
        let limit = self.max_body_bytes;
        if response
            .content_length()
            .is_some_and(|len| len > limit as u64)
        {
            return Err(TransportError::TooLarge { limit });
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| self.classify(e, timeout))?
        {
            if body.len() + chunk.len() > limit {
                return Err(TransportError::TooLarge { limit });
            }
            body.extend_from_slice(&chunk);
        }
        debug!(status, bytes = body.len(), "received models response");

        // Error bodies only feed a truncated message, so they may be lossy.
        let body = match String::from_utf8(body) {
            Ok(body) => body,
            Err(_) if (200..300).contains(&status) => return Err(TransportError::NotUtf8),
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        };

        Ok(TransportResponse {
            status,
            body,
            retry_after,
        })
    }
}
