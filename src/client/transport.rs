//! Network transport seam for the client adapters.
//!
//! Adapters never talk to the network directly; they hand a rewritten
//! [`ClientRequest`] to a [`NetworkTransport`]. [`ReqwestTransport`] is the
//! real implementation, tests plug in recording fakes.

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use thiserror::Error;

/// Status text carried by synthesized responses for blocked calls.
pub const BLOCKED_STATUS_TEXT: &str = "OK (blocked)";

/// Transport-level failure, surfaced to the caller unchanged.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The URL could not be used for a request
    #[error("Invalid request URL: {url}")]
    InvalidUrl {
        /// Offending URL
        url: String,
    },

    /// Connecting or exchanging data failed
    #[error("Request to {url} failed: {details}")]
    Request {
        /// Target URL
        url: String,
        /// Error details
        details: String,
    },
}

/// An outgoing call as issued by the page.
#[derive(Debug, Clone)]
pub struct ClientRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ClientRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }
}

/// A settled response.
#[derive(Debug, Clone)]
pub struct ClientResponse {
    pub status: StatusCode,
    pub status_text: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ClientResponse {
    /// Empty success returned in place of a blocked call.
    pub fn blocked() -> Self {
        Self {
            status: StatusCode::OK,
            status_text: BLOCKED_STATUS_TEXT.to_string(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Body as text, lossy for invalid UTF-8.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Performs the real network I/O for an adapter.
#[async_trait]
pub trait NetworkTransport: Send + Sync {
    async fn send(&self, request: ClientRequest) -> Result<ClientResponse, TransportError>;
}

/// [`NetworkTransport`] backed by a pooled `reqwest` client.
///
/// Host-relative URLs are resolved against the page origin set with
/// [`with_base`](Self::with_base), normally the local gateway.
#[derive(Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    base: Option<url::Url>,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client, base: None }
    }

    pub fn with_base(mut self, base: &str) -> Result<Self, TransportError> {
        let url = url::Url::parse(base).map_err(|_| TransportError::InvalidUrl {
            url: base.to_string(),
        })?;
        self.base = Some(url);
        Ok(self)
    }

    fn resolve(&self, url: &str) -> Result<url::Url, TransportError> {
        let parsed = match &self.base {
            Some(base) => base.join(url),
            None => url::Url::parse(url),
        };
        parsed.map_err(|_| TransportError::InvalidUrl {
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl NetworkTransport for ReqwestTransport {
    async fn send(&self, request: ClientRequest) -> Result<ClientResponse, TransportError> {
        let url = self.resolve(&request.url)?;

        let response = self
            .client
            .request(request.method, url)
            .headers(request.headers)
            .body(request.body)
            .send()
            .await
            .map_err(|e| TransportError::Request {
                url: request.url.clone(),
                details: e.to_string(),
            })?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(|e| TransportError::Request {
            url: request.url.clone(),
            details: e.to_string(),
        })?;

        Ok(ClientResponse {
            status,
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
        })
    }
}
