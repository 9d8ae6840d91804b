//! Call-style adapter (the `fetch` primitive).

use bytes::Bytes;
use http::{HeaderMap, Method};
use std::sync::Arc;
use tracing::info;

use super::transport::{ClientRequest, ClientResponse, NetworkTransport, TransportError};
use super::RequestRouter;

/// First argument of a fetch call: a bare URL or a full request object.
#[derive(Debug, Clone)]
pub enum RequestInfo {
    Url(String),
    Request(ClientRequest),
}

impl RequestInfo {
    pub fn url(&self) -> &str {
        match self {
            RequestInfo::Url(u) => u,
            RequestInfo::Request(r) => &r.url,
        }
    }

    fn into_request(self, init: RequestInit) -> ClientRequest {
        let mut request = match self {
            RequestInfo::Url(u) => ClientRequest::get(u),
            RequestInfo::Request(r) => r,
        };
        if let Some(method) = init.method {
            request.method = method;
        }
        request.headers.extend(init.headers);
        if let Some(body) = init.body {
            request.body = body;
        }
        request
    }
}

impl From<&str> for RequestInfo {
    fn from(url: &str) -> Self {
        RequestInfo::Url(url.to_string())
    }
}

impl From<String> for RequestInfo {
    fn from(url: String) -> Self {
        RequestInfo::Url(url)
    }
}

impl From<ClientRequest> for RequestInfo {
    fn from(request: ClientRequest) -> Self {
        RequestInfo::Request(request)
    }
}

/// Second argument of a fetch call; set fields override the request.
#[derive(Debug, Clone, Default)]
pub struct RequestInit {
    pub method: Option<Method>,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

/// Wraps a transport so every call goes through the router first.
pub struct FetchAdapter<T> {
    router: Arc<RequestRouter>,
    transport: Arc<T>,
}

impl<T> Clone for FetchAdapter<T> {
    fn clone(&self) -> Self {
        Self {
            router: self.router.clone(),
            transport: self.transport.clone(),
        }
    }
}

impl<T: NetworkTransport> FetchAdapter<T> {
    pub fn new(router: Arc<RequestRouter>, transport: Arc<T>) -> Self {
        Self { router, transport }
    }

    /// Issue a call with the same shape as the unwrapped primitive.
    ///
    /// Blocked targets resolve to an empty success without any I/O. Login
    /// responses are returned as soon as they settle; credential capture
    /// runs separately on a copy of the body.
    pub async fn fetch(
        &self,
        input: impl Into<RequestInfo>,
        init: RequestInit,
    ) -> Result<ClientResponse, TransportError> {
        let input = input.into();
        let original = input.url().to_string();

        let decision = self.router.resolve(&original);
        let Some(target) = decision.target() else {
            info!(url = %original, "blocked telemetry request");
            return Ok(ClientResponse::blocked());
        };

        let mut request = input.into_request(init);
        request.url = target.to_string();

        let response = self.transport.send(request).await?;

        if self.router.is_login(&original) {
            // Handle dropped on purpose: capture is unordered with delivery.
            drop(self.router.capture_login(response.body.clone()));
        }

        Ok(response)
    }
}
