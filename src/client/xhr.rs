//! Event-style adapter (the `XMLHttpRequest` primitive).
//!
//! Completion is always delivered on a spawned task, never from inside
//! [`XhrRequest::send`]; blocked requests follow the same rule so callers
//! that register handlers after `send` still observe the completion.

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

use super::transport::{ClientRequest, ClientResponse, NetworkTransport, TransportError};
use super::RequestRouter;
use crate::decision::RouteDecision;

/// Final state handed to the completion callback. Receiving one means the
/// request is done.
#[derive(Debug, Clone)]
pub struct XhrCompletion {
    pub status: StatusCode,
    pub status_text: String,
    pub headers: HeaderMap,
    pub response: Bytes,
}

impl XhrCompletion {
    /// Body decoded as text, lossy for invalid UTF-8.
    pub fn response_text(&self) -> String {
        String::from_utf8_lossy(&self.response).into_owned()
    }
}

impl From<ClientResponse> for XhrCompletion {
    fn from(r: ClientResponse) -> Self {
        Self {
            status: r.status,
            status_text: r.status_text,
            headers: r.headers,
            response: r.body,
        }
    }
}

/// Factory for routed event-style requests.
pub struct XhrAdapter<T> {
    router: Arc<RequestRouter>,
    transport: Arc<T>,
}

impl<T> Clone for XhrAdapter<T> {
    fn clone(&self) -> Self {
        Self {
            router: self.router.clone(),
            transport: self.transport.clone(),
        }
    }
}

impl<T: NetworkTransport + 'static> XhrAdapter<T> {
    pub fn new(router: Arc<RequestRouter>, transport: Arc<T>) -> Self {
        Self { router, transport }
    }

    /// Classify and rewrite `url`; no I/O happens until `send`.
    pub fn open(&self, method: Method, url: &str) -> XhrRequest<T> {
        let decision = self.router.resolve(url);
        if decision.is_block() {
            info!(url, "blocked telemetry request (xhr)");
        }
        XhrRequest {
            method,
            original_url: url.to_string(),
            decision,
            headers: HeaderMap::new(),
            router: self.router.clone(),
            transport: self.transport.clone(),
        }
    }
}

/// An opened event-style request.
pub struct XhrRequest<T> {
    method: Method,
    original_url: String,
    decision: RouteDecision,
    headers: HeaderMap,
    router: Arc<RequestRouter>,
    transport: Arc<T>,
}

impl<T: NetworkTransport + 'static> XhrRequest<T> {
    pub fn set_request_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.append(name, value);
    }

    pub fn decision(&self) -> &RouteDecision {
        &self.decision
    }

    /// Start the request. `on_complete` runs exactly once, on another task.
    pub fn send<F>(self, body: Option<Bytes>, on_complete: F) -> JoinHandle<()>
    where
        F: FnOnce(Result<XhrCompletion, TransportError>) + Send + 'static,
    {
        let Some(target) = self.decision.target().map(str::to_string) else {
            return tokio::spawn(async move {
                on_complete(Ok(XhrCompletion::from(ClientResponse::blocked())));
            });
        };

        let mut request = ClientRequest::new(self.method, target);
        request.headers = self.headers;
        if let Some(body) = body {
            request.body = body;
        }

        let router = self.router;
        let transport = self.transport;
        let original_url = self.original_url;
        tokio::spawn(async move {
            match transport.send(request).await {
                Ok(response) => {
                    if router.is_login(&original_url) {
                        drop(router.capture_login(response.body.clone()));
                    }
                    on_complete(Ok(XhrCompletion::from(response)));
                }
                Err(e) => on_complete(Err(e)),
            }
        })
    }
}
