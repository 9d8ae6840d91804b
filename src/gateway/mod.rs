//! Local-first dispatch gateway.
//!
//! Each request takes exactly one of three routes:
//!
//! - **Force-proxy:** path matches a force-proxy rule; forwarded upstream
//!   without touching the filesystem.
//! - **Local:** a file exists under the asset root; served from disk.
//! - **Fallback:** forwarded upstream; an upstream 404 is reported to the
//!   supervisor before the 404 is returned unchanged.

pub mod local;
pub mod notify;
pub mod server;
pub mod upstream;

use http::{Request, Response, StatusCode};
use http_body::Body;
use hyper::body::Incoming;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::proxy_body::{BoxError, ProxyBody};
use crate::rules::RuleTable;

pub use local::LocalStore;
pub use notify::{MissNotifier, SupervisorMessage};
pub use server::{Handler, serve};
pub use upstream::Upstream;

/// Route chosen for a request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    ForceProxy,
    Local(PathBuf),
    Fallback,
}

#[derive(Clone)]
pub struct DispatchGateway {
    inner: Arc<GatewayInner>,
}

struct GatewayInner {
    rules: Arc<RuleTable>,
    local: LocalStore,
    upstream: Upstream,
    notifier: MissNotifier,
}

impl DispatchGateway {
    pub fn new(
        rules: Arc<RuleTable>,
        local: LocalStore,
        upstream: Upstream,
        notifier: MissNotifier,
    ) -> Self {
        Self {
            inner: Arc::new(GatewayInner {
                rules,
                local,
                upstream,
                notifier,
            }),
        }
    }

    pub fn rules(&self) -> &RuleTable {
        &self.inner.rules
    }

    /// Pick a route for `path`. Force-proxy paths never hit the filesystem.
    pub async fn dispatch(&self, path: &str) -> Dispatch {
        if self.inner.rules.is_force_proxy(path) {
            return Dispatch::ForceProxy;
        }
        match self.inner.local.lookup(path).await {
            Some(file) => Dispatch::Local(file),
            None => Dispatch::Fallback,
        }
    }

    /// Answer one request. Upstream failures become 502 responses.
    pub async fn handle<B>(&self, req: Request<B>) -> Response<ProxyBody>
    where
        B: Body<Data = bytes::Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let path = req.uri().path().to_string();
        match self.dispatch(&path).await {
            Dispatch::ForceProxy => {
                info!(path, "force proxy");
                self.forward(req).await
            }
            Dispatch::Local(file) => {
                debug!(path, file = %file.display(), "serving local");
                self.inner.local.serve(req.method(), &file).await
            }
            Dispatch::Fallback => {
                let response = self.forward(req).await;
                if response.status() == StatusCode::NOT_FOUND {
                    info!(path, "missing locally and upstream");
                    self.inner.notifier.notify_missing(&path);
                } else {
                    debug!(path, status = %response.status(), "fallback to upstream");
                }
                response
            }
        }
    }

    async fn forward<B>(&self, req: Request<B>) -> Response<ProxyBody>
    where
        B: Body<Data = bytes::Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        match self.inner.upstream.forward(req).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, upstream = self.inner.upstream.authority(), "upstream unavailable");
                e.into_response()
            }
        }
    }
}

impl Handler for DispatchGateway {
    fn call(&self, req: Request<Incoming>) -> impl Future<Output = Response<ProxyBody>> + Send {
        let span = info_span!(
            "gateway_request",
            request_id = %uuid::Uuid::new_v4(),
            method = %req.method(),
            path = %req.uri().path(),
        );
        let gateway = self.clone();
        async move { gateway.handle(req).await }.instrument(span)
    }
}
