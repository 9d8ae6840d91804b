//! Standalone static server for the web root.
//!
//! Serves files from disk only: no rules, no upstream, no notifications.

use http::{Request, Response, StatusCode};
use hyper::body::Incoming;
use std::sync::Arc;
use tracing::{Instrument, debug, info_span};

use crate::gateway::{Handler, LocalStore};
use crate::proxy_body::{self, ProxyBody};

#[derive(Clone)]
pub struct StaticServer {
    store: Arc<LocalStore>,
}

impl StaticServer {
    pub fn new(store: LocalStore) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    pub async fn handle<B>(&self, req: Request<B>) -> Response<ProxyBody> {
        let path = req.uri().path();
        match self.store.lookup(path).await {
            Some(file) => self.store.serve(req.method(), &file).await,
            None => {
                debug!(path, "static miss");
                let mut response = Response::new(proxy_body::full("404 Not Found"));
                *response.status_mut() = StatusCode::NOT_FOUND;
                response
            }
        }
    }
}

impl Handler for StaticServer {
    fn call(&self, req: Request<Incoming>) -> impl Future<Output = Response<ProxyBody>> + Send {
        let span = info_span!(
            "static_request",
            request_id = %uuid::Uuid::new_v4(),
            path = %req.uri().path(),
        );
        let server = self.clone();
        async move { server.handle(req).await }.instrument(span)
    }
}
