//! Accept loop shared by the dispatch gateway and the static server.

use http::{Request, Response};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use std::convert::Infallible;
use std::future::Future;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::proxy_body::ProxyBody;

/// A request handler that never fails at the connection level; every error
/// is already a response.
pub trait Handler: Clone + Send + Sync + 'static {
    fn call(&self, req: Request<Incoming>) -> impl Future<Output = Response<ProxyBody>> + Send;
}

/// Serve `listener` until `shutdown` fires. Each connection gets its own
/// task; a failing connection never affects the others.
pub async fn serve<H: Handler>(listener: TcpListener, handler: H, shutdown: CancellationToken) {
    let local = listener.local_addr().ok();
    info!(addr = ?local, "listening");

    loop {
        let (stream, peer) = tokio::select! {
            () = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    continue;
                }
            },
        };

        let handler = handler.clone();
        let conn_shutdown = shutdown.child_token();
        tokio::spawn(async move {
            let service = service_fn(move |req| {
                let handler = handler.clone();
                async move { Ok::<_, Infallible>(handler.call(req).await) }
            });
            let builder = auto::Builder::new(TokioExecutor::new());
            let conn = builder.serve_connection(TokioIo::new(stream), service);
            tokio::pin!(conn);

            tokio::select! {
                result = conn.as_mut() => {
                    if let Err(e) = result {
                        debug!(%peer, error = %e, "connection ended with error");
                    }
                }
                () = conn_shutdown.cancelled() => {
                    conn.as_mut().graceful_shutdown();
                    if let Err(e) = conn.await {
                        debug!(%peer, error = %e, "connection ended during shutdown");
                    }
                }
            }
        });
    }

    info!(addr = ?local, "listener stopped");
}
