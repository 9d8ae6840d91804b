//! Upstream forwarding.
//!
//! Requests are re-targeted at the configured origin with their method,
//! path, query, headers and body preserved. Bodies stream in both
//! directions.

use http::header::HOST;
use http::uri::{Authority, Scheme};
use http::{HeaderValue, Request, Response, Uri, Version};
use http_body::Body;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use rustls::{ClientConfig, RootCertStore};
use std::error::Error as StdError;
use tracing::{debug, warn};

use crate::error::GateError;
use crate::proxy_body::{self, BoxError, ProxyBody};

type HttpsClient = Client<HttpsConnector<HttpConnector>, ProxyBody>;

#[derive(Clone)]
pub struct Upstream {
    scheme: Scheme,
    authority: Authority,
    host_header: HeaderValue,
    client: HttpsClient,
}

impl std::fmt::Debug for Upstream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Upstream")
            .field("scheme", &self.scheme)
            .field("authority", &self.authority)
            .finish_non_exhaustive()
    }
}

impl Upstream {
    /// Build a forwarder for `base`, e.g. `https://www.nieo.cc`.
    ///
    /// # Errors
    ///
    /// Returns `GateError::InvalidUpstream` if `base` is not an absolute
    /// http(s) URL.
    pub fn new(base: &str) -> Result<Self, GateError> {
        let invalid = |details: String| GateError::InvalidUpstream {
            upstream: base.to_string(),
            details,
        };

        let uri: Uri = base.trim_end_matches('/').parse().map_err(
            |e: http::uri::InvalidUri| invalid(e.to_string()),
        )?;
        let scheme = uri
            .scheme()
            .cloned()
            .ok_or_else(|| invalid("missing scheme".to_string()))?;
        if scheme != Scheme::HTTP && scheme != Scheme::HTTPS {
            return Err(invalid(format!("unsupported scheme {scheme}")));
        }
        let authority = uri
            .authority()
            .cloned()
            .ok_or_else(|| invalid("missing host".to_string()))?;
        let host_header = HeaderValue::from_str(authority.as_str())
            .map_err(|e| invalid(e.to_string()))?;

        Ok(Self {
            scheme,
            authority,
            host_header,
            client: build_client(),
        })
    }

    pub fn authority(&self) -> &str {
        self.authority.as_str()
    }

    /// Absolute upstream URI for a path-and-query.
    pub fn uri_for(&self, path_and_query: &str) -> Result<Uri, GateError> {
        let pq = if path_and_query.starts_with('/') {
            path_and_query
        } else {
            "/"
        };
        Uri::builder()
            .scheme(self.scheme.clone())
            .authority(self.authority.clone())
            .path_and_query(pq)
            .build()
            .map_err(|e| GateError::Upstream {
                details: format!("cannot build upstream uri: {e}"),
            })
    }

    /// Forward `req` and return the upstream response verbatim.
    ///
    /// # Errors
    ///
    /// Returns `GateError::Upstream` when the origin cannot be reached or
    /// the exchange fails before response headers arrive.
    pub async fn forward<B>(&self, req: Request<B>) -> Result<Response<ProxyBody>, GateError>
    where
        B: Body<Data = bytes::Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let (mut parts, body) = req.into_parts();
        let pq = parts
            .uri
            .path_and_query()
            .map_or("/", |pq| pq.as_str())
            .to_string();
        parts.uri = self.uri_for(&pq)?;
        parts.version = Version::HTTP_11;
        parts.headers.insert(HOST, self.host_header.clone());

        debug!(method = %parts.method, uri = %parts.uri, "forwarding upstream");
        let outbound = Request::from_parts(parts, proxy_body::from_body(body));
        let response = self.client.request(outbound).await.map_err(|e| {
            GateError::Upstream {
                details: error_chain(&e),
            }
        })?;
        Ok(response.map(proxy_body::from_body))
    }
}

fn build_client() -> HttpsClient {
    let builder = match HttpsConnectorBuilder::new().with_native_roots() {
        Ok(builder) => builder,
        Err(e) => {
            warn!(error = %e, "no native root certificates, https upstreams will fail verification");
            let config = ClientConfig::builder()
                .with_root_certificates(RootCertStore::empty())
                .with_no_client_auth();
            HttpsConnectorBuilder::new().with_tls_config(config)
        }
    };
    let connector = builder.https_or_http().enable_http1().build();
    Client::builder(TokioExecutor::new()).build(connector)
}

fn error_chain(err: &dyn StdError) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}
