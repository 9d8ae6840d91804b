//! Gateway error types.
//!
//! Request-path failures map onto an HTTP status via [`GateError::status`];
//! startup failures (rules, config, bind) are surfaced to the binary.

use http::header::CONTENT_TYPE;
use http::{HeaderValue, Response, StatusCode};
use std::net::SocketAddr;
use thiserror::Error;

use crate::proxy_body::{self, ProxyBody};
use crate::rules::RuleError;

#[derive(Debug, Error)]
pub enum GateError {
    /// Rule table could not be loaded
    #[error(transparent)]
    Rules(#[from] RuleError),

    /// Upstream base URL is unusable
    #[error("Invalid upstream {upstream}: {details}")]
    InvalidUpstream {
        /// Configured upstream
        upstream: String,
        /// Error details
        details: String,
    },

    /// Upstream connect or exchange failed
    #[error("Upstream request failed: {details}")]
    Upstream {
        /// Error details
        details: String,
    },

    /// Listener could not be bound
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Root directory could not be prepared
    #[error("Failed to prepare directory {path}: {source}")]
    RootDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl GateError {
    /// Status returned to the caller when this error ends a request.
    pub fn status(&self) -> StatusCode {
        match self {
            GateError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Plain-text error response.
    pub fn into_response(self) -> Response<ProxyBody> {
        let mut response = Response::new(proxy_body::full(self.to_string()));
        *response.status_mut() = self.status();
        response.headers_mut().insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn test_upstream_error_is_bad_gateway() {
        let err = GateError::Upstream {
            details: "connection refused".to_string(),
        };
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"Upstream request failed: connection refused");
    }

    #[test]
    fn test_rule_error_converts() {
        let err: GateError = RuleError::UnsupportedVersion { found: 9 }.into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().contains("version 9"));
    }
}
