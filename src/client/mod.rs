//! Client request router.
//!
//! One [`RequestRouter`] holds the routing policy (rule table, operating
//! mode, credential store). Thin adapters wrap the three network primitives
//! a page uses:
//!
//! - [`FetchAdapter`]: call-style, returns the response.
//! - [`XhrAdapter`]: event-style, completes through a callback.
//! - [`SocketAdapter`]: connection-style, observes payloads only.
//!
//! Classification and rewriting are synchronous string work. Credential
//! capture from login responses runs on its own task against a copy of the
//! body and never delays delivery to the caller.

pub mod capture;
pub mod fetch;
pub mod socket;
pub mod transport;
pub mod xhr;

pub use fetch::{FetchAdapter, RequestInfo, RequestInit};
pub use socket::{ObservedSocket, SocketAdapter, SocketConnection, SocketConnector, TcpConnector};
pub use transport::{ClientRequest, ClientResponse, NetworkTransport, ReqwestTransport, TransportError};
pub use xhr::{XhrAdapter, XhrCompletion, XhrRequest};

use bytes::Bytes;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::classifier;
use crate::credential::CredentialStore;
use crate::decision::RouteDecision;
use crate::mode::ModeResolver;
use crate::rules::RuleTable;

/// Routing policy shared by all client adapters.
pub struct RequestRouter {
    rules: Arc<RuleTable>,
    mode: ModeResolver,
    credentials: CredentialStore,
}

impl RequestRouter {
    pub fn new(rules: Arc<RuleTable>, mode: ModeResolver, credentials: CredentialStore) -> Self {
        Self {
            rules,
            mode,
            credentials,
        }
    }

    /// Decide where an outgoing call to `url` goes.
    pub fn resolve(&self, url: &str) -> RouteDecision {
        let mode = self.mode.current();
        let decision = classifier::route(&self.rules, url);
        debug!(
            url,
            %mode,
            reason = ?decision.reason,
            rewritten = decision.is_rewrite(url),
            target = decision.target().unwrap_or("<blocked>"),
            "resolved outgoing request"
        );
        decision
    }

    /// Returns `true` if `url` names a login endpoint.
    pub fn is_login(&self, url: &str) -> bool {
        self.rules.is_login(url)
    }

    /// Inspect a detached copy of a login response body on its own task.
    ///
    /// Runs on the blocking pool because the store's mirrors may write to
    /// disk. The handle resolves to `true` if a session was stored.
    pub fn capture_login(&self, body: Bytes) -> JoinHandle<bool> {
        let store = self.credentials.clone();
        tokio::task::spawn_blocking(move || {
            match capture::extract_session(&body) {
                Some(session) => {
                    store.set(&session);
                    debug!("login response carried a session, credential stored");
                    true
                }
                None => {
                    trace!("login response carried no usable session");
                    false
                }
            }
        })
    }

    pub fn rules(&self) -> &Arc<RuleTable> {
        &self.rules
    }

    pub fn mode(&self) -> &ModeResolver {
        &self.mode
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }
}
