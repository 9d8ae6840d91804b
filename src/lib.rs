//! gameres-gate - local-first resource gateway for a legacy game client.
//!
//! Two cooperating enforcement points share one rule table:
//!
//! - **Client request router** ([`client`]): sits in front of the client's
//!   fetch, XHR and socket primitives; blocks telemetry, rewrites legacy
//!   hosts, sends force-proxy assets upstream and everything else local
//!   first. Captures login sessions into the [`credential`] store.
//! - **Dispatch gateway** ([`gateway`]): serves each request from the local
//!   asset root when possible, otherwise forwards to the upstream origin and
//!   reports assets missing everywhere to the [`supervisor`].
//!
//! A [`static_server`] serves the web root on its own port.

pub mod classifier;
pub mod client;
pub mod config;
pub mod credential;
pub mod decision;
pub mod error;
pub mod gateway;
pub mod logging_layer;
pub mod mode;
pub mod proxy_body;
pub mod rules;
pub mod static_server;
pub mod supervisor;
