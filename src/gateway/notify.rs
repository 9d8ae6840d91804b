//! Missing-resource notifications to the supervisor.
//!
//! Delivery is fire-and-forget: a full or closed channel drops the message
//! and never slows down the request that triggered it.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

/// Message sent from a gateway to the supervisor.
///
/// Serializes as `{"type":"notfound","data":"/resource/x.json"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum SupervisorMessage {
    NotFound(String),
}

#[derive(Debug, Clone)]
pub struct MissNotifier {
    tx: Option<mpsc::Sender<SupervisorMessage>>,
}

impl MissNotifier {
    /// Bounded channel to the supervisor's relay.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<SupervisorMessage>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx: Some(tx) }, rx)
    }

    /// Notifier for a gateway running without a supervisor.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Report that `path` was missing locally and 404 upstream.
    pub fn notify_missing(&self, path: &str) {
        let Some(tx) = &self.tx else {
            debug!(path, "resource missing (no supervisor attached)");
            return;
        };
        match tx.try_send(SupervisorMessage::NotFound(path.to_string())) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(path, "supervisor channel full, dropping notfound");
            }
            Err(TrySendError::Closed(_)) => {
                debug!(path, "supervisor gone, dropping notfound");
            }
        }
    }
}
