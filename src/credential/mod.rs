//! Session credential store and legacy-plugin accessor.
//!
//! Exactly one logical token exists at a time. It lives in an in-memory
//! cell (authoritative when non-empty) and is mirrored into a persistent and
//! a session-scoped [`SessionMirror`] so it survives reloads.
//!
//! The legacy plugin reads the token through a named global accessor. That
//! global is modelled as an [`AccessorSlot`]; the embedding page may replace
//! whatever is installed there, so [`watchdog`] periodically takes the slot
//! back and migrates any value the replacement could produce.

pub mod mirror;
pub mod watchdog;

pub use mirror::{FileMirror, MemoryMirror, MirrorError, SessionMirror, SESSION_KEY};
pub use watchdog::{WatchdogConfig, WatchdogReport};

use arc_swap::{ArcSwap, ArcSwapOption};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Failure raised by a foreign accessor.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("session accessor failed: {0}")]
pub struct AccessorError(pub String);

/// Process-wide session credential holder.
#[derive(Clone)]
pub struct CredentialStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    cell: ArcSwap<String>,
    persistent: Box<dyn SessionMirror>,
    session: Box<dyn SessionMirror>,
}

impl CredentialStore {
    pub fn new(persistent: impl SessionMirror + 'static, session: impl SessionMirror + 'static) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                cell: ArcSwap::from_pointee(String::new()),
                persistent: Box::new(persistent),
                session: Box::new(session),
            }),
        }
    }

    /// Store with both mirrors held in memory.
    pub fn in_memory() -> Self {
        Self::new(MemoryMirror::new(), MemoryMirror::new())
    }

    /// Record `token` as the current credential. Empty tokens are ignored.
    pub fn set(&self, token: &str) {
        if token.is_empty() {
            return;
        }
        self.inner.cell.store(Arc::new(token.to_string()));
        for mirror in self.mirrors() {
            if let Err(e) = mirror.store(token) {
                warn!(mirror = mirror.name(), error = %e, "failed to mirror session credential");
            }
        }
        debug!(len = token.len(), "session credential saved");
    }

    /// Current credential, or an empty string when none is known.
    pub fn get(&self) -> String {
        let cell = self.inner.cell.load();
        if !cell.is_empty() {
            return cell.as_ref().clone();
        }
        self.mirrors()
            .into_iter()
            .find_map(|m| m.load().filter(|t| !t.is_empty()))
            .unwrap_or_default()
    }

    /// Forget the credential everywhere.
    pub fn clear(&self) {
        self.inner.cell.store(Arc::new(String::new()));
        for mirror in self.mirrors() {
            if let Err(e) = mirror.remove() {
                warn!(mirror = mirror.name(), error = %e, "failed to clear mirrored session credential");
            }
        }
        debug!("session credential cleared");
    }

    fn mirrors(&self) -> [&dyn SessionMirror; 2] {
        [self.inner.persistent.as_ref(), self.inner.session.as_ref()]
    }

    /// Build the store's own accessor. Each call yields a distinct identity.
    pub fn accessor(&self) -> Arc<SessionAccessor> {
        let store = self.clone();
        Arc::new(SessionAccessor::new(move || Ok(store.get())))
    }
}

type AccessorFn = dyn Fn() -> Result<String, AccessorError> + Send + Sync;

/// A zero-argument synchronous session getter.
pub struct SessionAccessor {
    f: Box<AccessorFn>,
}

impl SessionAccessor {
    pub fn new(f: impl Fn() -> Result<String, AccessorError> + Send + Sync + 'static) -> Self {
        Self { f: Box::new(f) }
    }

    pub fn call(&self) -> Result<String, AccessorError> {
        (self.f)()
    }
}

/// The named global the legacy plugin calls to fetch the session.
///
/// Anyone can install an accessor; ownership is decided by pointer
/// identity, never by the value an accessor returns.
#[derive(Default)]
pub struct AccessorSlot {
    current: ArcSwapOption<SessionAccessor>,
}

impl AccessorSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install(&self, accessor: Arc<SessionAccessor>) {
        self.current.store(Some(accessor));
    }

    pub fn current(&self) -> Option<Arc<SessionAccessor>> {
        self.current.load_full()
    }

    /// Returns `true` if `accessor` is the one currently installed.
    pub fn holds(&self, accessor: &Arc<SessionAccessor>) -> bool {
        self.current
            .load()
            .as_ref()
            .is_some_and(|cur| Arc::ptr_eq(cur, accessor))
    }

    /// Invoke whatever is installed. Failures and absence read as "".
    pub fn call(&self) -> String {
        match self.current.load_full() {
            Some(accessor) => accessor.call().unwrap_or_default(),
            None => String::new(),
        }
    }
}

/// The three-function contract the legacy plugin runtime depends on.
#[derive(Clone)]
pub struct PluginBridge {
    store: CredentialStore,
    slot: Arc<AccessorSlot>,
    own: Arc<SessionAccessor>,
}

impl PluginBridge {
    /// Install the store's accessor into `slot`.
    pub fn install(store: CredentialStore, slot: Arc<AccessorSlot>) -> Self {
        let own = store.accessor();
        slot.install(own.clone());
        Self { store, slot, own }
    }

    /// Zero-argument getter; empty string means no credential.
    pub fn get_session_id(&self) -> String {
        self.slot.call()
    }

    /// One-argument setter.
    pub fn save_session_id(&self, token: &str) {
        self.store.set(token);
    }

    /// Zero-argument clearer.
    pub fn clear_session_id(&self) {
        self.store.clear();
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    pub fn slot(&self) -> &Arc<AccessorSlot> {
        &self.slot
    }

    /// Start the bounded accessor-recovery loop.
    pub fn spawn_watchdog(&self, config: WatchdogConfig) -> JoinHandle<WatchdogReport> {
        watchdog::spawn(self.store.clone(), self.slot.clone(), self.own.clone(), config)
    }
}
