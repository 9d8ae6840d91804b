//! Persistent mirrors of the session credential.
//!
//! The in-memory cell of [`CredentialStore`](super::CredentialStore) is
//! authoritative; mirrors only carry the token across reloads.

use arc_swap::ArcSwapOption;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Key the token is stored under in every mirror.
pub const SESSION_KEY: &str = "seer_session";

#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("mirror I/O failed for {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("mirror document at {path} is not a JSON object")]
    Corrupt { path: String },

    #[error("mirror encode failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A key/value location holding a copy of the session token.
pub trait SessionMirror: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    fn load(&self) -> Option<String>;

    fn store(&self, token: &str) -> Result<(), MirrorError>;

    fn remove(&self) -> Result<(), MirrorError>;
}

/// Process-lifetime mirror (the session-scoped store).
#[derive(Default)]
pub struct MemoryMirror {
    slot: ArcSwapOption<String>,
}

impl MemoryMirror {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionMirror for MemoryMirror {
    fn name(&self) -> &'static str {
        "session"
    }

    fn load(&self) -> Option<String> {
        self.slot.load_full().map(|s| s.as_ref().clone())
    }

    fn store(&self, token: &str) -> Result<(), MirrorError> {
        self.slot.store(Some(Arc::new(token.to_string())));
        Ok(())
    }

    fn remove(&self) -> Result<(), MirrorError> {
        self.slot.store(None);
        Ok(())
    }
}

/// JSON key/value file mirror (the persistent store).
///
/// Other keys in the document are preserved. Writes go through a sibling
/// temp file and a rename.
///
/// All I/O here is blocking. Async callers go through
/// `tokio::task::spawn_blocking`.
pub struct FileMirror {
    path: PathBuf,
}

impl FileMirror {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: std::io::Error) -> MirrorError {
        MirrorError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }

    fn read_document(&self) -> Result<Map<String, Value>, MirrorError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(self.io_err(e)),
        };
        match serde_json::from_str::<Value>(&text)? {
            Value::Object(map) => Ok(map),
            _ => Err(MirrorError::Corrupt {
                path: self.path.display().to_string(),
            }),
        }
    }

    fn write_document(&self, doc: &Map<String, Value>) -> Result<(), MirrorError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
        }
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(doc)?).map_err(|e| self.io_err(e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| self.io_err(e))
    }
}

impl SessionMirror for FileMirror {
    fn name(&self) -> &'static str {
        "persistent"
    }

    fn load(&self) -> Option<String> {
        self.read_document()
            .ok()?
            .get(SESSION_KEY)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    fn store(&self, token: &str) -> Result<(), MirrorError> {
        // A corrupt document is replaced rather than blocking the write.
        let mut doc = self.read_document().unwrap_or_default();
        doc.insert(SESSION_KEY.to_string(), Value::String(token.to_string()));
        self.write_document(&doc)
    }

    fn remove(&self) -> Result<(), MirrorError> {
        let mut doc = self.read_document().unwrap_or_default();
        if doc.remove(SESSION_KEY).is_some() {
            self.write_document(&doc)?;
        }
        Ok(())
    }
}
