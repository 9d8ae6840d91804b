//! Operating mode (local vs. official resources).
//!
//! The mode is read once from its configuration source and memoized until
//! [`ModeResolver::refresh`] is called. Both modes route through the same
//! local gateway; the value is informational and reported in logs.

use arc_swap::ArcSwapOption;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// Resource mode of the running client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperatingMode {
    Local,
    Official,
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperatingMode::Local => f.write_str("local"),
            OperatingMode::Official => f.write_str("official"),
        }
    }
}

/// Configuration surface carrying the local-mode flag.
///
/// `None` means the configuration is not available yet.
pub trait ModeSource: Send + Sync {
    fn local_mode(&self) -> Option<bool>;
}

impl ModeSource for Option<bool> {
    fn local_mode(&self) -> Option<bool> {
        *self
    }
}

/// Read-once, resettable view of the operating mode.
pub struct ModeResolver {
    source: Arc<dyn ModeSource>,
    cached: ArcSwapOption<OperatingMode>,
}

impl ModeResolver {
    pub fn new(source: impl ModeSource + 'static) -> Self {
        Self {
            source: Arc::new(source),
            cached: ArcSwapOption::empty(),
        }
    }

    /// Current mode, reading the source only on the first call.
    pub fn current(&self) -> OperatingMode {
        if let Some(mode) = self.cached.load_full() {
            return *mode;
        }
        let mode = match self.source.local_mode() {
            Some(true) => OperatingMode::Local,
            Some(false) => OperatingMode::Official,
            None => {
                warn!("mode configuration unavailable, defaulting to local");
                OperatingMode::Local
            }
        };
        info!(%mode, "operating mode resolved");
        self.cached.store(Some(Arc::new(mode)));
        mode
    }

    /// Override the memoized mode.
    pub fn set_mode(&self, mode: OperatingMode) {
        info!(%mode, "operating mode set manually");
        self.cached.store(Some(Arc::new(mode)));
    }

    /// Drop the memoized value and read the source again.
    pub fn refresh(&self) -> OperatingMode {
        self.cached.store(None);
        self.current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct CountingSource {
        reads: Arc<AtomicUsize>,
        local: Arc<AtomicBool>,
    }

    impl ModeSource for CountingSource {
        fn local_mode(&self) -> Option<bool> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Some(self.local.load(Ordering::SeqCst))
        }
    }

    #[test]
    fn test_missing_config_defaults_to_local() {
        let resolver = ModeResolver::new(None::<bool>);
        assert_eq!(resolver.current(), OperatingMode::Local);
    }

    #[test]
    fn test_flag_maps_to_mode() {
        assert_eq!(ModeResolver::new(Some(true)).current(), OperatingMode::Local);
        assert_eq!(ModeResolver::new(Some(false)).current(), OperatingMode::Official);
    }

    #[test]
    fn test_read_once_then_refresh() {
        let reads = Arc::new(AtomicUsize::new(0));
        let local = Arc::new(AtomicBool::new(true));
        let resolver = ModeResolver::new(CountingSource {
            reads: reads.clone(),
            local: local.clone(),
        });

        assert_eq!(resolver.current(), OperatingMode::Local);
        local.store(false, Ordering::SeqCst);
        assert_eq!(resolver.current(), OperatingMode::Local);
        assert_eq!(reads.load(Ordering::SeqCst), 1);

        assert_eq!(resolver.refresh(), OperatingMode::Official);
        assert_eq!(reads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_set_mode_overrides_source() {
        let resolver = ModeResolver::new(Some(true));
        resolver.set_mode(OperatingMode::Official);
        assert_eq!(resolver.current(), OperatingMode::Official);
        assert_eq!(resolver.refresh(), OperatingMode::Local);
    }

    #[test]
    fn test_mode_serde() {
        assert_eq!(serde_json::to_string(&OperatingMode::Official).unwrap(), "\"official\"");
    }
}
