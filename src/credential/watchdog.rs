//! Bounded accessor-recovery loop.
//!
//! Polls the [`AccessorSlot`] at a fixed interval for a fixed number of
//! ticks. Whenever something other than the store's own accessor is
//! installed, any non-empty value the replacement yields is migrated into
//! the store and the store's accessor is put back. Errors raised by the
//! replacement are ignored. The loop ends on its own after `max_ticks`.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

use super::{AccessorSlot, CredentialStore, SessionAccessor};

/// Polling bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchdogConfig {
    pub interval: Duration,
    pub max_ticks: u32,
}

impl WatchdogConfig {
    pub fn new(interval: Duration, max_ticks: u32) -> Self {
        Self {
            interval,
            max_ticks,
        }
    }
}

impl Default for WatchdogConfig {
    /// 100 ticks at 100 ms: ten seconds of coverage after page start.
    fn default() -> Self {
        Self::new(Duration::from_millis(100), 100)
    }
}

/// What a finished watchdog did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchdogReport {
    pub ticks: u32,
    pub recoveries: u32,
    pub migrated: u32,
}

pub(crate) fn spawn(
    store: CredentialStore,
    slot: Arc<AccessorSlot>,
    own: Arc<SessionAccessor>,
    config: WatchdogConfig,
) -> JoinHandle<WatchdogReport> {
    tokio::spawn(async move {
        let mut own = own;
        let mut report = WatchdogReport::default();
        let mut ticker = tokio::time::interval(config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately.
        ticker.tick().await;

        while report.ticks < config.max_ticks {
            ticker.tick().await;
            report.ticks += 1;

            if slot.holds(&own) {
                continue;
            }

            debug!(tick = report.ticks, "session accessor replaced, recovering");
            if let Some(foreign) = slot.current() {
                // Harvesting may write the persistent mirror.
                let target = store.clone();
                let harvested = tokio::task::spawn_blocking(move || match foreign.call() {
                    Ok(value) if !value.is_empty() => {
                        target.set(&value);
                        true
                    }
                    Ok(_) => false,
                    Err(e) => {
                        trace!(error = %e, "foreign accessor failed during harvest");
                        false
                    }
                })
                .await;
                match harvested {
                    Ok(true) => report.migrated += 1,
                    Ok(false) => {}
                    Err(e) => warn!(error = %e, "session harvest task failed"),
                }
            }

            own = store.accessor();
            slot.install(own.clone());
            report.recoveries += 1;
        }

        info!(
            ticks = report.ticks,
            recoveries = report.recoveries,
            migrated = report.migrated,
            "session accessor watchdog finished"
        );
        report
    })
}
