//! Periodic stale-session sweep.
//!
//! The sweeper only owns the timer. The sweep itself runs on the caller's
//! task against the caller's associator, so nothing is shared across tasks:
//!
//! ```ignore
//! let mut sweeper = StaleSessionSweeper::new(&config.cleanup);
//! loop {
//!     tokio::select! {
//!         _ = sweeper.tick() => { sweeper.sweep(&mut associator); }
//!         Some(load) = associator.next_favicon_load() => { associator.apply_favicon_load(load)?; }
//!     }
//! }
//! ```

use crate::associator::SessionAssociator;
use crate::config::CleanupConfig;
use crate::store::SyncStore;
use std::time::Duration;
use tokio::time::{interval, Interval, MissedTickBehavior};

/// Timer driving [`SessionAssociator::delete_stale_sessions`].
#[derive(Debug)]
pub struct StaleSessionSweeper {
    timer: Option<Interval>,
}

impl StaleSessionSweeper {
    /// Create a sweeper from the `[cleanup]` section.
    ///
    /// Must be called within a tokio runtime when the sweep is enabled.
    pub fn new(config: &CleanupConfig) -> Self {
        if !config.enabled {
            tracing::info!("Stale session sweep disabled");
            return Self { timer: None };
        }

        let interval_secs = config.interval_secs.max(1);
        tracing::info!("Stale session sweep started (interval: {}s)", interval_secs);

        let mut timer = interval(Duration::from_secs(interval_secs));
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { timer: Some(timer) }
    }

    /// Whether the sweep runs at all.
    pub fn is_enabled(&self) -> bool {
        self.timer.is_some()
    }

    /// Wait for the next sweep.
    ///
    /// The first tick completes immediately. Never completes when disabled.
    pub async fn tick(&mut self) {
        match self.timer.as_mut() {
            Some(timer) => {
                timer.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }

    /// Delete stale foreign sessions now.
    ///
    /// Errors are logged; returns the number of sessions deleted.
    pub fn sweep<S: SyncStore>(&self, associator: &mut SessionAssociator<S>) -> usize {
        if !associator.state().is_associated() {
            tracing::debug!("Sweep: not associated, skipping");
            return 0;
        }

        match associator.delete_stale_sessions() {
            Ok(deleted) => {
                if deleted > 0 {
                    tracing::info!("Sweep: deleted {} stale sessions", deleted);
                } else {
                    tracing::debug!("Sweep: no stale sessions");
                }
                deleted
            }
            Err(e) => {
                tracing::error!("Sweep error: {}", e);
                0
            }
        }
    }
}
