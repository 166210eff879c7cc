// crates/honeygrid-sync/src/sweeper.rs
// ============================================================================
// Module: Honeygrid Cleanup Sweeper
// Description: Supervised periodic expiry sweep with map resync.
// Purpose: Reclaim abandoned sessions and keep the map free of stale rows.
// Dependencies: crate::{error, nginx, synchronizer}, honeygrid_core, tokio, tracing
// ============================================================================

//! ## Overview
//! The sweeper is a supervised periodic task: every interval it expires
//! past-deadline sessions through the engine, and when anything was
//! reclaimed it re-renders the map and reloads the proxy. Failures are
//! logged and never stop subsequent ticks; each engine sweep commits per
//! session, so cancellation between ticks can never leave a half-applied
//! transition. Shutdown is observed through a watch channel.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio::time::interval;

use tracing::debug;
use tracing::info;
use tracing::warn;

use honeygrid_core::PoolEngine;
use honeygrid_core::Timestamp;

use crate::nginx::NginxController;
use crate::synchronizer::RoutingSynchronizer;

// ============================================================================
// SECTION: Sweeper
// ============================================================================

/// Supervised periodic expiry sweep.
pub struct CleanupSweeper {
    /// Engine used to expire past-deadline sessions.
    engine: Arc<PoolEngine>,
    /// Synchronizer used to refresh the map after reclamation.
    synchronizer: Arc<RoutingSynchronizer>,
    /// Controller used to reload the proxy after a refreshed map.
    controller: Arc<NginxController>,
    /// Interval between sweeps.
    sweep_interval: Duration,
}

impl CleanupSweeper {
    /// Creates a sweeper over the given engine and sync pair.
    #[must_use]
    pub fn new(
        engine: Arc<PoolEngine>,
        synchronizer: Arc<RoutingSynchronizer>,
        controller: Arc<NginxController>,
        sweep_interval: Duration,
    ) -> Self {
        Self {
            engine,
            synchronizer,
            controller,
            sweep_interval,
        }
    }

    /// Runs the sweep loop until the shutdown channel signals.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.sweep_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately; skip it so startup and the
        // first sweep do not race pool initialization.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep_once(Timestamp::now()).await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("cleanup sweeper shutting down");
                        return;
                    }
                }
            }
        }
    }

    /// Runs one sweep; failures are logged and swallowed.
    pub async fn sweep_once(&self, now: Timestamp) {
        let expired = match self.engine.cleanup_expired(now) {
            Ok(count) => count,
            Err(err) => {
                warn!(error = %err, "expiry sweep failed");
                return;
            }
        };
        if expired == 0 {
            debug!("expiry sweep found nothing to reclaim");
            return;
        }
        info!(expired, "expiry sweep reclaimed sessions");
        if let Err(err) = self.synchronizer.resync(now) {
            warn!(error = %err, "map resync after sweep failed");
            return;
        }
        if let Err(err) = self.controller.reload().await {
            warn!(error = %err, "proxy reload after sweep failed");
        }
    }
}
