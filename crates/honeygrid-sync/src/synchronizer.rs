// crates/honeygrid-sync/src/synchronizer.rs
// ============================================================================
// Module: Honeygrid Routing Synchronizer
// Description: Keeps the routing table and the installed map file aligned.
// Purpose: Commit routing changes so table and file never diverge.
// Dependencies: crate::{error, install, map}, honeygrid_core, tracing
// ============================================================================

//! ## Overview
//! The synchronizer is the only writer of both the routing table and the
//! installed map file. Publishing an assignment snapshots the previous
//! entry, upserts the new one, and re-renders the file; if the install
//! fails, the table change is rolled back so the durable table always
//! matches the file nginx is reading. Removal and full resync re-render
//! from the current table, which also makes the sweeper's post-expiry
//! resync idempotent. Every entry point holds the synchronizer's own lock
//! for the full mutate-render-install sequence, so a concurrent caller can
//! never rename a stale render over a newer one.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use tracing::debug;
use tracing::warn;

use honeygrid_core::PoolStore;
use honeygrid_core::RoutingEntry;
use honeygrid_core::RoutingKey;
use honeygrid_core::SessionId;
use honeygrid_core::StateMutation;
use honeygrid_core::Timestamp;
use honeygrid_core::UpstreamAddr;

use crate::error::SyncError;
use crate::install::install_map;
use crate::map::render_map;

// ============================================================================
// SECTION: Synchronizer
// ============================================================================

/// Single writer for the routing table and installed map file.
///
/// # Invariants
/// - Table mutation, render, and install run as one serialized sequence;
///   concurrent callers never interleave between reading the table and
///   installing the file.
/// - After every returned `Ok`, the installed file reflects the table.
/// - After every returned `Err` from publish, the table reflects its state
///   before the call.
pub struct RoutingSynchronizer {
    /// Injected state store holding the routing table.
    store: Arc<dyn PoolStore>,
    /// Final installed path of the map file.
    map_path: PathBuf,
    /// Upstream named in the map's default row.
    default_upstream: String,
    /// Serializes mutate-render-install sequences across callers.
    guard: Mutex<()>,
}

impl RoutingSynchronizer {
    /// Creates a synchronizer over the given store and target path.
    #[must_use]
    pub fn new(
        store: Arc<dyn PoolStore>,
        map_path: impl Into<PathBuf>,
        default_upstream: impl Into<String>,
    ) -> Self {
        Self {
            store,
            map_path: map_path.into(),
            default_upstream: default_upstream.into(),
            guard: Mutex::new(()),
        }
    }

    /// Acquires the sequence lock, recovering from a poisoned guard.
    fn lock(&self) -> MutexGuard<'_, ()> {
        self.guard.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publishes one session's routing entry and reinstalls the map.
    ///
    /// An existing entry for the session is replaced (its creation time is
    /// preserved). On install failure the table is rolled back to the
    /// previous entry, or the new entry is removed when none existed.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] from the store or the install step.
    pub fn publish_assignment(
        &self,
        session_id: &SessionId,
        routing_key: RoutingKey,
        upstream: UpstreamAddr,
        now: Timestamp,
    ) -> Result<RoutingEntry, SyncError> {
        let _guard = self.lock();
        let previous = self.store.routing_entry(session_id)?;
        let mut entry = RoutingEntry::new(routing_key, session_id.clone(), upstream, now);
        if let Some(prior) = &previous {
            entry.created_at = prior.created_at;
        }
        self.store.apply(&[StateMutation::UpsertRouting(entry.clone())])?;

        if let Err(err) = self.render_and_install(now) {
            let rollback = match previous {
                Some(prior) => StateMutation::UpsertRouting(prior),
                None => StateMutation::RemoveRouting(session_id.clone()),
            };
            if let Err(rollback_err) = self.store.apply(&[rollback]) {
                warn!(
                    session = %session_id,
                    error = %rollback_err,
                    "routing rollback failed after install error"
                );
            }
            return Err(err);
        }
        debug!(session = %session_id, "routing entry published");
        Ok(entry)
    }

    /// Removes one session's routing entry and reinstalls the map.
    ///
    /// A missing entry is a no-op for the table; the file is re-rendered
    /// either way so a stale row never survives.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] from the store or the install step.
    pub fn remove_assignment(&self, session_id: &SessionId, now: Timestamp) -> Result<(), SyncError> {
        let _guard = self.lock();
        self.store.apply(&[StateMutation::RemoveRouting(session_id.clone())])?;
        self.render_and_install(now)?;
        debug!(session = %session_id, "routing entry removed");
        Ok(())
    }

    /// Re-renders and reinstalls the map from the current table.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] from the store or the install step.
    pub fn resync(&self, now: Timestamp) -> Result<(), SyncError> {
        let _guard = self.lock();
        self.render_and_install(now)
    }

    /// Renders the current table state and installs it atomically.
    fn render_and_install(&self, now: Timestamp) -> Result<(), SyncError> {
        let entries = self.store.routing_entries()?;
        let content = render_map(&self.default_upstream, &entries, now);
        install_map(&self.map_path, &content)
    }
}
