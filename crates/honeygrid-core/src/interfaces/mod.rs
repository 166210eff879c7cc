// crates/honeygrid-core/src/interfaces/mod.rs
// ============================================================================
// Module: Honeygrid Store Interfaces
// Description: Persistence contract between the pool engine and state stores.
// Purpose: Keep the engine backend-agnostic behind an explicit trait seam.
// Dependencies: crate::core, thiserror
// ============================================================================

//! ## Overview
//! The engine reads and writes durable state exclusively through the
//! [`PoolStore`] trait. Reads are point lookups and filtered scans; writes
//! go through [`PoolStore::apply`], which takes a batch of
//! [`StateMutation`] values and commits them in one atomic transaction so
//! partial application is never observable, even across a crash.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::container::Container;
use crate::core::decision::DecisionLogEntry;
use crate::core::decision::DecisionLogRecord;
use crate::core::identifiers::ContainerId;
use crate::core::identifiers::SessionId;
use crate::core::routing::RoutingEntry;
use crate::core::session::Session;
use crate::core::tier::Tier;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Store Errors
// ============================================================================

/// Store failure taxonomy shared by every backend.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - Messages never embed record payloads.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Underlying I/O failure.
    #[error("store io failure: {0}")]
    Io(String),
    /// Database engine failure.
    #[error("store database failure: {0}")]
    Db(String),
    /// Persisted state failed to decode or violated an invariant.
    #[error("store corruption: {0}")]
    Corrupt(String),
    /// Persisted schema version does not match this build.
    #[error("store schema version mismatch: found {found}, expected {expected}")]
    VersionMismatch {
        /// Version found on disk.
        found: u32,
        /// Version this build requires.
        expected: u32,
    },
    /// Caller-supplied value was rejected before any write.
    #[error("store rejected invalid input: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Queries and Mutations
// ============================================================================

/// Session scan filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionFilter {
    /// Every persisted session.
    All,
    /// Sessions still in the `Active` state.
    Active,
    /// Sessions in a terminal state (`Released` or `Expired`).
    Terminal,
}

/// Per-tier container occupancy counts.
///
/// # Invariants
/// - `idle + assigned <= total`; unhealthy may overlap assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TierCounts {
    /// Containers provisioned in the tier.
    pub total: usize,
    /// Containers currently assignable-state idle.
    pub idle: usize,
    /// Containers currently held by a session.
    pub assigned: usize,
    /// Containers whose health flag is down.
    pub unhealthy: usize,
}

/// One element of an atomic write batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateMutation {
    /// Insert or replace a container record.
    PutContainer(Container),
    /// Insert or replace a session record.
    PutSession(Session),
    /// Insert or replace the routing entry for its session.
    UpsertRouting(RoutingEntry),
    /// Delete the routing entry for a session; absent entries are a no-op.
    RemoveRouting(SessionId),
    /// Append a decision log entry; the store assigns the sequence number.
    AppendDecision(DecisionLogEntry),
}

// ============================================================================
// SECTION: Pool Store
// ============================================================================

/// Persistence contract for pool, session, routing, and audit state.
///
/// # Invariants
/// - [`PoolStore::apply`] commits its whole batch or none of it.
/// - Scan results are returned in a deterministic order (ascending id for
///   containers and sessions, ascending sequence for decision records).
pub trait PoolStore: Send + Sync {
    /// Fetches one container by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails.
    fn container(&self, id: &ContainerId) -> Result<Option<Container>, StoreError>;

    /// Fetches every container, ascending by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails.
    fn containers(&self) -> Result<Vec<Container>, StoreError>;

    /// Fetches healthy idle containers in one tier, ascending by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails.
    fn idle_containers(&self, tier: Tier) -> Result<Vec<Container>, StoreError>;

    /// Fetches one session by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails.
    fn session(&self, id: &SessionId) -> Result<Option<Session>, StoreError>;

    /// Fetches sessions matching the filter, ascending by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails.
    fn sessions(&self, filter: SessionFilter) -> Result<Vec<Session>, StoreError>;

    /// Fetches active sessions whose deadline is strictly before `now`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails.
    fn expired_sessions(&self, now: Timestamp) -> Result<Vec<Session>, StoreError>;

    /// Fetches the routing entry for one session.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails.
    fn routing_entry(&self, session_id: &SessionId) -> Result<Option<RoutingEntry>, StoreError>;

    /// Fetches every routing entry, ascending by session id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails.
    fn routing_entries(&self) -> Result<Vec<RoutingEntry>, StoreError>;

    /// Fetches the decision log for one session, ascending by sequence.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails.
    fn decision_log(&self, session_id: &SessionId) -> Result<Vec<DecisionLogRecord>, StoreError>;

    /// Computes per-tier occupancy counts.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails.
    fn tier_counts(&self, tier: Tier) -> Result<TierCounts, StoreError>;

    /// Applies a batch of mutations in one atomic transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the batch cannot be committed; on error
    /// no mutation from the batch is visible.
    fn apply(&self, mutations: &[StateMutation]) -> Result<(), StoreError>;

    /// Probes backend readiness.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend is unavailable.
    fn readiness(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
