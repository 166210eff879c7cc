// crates/honeygrid-core/src/engine/mod.rs
// ============================================================================
// Module: Honeygrid Pool Engine
// Description: Assignment, release, expiry, and status over a pool store.
// Purpose: Own every container and session state transition in one place.
// Dependencies: crate::{core, interfaces}, thiserror
// ============================================================================

//! ## Overview
//! The pool engine is the single writer for container and session state.
//! It is synchronous and store-agnostic: callers inject an
//! `Arc<dyn PoolStore>` and pass explicit `now` timestamps, which keeps
//! every transition deterministic under test. An internal mutex serializes
//! assignment, release, and expiry cleanup per engine instance; status and
//! query reads go straight to the store.
//!
//! Assignment follows escalation-only fallback: the effective tier is the
//! target clamped up to the session's current tier, candidates are searched
//! at that tier and then strictly higher, and tiers below the effective tier
//! are never considered. Pool exhaustion is reported without mutating any
//! state.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod memory;

pub use memory::InMemoryPoolStore;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use thiserror::Error;

use crate::core::container::Container;
use crate::core::decision::DecisionLogEntry;
use crate::core::identifiers::ContainerId;
use crate::core::identifiers::DecisionRef;
use crate::core::identifiers::SessionId;
use crate::core::session::Session;
use crate::core::session::SessionState;
use crate::core::session::SkillScore;
use crate::core::tier::ALL_TIERS;
use crate::core::tier::Tier;
use crate::core::time::Timestamp;
use crate::interfaces::PoolStore;
use crate::interfaces::SessionFilter;
use crate::interfaces::StateMutation;
use crate::interfaces::StoreError;
use crate::interfaces::TierCounts;

// ============================================================================
// SECTION: Engine Types
// ============================================================================

/// Engine tuning knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Idle lifetime granted to a session on every successful assignment.
    pub session_ttl_secs: u64,
}

impl EngineConfig {
    /// Creates an engine configuration.
    #[must_use]
    pub const fn new(session_ttl_secs: u64) -> Self {
        Self { session_ttl_secs }
    }
}

/// Pool engine failure taxonomy.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// No assignable container at the effective tier or any tier above it.
    #[error("pool exhausted at {tier} and above")]
    PoolExhausted {
        /// Effective tier the search started from.
        tier: Tier,
    },
    /// The session has already ended; terminal sessions are never revived.
    #[error("session {session_id} is terminal")]
    SessionTerminal {
        /// The terminal session.
        session_id: SessionId,
    },
    /// Store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Outcome of a successful assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    /// Container the session now holds.
    pub container: Container,
    /// Session record after the operation.
    pub session: Session,
    /// True when a container changed hands; false for the idempotent no-op.
    pub newly_allocated: bool,
}

/// Per-tier occupancy snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierStatus {
    /// The tier described.
    pub tier: Tier,
    /// Occupancy counts.
    pub counts: TierCounts,
}

/// Why a session is being ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseReason {
    /// Explicit release requested by a decision or operator.
    Requested,
    /// Reclaimed by the expiry sweep.
    Expired,
}

impl ReleaseReason {
    /// Returns the terminal state this reason maps to.
    #[must_use]
    pub const fn terminal_state(self) -> SessionState {
        match self {
            Self::Requested => SessionState::Released,
            Self::Expired => SessionState::Expired,
        }
    }
}

/// Static description of one container to provision at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    /// Stable container identifier.
    pub id: ContainerId,
    /// Pool tier the container belongs to.
    pub tier: Tier,
    /// Host component of the upstream address.
    pub host: String,
    /// TCP port the container listens on.
    pub port: u16,
}

// ============================================================================
// SECTION: Pool Engine
// ============================================================================

/// Single-writer orchestration engine over a [`PoolStore`].
///
/// # Invariants
/// - At most one of assign / release / cleanup runs at a time per instance.
/// - Every multi-record transition is committed through one atomic
///   [`PoolStore::apply`] batch.
pub struct PoolEngine {
    /// Injected state store.
    store: Arc<dyn PoolStore>,
    /// Engine tuning knobs.
    config: EngineConfig,
    /// Serializes mutating operations; holds no data.
    guard: Mutex<()>,
}

impl PoolEngine {
    /// Creates an engine over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn PoolStore>, config: EngineConfig) -> Self {
        Self {
            store,
            config,
            guard: Mutex::new(()),
        }
    }

    /// Acquires the mutation guard, recovering from poisoning.
    ///
    /// The guard protects no data, so a poisoned lock carries no broken
    /// invariant to inherit.
    fn lock(&self) -> MutexGuard<'_, ()> {
        self.guard.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Assigns a container to a session, creating the session on first use.
    ///
    /// The effective tier is `target_tier` clamped up to the session's
    /// current tier. When the session already holds a healthy container at
    /// or above the target, the call is an idempotent no-op. Otherwise the
    /// held container (if any) is released and the first assignable
    /// container at the effective tier or above is allocated, all in one
    /// atomic batch.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::SessionTerminal`] for ended sessions,
    /// [`PoolError::PoolExhausted`] when no candidate exists (no state is
    /// mutated), or [`PoolError::Store`] on backend failure.
    pub fn assign_container(
        &self,
        session_id: &SessionId,
        target_tier: Tier,
        now: Timestamp,
    ) -> Result<Assignment, PoolError> {
        let _guard = self.lock();

        let mut session = match self.store.session(session_id)? {
            Some(existing) if existing.state.is_terminal() => {
                return Err(PoolError::SessionTerminal {
                    session_id: session_id.clone(),
                });
            }
            Some(existing) => existing,
            None => Session::new(session_id.clone(), now),
        };

        if let Some(held_id) = &session.container_id {
            if let Some(held) = self.store.container(held_id)? {
                if held.tier >= target_tier && held.healthy {
                    return Ok(Assignment {
                        container: held,
                        session,
                        newly_allocated: false,
                    });
                }
            }
        }

        let effective_tier = target_tier.max(session.current_tier);
        let mut candidate = None;
        for tier in effective_tier.and_above() {
            if let Some(found) = self.store.idle_containers(tier)?.into_iter().next() {
                candidate = Some(found);
                break;
            }
        }
        let Some(mut candidate) = candidate else {
            return Err(PoolError::PoolExhausted {
                tier: effective_tier,
            });
        };

        let mut mutations = Vec::new();
        if let Some(held_id) = session.container_id.take() {
            if let Some(mut held) = self.store.container(&held_id)? {
                held.release(now);
                mutations.push(StateMutation::PutContainer(held));
            }
        }

        candidate.assign_to(session_id.clone(), now);
        session.current_tier = candidate.tier;
        session.container_id = Some(candidate.id.clone());
        session.escalation_count = session.escalation_count.saturating_add(1);
        session.expires_at = Some(now.saturating_add_secs(self.config.session_ttl_secs));
        session.updated_at = now;
        mutations.push(StateMutation::PutContainer(candidate.clone()));
        mutations.push(StateMutation::PutSession(session.clone()));
        self.store.apply(&mutations)?;

        Ok(Assignment {
            container: candidate,
            session,
            newly_allocated: true,
        })
    }

    /// Ends a session, releasing its container and routing entry in one
    /// transaction.
    ///
    /// Returns `false` for unknown session ids and `true` (without further
    /// effect) for sessions that are already terminal.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Store`] on backend failure.
    pub fn release_session(
        &self,
        session_id: &SessionId,
        reason: ReleaseReason,
        now: Timestamp,
    ) -> Result<bool, PoolError> {
        let _guard = self.lock();
        self.release_locked(session_id, reason, now)
    }

    /// Release body shared with the expiry sweep; caller holds the guard.
    fn release_locked(
        &self,
        session_id: &SessionId,
        reason: ReleaseReason,
        now: Timestamp,
    ) -> Result<bool, PoolError> {
        let Some(mut session) = self.store.session(session_id)? else {
            return Ok(false);
        };
        if session.state.is_terminal() {
            return Ok(true);
        }

        let mut mutations = Vec::new();
        if let Some(held_id) = session.container_id.take() {
            if let Some(mut held) = self.store.container(&held_id)? {
                held.release(now);
                mutations.push(StateMutation::PutContainer(held));
            }
        }
        if self.store.routing_entry(session_id)?.is_some() {
            mutations.push(StateMutation::RemoveRouting(session_id.clone()));
        }
        session.state = reason.terminal_state();
        session.updated_at = now;
        mutations.push(StateMutation::PutSession(session));
        self.store.apply(&mutations)?;
        Ok(true)
    }

    /// Expires every active session whose deadline has passed.
    ///
    /// Each session is expired in its own transaction so one failure does
    /// not roll back the rest of the sweep. Returns the number of sessions
    /// expired.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Store`] on backend failure.
    pub fn cleanup_expired(&self, now: Timestamp) -> Result<usize, PoolError> {
        let _guard = self.lock();
        let mut expired = 0;
        for session in self.store.expired_sessions(now)? {
            if self.release_locked(&session.id, ReleaseReason::Expired, now)? {
                expired += 1;
            }
        }
        Ok(expired)
    }

    /// Returns per-tier occupancy counts for every tier.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Store`] on backend failure.
    pub fn pool_status(&self) -> Result<Vec<TierStatus>, PoolError> {
        let mut statuses = Vec::with_capacity(ALL_TIERS.len());
        for tier in ALL_TIERS {
            statuses.push(TierStatus {
                tier,
                counts: self.store.tier_counts(tier)?,
            });
        }
        Ok(statuses)
    }

    /// Updates a session's skill score and last decision reference.
    ///
    /// A missing session id is a silent no-op; the score is informational
    /// and never gates routing.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Store`] on backend failure.
    pub fn update_session_score(
        &self,
        session_id: &SessionId,
        score: SkillScore,
        decision_ref: Option<DecisionRef>,
        now: Timestamp,
    ) -> Result<(), PoolError> {
        let _guard = self.lock();
        let Some(mut session) = self.store.session(session_id)? else {
            return Ok(());
        };
        session.skill_score = score;
        session.last_decision_ref = decision_ref;
        session.updated_at = now;
        self.store.apply(&[StateMutation::PutSession(session)])?;
        Ok(())
    }

    /// Appends an entry to the decision audit log.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Store`] on backend failure.
    pub fn log_decision(&self, entry: DecisionLogEntry) -> Result<(), PoolError> {
        self.store.apply(&[StateMutation::AppendDecision(entry)])?;
        Ok(())
    }

    /// Records a health-check outcome for one container.
    ///
    /// An assigned container that goes unhealthy keeps its assignment; only
    /// the flag flips. Unknown container ids are a silent no-op.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Store`] on backend failure.
    pub fn mark_container_health(
        &self,
        container_id: &ContainerId,
        healthy: bool,
        now: Timestamp,
    ) -> Result<(), PoolError> {
        let _guard = self.lock();
        let Some(mut container) = self.store.container(container_id)? else {
            return Ok(());
        };
        container.mark_health(healthy, now);
        self.store.apply(&[StateMutation::PutContainer(container)])?;
        Ok(())
    }

    /// Provisions containers from the static pool layout.
    ///
    /// Idempotent: ids already present in the store keep their current
    /// record, so a restart never resets live assignments. Returns the
    /// number of containers created.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Store`] on backend failure.
    pub fn initialize_pools(
        &self,
        layout: &[ContainerSpec],
        now: Timestamp,
    ) -> Result<usize, PoolError> {
        let _guard = self.lock();
        let mut mutations = Vec::new();
        for spec in layout {
            if self.store.container(&spec.id)?.is_some() {
                continue;
            }
            let upstream = crate::core::container::UpstreamAddr::new(spec.host.clone(), spec.port);
            mutations.push(StateMutation::PutContainer(Container::new(
                spec.id.clone(),
                spec.tier,
                upstream,
                now,
            )));
        }
        let created = mutations.len();
        if created > 0 {
            self.store.apply(&mutations)?;
        }
        Ok(created)
    }

    /// Fetches one session by id.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Store`] on backend failure.
    pub fn session(&self, session_id: &SessionId) -> Result<Option<Session>, PoolError> {
        Ok(self.store.session(session_id)?)
    }

    /// Fetches sessions matching the filter.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Store`] on backend failure.
    pub fn sessions(&self, filter: SessionFilter) -> Result<Vec<Session>, PoolError> {
        Ok(self.store.sessions(filter)?)
    }

    /// Counts sessions still in the `Active` state.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Store`] on backend failure.
    pub fn active_session_count(&self) -> Result<usize, PoolError> {
        Ok(self.store.sessions(SessionFilter::Active)?.len())
    }

    /// Returns the injected store handle.
    #[must_use]
    pub fn store(&self) -> Arc<dyn PoolStore> {
        Arc::clone(&self.store)
    }
}
