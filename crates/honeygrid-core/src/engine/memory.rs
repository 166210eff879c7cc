// crates/honeygrid-core/src/engine/memory.rs
// ============================================================================
// Module: Honeygrid In-Memory Store
// Description: BTreeMap-backed PoolStore for tests and embedded deployments.
// Purpose: Provide a dependency-free reference store with atomic batches.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! The in-memory store keeps all four entity tables in `BTreeMap`s behind a
//! single mutex, which gives the same deterministic ascending-id scan order
//! and batch atomicity the durable store provides. It backs the engine test
//! suite and embedded single-process deployments that do not need
//! persistence across restarts.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use crate::core::container::Container;
use crate::core::decision::DecisionLogRecord;
use crate::core::identifiers::ContainerId;
use crate::core::identifiers::SessionId;
use crate::core::routing::RoutingEntry;
use crate::core::session::Session;
use crate::core::session::SessionState;
use crate::core::tier::Tier;
use crate::core::time::Timestamp;
use crate::interfaces::PoolStore;
use crate::interfaces::SessionFilter;
use crate::interfaces::StateMutation;
use crate::interfaces::StoreError;
use crate::interfaces::TierCounts;

// ============================================================================
// SECTION: State Tables
// ============================================================================

/// The four entity tables plus the decision sequence counter.
#[derive(Debug, Default)]
struct Tables {
    /// Containers by id.
    containers: BTreeMap<ContainerId, Container>,
    /// Sessions by id.
    sessions: BTreeMap<SessionId, Session>,
    /// Routing entries by session id.
    routing: BTreeMap<SessionId, RoutingEntry>,
    /// Decision log records in append order.
    decisions: Vec<DecisionLogRecord>,
    /// Next decision sequence number.
    next_seq: u64,
}

// ============================================================================
// SECTION: In-Memory Store
// ============================================================================

/// BTreeMap-backed [`PoolStore`].
///
/// # Invariants
/// - All tables live behind one mutex, so a batch is observed whole or not
///   at all.
#[derive(Debug)]
pub struct InMemoryPoolStore {
    /// Guarded entity tables.
    tables: Mutex<Tables>,
}

impl Default for InMemoryPoolStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryPoolStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables {
                next_seq: 1,
                ..Tables::default()
            }),
        }
    }

    /// Acquires the table lock, recovering from poisoning.
    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PoolStore for InMemoryPoolStore {
    fn container(&self, id: &ContainerId) -> Result<Option<Container>, StoreError> {
        Ok(self.tables().containers.get(id).cloned())
    }

    fn containers(&self) -> Result<Vec<Container>, StoreError> {
        Ok(self.tables().containers.values().cloned().collect())
    }

    fn idle_containers(&self, tier: Tier) -> Result<Vec<Container>, StoreError> {
        Ok(self
            .tables()
            .containers
            .values()
            .filter(|container| container.tier == tier && container.is_assignable())
            .cloned()
            .collect())
    }

    fn session(&self, id: &SessionId) -> Result<Option<Session>, StoreError> {
        Ok(self.tables().sessions.get(id).cloned())
    }

    fn sessions(&self, filter: SessionFilter) -> Result<Vec<Session>, StoreError> {
        Ok(self
            .tables()
            .sessions
            .values()
            .filter(|session| match filter {
                SessionFilter::All => true,
                SessionFilter::Active => session.state == SessionState::Active,
                SessionFilter::Terminal => session.state.is_terminal(),
            })
            .cloned()
            .collect())
    }

    fn expired_sessions(&self, now: Timestamp) -> Result<Vec<Session>, StoreError> {
        Ok(self
            .tables()
            .sessions
            .values()
            .filter(|session| session.is_expired(now))
            .cloned()
            .collect())
    }

    fn routing_entry(&self, session_id: &SessionId) -> Result<Option<RoutingEntry>, StoreError> {
        Ok(self.tables().routing.get(session_id).cloned())
    }

    fn routing_entries(&self) -> Result<Vec<RoutingEntry>, StoreError> {
        Ok(self.tables().routing.values().cloned().collect())
    }

    fn decision_log(&self, session_id: &SessionId) -> Result<Vec<DecisionLogRecord>, StoreError> {
        Ok(self
            .tables()
            .decisions
            .iter()
            .filter(|record| &record.entry.session_id == session_id)
            .cloned()
            .collect())
    }

    fn tier_counts(&self, tier: Tier) -> Result<TierCounts, StoreError> {
        let tables = self.tables();
        let mut counts = TierCounts::default();
        for container in tables.containers.values() {
            if container.tier != tier {
                continue;
            }
            counts.total += 1;
            if container.is_assignable() {
                counts.idle += 1;
            }
            if container.assigned_session.is_some() {
                counts.assigned += 1;
            }
            if !container.healthy {
                counts.unhealthy += 1;
            }
        }
        Ok(counts)
    }

    fn apply(&self, mutations: &[StateMutation]) -> Result<(), StoreError> {
        let mut tables = self.tables();
        for mutation in mutations {
            match mutation {
                StateMutation::PutContainer(container) => {
                    tables
                        .containers
                        .insert(container.id.clone(), container.clone());
                }
                StateMutation::PutSession(session) => {
                    tables.sessions.insert(session.id.clone(), session.clone());
                }
                StateMutation::UpsertRouting(entry) => {
                    tables.routing.insert(entry.session_id.clone(), entry.clone());
                }
                StateMutation::RemoveRouting(session_id) => {
                    tables.routing.remove(session_id);
                }
                StateMutation::AppendDecision(entry) => {
                    let seq = tables.next_seq;
                    tables.next_seq += 1;
                    tables.decisions.push(DecisionLogRecord {
                        seq,
                        entry: entry.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        reason = "Test-only panic-based assertions are permitted."
    )]

    use super::*;
    use crate::core::container::UpstreamAddr;

    fn container(id: &str, tier: Tier) -> Container {
        Container::new(
            ContainerId::new(id),
            tier,
            UpstreamAddr::new("10.0.2.2", 8081),
            Timestamp::from_unix_millis(0),
        )
    }

    #[test]
    fn idle_scan_is_ordered_and_filters_health() {
        let store = InMemoryPoolStore::new();
        let mut sick = container("trap-tier1-2", Tier::Low);
        sick.mark_health(false, Timestamp::from_unix_millis(1));
        store
            .apply(&[
                StateMutation::PutContainer(container("trap-tier1-3", Tier::Low)),
                StateMutation::PutContainer(container("trap-tier1-1", Tier::Low)),
                StateMutation::PutContainer(sick),
                StateMutation::PutContainer(container("trap-tier2-1", Tier::Medium)),
            ])
            .unwrap();

        let idle = store.idle_containers(Tier::Low).unwrap();
        let ids: Vec<&str> = idle.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["trap-tier1-1", "trap-tier1-3"]);
    }

    #[test]
    fn decision_sequence_numbers_increase() {
        let store = InMemoryPoolStore::new();
        let entry = crate::core::decision::DecisionLogEntry {
            session_id: SessionId::new("sess-a"),
            action: "maintain".to_owned(),
            rule_id: crate::core::identifiers::RuleId::new("rule-1"),
            skill_score_before: None,
            skill_score_after: crate::core::session::SkillScore::new(3).unwrap(),
            from_container: None,
            to_container: None,
            explanation: "baseline probe".to_owned(),
            timestamp: Timestamp::from_unix_millis(5),
        };
        store
            .apply(&[
                StateMutation::AppendDecision(entry.clone()),
                StateMutation::AppendDecision(entry),
            ])
            .unwrap();
        let log = store.decision_log(&SessionId::new("sess-a")).unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].seq, 1);
        assert_eq!(log[1].seq, 2);
    }

    #[test]
    fn tier_counts_track_assignment_and_health() {
        let store = InMemoryPoolStore::new();
        let mut assigned = container("trap-tier1-1", Tier::Low);
        assigned.assign_to(SessionId::new("sess-a"), Timestamp::from_unix_millis(1));
        store
            .apply(&[
                StateMutation::PutContainer(assigned),
                StateMutation::PutContainer(container("trap-tier1-2", Tier::Low)),
            ])
            .unwrap();
        let counts = store.tier_counts(Tier::Low).unwrap();
        assert_eq!(counts.total, 2);
        assert_eq!(counts.idle, 1);
        assert_eq!(counts.assigned, 1);
        assert_eq!(counts.unhealthy, 0);
    }
}
