// crates/honeygrid-core/tests/proptest_assignment.rs
// ============================================================================
// Module: Assignment Property Tests
// Description: Invariant checks over randomized operation sequences.
// Purpose: Verify exclusivity and monotonicity under arbitrary interleavings.
// Dependencies: honeygrid_core, proptest
// ============================================================================

//! ## Overview
//! Property coverage for the core pool invariants: a container is held by at
//! most one active session, assignment back-pointers stay consistent in both
//! directions, session tiers never decrease, and terminal sessions hold
//! nothing. Operations are drawn randomly and applied with an advancing
//! clock.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    reason = "Test-only panic-based assertions are permitted."
)]

use std::collections::BTreeMap;
use std::sync::Arc;

use proptest::prelude::*;

use honeygrid_core::ContainerId;
use honeygrid_core::ContainerSpec;
use honeygrid_core::ContainerState;
use honeygrid_core::EngineConfig;
use honeygrid_core::InMemoryPoolStore;
use honeygrid_core::PoolEngine;
use honeygrid_core::ReleaseReason;
use honeygrid_core::SessionFilter;
use honeygrid_core::SessionId;
use honeygrid_core::Tier;
use honeygrid_core::Timestamp;

/// One randomized step against the engine.
#[derive(Debug, Clone)]
enum Op {
    /// Assign one of the fixed session ids at a tier.
    Assign(usize, Tier),
    /// Release one of the fixed session ids.
    Release(usize),
    /// Flip the health flag on one container.
    Health(usize, bool),
    /// Run the expiry sweep far in the future of the current clock.
    Sweep,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..6_usize, prop_oneof![Just(Tier::Low), Just(Tier::Medium), Just(Tier::High)])
            .prop_map(|(session, tier)| Op::Assign(session, tier)),
        (0..6_usize).prop_map(Op::Release),
        (0..6_usize, any::<bool>()).prop_map(|(container, healthy)| Op::Health(container, healthy)),
        Just(Op::Sweep),
    ]
}

fn layout() -> Vec<ContainerSpec> {
    let mut specs = Vec::new();
    for (tier, count, base_port) in [(Tier::Low, 3_u16, 8081), (Tier::Medium, 2, 8091), (Tier::High, 1, 8096)]
    {
        for index in 0..count {
            specs.push(ContainerSpec {
                id: ContainerId::new(format!("trap-{}-{}", tier.as_str(), index + 1)),
                tier,
                host: "10.0.2.2".to_owned(),
                port: base_port + index,
            });
        }
    }
    specs
}

/// Asserts the cross-entity invariants after every step.
fn check_invariants(engine: &PoolEngine, tier_floor: &BTreeMap<SessionId, Tier>) {
    let store = engine.store();
    let containers = store.containers().unwrap();
    let sessions = store.sessions(SessionFilter::All).unwrap();

    // Exclusivity: each container names at most one session, and no session
    // is named by two containers.
    let mut holders: BTreeMap<SessionId, ContainerId> = BTreeMap::new();
    for container in &containers {
        assert_eq!(
            container.assigned_session.is_some(),
            container.state == ContainerState::Assigned
        );
        if let Some(session_id) = &container.assigned_session {
            let previous = holders.insert(session_id.clone(), container.id.clone());
            assert_eq!(previous, None, "session holds two containers");
        }
    }

    for session in &sessions {
        // Back-pointer consistency and terminal emptiness.
        if session.state.is_terminal() {
            assert_eq!(session.container_id, None);
            assert_eq!(holders.get(&session.id), None);
        } else if let Some(container_id) = &session.container_id {
            assert_eq!(holders.get(&session.id), Some(container_id));
        }
        // Monotonic tiers.
        if let Some(floor) = tier_floor.get(&session.id) {
            assert!(session.current_tier >= *floor, "session tier decreased");
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn invariants_hold_over_random_operation_sequences(ops in prop::collection::vec(op_strategy(), 1..60)) {
        let engine = PoolEngine::new(Arc::new(InMemoryPoolStore::new()), EngineConfig::new(60));
        let specs = layout();
        engine.initialize_pools(&specs, Timestamp::from_unix_millis(0)).unwrap();

        let mut clock = 1_000_i64;
        let mut tier_floor: BTreeMap<SessionId, Tier> = BTreeMap::new();

        for op in ops {
            clock += 1_000;
            let now = Timestamp::from_unix_millis(clock);
            match op {
                Op::Assign(session, tier) => {
                    let session_id = SessionId::new(format!("sess-{session}"));
                    if let Ok(assignment) = engine.assign_container(&session_id, tier, now) {
                        let floor = tier_floor.entry(session_id).or_insert(assignment.session.current_tier);
                        *floor = (*floor).max(assignment.session.current_tier);
                    }
                }
                Op::Release(session) => {
                    let session_id = SessionId::new(format!("sess-{session}"));
                    engine.release_session(&session_id, ReleaseReason::Requested, now).unwrap();
                    tier_floor.remove(&session_id);
                }
                Op::Health(container, healthy) => {
                    if let Some(spec) = specs.get(container) {
                        engine.mark_container_health(&spec.id, healthy, now).unwrap();
                    }
                }
                Op::Sweep => {
                    // Jump past every granted deadline so the sweep reclaims
                    // all active sessions.
                    clock += 120_000;
                    engine.cleanup_expired(Timestamp::from_unix_millis(clock)).unwrap();
                    tier_floor.clear();
                }
            }
            check_invariants(&engine, &tier_floor);
        }
    }
}
