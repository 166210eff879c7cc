// crates/honeygrid-core/src/core/container.rs
// ============================================================================
// Module: Honeygrid Containers
// Description: Container entity, lifecycle states, and upstream addressing.
// Purpose: Model one sandboxed environment available for assignment.
// Dependencies: crate::core::{identifiers, tier, time}, serde
// ============================================================================

//! ## Overview
//! A container is one instance of a sandboxed environment the control plane
//! can hand out. Containers are created in bulk at startup from static pool
//! configuration and never deleted at runtime; only their lifecycle state,
//! health flag, and assignment change.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::ContainerId;
use crate::core::identifiers::SessionId;
use crate::core::tier::Tier;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Upstream Address
// ============================================================================

/// Network address of a container, rendered `host:port` for the proxy.
///
/// # Invariants
/// - `host` is non-empty; boundary layers validate before construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UpstreamAddr {
    /// Host component (IP address or resolvable name).
    pub host: String,
    /// TCP port the container listens on.
    pub port: u16,
}

impl UpstreamAddr {
    /// Creates a new upstream address.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for UpstreamAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

// ============================================================================
// SECTION: Container State
// ============================================================================

/// Container lifecycle state.
///
/// # Invariants
/// - Variants are stable for serialization and store round-trips.
/// - `Assigned` is the only state in which `assigned_session` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerState {
    /// Available for assignment (subject to the health flag).
    Idle,
    /// Held by exactly one session.
    Assigned,
    /// Failed its last health check while unassigned.
    Unhealthy,
    /// Being drained ahead of maintenance; never assignable.
    Draining,
}

impl ContainerState {
    /// Returns a stable label for the state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Assigned => "assigned",
            Self::Unhealthy => "unhealthy",
            Self::Draining => "draining",
        }
    }

    /// Parses a state from its stable label.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "idle" => Some(Self::Idle),
            "assigned" => Some(Self::Assigned),
            "unhealthy" => Some(Self::Unhealthy),
            "draining" => Some(Self::Draining),
            _ => None,
        }
    }
}

impl fmt::Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Container
// ============================================================================

/// One sandboxed environment in a tiered pool.
///
/// # Invariants
/// - `assigned_session` is `Some` if and only if `state == Assigned`.
/// - `tier` never changes after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    /// Stable container identifier.
    pub id: ContainerId,
    /// Interaction tier; immutable after creation.
    pub tier: Tier,
    /// Network address handed to the proxy on assignment.
    pub upstream: UpstreamAddr,
    /// Lifecycle state.
    pub state: ContainerState,
    /// Session currently holding this container, when assigned.
    pub assigned_session: Option<SessionId>,
    /// Health flag from the most recent health check.
    pub healthy: bool,
    /// Time of the most recent health check.
    pub last_health_check: Option<Timestamp>,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last mutation time.
    pub updated_at: Timestamp,
}

impl Container {
    /// Creates a new idle, healthy container.
    #[must_use]
    pub fn new(id: ContainerId, tier: Tier, upstream: UpstreamAddr, now: Timestamp) -> Self {
        Self {
            id,
            tier,
            upstream,
            state: ContainerState::Idle,
            assigned_session: None,
            healthy: true,
            last_health_check: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns true when the container may be handed to a new session.
    #[must_use]
    pub const fn is_assignable(&self) -> bool {
        matches!(self.state, ContainerState::Idle) && self.healthy
    }

    /// Transitions `Idle -> Assigned` for the given session.
    pub fn assign_to(&mut self, session_id: SessionId, now: Timestamp) {
        self.state = ContainerState::Assigned;
        self.assigned_session = Some(session_id);
        self.updated_at = now;
    }

    /// Transitions `Assigned -> Idle` (or `Unhealthy` when the health flag
    /// is down), clearing the assignment.
    pub fn release(&mut self, now: Timestamp) {
        self.state = if self.healthy {
            ContainerState::Idle
        } else {
            ContainerState::Unhealthy
        };
        self.assigned_session = None;
        self.updated_at = now;
    }

    /// Records a health-check outcome.
    ///
    /// An assigned container keeps its `Assigned` label either way so the
    /// current assignment is never silently dropped; only the flag flips.
    /// An unassigned container moves between `Idle` and `Unhealthy`.
    pub fn mark_health(&mut self, healthy: bool, now: Timestamp) {
        self.healthy = healthy;
        self.last_health_check = Some(now);
        self.updated_at = now;
        match self.state {
            ContainerState::Idle if !healthy => self.state = ContainerState::Unhealthy,
            ContainerState::Unhealthy if healthy => self.state = ContainerState::Idle,
            ContainerState::Idle
            | ContainerState::Unhealthy
            | ContainerState::Assigned
            | ContainerState::Draining => {}
        }
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

    fn container() -> Container {
        Container::new(
            ContainerId::new("trap-tier1-1"),
            Tier::Low,
            UpstreamAddr::new("10.0.2.2", 8081),
            Timestamp::from_unix_millis(1_000),
        )
    }

    #[test]
    fn assignment_sets_session_and_state_together() {
        let mut c = container();
        c.assign_to(SessionId::new("sess-a"), Timestamp::from_unix_millis(2_000));
        assert_eq!(c.state, ContainerState::Assigned);
        assert_eq!(c.assigned_session, Some(SessionId::new("sess-a")));
        c.release(Timestamp::from_unix_millis(3_000));
        assert_eq!(c.state, ContainerState::Idle);
        assert_eq!(c.assigned_session, None);
    }

    #[test]
    fn release_of_unhealthy_container_does_not_return_it_to_idle() {
        let mut c = container();
        c.assign_to(SessionId::new("sess-a"), Timestamp::from_unix_millis(2_000));
        c.mark_health(false, Timestamp::from_unix_millis(2_500));
        assert_eq!(c.state, ContainerState::Assigned);
        c.release(Timestamp::from_unix_millis(3_000));
        assert_eq!(c.state, ContainerState::Unhealthy);
        assert!(!c.is_assignable());
    }

    #[test]
    fn health_recovery_requires_no_assignment() {
        let mut c = container();
        c.mark_health(false, Timestamp::from_unix_millis(2_000));
        assert_eq!(c.state, ContainerState::Unhealthy);
        c.mark_health(true, Timestamp::from_unix_millis(3_000));
        assert_eq!(c.state, ContainerState::Idle);
        assert!(c.is_assignable());
    }

    #[test]
    fn upstream_renders_host_port() {
        assert_eq!(UpstreamAddr::new("10.0.2.7", 8091).to_string(), "10.0.2.7:8091");
    }
}
