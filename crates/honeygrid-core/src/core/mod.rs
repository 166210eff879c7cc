// crates/honeygrid-core/src/core/mod.rs
// ============================================================================
// Module: Honeygrid Core Model
// Description: Entity types, identifiers, and the escalation decision contract.
// Purpose: Group the canonical data model consumed by the engine and stores.
// Dependencies: crate::core submodules
// ============================================================================

//! ## Overview
//! The core model covers the four persisted entity kinds (containers,
//! sessions, routing entries, decision log entries) plus the identifier and
//! time primitives they share. All types carry stable serde wire forms.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod container;
pub mod decision;
pub mod identifiers;
pub mod routing;
pub mod session;
pub mod tier;
pub mod time;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use container::Container;
pub use container::ContainerState;
pub use container::UpstreamAddr;
pub use decision::DecisionLogEntry;
pub use decision::DecisionLogRecord;
pub use decision::DecisionValidationError;
pub use decision::EscalationAction;
pub use decision::EscalationDecision;
pub use identifiers::ContainerId;
pub use identifiers::DecisionRef;
pub use identifiers::RuleId;
pub use identifiers::SessionId;
pub use routing::ROUTING_KEY_PREFIX;
pub use routing::RoutingEntry;
pub use routing::RoutingKey;
pub use routing::RoutingKeyError;
pub use routing::RoutingKeyGenerator;
pub use session::Session;
pub use session::SessionState;
pub use session::SkillScore;
pub use session::SkillScoreError;
pub use tier::ALL_TIERS;
pub use tier::Tier;
pub use time::Timestamp;
