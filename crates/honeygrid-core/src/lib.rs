// crates/honeygrid-core/src/lib.rs
// ============================================================================
// Module: Honeygrid Core Library
// Description: Public API surface for the Honeygrid control plane core.
// Purpose: Expose pool data model, store interfaces, and the pool engine.
// Dependencies: crate::{core, engine, interfaces}
// ============================================================================

//! ## Overview
//! Honeygrid core implements the pool/session orchestration engine for a
//! tiered honeypot deployment: container assignment with escalation-only
//! fallback, session lifecycle transitions, expiry sweeps, and status
//! aggregation. It is backend-agnostic and integrates through explicit store
//! interfaces rather than embedding a particular database or proxy.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod engine;
pub mod interfaces;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use engine::Assignment;
pub use engine::ContainerSpec;
pub use engine::EngineConfig;
pub use engine::InMemoryPoolStore;
pub use engine::PoolEngine;
pub use engine::PoolError;
pub use engine::ReleaseReason;
pub use engine::TierStatus;
pub use interfaces::PoolStore;
pub use interfaces::SessionFilter;
pub use interfaces::StateMutation;
pub use interfaces::StoreError;
pub use interfaces::TierCounts;
