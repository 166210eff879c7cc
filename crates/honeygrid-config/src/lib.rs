// crates/honeygrid-config/src/lib.rs
// ============================================================================
// Module: Honeygrid Config Library
// Description: Canonical configuration model for the control plane.
// Purpose: Load, validate, and derive the static pool layout from TOML.
// Dependencies: crate::config
// ============================================================================

//! ## Overview
//! Honeygrid configuration is a single TOML file describing the three
//! container pools, the honeypot network, session lifetimes, and the proxy
//! synchronization endpoints. Loading is strict and fail-closed: unknown
//! keys, out-of-range values, and layouts that do not fit the subnet are
//! all rejected before anything starts.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::ConfigError;
pub use config::HoneygridConfig;
pub use config::NetworkConfig;
pub use config::PoolTierConfig;
pub use config::PoolsConfig;
pub use config::ProxyConfig;
pub use config::SessionConfig;
