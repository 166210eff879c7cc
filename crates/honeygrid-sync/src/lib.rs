// crates/honeygrid-sync/src/lib.rs
// ============================================================================
// Module: Honeygrid Sync Library
// Description: Routing map synchronization between the store and the proxy.
// Purpose: Keep the nginx cookie map consistent with committed assignments.
// Dependencies: crate::{error, executor, install, map, nginx, sweeper, synchronizer}
// ============================================================================

//! ## Overview
//! The sync crate owns everything between the durable routing table and the
//! external nginx proxy: rendering the cookie-to-upstream map, installing
//! it atomically, reloading nginx behind a liveness probe and config
//! self-test, the periodic expiry sweeper, and the decision executor that
//! drives engine transitions and map updates from one escalation decision.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod error;
pub mod executor;
pub mod install;
pub mod map;
pub mod nginx;
pub mod sweeper;
pub mod synchronizer;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use error::SyncError;
pub use executor::DecisionExecutor;
pub use executor::ExecutionReport;
pub use executor::ExecutorError;
pub use install::install_map;
pub use map::MAP_MARKER;
pub use map::render_map;
pub use map::validate_map;
pub use nginx::NginxController;
pub use sweeper::CleanupSweeper;
pub use synchronizer::RoutingSynchronizer;
