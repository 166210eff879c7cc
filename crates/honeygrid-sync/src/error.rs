// crates/honeygrid-sync/src/error.rs
// ============================================================================
// Module: Honeygrid Sync Errors
// Description: Failure taxonomy for map rendering, install, and reload.
// Purpose: Give callers stable variants to decide retry policy on.
// Dependencies: honeygrid_core, thiserror
// ============================================================================

//! ## Overview
//! Every sync-side failure is surfaced as a [`SyncError`] variant; nothing
//! in this crate panics or retries on its own. Callers (the sweeper, the
//! decision executor, host services) decide whether a failure warrants a
//! retry, and the routing table plus map file are left consistent either
//! way.

// ============================================================================
// SECTION: Imports
// ============================================================================

use honeygrid_core::StoreError;
use thiserror::Error;

// ============================================================================
// SECTION: Sync Errors
// ============================================================================

/// Routing synchronization failure taxonomy.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Map content could not be rendered.
    #[error("routing map render failed: {0}")]
    Render(String),
    /// Rendered map failed structural validation.
    #[error("routing map validation failed: {0}")]
    Validate(String),
    /// Filesystem failure outside the final install step.
    #[error("sync io failure: {0}")]
    Io(String),
    /// Atomic rename over the final map path failed.
    #[error("routing map install failed: {0}")]
    Install(String),
    /// Proxy liveness probe failed or returned a non-success status.
    #[error("proxy probe failed: {0}")]
    ProbeFailed(String),
    /// Proxy configuration self-test exited non-zero.
    #[error("proxy config test failed: {0}")]
    ConfigTestFailed(String),
    /// Proxy reload command exited non-zero.
    #[error("proxy reload failed: {0}")]
    ReloadFailed(String),
    /// A probe or command exceeded its bounded timeout.
    #[error("sync operation timed out: {0}")]
    Timeout(String),
    /// Store failure while reading or updating the routing table.
    #[error(transparent)]
    Store(#[from] StoreError),
}
