// crates/honeygrid-store-sqlite/src/lib.rs
// ============================================================================
// Module: Honeygrid SQLite Store Library
// Description: Durable PoolStore implementation backed by SQLite.
// Purpose: Persist pool, session, routing, and audit state across restarts.
// Dependencies: crate::store
// ============================================================================

//! ## Overview
//! SQLite-backed [`honeygrid_core::PoolStore`] with WAL journaling, a busy
//! timeout, a schema-version gate, and atomic mutation batches. One durable
//! file is the whole control-plane state; reopening it after a crash yields
//! exactly the last committed batch boundary.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::JournalMode;
pub use store::SqlitePoolStore;
pub use store::SqlitePoolStoreConfig;
pub use store::SqlitePoolStoreError;
pub use store::SyncMode;
