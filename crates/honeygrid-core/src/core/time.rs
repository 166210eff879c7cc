// crates/honeygrid-core/src/core/time.rs
// ============================================================================
// Module: Honeygrid Time Model
// Description: Canonical timestamp representation for pool state and audit logs.
// Purpose: Provide deterministic time values across Honeygrid records.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Honeygrid uses explicit unix-millisecond timestamps embedded in operation
//! calls to keep engine behavior deterministic and testable. The pool engine
//! never reads wall-clock time directly; hosts supply `now` on every call
//! that needs it. [`Timestamp::now`] exists for those host layers.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Time Values
// ============================================================================

/// Canonical timestamp in unix milliseconds.
///
/// # Invariants
/// - Values are explicitly provided by callers; the engine never reads wall-clock time.
/// - No validation is performed; monotonicity is a caller responsibility.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a timestamp from unix milliseconds.
    #[must_use]
    pub const fn from_unix_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the timestamp as unix milliseconds.
    #[must_use]
    pub const fn as_unix_millis(self) -> i64 {
        self.0
    }

    /// Returns the current wall-clock time.
    ///
    /// Host layers use this to supply `now` to engine calls; the engine
    /// itself never calls it. Times before the unix epoch saturate to zero.
    #[must_use]
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX));
        Self(millis)
    }

    /// Returns this timestamp advanced by the given number of seconds.
    #[must_use]
    pub fn saturating_add_secs(self, secs: u64) -> Self {
        let millis = i64::try_from(secs).unwrap_or(i64::MAX).saturating_mul(1_000);
        Self(self.0.saturating_add(millis))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
