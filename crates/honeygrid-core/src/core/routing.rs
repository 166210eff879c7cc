// crates/honeygrid-core/src/core/routing.rs
// ============================================================================
// Module: Honeygrid Routing Entries
// Description: Per-session routing keys and proxy map entries.
// Purpose: Bind an unguessable cookie token to a session's upstream address.
// Dependencies: crate::core::{container, identifiers, time}, rand, serde, sha2, thiserror
// ============================================================================

//! ## Overview
//! A routing entry is the external proxy's view of one session: an
//! unguessable routing key (carried by the actor as a cookie) mapped to the
//! upstream address of the container currently assigned to that session.
//! Keys are derived from a SHA-256 over the session id, a boot-scoped random
//! seed, and a monotonic counter, so they are unique within a process
//! lifetime and not predictable from session identifiers.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use rand::RngCore;
use rand::rngs::OsRng;
use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

use crate::core::container::UpstreamAddr;
use crate::core::identifiers::SessionId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Routing Key
// ============================================================================

/// Prefix carried by every routing key.
pub const ROUTING_KEY_PREFIX: &str = "hgsess_";

/// Number of lowercase hex digits following the prefix.
const ROUTING_KEY_DIGEST_LEN: usize = 16;

/// Routing key rejection reasons.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RoutingKeyError {
    /// Key did not start with [`ROUTING_KEY_PREFIX`].
    #[error("routing key missing prefix")]
    MissingPrefix,
    /// Key suffix was not exactly 16 lowercase hex digits.
    #[error("routing key malformed digest")]
    MalformedDigest,
}

/// Unguessable per-session token used by the proxy to select an upstream.
///
/// # Invariants
/// - Wire form is `hgsess_` followed by 16 lowercase hex digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoutingKey(String);

impl RoutingKey {
    /// Parses and validates a routing key.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingKeyError`] when the prefix or digest is malformed.
    pub fn parse(value: impl Into<String>) -> Result<Self, RoutingKeyError> {
        let value = value.into();
        let Some(digest) = value.strip_prefix(ROUTING_KEY_PREFIX) else {
            return Err(RoutingKeyError::MissingPrefix);
        };
        if digest.len() != ROUTING_KEY_DIGEST_LEN
            || !digest.chars().all(|ch| ch.is_ascii_hexdigit() && !ch.is_ascii_uppercase())
        {
            return Err(RoutingKeyError::MalformedDigest);
        }
        Ok(Self(value))
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoutingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<RoutingKey> for String {
    fn from(key: RoutingKey) -> Self {
        key.0
    }
}

impl TryFrom<String> for RoutingKey {
    type Error = RoutingKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

// ============================================================================
// SECTION: Routing Key Generator
// ============================================================================

/// Boot-scoped routing key generator.
///
/// # Invariants
/// - Issued keys are unique within the process lifetime.
#[derive(Debug)]
pub struct RoutingKeyGenerator {
    /// Boot-scoped random seed mixed into every derivation.
    boot_seed: u64,
    /// Monotonic counter for keys issued in this process.
    counter: AtomicU64,
}

impl Default for RoutingKeyGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl RoutingKeyGenerator {
    /// Creates a new generator with a fresh random seed.
    #[must_use]
    pub fn new() -> Self {
        let mut bytes = [0u8; 8];
        OsRng.fill_bytes(&mut bytes);
        Self {
            boot_seed: u64::from_be_bytes(bytes),
            counter: AtomicU64::new(1),
        }
    }

    /// Derives a fresh routing key bound to the given session.
    #[must_use]
    pub fn derive(&self, session_id: &SessionId) -> RoutingKey {
        let seq = self.counter.fetch_add(1, Ordering::Relaxed);
        let mut hasher = Sha256::new();
        hasher.update(session_id.as_str().as_bytes());
        hasher.update(self.boot_seed.to_be_bytes());
        hasher.update(seq.to_be_bytes());
        let digest = hasher.finalize();
        let mut suffix = String::with_capacity(ROUTING_KEY_DIGEST_LEN);
        for byte in digest.iter().take(ROUTING_KEY_DIGEST_LEN / 2) {
            suffix.push_str(&format!("{byte:02x}"));
        }
        RoutingKey(format!("{ROUTING_KEY_PREFIX}{suffix}"))
    }
}

// ============================================================================
// SECTION: Routing Entry
// ============================================================================

/// The external proxy's view of one session's target.
///
/// # Invariants
/// - At most one entry exists per session id.
/// - `upstream` always equals the address of the container currently
///   assigned to `session_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingEntry {
    /// Routing key carried by the actor as a cookie.
    pub routing_key: RoutingKey,
    /// Session this entry routes.
    pub session_id: SessionId,
    /// Upstream address of the assigned container.
    pub upstream: UpstreamAddr,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last mutation time.
    pub updated_at: Timestamp,
}

impl RoutingEntry {
    /// Creates a new routing entry.
    #[must_use]
    pub const fn new(
        routing_key: RoutingKey,
        session_id: SessionId,
        upstream: UpstreamAddr,
        now: Timestamp,
    ) -> Self {
        Self {
            routing_key,
            session_id,
            upstream,
            created_at: now,
            updated_at: now,
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
