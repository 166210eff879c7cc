// crates/honeygrid-core/src/core/session.rs
// ============================================================================
// Module: Honeygrid Sessions
// Description: Session entity, lifecycle states, and the skill score.
// Purpose: Model a tracked actor's routing identity across its visit.
// Dependencies: crate::core::{identifiers, tier, time}, serde, thiserror
// ============================================================================

//! ## Overview
//! A session is the routing identity of one tracked actor across potentially
//! several container assignments. Sessions are created implicitly on first
//! assignment, escalated upward only, and end in a terminal `Released` or
//! `Expired` state that is retained for audit rather than deleted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::identifiers::ContainerId;
use crate::core::identifiers::DecisionRef;
use crate::core::identifiers::SessionId;
use crate::core::tier::Tier;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Skill Score
// ============================================================================

/// Maximum accepted skill score.
pub const MAX_SKILL_SCORE: u8 = 10;

/// Skill score error raised for out-of-range values.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SkillScoreError {
    /// Score exceeded the inclusive 0..=10 range.
    #[error("skill score out of range: {0} (max {MAX_SKILL_SCORE})")]
    OutOfRange(u8),
}

/// Caller-supplied skill assessment, informational only.
///
/// # Invariants
/// - Always within 0..=10; enforced at construction.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub struct SkillScore(u8);

impl SkillScore {
    /// Creates a skill score, rejecting values above [`MAX_SKILL_SCORE`].
    ///
    /// # Errors
    ///
    /// Returns [`SkillScoreError::OutOfRange`] for values above 10.
    pub const fn new(score: u8) -> Result<Self, SkillScoreError> {
        if score > MAX_SKILL_SCORE {
            return Err(SkillScoreError::OutOfRange(score));
        }
        Ok(Self(score))
    }

    /// Returns the raw score value.
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl fmt::Display for SkillScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<SkillScore> for u8 {
    fn from(score: SkillScore) -> Self {
        score.get()
    }
}

impl TryFrom<u8> for SkillScore {
    type Error = SkillScoreError;

    fn try_from(score: u8) -> Result<Self, Self::Error> {
        Self::new(score)
    }
}

// ============================================================================
// SECTION: Session State
// ============================================================================

/// Session lifecycle state.
///
/// # Invariants
/// - Variants are stable for serialization and store round-trips.
/// - `Released` and `Expired` are terminal; no transition leaves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Session may hold a container and receive escalations.
    Active,
    /// Explicitly released; terminal.
    Released,
    /// Reclaimed by the expiry sweep; terminal.
    Expired,
}

impl SessionState {
    /// Returns a stable label for the state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Released => "released",
            Self::Expired => "expired",
        }
    }

    /// Parses a state from its stable label.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "active" => Some(Self::Active),
            "released" => Some(Self::Released),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }

    /// Returns true for the terminal states.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Released | Self::Expired)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Session
// ============================================================================

/// The routing identity of one tracked actor.
///
/// # Invariants
/// - `container_id` is `Some` only while `state == Active` and the referenced
///   container's `assigned_session` points back at this session.
/// - `current_tier` is monotonically non-decreasing for the session's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Caller-supplied opaque session identifier.
    pub id: SessionId,
    /// Highest tier this session has been assigned to.
    pub current_tier: Tier,
    /// Container currently held, when any.
    pub container_id: Option<ContainerId>,
    /// Lifecycle state.
    pub state: SessionState,
    /// Caller-supplied skill assessment.
    pub skill_score: SkillScore,
    /// Number of successful new allocations for this session.
    pub escalation_count: u32,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last mutation time.
    pub updated_at: Timestamp,
    /// Time after which the expiry sweep reclaims this session.
    pub expires_at: Option<Timestamp>,
    /// Reference to the most recent decision applied to this session.
    pub last_decision_ref: Option<DecisionRef>,
}

impl Session {
    /// Creates a new active tier-1 session.
    #[must_use]
    pub const fn new(id: SessionId, now: Timestamp) -> Self {
        Self {
            id,
            current_tier: Tier::Low,
            container_id: None,
            state: SessionState::Active,
            skill_score: SkillScore(0),
            escalation_count: 0,
            created_at: now,
            updated_at: now,
            expires_at: None,
            last_decision_ref: None,
        }
    }

    /// Returns true when the expiry sweep should reclaim this session.
    #[must_use]
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.state == SessionState::Active
            && self.expires_at.is_some_and(|deadline| deadline < now)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
