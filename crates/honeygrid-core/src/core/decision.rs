// crates/honeygrid-core/src/core/decision.rs
// ============================================================================
// Module: Honeygrid Decisions
// Description: Escalation decision contract and the append-only audit record.
// Purpose: Validate inbound decisions and capture why routing changed.
// Dependencies: crate::core::{identifiers, session, tier, time}, serde, thiserror
// ============================================================================

//! ## Overview
//! An escalation decision is the command an upstream rules engine issues
//! against one session: escalate to a named tier, maintain, or release. The
//! control plane validates it at the boundary, executes it, and appends a
//! decision log entry recording what was done and why. The log is append
//! only and never consulted by routing logic.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::identifiers::ContainerId;
use crate::core::identifiers::RuleId;
use crate::core::identifiers::SessionId;
use crate::core::session::MAX_SKILL_SCORE;
use crate::core::session::SkillScore;
use crate::core::tier::Tier;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Escalation Actions
// ============================================================================

/// Action requested by the upstream rules engine.
///
/// # Invariants
/// - Wire labels are stable snake-case strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationAction {
    /// Move the session to a tier-2 container.
    #[serde(rename = "escalate_tier2")]
    EscalateToTier2,
    /// Move the session to a tier-3 container.
    #[serde(rename = "escalate_tier3")]
    EscalateToTier3,
    /// Keep the current assignment; record the score update only.
    Maintain,
    /// End the session and reclaim its container.
    Release,
}

impl EscalationAction {
    /// Returns the tier an escalation action targets, `None` otherwise.
    #[must_use]
    pub const fn target_tier(self) -> Option<Tier> {
        match self {
            Self::EscalateToTier2 => Some(Tier::Medium),
            Self::EscalateToTier3 => Some(Tier::High),
            Self::Maintain | Self::Release => None,
        }
    }

    /// Returns a stable label for the action.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EscalateToTier2 => "escalate_tier2",
            Self::EscalateToTier3 => "escalate_tier3",
            Self::Maintain => "maintain",
            Self::Release => "release",
        }
    }
}

impl fmt::Display for EscalationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Escalation Decisions
// ============================================================================

/// Boundary validation failures for inbound decisions.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecisionValidationError {
    /// Session id was empty.
    #[error("decision session id is empty")]
    EmptySessionId,
    /// Rule id was empty.
    #[error("decision rule id is empty")]
    EmptyRuleId,
    /// Skill score exceeded the inclusive 0..=10 range.
    #[error("decision skill score out of range: {0} (max {MAX_SKILL_SCORE})")]
    ScoreOutOfRange(u8),
}

/// One decision issued by the upstream rules engine against a session.
///
/// # Invariants
/// - `skill_score` is raw wire input; [`EscalationDecision::validate`] is the
///   gate that converts it into a [`SkillScore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationDecision {
    /// Session the decision applies to.
    pub session_id: SessionId,
    /// Requested action.
    pub action: EscalationAction,
    /// Rule that produced the decision.
    pub rule_id: RuleId,
    /// Skill assessment accompanying the decision (0..=10).
    pub skill_score: u8,
    /// Human-readable explanation recorded verbatim in the audit log.
    pub explanation: String,
}

impl EscalationDecision {
    /// Validates the decision's boundary fields.
    ///
    /// # Errors
    ///
    /// Returns [`DecisionValidationError`] when the session id or rule id is
    /// empty, or the skill score is above 10.
    pub fn validate(&self) -> Result<SkillScore, DecisionValidationError> {
        if self.session_id.as_str().is_empty() {
            return Err(DecisionValidationError::EmptySessionId);
        }
        if self.rule_id.as_str().is_empty() {
            return Err(DecisionValidationError::EmptyRuleId);
        }
        SkillScore::new(self.skill_score)
            .map_err(|_| DecisionValidationError::ScoreOutOfRange(self.skill_score))
    }
}

// ============================================================================
// SECTION: Decision Log
// ============================================================================

/// Payload of one append-only audit record.
///
/// # Invariants
/// - Recorded verbatim; never read back by routing logic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionLogEntry {
    /// Session the decision applied to.
    pub session_id: SessionId,
    /// Stable action label (for example `escalate_tier2`).
    pub action: String,
    /// Rule that produced the decision.
    pub rule_id: RuleId,
    /// Skill score before the decision, when the session existed.
    pub skill_score_before: Option<SkillScore>,
    /// Skill score after the decision.
    pub skill_score_after: SkillScore,
    /// Container the session held before the decision.
    pub from_container: Option<ContainerId>,
    /// Container the session holds after the decision.
    pub to_container: Option<ContainerId>,
    /// Human-readable explanation recorded verbatim.
    pub explanation: String,
    /// Time the decision was executed.
    pub timestamp: Timestamp,
}

/// A decision log entry with its store-assigned sequence number.
///
/// # Invariants
/// - `seq` is unique and monotonically increasing within one store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionLogRecord {
    /// Store-assigned sequence number.
    pub seq: u64,
    /// The recorded payload.
    pub entry: DecisionLogEntry,
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

    fn decision() -> EscalationDecision {
        EscalationDecision {
            session_id: SessionId::new("sess-a"),
            action: EscalationAction::EscalateToTier2,
            rule_id: RuleId::new("rule-burst-probes"),
            skill_score: 7,
            explanation: "rapid enumeration across service ports".to_owned(),
        }
    }

    #[test]
    fn validate_accepts_well_formed_decisions() {
        assert_eq!(decision().validate(), Ok(SkillScore::new(7).unwrap()));
    }

    #[test]
    fn validate_rejects_boundary_violations() {
        let mut d = decision();
        d.session_id = SessionId::new("");
        assert_eq!(d.validate(), Err(DecisionValidationError::EmptySessionId));

        let mut d = decision();
        d.rule_id = RuleId::new("");
        assert_eq!(d.validate(), Err(DecisionValidationError::EmptyRuleId));

        let mut d = decision();
        d.skill_score = 11;
        assert_eq!(d.validate(), Err(DecisionValidationError::ScoreOutOfRange(11)));
    }

    #[test]
    fn actions_map_to_target_tiers() {
        assert_eq!(EscalationAction::EscalateToTier2.target_tier(), Some(Tier::Medium));
        assert_eq!(EscalationAction::EscalateToTier3.target_tier(), Some(Tier::High));
        assert_eq!(EscalationAction::Maintain.target_tier(), None);
        assert_eq!(EscalationAction::Release.target_tier(), None);
    }

    #[test]
    fn action_wire_form_is_snake_case() {
        let json = serde_json::to_string(&EscalationAction::EscalateToTier3).unwrap();
        assert_eq!(json, "\"escalate_tier3\"");
        let parsed: EscalationAction = serde_json::from_str("\"maintain\"").unwrap();
        assert_eq!(parsed, EscalationAction::Maintain);
    }
}
