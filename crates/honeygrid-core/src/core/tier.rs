// crates/honeygrid-core/src/core/tier.rs
// ============================================================================
// Module: Honeygrid Tiers
// Description: Ordinal interaction tiers for container pools.
// Purpose: Provide an ordered tier type with escalation-only traversal.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A tier is an ordinal interaction level (1 = lowest fidelity, 3 = highest)
//! determining which container pool a session may be routed to. Escalation
//! only ever moves up: fallback traversal visits strictly higher tiers and
//! never considers tiers below the requested target.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Tier
// ============================================================================

/// Ordinal interaction tier for a container pool.
///
/// # Invariants
/// - Ordering follows interaction level: `Low < Medium < High`.
/// - The wire form is the numeric level (1..=3).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub enum Tier {
    /// Tier 1: low-interaction pool.
    Low,
    /// Tier 2: medium-interaction pool.
    Medium,
    /// Tier 3: high-interaction pool.
    High,
}

/// All tiers in ascending order.
pub const ALL_TIERS: [Tier; 3] = [Tier::Low, Tier::Medium, Tier::High];

impl Tier {
    /// Creates a tier from its numeric level (returns `None` outside 1..=3).
    #[must_use]
    pub const fn from_level(level: u8) -> Option<Self> {
        match level {
            1 => Some(Self::Low),
            2 => Some(Self::Medium),
            3 => Some(Self::High),
            _ => None,
        }
    }

    /// Returns the numeric level (1..=3).
    #[must_use]
    pub const fn level(self) -> u8 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
        }
    }

    /// Returns the next tier up, or `None` at the top.
    #[must_use]
    pub const fn next_up(self) -> Option<Self> {
        match self {
            Self::Low => Some(Self::Medium),
            Self::Medium => Some(Self::High),
            Self::High => None,
        }
    }

    /// Iterates this tier followed by every strictly higher tier, ascending.
    ///
    /// This is the fallback search order for assignment: the exact target
    /// first, then escalation-only candidates. Tiers below `self` are never
    /// produced.
    pub fn and_above(self) -> impl Iterator<Item = Self> {
        let mut cursor = Some(self);
        std::iter::from_fn(move || {
            let current = cursor?;
            cursor = current.next_up();
            Some(current)
        })
    }

    /// Returns a stable label for the tier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "tier1",
            Self::Medium => "tier2",
            Self::High => "tier3",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Tier> for u8 {
    fn from(tier: Tier) -> Self {
        tier.level()
    }
}

impl TryFrom<u8> for Tier {
    type Error = String;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        Self::from_level(level).ok_or_else(|| format!("tier level out of range: {level}"))
    }
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

    #[test]
    fn ordering_follows_interaction_level() {
        assert!(Tier::Low < Tier::Medium);
        assert!(Tier::Medium < Tier::High);
    }

    #[test]
    fn and_above_never_descends() {
        let from_medium: Vec<Tier> = Tier::Medium.and_above().collect();
        assert_eq!(from_medium, vec![Tier::Medium, Tier::High]);
        let from_high: Vec<Tier> = Tier::High.and_above().collect();
        assert_eq!(from_high, vec![Tier::High]);
    }

    #[test]
    fn numeric_round_trip() {
        for tier in ALL_TIERS {
            assert_eq!(Tier::from_level(tier.level()), Some(tier));
        }
        assert_eq!(Tier::from_level(0), None);
        assert_eq!(Tier::from_level(4), None);
    }
}
