// crates/honeygrid-sync/src/executor.rs
// ============================================================================
// Module: Honeygrid Decision Executor
// Description: Executes one escalation decision end to end.
// Purpose: Turn a rules-engine decision into engine, map, and proxy updates.
// Dependencies: crate::{error, nginx, synchronizer}, honeygrid_core, tracing
// ============================================================================

//! ## Overview
//! The executor is the seam between the upstream rules engine and the
//! control plane: it validates one decision, drives the pool engine
//! transition it asks for, keeps the routing map and proxy in step, and
//! appends the audit record. Pool exhaustion propagates as a typed error
//! with no state change. A sync failure after a successful assignment is
//! surfaced to the caller while the assignment itself stands; retrying the
//! same decision republishes the missing map row, because escalation
//! publishes whenever the routing table does not already point the session
//! at its assigned container.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use honeygrid_core::ContainerId;
use honeygrid_core::DecisionLogEntry;
use honeygrid_core::DecisionRef;
use honeygrid_core::DecisionValidationError;
use honeygrid_core::EscalationAction;
use honeygrid_core::EscalationDecision;
use honeygrid_core::PoolEngine;
use honeygrid_core::PoolError;
use honeygrid_core::ReleaseReason;
use honeygrid_core::RoutingKeyGenerator;
use honeygrid_core::SessionId;
use honeygrid_core::SkillScore;
use honeygrid_core::Tier;
use honeygrid_core::Timestamp;

use crate::error::SyncError;
use crate::nginx::NginxController;
use crate::synchronizer::RoutingSynchronizer;

// ============================================================================
// SECTION: Errors and Reports
// ============================================================================

/// Decision execution failure taxonomy.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// Decision rejected at the boundary before any state change.
    #[error(transparent)]
    Validation(#[from] DecisionValidationError),
    /// Pool engine rejected the transition.
    #[error(transparent)]
    Pool(#[from] PoolError),
    /// Map or proxy synchronization failed; engine state stands.
    #[error(transparent)]
    Sync(#[from] SyncError),
}

/// Summary of one executed decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionReport {
    /// Session the decision applied to.
    pub session_id: SessionId,
    /// Action that was executed.
    pub action: EscalationAction,
    /// Container the session held before the decision.
    pub from_container: Option<ContainerId>,
    /// Container the session holds after the decision.
    pub to_container: Option<ContainerId>,
    /// True when a container changed hands.
    pub newly_allocated: bool,
}

// ============================================================================
// SECTION: Executor
// ============================================================================

/// Executes escalation decisions against the engine and sync pair.
pub struct DecisionExecutor {
    /// Pool engine owning container and session transitions.
    engine: Arc<PoolEngine>,
    /// Synchronizer keeping the map aligned with the routing table.
    synchronizer: Arc<RoutingSynchronizer>,
    /// Controller reloading the proxy after map changes.
    controller: Arc<NginxController>,
    /// Routing key generator for newly published sessions.
    keys: RoutingKeyGenerator,
}

impl DecisionExecutor {
    /// Creates an executor over the given engine and sync pair.
    #[must_use]
    pub fn new(
        engine: Arc<PoolEngine>,
        synchronizer: Arc<RoutingSynchronizer>,
        controller: Arc<NginxController>,
    ) -> Self {
        Self {
            engine,
            synchronizer,
            controller,
            keys: RoutingKeyGenerator::new(),
        }
    }

    /// Validates and executes one decision.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::Validation`] before any state change,
    /// [`ExecutorError::Pool`] when the engine rejects the transition, and
    /// [`ExecutorError::Sync`] when the assignment committed but the map or
    /// proxy update failed.
    pub async fn execute(
        &self,
        decision: &EscalationDecision,
        now: Timestamp,
    ) -> Result<ExecutionReport, ExecutorError> {
        let score = decision.validate()?;
        let before = self.engine.session(&decision.session_id)?;
        let score_before = before.as_ref().map(|session| session.skill_score);
        let from_container = before.and_then(|session| session.container_id);

        let report = match decision.action {
            EscalationAction::Maintain => {
                self.record_score(decision, score, now)?;
                ExecutionReport {
                    session_id: decision.session_id.clone(),
                    action: decision.action,
                    from_container: from_container.clone(),
                    to_container: from_container.clone(),
                    newly_allocated: false,
                }
            }
            EscalationAction::Release => {
                self.engine
                    .release_session(&decision.session_id, ReleaseReason::Requested, now)?;
                self.synchronizer.remove_assignment(&decision.session_id, now)?;
                self.controller.reload().await?;
                ExecutionReport {
                    session_id: decision.session_id.clone(),
                    action: decision.action,
                    from_container: from_container.clone(),
                    to_container: None,
                    newly_allocated: false,
                }
            }
            EscalationAction::EscalateToTier2 | EscalationAction::EscalateToTier3 => {
                let target = if decision.action == EscalationAction::EscalateToTier2 {
                    Tier::Medium
                } else {
                    Tier::High
                };
                let assignment =
                    self.engine.assign_container(&decision.session_id, target, now)?;
                // Publish whenever the map does not already route the session
                // to the assigned container. A retry after a failed publish
                // lands on the idempotent assignment path, so keying this off
                // `newly_allocated` alone would leave the map unrepaired.
                let current = self
                    .engine
                    .store()
                    .routing_entry(&decision.session_id)
                    .map_err(SyncError::Store)?;
                let routed = current
                    .as_ref()
                    .is_some_and(|entry| entry.upstream == assignment.container.upstream);
                if !routed {
                    let key = match current {
                        Some(entry) => entry.routing_key,
                        None => self.keys.derive(&decision.session_id),
                    };
                    self.synchronizer.publish_assignment(
                        &decision.session_id,
                        key,
                        assignment.container.upstream.clone(),
                        now,
                    )?;
                    self.controller.reload().await?;
                }
                self.record_score(decision, score, now)?;
                ExecutionReport {
                    session_id: decision.session_id.clone(),
                    action: decision.action,
                    from_container: from_container.clone(),
                    to_container: Some(assignment.container.id),
                    newly_allocated: assignment.newly_allocated,
                }
            }
        };

        self.engine.log_decision(DecisionLogEntry {
            session_id: decision.session_id.clone(),
            action: decision.action.as_str().to_owned(),
            rule_id: decision.rule_id.clone(),
            skill_score_before: score_before,
            skill_score_after: score,
            from_container: report.from_container.clone(),
            to_container: report.to_container.clone(),
            explanation: decision.explanation.clone(),
            timestamp: now,
        })?;
        info!(
            session = %report.session_id,
            action = %report.action,
            newly_allocated = report.newly_allocated,
            "decision executed"
        );
        Ok(report)
    }

    /// Applies the decision's score and reference to the session.
    fn record_score(
        &self,
        decision: &EscalationDecision,
        score: SkillScore,
        now: Timestamp,
    ) -> Result<(), PoolError> {
        self.engine.update_session_score(
            &decision.session_id,
            score,
            Some(DecisionRef::new(decision.rule_id.as_str())),
            now,
        )
    }
}
