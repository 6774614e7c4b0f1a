//! The approval workflow engine.
//!
//! One orchestrator owns all workflow and queue state transitions: it reads
//! configuration, validates decisions, and hands the storage layer a single
//! atomic transition per operation. The escalation sweeper lives here too and
//! shares the same storage contract.

pub mod decisions;
pub mod escalation;
pub mod initiator;
pub mod queries;
pub mod types;

pub use types::{
    CancellationResult, DecisionKind, DecisionRequest, DecisionResult, EscalationAssignment,
    EscalationSweepReport, InitiateRequest, InitiationResult, PaginationInfo, QueueItemView,
    QueuePage, QueueQuery, QueueSortKey, QueueStatistics, StageView, WorkflowStatusView,
};

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::collaborators::{
    ApproverDirectory, DocumentDirectory, NotificationDispatcher, NotificationEvent,
};
use crate::error::{EngineError, Result};
use crate::models::{StageConfigStore, StageConfiguration, WorkflowStage};
use crate::state_machine::{PriorityLevel, StageStatus};
use crate::storage::WorkflowStore;

pub const DEFAULT_QUEUE_PAGE_SIZE: usize = 25;
pub const MAX_QUEUE_PAGE_SIZE: usize = 100;

/// Window before the SLA due date in which a queue entry counts as urgent
pub(crate) const URGENT_WINDOW_HOURS: i64 = 2;

pub struct ApprovalEngine {
    store: Arc<dyn WorkflowStore>,
    stage_config: Arc<StageConfigStore>,
    documents: Arc<dyn DocumentDirectory>,
    approvers: Arc<dyn ApproverDirectory>,
    notifier: Arc<dyn NotificationDispatcher>,
}

impl ApprovalEngine {
    pub fn new(
        store: Arc<dyn WorkflowStore>,
        stage_config: Arc<StageConfigStore>,
        documents: Arc<dyn DocumentDirectory>,
        approvers: Arc<dyn ApproverDirectory>,
        notifier: Arc<dyn NotificationDispatcher>,
    ) -> Self {
        Self {
            store,
            stage_config,
            documents,
            approvers,
            notifier,
        }
    }

    pub(crate) fn store(&self) -> &dyn WorkflowStore {
        self.store.as_ref()
    }

    /// Stage sequence for a document type, or `ConfigurationMissing`
    pub(crate) fn stage_sequence(&self, document_type: &str) -> Result<&[StageConfiguration]> {
        self.stage_config
            .stages_for(document_type)
            .ok_or_else(|| EngineError::configuration_missing(document_type))
    }

    /// Explicit per-stage assignment first, directory default second
    pub(crate) async fn resolve_stage_approver(
        &self,
        assignments: &HashMap<i32, String>,
        document_type: &str,
        stage: i32,
    ) -> Result<Option<String>> {
        if let Some(explicit) = assignments.get(&stage) {
            return Ok(Some(explicit.clone()));
        }
        self.approvers.resolve_default(document_type, stage).await
    }

    pub(crate) async fn resolve_escalation_target(
        &self,
        document_type: &str,
        stage: i32,
        level: i32,
    ) -> Result<Option<String>> {
        self.approvers
            .resolve_escalation_target(document_type, stage, level)
            .await
    }

    /// Dispatch failures are logged, never propagated: notification delivery
    /// is outside the engine's correctness boundary.
    pub(crate) async fn notify(
        &self,
        workflow_id: Uuid,
        approver_id: &str,
        event: NotificationEvent,
    ) {
        if let Err(e) = self.notifier.dispatch(workflow_id, approver_id, event).await {
            warn!(
                workflow_id = %workflow_id,
                approver_id,
                error = %e,
                "notification dispatch failed"
            );
        }
    }
}

/// Outcome of walking the stage sequence past auto-approved/skipped stages
#[derive(Debug, Default)]
pub(crate) struct ProgressionOutcome {
    /// Next stage needing a human decision; `None` means the sequence is done
    pub next_stage: Option<i32>,
    /// Stages settled as auto-approved during the walk
    pub auto_approved: Vec<i32>,
}

/// Walk forward from `from_stage`, settling auto-approved stages and passing
/// over already-settled ones, until a stage needs a human decision or the
/// sequence ends. Mutates the stage records in place; callers persist them.
pub(crate) fn advance_stages(
    configs: &[StageConfiguration],
    stages: &mut [WorkflowStage],
    priority: PriorityLevel,
    from_stage: i32,
    now: DateTime<Utc>,
) -> ProgressionOutcome {
    let mut outcome = ProgressionOutcome::default();

    for config in configs.iter().filter(|c| c.stage_number >= from_stage) {
        let record = stages
            .iter_mut()
            .find(|s| s.stage_number == config.stage_number)
            .expect("stage records match configuration");

        match record.status {
            StageStatus::Pending => {
                if config.auto_approves(priority) {
                    record.status = StageStatus::AutoApproved;
                    record.completed_at = Some(now);
                    outcome.auto_approved.push(config.stage_number);
                } else {
                    outcome.next_stage = Some(config.stage_number);
                    return outcome;
                }
            }
            // Skipped at initiation or settled earlier; keep walking
            _ => {}
        }
    }

    outcome
}
