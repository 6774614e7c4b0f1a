//! The escalation sweeper.
//!
//! Invoked on a fixed interval by an external scheduler. Each overdue
//! workflow is processed independently: a failure is logged and the batch
//! continues. Escalation level tracks crossed `escalation_threshold_hours`
//! boundaries since the SLA breach, so re-running the sweep at the same
//! level is a no-op.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde_json::json;
use tracing::{info, instrument, warn};

use super::types::{EscalationAssignment, EscalationSweepReport};
use super::ApprovalEngine;
use crate::collaborators::NotificationEvent;
use crate::error::{EngineError, Result};
use crate::models::{ApprovalWorkflow, HistoryEntry, QueueItem};
use crate::state_machine::{
    determine_target_state, HistoryAction, StageStatus, WorkflowEvent,
};
use crate::storage::{StageUpdate, StoreError, WorkflowTransition, WorkflowUpdate};

impl ApprovalEngine {
    #[instrument(skip(self))]
    pub async fn escalate_overdue_approvals(&self) -> Result<EscalationSweepReport> {
        let now = Utc::now();
        let overdue = self
            .store()
            .overdue_workflows(now)
            .await
            .map_err(|e| EngineError::storage(e.to_string()))?;

        let mut report = EscalationSweepReport::default();
        for workflow in overdue {
            let workflow_id = workflow.workflow_id;
            match self.escalate_one(workflow, now).await {
                Ok(EscalationOutcome::Escalated(assignment)) => {
                    report.escalated_count += 1;
                    if let Some(assignment) = assignment {
                        report.notified_approvers.push(assignment.new_approver.clone());
                        report.new_assignments.push(assignment);
                    }
                }
                Ok(EscalationOutcome::AlreadyCurrent) => {}
                Err(e) => {
                    warn!(
                        workflow_id = %workflow_id,
                        error = %e,
                        "escalation skipped, continuing sweep"
                    );
                }
            }
        }

        let notifications = report.new_assignments.iter().map(|assignment| {
            self.notify(
                assignment.workflow_id,
                &assignment.new_approver,
                NotificationEvent::Escalated,
            )
        });
        join_all(notifications).await;

        info!(
            escalated = report.escalated_count,
            reassigned = report.new_assignments.len(),
            "escalation sweep finished"
        );
        Ok(report)
    }

    /// Escalate one workflow, unless it already sits at the expected level
    /// for the current breach.
    async fn escalate_one(
        &self,
        workflow: ApprovalWorkflow,
        now: DateTime<Utc>,
    ) -> Result<EscalationOutcome> {
        let configs = self.stage_sequence(&workflow.document_type)?;
        let stage_number = workflow.current_stage;
        let config = configs
            .iter()
            .find(|c| c.stage_number == stage_number)
            .ok_or_else(|| {
                EngineError::storage(format!("stage {stage_number} not configured"))
            })?;

        let overdue_hours = (now - workflow.sla_due_date).num_hours();
        let expected_level = 1 + (overdue_hours / config.escalation_threshold_hours) as i32;
        if expected_level <= workflow.escalation_level {
            return Ok(EscalationOutcome::AlreadyCurrent);
        }

        let previous_status = workflow.status;
        let previous_approver = workflow.current_approver.clone();
        let mut workflow = workflow;
        workflow.status = determine_target_state(previous_status, &WorkflowEvent::Escalate)
            .map_err(|e| EngineError::conflict(e.to_string()))?;
        workflow.is_overdue = true;
        workflow.escalation_level = expected_level;

        let target = self
            .resolve_escalation_target(&workflow.document_type, stage_number, expected_level)
            .await?;

        let history = HistoryEntry::system(workflow.workflow_id, HistoryAction::Escalate, stage_number)
            .with_transition(previous_status, workflow.status)
            .with_comments(Some(format!("SLA breached by {overdue_hours}h")))
            .with_sla_compliance(false)
            .with_metadata(json!({
                "escalation_level": expected_level,
                "previous_approver": previous_approver.clone(),
                "escalation_target": target.clone(),
            }));

        let mut assignment = None;
        let mut transition;
        match &target {
            Some(target) => {
                workflow.current_approver = Some(target.clone());
                transition =
                    WorkflowTransition::new(WorkflowUpdate::from_workflow(&workflow), history);
                // Supersede whatever is open and hand the stage to the target.
                transition.cancel_open_items = true;
                transition.new_queue_item = Some(QueueItem::assigned(
                    workflow.workflow_id,
                    target.clone(),
                    stage_number,
                    workflow.priority,
                    (config.standard_sla_hours * 60) as i32,
                ));
                transition.stage_updates = vec![StageUpdate {
                    stage_number,
                    status: StageStatus::InProgress,
                    approver_id: Some(target.clone()),
                    completed_at: None,
                }];
                assignment = Some(EscalationAssignment {
                    workflow_id: workflow.workflow_id,
                    stage_number,
                    previous_approver,
                    new_approver: target.clone(),
                });
            }
            None => {
                // No target: record the breach and raise the level anyway.
                transition =
                    WorkflowTransition::new(WorkflowUpdate::from_workflow(&workflow), history);
            }
        }

        match self.store().apply_transition(&transition).await {
            Ok(()) => Ok(EscalationOutcome::Escalated(assignment)),
            // Finalized between the scan and the escalation; nothing to do.
            Err(StoreError::StaleWorkflow { .. }) => Ok(EscalationOutcome::AlreadyCurrent),
            Err(e) => Err(EngineError::storage(e.to_string())),
        }
    }
}

enum EscalationOutcome {
    /// No new threshold crossed since the last escalation
    AlreadyCurrent,
    /// Escalated, with the reassignment when a target resolved
    Escalated(Option<EscalationAssignment>),
}
