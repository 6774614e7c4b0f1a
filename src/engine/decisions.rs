//! Decision processing: approve, reject, reassign, cancel, comment.
//!
//! Authorization and idempotency ride on the same gate: the approver's
//! pending queue item. The storage layer completes it with a compare-and-set
//! inside the decision's transaction, so of two concurrent decisions exactly
//! one wins and the loser observes `Unauthorized`.

use chrono::Utc;
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;

use super::types::{CancellationResult, DecisionKind, DecisionRequest, DecisionResult};
use super::ApprovalEngine;
use crate::collaborators::NotificationEvent;
use crate::error::{EngineError, Result};
use crate::models::{ApprovalWorkflow, HistoryEntry, QueueItem};
use crate::state_machine::{
    determine_target_state, HistoryAction, QueueItemStatus, StageStatus, WorkflowEvent,
    WorkflowStatus,
};
use crate::storage::{QueueClaim, StageUpdate, StoreError, WorkflowTransition, WorkflowUpdate};

impl ApprovalEngine {
    #[instrument(skip(self, request), fields(workflow_id = %workflow_id, approver = approver_id))]
    pub async fn process_approval(
        &self,
        workflow_id: Uuid,
        approver_id: &str,
        request: DecisionRequest,
    ) -> Result<DecisionResult> {
        let workflow = self.load_workflow(workflow_id).await?;
        if workflow.is_terminal() {
            return Err(EngineError::conflict(format!(
                "workflow is already {}",
                workflow.status
            )));
        }

        if let Some(target) = &request.reassign_to {
            return self.reassign(workflow, approver_id, target, &request).await;
        }

        let rejection_reason = match request.decision {
            DecisionKind::Reject => {
                let reason = request
                    .rejection_reason
                    .as_deref()
                    .map(str::trim)
                    .filter(|r| !r.is_empty());
                match reason {
                    Some(reason) => Some(reason.to_string()),
                    None => {
                        return Err(EngineError::validation(
                            "rejectionReason is required when rejecting",
                        ))
                    }
                }
            }
            DecisionKind::Approve => None,
        };

        let configs = self.stage_sequence(&workflow.document_type)?;
        let mut stages = self
            .store()
            .find_stages(workflow_id)
            .await
            .map_err(|e| EngineError::storage(e.to_string()))?;

        let now = Utc::now();
        let within_sla = workflow.within_sla(now);
        let decided_stage = workflow.current_stage;
        let actor_role = configs
            .iter()
            .find(|c| c.stage_number == decided_stage)
            .map(|c| c.required_role.clone())
            .unwrap_or_else(|| "approver".to_string());

        let mut workflow = workflow;
        let previous_status = workflow.status;
        let mut stage_updates = Vec::new();

        {
            let record = stages
                .iter_mut()
                .find(|s| s.stage_number == decided_stage)
                .ok_or_else(|| {
                    EngineError::storage(format!("stage {decided_stage} record missing"))
                })?;
            record.status = match request.decision {
                DecisionKind::Approve => StageStatus::Approved,
                DecisionKind::Reject => StageStatus::Rejected,
            };
            record.approver_id = Some(approver_id.to_string());
            record.completed_at = Some(now);
            stage_updates.push(StageUpdate {
                stage_number: record.stage_number,
                status: record.status,
                approver_id: record.approver_id.clone(),
                completed_at: record.completed_at,
            });
        }

        let mut next_approver = None;
        let mut assignment_pending = false;
        let mut new_queue_item = None;

        match request.decision {
            DecisionKind::Reject => {
                workflow.status = self.target_state(previous_status, &WorkflowEvent::Reject)?;
                workflow.rejection_reason = rejection_reason.clone();
                workflow.current_approver = None;
            }
            DecisionKind::Approve => {
                let outcome = super::advance_stages(
                    configs,
                    &mut stages,
                    workflow.priority,
                    decided_stage + 1,
                    now,
                );
                for auto in &outcome.auto_approved {
                    let record = stages
                        .iter()
                        .find(|s| s.stage_number == *auto)
                        .expect("auto-approved stage exists");
                    stage_updates.push(StageUpdate {
                        stage_number: record.stage_number,
                        status: record.status,
                        approver_id: record.approver_id.clone(),
                        completed_at: record.completed_at,
                    });
                }

                let event = WorkflowEvent::Approve {
                    final_stage: outcome.next_stage.is_none(),
                };
                workflow.status = self.target_state(previous_status, &event)?;

                match outcome.next_stage {
                    Some(next_stage) => {
                        workflow.current_stage = next_stage;

                        let record = stages
                            .iter_mut()
                            .find(|s| s.stage_number == next_stage)
                            .expect("next stage exists");
                        record.status = StageStatus::InProgress;

                        // Pre-seeded assignment from initiation wins over the
                        // directory default.
                        let assigned = match record.approver_id.clone() {
                            Some(explicit) => Some(explicit),
                            None => {
                                self.approvers
                                    .resolve_default(&workflow.document_type, next_stage)
                                    .await?
                            }
                        };
                        record.approver_id = assigned.clone();
                        stage_updates.push(StageUpdate {
                            stage_number: record.stage_number,
                            status: record.status,
                            approver_id: record.approver_id.clone(),
                            completed_at: record.completed_at,
                        });

                        match assigned {
                            Some(approver) => {
                                let estimated = configs
                                    .iter()
                                    .find(|c| c.stage_number == next_stage)
                                    .map(|c| (c.standard_sla_hours * 60) as i32)
                                    .unwrap_or(0);
                                new_queue_item = Some(QueueItem::assigned(
                                    workflow_id,
                                    approver.clone(),
                                    next_stage,
                                    workflow.priority,
                                    estimated,
                                ));
                                workflow.current_approver = Some(approver.clone());
                                next_approver = Some(approver);
                            }
                            None => {
                                // No approver resolved: the stage waits
                                // unassigned and the caller is told so.
                                workflow.current_approver = None;
                                assignment_pending = true;
                            }
                        }
                    }
                    None => {
                        workflow.current_approver = None;
                    }
                }
            }
        }

        let action = match request.decision {
            DecisionKind::Approve => HistoryAction::Approve,
            DecisionKind::Reject => HistoryAction::Reject,
        };
        let mut history = HistoryEntry::new(
            workflow_id,
            action,
            decided_stage,
            approver_id,
            actor_role.as_str(),
        )
        .with_transition(previous_status, workflow.status)
        .with_decision(match request.decision {
            DecisionKind::Approve => "approve",
            DecisionKind::Reject => "reject",
        })
        .with_comments(request.comments.clone())
        .with_time_spent(request.time_spent_minutes)
        .with_sla_compliance(within_sla);
        if let Some(reason) = &rejection_reason {
            history = history.with_rejection_reason(reason.clone());
        }

        let transition = WorkflowTransition {
            workflow: WorkflowUpdate::from_workflow(&workflow),
            stage_updates,
            claim: Some(QueueClaim {
                workflow_id,
                approver_id: approver_id.to_string(),
                complete_as: QueueItemStatus::Completed,
            }),
            cancel_open_items: false,
            new_queue_item: new_queue_item.clone(),
            history,
        };

        self.apply_decision_transition(&transition, workflow_id, approver_id)
            .await?;

        let is_complete = workflow.status.is_terminal();
        match request.decision {
            DecisionKind::Approve => {
                if let Some(approver) = &next_approver {
                    self.notify(workflow_id, approver, NotificationEvent::Assigned)
                        .await;
                }
                info!(
                    workflow_id = %workflow_id,
                    stage = decided_stage,
                    status = %workflow.status,
                    next_approver = ?next_approver,
                    "stage approved"
                );
            }
            DecisionKind::Reject => {
                self.notify(workflow_id, approver_id, NotificationEvent::Rejected)
                    .await;
                info!(
                    workflow_id = %workflow_id,
                    stage = decided_stage,
                    reason = ?rejection_reason,
                    "workflow rejected"
                );
            }
        }

        Ok(DecisionResult {
            workflow_id,
            status: workflow.status,
            current_stage: workflow.current_stage,
            is_complete,
            next_approver_id: next_approver,
            assignment_pending,
            within_sla,
        })
    }

    /// Transfer the pending claim to another approver without deciding the
    /// stage. The old item completes as cancelled; the stage stays in progress.
    async fn reassign(
        &self,
        workflow: ApprovalWorkflow,
        approver_id: &str,
        target: &str,
        request: &DecisionRequest,
    ) -> Result<DecisionResult> {
        let target = target.trim();
        if target.is_empty() {
            return Err(EngineError::validation("reassignTo must not be empty"));
        }
        if target == approver_id {
            return Err(EngineError::validation(
                "reassignTo must name a different approver",
            ));
        }

        let workflow_id = workflow.workflow_id;
        let configs = self.stage_sequence(&workflow.document_type)?;
        let stage_number = workflow.current_stage;
        let config = configs
            .iter()
            .find(|c| c.stage_number == stage_number)
            .ok_or_else(|| EngineError::storage(format!("stage {stage_number} not configured")))?;

        let now = Utc::now();
        let within_sla = workflow.within_sla(now);
        let mut workflow = workflow;
        workflow.current_approver = Some(target.to_string());

        let history = HistoryEntry::new(
            workflow_id,
            HistoryAction::Reassign,
            stage_number,
            approver_id,
            config.required_role.as_str(),
        )
        .with_comments(request.comments.clone())
        .with_sla_compliance(within_sla)
        .with_metadata(json!({ "reassigned_to": target }));

        let transition = WorkflowTransition {
            workflow: WorkflowUpdate::from_workflow(&workflow),
            stage_updates: vec![StageUpdate {
                stage_number,
                status: StageStatus::InProgress,
                approver_id: Some(target.to_string()),
                completed_at: None,
            }],
            claim: Some(QueueClaim {
                workflow_id,
                approver_id: approver_id.to_string(),
                complete_as: QueueItemStatus::Cancelled,
            }),
            cancel_open_items: false,
            new_queue_item: Some(QueueItem::assigned(
                workflow_id,
                target,
                stage_number,
                workflow.priority,
                (config.standard_sla_hours * 60) as i32,
            )),
            history,
        };

        self.apply_decision_transition(&transition, workflow_id, approver_id)
            .await?;
        self.notify(workflow_id, target, NotificationEvent::Assigned)
            .await;

        info!(
            workflow_id = %workflow_id,
            stage = stage_number,
            from = approver_id,
            to = target,
            "claim reassigned"
        );

        Ok(DecisionResult {
            workflow_id,
            status: workflow.status,
            current_stage: stage_number,
            is_complete: false,
            next_approver_id: Some(target.to_string()),
            assignment_pending: false,
            within_sla,
        })
    }

    #[instrument(skip(self, reason), fields(workflow_id = %workflow_id, admin = admin_user_id))]
    pub async fn cancel_workflow(
        &self,
        workflow_id: Uuid,
        admin_user_id: &str,
        reason: &str,
    ) -> Result<CancellationResult> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(EngineError::validation("cancelReason must not be empty"));
        }

        let workflow = self.load_workflow(workflow_id).await?;
        if workflow.is_terminal() {
            return Err(EngineError::conflict(format!(
                "workflow is already {}",
                workflow.status
            )));
        }

        let now = Utc::now();
        let previous_status = workflow.status;
        let assigned_approver = workflow.current_approver.clone();
        let mut workflow = workflow;
        workflow.status = self.target_state(previous_status, &WorkflowEvent::Cancel)?;
        workflow.rejection_reason = Some(reason.to_string());
        workflow.current_approver = None;

        let history = HistoryEntry::new(
            workflow_id,
            HistoryAction::Cancel,
            workflow.current_stage,
            admin_user_id,
            "admin",
        )
        .with_transition(previous_status, workflow.status)
        .with_rejection_reason(reason)
        .with_sla_compliance(workflow.within_sla(now));

        let transition = WorkflowTransition {
            cancel_open_items: true,
            ..WorkflowTransition::new(WorkflowUpdate::from_workflow(&workflow), history)
        };

        match self.store().apply_transition(&transition).await {
            Ok(()) => {}
            Err(StoreError::StaleWorkflow { .. }) => {
                return Err(EngineError::conflict(
                    "workflow was concurrently finalized",
                ))
            }
            Err(e) => return Err(EngineError::storage(e.to_string())),
        }

        if let Some(approver) = &assigned_approver {
            self.notify(workflow_id, approver, NotificationEvent::Cancelled)
                .await;
        }

        info!(workflow_id = %workflow_id, reason, "workflow cancelled");

        Ok(CancellationResult {
            workflow_id,
            status: workflow.status,
        })
    }

    /// Append a `comment` ledger entry without touching workflow state
    pub async fn add_comment(
        &self,
        workflow_id: Uuid,
        actor_id: &str,
        comments: &str,
    ) -> Result<()> {
        let comments = comments.trim();
        if comments.is_empty() {
            return Err(EngineError::validation("comments must not be empty"));
        }

        let workflow = self.load_workflow(workflow_id).await?;
        if workflow.is_terminal() {
            return Err(EngineError::conflict(format!(
                "workflow is already {}",
                workflow.status
            )));
        }

        let history = HistoryEntry::new(
            workflow_id,
            HistoryAction::Comment,
            workflow.current_stage,
            actor_id,
            "user",
        )
        .with_comments(Some(comments.to_string()))
        .with_sla_compliance(workflow.within_sla(Utc::now()));

        let transition =
            WorkflowTransition::new(WorkflowUpdate::from_workflow(&workflow), history);

        match self.store().apply_transition(&transition).await {
            Ok(()) => Ok(()),
            Err(StoreError::StaleWorkflow { .. }) => Err(EngineError::conflict(
                "workflow was concurrently finalized",
            )),
            Err(e) => Err(EngineError::storage(e.to_string())),
        }
    }

    pub(crate) async fn load_workflow(&self, workflow_id: Uuid) -> Result<ApprovalWorkflow> {
        self.store()
            .find_workflow(workflow_id)
            .await
            .map_err(|e| EngineError::storage(e.to_string()))?
            .ok_or_else(|| EngineError::not_found("workflow", workflow_id))
    }

    fn target_state(
        &self,
        current: WorkflowStatus,
        event: &WorkflowEvent,
    ) -> Result<WorkflowStatus> {
        determine_target_state(current, event).map_err(|e| EngineError::conflict(e.to_string()))
    }

    async fn apply_decision_transition(
        &self,
        transition: &WorkflowTransition,
        workflow_id: Uuid,
        approver_id: &str,
    ) -> Result<()> {
        match self.store().apply_transition(transition).await {
            Ok(()) => Ok(()),
            // The CAS lost: the item was already processed or never assigned
            // to this approver. Authorization and idempotency in one guard.
            Err(StoreError::ClaimLost { .. }) => {
                Err(EngineError::unauthorized(workflow_id, approver_id))
            }
            Err(StoreError::StaleWorkflow { .. }) => Err(EngineError::conflict(
                "workflow was concurrently finalized",
            )),
            Err(e) => Err(EngineError::storage(e.to_string())),
        }
    }
}
