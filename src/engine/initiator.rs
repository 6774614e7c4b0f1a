//! Workflow initiation.
//!
//! Creation is one atomic insert: workflow row, stage sub-records, the first
//! queue item, and the `initiate` history entry land together or not at all.

use chrono::{Duration, Utc};
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;

use super::types::{InitiateRequest, InitiationResult};
use super::{advance_stages, ApprovalEngine};
use crate::collaborators::NotificationEvent;
use crate::error::{ActiveWorkflowRef, EngineError, Result};
use crate::models::{ApprovalWorkflow, HistoryEntry, QueueItem, WorkflowStage};
use crate::state_machine::{HistoryAction, StageStatus, WorkflowStatus};
use crate::storage::StoreError;

impl ApprovalEngine {
    #[instrument(skip(self, request), fields(document_id = %document_id, document_type = %request.document_type))]
    pub async fn initiate_workflow(
        &self,
        document_id: Uuid,
        request: InitiateRequest,
    ) -> Result<InitiationResult> {
        if !self.documents.exists(document_id).await? {
            return Err(EngineError::not_found("document", document_id));
        }

        if let Some(active) = self
            .store()
            .find_active_for_document(document_id)
            .await
            .map_err(|e| EngineError::storage(e.to_string()))?
        {
            return Err(duplicate_workflow_conflict(&active));
        }

        let configs = self.stage_sequence(&request.document_type)?;

        if let Some(hours) = request.custom_sla_hours {
            if hours <= 0 {
                return Err(EngineError::validation("customSlaHours must be positive"));
            }
        }
        for skip in &request.skip_stages {
            let config = configs
                .iter()
                .find(|c| c.stage_number == *skip)
                .ok_or_else(|| {
                    EngineError::validation(format!(
                        "cannot skip stage {skip}: document type '{}' has no such stage",
                        request.document_type
                    ))
                })?;
            if !config.can_skip {
                return Err(EngineError::validation(format!(
                    "cannot skip stage {skip} ({}): stage is required",
                    config.name
                )));
            }
        }

        let now = Utc::now();
        let priority = request.priority.unwrap_or_default();
        let sla_hours = request
            .custom_sla_hours
            .unwrap_or(configs[0].standard_sla_hours);
        let sla_due_date = now + Duration::hours(sla_hours);

        let mut workflow =
            ApprovalWorkflow::new(document_id, request.document_type.as_str(), priority, sla_due_date);

        // A rejected predecessor makes this a resubmission.
        if let Some(previous) = self
            .store()
            .latest_for_document(document_id)
            .await
            .map_err(|e| EngineError::storage(e.to_string()))?
        {
            if previous.status == WorkflowStatus::Rejected {
                workflow.resubmission_count = previous.resubmission_count + 1;
            }
        }

        let mut stages: Vec<WorkflowStage> = configs
            .iter()
            .map(|c| {
                let mut stage = WorkflowStage::new(workflow.workflow_id, c.stage_number, c.name.as_str());
                // Explicit assignments pre-seed the stage so advancement can
                // honor them over directory defaults.
                stage.approver_id = request.assign_specific_approvers.get(&c.stage_number).cloned();
                stage
            })
            .collect();

        for skip in &request.skip_stages {
            if let Some(stage) = stages.iter_mut().find(|s| s.stage_number == *skip) {
                stage.status = StageStatus::Skipped;
                stage.completed_at = Some(now);
            }
        }

        let outcome = advance_stages(configs, &mut stages, priority, 1, now);

        let mut queue_item = None;
        let mut next_approver = None;
        match outcome.next_stage {
            Some(stage_number) => {
                workflow.current_stage = stage_number;
                workflow.status = WorkflowStatus::InReview;
                next_approver = self
                    .resolve_stage_approver(
                        &request.assign_specific_approvers,
                        &request.document_type,
                        stage_number,
                    )
                    .await?;

                let stage = stages
                    .iter_mut()
                    .find(|s| s.stage_number == stage_number)
                    .expect("actionable stage exists");
                stage.status = StageStatus::InProgress;
                stage.approver_id = next_approver.clone();

                if let Some(approver) = &next_approver {
                    queue_item = Some(QueueItem::assigned(
                        workflow.workflow_id,
                        approver.clone(),
                        stage_number,
                        priority,
                        (sla_hours * 60) as i32,
                    ));
                    workflow.current_approver = Some(approver.clone());
                }
            }
            None => {
                // Every stage skipped or auto-approved.
                workflow.status = WorkflowStatus::Approved;
                workflow.current_stage = configs.len() as i32;
            }
        }

        let history = HistoryEntry::system(
            workflow.workflow_id,
            HistoryAction::Initiate,
            workflow.current_stage,
        )
        .with_transition(WorkflowStatus::Pending, workflow.status)
        .with_metadata(json!({
            "priority": priority,
            "custom_sla_hours": request.custom_sla_hours,
            "skipped_stages": request.skip_stages,
            "auto_approved_stages": outcome.auto_approved,
            "resubmission_count": workflow.resubmission_count,
        }));

        let inserted = self
            .store()
            .insert_workflow(&workflow, &stages, queue_item.as_ref(), &history)
            .await;

        match inserted {
            Ok(()) => {}
            Err(StoreError::DuplicateActive { .. }) => {
                // Lost an initiation race; report the winner.
                let active = self
                    .store()
                    .find_active_for_document(document_id)
                    .await
                    .map_err(|e| EngineError::storage(e.to_string()))?;
                return Err(match active {
                    Some(active) => duplicate_workflow_conflict(&active),
                    None => EngineError::conflict(
                        "document already has an active approval workflow",
                    ),
                });
            }
            Err(e) => return Err(EngineError::storage(e.to_string())),
        }

        if let (Some(approver), Some(_)) = (&next_approver, &queue_item) {
            self.notify(workflow.workflow_id, approver, NotificationEvent::Assigned)
                .await;
        }

        info!(
            workflow_id = %workflow.workflow_id,
            current_stage = workflow.current_stage,
            status = %workflow.status,
            next_approver = ?next_approver,
            "workflow initiated"
        );

        Ok(InitiationResult {
            workflow_id: workflow.workflow_id,
            current_stage: workflow.current_stage,
            status: workflow.status,
            next_approver_id: next_approver,
            sla_due_date,
        })
    }
}

fn duplicate_workflow_conflict(active: &ApprovalWorkflow) -> EngineError {
    EngineError::conflict_with(
        format!(
            "document already has an active approval workflow at stage {}",
            active.current_stage
        ),
        ActiveWorkflowRef {
            workflow_id: active.workflow_id,
            current_stage: active.current_stage,
            status: active.status,
        },
    )
}
