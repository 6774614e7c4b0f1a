//! In-memory [`WorkflowStore`] backend.
//!
//! A single mutex gives every transition the same all-or-nothing semantics
//! as the Postgres backend's transactions; validation happens before any
//! mutation so a failed guard leaves the store untouched. Used by the test
//! suites and local development.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use uuid::Uuid;

use super::{
    QueueEntry, QueueFilter, StoreError, StoreResult, WorkflowStore, WorkflowTransition,
};
use crate::models::{ApprovalWorkflow, HistoryEntry, QueueItem, WorkflowStage};
use crate::state_machine::QueueItemStatus;

use async_trait::async_trait;

#[derive(Default)]
struct Inner {
    workflows: HashMap<Uuid, ApprovalWorkflow>,
    stages: HashMap<Uuid, Vec<WorkflowStage>>,
    queue_items: Vec<QueueItem>,
    history: Vec<HistoryEntry>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rewrite a workflow's SLA due date. Test hook for simulating breaches;
    /// not part of the store contract.
    pub fn backdate_sla(&self, workflow_id: Uuid, due: DateTime<Utc>) {
        if let Some(workflow) = self.inner.lock().workflows.get_mut(&workflow_id) {
            workflow.sla_due_date = due;
        }
    }

    /// Snapshot of a workflow's queue items, newest first. Test observability
    /// hook; not part of the store contract.
    pub fn queue_items_for(&self, workflow_id: Uuid) -> Vec<QueueItem> {
        let inner = self.inner.lock();
        let mut items: Vec<QueueItem> = inner
            .queue_items
            .iter()
            .filter(|i| i.workflow_id == workflow_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.assigned_at.cmp(&a.assigned_at));
        items
    }
}

#[async_trait]
impl WorkflowStore for MemoryStore {
    async fn insert_workflow(
        &self,
        workflow: &ApprovalWorkflow,
        stages: &[WorkflowStage],
        queue_item: Option<&QueueItem>,
        history: &HistoryEntry,
    ) -> StoreResult<()> {
        let mut inner = self.inner.lock();

        let duplicate = inner
            .workflows
            .values()
            .any(|w| w.document_id == workflow.document_id && !w.status.is_terminal());
        if duplicate {
            return Err(StoreError::DuplicateActive {
                document_id: workflow.document_id,
            });
        }

        inner.workflows.insert(workflow.workflow_id, workflow.clone());
        inner.stages.insert(workflow.workflow_id, stages.to_vec());
        if let Some(item) = queue_item {
            inner.queue_items.push(item.clone());
        }
        inner.history.push(history.clone());
        Ok(())
    }

    async fn find_workflow(&self, workflow_id: Uuid) -> StoreResult<Option<ApprovalWorkflow>> {
        Ok(self.inner.lock().workflows.get(&workflow_id).cloned())
    }

    async fn find_stages(&self, workflow_id: Uuid) -> StoreResult<Vec<WorkflowStage>> {
        let mut stages = self
            .inner
            .lock()
            .stages
            .get(&workflow_id)
            .cloned()
            .unwrap_or_default();
        stages.sort_by_key(|s| s.stage_number);
        Ok(stages)
    }

    async fn find_active_for_document(
        &self,
        document_id: Uuid,
    ) -> StoreResult<Option<ApprovalWorkflow>> {
        Ok(self
            .inner
            .lock()
            .workflows
            .values()
            .find(|w| w.document_id == document_id && !w.status.is_terminal())
            .cloned())
    }

    async fn latest_for_document(
        &self,
        document_id: Uuid,
    ) -> StoreResult<Option<ApprovalWorkflow>> {
        Ok(self
            .inner
            .lock()
            .workflows
            .values()
            .filter(|w| w.document_id == document_id)
            .max_by_key(|w| w.created_at)
            .cloned())
    }

    async fn apply_transition(&self, transition: &WorkflowTransition) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        let now = Utc::now();
        let workflow_id = transition.workflow.workflow_id;

        // Validate every guard before mutating anything.
        let stored = inner
            .workflows
            .get(&workflow_id)
            .ok_or(StoreError::StaleWorkflow { workflow_id })?;
        if transition.workflow.guard_non_terminal && stored.status.is_terminal() {
            return Err(StoreError::StaleWorkflow { workflow_id });
        }

        let claim_index = match &transition.claim {
            Some(claim) => {
                let index = inner.queue_items.iter().position(|i| {
                    i.workflow_id == claim.workflow_id
                        && i.approver_id == claim.approver_id
                        && i.status == QueueItemStatus::Pending
                });
                match index {
                    Some(index) => Some(index),
                    None => {
                        return Err(StoreError::ClaimLost {
                            workflow_id: claim.workflow_id,
                            approver_id: claim.approver_id.clone(),
                        })
                    }
                }
            }
            None => None,
        };

        if transition.new_queue_item.is_some() && !transition.cancel_open_items {
            let pending_remains = inner.queue_items.iter().enumerate().any(|(index, item)| {
                item.workflow_id == workflow_id
                    && item.status == QueueItemStatus::Pending
                    && Some(index) != claim_index
            });
            if pending_remains {
                return Err(StoreError::Backend(format!(
                    "workflow {workflow_id} already has a pending queue item"
                )));
            }
        }

        if let (Some(index), Some(claim)) = (claim_index, &transition.claim) {
            let item = &mut inner.queue_items[index];
            item.status = claim.complete_as;
            item.started_at = item.started_at.or(Some(now));
            item.completed_at = Some(now);
        }

        if transition.cancel_open_items {
            for item in inner
                .queue_items
                .iter_mut()
                .filter(|i| i.workflow_id == workflow_id && i.status.is_open())
            {
                item.status = QueueItemStatus::Cancelled;
                item.completed_at = Some(now);
            }
        }

        if let Some(new_item) = &transition.new_queue_item {
            inner.queue_items.push(new_item.clone());
        }

        let update = &transition.workflow;
        let workflow = inner
            .workflows
            .get_mut(&workflow_id)
            .expect("checked above");
        workflow.status = update.status;
        workflow.current_stage = update.current_stage;
        workflow.is_overdue = update.is_overdue;
        workflow.escalation_level = update.escalation_level;
        workflow.rejection_reason = update.rejection_reason.clone();
        workflow.current_approver = update.current_approver.clone();
        workflow.updated_at = now;

        if let Some(stages) = inner.stages.get_mut(&workflow_id) {
            for stage_update in &transition.stage_updates {
                if let Some(stage) = stages
                    .iter_mut()
                    .find(|s| s.stage_number == stage_update.stage_number)
                {
                    stage.status = stage_update.status;
                    stage.approver_id = stage_update.approver_id.clone();
                    stage.completed_at = stage_update.completed_at;
                }
            }
        }

        inner.history.push(transition.history.clone());
        Ok(())
    }

    async fn pending_queue(&self, filter: &QueueFilter) -> StoreResult<Vec<QueueEntry>> {
        let inner = self.inner.lock();
        let now = Utc::now();

        let mut entries: Vec<QueueEntry> = inner
            .queue_items
            .iter()
            .filter(|item| item.status == QueueItemStatus::Pending)
            .filter(|item| {
                filter
                    .approver_id
                    .as_ref()
                    .map(|a| &item.approver_id == a)
                    .unwrap_or(true)
            })
            .filter(|item| filter.priority.map(|p| item.priority == p).unwrap_or(true))
            .filter_map(|item| {
                let workflow = inner.workflows.get(&item.workflow_id)?;
                Some(QueueEntry {
                    item: item.clone(),
                    workflow: workflow.clone(),
                })
            })
            .filter(|entry| {
                filter
                    .document_type
                    .as_ref()
                    .map(|t| &entry.workflow.document_type == t)
                    .unwrap_or(true)
            })
            .filter(|entry| !filter.overdue_only || entry.workflow.sla_due_date < now)
            .collect();

        entries.sort_by_key(|e| e.workflow.sla_due_date);
        Ok(entries)
    }

    async fn history_for_workflow(&self, workflow_id: Uuid) -> StoreResult<Vec<HistoryEntry>> {
        let mut entries: Vec<HistoryEntry> = self
            .inner
            .lock()
            .history
            .iter()
            .filter(|h| h.workflow_id == workflow_id)
            .cloned()
            .collect();
        entries.sort_by_key(|h| h.created_at);
        Ok(entries)
    }

    async fn overdue_workflows(
        &self,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<ApprovalWorkflow>> {
        Ok(self
            .inner
            .lock()
            .workflows
            .values()
            .filter(|w| !w.status.is_terminal() && now > w.sla_due_date)
            .cloned()
            .collect())
    }
}
