//! Read-only operations: workflow status breakdown and the approval queue.

use chrono::{Duration, Utc};
use tracing::instrument;
use uuid::Uuid;

use super::types::{
    PaginationInfo, QueueItemView, QueuePage, QueueQuery, QueueSortKey, QueueStatistics,
    StageView, WorkflowStatusView,
};
use super::{ApprovalEngine, DEFAULT_QUEUE_PAGE_SIZE, MAX_QUEUE_PAGE_SIZE, URGENT_WINDOW_HOURS};
use crate::error::{EngineError, Result};
use crate::state_machine::StageStatus;
use crate::storage::{QueueEntry, QueueFilter};

impl ApprovalEngine {
    #[instrument(skip(self), fields(workflow_id = %workflow_id))]
    pub async fn workflow_status(
        &self,
        workflow_id: Uuid,
        include_history: bool,
    ) -> Result<WorkflowStatusView> {
        let workflow = self.load_workflow(workflow_id).await?;
        let stages = self
            .store()
            .find_stages(workflow_id)
            .await
            .map_err(|e| EngineError::storage(e.to_string()))?;

        let stage_views = stages
            .into_iter()
            .map(|stage| {
                let is_current = stage.stage_number == workflow.current_stage
                    && !matches!(stage.status, StageStatus::Approved | StageStatus::Rejected);
                StageView {
                    stage_number: stage.stage_number,
                    name: stage.name,
                    status: stage.status,
                    approver_id: stage.approver_id,
                    completed_at: stage.completed_at,
                    is_current,
                }
            })
            .collect();

        let history = if include_history {
            Some(
                self.store()
                    .history_for_workflow(workflow_id)
                    .await
                    .map_err(|e| EngineError::storage(e.to_string()))?,
            )
        } else {
            None
        };

        Ok(WorkflowStatusView {
            workflow,
            stages: stage_views,
            history,
        })
    }

    #[instrument(skip(self, query), fields(approver = ?query.approver_id, admin = query.is_admin))]
    pub async fn approval_queue(&self, query: QueueQuery) -> Result<QueuePage> {
        if !query.is_admin && query.approver_id.is_none() {
            return Err(EngineError::validation(
                "approverUserId is required unless isAdmin is set",
            ));
        }

        let filter = QueueFilter {
            approver_id: if query.is_admin {
                None
            } else {
                query.approver_id.clone()
            },
            priority: query.priority,
            document_type: query.document_type.clone(),
            overdue_only: query.overdue_only,
        };

        let mut entries = self
            .store()
            .pending_queue(&filter)
            .await
            .map_err(|e| EngineError::storage(e.to_string()))?;

        let statistics = queue_statistics(&entries);

        match query.sort_by {
            // The store already returns due date ascending.
            QueueSortKey::DueDate => {}
            QueueSortKey::Priority => {
                entries.sort_by(|a, b| {
                    b.item
                        .priority
                        .cmp(&a.item.priority)
                        .then(a.workflow.sla_due_date.cmp(&b.workflow.sla_due_date))
                });
            }
            QueueSortKey::AssignedDate => {
                entries.sort_by_key(|e| e.item.assigned_at);
            }
        }

        let total = entries.len();
        let limit = query
            .limit
            .unwrap_or(DEFAULT_QUEUE_PAGE_SIZE)
            .min(MAX_QUEUE_PAGE_SIZE);
        let now = Utc::now();
        let items: Vec<QueueItemView> = entries
            .into_iter()
            .skip(query.offset)
            .take(limit)
            .map(|entry| QueueItemView {
                queue_item_id: entry.item.queue_item_id,
                workflow_id: entry.workflow.workflow_id,
                document_id: entry.workflow.document_id,
                document_type: entry.workflow.document_type,
                stage_number: entry.item.stage_number,
                approver_id: entry.item.approver_id,
                priority: entry.item.priority,
                workflow_status: entry.workflow.status,
                sla_due_date: entry.workflow.sla_due_date,
                is_overdue: entry.workflow.sla_due_date < now,
                escalation_level: entry.workflow.escalation_level,
                assigned_at: entry.item.assigned_at,
                estimated_review_minutes: entry.item.estimated_review_minutes,
            })
            .collect();

        let has_more = query.offset + items.len() < total;
        Ok(QueuePage {
            items,
            pagination: PaginationInfo {
                total,
                limit,
                offset: query.offset,
                has_more,
            },
            statistics,
        })
    }
}

/// Aggregates over the full filtered set, so pagination never changes them
fn queue_statistics(entries: &[QueueEntry]) -> QueueStatistics {
    let now = Utc::now();
    let urgent_cutoff = now + Duration::hours(URGENT_WINDOW_HOURS);
    let mut stats = QueueStatistics {
        total: entries.len(),
        ..QueueStatistics::default()
    };

    for entry in entries {
        let due = entry.workflow.sla_due_date;
        if due < now {
            stats.overdue += 1;
        }
        if due <= urgent_cutoff {
            stats.urgent += 1;
        }
        if due.date_naive() == now.date_naive() {
            stats.due_today += 1;
        }
        *stats
            .by_priority
            .entry(entry.item.priority.to_string())
            .or_insert(0) += 1;
        *stats.by_stage.entry(entry.item.stage_number).or_insert(0) += 1;
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ApprovalWorkflow, QueueItem};
    use crate::state_machine::PriorityLevel;

    fn entry(priority: PriorityLevel, stage: i32, due_in_hours: i64) -> QueueEntry {
        let workflow = ApprovalWorkflow::new(
            Uuid::new_v4(),
            "contract",
            priority,
            Utc::now() + Duration::hours(due_in_hours),
        );
        let item = QueueItem::assigned(workflow.workflow_id, "alice", stage, priority, 60);
        QueueEntry { item, workflow }
    }

    #[test]
    fn test_statistics_counts() {
        let entries = vec![
            entry(PriorityLevel::Critical, 1, -3),
            entry(PriorityLevel::Normal, 2, 1),
            entry(PriorityLevel::Normal, 2, 100),
        ];
        let stats = queue_statistics(&entries);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.overdue, 1);
        // Overdue and due-within-two-hours both count as urgent.
        assert_eq!(stats.urgent, 2);
        assert_eq!(stats.by_priority.get("normal"), Some(&2));
        assert_eq!(stats.by_priority.get("critical"), Some(&1));
        assert_eq!(stats.by_stage.get(&2), Some(&2));
    }
}
