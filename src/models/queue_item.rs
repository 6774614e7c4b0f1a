use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state_machine::{PriorityLevel, QueueItemStatus};

/// The unit of assigned, actionable work for a single approver on a single
/// workflow stage. At most one `pending` item exists per workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    pub queue_item_id: Uuid,
    pub workflow_id: Uuid,
    pub approver_id: String,
    pub stage_number: i32,
    pub priority: PriorityLevel,
    pub status: QueueItemStatus,
    pub assigned_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub estimated_review_minutes: i32,
}

impl QueueItem {
    pub fn assigned(
        workflow_id: Uuid,
        approver_id: impl Into<String>,
        stage_number: i32,
        priority: PriorityLevel,
        estimated_review_minutes: i32,
    ) -> Self {
        Self {
            queue_item_id: Uuid::new_v4(),
            workflow_id,
            approver_id: approver_id.into(),
            stage_number,
            priority,
            status: QueueItemStatus::Pending,
            assigned_at: Utc::now(),
            started_at: None,
            completed_at: None,
            estimated_review_minutes,
        }
    }
}
