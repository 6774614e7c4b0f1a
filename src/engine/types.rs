//! Request and result shapes for the engine's operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

use crate::models::{ApprovalWorkflow, HistoryEntry};
use crate::state_machine::{PriorityLevel, StageStatus, WorkflowStatus};

/// Caller-supplied options for workflow initiation
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InitiateRequest {
    pub document_type: String,
    pub priority: Option<PriorityLevel>,
    pub custom_sla_hours: Option<i64>,
    /// Stage numbers to skip; only stages configured `can_skip` are eligible
    pub skip_stages: Vec<i32>,
    /// Explicit stage → approver assignments overriding directory defaults
    pub assign_specific_approvers: HashMap<i32, String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InitiationResult {
    pub workflow_id: Uuid,
    pub current_stage: i32,
    pub status: WorkflowStatus,
    pub next_approver_id: Option<String>,
    pub sla_due_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    Approve,
    Reject,
}

/// An approver's decision on their pending claim
#[derive(Debug, Clone, Deserialize)]
pub struct DecisionRequest {
    pub decision: DecisionKind,
    pub comments: Option<String>,
    pub rejection_reason: Option<String>,
    /// Transfer the claim instead of deciding it
    pub reassign_to: Option<String>,
    pub time_spent_minutes: Option<i32>,
}

impl DecisionRequest {
    pub fn approve() -> Self {
        Self {
            decision: DecisionKind::Approve,
            comments: None,
            rejection_reason: None,
            reassign_to: None,
            time_spent_minutes: None,
        }
    }

    pub fn reject(reason: impl Into<String>) -> Self {
        Self {
            decision: DecisionKind::Reject,
            comments: None,
            rejection_reason: Some(reason.into()),
            reassign_to: None,
            time_spent_minutes: None,
        }
    }

    pub fn with_comments(mut self, comments: impl Into<String>) -> Self {
        self.comments = Some(comments.into());
        self
    }

    pub fn with_time_spent(mut self, minutes: i32) -> Self {
        self.time_spent_minutes = Some(minutes);
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DecisionResult {
    pub workflow_id: Uuid,
    pub status: WorkflowStatus,
    pub current_stage: i32,
    pub is_complete: bool,
    pub next_approver_id: Option<String>,
    /// The next stage resolved no approver; it waits unassigned rather than
    /// stalling silently
    pub assignment_pending: bool,
    pub within_sla: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CancellationResult {
    pub workflow_id: Uuid,
    pub status: WorkflowStatus,
}

/// One stage in the status breakdown
#[derive(Debug, Clone, Serialize)]
pub struct StageView {
    pub stage_number: i32,
    pub name: String,
    pub status: StageStatus,
    pub approver_id: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub is_current: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkflowStatusView {
    pub workflow: ApprovalWorkflow,
    pub stages: Vec<StageView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<HistoryEntry>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueSortKey {
    #[default]
    DueDate,
    Priority,
    AssignedDate,
}

impl std::str::FromStr for QueueSortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "due_date" => Ok(Self::DueDate),
            "priority" => Ok(Self::Priority),
            "assigned_date" => Ok(Self::AssignedDate),
            _ => Err(format!("Invalid sort key: {s}")),
        }
    }
}

/// Approval queue request. `is_admin` spans all approvers; otherwise
/// `approver_id` is required.
#[derive(Debug, Clone, Default)]
pub struct QueueQuery {
    pub approver_id: Option<String>,
    pub is_admin: bool,
    pub priority: Option<PriorityLevel>,
    pub document_type: Option<String>,
    pub overdue_only: bool,
    pub sort_by: QueueSortKey,
    pub limit: Option<usize>,
    pub offset: usize,
}

/// One actionable queue entry joined with its workflow summary
#[derive(Debug, Clone, Serialize)]
pub struct QueueItemView {
    pub queue_item_id: Uuid,
    pub workflow_id: Uuid,
    pub document_id: Uuid,
    pub document_type: String,
    pub stage_number: i32,
    pub approver_id: String,
    pub priority: PriorityLevel,
    pub workflow_status: WorkflowStatus,
    pub sla_due_date: DateTime<Utc>,
    pub is_overdue: bool,
    pub escalation_level: i32,
    pub assigned_at: DateTime<Utc>,
    pub estimated_review_minutes: i32,
}

/// Aggregates over the full filtered pending set, independent of pagination
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueueStatistics {
    pub total: usize,
    pub overdue: usize,
    /// SLA remaining of two hours or less
    pub urgent: usize,
    pub due_today: usize,
    pub by_priority: BTreeMap<String, usize>,
    pub by_stage: BTreeMap<i32, usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaginationInfo {
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
    pub has_more: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueuePage {
    pub items: Vec<QueueItemView>,
    pub pagination: PaginationInfo,
    pub statistics: QueueStatistics,
}

/// One reassignment performed by the escalation sweeper
#[derive(Debug, Clone, Serialize)]
pub struct EscalationAssignment {
    pub workflow_id: Uuid,
    pub stage_number: i32,
    pub previous_approver: Option<String>,
    pub new_approver: String,
}

/// Sweep outcome handed to the notification collaborator
#[derive(Debug, Clone, Default, Serialize)]
pub struct EscalationSweepReport {
    pub escalated_count: usize,
    pub notified_approvers: Vec<String>,
    pub new_assignments: Vec<EscalationAssignment>,
}
