use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state_machine::{PriorityLevel, StageStatus, WorkflowStatus};

/// The per-document approval instance tracking stage progression, status,
/// and SLA. Mutated only by the engine and the escalation sweeper; never
/// deleted, only transitioned to a terminal status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalWorkflow {
    pub workflow_id: Uuid,
    pub document_id: Uuid,
    pub document_type: String,
    pub current_stage: i32,
    pub status: WorkflowStatus,
    pub priority: PriorityLevel,
    pub sla_due_date: DateTime<Utc>,
    /// Derived from `sla_due_date`, persisted for query efficiency
    pub is_overdue: bool,
    pub escalation_level: i32,
    pub rejection_reason: Option<String>,
    pub resubmission_count: i32,
    pub current_approver: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ApprovalWorkflow {
    pub fn new(
        document_id: Uuid,
        document_type: impl Into<String>,
        priority: PriorityLevel,
        sla_due_date: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            workflow_id: Uuid::new_v4(),
            document_id,
            document_type: document_type.into(),
            current_stage: 1,
            status: WorkflowStatus::InReview,
            priority,
            sla_due_date,
            is_overdue: false,
            escalation_level: 0,
            rejection_reason: None,
            resubmission_count: 0,
            current_approver: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// SLA compliance at a given decision time
    pub fn within_sla(&self, at: DateTime<Utc>) -> bool {
        at <= self.sla_due_date
    }
}

/// One stage sub-record of a workflow, indexed by stage number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStage {
    pub workflow_id: Uuid,
    pub stage_number: i32,
    pub name: String,
    pub status: StageStatus,
    pub approver_id: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl WorkflowStage {
    pub fn new(workflow_id: Uuid, stage_number: i32, name: impl Into<String>) -> Self {
        Self {
            workflow_id,
            stage_number,
            name: name.into(),
            status: StageStatus::Pending,
            approver_id: None,
            completed_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_new_workflow_starts_at_stage_one() {
        let wf = ApprovalWorkflow::new(
            Uuid::new_v4(),
            "contract",
            PriorityLevel::Normal,
            Utc::now() + Duration::hours(24),
        );
        assert_eq!(wf.current_stage, 1);
        assert_eq!(wf.status, WorkflowStatus::InReview);
        assert_eq!(wf.escalation_level, 0);
        assert!(!wf.is_terminal());
    }

    #[test]
    fn test_within_sla_boundary() {
        let due = Utc::now() + Duration::hours(1);
        let wf = ApprovalWorkflow::new(Uuid::new_v4(), "contract", PriorityLevel::Normal, due);
        assert!(wf.within_sla(due));
        assert!(wf.within_sla(due - Duration::seconds(1)));
        assert!(!wf.within_sla(due + Duration::seconds(1)));
    }
}
