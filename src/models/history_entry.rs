use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state_machine::{HistoryAction, WorkflowStatus};

/// Actor id stamped on engine- and sweeper-originated ledger entries
pub const SYSTEM_ACTOR: &str = "system";

/// Append-only ledger entry. Ordering by `created_at` is the canonical
/// workflow timeline; entries are never mutated or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub history_id: Uuid,
    pub workflow_id: Uuid,
    pub action: HistoryAction,
    pub stage_number: i32,
    pub actor_id: String,
    pub actor_role: String,
    pub decision: Option<String>,
    pub comments: Option<String>,
    pub rejection_reason: Option<String>,
    pub previous_status: Option<WorkflowStatus>,
    pub new_status: Option<WorkflowStatus>,
    pub time_spent_minutes: Option<i32>,
    /// Computed at write time against the workflow's SLA due date
    pub within_sla: bool,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(
        workflow_id: Uuid,
        action: HistoryAction,
        stage_number: i32,
        actor_id: impl Into<String>,
        actor_role: impl Into<String>,
    ) -> Self {
        Self {
            history_id: Uuid::new_v4(),
            workflow_id,
            action,
            stage_number,
            actor_id: actor_id.into(),
            actor_role: actor_role.into(),
            decision: None,
            comments: None,
            rejection_reason: None,
            previous_status: None,
            new_status: None,
            time_spent_minutes: None,
            within_sla: true,
            metadata: serde_json::Value::Null,
            created_at: Utc::now(),
        }
    }

    pub fn system(workflow_id: Uuid, action: HistoryAction, stage_number: i32) -> Self {
        Self::new(workflow_id, action, stage_number, SYSTEM_ACTOR, SYSTEM_ACTOR)
    }

    pub fn with_transition(
        mut self,
        previous: WorkflowStatus,
        new: WorkflowStatus,
    ) -> Self {
        self.previous_status = Some(previous);
        self.new_status = Some(new);
        self
    }

    pub fn with_decision(mut self, decision: impl Into<String>) -> Self {
        self.decision = Some(decision.into());
        self
    }

    pub fn with_comments(mut self, comments: Option<String>) -> Self {
        self.comments = comments;
        self
    }

    pub fn with_rejection_reason(mut self, reason: impl Into<String>) -> Self {
        self.rejection_reason = Some(reason.into());
        self
    }

    pub fn with_time_spent(mut self, minutes: Option<i32>) -> Self {
        self.time_spent_minutes = minutes;
        self
    }

    pub fn with_sla_compliance(mut self, within_sla: bool) -> Self {
        self.within_sla = within_sla;
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}
