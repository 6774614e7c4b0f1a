use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle states for an approval workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// Workflow created but no stage activated yet
    Pending,
    /// A stage is awaiting an approver decision
    InReview,
    /// All required stages approved
    Approved,
    /// A stage decision rejected the document
    Rejected,
    /// Administratively cancelled
    Cancelled,
    /// SLA breached and reassigned; still decidable
    Escalated,
}

impl WorkflowStatus {
    /// Check if this is a terminal state (no further stage mutation allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected | Self::Cancelled)
    }

    /// Check if the workflow is awaiting a decision
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::InReview | Self::Escalated)
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InReview => write!(f, "in_review"),
            Self::Approved => write!(f, "approved"),
            Self::Rejected => write!(f, "rejected"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Escalated => write!(f, "escalated"),
        }
    }
}

impl std::str::FromStr for WorkflowStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_review" => Ok(Self::InReview),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "cancelled" => Ok(Self::Cancelled),
            "escalated" => Ok(Self::Escalated),
            _ => Err(format!("Invalid workflow status: {s}")),
        }
    }
}

impl Default for WorkflowStatus {
    fn default() -> Self {
        Self::Pending
    }
}

/// Per-stage record states within a workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Stage not yet reached
    Pending,
    /// Stage is the current one, awaiting a decision
    InProgress,
    /// Approver accepted the stage
    Approved,
    /// Approver rejected the stage
    Rejected,
    /// Stage skipped at initiation
    Skipped,
    /// Stage passed by an auto-approval rule
    AutoApproved,
}

impl StageStatus {
    /// Check if the stage no longer needs a decision
    pub fn is_settled(&self) -> bool {
        !matches!(self, Self::Pending | Self::InProgress)
    }

    /// Check if the stage counts toward workflow approval
    pub fn satisfies_approval(&self) -> bool {
        matches!(self, Self::Approved | Self::AutoApproved | Self::Skipped)
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Approved => write!(f, "approved"),
            Self::Rejected => write!(f, "rejected"),
            Self::Skipped => write!(f, "skipped"),
            Self::AutoApproved => write!(f, "auto_approved"),
        }
    }
}

impl std::str::FromStr for StageStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "skipped" => Ok(Self::Skipped),
            "auto_approved" => Ok(Self::AutoApproved),
            _ => Err(format!("Invalid stage status: {s}")),
        }
    }
}

impl Default for StageStatus {
    fn default() -> Self {
        Self::Pending
    }
}

/// Queue item lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueItemStatus {
    /// Awaiting the assigned approver
    Pending,
    /// Claimed by the approver mid-decision
    InProgress,
    /// Decision recorded
    Completed,
    /// Stage skipped before a decision was needed
    Skipped,
    /// Superseded by reassignment or workflow cancellation
    Cancelled,
}

impl QueueItemStatus {
    /// Check if the item still represents actionable work
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Pending | Self::InProgress)
    }
}

impl fmt::Display for QueueItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
            Self::Skipped => write!(f, "skipped"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for QueueItemStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "skipped" => Ok(Self::Skipped),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("Invalid queue item status: {s}")),
        }
    }
}

/// Review priority for queue ordering. Variant order is the sort order:
/// `Critical` outranks everything, `Low` nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityLevel {
    Low,
    Normal,
    High,
    Urgent,
    Critical,
}

impl fmt::Display for PriorityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Normal => write!(f, "normal"),
            Self::High => write!(f, "high"),
            Self::Urgent => write!(f, "urgent"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for PriorityLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "normal" => Ok(Self::Normal),
            "high" => Ok(Self::High),
            "urgent" => Ok(Self::Urgent),
            "critical" => Ok(Self::Critical),
            _ => Err(format!("Invalid priority level: {s}")),
        }
    }
}

impl Default for PriorityLevel {
    fn default() -> Self {
        Self::Normal
    }
}

/// Audit ledger action vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    Initiate,
    Approve,
    Reject,
    Escalate,
    Reassign,
    Cancel,
    Comment,
}

impl fmt::Display for HistoryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initiate => write!(f, "initiate"),
            Self::Approve => write!(f, "approve"),
            Self::Reject => write!(f, "reject"),
            Self::Escalate => write!(f, "escalate"),
            Self::Reassign => write!(f, "reassign"),
            Self::Cancel => write!(f, "cancel"),
            Self::Comment => write!(f, "comment"),
        }
    }
}

impl std::str::FromStr for HistoryAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initiate" => Ok(Self::Initiate),
            "approve" => Ok(Self::Approve),
            "reject" => Ok(Self::Reject),
            "escalate" => Ok(Self::Escalate),
            "reassign" => Ok(Self::Reassign),
            "cancel" => Ok(Self::Cancel),
            "comment" => Ok(Self::Comment),
            _ => Err(format!("Invalid history action: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workflow_terminal_check() {
        assert!(WorkflowStatus::Approved.is_terminal());
        assert!(WorkflowStatus::Rejected.is_terminal());
        assert!(WorkflowStatus::Cancelled.is_terminal());
        assert!(!WorkflowStatus::Pending.is_terminal());
        assert!(!WorkflowStatus::InReview.is_terminal());
        assert!(!WorkflowStatus::Escalated.is_terminal());
    }

    #[test]
    fn test_escalated_remains_active() {
        assert!(WorkflowStatus::Escalated.is_active());
        assert!(!WorkflowStatus::Approved.is_active());
    }

    #[test]
    fn test_stage_approval_satisfaction() {
        assert!(StageStatus::Approved.satisfies_approval());
        assert!(StageStatus::AutoApproved.satisfies_approval());
        assert!(StageStatus::Skipped.satisfies_approval());
        assert!(!StageStatus::Pending.satisfies_approval());
        assert!(!StageStatus::InProgress.satisfies_approval());
        assert!(!StageStatus::Rejected.satisfies_approval());
    }

    #[test]
    fn test_priority_ordering() {
        assert!(PriorityLevel::Critical > PriorityLevel::Urgent);
        assert!(PriorityLevel::Urgent > PriorityLevel::High);
        assert!(PriorityLevel::High > PriorityLevel::Normal);
        assert!(PriorityLevel::Normal > PriorityLevel::Low);
    }

    #[test]
    fn test_state_string_conversion() {
        assert_eq!(WorkflowStatus::InReview.to_string(), "in_review");
        assert_eq!(
            "escalated".parse::<WorkflowStatus>().unwrap(),
            WorkflowStatus::Escalated
        );

        assert_eq!(StageStatus::AutoApproved.to_string(), "auto_approved");
        assert_eq!(
            "auto_approved".parse::<StageStatus>().unwrap(),
            StageStatus::AutoApproved
        );

        assert_eq!(QueueItemStatus::InProgress.to_string(), "in_progress");
        assert!("bogus".parse::<QueueItemStatus>().is_err());
    }

    #[test]
    fn test_state_serde() {
        let status = WorkflowStatus::InReview;
        let json = serde_json::to_string(&status).unwrap();
        assert_eq!(json, "\"in_review\"");

        let parsed: WorkflowStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, status);

        let priority: PriorityLevel = serde_json::from_str("\"critical\"").unwrap();
        assert_eq!(priority, PriorityLevel::Critical);
    }
}
