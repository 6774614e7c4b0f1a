use serde::{Deserialize, Serialize};
use std::fmt;

use super::states::WorkflowStatus;

/// Events that drive workflow status transitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowEvent {
    /// A stage was approved; `final_stage` marks the last configured stage
    Approve { final_stage: bool },
    /// A stage was rejected
    Reject,
    /// Administrative cancellation
    Cancel,
    /// SLA breach escalation
    Escalate,
}

/// A transition that the status table does not permit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: WorkflowStatus,
    pub event: WorkflowEvent,
}

impl fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cannot apply {:?} to workflow in status '{}'",
            self.event, self.from
        )
    }
}

impl std::error::Error for InvalidTransition {}

/// Determine the target status for an event against the current status.
///
/// Terminal statuses accept no events; the engine surfaces those as
/// conflicts before any mutation.
pub fn determine_target_state(
    current: WorkflowStatus,
    event: &WorkflowEvent,
) -> Result<WorkflowStatus, InvalidTransition> {
    use WorkflowStatus::{Cancelled, Escalated, InReview, Pending, Rejected};

    let target = match (current, event) {
        (InReview | Escalated, WorkflowEvent::Approve { final_stage: true }) => {
            WorkflowStatus::Approved
        }
        (InReview | Escalated, WorkflowEvent::Approve { final_stage: false }) => InReview,
        (InReview | Escalated, WorkflowEvent::Reject) => Rejected,
        (Pending | InReview | Escalated, WorkflowEvent::Cancel) => Cancelled,
        (Pending | InReview | Escalated, WorkflowEvent::Escalate) => Escalated,
        (from, event) => {
            return Err(InvalidTransition {
                from,
                event: event.clone(),
            })
        }
    };

    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approve_transitions() {
        assert_eq!(
            determine_target_state(
                WorkflowStatus::InReview,
                &WorkflowEvent::Approve { final_stage: false }
            )
            .unwrap(),
            WorkflowStatus::InReview
        );
        assert_eq!(
            determine_target_state(
                WorkflowStatus::InReview,
                &WorkflowEvent::Approve { final_stage: true }
            )
            .unwrap(),
            WorkflowStatus::Approved
        );
    }

    #[test]
    fn test_escalated_workflow_still_decidable() {
        assert_eq!(
            determine_target_state(WorkflowStatus::Escalated, &WorkflowEvent::Reject).unwrap(),
            WorkflowStatus::Rejected
        );
        assert_eq!(
            determine_target_state(
                WorkflowStatus::Escalated,
                &WorkflowEvent::Approve { final_stage: true }
            )
            .unwrap(),
            WorkflowStatus::Approved
        );
    }

    #[test]
    fn test_terminal_states_accept_no_events() {
        for terminal in [
            WorkflowStatus::Approved,
            WorkflowStatus::Rejected,
            WorkflowStatus::Cancelled,
        ] {
            assert!(determine_target_state(terminal, &WorkflowEvent::Cancel).is_err());
            assert!(determine_target_state(terminal, &WorkflowEvent::Escalate).is_err());
            assert!(determine_target_state(
                terminal,
                &WorkflowEvent::Approve { final_stage: false }
            )
            .is_err());
        }
    }

    #[test]
    fn test_repeat_escalation_is_legal() {
        assert_eq!(
            determine_target_state(WorkflowStatus::Escalated, &WorkflowEvent::Escalate).unwrap(),
            WorkflowStatus::Escalated
        );
    }
}
