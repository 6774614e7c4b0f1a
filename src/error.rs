use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::state_machine::WorkflowStatus;

/// Pointer to an already-active workflow, returned on duplicate initiation
/// so the caller can redirect instead of retrying blindly.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveWorkflowRef {
    pub workflow_id: Uuid,
    pub current_stage: i32,
    pub status: WorkflowStatus,
}

/// Engine error kinds. Every API failure maps to exactly one of these;
/// raw storage errors are wrapped, never surfaced.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("{message}")]
    Conflict {
        message: String,
        existing: Option<ActiveWorkflowRef>,
    },

    #[error("approver '{approver_id}' has no pending claim on workflow {workflow_id}")]
    Unauthorized {
        workflow_id: Uuid,
        approver_id: String,
    },

    #[error("no stage configuration for document type '{document_type}'")]
    ConfigurationMissing { document_type: String },

    #[error("storage failure: {0}")]
    Storage(String),
}

impl EngineError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
            existing: None,
        }
    }

    pub fn conflict_with(message: impl Into<String>, existing: ActiveWorkflowRef) -> Self {
        Self::Conflict {
            message: message.into(),
            existing: Some(existing),
        }
    }

    pub fn unauthorized(workflow_id: Uuid, approver_id: impl Into<String>) -> Self {
        Self::Unauthorized {
            workflow_id,
            approver_id: approver_id.into(),
        }
    }

    pub fn configuration_missing(document_type: impl Into<String>) -> Self {
        Self::ConfigurationMissing {
            document_type: document_type.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// Stable machine-readable code for API envelopes and logs
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Conflict { .. } => "CONFLICT",
            Self::Unauthorized { .. } => "UNAUTHORIZED",
            Self::ConfigurationMissing { .. } => "CONFIGURATION_MISSING",
            Self::Storage(_) => "STORAGE_FAILURE",
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(EngineError::validation("x").code(), "VALIDATION_ERROR");
        assert_eq!(EngineError::not_found("workflow", "abc").code(), "NOT_FOUND");
        assert_eq!(EngineError::conflict("dup").code(), "CONFLICT");
        assert_eq!(EngineError::storage("io").code(), "STORAGE_FAILURE");
    }

    #[test]
    fn test_conflict_carries_existing_workflow() {
        let existing = ActiveWorkflowRef {
            workflow_id: Uuid::new_v4(),
            current_stage: 2,
            status: WorkflowStatus::InReview,
        };
        let err = EngineError::conflict_with("workflow already active", existing.clone());
        match err {
            EngineError::Conflict { existing: Some(r), .. } => assert_eq!(r, existing),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
