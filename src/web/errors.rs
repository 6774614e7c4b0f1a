//! HTTP error surface.
//!
//! Engine error kinds map to stable status codes and machine-readable error
//! codes; storage detail never leaks into responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::error::{ActiveWorkflowRef, EngineError};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid request: {message}")]
    BadRequest { message: String },

    #[error("{entity} not found")]
    NotFound { entity: String },

    #[error("{message}")]
    Conflict {
        message: String,
        existing: Option<ActiveWorkflowRef>,
    },

    #[error("Approver has no pending claim on this workflow")]
    Unauthorized,

    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status_code, error_code, message, details) = match &self {
            ApiError::BadRequest { message } => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                message.clone(),
                None,
            ),

            ApiError::NotFound { entity } => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("{entity} not found"),
                None,
            ),

            ApiError::Conflict { message, existing } => (
                StatusCode::CONFLICT,
                "CONFLICT",
                message.clone(),
                existing.as_ref().map(|e| {
                    json!({
                        "workflowId": e.workflow_id,
                        "currentStage": e.current_stage,
                        "status": e.status,
                    })
                }),
            ),

            ApiError::Unauthorized => (
                StatusCode::FORBIDDEN,
                "UNAUTHORIZED",
                "Approver has no pending claim on this workflow".to_string(),
                None,
            ),

            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "Internal server error".to_string(),
                None,
            ),
        };

        let mut error = json!({
            "code": error_code,
            "message": message,
        });
        if let Some(details) = details {
            error["details"] = details;
        }

        (status_code, Json(json!({ "error": error }))).into_response()
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Validation(message) => ApiError::BadRequest { message },
            EngineError::NotFound { entity, .. } => ApiError::NotFound {
                entity: entity.to_string(),
            },
            EngineError::Conflict { message, existing } => {
                ApiError::Conflict { message, existing }
            }
            EngineError::Unauthorized { .. } => ApiError::Unauthorized,
            EngineError::ConfigurationMissing { document_type } => ApiError::BadRequest {
                message: format!("no stage configuration for document type '{document_type}'"),
            },
            EngineError::Storage(message) => {
                tracing::error!(error = %message, "storage failure");
                ApiError::Internal
            }
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_mapping() {
        assert!(matches!(
            ApiError::from(EngineError::validation("bad")),
            ApiError::BadRequest { .. }
        ));
        assert!(matches!(
            ApiError::from(EngineError::not_found("workflow", "x")),
            ApiError::NotFound { .. }
        ));
        assert!(matches!(
            ApiError::from(EngineError::unauthorized(uuid::Uuid::new_v4(), "bob")),
            ApiError::Unauthorized
        ));
        // Storage detail collapses to an opaque internal error.
        assert!(matches!(
            ApiError::from(EngineError::storage("pg: connection refused")),
            ApiError::Internal
        ));
    }
}
