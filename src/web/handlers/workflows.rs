//! Workflow lifecycle handlers: initiate, decide, status, cancel.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

use crate::engine::{
    DecisionKind, DecisionRequest, InitiateRequest, StageView, WorkflowStatusView,
};
use crate::models::HistoryEntry;
use crate::state_machine::{PriorityLevel, WorkflowStatus};
use crate::web::errors::{ApiError, ApiResult};
use crate::web::handlers::parse_uuid;
use crate::web::state::AppState;

const PRIORITY_VALUES: &str = "low, normal, high, urgent, critical";
const DECISION_VALUES: &str = "approve, reject";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateWorkflowBody {
    pub document_id: String,
    pub document_type: String,
    pub priority_level: Option<String>,
    pub custom_sla_hours: Option<i64>,
    pub skip_stages: Option<Vec<i32>>,
    pub assign_specific_approvers: Option<HashMap<i32, String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateWorkflowResponse {
    pub workflow_id: Uuid,
    pub current_stage: i32,
    pub status: WorkflowStatus,
    pub next_approver_id: Option<String>,
    pub sla_due_date: DateTime<Utc>,
}

/// Initiate an approval workflow: POST /approval-workflow
pub async fn initiate_workflow(
    State(state): State<AppState>,
    Json(body): Json<InitiateWorkflowBody>,
) -> ApiResult<(StatusCode, Json<InitiateWorkflowResponse>)> {
    let document_id = parse_uuid(&body.document_id, "documentId")?;
    if body.document_type.trim().is_empty() {
        return Err(ApiError::bad_request("documentType must not be empty"));
    }
    let priority = parse_priority(body.priority_level.as_deref())?;

    info!(
        document_id = %document_id,
        document_type = %body.document_type,
        priority = ?priority,
        "initiating approval workflow"
    );

    let request = InitiateRequest {
        document_type: body.document_type,
        priority,
        custom_sla_hours: body.custom_sla_hours,
        skip_stages: body.skip_stages.unwrap_or_default(),
        assign_specific_approvers: body.assign_specific_approvers.unwrap_or_default(),
    };

    let result = state.engine.initiate_workflow(document_id, request).await?;

    Ok((
        StatusCode::CREATED,
        Json(InitiateWorkflowResponse {
            workflow_id: result.workflow_id,
            current_stage: result.current_stage,
            status: result.status,
            next_approver_id: result.next_approver_id,
            sla_due_date: result.sla_due_date,
        }),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionBody {
    pub workflow_id: String,
    pub approver_user_id: String,
    pub decision: String,
    pub comments: Option<String>,
    pub rejection_reason: Option<String>,
    pub reassign_to: Option<String>,
    pub time_spent_minutes: Option<i32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionResponse {
    pub workflow_id: Uuid,
    pub status: WorkflowStatus,
    pub current_stage: i32,
    pub is_complete: bool,
    pub next_approver_id: Option<String>,
    pub assignment_pending: bool,
    pub is_within_sla: bool,
}

/// Record an approval decision: PUT /approval-workflow
pub async fn process_approval(
    State(state): State<AppState>,
    Json(body): Json<DecisionBody>,
) -> ApiResult<Json<DecisionResponse>> {
    let workflow_id = parse_uuid(&body.workflow_id, "workflowId")?;
    if body.approver_user_id.trim().is_empty() {
        return Err(ApiError::bad_request("approverUserId must not be empty"));
    }
    let decision = match body.decision.as_str() {
        "approve" => DecisionKind::Approve,
        "reject" => DecisionKind::Reject,
        other => {
            return Err(ApiError::bad_request(format!(
                "decision must be one of [{DECISION_VALUES}], got '{other}'"
            )))
        }
    };

    let request = DecisionRequest {
        decision,
        comments: body.comments,
        rejection_reason: body.rejection_reason,
        reassign_to: body.reassign_to,
        time_spent_minutes: body.time_spent_minutes,
    };

    let result = state
        .engine
        .process_approval(workflow_id, &body.approver_user_id, request)
        .await?;

    Ok(Json(DecisionResponse {
        workflow_id: result.workflow_id,
        status: result.status,
        current_stage: result.current_stage,
        is_complete: result.is_complete,
        next_approver_id: result.next_approver_id,
        assignment_pending: result.assignment_pending,
        is_within_sla: result.within_sla,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusQuery {
    pub workflow_id: Option<String>,
    #[serde(default)]
    pub include_history: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageResponse {
    pub stage_number: i32,
    pub name: String,
    pub status: String,
    pub approver_id: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub is_current: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStatusResponse {
    pub workflow_id: Uuid,
    pub document_id: Uuid,
    pub document_type: String,
    pub current_stage: i32,
    pub status: WorkflowStatus,
    pub priority_level: PriorityLevel,
    pub sla_due_date: DateTime<Utc>,
    pub is_overdue: bool,
    pub escalation_level: i32,
    pub rejection_reason: Option<String>,
    pub resubmission_count: i32,
    pub current_approver: Option<String>,
    pub stages: Vec<StageResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<HistoryEntry>>,
}

/// Fetch workflow status: GET /approval-workflow?workflowId=...&includeHistory=true
pub async fn get_workflow_status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> ApiResult<Json<WorkflowStatusResponse>> {
    let raw_id = query
        .workflow_id
        .as_deref()
        .ok_or_else(|| ApiError::bad_request("workflowId query parameter is required"))?;
    let workflow_id = parse_uuid(raw_id, "workflowId")?;

    let view = state
        .engine
        .workflow_status(workflow_id, query.include_history)
        .await?;

    Ok(Json(status_response(view)))
}

fn status_response(view: WorkflowStatusView) -> WorkflowStatusResponse {
    let WorkflowStatusView {
        workflow,
        stages,
        history,
    } = view;
    WorkflowStatusResponse {
        workflow_id: workflow.workflow_id,
        document_id: workflow.document_id,
        document_type: workflow.document_type,
        current_stage: workflow.current_stage,
        status: workflow.status,
        priority_level: workflow.priority,
        sla_due_date: workflow.sla_due_date,
        is_overdue: workflow.is_overdue,
        escalation_level: workflow.escalation_level,
        rejection_reason: workflow.rejection_reason,
        resubmission_count: workflow.resubmission_count,
        current_approver: workflow.current_approver,
        stages: stages.into_iter().map(stage_response).collect(),
        history,
    }
}

fn stage_response(stage: StageView) -> StageResponse {
    StageResponse {
        stage_number: stage.stage_number,
        name: stage.name,
        status: stage.status.to_string(),
        approver_id: stage.approver_id,
        completed_at: stage.completed_at,
        is_current: stage.is_current,
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelBody {
    pub workflow_id: String,
    pub admin_user_id: String,
    pub cancel_reason: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelResponse {
    pub workflow_id: Uuid,
    pub status: WorkflowStatus,
}

/// Cancel a workflow: DELETE /approval-workflow
pub async fn cancel_workflow(
    State(state): State<AppState>,
    Json(body): Json<CancelBody>,
) -> ApiResult<Json<CancelResponse>> {
    let workflow_id = parse_uuid(&body.workflow_id, "workflowId")?;
    if body.admin_user_id.trim().is_empty() {
        return Err(ApiError::bad_request("adminUserId must not be empty"));
    }

    let result = state
        .engine
        .cancel_workflow(workflow_id, &body.admin_user_id, &body.cancel_reason)
        .await?;

    Ok(Json(CancelResponse {
        workflow_id: result.workflow_id,
        status: result.status,
    }))
}

pub(crate) fn parse_priority(raw: Option<&str>) -> Result<Option<PriorityLevel>, ApiError> {
    match raw {
        None => Ok(None),
        Some(raw) => raw.parse().map(Some).map_err(|_| {
            ApiError::bad_request(format!(
                "priorityLevel must be one of [{PRIORITY_VALUES}], got '{raw}'"
            ))
        }),
    }
}
