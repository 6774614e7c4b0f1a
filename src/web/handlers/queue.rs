//! Approval queue handler.

use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::{
    PaginationInfo, QueueItemView, QueuePage, QueueQuery, QueueSortKey, QueueStatistics,
};
use crate::state_machine::{PriorityLevel, WorkflowStatus};
use crate::web::errors::{ApiError, ApiResult};
use crate::web::handlers::workflows::parse_priority;
use crate::web::state::AppState;

const SORT_VALUES: &str = "due_date, priority, assigned_date";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalQueueQuery {
    pub approver_user_id: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
    pub priority_level: Option<String>,
    pub document_type: Option<String>,
    #[serde(default)]
    pub overdue: bool,
    pub sort_by: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItemResponse {
    pub queue_item_id: Uuid,
    pub workflow_id: Uuid,
    pub document_id: Uuid,
    pub document_type: String,
    pub stage_number: i32,
    pub approver_id: String,
    pub priority_level: PriorityLevel,
    pub workflow_status: WorkflowStatus,
    pub sla_due_date: DateTime<Utc>,
    pub is_overdue: bool,
    pub escalation_level: i32,
    pub assigned_at: DateTime<Utc>,
    pub estimated_review_minutes: i32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueResponse {
    pub items: Vec<QueueItemResponse>,
    pub pagination: PaginationResponse,
    pub statistics: QueueStatistics,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationResponse {
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
    pub has_more: bool,
}

/// List pending approvals: GET /approval-queue
pub async fn get_approval_queue(
    State(state): State<AppState>,
    Query(query): Query<ApprovalQueueQuery>,
) -> ApiResult<Json<QueueResponse>> {
    let priority = parse_priority(query.priority_level.as_deref())?;
    let sort_by = match query.sort_by.as_deref() {
        None => QueueSortKey::default(),
        Some(raw) => raw.parse().map_err(|_| {
            ApiError::bad_request(format!(
                "sortBy must be one of [{SORT_VALUES}], got '{raw}'"
            ))
        })?,
    };

    let page = state
        .engine
        .approval_queue(QueueQuery {
            approver_id: query.approver_user_id,
            is_admin: query.is_admin,
            priority,
            document_type: query.document_type,
            overdue_only: query.overdue,
            sort_by,
            limit: query.limit,
            offset: query.offset.unwrap_or(0),
        })
        .await?;

    Ok(Json(queue_response(page)))
}

fn queue_response(page: QueuePage) -> QueueResponse {
    let QueuePage {
        items,
        pagination,
        statistics,
    } = page;
    QueueResponse {
        items: items.into_iter().map(item_response).collect(),
        pagination: pagination_response(pagination),
        statistics,
    }
}

fn item_response(item: QueueItemView) -> QueueItemResponse {
    QueueItemResponse {
        queue_item_id: item.queue_item_id,
        workflow_id: item.workflow_id,
        document_id: item.document_id,
        document_type: item.document_type,
        stage_number: item.stage_number,
        approver_id: item.approver_id,
        priority_level: item.priority,
        workflow_status: item.workflow_status,
        sla_due_date: item.sla_due_date,
        is_overdue: item.is_overdue,
        escalation_level: item.escalation_level,
        assigned_at: item.assigned_at,
        estimated_review_minutes: item.estimated_review_minutes,
    }
}

fn pagination_response(info: PaginationInfo) -> PaginationResponse {
    PaginationResponse {
        total: info.total,
        limit: info.limit,
        offset: info.offset,
        has_more: info.has_more,
    }
}
