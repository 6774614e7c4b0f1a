//! PostgreSQL [`WorkflowStore`] backend.
//!
//! Every transition runs inside one sqlx transaction; the queue claim and
//! the terminal-status guard are conditional `UPDATE ... RETURNING` rows, so
//! the race loser rolls back without having written anything. All SQL is
//! parameterized with `$n` binds; no query text is ever assembled from
//! caller input.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::FromRow;
use tracing::debug;
use uuid::Uuid;

use super::{
    QueueEntry, QueueFilter, StoreError, StoreResult, WorkflowStore, WorkflowTransition,
};
use crate::models::{ApprovalWorkflow, HistoryEntry, QueueItem, WorkflowStage};

const ACTIVE_STATUSES: [&str; 3] = ["pending", "in_review", "escalated"];
const ACTIVE_DOCUMENT_IDX: &str = "approval_workflows_active_document_idx";

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the embedded schema migrations
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(format!("migration failed: {e}")))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[derive(Debug, FromRow)]
struct WorkflowRow {
    workflow_id: Uuid,
    document_id: Uuid,
    document_type: String,
    current_stage: i32,
    status: String,
    priority: String,
    sla_due_date: DateTime<Utc>,
    is_overdue: bool,
    escalation_level: i32,
    rejection_reason: Option<String>,
    resubmission_count: i32,
    current_approver: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl WorkflowRow {
    fn into_model(self) -> StoreResult<ApprovalWorkflow> {
        Ok(ApprovalWorkflow {
            workflow_id: self.workflow_id,
            document_id: self.document_id,
            document_type: self.document_type,
            current_stage: self.current_stage,
            status: parse_state(&self.status, "workflow status")?,
            priority: parse_state(&self.priority, "priority")?,
            sla_due_date: self.sla_due_date,
            is_overdue: self.is_overdue,
            escalation_level: self.escalation_level,
            rejection_reason: self.rejection_reason,
            resubmission_count: self.resubmission_count,
            current_approver: self.current_approver,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct StageRow {
    workflow_id: Uuid,
    stage_number: i32,
    name: String,
    status: String,
    approver_id: Option<String>,
    completed_at: Option<DateTime<Utc>>,
}

impl StageRow {
    fn into_model(self) -> StoreResult<WorkflowStage> {
        Ok(WorkflowStage {
            workflow_id: self.workflow_id,
            stage_number: self.stage_number,
            name: self.name,
            status: parse_state(&self.status, "stage status")?,
            approver_id: self.approver_id,
            completed_at: self.completed_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct HistoryRow {
    history_id: Uuid,
    workflow_id: Uuid,
    action: String,
    stage_number: i32,
    actor_id: String,
    actor_role: String,
    decision: Option<String>,
    comments: Option<String>,
    rejection_reason: Option<String>,
    previous_status: Option<String>,
    new_status: Option<String>,
    time_spent_minutes: Option<i32>,
    within_sla: bool,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl HistoryRow {
    fn into_model(self) -> StoreResult<HistoryEntry> {
        Ok(HistoryEntry {
            history_id: self.history_id,
            workflow_id: self.workflow_id,
            action: parse_state(&self.action, "history action")?,
            stage_number: self.stage_number,
            actor_id: self.actor_id,
            actor_role: self.actor_role,
            decision: self.decision,
            comments: self.comments,
            rejection_reason: self.rejection_reason,
            previous_status: parse_optional_state(self.previous_status, "previous status")?,
            new_status: parse_optional_state(self.new_status, "new status")?,
            time_spent_minutes: self.time_spent_minutes,
            within_sla: self.within_sla,
            metadata: self.metadata,
            created_at: self.created_at,
        })
    }
}

/// Queue item joined with its workflow
#[derive(Debug, FromRow)]
struct QueueJoinRow {
    queue_item_id: Uuid,
    workflow_id: Uuid,
    approver_id: String,
    stage_number: i32,
    item_priority: String,
    item_status: String,
    assigned_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    estimated_review_minutes: i32,
    document_id: Uuid,
    document_type: String,
    current_stage: i32,
    status: String,
    priority: String,
    sla_due_date: DateTime<Utc>,
    is_overdue: bool,
    escalation_level: i32,
    rejection_reason: Option<String>,
    resubmission_count: i32,
    current_approver: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl QueueJoinRow {
    fn into_entry(self) -> StoreResult<QueueEntry> {
        let item = QueueItem {
            queue_item_id: self.queue_item_id,
            workflow_id: self.workflow_id,
            approver_id: self.approver_id,
            stage_number: self.stage_number,
            priority: parse_state(&self.item_priority, "queue priority")?,
            status: parse_state(&self.item_status, "queue status")?,
            assigned_at: self.assigned_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
            estimated_review_minutes: self.estimated_review_minutes,
        };
        let workflow = ApprovalWorkflow {
            workflow_id: self.workflow_id,
            document_id: self.document_id,
            document_type: self.document_type,
            current_stage: self.current_stage,
            status: parse_state(&self.status, "workflow status")?,
            priority: parse_state(&self.priority, "priority")?,
            sla_due_date: self.sla_due_date,
            is_overdue: self.is_overdue,
            escalation_level: self.escalation_level,
            rejection_reason: self.rejection_reason,
            resubmission_count: self.resubmission_count,
            current_approver: self.current_approver,
            created_at: self.created_at,
            updated_at: self.updated_at,
        };
        Ok(QueueEntry { item, workflow })
    }
}

fn parse_state<T: std::str::FromStr<Err = String>>(raw: &str, what: &str) -> StoreResult<T> {
    raw.parse()
        .map_err(|e| StoreError::Backend(format!("invalid {what} in database: {e}")))
}

fn parse_optional_state<T: std::str::FromStr<Err = String>>(
    raw: Option<String>,
    what: &str,
) -> StoreResult<Option<T>> {
    raw.map(|s| parse_state(&s, what)).transpose()
}

fn backend_err(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

const WORKFLOW_COLUMNS: &str = "workflow_id, document_id, document_type, current_stage, status, \
     priority, sla_due_date, is_overdue, escalation_level, rejection_reason, \
     resubmission_count, current_approver, created_at, updated_at";

async fn insert_queue_item<'e, E>(executor: E, item: &QueueItem) -> Result<(), sqlx::Error>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query(
        "INSERT INTO approval_queue_items \
         (queue_item_id, workflow_id, approver_id, stage_number, priority, status, \
          assigned_at, started_at, completed_at, estimated_review_minutes) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
    )
    .bind(item.queue_item_id)
    .bind(item.workflow_id)
    .bind(&item.approver_id)
    .bind(item.stage_number)
    .bind(item.priority.to_string())
    .bind(item.status.to_string())
    .bind(item.assigned_at)
    .bind(item.started_at)
    .bind(item.completed_at)
    .bind(item.estimated_review_minutes)
    .execute(executor)
    .await?;
    Ok(())
}

async fn insert_history<'e, E>(executor: E, entry: &HistoryEntry) -> Result<(), sqlx::Error>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query(
        "INSERT INTO approval_history \
         (history_id, workflow_id, action, stage_number, actor_id, actor_role, decision, \
          comments, rejection_reason, previous_status, new_status, time_spent_minutes, \
          within_sla, metadata, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
    )
    .bind(entry.history_id)
    .bind(entry.workflow_id)
    .bind(entry.action.to_string())
    .bind(entry.stage_number)
    .bind(&entry.actor_id)
    .bind(&entry.actor_role)
    .bind(&entry.decision)
    .bind(&entry.comments)
    .bind(&entry.rejection_reason)
    .bind(entry.previous_status.map(|s| s.to_string()))
    .bind(entry.new_status.map(|s| s.to_string()))
    .bind(entry.time_spent_minutes)
    .bind(entry.within_sla)
    .bind(&entry.metadata)
    .bind(entry.created_at)
    .execute(executor)
    .await?;
    Ok(())
}

#[async_trait]
impl WorkflowStore for PgStore {
    async fn insert_workflow(
        &self,
        workflow: &ApprovalWorkflow,
        stages: &[WorkflowStage],
        queue_item: Option<&QueueItem>,
        history: &HistoryEntry,
    ) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(backend_err)?;

        let inserted = sqlx::query(
            "INSERT INTO approval_workflows \
             (workflow_id, document_id, document_type, current_stage, status, priority, \
              sla_due_date, is_overdue, escalation_level, rejection_reason, \
              resubmission_count, current_approver, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
        )
        .bind(workflow.workflow_id)
        .bind(workflow.document_id)
        .bind(&workflow.document_type)
        .bind(workflow.current_stage)
        .bind(workflow.status.to_string())
        .bind(workflow.priority.to_string())
        .bind(workflow.sla_due_date)
        .bind(workflow.is_overdue)
        .bind(workflow.escalation_level)
        .bind(&workflow.rejection_reason)
        .bind(workflow.resubmission_count)
        .bind(&workflow.current_approver)
        .bind(workflow.created_at)
        .bind(workflow.updated_at)
        .execute(&mut *tx)
        .await;

        if let Err(e) = inserted {
            if let sqlx::Error::Database(db) = &e {
                if db.constraint() == Some(ACTIVE_DOCUMENT_IDX) {
                    return Err(StoreError::DuplicateActive {
                        document_id: workflow.document_id,
                    });
                }
            }
            return Err(backend_err(e));
        }

        for stage in stages {
            sqlx::query(
                "INSERT INTO approval_workflow_stages \
                 (workflow_id, stage_number, name, status, approver_id, completed_at) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(stage.workflow_id)
            .bind(stage.stage_number)
            .bind(&stage.name)
            .bind(stage.status.to_string())
            .bind(&stage.approver_id)
            .bind(stage.completed_at)
            .execute(&mut *tx)
            .await
            .map_err(backend_err)?;
        }

        if let Some(item) = queue_item {
            insert_queue_item(&mut *tx, item).await.map_err(backend_err)?;
        }
        insert_history(&mut *tx, history).await.map_err(backend_err)?;

        tx.commit().await.map_err(backend_err)?;
        debug!(workflow_id = %workflow.workflow_id, "persisted new workflow");
        Ok(())
    }

    async fn find_workflow(&self, workflow_id: Uuid) -> StoreResult<Option<ApprovalWorkflow>> {
        let row = sqlx::query_as::<_, WorkflowRow>(&format!(
            "SELECT {WORKFLOW_COLUMNS} FROM approval_workflows WHERE workflow_id = $1"
        ))
        .bind(workflow_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend_err)?;

        row.map(WorkflowRow::into_model).transpose()
    }

    async fn find_stages(&self, workflow_id: Uuid) -> StoreResult<Vec<WorkflowStage>> {
        let rows = sqlx::query_as::<_, StageRow>(
            "SELECT workflow_id, stage_number, name, status, approver_id, completed_at \
             FROM approval_workflow_stages \
             WHERE workflow_id = $1 \
             ORDER BY stage_number ASC",
        )
        .bind(workflow_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend_err)?;

        rows.into_iter().map(StageRow::into_model).collect()
    }

    async fn find_active_for_document(
        &self,
        document_id: Uuid,
    ) -> StoreResult<Option<ApprovalWorkflow>> {
        let row = sqlx::query_as::<_, WorkflowRow>(&format!(
            "SELECT {WORKFLOW_COLUMNS} FROM approval_workflows \
             WHERE document_id = $1 AND status = ANY($2) \
             LIMIT 1"
        ))
        .bind(document_id)
        .bind(ACTIVE_STATUSES.map(String::from).to_vec())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend_err)?;

        row.map(WorkflowRow::into_model).transpose()
    }

    async fn latest_for_document(
        &self,
        document_id: Uuid,
    ) -> StoreResult<Option<ApprovalWorkflow>> {
        let row = sqlx::query_as::<_, WorkflowRow>(&format!(
            "SELECT {WORKFLOW_COLUMNS} FROM approval_workflows \
             WHERE document_id = $1 \
             ORDER BY created_at DESC \
             LIMIT 1"
        ))
        .bind(document_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend_err)?;

        row.map(WorkflowRow::into_model).transpose()
    }

    async fn apply_transition(&self, transition: &WorkflowTransition) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(backend_err)?;
        let update = &transition.workflow;

        // Claim first: the CAS on the queue item serializes concurrent
        // decisions before any workflow-row contention.
        if let Some(claim) = &transition.claim {
            let claimed = sqlx::query(
                "UPDATE approval_queue_items \
                 SET status = $3, started_at = COALESCE(started_at, NOW()), completed_at = NOW() \
                 WHERE workflow_id = $1 AND approver_id = $2 AND status = 'pending' \
                 RETURNING queue_item_id",
            )
            .bind(claim.workflow_id)
            .bind(&claim.approver_id)
            .bind(claim.complete_as.to_string())
            .fetch_optional(&mut *tx)
            .await
            .map_err(backend_err)?;

            if claimed.is_none() {
                return Err(StoreError::ClaimLost {
                    workflow_id: claim.workflow_id,
                    approver_id: claim.approver_id.clone(),
                });
            }
        }

        let guarded = sqlx::query(
            "UPDATE approval_workflows \
             SET status = $2, current_stage = $3, is_overdue = $4, escalation_level = $5, \
                 rejection_reason = $6, current_approver = $7, updated_at = NOW() \
             WHERE workflow_id = $1 AND (NOT $8 OR status = ANY($9)) \
             RETURNING workflow_id",
        )
        .bind(update.workflow_id)
        .bind(update.status.to_string())
        .bind(update.current_stage)
        .bind(update.is_overdue)
        .bind(update.escalation_level)
        .bind(&update.rejection_reason)
        .bind(&update.current_approver)
        .bind(update.guard_non_terminal)
        .bind(ACTIVE_STATUSES.map(String::from).to_vec())
        .fetch_optional(&mut *tx)
        .await
        .map_err(backend_err)?;

        if guarded.is_none() {
            return Err(StoreError::StaleWorkflow {
                workflow_id: update.workflow_id,
            });
        }

        if transition.cancel_open_items {
            sqlx::query(
                "UPDATE approval_queue_items \
                 SET status = 'cancelled', completed_at = NOW() \
                 WHERE workflow_id = $1 AND status IN ('pending', 'in_progress')",
            )
            .bind(update.workflow_id)
            .execute(&mut *tx)
            .await
            .map_err(backend_err)?;
        }

        for stage in &transition.stage_updates {
            sqlx::query(
                "UPDATE approval_workflow_stages \
                 SET status = $3, approver_id = $4, completed_at = $5 \
                 WHERE workflow_id = $1 AND stage_number = $2",
            )
            .bind(update.workflow_id)
            .bind(stage.stage_number)
            .bind(stage.status.to_string())
            .bind(&stage.approver_id)
            .bind(stage.completed_at)
            .execute(&mut *tx)
            .await
            .map_err(backend_err)?;
        }

        if let Some(item) = &transition.new_queue_item {
            insert_queue_item(&mut *tx, item).await.map_err(backend_err)?;
        }
        insert_history(&mut *tx, &transition.history)
            .await
            .map_err(backend_err)?;

        tx.commit().await.map_err(backend_err)?;
        Ok(())
    }

    async fn pending_queue(&self, filter: &QueueFilter) -> StoreResult<Vec<QueueEntry>> {
        let rows = sqlx::query_as::<_, QueueJoinRow>(
            "SELECT qi.queue_item_id, qi.workflow_id, qi.approver_id, qi.stage_number, \
                    qi.priority AS item_priority, qi.status AS item_status, qi.assigned_at, \
                    qi.started_at, qi.completed_at, qi.estimated_review_minutes, \
                    wf.document_id, wf.document_type, wf.current_stage, wf.status, \
                    wf.priority, wf.sla_due_date, wf.is_overdue, wf.escalation_level, \
                    wf.rejection_reason, wf.resubmission_count, wf.current_approver, \
                    wf.created_at, wf.updated_at \
             FROM approval_queue_items qi \
             JOIN approval_workflows wf ON wf.workflow_id = qi.workflow_id \
             WHERE qi.status = 'pending' \
               AND ($1::text IS NULL OR qi.approver_id = $1) \
               AND ($2::text IS NULL OR qi.priority = $2) \
               AND ($3::text IS NULL OR wf.document_type = $3) \
               AND (NOT $4 OR wf.sla_due_date < NOW()) \
             ORDER BY wf.sla_due_date ASC",
        )
        .bind(filter.approver_id.as_deref())
        .bind(filter.priority.map(|p| p.to_string()))
        .bind(filter.document_type.as_deref())
        .bind(filter.overdue_only)
        .fetch_all(&self.pool)
        .await
        .map_err(backend_err)?;

        rows.into_iter().map(QueueJoinRow::into_entry).collect()
    }

    async fn history_for_workflow(&self, workflow_id: Uuid) -> StoreResult<Vec<HistoryEntry>> {
        let rows = sqlx::query_as::<_, HistoryRow>(
            "SELECT history_id, workflow_id, action, stage_number, actor_id, actor_role, \
                    decision, comments, rejection_reason, previous_status, new_status, \
                    time_spent_minutes, within_sla, metadata, created_at \
             FROM approval_history \
             WHERE workflow_id = $1 \
             ORDER BY created_at ASC",
        )
        .bind(workflow_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend_err)?;

        rows.into_iter().map(HistoryRow::into_model).collect()
    }

    async fn overdue_workflows(
        &self,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<ApprovalWorkflow>> {
        let rows = sqlx::query_as::<_, WorkflowRow>(&format!(
            "SELECT {WORKFLOW_COLUMNS} FROM approval_workflows \
             WHERE status = ANY($1) AND sla_due_date < $2 \
             ORDER BY sla_due_date ASC"
        ))
        .bind(ACTIVE_STATUSES.map(String::from).to_vec())
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(backend_err)?;

        rows.into_iter().map(WorkflowRow::into_model).collect()
    }
}
