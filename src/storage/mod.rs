//! Storage contracts for the approval workflow engine.
//!
//! Every state transition is applied as one atomic [`WorkflowTransition`]:
//! workflow update, stage sub-record updates, queue-item completion/creation,
//! and the history append either all land or none do. The two race guards —
//! the queue claim and the terminal-status check — are conditional updates
//! inside the same atomic unit, never a caller-side read-then-write.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{ApprovalWorkflow, HistoryEntry, QueueItem, WorkflowStage};
use crate::state_machine::{PriorityLevel, QueueItemStatus, StageStatus, WorkflowStatus};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The queue-claim compare-and-set matched no pending item
    #[error("no pending queue item for approver '{approver_id}' on workflow {workflow_id}")]
    ClaimLost {
        workflow_id: Uuid,
        approver_id: String,
    },

    /// The workflow-row guard found a concurrently finalized status
    #[error("workflow {workflow_id} status changed concurrently")]
    StaleWorkflow { workflow_id: Uuid },

    /// The single-active-workflow-per-document constraint fired
    #[error("document {document_id} already has an active workflow")]
    DuplicateActive { document_id: Uuid },

    #[error("storage backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Field-complete update of a workflow row. Built from the engine's mutated
/// copy of the workflow; `guard_non_terminal` conditions the write on the
/// stored status still being non-terminal.
#[derive(Debug, Clone)]
pub struct WorkflowUpdate {
    pub workflow_id: Uuid,
    pub status: WorkflowStatus,
    pub current_stage: i32,
    pub is_overdue: bool,
    pub escalation_level: i32,
    pub rejection_reason: Option<String>,
    pub current_approver: Option<String>,
    pub guard_non_terminal: bool,
}

impl WorkflowUpdate {
    pub fn from_workflow(workflow: &ApprovalWorkflow) -> Self {
        Self {
            workflow_id: workflow.workflow_id,
            status: workflow.status,
            current_stage: workflow.current_stage,
            is_overdue: workflow.is_overdue,
            escalation_level: workflow.escalation_level,
            rejection_reason: workflow.rejection_reason.clone(),
            current_approver: workflow.current_approver.clone(),
            guard_non_terminal: true,
        }
    }
}

/// Update of one stage sub-record
#[derive(Debug, Clone)]
pub struct StageUpdate {
    pub stage_number: i32,
    pub status: StageStatus,
    pub approver_id: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Compare-and-set completion of the approver's pending queue item.
/// Zero matched rows fails the whole transition with [`StoreError::ClaimLost`].
#[derive(Debug, Clone)]
pub struct QueueClaim {
    pub workflow_id: Uuid,
    pub approver_id: String,
    pub complete_as: QueueItemStatus,
}

/// One atomic state transition
#[derive(Debug, Clone)]
pub struct WorkflowTransition {
    pub workflow: WorkflowUpdate,
    pub stage_updates: Vec<StageUpdate>,
    pub claim: Option<QueueClaim>,
    /// Cancel every still-open queue item of the workflow (cancellation and
    /// escalation reassignment paths)
    pub cancel_open_items: bool,
    pub new_queue_item: Option<QueueItem>,
    pub history: HistoryEntry,
}

impl WorkflowTransition {
    pub fn new(workflow: WorkflowUpdate, history: HistoryEntry) -> Self {
        Self {
            workflow,
            stage_updates: Vec::new(),
            claim: None,
            cancel_open_items: false,
            new_queue_item: None,
            history,
        }
    }
}

/// Filter for the approval queue listing. `approver_id = None` is the admin
/// view across all approvers.
#[derive(Debug, Clone, Default)]
pub struct QueueFilter {
    pub approver_id: Option<String>,
    pub priority: Option<PriorityLevel>,
    pub document_type: Option<String>,
    pub overdue_only: bool,
}

/// A pending queue item joined with its workflow
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub item: QueueItem,
    pub workflow: ApprovalWorkflow,
}

/// The ACID relational contract the engine runs against.
///
/// Implementations must make [`insert_workflow`](WorkflowStore::insert_workflow)
/// and [`apply_transition`](WorkflowStore::apply_transition) atomic: partial
/// application (workflow advanced but queue item still pending) is a
/// correctness violation.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Persist a new workflow with its stage records, optional first queue
    /// item, and the `initiate` history entry. Fails with
    /// [`StoreError::DuplicateActive`] when the document already has a
    /// non-terminal workflow.
    async fn insert_workflow(
        &self,
        workflow: &ApprovalWorkflow,
        stages: &[WorkflowStage],
        queue_item: Option<&QueueItem>,
        history: &HistoryEntry,
    ) -> StoreResult<()>;

    async fn find_workflow(&self, workflow_id: Uuid) -> StoreResult<Option<ApprovalWorkflow>>;

    /// Stage sub-records ordered by stage number
    async fn find_stages(&self, workflow_id: Uuid) -> StoreResult<Vec<WorkflowStage>>;

    async fn find_active_for_document(
        &self,
        document_id: Uuid,
    ) -> StoreResult<Option<ApprovalWorkflow>>;

    /// Most recently created workflow for the document, any status
    async fn latest_for_document(
        &self,
        document_id: Uuid,
    ) -> StoreResult<Option<ApprovalWorkflow>>;

    async fn apply_transition(&self, transition: &WorkflowTransition) -> StoreResult<()>;

    /// Pending queue items joined with their workflows, due date ascending
    async fn pending_queue(&self, filter: &QueueFilter) -> StoreResult<Vec<QueueEntry>>;

    /// History entries in creation order
    async fn history_for_workflow(&self, workflow_id: Uuid) -> StoreResult<Vec<HistoryEntry>>;

    /// Non-terminal workflows whose SLA due date has passed
    async fn overdue_workflows(&self, now: DateTime<Utc>)
        -> StoreResult<Vec<ApprovalWorkflow>>;
}
