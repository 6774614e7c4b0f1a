//! Domain records for the approval workflow engine.
//!
//! Stage sub-records are an ordered collection indexed by stage number, so
//! the engine stays stage-count-agnostic across document types.

pub mod approval_workflow;
pub mod history_entry;
pub mod queue_item;
pub mod stage_configuration;

pub use approval_workflow::{ApprovalWorkflow, WorkflowStage};
pub use history_entry::{HistoryEntry, SYSTEM_ACTOR};
pub use queue_item::QueueItem;
pub use stage_configuration::{StageConfigError, StageConfigStore, StageConfiguration};
