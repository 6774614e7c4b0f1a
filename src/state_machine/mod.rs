//! Workflow status vocabulary and the legal-transition table.
//!
//! The engine consults [`determine_target_state`] before every mutation so
//! terminal workflows can never re-enter review.

pub mod events;
pub mod states;

pub use events::{determine_target_state, InvalidTransition, WorkflowEvent};
pub use states::{HistoryAction, PriorityLevel, QueueItemStatus, StageStatus, WorkflowStatus};
