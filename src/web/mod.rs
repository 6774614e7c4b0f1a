//! HTTP exposure of the approval engine.
//!
//! Four logical operations on `/approval-workflow`, the queue listing on
//! `/approval-queue`, and a health probe. Input is validated (UUID format,
//! priority vocabulary) before any persistence access.

pub mod errors;
pub mod handlers;
pub mod state;

pub use errors::{ApiError, ApiResult};
pub use state::{create_router, AppState};
