//! Shared application state and router assembly.

use axum::routing::get;
use axum::Router;
use std::sync::Arc;

use crate::engine::ApprovalEngine;

use super::handlers;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ApprovalEngine>,
}

impl AppState {
    pub fn new(engine: Arc<ApprovalEngine>) -> Self {
        Self { engine }
    }
}

/// Build the approval API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/approval-workflow",
            get(handlers::workflows::get_workflow_status)
                .post(handlers::workflows::initiate_workflow)
                .put(handlers::workflows::process_approval)
                .delete(handlers::workflows::cancel_workflow),
        )
        .route("/approval-queue", get(handlers::queue::get_approval_queue))
        .route("/health", get(handlers::health::health_check))
        .with_state(state)
}
