//! Approval workflow service entry point.

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tracing::info;

use docflow_core::collaborators::{
    LoggingNotificationDispatcher, StaticApproverDirectory, StaticDocumentDirectory,
};
use docflow_core::engine::ApprovalEngine;
use docflow_core::logging::init_structured_logging;
use docflow_core::models::StageConfigStore;
use docflow_core::storage::PgStore;
use docflow_core::web::{create_router, AppState};
use docflow_core::DocflowConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_structured_logging();
    let config = DocflowConfig::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await?;

    let store = PgStore::new(pool);
    store.migrate().await?;

    // The production deployment swaps these for directory-service adapters.
    let engine = Arc::new(ApprovalEngine::new(
        Arc::new(store),
        Arc::new(StageConfigStore::with_defaults()),
        Arc::new(StaticDocumentDirectory::new()),
        Arc::new(StaticApproverDirectory::new()),
        Arc::new(LoggingNotificationDispatcher),
    ));

    let app = create_router(AppState::new(engine));
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!(bind_address = %config.bind_address, "approval workflow service listening");
    axum::serve(listener, app).await?;

    Ok(())
}
