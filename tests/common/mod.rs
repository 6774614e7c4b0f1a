//! Shared test harness: engine wired to the in-memory store with scripted
//! collaborators.

use std::sync::Arc;

use uuid::Uuid;

use docflow_core::collaborators::{
    LoggingNotificationDispatcher, StaticApproverDirectory, StaticDocumentDirectory,
};
use docflow_core::engine::ApprovalEngine;
use docflow_core::models::StageConfigStore;
use docflow_core::storage::MemoryStore;

/// Default approvers per stage for the `contract` document type
pub const STAGE_APPROVERS: [&str; 4] = [
    "casey.intake",
    "priya.compliance",
    "felix.finance",
    "dana.director",
];

pub struct TestHarness {
    pub engine: Arc<ApprovalEngine>,
    pub store: Arc<MemoryStore>,
    pub documents: Arc<StaticDocumentDirectory>,
    pub approvers: Arc<StaticApproverDirectory>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config_store(StageConfigStore::with_defaults())
    }

    pub fn with_config_store(config_store: StageConfigStore) -> Self {
        let store = Arc::new(MemoryStore::new());
        let documents = Arc::new(StaticDocumentDirectory::new());
        let approvers = Arc::new(StaticApproverDirectory::new());

        for (index, approver) in STAGE_APPROVERS.iter().enumerate() {
            let stage = index as i32 + 1;
            approvers.set_default("contract", stage, *approver);
            approvers.set_escalation_target("contract", stage, format!("deputy.stage{stage}"));
        }

        let engine = Arc::new(ApprovalEngine::new(
            store.clone(),
            Arc::new(config_store),
            documents.clone(),
            approvers.clone(),
            Arc::new(LoggingNotificationDispatcher),
        ));

        Self {
            engine,
            store,
            documents,
            approvers,
        }
    }

    /// Register a fresh document and return its id
    pub fn register_document(&self) -> Uuid {
        let document_id = Uuid::new_v4();
        self.documents.register(document_id);
        document_id
    }
}
