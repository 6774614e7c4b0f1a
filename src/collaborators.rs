//! Injected external capabilities.
//!
//! The engine never implements document storage, the approver directory, or
//! notification delivery; it consumes them through these traits. The in-crate
//! defaults back the test suites and local development.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::Result;

/// Document-existence check against the owning application
#[async_trait]
pub trait DocumentDirectory: Send + Sync {
    async fn exists(&self, document_id: Uuid) -> Result<bool>;
}

/// Role/stage-based approver resolution, including escalation targets
#[async_trait]
pub trait ApproverDirectory: Send + Sync {
    /// Default approver for a document type's stage
    async fn resolve_default(&self, document_type: &str, stage: i32) -> Result<Option<String>>;

    /// Escalation target for a stage at the given escalation level
    async fn resolve_escalation_target(
        &self,
        document_type: &str,
        stage: i32,
        level: i32,
    ) -> Result<Option<String>>;
}

/// Workflow events the notification collaborator is told about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationEvent {
    Assigned,
    Approved,
    Rejected,
    Escalated,
    Cancelled,
}

/// Notification trigger sink. Only the triggering conditions are in scope;
/// delivery mechanics belong to the collaborator. Dispatch failures are
/// logged by callers, never propagated.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn dispatch(
        &self,
        workflow_id: Uuid,
        approver_id: &str,
        event: NotificationEvent,
    ) -> Result<()>;
}

/// Registry-backed document directory for tests and local development
#[derive(Default)]
pub struct StaticDocumentDirectory {
    documents: RwLock<HashSet<Uuid>>,
}

impl StaticDocumentDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, document_id: Uuid) {
        self.documents.write().insert(document_id);
    }
}

#[async_trait]
impl DocumentDirectory for StaticDocumentDirectory {
    async fn exists(&self, document_id: Uuid) -> Result<bool> {
        Ok(self.documents.read().contains(&document_id))
    }
}

/// Map-backed approver directory keyed by (document type, stage)
#[derive(Default)]
pub struct StaticApproverDirectory {
    defaults: RwLock<HashMap<(String, i32), String>>,
    escalation: RwLock<HashMap<(String, i32), String>>,
}

impl StaticApproverDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_default(
        &self,
        document_type: impl Into<String>,
        stage: i32,
        approver: impl Into<String>,
    ) {
        self.defaults
            .write()
            .insert((document_type.into(), stage), approver.into());
    }

    pub fn set_escalation_target(
        &self,
        document_type: impl Into<String>,
        stage: i32,
        approver: impl Into<String>,
    ) {
        self.escalation
            .write()
            .insert((document_type.into(), stage), approver.into());
    }
}

#[async_trait]
impl ApproverDirectory for StaticApproverDirectory {
    async fn resolve_default(&self, document_type: &str, stage: i32) -> Result<Option<String>> {
        Ok(self
            .defaults
            .read()
            .get(&(document_type.to_string(), stage))
            .cloned())
    }

    async fn resolve_escalation_target(
        &self,
        document_type: &str,
        stage: i32,
        level: i32,
    ) -> Result<Option<String>> {
        let target = self
            .escalation
            .read()
            .get(&(document_type.to_string(), stage))
            .cloned();
        if target.is_none() {
            warn!(document_type, stage, level, "no escalation target configured");
        }
        Ok(target)
    }
}

/// Tracing-backed dispatcher; the production deployment injects a real one
#[derive(Default)]
pub struct LoggingNotificationDispatcher;

#[async_trait]
impl NotificationDispatcher for LoggingNotificationDispatcher {
    async fn dispatch(
        &self,
        workflow_id: Uuid,
        approver_id: &str,
        event: NotificationEvent,
    ) -> Result<()> {
        info!(
            workflow_id = %workflow_id,
            approver_id,
            event = ?event,
            "notification dispatched"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_document_directory() {
        let directory = StaticDocumentDirectory::new();
        let id = Uuid::new_v4();
        assert!(!directory.exists(id).await.unwrap());
        directory.register(id);
        assert!(directory.exists(id).await.unwrap());
    }

    #[tokio::test]
    async fn test_static_approver_directory_resolution() {
        let directory = StaticApproverDirectory::new();
        directory.set_default("contract", 1, "alice");
        directory.set_escalation_target("contract", 1, "deputy-director");

        assert_eq!(
            directory.resolve_default("contract", 1).await.unwrap(),
            Some("alice".to_string())
        );
        assert_eq!(directory.resolve_default("contract", 2).await.unwrap(), None);
        assert_eq!(
            directory
                .resolve_escalation_target("contract", 1, 1)
                .await
                .unwrap(),
            Some("deputy-director".to_string())
        );
    }
}
