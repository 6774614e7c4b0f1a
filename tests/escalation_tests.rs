//! Escalation sweeper: breach detection, threshold arithmetic, reassignment,
//! idempotence, and per-workflow failure isolation.

mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use common::TestHarness;
use docflow_core::collaborators::LoggingNotificationDispatcher;
use docflow_core::engine::{ApprovalEngine, DecisionRequest, InitiateRequest};
use docflow_core::models::{StageConfigStore, StageConfiguration};
use docflow_core::state_machine::{HistoryAction, QueueItemStatus, WorkflowStatus};

async fn overdue_contract(harness: &TestHarness, overdue_hours: i64) -> Uuid {
    let document_id = harness.register_document();
    let workflow_id = harness
        .engine
        .initiate_workflow(
            document_id,
            InitiateRequest {
                document_type: "contract".to_string(),
                ..InitiateRequest::default()
            },
        )
        .await
        .unwrap()
        .workflow_id;
    harness
        .store
        .backdate_sla(workflow_id, Utc::now() - Duration::hours(overdue_hours));
    workflow_id
}

#[tokio::test]
async fn test_breached_workflow_escalates_and_reassigns() {
    let harness = TestHarness::new();
    let workflow_id = overdue_contract(&harness, 1).await;

    let report = harness.engine.escalate_overdue_approvals().await.unwrap();

    assert_eq!(report.escalated_count, 1);
    assert_eq!(report.new_assignments.len(), 1);
    assert_eq!(report.new_assignments[0].workflow_id, workflow_id);
    assert_eq!(report.new_assignments[0].new_approver, "deputy.stage1");
    assert_eq!(
        report.new_assignments[0].previous_approver.as_deref(),
        Some("casey.intake")
    );
    assert_eq!(report.notified_approvers, vec!["deputy.stage1".to_string()]);

    let view = harness
        .engine
        .workflow_status(workflow_id, true)
        .await
        .unwrap();
    assert!(view.workflow.is_overdue);
    assert_eq!(view.workflow.escalation_level, 1);
    assert_eq!(view.workflow.status, WorkflowStatus::Escalated);
    assert_eq!(view.workflow.current_approver.as_deref(), Some("deputy.stage1"));

    let escalate_entry = view
        .history
        .unwrap()
        .into_iter()
        .find(|h| h.action == HistoryAction::Escalate)
        .unwrap();
    assert_eq!(escalate_entry.actor_id, "system");
    assert!(!escalate_entry.within_sla);

    // Old claim superseded, new one pending for the deputy.
    let items = harness.store.queue_items_for(workflow_id);
    assert!(items
        .iter()
        .any(|i| i.approver_id == "casey.intake" && i.status == QueueItemStatus::Cancelled));
    assert!(items
        .iter()
        .any(|i| i.approver_id == "deputy.stage1" && i.status == QueueItemStatus::Pending));
}

#[tokio::test]
async fn test_sweep_is_idempotent_within_a_threshold() {
    let harness = TestHarness::new();
    let workflow_id = overdue_contract(&harness, 1).await;

    let first = harness.engine.escalate_overdue_approvals().await.unwrap();
    assert_eq!(first.escalated_count, 1);

    // Same breach, same level: re-running must not double-escalate.
    let second = harness.engine.escalate_overdue_approvals().await.unwrap();
    assert_eq!(second.escalated_count, 0);
    assert!(second.new_assignments.is_empty());

    let view = harness
        .engine
        .workflow_status(workflow_id, true)
        .await
        .unwrap();
    assert_eq!(view.workflow.escalation_level, 1);
    let escalations = view
        .history
        .unwrap()
        .iter()
        .filter(|h| h.action == HistoryAction::Escalate)
        .count();
    assert_eq!(escalations, 1);
}

#[tokio::test]
async fn test_next_threshold_escalates_again() {
    let harness = TestHarness::new();
    // Stage 1 of the default set has a 12h escalation threshold.
    let workflow_id = overdue_contract(&harness, 1).await;

    harness.engine.escalate_overdue_approvals().await.unwrap();

    // Push the breach past the second threshold boundary.
    harness
        .store
        .backdate_sla(workflow_id, Utc::now() - Duration::hours(13));
    let report = harness.engine.escalate_overdue_approvals().await.unwrap();
    assert_eq!(report.escalated_count, 1);

    let view = harness
        .engine
        .workflow_status(workflow_id, false)
        .await
        .unwrap();
    assert_eq!(view.workflow.escalation_level, 2);
}

#[tokio::test]
async fn test_escalated_workflow_remains_decidable() {
    let harness = TestHarness::new();
    let workflow_id = overdue_contract(&harness, 1).await;
    harness.engine.escalate_overdue_approvals().await.unwrap();

    let result = harness
        .engine
        .process_approval(workflow_id, "deputy.stage1", DecisionRequest::approve())
        .await
        .unwrap();

    assert_eq!(result.current_stage, 2);
    assert_eq!(result.status, WorkflowStatus::InReview);
}

#[tokio::test]
async fn test_escalation_without_target_still_raises_level() {
    let harness = TestHarness::new();
    // No escalation target configured for insurance certificates.
    harness
        .approvers
        .set_default("insurance_certificate", 1, "casey.intake");
    let document_id = harness.register_document();
    let workflow_id = harness
        .engine
        .initiate_workflow(
            document_id,
            InitiateRequest {
                document_type: "insurance_certificate".to_string(),
                ..InitiateRequest::default()
            },
        )
        .await
        .unwrap()
        .workflow_id;
    harness
        .store
        .backdate_sla(workflow_id, Utc::now() - Duration::hours(1));

    let report = harness.engine.escalate_overdue_approvals().await.unwrap();
    assert_eq!(report.escalated_count, 1);
    assert!(report.new_assignments.is_empty());
    assert!(report.notified_approvers.is_empty());

    // The original approver keeps the claim.
    let items = harness.store.queue_items_for(workflow_id);
    assert!(items
        .iter()
        .any(|i| i.approver_id == "casey.intake" && i.status == QueueItemStatus::Pending));
}

#[tokio::test]
async fn test_terminal_workflows_are_not_swept() {
    let harness = TestHarness::new();
    let workflow_id = overdue_contract(&harness, 1).await;
    harness
        .engine
        .cancel_workflow(workflow_id, "admin.root", "Withdrawn")
        .await
        .unwrap();

    let report = harness.engine.escalate_overdue_approvals().await.unwrap();
    assert_eq!(report.escalated_count, 0);
}

#[tokio::test]
async fn test_one_bad_workflow_does_not_abort_the_sweep() {
    // Seed under a config store that knows the `permit` type...
    let mut config_store = StageConfigStore::with_defaults();
    config_store
        .insert_document_type(
            "permit",
            vec![StageConfiguration::new("permit", 1, "Permit Review", "coordinator", 24)],
        )
        .unwrap();
    let harness = TestHarness::with_config_store(config_store);
    harness.approvers.set_default("permit", 1, "casey.intake");

    let permit_doc = harness.register_document();
    let permit_workflow = harness
        .engine
        .initiate_workflow(
            permit_doc,
            InitiateRequest {
                document_type: "permit".to_string(),
                ..InitiateRequest::default()
            },
        )
        .await
        .unwrap()
        .workflow_id;
    let contract_workflow = overdue_contract(&harness, 1).await;
    harness
        .store
        .backdate_sla(permit_workflow, Utc::now() - Duration::hours(1));

    // ...then sweep with an engine whose configuration lost the type. The
    // permit workflow is skipped and flagged; the contract still escalates.
    let sweeper = ApprovalEngine::new(
        harness.store.clone(),
        Arc::new(StageConfigStore::with_defaults()),
        harness.documents.clone(),
        harness.approvers.clone(),
        Arc::new(LoggingNotificationDispatcher),
    );
    let report = sweeper.escalate_overdue_approvals().await.unwrap();

    assert_eq!(report.escalated_count, 1);
    assert_eq!(report.new_assignments[0].workflow_id, contract_workflow);

    let view = harness
        .engine
        .workflow_status(permit_workflow, false)
        .await
        .unwrap();
    assert_eq!(view.workflow.escalation_level, 0);
}
