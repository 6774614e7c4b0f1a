//! Approval queue listing: filters, sort keys, pagination, statistics.

mod common;

use chrono::{Duration, Utc};
use uuid::Uuid;

use common::TestHarness;
use docflow_core::engine::{InitiateRequest, QueueQuery, QueueSortKey};
use docflow_core::error::EngineError;
use docflow_core::state_machine::PriorityLevel;

async fn seed_workflow(
    harness: &TestHarness,
    priority: PriorityLevel,
    sla_hours: i64,
) -> Uuid {
    let document_id = harness.register_document();
    harness
        .engine
        .initiate_workflow(
            document_id,
            InitiateRequest {
                document_type: "contract".to_string(),
                priority: Some(priority),
                custom_sla_hours: Some(sla_hours),
                ..InitiateRequest::default()
            },
        )
        .await
        .unwrap()
        .workflow_id
}

fn approver_query() -> QueueQuery {
    QueueQuery {
        approver_id: Some("casey.intake".to_string()),
        ..QueueQuery::default()
    }
}

#[tokio::test]
async fn test_approver_is_required_unless_admin() {
    let harness = TestHarness::new();

    let err = harness
        .engine
        .approval_queue(QueueQuery::default())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    let page = harness
        .engine
        .approval_queue(QueueQuery {
            is_admin: true,
            ..QueueQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(page.statistics.total, 0);
}

#[tokio::test]
async fn test_queue_scoped_to_approver() {
    let harness = TestHarness::new();
    seed_workflow(&harness, PriorityLevel::Normal, 24).await;

    // Another approver holds nothing.
    let page = harness
        .engine
        .approval_queue(QueueQuery {
            approver_id: Some("priya.compliance".to_string()),
            ..QueueQuery::default()
        })
        .await
        .unwrap();
    assert!(page.items.is_empty());

    let page = harness.engine.approval_queue(approver_query()).await.unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].approver_id, "casey.intake");
    assert_eq!(page.items[0].stage_number, 1);
}

#[tokio::test]
async fn test_priority_sort_order() {
    let harness = TestHarness::new();
    // Seeded out of order on purpose; same SLA so priority decides alone.
    for priority in [
        PriorityLevel::Normal,
        PriorityLevel::Critical,
        PriorityLevel::Low,
        PriorityLevel::Urgent,
        PriorityLevel::High,
    ] {
        seed_workflow(&harness, priority, 24).await;
    }

    let page = harness
        .engine
        .approval_queue(QueueQuery {
            sort_by: QueueSortKey::Priority,
            ..approver_query()
        })
        .await
        .unwrap();

    let priorities: Vec<PriorityLevel> = page.items.iter().map(|i| i.priority).collect();
    assert_eq!(
        priorities,
        vec![
            PriorityLevel::Critical,
            PriorityLevel::Urgent,
            PriorityLevel::High,
            PriorityLevel::Normal,
            PriorityLevel::Low,
        ]
    );
}

#[tokio::test]
async fn test_priority_ties_break_on_due_date() {
    let harness = TestHarness::new();
    let later = seed_workflow(&harness, PriorityLevel::High, 48).await;
    let sooner = seed_workflow(&harness, PriorityLevel::High, 6).await;

    let page = harness
        .engine
        .approval_queue(QueueQuery {
            sort_by: QueueSortKey::Priority,
            ..approver_query()
        })
        .await
        .unwrap();

    assert_eq!(page.items[0].workflow_id, sooner);
    assert_eq!(page.items[1].workflow_id, later);
}

#[tokio::test]
async fn test_default_sort_is_due_date_ascending() {
    let harness = TestHarness::new();
    seed_workflow(&harness, PriorityLevel::Low, 72).await;
    seed_workflow(&harness, PriorityLevel::Low, 2).await;
    seed_workflow(&harness, PriorityLevel::Low, 24).await;

    let page = harness.engine.approval_queue(approver_query()).await.unwrap();
    let due_dates: Vec<_> = page.items.iter().map(|i| i.sla_due_date).collect();
    let mut sorted = due_dates.clone();
    sorted.sort();
    assert_eq!(due_dates, sorted);
}

#[tokio::test]
async fn test_overdue_and_priority_filters() {
    let harness = TestHarness::new();
    let overdue_id = seed_workflow(&harness, PriorityLevel::High, 24).await;
    seed_workflow(&harness, PriorityLevel::Normal, 24).await;
    harness
        .store
        .backdate_sla(overdue_id, Utc::now() - Duration::hours(3));

    let page = harness
        .engine
        .approval_queue(QueueQuery {
            overdue_only: true,
            ..approver_query()
        })
        .await
        .unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].workflow_id, overdue_id);
    assert!(page.items[0].is_overdue);

    let page = harness
        .engine
        .approval_queue(QueueQuery {
            priority: Some(PriorityLevel::Normal),
            ..approver_query()
        })
        .await
        .unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].priority, PriorityLevel::Normal);
}

#[tokio::test]
async fn test_document_type_filter() {
    let harness = TestHarness::new();
    seed_workflow(&harness, PriorityLevel::Normal, 24).await;

    harness
        .approvers
        .set_default("insurance_certificate", 1, "casey.intake");
    let document_id = harness.register_document();
    harness
        .engine
        .initiate_workflow(
            document_id,
            InitiateRequest {
                document_type: "insurance_certificate".to_string(),
                ..InitiateRequest::default()
            },
        )
        .await
        .unwrap();

    let page = harness
        .engine
        .approval_queue(QueueQuery {
            document_type: Some("insurance_certificate".to_string()),
            ..approver_query()
        })
        .await
        .unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].document_type, "insurance_certificate");
}

#[tokio::test]
async fn test_statistics_cover_full_filtered_set() {
    let harness = TestHarness::new();
    let overdue_id = seed_workflow(&harness, PriorityLevel::Critical, 24).await;
    seed_workflow(&harness, PriorityLevel::Critical, 1).await; // urgent window
    seed_workflow(&harness, PriorityLevel::Normal, 240).await;
    harness
        .store
        .backdate_sla(overdue_id, Utc::now() - Duration::hours(2));

    // A one-item page still reports aggregates for all three.
    let page = harness
        .engine
        .approval_queue(QueueQuery {
            limit: Some(1),
            ..approver_query()
        })
        .await
        .unwrap();

    assert_eq!(page.items.len(), 1);
    assert_eq!(page.statistics.total, 3);
    assert_eq!(page.statistics.overdue, 1);
    assert_eq!(page.statistics.urgent, 2);
    assert_eq!(page.statistics.by_priority.get("critical"), Some(&2));
    assert_eq!(page.statistics.by_priority.get("normal"), Some(&1));
    assert_eq!(page.statistics.by_stage.get(&1), Some(&3));
}

#[tokio::test]
async fn test_pagination_window_and_has_more() {
    let harness = TestHarness::new();
    for hours in [10, 20, 30, 40, 50] {
        seed_workflow(&harness, PriorityLevel::Normal, hours).await;
    }

    let first = harness
        .engine
        .approval_queue(QueueQuery {
            limit: Some(2),
            ..approver_query()
        })
        .await
        .unwrap();
    assert_eq!(first.items.len(), 2);
    assert_eq!(first.pagination.total, 5);
    assert!(first.pagination.has_more);

    let last = harness
        .engine
        .approval_queue(QueueQuery {
            limit: Some(2),
            offset: 4,
            ..approver_query()
        })
        .await
        .unwrap();
    assert_eq!(last.items.len(), 1);
    assert!(!last.pagination.has_more);

    // Pages never overlap.
    assert!(first
        .items
        .iter()
        .all(|i| last.items.iter().all(|j| i.queue_item_id != j.queue_item_id)));
}

#[tokio::test]
async fn test_admin_view_spans_all_approvers() {
    let harness = TestHarness::new();
    let workflow_id = seed_workflow(&harness, PriorityLevel::Normal, 24).await;
    // Advance one workflow so a second approver holds an item.
    harness
        .engine
        .process_approval(
            workflow_id,
            "casey.intake",
            docflow_core::engine::DecisionRequest::approve(),
        )
        .await
        .unwrap();
    seed_workflow(&harness, PriorityLevel::Normal, 24).await;

    let page = harness
        .engine
        .approval_queue(QueueQuery {
            is_admin: true,
            ..QueueQuery::default()
        })
        .await
        .unwrap();

    assert_eq!(page.items.len(), 2);
    let approvers: Vec<&str> = page.items.iter().map(|i| i.approver_id.as_str()).collect();
    assert!(approvers.contains(&"casey.intake"));
    assert!(approvers.contains(&"priya.compliance"));
}
