use serde_json::json;
use std::time::Duration;

use publisher_core::database::TaskStore;
use publisher_core::enhancement::EnhancementError;
use publisher_core::models::StepClaim;
use publisher_core::orchestration::WorkItem;
use publisher_core::state_machine::{AdvanceOutcome, SkipReason, StepName, TaskStatus};
use publisher_core::webhooks::WebhookEventType;
use publisher_core::PublisherError;

use crate::common::{marketplace, Harness, MARKETPLACE_ID, PRODUCT_ID};

#[tokio::test(start_paused = true)]
async fn test_happy_path_completes_all_steps() {
    let harness = Harness::new();
    let task = harness.publish().await;

    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(
        task.steps_completed,
        vec![
            StepName::Enhancement,
            StepName::Publication,
            StepName::Webhook,
            StepName::Finalize
        ]
    );
    assert_eq!(task.progress_percentage(), 100.0);
    assert_eq!(task.current_step, "Publication completed");
    assert!(task.completed_at.is_some());
    assert!(task.error_details.is_none());
    assert!(task.active_attempt.is_none());
    assert_eq!(
        (task.enhancement_retries, task.publication_retries, task.webhook_retries),
        (0, 0, 0)
    );

    let enhancement = task.enhancement_result.expect("enhancement result");
    assert!(enhancement.success);
    assert_eq!(enhancement.keywords, vec!["wireless", "headphones", "bluetooth"]);

    let publication = task.publication_result.expect("publication result");
    assert_eq!(publication.external_id, "MLM999");
    assert_eq!(publication.marketplace_slug, "mercadolibre");

    let webhook = task.webhook_result.expect("webhook result");
    assert!(webhook.success);
    assert_eq!(webhook.event, WebhookEventType::WorkflowCompleted);
    assert_eq!(webhook.attempts, 1);
    assert_eq!(webhook.status_code, Some(200));
}

#[tokio::test(start_paused = true)]
async fn test_publisher_receives_enhanced_content() {
    let harness = Harness::new();
    harness.publish().await;

    let requests = harness.marketplace.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.url, "https://api.mercadolibre.example.com/items");
    assert_eq!(request.bearer_token.as_deref(), Some("token-123"));
    assert_eq!(
        request.body["description"]["plain_text"],
        "Immersive wireless sound with all-day comfort"
    );
    assert_eq!(request.body["tags"], json!(["wireless", "headphones", "bluetooth"]));
}

#[tokio::test(start_paused = true)]
async fn test_permanent_marketplace_error_fails_without_retry() {
    let harness = Harness::new();
    harness
        .marketplace
        .push_failure("invalid_category", "Category MLM1051 is not valid for this item");

    let task = harness.publish().await;

    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.publication_retries, 0);
    assert_eq!(task.steps_completed, vec![StepName::Enhancement]);
    assert!(task.completed_at.is_some());

    let details = task.error_details.expect("error details");
    assert_eq!(details.step, StepName::Publication);
    assert_eq!(details.error_code.as_deref(), Some("invalid_category"));
    assert_eq!(details.retries, 0);
    assert!(!details.retries_exhausted);
    assert_eq!(
        details.upstream_response,
        Some(json!({
            "error": "invalid_category",
            "message": "Category MLM1051 is not valid for this item"
        }))
    );

    assert_eq!(harness.marketplace.requests().len(), 1);
    let webhook = task.webhook_result.expect("failure notification recorded");
    assert!(webhook.success);
    assert_eq!(webhook.event, WebhookEventType::ProductPublishFailed);
}

#[tokio::test(start_paused = true)]
async fn test_transient_errors_exhaust_retry_budget() {
    let harness = Harness::new();
    for _ in 0..3 {
        harness
            .marketplace
            .push_failure("HTTP_503", "Service temporarily unavailable");
    }

    let task = harness.publish().await;

    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.publication_retries, 3);
    assert_eq!(harness.marketplace.requests().len(), 3, "no fourth attempt");

    let details = task.error_details.expect("error details");
    assert_eq!(details.step, StepName::Publication);
    assert_eq!(details.retries, 3);
    assert!(details.retries_exhausted);
}

#[tokio::test(start_paused = true)]
async fn test_transient_error_then_success() {
    let harness = Harness::new();
    harness.enhancer.push(Err(EnhancementError::RateLimited("429".into())));
    harness
        .marketplace
        .push_failure("too_many_requests", "Slow down");

    let task = harness.publish().await;

    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.enhancement_retries, 1);
    assert_eq!(task.publication_retries, 1);
    assert_eq!(harness.enhancer.calls(), 2);
    assert_eq!(harness.marketplace.requests().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_malformed_input_fails_enhancement() {
    let harness = Harness::new();
    harness
        .enhancer
        .push(Err(EnhancementError::MalformedInput("title is empty".into())));

    let task = harness.publish().await;

    assert_eq!(task.status, TaskStatus::Failed);
    assert!(task.steps_completed.is_empty());
    assert_eq!(task.progress_percentage(), 0.0);
    assert_eq!(task.error_details.as_ref().map(|d| d.step), Some(StepName::Enhancement));
    assert!(harness.marketplace.requests().is_empty(), "publication never attempted");
    assert_eq!(
        task.webhook_result.map(|w| w.event),
        Some(WebhookEventType::ProductEnhancementFailed)
    );
}

#[tokio::test(start_paused = true)]
async fn test_unsupported_marketplace_fails_before_network() {
    let harness = Harness::new();
    harness.catalog.upsert_marketplace(marketplace(789, "Amazon", "amazon"));

    let created = harness.machine.create(PRODUCT_ID, 789).await.unwrap();
    harness.run_until_idle().await;
    let task = harness.task(created.task_id).await;

    assert_eq!(task.status, TaskStatus::Failed);
    let details = task.error_details.expect("error details");
    assert_eq!(details.error_code.as_deref(), Some("UNSUPPORTED_MARKETPLACE"));
    assert_eq!(details.error, "Unsupported marketplace: amazon");
    assert!(harness.marketplace.requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_active_task_rejected() {
    let harness = Harness::new();
    let first = harness.machine.create(PRODUCT_ID, MARKETPLACE_ID).await.unwrap();

    let err = harness
        .machine
        .create(PRODUCT_ID, MARKETPLACE_ID)
        .await
        .unwrap_err();
    match err {
        PublisherError::DuplicateTask { existing, .. } => assert_eq!(existing, first.task_id),
        other => panic!("expected duplicate task error, got {other:?}"),
    }

    harness.run_until_idle().await;
    let second = harness.machine.create(PRODUCT_ID, MARKETPLACE_ID).await.unwrap();
    assert_ne!(second.task_id, first.task_id, "terminal tasks never block new ones");
    assert_eq!(harness.store.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_create_validates_references() {
    let harness = Harness::new();

    assert!(matches!(
        harness.machine.create(999, MARKETPLACE_ID).await,
        Err(PublisherError::ProductNotFound(999))
    ));
    assert!(matches!(
        harness.machine.create(PRODUCT_ID, 999).await,
        Err(PublisherError::MarketplaceNotFound(999))
    ));

    harness.catalog.set_marketplace_active(MARKETPLACE_ID, false);
    assert!(matches!(
        harness.machine.create(PRODUCT_ID, MARKETPLACE_ID).await,
        Err(PublisherError::UnsupportedMarketplace(ref slug)) if slug == "mercadolibre"
    ));
    assert!(harness.store.is_empty());
    assert!(harness.scheduler.pending().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_advance_on_terminal_task_is_noop() {
    let harness = Harness::new();
    let task = harness.publish().await;

    let outcome = harness.machine.advance(task.task_id).await.unwrap();
    assert_eq!(outcome, AdvanceOutcome::Skipped(SkipReason::Terminal));

    let after = harness.task(task.task_id).await;
    assert_eq!(after.version, task.version);
    assert_eq!(harness.enhancer.calls(), 1);
    assert!(harness.scheduler.pending().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_work_item_is_noop() {
    let harness = Harness::new();
    let created = harness.machine.create(PRODUCT_ID, MARKETPLACE_ID).await.unwrap();
    let item = WorkItem::Advance {
        task_id: created.task_id,
        expected: TaskStatus::Pending,
    };

    let first = harness.machine.dispatch(item).await.unwrap();
    assert_eq!(
        first,
        AdvanceOutcome::Advanced {
            from: TaskStatus::Enhancing,
            to: TaskStatus::Enhanced
        }
    );

    let version = harness.task(created.task_id).await.version;
    let second = harness.machine.dispatch(item).await.unwrap();
    assert_eq!(second, AdvanceOutcome::Skipped(SkipReason::StatusMismatch));
    assert_eq!(harness.task(created.task_id).await.version, version);
    assert_eq!(harness.enhancer.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_advance_during_backoff_is_noop() {
    let harness = Harness::new();
    harness.marketplace.push_failure("HTTP_503", "unavailable");
    let created = harness.machine.create(PRODUCT_ID, MARKETPLACE_ID).await.unwrap();

    // enhancement, then the failing publication attempt
    for _ in 0..2 {
        for (item, _) in harness.scheduler.take() {
            harness.machine.dispatch(item).await.unwrap();
        }
    }

    let task = harness.task(created.task_id).await;
    assert_eq!(task.status, TaskStatus::Publishing);
    assert_eq!(task.publication_retries, 1);
    assert!(task.next_attempt_at.is_some());
    assert!(task.current_step.starts_with("Retrying publication in 60s"));

    let outcome = harness.machine.advance(created.task_id).await.unwrap();
    assert_eq!(outcome, AdvanceOutcome::Skipped(SkipReason::BackingOff));
    assert_eq!(harness.marketplace.requests().len(), 1);

    let scheduled = harness.scheduler.pending();
    assert_eq!(scheduled.len(), 1);
    assert_eq!(scheduled[0].1, Duration::from_secs(60));

    harness.run_until_idle().await;
    let task = harness.task(created.task_id).await;
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.publication_retries, 1);
}

#[tokio::test(start_paused = true)]
async fn test_live_claim_blocks_and_stale_claim_is_taken_over() {
    let harness = Harness::new();
    let created = harness.machine.create(PRODUCT_ID, MARKETPLACE_ID).await.unwrap();
    harness.scheduler.take();

    let mut claimed = harness.task(created.task_id).await;
    claimed.active_attempt = Some(StepClaim {
        step: StepName::Enhancement,
        attempt: 1,
        claimed_at: harness.machine.clock().now(),
    });
    harness
        .store
        .compare_and_swap(claimed.version, &claimed)
        .await
        .unwrap();

    let outcome = harness.machine.advance(created.task_id).await.unwrap();
    assert_eq!(outcome, AdvanceOutcome::Skipped(SkipReason::InFlight));
    assert_eq!(harness.enhancer.calls(), 0);

    tokio::time::advance(Duration::from_secs(
        harness.config.execution.claim_lease_seconds + 1,
    ))
    .await;

    let outcome = harness.machine.advance(created.task_id).await.unwrap();
    assert!(matches!(
        outcome,
        AdvanceOutcome::Advanced {
            to: TaskStatus::Enhanced,
            ..
        }
    ));
    assert_eq!(harness.enhancer.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_resume_continues_interrupted_tasks() {
    let harness = Harness::new();
    let created = harness.machine.create(PRODUCT_ID, MARKETPLACE_ID).await.unwrap();
    // the scheduled item is lost, as in a restart
    harness.scheduler.take();

    let results = harness.machine.resume([created.task_id]).await;
    assert_eq!(results.len(), 1);
    assert!(matches!(results[0].1, Ok(AdvanceOutcome::Advanced { .. })));

    harness.run_until_idle().await;
    assert_eq!(harness.task(created.task_id).await.status, TaskStatus::Completed);
}

#[tokio::test(start_paused = true)]
async fn test_lifecycle_events_follow_transitions() {
    let harness = Harness::new();
    let mut receiver = harness.events.subscribe();
    let task = harness.publish().await;

    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }

    let names: Vec<&str> = events.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names.first(), Some(&"task.created"));
    assert_eq!(names.last(), Some(&"task.completed"));
    assert_eq!(names.iter().filter(|n| **n == "task.transitioned").count(), 5);
    assert!(events.iter().all(|e| e.task_id == task.task_id));

    let progress: Vec<f64> = events
        .iter()
        .filter_map(|e| e.context.get("progress_percentage").and_then(|p| p.as_f64()))
        .collect();
    assert!(progress.windows(2).all(|w| w[0] <= w[1]), "progress never decreases");
    assert_eq!(progress.last(), Some(&100.0));
}
