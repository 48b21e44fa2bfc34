use std::collections::HashSet;
use std::time::Duration;

use publisher_core::enhancement::EnhancementError;
use publisher_core::state_machine::{StepName, TaskStatus};
use publisher_core::webhooks::{TransportError, WebhookEventType, WebhookSigner};

use crate::common::{marketplace, test_config, Harness, MARKETPLACE_ID, WEBHOOK_SECRET, WEBHOOK_URL};

/// Let spawned best-effort deliveries run
async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

fn delivered_events(harness: &Harness) -> Vec<String> {
    harness
        .webhooks
        .payloads()
        .iter()
        .filter_map(|p| p["event"].as_str().map(str::to_string))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_completion_payload_is_signed() {
    let harness = Harness::new();
    let task = harness.publish().await;

    let deliveries = harness.webhooks.deliveries();
    assert_eq!(deliveries.len(), 1);
    let (url, signed) = &deliveries[0];
    assert_eq!(url, WEBHOOK_URL);

    let signature = signed.signature.as_deref().expect("signed with secret");
    assert!(signature.starts_with("sha256="));
    let receiver = WebhookSigner::new(Some(WEBHOOK_SECRET.to_string()));
    assert!(receiver.verify(signed.body.as_bytes(), signature));
    let impostor = WebhookSigner::new(Some("other-secret".to_string()));
    assert!(!impostor.verify(signed.body.as_bytes(), signature));

    let payload: serde_json::Value = serde_json::from_str(&signed.body).unwrap();
    assert_eq!(payload["event"], "workflow.completed");
    assert_eq!(payload["task_id"], task.task_id.to_string());
    assert_eq!(payload["product_id"], 123);
    assert_eq!(payload["product_sku"], "SKU-123");
    assert_eq!(payload["marketplace"], "MercadoLibre");
    assert_eq!(payload["marketplace_id"], MARKETPLACE_ID);
    assert_eq!(payload["external_id"], "MLM999");
    assert_eq!(payload["steps_completed"], serde_json::json!(["enhancement", "publication"]));
    assert!(payload["timestamp"].is_string());
}

#[tokio::test(start_paused = true)]
async fn test_payload_timestamp_follows_pipeline_clock() {
    let harness = Harness::new();
    harness.marketplace.push_failure("HTTP_503", "unavailable");

    let task = harness.publish().await;
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.publication_retries, 1);

    let payloads = harness.webhooks.payloads();
    assert_eq!(payloads.len(), 1);
    let stamped = payloads[0]["timestamp"].as_str().expect("timestamp");
    let stamped = chrono::DateTime::parse_from_rfc3339(stamped)
        .unwrap()
        .with_timezone(&chrono::Utc);
    assert_eq!(Some(stamped), task.completed_at);

    let published_at = task.publication_result.expect("publication result").completed_at;
    assert!(published_at - task.started_at >= chrono::Duration::seconds(60));
    assert!(published_at <= stamped);
}

#[tokio::test(start_paused = true)]
async fn test_webhook_retries_then_delivers() {
    let harness = Harness::new();
    harness.webhooks.push_status(500, "receiver down");
    harness.webhooks.push(Err(TransportError::Timeout));

    let task = harness.publish().await;

    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.webhook_retries, 2);
    let webhook = task.webhook_result.expect("webhook result");
    assert!(webhook.success);
    assert_eq!(webhook.attempts, 3);
    assert_eq!(harness.webhooks.deliveries().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_webhook_still_completes_task() {
    let harness = Harness::new();
    for _ in 0..3 {
        harness.webhooks.push_status(500, "receiver down");
    }

    let task = harness.publish().await;

    assert_eq!(task.status, TaskStatus::Completed);
    assert!(task.error_details.is_none());
    assert_eq!(task.progress_percentage(), 100.0);
    assert!(task.steps_completed.contains(&StepName::Webhook));

    let webhook = task.webhook_result.expect("webhook result");
    assert!(!webhook.success);
    assert_eq!(webhook.attempts, 3);
    assert_eq!(webhook.status_code, Some(500));
    assert_eq!(webhook.response_body.as_deref(), Some("receiver down"));
    assert!(webhook.error.is_some());
    assert_eq!(harness.webhooks.deliveries().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_failure_notification_retries_without_reopening_task() {
    let harness = Harness::new();
    harness
        .marketplace
        .push_failure("invalid_category", "Category MLM1051 is not valid for this item");
    for _ in 0..3 {
        harness.webhooks.push(Err(TransportError::Network("connection refused".into())));
    }

    let task = harness.publish().await;

    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.current_step, "Failed during publication");
    assert_eq!(task.steps_completed, vec![StepName::Enhancement]);
    assert_eq!(task.webhook_retries, 3);
    assert_eq!(
        task.error_details.as_ref().map(|d| d.step),
        Some(StepName::Publication)
    );

    let webhook = task.webhook_result.expect("failure notification recorded");
    assert!(!webhook.success);
    assert_eq!(webhook.event, WebhookEventType::ProductPublishFailed);
    assert_eq!(webhook.attempts, 3);

    let payloads = harness.webhooks.payloads();
    assert_eq!(payloads.len(), 3);
    assert_eq!(payloads[0]["error"], "Category MLM1051 is not valid for this item");
    assert_eq!(payloads[0]["error_details"]["error_code"], "invalid_category");
}

#[tokio::test(start_paused = true)]
async fn test_marketplace_webhook_url_overrides_global() {
    let harness = Harness::new();
    let mut record = marketplace(MARKETPLACE_ID, "MercadoLibre", "mercadolibre");
    record.webhook_url = Some("https://hooks.mercadolibre.example.com/events".to_string());
    harness.catalog.upsert_marketplace(record);

    let task = harness.publish().await;

    let deliveries = harness.webhooks.deliveries();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].0, "https://hooks.mercadolibre.example.com/events");
    assert_eq!(
        task.webhook_result.and_then(|w| w.url).as_deref(),
        Some("https://hooks.mercadolibre.example.com/events")
    );
}

#[tokio::test(start_paused = true)]
async fn test_missing_url_skips_delivery() {
    let mut config = test_config();
    config.webhook.url = None;
    let harness = Harness::with_config(config);

    let task = harness.publish().await;

    assert_eq!(task.status, TaskStatus::Completed);
    assert!(harness.webhooks.deliveries().is_empty());
    let webhook = task.webhook_result.expect("webhook result");
    assert!(webhook.success);
    assert!(webhook.skipped);
    assert_eq!(webhook.url, None);
}

#[tokio::test(start_paused = true)]
async fn test_unsigned_without_secret() {
    let mut config = test_config();
    config.webhook.secret = None;
    let harness = Harness::with_config(config);

    harness.publish().await;

    let deliveries = harness.webhooks.deliveries();
    assert_eq!(deliveries.len(), 1);
    assert!(deliveries[0].1.signature.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_intermediate_events_are_best_effort() {
    let mut config = test_config();
    config.webhook.intermediate_events = true;
    let harness = Harness::with_config(config);
    harness.marketplace.push_failure("HTTP_503", "unavailable");

    let task = harness.publish().await;
    settle().await;

    assert_eq!(task.status, TaskStatus::Completed);
    let events: HashSet<String> = delivered_events(&harness).into_iter().collect();
    for expected in [
        "product.enhanced",
        "marketplace.publish.retry",
        "product.published",
        "workflow.completed",
    ] {
        assert!(events.contains(expected), "missing {expected} in {events:?}");
    }

    // only the final notification is recorded
    let webhook = task.webhook_result.expect("webhook result");
    assert_eq!(webhook.event, WebhookEventType::WorkflowCompleted);
    assert_eq!(task.webhook_retries, 0);
}

#[tokio::test(start_paused = true)]
async fn test_intermediate_events_disabled_by_default() {
    let harness = Harness::new();
    harness.marketplace.push_failure("HTTP_503", "unavailable");

    harness.publish().await;
    settle().await;

    assert_eq!(delivered_events(&harness), vec!["workflow.completed".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_max_retries_exceeded_notice_after_exhaustion() {
    let mut config = test_config();
    config.webhook.intermediate_events = true;
    let harness = Harness::with_config(config);
    harness
        .enhancer
        .push(Err(EnhancementError::Rejected("content policy".into())));
    for _ in 0..3 {
        harness.webhooks.push_status(502, "bad gateway");
    }

    let task = harness.publish().await;
    settle().await;

    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(
        task.webhook_result.map(|w| (w.event, w.success)),
        Some((WebhookEventType::ProductEnhancementFailed, false))
    );

    let events = delivered_events(&harness);
    assert_eq!(events.len(), 4);
    assert_eq!(
        events.iter().filter(|e| *e == "product.enhancement_failed").count(),
        3
    );
    assert_eq!(events.last().map(String::as_str), Some("webhook.max_retries_exceeded"));
}
