//! Event payload construction.

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};

use super::events::WebhookEventType;
use crate::models::PublicationTask;

/// Builds `{event, task_id, product_id, product_sku, ..., timestamp}` bodies
#[derive(Debug, Clone)]
pub struct PayloadBuilder {
    fields: Map<String, Value>,
}

impl PayloadBuilder {
    pub fn new(event: WebhookEventType, task: &PublicationTask, timestamp: DateTime<Utc>) -> Self {
        let mut fields = Map::new();
        fields.insert("event".into(), json!(event.as_str()));
        fields.insert("task_id".into(), json!(task.task_id));
        fields.insert("product_id".into(), json!(task.product_id));
        fields.insert("product_sku".into(), json!(task.product_sku));
        fields.insert("marketplace".into(), json!(task.marketplace_name));
        fields.insert("marketplace_id".into(), json!(task.marketplace_id));
        fields.insert("status".into(), json!(task.status));
        fields.insert("progress_percentage".into(), json!(task.progress_percentage()));
        fields.insert("timestamp".into(), json!(timestamp.to_rfc3339()));
        Self { fields }
    }

    pub fn field(mut self, key: &str, value: Value) -> Self {
        self.fields.insert(key.to_string(), value);
        self
    }

    pub fn build(self) -> Value {
        Value::Object(self.fields)
    }
}

/// Payload for an event, with the step-specific fields taken from the task
pub fn task_event_payload(event: WebhookEventType, task: &PublicationTask, now: DateTime<Utc>) -> Value {
    let builder = PayloadBuilder::new(event, task, now);

    match event {
        WebhookEventType::ProductEnhanced => match &task.enhancement_result {
            Some(result) => builder
                .field("keywords", json!(result.keywords))
                .field("enhanced_description", json!(result.enhanced_description)),
            None => builder,
        },
        WebhookEventType::ProductPublished => match &task.publication_result {
            Some(result) => builder
                .field("external_id", json!(result.external_id))
                .field("listing_url", json!(result.listing_url))
                .field("publish_details", result.details.clone()),
            None => builder,
        },
        WebhookEventType::WorkflowCompleted => {
            let builder = builder.field("steps_completed", json!(task.steps_completed));
            match &task.publication_result {
                Some(result) => builder
                    .field("external_id", json!(result.external_id))
                    .field("listing_url", json!(result.listing_url)),
                None => builder,
            }
        }
        WebhookEventType::ProductEnhancementFailed
        | WebhookEventType::ProductPublishFailed
        | WebhookEventType::WorkflowError => match &task.error_details {
            Some(details) => builder
                .field("error", json!(details.error))
                .field("error_details", json!(details)),
            None => builder,
        },
        WebhookEventType::MarketplacePublishRetry | WebhookEventType::WebhookMaxRetriesExceeded => {
            builder
        }
    }
    .build()
}
