//! Closed set of webhook event types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WebhookEventType {
    #[serde(rename = "product.enhanced")]
    ProductEnhanced,
    #[serde(rename = "product.enhancement_failed")]
    ProductEnhancementFailed,
    #[serde(rename = "product.published")]
    ProductPublished,
    #[serde(rename = "product.publish_failed")]
    ProductPublishFailed,
    #[serde(rename = "workflow.completed")]
    WorkflowCompleted,
    #[serde(rename = "workflow.error")]
    WorkflowError,
    #[serde(rename = "marketplace.publish.retry")]
    MarketplacePublishRetry,
    #[serde(rename = "webhook.max_retries_exceeded")]
    WebhookMaxRetriesExceeded,
}

impl WebhookEventType {
    pub const ALL: [WebhookEventType; 8] = [
        Self::ProductEnhanced,
        Self::ProductEnhancementFailed,
        Self::ProductPublished,
        Self::ProductPublishFailed,
        Self::WorkflowCompleted,
        Self::WorkflowError,
        Self::MarketplacePublishRetry,
        Self::WebhookMaxRetriesExceeded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProductEnhanced => "product.enhanced",
            Self::ProductEnhancementFailed => "product.enhancement_failed",
            Self::ProductPublished => "product.published",
            Self::ProductPublishFailed => "product.publish_failed",
            Self::WorkflowCompleted => "workflow.completed",
            Self::WorkflowError => "workflow.error",
            Self::MarketplacePublishRetry => "marketplace.publish.retry",
            Self::WebhookMaxRetriesExceeded => "webhook.max_retries_exceeded",
        }
    }

    /// Events that describe a task's terminal outcome
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            Self::WorkflowCompleted
                | Self::WorkflowError
                | Self::ProductEnhancementFailed
                | Self::ProductPublishFailed
        )
    }
}

impl fmt::Display for WebhookEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WebhookEventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|event| event.as_str() == s)
            .ok_or_else(|| format!("Unknown webhook event: {s}"))
    }
}
