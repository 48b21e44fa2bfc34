//! Per-step result records and failure details stored on a task.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state_machine::StepName;
use crate::webhooks::WebhookEventType;

/// Output of the content enhancement step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancementResult {
    pub success: bool,
    pub enhanced_description: String,
    pub keywords: Vec<String>,
    pub completed_at: DateTime<Utc>,
}

/// Output of the marketplace submission step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicationResult {
    pub success: bool,
    pub external_id: String,
    pub listing_url: Option<String>,
    pub marketplace_slug: String,
    #[serde(default)]
    pub details: serde_json::Value,
    pub completed_at: DateTime<Utc>,
}

/// Outcome of a webhook notification, successful or not
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookResult {
    pub success: bool,
    pub event: WebhookEventType,
    pub url: Option<String>,
    pub status_code: Option<u16>,
    pub response_body: Option<String>,
    /// Total delivery attempts made, including the final one
    pub attempts: u32,
    /// No target URL was configured, nothing was sent
    #[serde(default)]
    pub skipped: bool,
    pub error: Option<String>,
    pub finished_at: DateTime<Utc>,
}

/// Structured failure record, present only on `failed` tasks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub step: StepName,
    pub error: String,
    pub error_code: Option<String>,
    /// Raw upstream payload kept verbatim for operators
    pub upstream_response: Option<serde_json::Value>,
    /// Step retry counter at the time of failure
    pub retries: u32,
    /// The failure came from exhausting retries rather than a permanent error
    pub retries_exhausted: bool,
    pub failed_at: DateTime<Utc>,
}
