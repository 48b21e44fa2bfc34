//! Event notification assembly and delivery.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::events::WebhookEventType;
use super::payload::task_event_payload;
use super::signing::WebhookSigner;
use super::transport::{WebhookResponse, WebhookTransport};
use crate::config::WebhookConfig;
use crate::models::PublicationTask;

/// An event ready to be signed and posted
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookNotification {
    pub event: WebhookEventType,
    /// `None` when neither the marketplace nor the global config names a target
    pub url: Option<String>,
    pub payload: Value,
}

/// Result of a single delivery attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered(WebhookResponse),
    /// Receiver answered with a non-2xx status
    Rejected(WebhookResponse),
    /// No response at all
    Failed(String),
    /// No target URL configured
    Skipped,
}

impl DeliveryOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Delivered(_) | Self::Skipped)
    }
}

/// Builds signed notifications per task transition and posts them
#[derive(Clone)]
pub struct WebhookDispatcher {
    transport: Arc<dyn WebhookTransport>,
    signer: WebhookSigner,
    global_url: Option<String>,
    response_body_limit: usize,
    intermediate_events: bool,
    timeout: Duration,
}

impl std::fmt::Debug for WebhookDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookDispatcher")
            .field("global_url", &self.global_url)
            .field("signer", &self.signer)
            .field("intermediate_events", &self.intermediate_events)
            .finish()
    }
}

fn truncate(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

impl WebhookDispatcher {
    pub fn new(transport: Arc<dyn WebhookTransport>, config: &WebhookConfig, timeout: Duration) -> Self {
        Self {
            transport,
            signer: WebhookSigner::new(config.secret.clone()),
            global_url: config.url.clone().filter(|url| !url.is_empty()),
            response_body_limit: config.response_body_limit,
            intermediate_events: config.intermediate_events,
            timeout,
        }
    }

    pub fn signer(&self) -> &WebhookSigner {
        &self.signer
    }

    pub fn intermediate_events_enabled(&self) -> bool {
        self.intermediate_events
    }

    /// Marketplace-specific URL first, then the global one
    pub fn resolve_url(&self, marketplace_url: Option<&str>) -> Option<String> {
        marketplace_url
            .filter(|url| !url.is_empty())
            .map(str::to_string)
            .or_else(|| self.global_url.clone())
    }

    pub fn notification(
        &self,
        event: WebhookEventType,
        task: &PublicationTask,
        marketplace_url: Option<&str>,
        timestamp: DateTime<Utc>,
    ) -> WebhookNotification {
        WebhookNotification {
            event,
            url: self.resolve_url(marketplace_url),
            payload: task_event_payload(event, task, timestamp),
        }
    }

    /// Sign and post once, with the response body truncated
    pub async fn send(&self, notification: &WebhookNotification) -> DeliveryOutcome {
        let Some(url) = notification.url.as_deref() else {
            debug!(event = %notification.event, "No webhook URL configured, skipping");
            return DeliveryOutcome::Skipped;
        };

        let signed = self.signer.sign(&notification.payload);
        match self.transport.deliver(url, &signed).await {
            Ok(response) => {
                let response = WebhookResponse {
                    status_code: response.status_code,
                    body: truncate(&response.body, self.response_body_limit),
                };
                if response.is_success() {
                    DeliveryOutcome::Delivered(response)
                } else {
                    DeliveryOutcome::Rejected(response)
                }
            }
            Err(e) => DeliveryOutcome::Failed(truncate(&e.to_string(), self.response_body_limit)),
        }
    }

    /// Single best-effort attempt on a background task; never recorded
    pub fn fire_and_forget(&self, notification: WebhookNotification) {
        let dispatcher = self.clone();
        tokio::spawn(async move {
            let event = notification.event;
            match tokio::time::timeout(dispatcher.timeout, dispatcher.send(&notification)).await {
                Ok(outcome) if outcome.is_success() => {
                    debug!(event = %event, "Best-effort webhook delivered");
                }
                Ok(outcome) => warn!(event = %event, ?outcome, "Best-effort webhook not delivered"),
                Err(_) => warn!(event = %event, "Best-effort webhook timed out"),
            }
        });
    }
}
