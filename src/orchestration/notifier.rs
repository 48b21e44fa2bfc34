//! Notification step: deliver one recorded webhook attempt.
//!
//! Delivery problems are always retryable here. The state machine turns an
//! exhausted budget into a recorded failure instead of a failed task.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

use super::outcome::{StepError, StepOutcome};
use super::step_executor::{with_timeout, StepExecutor};
use crate::state_machine::StepName;
use crate::webhooks::{DeliveryOutcome, WebhookDispatcher, WebhookNotification};

/// What the receiver said about a delivered (or skipped) notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub url: Option<String>,
    pub status_code: Option<u16>,
    pub response_body: Option<String>,
    pub skipped: bool,
}

pub struct NotifierExecutor {
    dispatcher: WebhookDispatcher,
    timeout: Duration,
}

impl NotifierExecutor {
    pub fn new(dispatcher: WebhookDispatcher, timeout: Duration) -> Self {
        Self { dispatcher, timeout }
    }

    pub fn dispatcher(&self) -> &WebhookDispatcher {
        &self.dispatcher
    }
}

#[async_trait]
impl StepExecutor for NotifierExecutor {
    type Context = WebhookNotification;
    type Output = DeliveryReceipt;

    fn step(&self) -> StepName {
        StepName::Webhook
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn execute(&self, notification: &WebhookNotification) -> StepOutcome<DeliveryReceipt> {
        with_timeout(self.step(), self.timeout, async {
            match self.dispatcher.send(notification).await {
                DeliveryOutcome::Delivered(response) => StepOutcome::Success(DeliveryReceipt {
                    url: notification.url.clone(),
                    status_code: Some(response.status_code),
                    response_body: Some(response.body),
                    skipped: false,
                }),
                DeliveryOutcome::Skipped => StepOutcome::Success(DeliveryReceipt {
                    url: None,
                    status_code: None,
                    response_body: None,
                    skipped: true,
                }),
                DeliveryOutcome::Rejected(response) => StepOutcome::Retryable(
                    StepError::new(format!("Webhook receiver answered HTTP {}", response.status_code))
                        .with_code(format!("HTTP_{}", response.status_code))
                        .with_upstream(json!({
                            "status_code": response.status_code,
                            "body": response.body,
                        })),
                ),
                DeliveryOutcome::Failed(message) => StepOutcome::Retryable(
                    StepError::new(message.clone())
                        .with_code("NETWORK_ERROR")
                        .with_upstream(json!({ "status_code": null, "body": message })),
                ),
            }
        })
        .await
    }
}
