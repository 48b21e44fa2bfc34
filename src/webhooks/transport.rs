//! Outbound webhook POST.

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use reqwest::Client;
use std::time::Duration;

use super::signing::SignedPayload;
use crate::constants::webhook::SIGNATURE_HEADER;

/// Whatever the receiver answered, 2xx or not
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookResponse {
    pub status_code: u16,
    pub body: String,
}

impl WebhookResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Webhook request timed out")]
    Timeout,

    #[error("Webhook network error: {0}")]
    Network(String),
}

/// Deliver a signed payload by HTTP POST
#[async_trait]
pub trait WebhookTransport: Send + Sync {
    async fn deliver(&self, url: &str, payload: &SignedPayload) -> Result<WebhookResponse, TransportError>;
}

#[derive(Debug, Clone)]
pub struct HttpWebhookTransport {
    client: Client,
    user_agent: String,
}

impl HttpWebhookTransport {
    pub fn new(timeout: Duration, user_agent: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            user_agent: user_agent.into(),
        })
    }
}

#[async_trait]
impl WebhookTransport for HttpWebhookTransport {
    async fn deliver(&self, url: &str, payload: &SignedPayload) -> Result<WebhookResponse, TransportError> {
        let mut request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .header(USER_AGENT, &self.user_agent)
            .body(payload.body.clone());
        if let Some(signature) = &payload.signature {
            request = request.header(SIGNATURE_HEADER, signature);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout
            } else {
                TransportError::Network(e.to_string())
            }
        })?;

        let status_code = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Ok(WebhookResponse { status_code, body })
    }
}
