//! Wire transport shared by the built-in strategies.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use super::classification::{NETWORK_ERROR, TIMEOUT_ERROR};
use super::strategy::MarketplaceFailure;

/// JSON request to a marketplace API
#[derive(Debug, Clone, PartialEq)]
pub struct MarketplaceRequest {
    pub url: String,
    pub bearer_token: Option<String>,
    pub body: Value,
}

/// Successful (2xx) marketplace response
#[derive(Debug, Clone, PartialEq)]
pub struct MarketplaceResponse {
    pub status: u16,
    pub body: Value,
}

/// Sends a request and reports non-2xx answers as a [`MarketplaceFailure`]
#[async_trait]
pub trait MarketplaceTransport: Send + Sync {
    async fn send(&self, request: MarketplaceRequest) -> Result<MarketplaceResponse, MarketplaceFailure>;
}

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct HttpMarketplaceTransport {
    client: Client,
}

impl HttpMarketplaceTransport {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

/// Error code carried in a marketplace error body, if any
fn error_code_from_body(body: &Value) -> Option<String> {
    ["error_code", "code", "error"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

fn error_message_from_body(body: &Value, fallback: &str) -> String {
    ["message", "error_description", "detail"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .map_or_else(|| fallback.to_string(), str::to_string)
}

pub(crate) fn failure_from_status(status: u16, body: Value) -> MarketplaceFailure {
    let code = error_code_from_body(&body).unwrap_or_else(|| format!("HTTP_{status}"));
    let message = error_message_from_body(&body, &format!("Marketplace returned HTTP {status}"));
    MarketplaceFailure::new(code, message).with_raw_response(body)
}

#[async_trait]
impl MarketplaceTransport for HttpMarketplaceTransport {
    async fn send(&self, request: MarketplaceRequest) -> Result<MarketplaceResponse, MarketplaceFailure> {
        let mut builder = self.client.post(&request.url).json(&request.body);
        if let Some(token) = &request.bearer_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await.map_err(|e| {
            warn!(url = %request.url, error = %e, "Marketplace request failed");
            let code = if e.is_timeout() { TIMEOUT_ERROR } else { NETWORK_ERROR };
            MarketplaceFailure::new(code, format!("Network error: {e}"))
        })?;

        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));

        if (200..300).contains(&status) {
            debug!(url = %request.url, status, "Marketplace accepted request");
            Ok(MarketplaceResponse { status, body })
        } else {
            Err(failure_from_status(status, body))
        }
    }
}
