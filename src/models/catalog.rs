//! Catalog records the pipeline reads but does not own.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Point-in-time view of a product, as handed to the step executors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub id: i64,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub short_description: Option<String>,
    pub sku: String,
    pub price: f64,
    #[serde(default)]
    pub stock: u32,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub dimensions: Option<String>,
}

/// Marketplace configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketplaceRecord {
    pub id: i64,
    pub name: String,
    /// Strategy key, matched case-insensitively
    pub slug: String,
    pub api_url: String,
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub credentials: MarketplaceCredentials,
}

fn default_active() -> bool {
    true
}

/// Credentials for a marketplace API
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketplaceCredentials {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
}

impl MarketplaceCredentials {
    /// Bearer token to present, preferring the OAuth access token
    pub fn bearer_token(&self) -> Option<&str> {
        [self.access_token.as_str(), self.api_key.as_str()]
            .into_iter()
            .find(|token| !token.is_empty())
    }
}

impl fmt::Debug for MarketplaceCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mask = |value: &str| if value.is_empty() { "[EMPTY]" } else { "[MASKED]" };
        f.debug_struct("MarketplaceCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &mask(&self.client_secret))
            .field("api_key", &mask(&self.api_key))
            .field("access_token", &mask(&self.access_token))
            .field("refresh_token", &mask(&self.refresh_token))
            .finish()
    }
}
