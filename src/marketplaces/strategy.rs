//! Marketplace publishing capability.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::classification::ErrorClassificationTable;
use crate::models::{MarketplaceRecord, ProductSnapshot};

/// Marketplace-neutral product payload handed to a strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedProduct {
    pub product_id: i64,
    pub title: String,
    /// Enhanced description when available, otherwise the catalog one
    pub description: String,
    pub short_description: Option<String>,
    pub sku: String,
    pub price: f64,
    pub stock: u32,
    pub category: Option<String>,
    pub weight: Option<f64>,
    pub dimensions: Option<String>,
    pub keywords: Vec<String>,
}

impl NormalizedProduct {
    pub fn from_snapshot(
        product: &ProductSnapshot,
        enhanced_description: Option<&str>,
        keywords: &[String],
    ) -> Self {
        let description = enhanced_description
            .filter(|text| !text.trim().is_empty())
            .unwrap_or(&product.description)
            .to_string();

        Self {
            product_id: product.id,
            title: product.title.clone(),
            description,
            short_description: product.short_description.clone(),
            sku: product.sku.clone(),
            price: product.price,
            stock: product.stock,
            category: product.category.clone(),
            weight: product.weight,
            dimensions: product.dimensions.clone(),
            keywords: keywords.to_vec(),
        }
    }

    /// Short description, falling back to the first 200 characters of the
    /// description
    pub fn summary(&self) -> String {
        match &self.short_description {
            Some(short) if !short.is_empty() => short.clone(),
            _ => self.description.chars().take(200).collect(),
        }
    }
}

/// A successful submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishReceipt {
    pub external_id: String,
    pub listing_url: Option<String>,
    /// Marketplace response kept for the publication result
    #[serde(default)]
    pub raw_response: serde_json::Value,
}

/// Structured failure reported by a marketplace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{error_code}: {message}")]
pub struct MarketplaceFailure {
    pub error_code: String,
    pub message: String,
    #[serde(default)]
    pub raw_response: Option<serde_json::Value>,
}

impl MarketplaceFailure {
    pub fn new(error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
            raw_response: None,
        }
    }

    pub fn with_raw_response(mut self, raw_response: serde_json::Value) -> Self {
        self.raw_response = Some(raw_response);
        self
    }
}

/// Marketplace-specific submission routine.
///
/// Implementations own their wire format and their error taxonomy; the
/// registry keys them by [`MarketplacePublisher::slug`].
#[async_trait]
pub trait MarketplacePublisher: Send + Sync {
    /// Lower-case strategy key
    fn slug(&self) -> &str;

    /// Which of this marketplace's error codes are worth retrying
    fn error_table(&self) -> ErrorClassificationTable;

    async fn publish(
        &self,
        product: &NormalizedProduct,
        marketplace: &MarketplaceRecord,
    ) -> Result<PublishReceipt, MarketplaceFailure>;
}
