//! Walmart Marketplace listing strategy.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use super::classification::ErrorClassificationTable;
use super::strategy::{MarketplacePublisher, NormalizedProduct, PublishReceipt};
use super::transport::{MarketplaceRequest, MarketplaceTransport};
use super::{endpoint, string_field, MarketplaceFailure};
use crate::models::MarketplaceRecord;

pub const SLUG: &str = "walmart";
pub const CURRENCY: &str = "USD";
const DEFAULT_BRAND: &str = "Generic";
const DEFAULT_WEIGHT: f64 = 1.0;
const DEFAULT_DIMENSIONS: &str = "10x10x10";

pub struct WalmartPublisher {
    transport: Arc<dyn MarketplaceTransport>,
}

impl WalmartPublisher {
    pub fn new(transport: Arc<dyn MarketplaceTransport>) -> Self {
        Self { transport }
    }

    pub fn build_body(product: &NormalizedProduct) -> Value {
        json!({
            "productName": product.title,
            "shortDescription": product.summary(),
            "longDescription": product.description,
            "price": { "amount": product.price, "currency": CURRENCY },
            "quantity": product.stock,
            "sku": product.sku,
            "brand": DEFAULT_BRAND,
            "keyFeatures": product.keywords,
            "shipping": {
                "weight": product.weight.unwrap_or(DEFAULT_WEIGHT),
                "dimensions": product.dimensions.as_deref().unwrap_or(DEFAULT_DIMENSIONS),
            },
        })
    }
}

#[async_trait]
impl MarketplacePublisher for WalmartPublisher {
    fn slug(&self) -> &str {
        SLUG
    }

    fn error_table(&self) -> ErrorClassificationTable {
        ErrorClassificationTable::http_defaults()
            .retryable(["REQUEST_THROTTLED", "SYSTEM_ERROR", "SERVICE_UNAVAILABLE"])
            .permanent([
                "INVALID_REQUEST",
                "DATA_ERROR",
                "CONTENT_NOT_FOUND",
                "UNAUTHORIZED",
                "DUPLICATE_SKU",
            ])
    }

    async fn publish(
        &self,
        product: &NormalizedProduct,
        marketplace: &MarketplaceRecord,
    ) -> Result<PublishReceipt, MarketplaceFailure> {
        let response = self
            .transport
            .send(MarketplaceRequest {
                url: endpoint(&marketplace.api_url, "v3/items"),
                bearer_token: marketplace.credentials.bearer_token().map(str::to_string),
                body: Self::build_body(product),
            })
            .await?;

        let external_id = string_field(&response.body, "itemId")
            .unwrap_or_else(|| format!("WM{}", product.product_id));
        let listing_url = format!("https://walmart.com/item/{}", product.product_id);

        Ok(PublishReceipt {
            external_id,
            listing_url: Some(listing_url),
            raw_response: response.body,
        })
    }
}
