//! MercadoLibre listing strategy.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use super::classification::ErrorClassificationTable;
use super::strategy::{MarketplacePublisher, NormalizedProduct, PublishReceipt};
use super::transport::{MarketplaceRequest, MarketplaceTransport};
use super::{endpoint, string_field, MarketplaceFailure};
use crate::models::MarketplaceRecord;

pub const SLUG: &str = "mercadolibre";
pub const DEFAULT_CATEGORY_ID: &str = "MLM1051";
pub const CURRENCY: &str = "ARS";
pub const LISTING_TYPE: &str = "gold_special";

pub struct MercadoLibrePublisher {
    transport: Arc<dyn MarketplaceTransport>,
}

impl MercadoLibrePublisher {
    pub fn new(transport: Arc<dyn MarketplaceTransport>) -> Self {
        Self { transport }
    }

    pub fn build_body(product: &NormalizedProduct) -> Value {
        json!({
            "title": product.title,
            "description": { "plain_text": product.description },
            "price": product.price,
            "available_quantity": product.stock,
            "category_id": DEFAULT_CATEGORY_ID,
            "condition": "new",
            "currency_id": CURRENCY,
            "listing_type_id": LISTING_TYPE,
            "seller_custom_field": product.sku,
            "tags": product.keywords,
        })
    }
}

#[async_trait]
impl MarketplacePublisher for MercadoLibrePublisher {
    fn slug(&self) -> &str {
        SLUG
    }

    fn error_table(&self) -> ErrorClassificationTable {
        ErrorClassificationTable::http_defaults()
            .retryable([
                "too_many_requests",
                "local_rate_limited",
                "internal_server_error",
                "service_unavailable",
            ])
            .permanent([
                "invalid_category",
                "item.category_id.invalid",
                "item.price.invalid",
                "item.title.length.invalid",
                "validation_error",
                "unauthorized",
                "forbidden",
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
                url: endpoint(&marketplace.api_url, "items"),
                bearer_token: marketplace.credentials.bearer_token().map(str::to_string),
                body: Self::build_body(product),
            })
            .await?;

        let external_id = string_field(&response.body, "id")
            .unwrap_or_else(|| format!("MLM{}", product.product_id));
        let listing_url = string_field(&response.body, "permalink").unwrap_or_else(|| {
            format!("https://articulo.mercadolibre.com.ar/{}", product.product_id)
        });

        Ok(PublishReceipt {
            external_id,
            listing_url: Some(listing_url),
            raw_response: response.body,
        })
    }
}
