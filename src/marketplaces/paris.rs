//! Paris (Chile) listing strategy. The API speaks Spanish field names.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use super::classification::ErrorClassificationTable;
use super::strategy::{MarketplacePublisher, NormalizedProduct, PublishReceipt};
use super::transport::{MarketplaceRequest, MarketplaceTransport};
use super::{endpoint, string_field, MarketplaceFailure};
use crate::models::MarketplaceRecord;

pub const SLUG: &str = "paris";
pub const DEFAULT_CATEGORY: &str = "Electrónicos";
const DEFAULT_BRAND: &str = "Generic";

pub struct ParisPublisher {
    transport: Arc<dyn MarketplaceTransport>,
}

impl ParisPublisher {
    pub fn new(transport: Arc<dyn MarketplaceTransport>) -> Self {
        Self { transport }
    }

    pub fn build_body(product: &NormalizedProduct) -> Value {
        json!({
            "nombre": product.title,
            "descripcion": product.description,
            "precio": product.price,
            "stock": product.stock,
            "codigo": product.sku,
            "categoria": DEFAULT_CATEGORY,
            "marca": DEFAULT_BRAND,
            "palabras_clave": product.keywords,
        })
    }
}

#[async_trait]
impl MarketplacePublisher for ParisPublisher {
    fn slug(&self) -> &str {
        SLUG
    }

    fn error_table(&self) -> ErrorClassificationTable {
        ErrorClassificationTable::http_defaults()
            .retryable(["LIMITE_EXCEDIDO", "SERVICIO_NO_DISPONIBLE", "ERROR_INTERNO"])
            .permanent([
                "CATEGORIA_INVALIDA",
                "PRODUCTO_INVALIDO",
                "CODIGO_DUPLICADO",
                "CREDENCIALES_INVALIDAS",
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
                url: endpoint(&marketplace.api_url, "productos"),
                bearer_token: marketplace.credentials.bearer_token().map(str::to_string),
                body: Self::build_body(product),
            })
            .await?;

        let external_id = string_field(&response.body, "id_producto")
            .unwrap_or_else(|| format!("PR{}", product.product_id));
        let listing_url = format!("https://paris.cl/producto/{}", product.product_id);

        Ok(PublishReceipt {
            external_id,
            listing_url: Some(listing_url),
            raw_response: response.body,
        })
    }
}
