//! # Marketplace Strategies
//!
//! Each marketplace is a [`MarketplacePublisher`] registered in the
//! [`MarketplaceRegistry`] under its slug. A strategy owns its wire body and
//! its [`ErrorClassificationTable`], which the publication step consults to
//! decide between retrying and failing the task.
//!
//! ```text
//! slug ──▶ MarketplaceRegistry ──▶ MarketplacePublisher ──▶ MarketplaceTransport
//!                                        │
//!                                        └──▶ ErrorClassificationTable
//! ```

pub mod classification;
pub mod mercadolibre;
pub mod paris;
pub mod registry;
pub mod strategy;
pub mod transport;
pub mod walmart;

pub use classification::{ErrorClassificationTable, FailureClass};
pub use mercadolibre::MercadoLibrePublisher;
pub use paris::ParisPublisher;
pub use registry::{MarketplaceRegistry, RegisteredMarketplace, UnsupportedMarketplace};
pub use strategy::{MarketplaceFailure, MarketplacePublisher, NormalizedProduct, PublishReceipt};
pub use transport::{
    HttpMarketplaceTransport, MarketplaceRequest, MarketplaceResponse, MarketplaceTransport,
};
pub use walmart::WalmartPublisher;

use serde_json::Value;

pub(crate) fn endpoint(api_url: &str, path: &str) -> String {
    format!("{}/{}", api_url.trim_end_matches('/'), path)
}

pub(crate) fn string_field(body: &Value, key: &str) -> Option<String> {
    match body.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
