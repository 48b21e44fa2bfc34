//! # Catalog Directory
//!
//! Read-only lookups for products and marketplaces. The pipeline references
//! catalog records by identifier and never writes them.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::models::{MarketplaceRecord, ProductSnapshot};

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Catalog backend unavailable: {0}")]
    Unavailable(String),

    #[error("Catalog record is invalid: {0}")]
    InvalidRecord(String),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Source of product and marketplace records
#[async_trait]
pub trait CatalogDirectory: Send + Sync {
    async fn find_product(&self, product_id: i64) -> CatalogResult<Option<ProductSnapshot>>;

    async fn find_marketplace(&self, marketplace_id: i64) -> CatalogResult<Option<MarketplaceRecord>>;
}

/// Catalog held in memory, used by tests and embedded setups
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    products: RwLock<HashMap<i64, ProductSnapshot>>,
    marketplaces: RwLock<HashMap<i64, MarketplaceRecord>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_product(&self, product: ProductSnapshot) {
        self.products.write().insert(product.id, product);
    }

    pub fn upsert_marketplace(&self, marketplace: MarketplaceRecord) {
        self.marketplaces.write().insert(marketplace.id, marketplace);
    }

    pub fn remove_product(&self, product_id: i64) -> Option<ProductSnapshot> {
        self.products.write().remove(&product_id)
    }

    /// Toggle a marketplace's `is_active` flag. Returns `false` if unknown.
    pub fn set_marketplace_active(&self, marketplace_id: i64, active: bool) -> bool {
        match self.marketplaces.write().get_mut(&marketplace_id) {
            Some(record) => {
                record.is_active = active;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl CatalogDirectory for InMemoryCatalog {
    async fn find_product(&self, product_id: i64) -> CatalogResult<Option<ProductSnapshot>> {
        Ok(self.products.read().get(&product_id).cloned())
    }

    async fn find_marketplace(&self, marketplace_id: i64) -> CatalogResult<Option<MarketplaceRecord>> {
        Ok(self.marketplaces.read().get(&marketplace_id).cloned())
    }
}
