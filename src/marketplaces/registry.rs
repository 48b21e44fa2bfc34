//! Strategy lookup keyed by normalized marketplace identifier.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::classification::ErrorClassificationTable;
use super::strategy::MarketplacePublisher;
use super::transport::MarketplaceTransport;
use super::{MercadoLibrePublisher, ParisPublisher, WalmartPublisher};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unsupported marketplace: {slug}")]
pub struct UnsupportedMarketplace {
    pub slug: String,
}

/// A registered strategy together with its error table
#[derive(Clone)]
pub struct RegisteredMarketplace {
    pub publisher: Arc<dyn MarketplacePublisher>,
    pub error_table: Arc<ErrorClassificationTable>,
}

impl std::fmt::Debug for RegisteredMarketplace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredMarketplace")
            .field("slug", &self.publisher.slug())
            .finish()
    }
}

/// Open set of marketplace strategies.
///
/// Adding a marketplace is one [`MarketplaceRegistry::register`] call; nothing
/// else in the pipeline changes.
#[derive(Debug, Default, Clone)]
pub struct MarketplaceRegistry {
    entries: HashMap<String, RegisteredMarketplace>,
}

fn normalize(slug: &str) -> String {
    slug.trim().to_lowercase()
}

impl MarketplaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the MercadoLibre, Walmart and Paris strategies sharing
    /// one transport
    pub fn with_builtin(transport: Arc<dyn MarketplaceTransport>) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(MercadoLibrePublisher::new(transport.clone())));
        registry.register(Arc::new(WalmartPublisher::new(transport.clone())));
        registry.register(Arc::new(ParisPublisher::new(transport)));
        registry
    }

    /// Register a strategy, replacing any previous one with the same slug
    pub fn register(&mut self, publisher: Arc<dyn MarketplacePublisher>) {
        let slug = normalize(publisher.slug());
        debug!(slug = %slug, "Registering marketplace strategy");
        let error_table = Arc::new(publisher.error_table());
        self.entries.insert(
            slug,
            RegisteredMarketplace {
                publisher,
                error_table,
            },
        );
    }

    /// Resolve a strategy without touching the network
    pub fn resolve(&self, slug: &str) -> Result<RegisteredMarketplace, UnsupportedMarketplace> {
        self.entries
            .get(&normalize(slug))
            .cloned()
            .ok_or_else(|| UnsupportedMarketplace {
                slug: slug.to_string(),
            })
    }

    pub fn supports(&self, slug: &str) -> bool {
        self.entries.contains_key(&normalize(slug))
    }

    pub fn slugs(&self) -> Vec<String> {
        let mut slugs: Vec<_> = self.entries.keys().cloned().collect();
        slugs.sort();
        slugs
    }
}
