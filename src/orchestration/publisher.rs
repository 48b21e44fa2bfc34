//! Publication step: resolve the marketplace strategy and submit the listing.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::outcome::{StepError, StepOutcome};
use super::step_executor::{with_timeout, StepExecutor};
use crate::marketplaces::{FailureClass, MarketplaceRegistry, NormalizedProduct};
use crate::models::{MarketplaceRecord, PublicationResult};
use crate::state_machine::StepName;

pub const UNSUPPORTED_MARKETPLACE: &str = "UNSUPPORTED_MARKETPLACE";

/// Everything one submission needs
#[derive(Debug, Clone)]
pub struct PublicationContext {
    pub product: NormalizedProduct,
    pub marketplace: MarketplaceRecord,
}

pub struct PublisherExecutor {
    registry: Arc<MarketplaceRegistry>,
    timeout: Duration,
}

impl PublisherExecutor {
    pub fn new(registry: Arc<MarketplaceRegistry>, timeout: Duration) -> Self {
        Self { registry, timeout }
    }

    pub fn registry(&self) -> &MarketplaceRegistry {
        &self.registry
    }
}

#[async_trait]
impl StepExecutor for PublisherExecutor {
    type Context = PublicationContext;
    type Output = PublicationResult;

    fn step(&self) -> StepName {
        StepName::Publication
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn execute(&self, context: &PublicationContext) -> StepOutcome<PublicationResult> {
        let marketplace = &context.marketplace;

        // resolved before any network call
        let entry = match self.registry.resolve(&marketplace.slug) {
            Ok(entry) => entry,
            Err(e) => {
                return StepOutcome::Permanent(
                    StepError::new(e.to_string())
                        .with_code(UNSUPPORTED_MARKETPLACE)
                        .with_upstream(json!({ "slug": marketplace.slug })),
                )
            }
        };

        with_timeout(self.step(), self.timeout, async {
            match entry.publisher.publish(&context.product, marketplace).await {
                Ok(receipt) => {
                    info!(
                        product_id = context.product.product_id,
                        marketplace = %marketplace.slug,
                        external_id = %receipt.external_id,
                        "Listing accepted"
                    );
                    StepOutcome::Success(PublicationResult {
                        success: true,
                        external_id: receipt.external_id,
                        listing_url: receipt.listing_url,
                        marketplace_slug: entry.publisher.slug().to_string(),
                        details: receipt.raw_response,
                        completed_at: Utc::now(),
                    })
                }
                Err(failure) => {
                    let class = entry.error_table.classify(&failure);
                    warn!(
                        product_id = context.product.product_id,
                        marketplace = %marketplace.slug,
                        error_code = %failure.error_code,
                        ?class,
                        "Marketplace rejected listing"
                    );
                    let mut error = StepError::new(failure.message).with_code(failure.error_code);
                    error.upstream_response = failure.raw_response;
                    match class {
                        FailureClass::Retryable => StepOutcome::Retryable(error),
                        FailureClass::Permanent => StepOutcome::Permanent(error),
                    }
                }
            }
        })
        .await
    }
}
