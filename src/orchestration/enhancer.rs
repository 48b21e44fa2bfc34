//! Enhancement step: product text through the AI content capability.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::outcome::{StepError, StepOutcome};
use super::step_executor::{with_timeout, StepExecutor};
use crate::enhancement::{normalize_keywords, ContentEnhancer, EnhancementRequest};
use crate::models::{EnhancementResult, ProductSnapshot};
use crate::state_machine::StepName;

pub struct EnhancerExecutor {
    enhancer: Arc<dyn ContentEnhancer>,
    max_keywords: usize,
    timeout: Duration,
}

impl EnhancerExecutor {
    pub fn new(enhancer: Arc<dyn ContentEnhancer>, max_keywords: usize, timeout: Duration) -> Self {
        Self {
            enhancer,
            max_keywords,
            timeout,
        }
    }
}

#[async_trait]
impl StepExecutor for EnhancerExecutor {
    type Context = ProductSnapshot;
    type Output = EnhancementResult;

    fn step(&self) -> StepName {
        StepName::Enhancement
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn execute(&self, product: &ProductSnapshot) -> StepOutcome<EnhancementResult> {
        let request = EnhancementRequest {
            title: product.title.clone(),
            description: product.description.clone(),
            category: product.category.clone(),
        };

        with_timeout(self.step(), self.timeout, async {
            match self.enhancer.enhance(&request).await {
                Ok(content) => {
                    let description = content.enhanced_description.trim();
                    if description.is_empty() {
                        return StepOutcome::Retryable(
                            StepError::new("Enhancer returned an empty description")
                                .with_code("EMPTY_RESPONSE"),
                        );
                    }
                    let keywords = normalize_keywords(&content.keywords, self.max_keywords);
                    debug!(product_id = product.id, keywords = keywords.len(), "Content enhanced");
                    StepOutcome::Success(EnhancementResult {
                        success: true,
                        enhanced_description: description.to_string(),
                        keywords,
                        completed_at: Utc::now(),
                    })
                }
                Err(e) => {
                    warn!(product_id = product.id, error = %e, "Content enhancement failed");
                    let error = StepError::new(e.to_string()).with_code(e.error_code());
                    if e.is_transient() {
                        StepOutcome::Retryable(error)
                    } else {
                        StepOutcome::Permanent(error)
                    }
                }
            }
        })
        .await
    }
}
