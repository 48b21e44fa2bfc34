//! # Models
//!
//! Data layer of the publication pipeline: the task record owned by the state
//! machine, its per-step result records, and the catalog records it only
//! references.

pub mod catalog;
pub mod results;
pub mod task;

pub use catalog::{MarketplaceCredentials, MarketplaceRecord, ProductSnapshot};
pub use results::{EnhancementResult, ErrorDetails, PublicationResult, WebhookResult};
pub use task::{PublicationTask, StepClaim};
