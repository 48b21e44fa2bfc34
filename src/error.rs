//! Crate-wide error taxonomy and the structured error object rendered at the
//! request boundary.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::CatalogError;
use crate::config::ConfigurationError;
use crate::database::StoreError;
use crate::marketplaces::UnsupportedMarketplace;
use crate::state_machine::StateMachineError;

#[derive(Debug, thiserror::Error)]
pub enum PublisherError {
    #[error("An active publication task {existing} already exists for product {product_id} on marketplace {marketplace_id}")]
    DuplicateTask {
        product_id: i64,
        marketplace_id: i64,
        existing: Uuid,
    },

    #[error("Unsupported marketplace: {0}")]
    UnsupportedMarketplace(String),

    #[error("Product not found: {0}")]
    ProductNotFound(i64),

    #[error("Marketplace not found: {0}")]
    MarketplaceNotFound(i64),

    #[error("Task not found: {0}")]
    TaskNotFound(Uuid),

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error(transparent)]
    Store(StoreError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    StateMachine(StateMachineError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

pub type Result<T> = std::result::Result<T, PublisherError>;

impl From<StoreError> for PublisherError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::ActiveTaskExists {
                product_id,
                marketplace_id,
                existing,
            } => Self::DuplicateTask {
                product_id,
                marketplace_id,
                existing,
            },
            StoreError::NotFound(task_id) => Self::TaskNotFound(task_id),
            other => Self::Store(other),
        }
    }
}

impl From<StateMachineError> for PublisherError {
    fn from(error: StateMachineError) -> Self {
        match error {
            StateMachineError::Persistence(store) => store.into(),
            other => Self::StateMachine(other),
        }
    }
}

impl From<UnsupportedMarketplace> for PublisherError {
    fn from(error: UnsupportedMarketplace) -> Self {
        Self::UnsupportedMarketplace(error.slug)
    }
}

/// Structured error object, never a silent empty result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl PublisherError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::DuplicateTask { .. } => "DUPLICATE_TASK",
            Self::UnsupportedMarketplace(_) => "UNSUPPORTED_MARKETPLACE",
            Self::ProductNotFound(_) => "PRODUCT_NOT_FOUND",
            Self::MarketplaceNotFound(_) => "MARKETPLACE_NOT_FOUND",
            Self::TaskNotFound(_) => "TASK_NOT_FOUND",
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::InvalidParameter { .. } => "INVALID_PARAMETER",
            Self::Store(_) => "STORAGE_ERROR",
            Self::Catalog(_) => "CATALOG_ERROR",
            Self::StateMachine(_) => "STATE_MACHINE_ERROR",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
        }
    }

    /// HTTP status a boundary should answer with
    pub fn status_code(&self) -> u16 {
        match self {
            Self::ProductNotFound(_) | Self::MarketplaceNotFound(_) | Self::TaskNotFound(_) => 404,
            Self::Unauthenticated => 401,
            Self::DuplicateTask { .. } => 409,
            Self::InvalidParameter { .. } | Self::UnsupportedMarketplace(_) => 400,
            Self::Store(_) | Self::Catalog(_) | Self::StateMachine(_) | Self::Configuration(_) => 500,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status_code() == 404
    }

    pub fn to_response(&self) -> ErrorResponse {
        let details = match self {
            Self::DuplicateTask {
                product_id,
                marketplace_id,
                existing,
            } => Some(serde_json::json!({
                "product_id": product_id,
                "marketplace_id": marketplace_id,
                "existing_task_id": existing,
            })),
            Self::ProductNotFound(id) => Some(serde_json::json!({ "product_id": id })),
            Self::MarketplaceNotFound(id) => Some(serde_json::json!({ "marketplace_id": id })),
            Self::TaskNotFound(id) => Some(serde_json::json!({ "task_id": id })),
            Self::InvalidParameter { name, .. } => Some(serde_json::json!({ "parameter": name })),
            _ => None,
        };

        ErrorResponse {
            error: self.to_string(),
            code: self.code().to_string(),
            details,
        }
    }
}
