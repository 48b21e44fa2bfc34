//! Storage contract for publication tasks.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::PublicationTask;
use crate::state_machine::TaskStatus;

/// Errors raised by a [`TaskStore`]
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Active task {existing} already exists for product {product_id} on marketplace {marketplace_id}")]
    ActiveTaskExists {
        product_id: i64,
        marketplace_id: i64,
        existing: Uuid,
    },

    #[error("Task not found: {0}")]
    NotFound(Uuid),

    #[error("Version conflict on task {task_id}: expected {expected}, found {actual}")]
    VersionConflict {
        task_id: Uuid,
        expected: u64,
        actual: u64,
    },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt task row: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Filtered, paginated listing of one product's tasks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskListQuery {
    pub product_id: i64,
    pub status: Option<TaskStatus>,
    pub marketplace_id: Option<i64>,
    pub limit: u32,
    pub offset: u32,
}

impl TaskListQuery {
    pub fn for_product(product_id: i64) -> Self {
        Self {
            product_id,
            status: None,
            marketplace_id: None,
            limit: crate::constants::query::DEFAULT_LIMIT,
            offset: 0,
        }
    }

    pub fn matches(&self, task: &PublicationTask) -> bool {
        task.product_id == self.product_id
            && self.status.is_none_or(|status| task.status == status)
            && self
                .marketplace_id
                .is_none_or(|marketplace_id| task.marketplace_id == marketplace_id)
    }
}

/// One page of tasks plus the size of the full filtered set
#[derive(Debug, Clone, PartialEq)]
pub struct TaskPage {
    pub tasks: Vec<PublicationTask>,
    pub total: u64,
}

/// Count of tasks sharing a status and marketplace within a filtered set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCount {
    pub status: TaskStatus,
    pub marketplace_id: i64,
    pub marketplace_name: String,
    pub count: u64,
}

/// Durable storage for publication tasks.
///
/// Every mutation after creation goes through [`TaskStore::compare_and_swap`],
/// so two workers racing on the same task cannot both win.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Persist a new task. At most one non-terminal task may exist per
    /// (product, marketplace) pair.
    async fn insert(&self, task: &PublicationTask) -> StoreResult<PublicationTask>;

    async fn get(&self, task_id: Uuid) -> StoreResult<Option<PublicationTask>>;

    /// Replace the stored task if its version still equals `expected_version`.
    /// Returns the stored copy with the bumped version.
    async fn compare_and_swap(
        &self,
        expected_version: u64,
        task: &PublicationTask,
    ) -> StoreResult<PublicationTask>;

    /// Page of tasks ordered newest first (`started_at` desc, `task_id` desc)
    async fn list_tasks(&self, query: &TaskListQuery) -> StoreResult<TaskPage>;

    /// Status and marketplace counts over the whole filtered set, ignoring
    /// `limit` and `offset`
    async fn task_counts(&self, query: &TaskListQuery) -> StoreResult<Vec<TaskCount>>;
}
