//! # Task Query Service
//!
//! Read-only aggregation of one product's publication tasks across
//! marketplaces: filtering, pagination, and per-status / per-marketplace
//! summaries over the full filtered set.
//!
//! Referenced entities are checked before any task is read, so an unknown
//! product or marketplace is reported as not-found rather than as an empty
//! page.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::catalog::CatalogDirectory;
use crate::config::QueryConfig;
use crate::database::{TaskListQuery, TaskStore};
use crate::error::{PublisherError, Result};
use crate::models::PublicationTask;
use crate::state_machine::TaskStatus;

/// Optional filters of a listing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskListFilter {
    pub status: Option<TaskStatus>,
    pub marketplace_id: Option<i64>,
}

/// Raw query-string parameters as a boundary receives them
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskQueryParams {
    pub status: Option<String>,
    pub marketplace_id: Option<i64>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl TaskQueryParams {
    /// Validate into a filter plus pagination. An out-of-range `limit` is
    /// clamped later; an unknown status or a negative offset is rejected.
    pub fn parse(&self) -> Result<(TaskListFilter, Option<u32>, Option<u32>)> {
        let status = self
            .status
            .as_deref()
            .map(|raw| {
                raw.parse::<TaskStatus>()
                    .map_err(|reason| PublisherError::InvalidParameter {
                        name: "status".to_string(),
                        reason,
                    })
            })
            .transpose()?;

        let offset = match self.offset {
            Some(offset) if offset < 0 => {
                return Err(PublisherError::InvalidParameter {
                    name: "offset".to_string(),
                    reason: format!("must be >= 0, got {offset}"),
                })
            }
            Some(offset) => Some(u32::try_from(offset).unwrap_or(u32::MAX)),
            None => None,
        };
        let limit = self
            .limit
            .map(|limit| u32::try_from(limit.max(0)).unwrap_or(u32::MAX));

        Ok((
            TaskListFilter {
                status,
                marketplace_id: self.marketplace_id,
            },
            limit,
            offset,
        ))
    }
}

/// A task as exposed to readers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskView {
    #[serde(flatten)]
    pub task: PublicationTask,
    pub progress_percentage: f64,
}

impl From<PublicationTask> for TaskView {
    fn from(task: PublicationTask) -> Self {
        Self {
            progress_percentage: task.progress_percentage(),
            task,
        }
    }
}

/// One page of a product's tasks with summaries over every matching task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductTaskList {
    pub product_id: i64,
    pub product_title: String,
    pub product_sku: String,
    pub total_tasks: u64,
    pub showing: u64,
    pub offset: u32,
    pub limit: u32,
    pub has_more: bool,
    pub status_summary: BTreeMap<String, u64>,
    pub marketplace_summary: BTreeMap<String, u64>,
    pub tasks: Vec<TaskView>,
}

#[derive(Clone)]
pub struct TaskQueryService {
    store: Arc<dyn TaskStore>,
    catalog: Arc<dyn CatalogDirectory>,
    config: QueryConfig,
}

impl std::fmt::Debug for TaskQueryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskQueryService")
            .field("config", &self.config)
            .finish()
    }
}

impl TaskQueryService {
    pub fn new(store: Arc<dyn TaskStore>, catalog: Arc<dyn CatalogDirectory>, config: QueryConfig) -> Self {
        Self {
            store,
            catalog,
            config,
        }
    }

    /// `limit` clamped to `[1, max_limit]`, `default_limit` when absent
    pub fn effective_limit(&self, limit: Option<u32>) -> u32 {
        limit
            .unwrap_or(self.config.default_limit)
            .clamp(1, self.config.max_limit.max(1))
    }

    pub async fn list_tasks(
        &self,
        product_id: i64,
        filter: TaskListFilter,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> Result<ProductTaskList> {
        let product = self
            .catalog
            .find_product(product_id)
            .await?
            .ok_or(PublisherError::ProductNotFound(product_id))?;

        if let Some(marketplace_id) = filter.marketplace_id {
            if self.catalog.find_marketplace(marketplace_id).await?.is_none() {
                return Err(PublisherError::MarketplaceNotFound(marketplace_id));
            }
        }

        let query = TaskListQuery {
            product_id,
            status: filter.status,
            marketplace_id: filter.marketplace_id,
            limit: self.effective_limit(limit),
            offset: offset.unwrap_or(0),
        };

        let page = self.store.list_tasks(&query).await?;
        let counts = self.store.task_counts(&query).await?;

        // Totals come from the same read as the summaries so they always agree
        let mut total_tasks = 0;
        let mut status_summary = BTreeMap::new();
        let mut marketplace_summary = BTreeMap::new();
        for count in counts {
            total_tasks += count.count;
            *status_summary.entry(count.status.to_string()).or_insert(0) += count.count;
            *marketplace_summary.entry(count.marketplace_name).or_insert(0) += count.count;
        }

        let showing = page.tasks.len() as u64;
        let has_more = u64::from(query.offset) + showing < total_tasks;

        debug!(
            product_id,
            total = total_tasks,
            showing,
            offset = query.offset,
            limit = query.limit,
            "Listed publication tasks"
        );

        Ok(ProductTaskList {
            product_id,
            product_title: product.title,
            product_sku: product.sku,
            total_tasks,
            showing,
            offset: query.offset,
            limit: query.limit,
            has_more,
            status_summary,
            marketplace_summary,
            tasks: page.tasks.into_iter().map(TaskView::from).collect(),
        })
    }

    /// Boundary entry point taking raw query parameters
    pub async fn list_tasks_with_params(&self, product_id: i64, params: &TaskQueryParams) -> Result<ProductTaskList> {
        let (filter, limit, offset) = params.parse()?;
        self.list_tasks(product_id, filter, limit, offset).await
    }

    pub async fn get_task(&self, task_id: Uuid) -> Result<TaskView> {
        self.store
            .get(task_id)
            .await?
            .map(TaskView::from)
            .ok_or(PublisherError::TaskNotFound(task_id))
    }
}
