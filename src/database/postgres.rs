//! PostgreSQL-backed task store.
//!
//! Tasks live in `publication_tasks`. Result records, `steps_completed` and the
//! in-flight claim are JSONB columns; the `version` column carries the
//! optimistic concurrency token. A partial unique index on
//! `(product_id, marketplace_id)` over non-terminal rows enforces the
//! single-active-task rule.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use std::str::FromStr;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::store::{StoreError, StoreResult, TaskCount, TaskListQuery, TaskPage, TaskStore};
use crate::models::PublicationTask;
use crate::state_machine::TaskStatus;

const TASK_COLUMNS: &str = "task_id, product_id, marketplace_id, product_title, product_sku, \
    marketplace_name, status, current_step, steps_completed, total_steps, enhancement_retries, \
    publication_retries, webhook_retries, enhancement_result, publication_result, webhook_result, \
    error_details, active_attempt, next_attempt_at, started_at, completed_at, version";

const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, Clone)]
pub struct PgTaskStore {
    pool: PgPool,
}

impl PgTaskStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the bundled schema migrations
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn find_active(&self, product_id: i64, marketplace_id: i64) -> StoreResult<Option<Uuid>> {
        let row = sqlx::query(
            "SELECT task_id FROM publication_tasks \
             WHERE product_id = $1 AND marketplace_id = $2 \
             AND status NOT IN ('completed', 'failed') LIMIT 1",
        )
        .bind(product_id)
        .bind(marketplace_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.try_get("task_id")).transpose()?)
    }

    async fn current_version(&self, task_id: Uuid) -> StoreResult<Option<u64>> {
        let row = sqlx::query("SELECT version FROM publication_tasks WHERE task_id = $1")
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| r.try_get::<i64, _>("version").map(to_u64))
            .transpose()
            .map_err(StoreError::from)
    }
}

fn to_u64(value: i64) -> u64 {
    u64::try_from(value).unwrap_or_default()
}

fn to_u32(value: i32) -> u32 {
    u32::try_from(value).unwrap_or_default()
}

fn json<T: Serialize>(value: &T) -> Json<&T> {
    Json(value)
}

fn decode<T: DeserializeOwned>(row: &PgRow, column: &str) -> StoreResult<T> {
    let Json(value): Json<T> = row.try_get(column)?;
    Ok(value)
}

fn task_from_row(row: &PgRow) -> StoreResult<PublicationTask> {
    let status: String = row.try_get("status")?;
    let status = TaskStatus::from_str(&status).map_err(StoreError::Corrupt)?;

    Ok(PublicationTask {
        task_id: row.try_get("task_id")?,
        product_id: row.try_get("product_id")?,
        marketplace_id: row.try_get("marketplace_id")?,
        product_title: row.try_get("product_title")?,
        product_sku: row.try_get("product_sku")?,
        marketplace_name: row.try_get("marketplace_name")?,
        status,
        current_step: row.try_get("current_step")?,
        steps_completed: decode(row, "steps_completed")?,
        total_steps: to_u32(row.try_get("total_steps")?),
        enhancement_retries: to_u32(row.try_get("enhancement_retries")?),
        publication_retries: to_u32(row.try_get("publication_retries")?),
        webhook_retries: to_u32(row.try_get("webhook_retries")?),
        enhancement_result: decode(row, "enhancement_result")?,
        publication_result: decode(row, "publication_result")?,
        webhook_result: decode(row, "webhook_result")?,
        error_details: decode(row, "error_details")?,
        active_attempt: decode(row, "active_attempt")?,
        next_attempt_at: row.try_get("next_attempt_at")?,
        started_at: row.try_get("started_at")?,
        completed_at: row.try_get("completed_at")?,
        version: to_u64(row.try_get("version")?),
    })
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &TaskListQuery) {
    builder.push(" WHERE product_id = ");
    builder.push_bind(query.product_id);
    if let Some(status) = query.status {
        builder.push(" AND status = ");
        builder.push_bind(status.as_str());
    }
    if let Some(marketplace_id) = query.marketplace_id {
        builder.push(" AND marketplace_id = ");
        builder.push_bind(marketplace_id);
    }
}

#[async_trait]
impl TaskStore for PgTaskStore {
    #[instrument(skip(self, task), fields(task_id = %task.task_id))]
    async fn insert(&self, task: &PublicationTask) -> StoreResult<PublicationTask> {
        let sql = format!(
            "INSERT INTO publication_tasks ({TASK_COLUMNS}) VALUES \
             ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, 1) \
             RETURNING {TASK_COLUMNS}"
        );

        let result = sqlx::query(&sql)
            .bind(task.task_id)
            .bind(task.product_id)
            .bind(task.marketplace_id)
            .bind(&task.product_title)
            .bind(&task.product_sku)
            .bind(&task.marketplace_name)
            .bind(task.status.as_str())
            .bind(&task.current_step)
            .bind(json(&task.steps_completed))
            .bind(task.total_steps as i32)
            .bind(task.enhancement_retries as i32)
            .bind(task.publication_retries as i32)
            .bind(task.webhook_retries as i32)
            .bind(json(&task.enhancement_result))
            .bind(json(&task.publication_result))
            .bind(json(&task.webhook_result))
            .bind(json(&task.error_details))
            .bind(json(&task.active_attempt))
            .bind(task.next_attempt_at)
            .bind(task.started_at)
            .bind(task.completed_at)
            .fetch_one(&self.pool)
            .await;

        match result {
            Ok(row) => task_from_row(&row),
            Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) => {
                let existing = self
                    .find_active(task.product_id, task.marketplace_id)
                    .await?
                    .unwrap_or(task.task_id);
                Err(StoreError::ActiveTaskExists {
                    product_id: task.product_id,
                    marketplace_id: task.marketplace_id,
                    existing,
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn get(&self, task_id: Uuid) -> StoreResult<Option<PublicationTask>> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM publication_tasks WHERE task_id = $1");
        let row = sqlx::query(&sql)
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(task_from_row).transpose()
    }

    #[instrument(skip(self, task), fields(task_id = %task.task_id, status = %task.status))]
    async fn compare_and_swap(
        &self,
        expected_version: u64,
        task: &PublicationTask,
    ) -> StoreResult<PublicationTask> {
        let sql = format!(
            "UPDATE publication_tasks SET \
             status = $3, current_step = $4, steps_completed = $5, total_steps = $6, \
             enhancement_retries = $7, publication_retries = $8, webhook_retries = $9, \
             enhancement_result = $10, publication_result = $11, webhook_result = $12, \
             error_details = $13, active_attempt = $14, next_attempt_at = $15, \
             completed_at = $16, version = version + 1 \
             WHERE task_id = $1 AND version = $2 \
             RETURNING {TASK_COLUMNS}"
        );

        let row = sqlx::query(&sql)
            .bind(task.task_id)
            .bind(expected_version as i64)
            .bind(task.status.as_str())
            .bind(&task.current_step)
            .bind(json(&task.steps_completed))
            .bind(task.total_steps as i32)
            .bind(task.enhancement_retries as i32)
            .bind(task.publication_retries as i32)
            .bind(task.webhook_retries as i32)
            .bind(json(&task.enhancement_result))
            .bind(json(&task.publication_result))
            .bind(json(&task.webhook_result))
            .bind(json(&task.error_details))
            .bind(json(&task.active_attempt))
            .bind(task.next_attempt_at)
            .bind(task.completed_at)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => task_from_row(&row),
            None => match self.current_version(task.task_id).await? {
                Some(actual) => {
                    debug!(expected_version, actual, "Compare-and-swap lost the race");
                    Err(StoreError::VersionConflict {
                        task_id: task.task_id,
                        expected: expected_version,
                        actual,
                    })
                }
                None => Err(StoreError::NotFound(task.task_id)),
            },
        }
    }

    async fn list_tasks(&self, query: &TaskListQuery) -> StoreResult<TaskPage> {
        let mut count = QueryBuilder::new("SELECT COUNT(*) AS total FROM publication_tasks");
        push_filters(&mut count, query);
        let total: i64 = count.build().fetch_one(&self.pool).await?.try_get("total")?;

        let mut select = QueryBuilder::new(format!("SELECT {TASK_COLUMNS} FROM publication_tasks"));
        push_filters(&mut select, query);
        select.push(" ORDER BY started_at DESC, task_id DESC LIMIT ");
        select.push_bind(i64::from(query.limit));
        select.push(" OFFSET ");
        select.push_bind(i64::from(query.offset));

        let rows = select.build().fetch_all(&self.pool).await?;
        let tasks = rows.iter().map(task_from_row).collect::<StoreResult<Vec<_>>>()?;

        Ok(TaskPage {
            tasks,
            total: to_u64(total),
        })
    }

    async fn task_counts(&self, query: &TaskListQuery) -> StoreResult<Vec<TaskCount>> {
        let mut builder = QueryBuilder::new(
            "SELECT status, marketplace_id, MAX(marketplace_name) AS marketplace_name, \
             COUNT(*) AS count FROM publication_tasks",
        );
        push_filters(&mut builder, query);
        builder.push(" GROUP BY status, marketplace_id ORDER BY status, marketplace_id");

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| {
                let status: String = row.try_get("status")?;
                Ok(TaskCount {
                    status: TaskStatus::from_str(&status).map_err(StoreError::Corrupt)?,
                    marketplace_id: row.try_get("marketplace_id")?,
                    marketplace_name: row.try_get("marketplace_name")?,
                    count: to_u64(row.try_get("count")?),
                })
            })
            .collect()
    }
}
