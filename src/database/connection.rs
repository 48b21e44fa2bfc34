//! Pool construction from [`DatabaseConfig`].

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use super::postgres::PgTaskStore;
use super::store::StoreResult;
use crate::config::DatabaseConfig;

pub struct DatabaseConnection {
    pool: PgPool,
}

impl DatabaseConnection {
    pub async fn connect(config: &DatabaseConfig) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await?;

        info!(max_connections = config.max_connections, "Database pool ready");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Round-trip to the server
    pub async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Task store over this pool with the schema migrated
    pub async fn task_store(&self) -> StoreResult<PgTaskStore> {
        let store = PgTaskStore::new(self.pool.clone());
        store.migrate().await?;
        Ok(store)
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}
