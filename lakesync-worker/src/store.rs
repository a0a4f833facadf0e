use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;
use tracing::info;

use lakesync_config::shared::PgConnectionConfig;

use crate::timeouts::Operation;

/// Maximum number of pooled connections to the job database.
const MAX_POOL_CONNECTIONS: u32 = 5;

/// Errors emitted by the persistence integration.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An error returned by the database driver.
    #[error("a database error occurred in the job store: {0}")]
    Database(#[from] sqlx::Error),
}

/// Persistence handle for job state.
///
/// The worker only aggregates the store's health and records activity runs;
/// everything else about job state is owned by the control plane.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Verifies the store is reachable.
    async fn health_check(&self) -> Result<(), StoreError>;

    /// Records that an activity ran for a job.
    async fn record_activity(
        &self,
        job_id: u64,
        operation: Operation,
        succeeded: bool,
    ) -> Result<(), StoreError>;
}

/// [`JobStore`] backed by a Postgres connection pool.
pub struct PostgresJobStore {
    pool: PgPool,
}

impl PostgresJobStore {
    /// Opens a connection pool against the configured database.
    ///
    /// Connects eagerly so that a misconfigured database fails worker
    /// construction instead of the first activity.
    pub async fn connect(config: &PgConnectionConfig) -> Result<PostgresJobStore, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_POOL_CONNECTIONS)
            .connect_with(config.with_db())
            .await?;

        info!(host = %config.host, dbname = %config.name, "connected to job database");

        Ok(PostgresJobStore { pool })
    }
}

#[async_trait]
impl JobStore for PostgresJobStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;

        Ok(())
    }

    async fn record_activity(
        &self,
        job_id: u64,
        operation: Operation,
        succeeded: bool,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO activity_runs (job_id, operation, succeeded, ran_at) \
             VALUES ($1, $2, $3, NOW())",
        )
        .bind(job_id as i64)
        .bind(operation.as_str())
        .bind(succeeded)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
