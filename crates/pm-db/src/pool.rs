//! Database connection pool management

use std::time::Duration;

use pm_core::config::DatabaseConfig;
use pm_core::{PmError, PmResult};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

/// Database connection pool
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect using the application configuration
    pub async fn connect(config: &DatabaseConfig) -> PmResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect(&config.url)
            .await
            .map_err(|e| PmError::Database(format!("failed to connect: {}", e)))?;

        info!(max_connections = config.max_connections, "database pool ready");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Liveness probe for health checks
    pub async fn ping(&self) -> PmResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(crate::db_err)
    }
}
