//! Database connection management using sqlx

use crate::config::DbConfig;
use crate::error::{PipelineError, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::info;

pub type DbPool = PgPool;

/// Initialize the database connection pool
pub async fn init_pool(db: &DbConfig) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(30))
        .connect_with(db.connect_options())
        .await
        .map_err(|e| {
            PipelineError::Database(format!(
                "PostgreSQL connection to {}:{}/{} failed: {}",
                db.host, db.port, db.database, e
            ))
        })?;

    // Test the connection
    sqlx::query("SELECT 1").execute(&pool).await?;

    info!("Connected to PostgreSQL database '{}'", db.database);
    Ok(pool)
}
