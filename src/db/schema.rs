//! Table definitions for the bank and review tables

use crate::error::Result;
use sqlx::PgPool;
use tracing::info;

pub const CREATE_BANKS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS banks (
    bank_id SERIAL PRIMARY KEY,
    bank_name VARCHAR(100) UNIQUE NOT NULL,
    app_name VARCHAR(100)
)
"#;

pub const CREATE_REVIEWS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS reviews (
    review_pk SERIAL PRIMARY KEY,
    bank_id INTEGER REFERENCES banks(bank_id) ON DELETE CASCADE,
    review_id_generated INTEGER UNIQUE NOT NULL,
    review_text TEXT,
    review_preprocessed TEXT,
    rating INTEGER NOT NULL,
    review_date DATE,
    sentiment_label VARCHAR(10),
    sentiment_score NUMERIC(5, 4),
    identified_theme VARCHAR(50),
    source VARCHAR(50) DEFAULT 'Google Play'
)
"#;

/// Create the `banks` and `reviews` tables if they don't exist
pub async fn create_tables(pool: &PgPool) -> Result<()> {
    info!("Creating 'banks' table...");
    sqlx::query(CREATE_BANKS_TABLE).execute(pool).await?;
    info!("Creating 'reviews' table...");
    sqlx::query(CREATE_REVIEWS_TABLE).execute(pool).await?;
    info!("Database schema creation complete");
    Ok(())
}
