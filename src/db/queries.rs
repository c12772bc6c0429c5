//! Read-side queries for reporting and connection checks

use crate::error::{PipelineError, Result};
use sqlx::{FromRow, PgPool};

/// Review volume and mean sentiment for one bank in one calendar month
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct MonthlyTrend {
    pub review_year: i32,
    pub review_month: i32,
    pub bank_name: String,
    pub total_reviews: i64,
    pub average_sentiment: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct RatingCount {
    pub bank_name: String,
    pub rating: i32,
    pub rating_count: i64,
}

/// A review carrying a theme, with its bank
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct ThemedReview {
    pub bank_name: String,
    pub review_text: Option<String>,
    pub sentiment_score: Option<f64>,
    pub identified_theme: String,
}

pub struct ReportRepository {
    pool: PgPool,
}

impl ReportRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Monthly review counts and mean sentiment per bank, oldest month first
    pub async fn monthly_trends(&self) -> Result<Vec<MonthlyTrend>> {
        sqlx::query_as::<_, MonthlyTrend>(
            r#"
            SELECT
                EXTRACT(YEAR FROM r.review_date)::int4 AS review_year,
                EXTRACT(MONTH FROM r.review_date)::int4 AS review_month,
                b.bank_name,
                COUNT(r.review_pk) AS total_reviews,
                AVG(r.sentiment_score)::float8 AS average_sentiment
            FROM reviews r
            JOIN banks b ON r.bank_id = b.bank_id
            WHERE r.review_date IS NOT NULL
            GROUP BY 1, 2, b.bank_name
            ORDER BY 1, 2, b.bank_name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PipelineError::Database(format!("Failed to load monthly trends: {}", e)))
    }

    /// Count of reviews per bank and star rating
    pub async fn rating_distribution(&self) -> Result<Vec<RatingCount>> {
        sqlx::query_as::<_, RatingCount>(
            r#"
            SELECT b.bank_name, r.rating, COUNT(*) AS rating_count
            FROM reviews r
            JOIN banks b ON r.bank_id = b.bank_id
            GROUP BY b.bank_name, r.rating
            ORDER BY b.bank_name, r.rating
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PipelineError::Database(format!("Failed to load rating distribution: {}", e)))
    }

    /// Reviews with a non-null theme
    pub async fn themed_reviews(&self) -> Result<Vec<ThemedReview>> {
        sqlx::query_as::<_, ThemedReview>(
            r#"
            SELECT b.bank_name, r.review_text, r.sentiment_score::float8 AS sentiment_score,
                   r.identified_theme
            FROM reviews r
            JOIN banks b ON r.bank_id = b.bank_id
            WHERE r.identified_theme IS NOT NULL
            ORDER BY r.review_pk
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PipelineError::Database(format!("Failed to load themed reviews: {}", e)))
    }

    pub async fn count_banks(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM banks")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn count_reviews(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM reviews")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Reviews whose bank reference does not resolve. Always zero while the
    /// foreign key holds.
    pub async fn orphan_reviews(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM reviews r
            LEFT JOIN banks b ON r.bank_id = b.bank_id
            WHERE b.bank_id IS NULL
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Review count per bank name, alphabetical
    pub async fn reviews_per_bank(&self) -> Result<Vec<(String, i64)>> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT b.bank_name, COUNT(r.review_pk)
            FROM banks b
            LEFT JOIN reviews r ON r.bank_id = b.bank_id
            GROUP BY b.bank_name
            ORDER BY b.bank_name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
