//! Review Loader
//!
//! Phase 1 upserts one `banks` row per distinct bank name and builds the
//! name → `bank_id` map. Phase 2 bulk-inserts `reviews` keyed by
//! `review_id_generated`; rows already present are skipped by the database,
//! so loading the same file twice changes nothing. All review pages go through
//! one transaction and a failing page rolls back the whole batch.

use crate::config::PipelineConfig;
use crate::db::connection::init_pool;
use crate::db::schema::create_tables;
use crate::error::{PipelineError, Result};
use crate::model::{Bank, DEFAULT_SOURCE};
use crate::preprocess::cleaner::{normalize_rating, parse_date};
use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::collections::HashMap;
use std::path::Path;
use tracing::{error, info, warn};

/// One line of the loader input file
#[derive(Debug, Deserialize)]
struct InputRow {
    review: Option<String>,
    review_text: Option<String>,
    rating: Option<String>,
    date: Option<String>,
    bank: Option<String>,
    app_name: Option<String>,
    source: Option<String>,
    review_preprocessed: Option<String>,
    sentiment_label: Option<String>,
    sentiment_score: Option<String>,
    identified_theme: Option<String>,
    review_id_generated: Option<String>,
}

/// A review ready for insertion
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedReview {
    pub generated_id: i32,
    pub bank: String,
    pub app_name: Option<String>,
    pub text: String,
    pub preprocessed: Option<String>,
    pub rating: i32,
    pub date: Option<NaiveDate>,
    pub sentiment_label: Option<String>,
    pub sentiment_score: Option<f64>,
    pub theme: Option<String>,
    pub source: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub rows_read: usize,
    pub rows_skipped: usize,
    pub banks_seen: usize,
    pub banks_inserted: usize,
    pub reviews_submitted: usize,
    pub reviews_inserted: u64,
    /// Reviews whose bank could not be resolved to an id
    pub reviews_unresolved: usize,
}

impl LoadSummary {
    /// Submitted reviews the database already held
    pub fn reviews_existing(&self) -> u64 {
        (self.reviews_submitted.saturating_sub(self.reviews_unresolved) as u64)
            .saturating_sub(self.reviews_inserted)
    }

    pub fn print(&self) {
        println!("\n{}", "=".repeat(60));
        println!("🗄️  DATABASE LOAD SUMMARY");
        println!("{}", "=".repeat(60));
        println!("   Rows read:          {}", self.rows_read);
        println!("   Rows skipped:       {}", self.rows_skipped);
        println!("   Banks in batch:     {} ({} new)", self.banks_seen, self.banks_inserted);
        println!("   Reviews submitted:  {}", self.reviews_submitted);
        println!("   Reviews inserted:   {}", self.reviews_inserted);
        println!("   Already present:    {}", self.reviews_existing());
        if self.reviews_unresolved > 0 {
            println!("   ⚠️  Unresolved bank: {}", self.reviews_unresolved);
        }
        println!("{}", "=".repeat(60));
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Column widths of the `banks` and `reviews` tables
const BANK_NAME_MAX: usize = 100;
const APP_NAME_MAX: usize = 100;
const SENTIMENT_LABEL_MAX: usize = 10;
const THEME_MAX: usize = 50;
const SOURCE_MAX: usize = 50;

fn check_width(field: &str, value: Option<&str>, max: usize) -> std::result::Result<(), String> {
    match value {
        Some(v) if v.chars().count() > max => {
            Err(format!("{} longer than {} characters: {:?}", field, max, v))
        }
        _ => Ok(()),
    }
}

/// NUMERIC(5,4) holds values that round to at most 9.9999 at four decimals
fn fits_numeric_5_4(score: f64) -> bool {
    (score * 10_000.0).round().abs() < 100_000.0
}

impl InputRow {
    /// Validate one row. `position` is its 0-based index in the file and
    /// becomes the generated id when the file carries none.
    fn prepare(self, position: usize) -> std::result::Result<PreparedReview, String> {
        let text = non_empty(self.review)
            .or_else(|| non_empty(self.review_text))
            .ok_or("missing review text")?;
        let bank = non_empty(self.bank).ok_or("missing bank")?;
        let rating_raw = self.rating.unwrap_or_default();
        let rating = normalize_rating(&rating_raw)
            .ok_or_else(|| format!("invalid rating {:?}", rating_raw))? as i32;

        let generated_id = match non_empty(self.review_id_generated) {
            Some(raw) => parse_generated_id(&raw)?,
            None => i32::try_from(position).map_err(|_| format!("row position {} out of range", position))?,
        };

        let sentiment_score = match non_empty(self.sentiment_score) {
            Some(raw) => {
                let score: f64 = raw
                    .trim()
                    .parse()
                    .map_err(|_| format!("invalid sentiment score {:?}", raw))?;
                if score.is_nan() {
                    None
                } else if !fits_numeric_5_4(score) {
                    return Err(format!("sentiment score {} does not fit NUMERIC(5,4)", score));
                } else {
                    Some(score)
                }
            }
            None => None,
        };

        let app_name = non_empty(self.app_name);
        let sentiment_label = non_empty(self.sentiment_label);
        let theme = non_empty(self.identified_theme);
        let source = non_empty(self.source).unwrap_or_else(|| DEFAULT_SOURCE.to_string());

        check_width("bank", Some(bank.as_str()), BANK_NAME_MAX)?;
        check_width("app_name", app_name.as_deref(), APP_NAME_MAX)?;
        check_width("sentiment_label", sentiment_label.as_deref(), SENTIMENT_LABEL_MAX)?;
        check_width("identified_theme", theme.as_deref(), THEME_MAX)?;
        check_width("source", Some(source.as_str()), SOURCE_MAX)?;

        Ok(PreparedReview {
            generated_id,
            bank,
            app_name,
            text,
            preprocessed: non_empty(self.review_preprocessed),
            rating,
            date: self.date.as_deref().and_then(parse_date),
            sentiment_label,
            sentiment_score,
            theme,
            source,
        })
    }
}

fn parse_generated_id(raw: &str) -> std::result::Result<i32, String> {
    let value = raw.trim();
    if let Ok(id) = value.parse::<i32>() {
        return Ok(id);
    }
    match value.parse::<f64>() {
        Ok(f) if f.fract() == 0.0 && f >= i32::MIN as f64 && f <= i32::MAX as f64 => Ok(f as i32),
        _ => Err(format!("invalid review_id_generated {:?}", raw)),
    }
}

/// Read the loader input CSV. Invalid rows are logged and skipped.
pub fn read_reviews(path: &Path) -> Result<(Vec<PreparedReview>, usize)> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|e| {
            error!("Input file not found or unreadable: {}", path.display());
            PipelineError::Csv(e)
        })?;

    let mut reviews = Vec::new();
    let mut skipped = 0;
    for (position, result) in reader.deserialize::<InputRow>().enumerate() {
        let prepared = result
            .map_err(|e| e.to_string())
            .and_then(|row| row.prepare(position));
        match prepared {
            Ok(review) => reviews.push(review),
            Err(reason) => {
                warn!("Skipping row {}: {}", position, reason);
                skipped += 1;
            }
        }
    }

    info!("Loaded {} reviews for database storage ({} skipped)", reviews.len(), skipped);
    Ok((reviews, skipped))
}

/// Distinct banks in order of first appearance. The app name is the first one
/// seen for the bank, or a name derived from the bank.
pub fn banks_in_batch(reviews: &[PreparedReview]) -> Vec<Bank> {
    let mut banks: Vec<Bank> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut has_app_name: Vec<bool> = Vec::new();

    for review in reviews {
        match index.get(review.bank.as_str()) {
            Some(&pos) => {
                if !has_app_name[pos] {
                    if let Some(app_name) = &review.app_name {
                        banks[pos].app_name = app_name.clone();
                        has_app_name[pos] = true;
                    }
                }
            }
            None => {
                index.insert(review.bank.as_str(), banks.len());
                has_app_name.push(review.app_name.is_some());
                banks.push(Bank {
                    name: review.bank.clone(),
                    app_name: review
                        .app_name
                        .clone()
                        .unwrap_or_else(|| Bank::fallback_app_name(&review.bank)),
                });
            }
        }
    }

    banks
}

pub struct Loader {
    pool: PgPool,
    page_size: usize,
}

impl Loader {
    pub fn new(pool: PgPool, page_size: usize) -> Self {
        Self {
            pool,
            page_size: page_size.max(1),
        }
    }

    /// Insert missing banks and return the id of every bank in `banks`.
    /// Also returns how many rows were newly inserted.
    pub async fn upsert_banks(&self, banks: &[Bank]) -> Result<(HashMap<String, i32>, usize)> {
        info!("Inserting {} unique bank entries...", banks.len());
        let mut ids = HashMap::new();
        let mut inserted = 0;

        for bank in banks {
            let created: Option<i32> = sqlx::query_scalar(
                "INSERT INTO banks (bank_name, app_name) VALUES ($1, $2) \
                 ON CONFLICT (bank_name) DO NOTHING RETURNING bank_id",
            )
            .bind(&bank.name)
            .bind(&bank.app_name)
            .fetch_optional(&self.pool)
            .await?;

            let bank_id = match created {
                Some(id) => {
                    inserted += 1;
                    id
                }
                None => {
                    let existing: Option<i32> =
                        sqlx::query_scalar("SELECT bank_id FROM banks WHERE bank_name = $1")
                            .bind(&bank.name)
                            .fetch_optional(&self.pool)
                            .await?;
                    match existing {
                        Some(id) => id,
                        None => {
                            error!("Failed to find or insert bank: {}", bank.name);
                            continue;
                        }
                    }
                }
            };
            ids.insert(bank.name.clone(), bank_id);
        }

        info!("Bank ID mapping created: {:?}", ids);
        Ok((ids, inserted))
    }

    /// Bulk insert reviews. Returns the number of rows actually inserted.
    pub async fn insert_reviews(
        &self,
        reviews: &[(i32, &PreparedReview)],
    ) -> Result<u64> {
        info!("Starting bulk insertion of {} review records...", reviews.len());
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0u64;

        for page in reviews.chunks(self.page_size) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO reviews (bank_id, review_id_generated, review_text, review_preprocessed, \
                 rating, review_date, sentiment_label, sentiment_score, identified_theme, source) ",
            );
            builder.push_values(page, |mut row, (bank_id, review)| {
                row.push_bind(*bank_id)
                    .push_bind(review.generated_id)
                    .push_bind(review.text.clone())
                    .push_bind(review.preprocessed.clone())
                    .push_bind(review.rating)
                    .push_bind(review.date)
                    .push_bind(review.sentiment_label.clone())
                    .push("CAST(")
                    .push_bind_unseparated(review.sentiment_score)
                    .push_unseparated(" AS NUMERIC(5, 4))")
                    .push_bind(review.theme.clone())
                    .push_bind(review.source.clone());
            });
            builder.push(" ON CONFLICT (review_id_generated) DO NOTHING");

            match builder.build().execute(&mut *tx).await {
                Ok(result) => inserted += result.rows_affected(),
                Err(e) => {
                    error!("Error during bulk insert, rolling back: {}", e);
                    tx.rollback().await?;
                    return Err(PipelineError::Database(format!("bulk insert failed: {}", e)));
                }
            }
        }

        tx.commit().await?;
        info!("Bulk insertion complete: {} new rows", inserted);
        Ok(inserted)
    }

    /// Both phases for one batch
    pub async fn load(&self, reviews: &[PreparedReview]) -> Result<LoadSummary> {
        let banks = banks_in_batch(reviews);
        let (bank_ids, banks_inserted) = self.upsert_banks(&banks).await?;

        let mut resolved = Vec::with_capacity(reviews.len());
        let mut unresolved = 0;
        for review in reviews {
            match bank_ids.get(&review.bank) {
                Some(&bank_id) => resolved.push((bank_id, review)),
                None => unresolved += 1,
            }
        }
        if unresolved > 0 {
            warn!("{} reviews reference a bank without an id and were not loaded", unresolved);
        }

        let reviews_inserted = self.insert_reviews(&resolved).await?;

        Ok(LoadSummary {
            rows_read: reviews.len(),
            rows_skipped: 0,
            banks_seen: banks.len(),
            banks_inserted,
            reviews_submitted: reviews.len(),
            reviews_inserted,
            reviews_unresolved: unresolved,
        })
    }
}

/// Run the stage: loader input file into PostgreSQL
pub async fn run(config: &PipelineConfig, input: &Path) -> Result<LoadSummary> {
    let db = config.database()?;
    let (reviews, skipped) = read_reviews(input)?;
    if reviews.is_empty() {
        return Err(PipelineError::Empty(format!("no loadable reviews in {}", input.display())));
    }

    let pool = init_pool(db).await?;
    create_tables(&pool).await?;

    let loader = Loader::new(pool.clone(), config.loader.page_size);
    let mut summary = loader.load(&reviews).await?;
    summary.rows_read += skipped;
    summary.rows_skipped = skipped;

    pool.close().await;
    info!("PostgreSQL connection closed");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_input(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_read_processed_file_uses_row_positions() {
        let file = write_input(
            "review,rating,date,bank,app_name,app_id,source,scraped_at\n\
             Great app,5,2024-03-01,CBE,Commercial Bank of Ethiopia,com.x,Google Play,2024-03-05 10:00:00\n\
             Keeps crashing,1,2024-03-02,BOA,Bank of Abyssinia,com.y,Google Play,2024-03-05 10:00:00\n",
        );

        let (reviews, skipped) = read_reviews(file.path()).unwrap();
        assert_eq!(skipped, 0);
        assert_eq!(reviews.len(), 2);
        assert_eq!(reviews[0].generated_id, 0);
        assert_eq!(reviews[1].generated_id, 1);
        assert_eq!(reviews[1].rating, 1);
        assert_eq!(reviews[0].date, NaiveDate::from_ymd_opt(2024, 3, 1));
        assert_eq!(reviews[0].sentiment_score, None);
        assert_eq!(reviews[0].theme, None);
    }

    #[test]
    fn test_enriched_file_fields_and_nulls() {
        let file = write_input(
            "review_id_generated,review_text,rating,date,bank,sentiment_label,sentiment_score,identified_theme\n\
             17,Login fails,2.0,2024-01-09,Dashen,NEGATIVE,0.1234,Account Access\n\
             18,Nice,5,2024-01-10,Dashen,POSITIVE,,\n",
        );

        let (reviews, _) = read_reviews(file.path()).unwrap();
        assert_eq!(reviews[0].generated_id, 17);
        assert_eq!(reviews[0].text, "Login fails");
        assert_eq!(reviews[0].rating, 2);
        assert_eq!(reviews[0].sentiment_score, Some(0.1234));
        assert_eq!(reviews[0].theme.as_deref(), Some("Account Access"));
        assert_eq!(reviews[0].source, DEFAULT_SOURCE);
        assert_eq!(reviews[1].sentiment_score, None);
        assert_eq!(reviews[1].theme, None);
    }

    #[test]
    fn test_invalid_rows_skipped() {
        let file = write_input(
            "review,rating,date,bank\n\
             ok,4,2024-01-01,CBE\n\
             ,4,2024-01-01,CBE\n\
             bad rating,7,2024-01-01,CBE\n\
             no bank,3,2024-01-01,\n",
        );

        let (reviews, skipped) = read_reviews(file.path()).unwrap();
        assert_eq!(reviews.len(), 1);
        assert_eq!(skipped, 3);
    }

    #[test]
    fn test_review_column_preferred_over_review_text() {
        let file = write_input(
            "review,review_text,rating,date,bank
             Scraped text,Other text,4,2024-01-01,CBE
             ,Only review_text,3,2024-01-02,CBE
",
        );

        let (reviews, skipped) = read_reviews(file.path()).unwrap();
        assert_eq!(skipped, 0);
        assert_eq!(reviews[0].text, "Scraped text");
        assert_eq!(reviews[1].text, "Only review_text");
    }

    #[test]
    fn test_sentiment_score_must_fit_four_decimals() {
        let file = write_input(
            "review,rating,date,bank,sentiment_score
             a,4,2024-01-01,CBE,9.99996
             b,4,2024-01-01,CBE,9.99994
             c,4,2024-01-01,CBE,-10
             d,4,2024-01-01,CBE,0.5
",
        );

        let (reviews, skipped) = read_reviews(file.path()).unwrap();
        assert_eq!(skipped, 2);
        let texts: Vec<_> = reviews.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["b", "d"]);
        assert!(fits_numeric_5_4(-9.9999));
    }

    #[test]
    fn test_values_wider_than_columns_skipped() {
        let long_theme = "T".repeat(51);
        let file = write_input(&format!(
            "review,rating,date,bank,sentiment_label,identified_theme
             ok,4,2024-01-01,CBE,NEGATIVE,{}
             label,4,2024-01-01,CBE,VERY_NEGATIVE,Speed
             theme,4,2024-01-01,CBE,NEGATIVE,{}
             fits,4,2024-01-01,CBE,NEGATIVE,Speed
",
            "T".repeat(50),
            long_theme,
        ));

        let (reviews, skipped) = read_reviews(file.path()).unwrap();
        assert_eq!(skipped, 2);
        let texts: Vec<_> = reviews.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["ok", "fits"]);
    }

    #[test]
    fn test_width_counts_characters() {
        let fits = "é".repeat(50);
        let too_long = "é".repeat(51);
        assert!(check_width("identified_theme", Some(fits.as_str()), THEME_MAX).is_ok());
        assert!(check_width("identified_theme", Some(too_long.as_str()), THEME_MAX).is_err());
        assert!(check_width("sentiment_label", None, SENTIMENT_LABEL_MAX).is_ok());
    }

    #[test]
    fn test_banks_in_batch_first_seen_with_app_name() {
        let review = |bank: &str, app: Option<&str>| PreparedReview {
            generated_id: 0,
            bank: bank.to_string(),
            app_name: app.map(str::to_string),
            text: "t".to_string(),
            preprocessed: None,
            rating: 3,
            date: None,
            sentiment_label: None,
            sentiment_score: None,
            theme: None,
            source: DEFAULT_SOURCE.to_string(),
        };

        let banks = banks_in_batch(&[
            review("W", None),
            review("CBE", Some("Commercial Bank of Ethiopia")),
            review("W", Some("W Bank App")),
            review("CBE", Some("Other")),
            review("V", None),
        ]);

        assert_eq!(banks.len(), 3);
        assert_eq!(banks[0].name, "W");
        assert_eq!(banks[0].app_name, "W Bank App");
        assert_eq!(banks[1].app_name, "Commercial Bank of Ethiopia");
        assert_eq!(banks[2].app_name, "V Mobile App");
    }

    #[test]
    fn test_generated_id_parsing() {
        assert_eq!(parse_generated_id("42"), Ok(42));
        assert_eq!(parse_generated_id("42.0"), Ok(42));
        assert!(parse_generated_id("4.2").is_err());
        assert!(parse_generated_id("x").is_err());
    }
}
