//! Review Cleaner
//!
//! Maps scraper column names onto the canonical schema, drops rows missing a
//! required field, normalizes dates to `YYYY-MM-DD` and ratings to integers,
//! then removes duplicates on `(review, date, bank)`.
//!
//! The duplicate key merges two different users posting the same text for the
//! same bank on the same day. That is accepted behavior.

use crate::dataset::text_column;
use crate::error::Result;
use crate::model::{
    COLUMN_ALIASES, COL_BANK, COL_DATE, COL_RATING, COL_REVIEW, MAX_RATING, MIN_RATING,
    REQUIRED_COLUMNS,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use polars::prelude::*;
use tracing::{error, info};

/// Row counts for each cleaning step
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleaningStats {
    pub rows_in: usize,
    pub renamed: Vec<(String, String)>,
    pub missing_removed: usize,
    pub bad_dates_removed: usize,
    pub bad_ratings_removed: usize,
    pub duplicates_removed: usize,
    pub rows_out: usize,
}

#[derive(Debug)]
pub enum CleanOutcome {
    Cleaned { frame: DataFrame, stats: CleaningStats },
    /// Required columns absent after aliasing; nothing was cleaned
    MissingColumns {
        missing: Vec<String>,
        available: Vec<String>,
    },
}

impl CleanOutcome {
    /// The cleaned frame, or an empty frame when the schema check failed
    pub fn into_frame(self) -> DataFrame {
        match self {
            CleanOutcome::Cleaned { frame, .. } => frame,
            CleanOutcome::MissingColumns { .. } => DataFrame::empty(),
        }
    }

    pub fn stats(&self) -> Option<&CleaningStats> {
        match self {
            CleanOutcome::Cleaned { stats, .. } => Some(stats),
            CleanOutcome::MissingColumns { .. } => None,
        }
    }
}

/// Rename known alternate columns to their canonical names.
/// A canonical column that already exists is never overwritten.
pub fn apply_aliases(df: &mut DataFrame) -> Result<Vec<(String, String)>> {
    let mut renamed = Vec::new();

    for (alias, canonical) in COLUMN_ALIASES {
        let (has_alias, has_canonical) = {
            let names = df.get_column_names();
            (names.contains(&alias), names.contains(&canonical))
        };

        if has_alias && !has_canonical {
            df.rename(alias, canonical)?;
            renamed.push((alias.to_string(), canonical.to_string()));
        }
    }

    if !renamed.is_empty() {
        info!("Renamed columns: {:?}", renamed);
    }
    Ok(renamed)
}

/// Required canonical columns that are not present
pub fn missing_required(df: &DataFrame) -> Vec<String> {
    let names = df.get_column_names();
    REQUIRED_COLUMNS
        .iter()
        .filter(|c| !names.contains(*c))
        .map(|c| c.to_string())
        .collect()
}

pub fn clean_reviews(mut df: DataFrame) -> Result<CleanOutcome> {
    let mut stats = CleaningStats {
        rows_in: df.height(),
        ..Default::default()
    };
    info!("Starting initial cleaning: column validation, missing values, dates, duplicates");

    stats.renamed = apply_aliases(&mut df)?;

    let missing = missing_required(&df);
    if !missing.is_empty() {
        let available: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
        error!("Required columns missing after renaming: {:?}", missing);
        error!("Available columns: {:?}", available);
        return Ok(CleanOutcome::MissingColumns { missing, available });
    }

    for column in REQUIRED_COLUMNS {
        let as_text = df.column(column)?.cast(&DataType::String)?;
        df.with_column(as_text)?;
    }

    // Missing or blank required fields
    let before = df.height();
    let mut keep = vec![true; before];
    for column in REQUIRED_COLUMNS {
        let ca = text_column(&df, column)?;
        for (idx, value) in ca.into_iter().enumerate() {
            if value.map_or(true, |v| v.trim().is_empty()) {
                keep[idx] = false;
            }
        }
    }
    df = df.filter(&BooleanChunked::from_slice("keep", &keep))?;
    stats.missing_removed = before - df.height();
    info!("Removed {} rows with missing critical data", stats.missing_removed);

    // Dates
    let before = df.height();
    let dates: Vec<Option<String>> = text_column(&df, COL_DATE)?
        .into_iter()
        .map(|v| v.and_then(normalize_date))
        .collect();
    let keep: Vec<bool> = dates.iter().map(Option::is_some).collect();
    df.with_column(Series::new(COL_DATE, dates))?;
    df = df.filter(&BooleanChunked::from_slice("keep", &keep))?;
    stats.bad_dates_removed = before - df.height();
    info!(
        "Date column normalized to YYYY-MM-DD ({} unparseable rows dropped)",
        stats.bad_dates_removed
    );

    // Ratings
    let before = df.height();
    let ratings: Vec<Option<String>> = text_column(&df, COL_RATING)?
        .into_iter()
        .map(|v| v.and_then(normalize_rating).map(|r| r.to_string()))
        .collect();
    let keep: Vec<bool> = ratings.iter().map(Option::is_some).collect();
    df.with_column(Series::new(COL_RATING, ratings))?;
    df = df.filter(&BooleanChunked::from_slice("keep", &keep))?;
    stats.bad_ratings_removed = before - df.height();
    if stats.bad_ratings_removed > 0 {
        info!("Removed {} rows with a rating outside 1-5", stats.bad_ratings_removed);
    }

    // Duplicates, first occurrence wins
    let before = df.height();
    df = df
        .lazy()
        .unique_stable(
            Some(vec![
                COL_REVIEW.to_string(),
                COL_DATE.to_string(),
                COL_BANK.to_string(),
            ]),
            UniqueKeepStrategy::First,
        )
        .collect()?;
    stats.duplicates_removed = before - df.height();
    info!("Removed {} duplicate rows", stats.duplicates_removed);

    stats.rows_out = df.height();
    info!(
        "Initial cleaning complete: {} -> {} reviews ({} dropped)",
        stats.rows_in,
        stats.rows_out,
        stats.rows_in - stats.rows_out
    );

    Ok(CleanOutcome::Cleaned { frame: df, stats })
}

/// Parse the timestamp shapes scrapers and spreadsheets produce into `YYYY-MM-DD`.
/// Offsets are converted to UTC before the calendar date is taken.
pub fn normalize_date(raw: &str) -> Option<String> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }

    let date = parse_date(value)?;
    Some(date.format("%Y-%m-%d").to_string())
}

/// Calendar date of a timestamp in any accepted shape
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let value = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(date);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc).date_naive());
    }

    if let Ok(dt) = DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(dt.with_timezone(&Utc).date_naive());
    }

    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(dt.date());
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(value, "%m/%d/%Y") {
        return Some(date);
    }

    // Unix epoch, seconds or milliseconds
    if value.len() >= 9 && value.chars().all(|c| c.is_ascii_digit()) {
        let raw: i64 = value.parse().ok()?;
        let secs = if raw >= 1_000_000_000_000 { raw / 1000 } else { raw };
        return DateTime::<Utc>::from_timestamp(secs, 0).map(|dt| dt.date_naive());
    }

    None
}

/// Integer star rating in 1..=5. Integral float text such as `4.0` is accepted.
pub fn normalize_rating(raw: &str) -> Option<i64> {
    let value = raw.trim();
    let rating = match value.parse::<i64>() {
        Ok(r) => r,
        Err(_) => {
            let f = value.parse::<f64>().ok()?;
            if !f.is_finite() || f.fract() != 0.0 {
                return None;
            }
            f as i64
        }
    };

    (MIN_RATING..=MAX_RATING).contains(&rating).then_some(rating)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn cleaned(df: DataFrame) -> (DataFrame, CleaningStats) {
        match clean_reviews(df).unwrap() {
            CleanOutcome::Cleaned { frame, stats } => (frame, stats),
            other => panic!("expected cleaned batch, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_by_natural_key_removed() {
        let df = df![
            "review" => ["Good app", "Good app", "Slow transfers"],
            "rating" => ["5", "5", "2"],
            "date" => ["2024-03-01", "2024-03-01 18:22:10", "2024-03-01"],
            "bank" => ["X", "X", "X"],
        ]
        .unwrap();

        let (frame, stats) = cleaned(df);
        assert_eq!(frame.height(), 2);
        assert_eq!(stats.duplicates_removed, 1);

        let reviews = text_column(&frame, "review").unwrap();
        assert_eq!(reviews.get(0), Some("Good app"));
        assert_eq!(reviews.get(1), Some("Slow transfers"));
    }

    #[test]
    fn test_scraper_columns_are_aliased() {
        let df = df![
            "content" => ["Works well"],
            "score" => ["4"],
            "at" => ["2024-01-05T09:15:00"],
            "bank_name" => ["BOA"],
        ]
        .unwrap();

        let (frame, stats) = cleaned(df);
        assert_eq!(frame.height(), 1);
        assert_eq!(stats.renamed.len(), 4);
        assert_eq!(text_column(&frame, "date").unwrap().get(0), Some("2024-01-05"));
        assert_eq!(text_column(&frame, "bank").unwrap().get(0), Some("BOA"));
    }

    #[test]
    fn test_alias_does_not_overwrite_canonical() {
        let mut df = df![
            "review" => ["canonical text"],
            "content" => ["alias text"],
        ]
        .unwrap();

        let renamed = apply_aliases(&mut df).unwrap();
        assert!(renamed.is_empty());
        assert_eq!(text_column(&df, "review").unwrap().get(0), Some("canonical text"));
        assert!(df.column("content").is_ok());
    }

    #[test]
    fn test_missing_columns_gives_empty_result() {
        let df = df![
            "review" => ["text"],
            "rating" => ["5"],
        ]
        .unwrap();

        let outcome = clean_reviews(df).unwrap();
        match &outcome {
            CleanOutcome::MissingColumns { missing, .. } => {
                assert_eq!(missing, &vec!["date".to_string(), "bank".to_string()]);
            }
            other => panic!("expected missing columns, got {:?}", other),
        }
        assert_eq!(outcome.into_frame().height(), 0);
    }

    #[test]
    fn test_rows_missing_fields_or_bad_dates_dropped() {
        let df = df![
            "review" => [Some("ok"), None, Some("   "), Some("fine"), Some("bad date"), Some("bad rating")],
            "rating" => [Some("5"), Some("3"), Some("4"), None, Some("2"), Some("9")],
            "date" => [Some("2024-02-02"), Some("2024-02-02"), Some("2024-02-02"), Some("2024-02-02"), Some("not a date"), Some("2024-02-02")],
            "bank" => [Some("CBE"), Some("CBE"), Some("CBE"), Some("CBE"), Some("CBE"), Some("CBE")],
        ]
        .unwrap();

        let (frame, stats) = cleaned(df);
        assert_eq!(frame.height(), 1);
        assert_eq!(stats.missing_removed, 3);
        assert_eq!(stats.bad_dates_removed, 1);
        assert_eq!(stats.bad_ratings_removed, 1);
    }

    #[test]
    fn test_no_nulls_and_no_duplicate_keys_after_cleaning() {
        let texts = ["a", "b", "", "a", "c", "b", "a"];
        let banks = [Some("X"), Some("Y"), Some("X"), Some("X"), None, Some("Y"), Some("Y")];
        let dates = ["2024-01-01", "2024-01-01", "2024-01-02", "2024-01-01", "2024-01-03", "2024-01-01T10:00:00", "2024-01-01"];
        let df = df![
            "review" => texts,
            "rating" => ["1", "2", "3", "4.0", "5", "2", "3"],
            "date" => dates,
            "bank" => banks,
        ]
        .unwrap();

        let (frame, _) = cleaned(df);
        let mut keys = HashSet::new();
        for i in 0..frame.height() {
            let review = text_column(&frame, "review").unwrap().get(i).map(str::to_string);
            let rating = text_column(&frame, "rating").unwrap().get(i).map(str::to_string);
            let date = text_column(&frame, "date").unwrap().get(i).map(str::to_string);
            let bank = text_column(&frame, "bank").unwrap().get(i).map(str::to_string);
            assert!(review.is_some() && rating.is_some() && date.is_some() && bank.is_some());
            assert!(keys.insert((review, date, bank)));
        }
        // (a, X), (b, Y), (a, Y)
        assert_eq!(frame.height(), 3);
    }

    #[test]
    fn test_normalize_date_shapes() {
        assert_eq!(normalize_date("2024-05-01").as_deref(), Some("2024-05-01"));
        assert_eq!(normalize_date("2024-05-01 23:59:59").as_deref(), Some("2024-05-01"));
        assert_eq!(normalize_date("2024-05-01T23:59:59.123").as_deref(), Some("2024-05-01"));
        assert_eq!(normalize_date("2024-05-01T23:30:00-02:00").as_deref(), Some("2024-05-02"));
        assert_eq!(normalize_date("2024-05-01 10:00:00+00:00").as_deref(), Some("2024-05-01"));
        assert_eq!(normalize_date("05/01/2024").as_deref(), Some("2024-05-01"));
        assert_eq!(normalize_date("1714521600").as_deref(), Some("2024-05-01"));
        assert_eq!(normalize_date("2024-13-01"), None);
        assert_eq!(normalize_date("yesterday"), None);
        assert_eq!(normalize_date(""), None);
    }

    #[test]
    fn test_normalize_rating() {
        assert_eq!(normalize_rating("5"), Some(5));
        assert_eq!(normalize_rating(" 3.0 "), Some(3));
        assert_eq!(normalize_rating("0"), None);
        assert_eq!(normalize_rating("6"), None);
        assert_eq!(normalize_rating("4.5"), None);
        assert_eq!(normalize_rating("five"), None);
    }
}
