//! Review batches as polars DataFrames, and their CSV files

use crate::error::{PipelineError, Result};
use crate::model::RawReview;
use itertools::Itertools;
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use tracing::info;

/// Read a stage CSV with every column as text.
/// Type coercion is the cleaner's job, so nothing is inferred here.
pub fn read_csv(path: &Path) -> Result<DataFrame> {
    if !path.exists() {
        return Err(PipelineError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Input file not found: {}", path.display()),
        )));
    }

    let df = LazyCsvReader::new(path)
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .finish()?
        .collect()?;

    info!("Loaded {} reviews from {}", df.height(), path.display());
    Ok(df)
}

/// Write a batch to CSV, creating the parent directory if needed
pub fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = File::create(path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .with_separator(b',')
        .finish(df)?;

    info!("Saved {} reviews to {}", df.height(), path.display());
    Ok(())
}

/// Build the collector's raw frame, one column per `RawReview` field
pub fn raw_reviews_to_frame(reviews: &[RawReview]) -> Result<DataFrame> {
    let review_text: Vec<Option<&str>> = reviews.iter().map(|r| r.review_text.as_deref()).collect();
    let rating: Vec<Option<i64>> = reviews.iter().map(|r| r.rating).collect();
    let date: Vec<Option<&str>> = reviews.iter().map(|r| r.date.as_deref()).collect();
    let bank: Vec<&str> = reviews.iter().map(|r| r.bank.as_str()).collect();
    let app_name: Vec<&str> = reviews.iter().map(|r| r.app_name.as_str()).collect();
    let app_id: Vec<&str> = reviews.iter().map(|r| r.app_id.as_str()).collect();
    let source: Vec<&str> = reviews.iter().map(|r| r.source.as_str()).collect();
    let scraped_at: Vec<&str> = reviews.iter().map(|r| r.scraped_at.as_str()).collect();

    let df = DataFrame::new(vec![
        Series::new("review_text", review_text),
        Series::new("rating", rating),
        Series::new("date", date),
        Series::new("bank", bank),
        Series::new("app_name", app_name),
        Series::new("app_id", app_id),
        Series::new("source", source),
        Series::new("scraped_at", scraped_at),
    ])?;

    Ok(df)
}

/// A column as text, casting if it was read with another type
pub fn text_column(df: &DataFrame, name: &str) -> Result<StringChunked> {
    let series = df.column(name)?.cast(&DataType::String)?;
    Ok(series.str()?.clone())
}

/// Distinct non-null values of a column, in order of first appearance
pub fn distinct_in_order(ca: &StringChunked) -> Vec<String> {
    ca.into_iter().flatten().unique().map(str::to_string).collect()
}

/// Row count per group value, in order of first appearance
pub fn group_counts(df: &DataFrame, column: &str) -> Result<Vec<(String, usize)>> {
    let grouped = df
        .clone()
        .lazy()
        .select([col(column).cast(DataType::String)])
        .filter(col(column).is_not_null())
        .group_by_stable([col(column)])
        .agg([len().alias("rows")])
        .collect()?;

    let keys = grouped.column(column)?.str()?.clone();
    let rows = grouped.column("rows")?.cast(&DataType::UInt64)?;
    let rows = rows.u64()?;

    Ok(keys
        .into_iter()
        .zip(rows.into_iter())
        .filter_map(|(key, n)| Some((key?.to_string(), n? as usize)))
        .collect())
}
