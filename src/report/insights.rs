//! Per-bank theme insights: which themes drive satisfaction and which hurt it

use crate::db::queries::ThemedReview;
use crate::error::Result;
use itertools::Itertools;
use polars::prelude::*;
use std::fmt::Write;

/// Mean sentiment of one theme within one bank
#[derive(Debug, Clone, PartialEq)]
pub struct ThemeScore {
    pub theme: String,
    pub avg_sentiment: f64,
    /// Reviews with a sentiment score
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BankInsights {
    pub bank: String,
    pub drivers: Vec<ThemeScore>,
    pub pain_points: Vec<ThemeScore>,
}

/// Mean sentiment and scored-review count per `(bank_name, identified_theme)`,
/// keeping only themes with more than `min_count` scored reviews. Groups come
/// back in order of first appearance.
pub fn theme_summary(reviews: &[ThemedReview], min_count: usize) -> Result<DataFrame> {
    let banks: Vec<&str> = reviews.iter().map(|r| r.bank_name.as_str()).collect();
    let themes: Vec<&str> = reviews.iter().map(|r| r.identified_theme.as_str()).collect();
    let scores: Vec<Option<f64>> = reviews.iter().map(|r| r.sentiment_score).collect();

    let df = df![
        "bank_name" => banks,
        "identified_theme" => themes,
        "sentiment_score" => scores,
    ]?;

    let summary = df
        .lazy()
        .filter(col("sentiment_score").is_not_null())
        .group_by_stable([col("bank_name"), col("identified_theme")])
        .agg([
            col("sentiment_score").mean().alias("avg_sentiment"),
            col("sentiment_score").count().cast(DataType::UInt64).alias("count"),
        ])
        .filter(col("count").gt(lit(min_count as u64)))
        .collect()?;

    Ok(summary)
}

/// Top `top_n` drivers (highest mean) and pain points (lowest mean) per bank,
/// banks in order of first appearance
pub fn generate_insights(
    reviews: &[ThemedReview],
    min_count: usize,
    top_n: usize,
) -> Result<Vec<BankInsights>> {
    let summary = theme_summary(reviews, min_count)?;
    let bank_col = summary.column("bank_name")?.str()?;
    let theme_col = summary.column("identified_theme")?.str()?;
    let avg_col = summary.column("avg_sentiment")?.f64()?;
    let count_col = summary.column("count")?.u64()?;

    let mut scores_by_bank: Vec<(&str, Vec<ThemeScore>)> = reviews
        .iter()
        .map(|r| r.bank_name.as_str())
        .unique()
        .map(|bank| (bank, Vec::new()))
        .collect();

    for i in 0..summary.height() {
        if let (Some(bank), Some(theme), Some(avg), Some(count)) =
            (bank_col.get(i), theme_col.get(i), avg_col.get(i), count_col.get(i))
        {
            if let Some((_, scores)) = scores_by_bank.iter_mut().find(|(b, _)| *b == bank) {
                scores.push(ThemeScore {
                    theme: theme.to_string(),
                    avg_sentiment: avg,
                    count: count as usize,
                });
            }
        }
    }

    // Aggregation happens in polars; ranking the few themes left is simpler in Rust
    Ok(scores_by_bank
        .into_iter()
        .map(|(bank, scores)| {
            let mut drivers = scores.clone();
            drivers.sort_by(|a, b| b.avg_sentiment.total_cmp(&a.avg_sentiment));
            drivers.truncate(top_n);

            let mut pain_points = scores;
            pain_points.sort_by(|a, b| a.avg_sentiment.total_cmp(&b.avg_sentiment));
            pain_points.truncate(top_n);

            BankInsights {
                bank: bank.to_string(),
                drivers,
                pain_points,
            }
        })
        .collect())
}

fn write_table(out: &mut String, rows: &[ThemeScore]) {
    if rows.is_empty() {
        out.push_str("(no theme with enough reviews)\n");
        return;
    }
    let width = rows
        .iter()
        .map(|r| r.theme.chars().count())
        .max()
        .unwrap_or(0)
        .max("identified_theme".len());
    let _ = writeln!(out, "{:>width$}  avg_sentiment  count", "identified_theme", width = width);
    for row in rows {
        let _ = writeln!(
            out,
            "{:>width$}  {:>13.4}  {:>5}",
            row.theme,
            row.avg_sentiment,
            row.count,
            width = width
        );
    }
}

/// Render the plain-text insights report
pub fn render_insights(insights: &[BankInsights]) -> String {
    let mut out = String::from("--- BANK PERFORMANCE INSIGHTS ---\n\n");
    for bank in insights {
        let _ = writeln!(out, "BANK: {}", bank.bank);
        out.push_str("----------------------------\n");
        out.push_str("TOP DRIVERS:\n");
        write_table(&mut out, &bank.drivers);
        out.push('\n');
        out.push_str("TOP PAIN POINTS:\n");
        write_table(&mut out, &bank.pain_points);
        out.push('\n');
        out.push_str(&"-".repeat(30));
        out.push_str("\n\n");
    }
    out
}
