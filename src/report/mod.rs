//! Reporting stage: read aggregates back from the database and write charts
//! plus the plain-text insights file. Each artifact is independent; one that
//! fails is logged and the others are still produced.

pub mod charts;
pub mod insights;
pub mod keywords;

pub use insights::{generate_insights, render_insights, BankInsights, ThemeScore};
pub use keywords::top_keywords;

use crate::config::{PipelineConfig, ReportConfig};
use crate::db::connection::init_pool;
use crate::db::queries::{MonthlyTrend, RatingCount, ReportRepository, ThemedReview};
use crate::error::Result;
use std::path::{Path, PathBuf};
use tracing::{error, info};

pub const TREND_CHART: &str = "sentiment_trend.svg";
pub const RATING_CHART: &str = "rating_distribution.svg";
pub const KEYWORD_CHART: &str = "keyword_pain_points.svg";
pub const INSIGHTS_FILE: &str = "raw_insights.txt";

/// Data the reporter works from, as read from the database
#[derive(Debug, Clone, Default)]
pub struct ReportData {
    pub trends: Vec<MonthlyTrend>,
    pub ratings: Vec<RatingCount>,
    pub themed: Vec<ThemedReview>,
}

#[derive(Debug, Clone, Default)]
pub struct ReportSummary {
    pub written: Vec<PathBuf>,
    pub failed: Vec<(String, String)>,
    pub themed_reviews: usize,
    pub insights: Vec<BankInsights>,
}

impl ReportSummary {
    fn record(&mut self, name: &str, path: PathBuf, outcome: Result<()>) {
        match outcome {
            Ok(()) => {
                info!("Saved: {}", path.display());
                self.written.push(path);
            }
            Err(e) => {
                error!("Failed to produce {}: {}", name, e);
                self.failed.push((name.to_string(), e.to_string()));
            }
        }
    }

    pub fn print(&self) {
        println!("\n{}", "=".repeat(60));
        println!("📊 REPORT SUMMARY");
        println!("{}", "=".repeat(60));
        println!("   Themed reviews analysed: {}", self.themed_reviews);
        for path in &self.written {
            println!("   ✅ {}", path.display());
        }
        for (name, reason) in &self.failed {
            println!("   ❌ {}: {}", name, reason);
        }
        println!("{}", "=".repeat(60));
    }
}

/// Texts of themed reviews scoring below the pain threshold
pub fn pain_point_texts(themed: &[ThemedReview], threshold: f64) -> Vec<&str> {
    themed
        .iter()
        .filter(|r| r.sentiment_score.map_or(false, |s| s < threshold))
        .filter_map(|r| r.review_text.as_deref())
        .collect()
}

/// Write every artifact into `out_dir`
pub fn write_reports(data: &ReportData, config: &ReportConfig, out_dir: &Path) -> Result<ReportSummary> {
    std::fs::create_dir_all(out_dir)?;
    let mut summary = ReportSummary {
        themed_reviews: data.themed.len(),
        ..Default::default()
    };

    info!("Generating Monthly Sentiment Trend Plot...");
    let path = out_dir.join(TREND_CHART);
    let outcome = charts::render_sentiment_trend(&data.trends, &path);
    summary.record(TREND_CHART, path, outcome);

    info!("Generating Rating Distribution Plot...");
    let path = out_dir.join(RATING_CHART);
    let outcome = charts::render_rating_distribution(&data.ratings, &path);
    summary.record(RATING_CHART, path, outcome);

    info!("Generating keyword chart for pain points...");
    let path = out_dir.join(KEYWORD_CHART);
    let texts = pain_point_texts(&data.themed, config.pain_threshold);
    let keywords = top_keywords(&texts, config.keyword_count);
    let outcome = charts::render_keyword_chart(&keywords, &path);
    summary.record(KEYWORD_CHART, path, outcome);

    let path = out_dir.join(INSIGHTS_FILE);
    match generate_insights(&data.themed, config.min_theme_count, config.top_n) {
        Ok(insights) => {
            let outcome: Result<()> =
                std::fs::write(&path, render_insights(&insights)).map_err(Into::into);
            summary.record(INSIGHTS_FILE, path, outcome);
            summary.insights = insights;
        }
        Err(e) => summary.record(INSIGHTS_FILE, path, Err(e)),
    }

    Ok(summary)
}

/// Run the stage against the configured database
pub async fn run(config: &PipelineConfig) -> Result<ReportSummary> {
    let db = config.database()?;
    let pool = init_pool(db).await?;
    let repo = ReportRepository::new(pool.clone());

    let data = ReportData {
        trends: repo.monthly_trends().await?,
        ratings: repo.rating_distribution().await?,
        themed: repo.themed_reviews().await?,
    };
    info!("Extracted {} themed records for analysis", data.themed.len());

    let summary = write_reports(&data, &config.report, &config.paths.reports_dir)?;

    pool.close().await;
    info!("PostgreSQL connection closed");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn themed(bank: &str, text: Option<&str>, score: Option<f64>, theme: &str) -> ThemedReview {
        ThemedReview {
            bank_name: bank.to_string(),
            review_text: text.map(str::to_string),
            sentiment_score: score,
            identified_theme: theme.to_string(),
        }
    }

    #[test]
    fn test_pain_point_texts_threshold() {
        let reviews = vec![
            themed("CBE", Some("slow transfer"), Some(0.1), "Speed"),
            themed("CBE", Some("fine"), Some(0.4), "Speed"),
            themed("CBE", Some("no score"), None, "Speed"),
            themed("CBE", None, Some(0.0), "Speed"),
        ];
        assert_eq!(pain_point_texts(&reviews, 0.4), vec!["slow transfer"]);
    }

    #[test]
    fn test_write_reports_is_best_effort() {
        let dir = tempfile::tempdir().unwrap();
        let data = ReportData {
            trends: Vec::new(),
            ratings: vec![RatingCount {
                bank_name: "CBE".to_string(),
                rating: 4,
                rating_count: 12,
            }],
            themed: vec![themed("CBE", Some("login keeps failing"), Some(0.2), "Account Access")],
        };

        let summary = write_reports(&data, &ReportConfig::default(), dir.path()).unwrap();

        assert!(dir.path().join(RATING_CHART).exists());
        assert!(dir.path().join(KEYWORD_CHART).exists());
        assert!(dir.path().join(INSIGHTS_FILE).exists());
        assert!(!dir.path().join(TREND_CHART).exists());
        assert_eq!(summary.written.len(), 3);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].0, TREND_CHART);

        let text = std::fs::read_to_string(dir.path().join(INSIGHTS_FILE)).unwrap();
        assert!(text.contains("BANK: CBE"));
    }
}
