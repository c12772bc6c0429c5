//! Collection stage: fetch reviews for every configured app, tag them with
//! their bank and app, run the initial clean and write the raw snapshot.

pub mod connector;
pub mod play_store;

pub use connector::{ReviewSource, ReviewTimestamp, ScrapeOptions, SourceReview};
pub use play_store::PlayStoreSource;

use crate::config::{CollectorConfig, PipelineConfig};
use crate::dataset::{group_counts, raw_reviews_to_frame, write_csv};
use crate::error::{PipelineError, Result};
use crate::model::{AppTarget, RawReview, COL_BANK};
use crate::preprocess::{clean_reviews, CleanOutcome};
use chrono::Local;
use std::path::PathBuf;
use tracing::{error, info};

/// Fetch result for a single app
#[derive(Debug, Clone)]
pub struct AppCollection {
    pub app: AppTarget,
    pub fetched: usize,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CollectionSummary {
    pub apps: Vec<AppCollection>,
    /// Reviews per bank after the initial clean, every configured bank listed
    pub bank_counts: Vec<(String, usize)>,
    pub output_path: PathBuf,
    pub min_per_bank: usize,
    pub min_total: usize,
}

impl CollectionSummary {
    pub fn total(&self) -> usize {
        self.bank_counts.iter().map(|(_, n)| n).sum()
    }

    /// Every bank reached the per-bank minimum and the batch reached the total minimum
    pub fn meets_thresholds(&self) -> bool {
        self.total() >= self.min_total
            && self.bank_counts.iter().all(|(_, n)| *n >= self.min_per_bank)
    }

    pub fn print(&self) {
        println!("\n{}", "=".repeat(60));
        println!("📱 REVIEW COLLECTION SUMMARY");
        println!("{}", "=".repeat(60));
        for app in &self.apps {
            match &app.error {
                Some(e) => println!("   ❌ {} ({}): failed - {}", app.app.short_name, app.app.app_id, e),
                None => println!("   ✅ {} ({}): {} fetched", app.app.short_name, app.app.app_id, app.fetched),
            }
        }
        println!("\n📈 Reviews per bank after initial clean (minimum {}):", self.min_per_bank);
        for (bank, count) in &self.bank_counts {
            let status = if *count >= self.min_per_bank { "✅" } else { "⚠️ " };
            println!("   {} {}: {}", status, bank, count);
        }
        println!("\n🎯 Total: {} (minimum {})", self.total(), self.min_total);
        println!("📁 Snapshot: {}", self.output_path.display());
        println!("{}", "=".repeat(60));
    }
}

pub struct Collector<'a> {
    source: &'a dyn ReviewSource,
    config: &'a CollectorConfig,
}

impl<'a> Collector<'a> {
    pub fn new(source: &'a dyn ReviewSource, config: &'a CollectorConfig) -> Self {
        Self { source, config }
    }

    fn scrape_options(&self) -> ScrapeOptions {
        ScrapeOptions {
            lang: self.config.lang.clone(),
            country: self.config.country.clone(),
            sort: self.config.sort.clone(),
            page_size: self.config.page_size,
            page_pause: self.config.page_pause,
            max_reviews: self.config.max_reviews_per_app,
        }
    }

    /// Reviews for one app, or the error that stopped the fetch
    pub async fn collect_app(&self, app: &AppTarget) -> std::result::Result<Vec<RawReview>, String> {
        info!("📱 Starting to scrape reviews for {} ({})...", app.name, app.short_name);

        let reviews = self
            .source
            .fetch_reviews(app, &self.scrape_options())
            .await
            .map_err(|e| e.to_string())?;

        let scraped_at = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let tagged: Vec<RawReview> = reviews
            .into_iter()
            .map(|r| RawReview {
                review_text: r.content,
                rating: r.score,
                date: r.at.map(|t| t.as_text()),
                bank: app.short_name.clone(),
                app_name: app.name.clone(),
                app_id: app.app_id.clone(),
                source: self.source.channel().to_string(),
                scraped_at: scraped_at.clone(),
            })
            .collect();

        info!("✅ Successfully scraped {} reviews for {}", tagged.len(), app.short_name);
        Ok(tagged)
    }

    /// Fetch every configured app in turn. A failing app contributes nothing.
    pub async fn collect_all(&self) -> (Vec<RawReview>, Vec<AppCollection>) {
        info!("🚀 Starting review scraping for {} apps...", self.config.apps.len());

        let mut all = Vec::new();
        let mut per_app = Vec::with_capacity(self.config.apps.len());

        for (idx, app) in self.config.apps.iter().enumerate() {
            match self.collect_app(app).await {
                Ok(reviews) => {
                    per_app.push(AppCollection {
                        app: app.clone(),
                        fetched: reviews.len(),
                        error: None,
                    });
                    all.extend(reviews);
                }
                Err(e) => {
                    error!("❌ Failed to scrape {}: {}", app.name, e);
                    per_app.push(AppCollection {
                        app: app.clone(),
                        fetched: 0,
                        error: Some(e),
                    });
                }
            }

            if idx + 1 < self.config.apps.len() {
                tokio::time::sleep(self.config.app_pause).await;
            }
        }

        info!("🎯 Total raw reviews collected: {}", all.len());
        (all, per_app)
    }
}

/// Run the stage: source in, raw snapshot out
pub async fn run(config: &PipelineConfig, source: &dyn ReviewSource) -> Result<CollectionSummary> {
    let collector = Collector::new(source, &config.collector);
    let (reviews, apps) = collector.collect_all().await;

    if reviews.is_empty() {
        return Err(PipelineError::Empty("no reviews were collected from any app".to_string()));
    }

    let raw = raw_reviews_to_frame(&reviews)?;
    let mut cleaned = match clean_reviews(raw)? {
        CleanOutcome::Cleaned { frame, .. } => frame,
        CleanOutcome::MissingColumns { missing, .. } => {
            return Err(PipelineError::Schema(format!(
                "collected batch lacks columns: {}",
                missing.join(", ")
            )));
        }
    };

    if cleaned.height() == 0 {
        return Err(PipelineError::Empty(
            "all collected reviews were dropped during the initial clean".to_string(),
        ));
    }

    write_csv(&mut cleaned, &config.paths.raw_file)?;

    let found = group_counts(&cleaned, COL_BANK)?;
    let bank_counts = config
        .collector
        .apps
        .iter()
        .map(|app| {
            let count = found
                .iter()
                .find(|(bank, _)| bank == &app.short_name)
                .map(|(_, n)| *n)
                .unwrap_or(0);
            (app.short_name.clone(), count)
        })
        .collect();

    Ok(CollectionSummary {
        apps,
        bank_counts,
        output_path: config.paths.raw_file.clone(),
        min_per_bank: config.collector.min_per_bank,
        min_total: config.collector.min_total,
    })
}
