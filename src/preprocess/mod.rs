//! Preprocessing stage: clean, language-filter and constrain the raw snapshot,
//! then persist the result for the loader.

pub mod cleaner;
pub mod language;
pub mod sampler;

pub use cleaner::{clean_reviews, CleanOutcome, CleaningStats};
pub use language::{filter_language, LanguageDetector, LanguageStats, WhatlangDetector};
pub use sampler::{apply_review_constraints, GroupAction, GroupOutcome};

use crate::config::PipelineConfig;
use crate::dataset::{group_counts, read_csv, write_csv};
use crate::error::{PipelineError, Result};
use crate::model::COL_BANK;
use polars::prelude::DataFrame;
use std::path::PathBuf;
use tracing::{error, info};

/// Everything the preprocessing run did, for the console summary
#[derive(Debug, Clone)]
pub struct ProcessingReport {
    pub cleaning: CleaningStats,
    pub language: LanguageStats,
    pub groups: Vec<GroupOutcome>,
    pub final_counts: Vec<(String, usize)>,
    pub output_path: PathBuf,
    pub min_per_group: usize,
    pub max_per_group: usize,
}

impl ProcessingReport {
    pub fn total(&self) -> usize {
        self.final_counts.iter().map(|(_, n)| n).sum()
    }

    /// True when no bank exceeds the maximum
    pub fn all_within_max(&self) -> bool {
        self.final_counts.iter().all(|(_, n)| *n <= self.max_per_group)
    }

    pub fn print(&self) {
        println!("\n{}", "=".repeat(60));
        println!("📊 FINAL DATA PROCESSING REPORT");
        println!("{}", "=".repeat(60));
        println!("Total final reviews (filtered & constrained): {}", self.total());
        println!(
            "\n📈 Reviews per bank (target: {}-{}):",
            self.min_per_group, self.max_per_group
        );
        for (bank, count) in &self.final_counts {
            let status = if *count > self.max_per_group {
                "❌"
            } else if *count < self.min_per_group {
                "⚠️ "
            } else {
                "✅"
            };
            println!("   {} {}: {} reviews", status, bank, count);
        }
        println!("\n🎯 Processing status:");
        println!(
            "   Review constraint applied to all banks: {}",
            if self.all_within_max() { "✅" } else { "⚠️ " }
        );
        println!("   Final dataset location: {}", self.output_path.display());
        println!("{}", "=".repeat(60));
    }
}

/// Clean, filter and constrain an in-memory batch
pub fn process_frame(
    raw: DataFrame,
    config: &PipelineConfig,
    detector: &dyn LanguageDetector,
) -> Result<(DataFrame, CleaningStats, LanguageStats, Vec<GroupOutcome>)> {
    let (cleaned, cleaning_stats) = match clean_reviews(raw)? {
        CleanOutcome::Cleaned { frame, stats } => (frame, stats),
        CleanOutcome::MissingColumns { missing, .. } => {
            return Err(PipelineError::Schema(format!(
                "required columns missing after renaming: {}",
                missing.join(", ")
            )));
        }
    };

    let (filtered, language_stats) = filter_language(cleaned, detector, &config.language)?;
    let (constrained, groups) = apply_review_constraints(&filtered, &config.sampling)?;

    Ok((constrained, cleaning_stats, language_stats, groups))
}

/// Run the stage: raw snapshot in, processed CSV out
pub fn run(config: &PipelineConfig, detector: &dyn LanguageDetector) -> Result<ProcessingReport> {
    let raw = read_csv(&config.paths.raw_file).map_err(|e| {
        error!("{}. Run the collect stage first.", e);
        e
    })?;

    let (mut constrained, cleaning, language, groups) = process_frame(raw, config, detector)?;

    if constrained.height() == 0 {
        return Err(PipelineError::Empty(
            "no reviews left after cleaning and language filtering".to_string(),
        ));
    }

    write_csv(&mut constrained, &config.paths.processed_file)?;

    let final_counts = group_counts(&constrained, COL_BANK)?;
    info!(
        "Preprocessing complete: {} in, {} out across {} banks",
        cleaning.rows_in,
        constrained.height(),
        final_counts.len()
    );

    Ok(ProcessingReport {
        cleaning,
        language,
        groups,
        final_counts,
        output_path: config.paths.processed_file.clone(),
        min_per_group: config.sampling.min_per_group,
        max_per_group: config.sampling.max_per_group,
    })
}
