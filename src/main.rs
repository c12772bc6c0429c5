use anyhow::{Context, Result};
use bank_reviews::collector::{self, PlayStoreSource};
use bank_reviews::config::{load_apps_file, PathsConfig, PipelineConfig};
use bank_reviews::db::loader;
use bank_reviews::preprocess::{self, WhatlangDetector};
use bank_reviews::report;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bank-reviews")]
#[command(about = "Collect, clean, store and report on mobile banking app reviews")]
struct Cli {
    #[command(flatten)]
    paths: PathArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct PathArgs {
    /// Data directory holding raw/ and processed/ (default: $DATA_DIR or ./data)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Directory for charts and the insights file (default: $REPORTS_DIR or ./reports)
    #[arg(long, global = true)]
    reports_dir: Option<PathBuf>,
}

#[derive(Args)]
struct CollectArgs {
    /// JSON file listing the apps to scrape
    #[arg(long)]
    apps_file: Option<PathBuf>,

    /// Review scraper endpoint (default: $REVIEW_SOURCE_URL)
    #[arg(long)]
    source_url: Option<String>,

    /// Stop after this many reviews per app
    #[arg(long)]
    max_reviews: Option<usize>,

    /// Seconds to wait between apps
    #[arg(long)]
    app_pause: Option<u64>,
}

#[derive(Args)]
struct PreprocessArgs {
    /// Sampling seed
    #[arg(long)]
    seed: Option<u64>,

    /// Per-bank maximum after sampling
    #[arg(long)]
    max_per_bank: Option<usize>,
}

#[derive(Args)]
struct LoadArgs {
    /// CSV to load (default: the processed file)
    #[arg(long)]
    input: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Scrape reviews and write the raw snapshot
    Collect(CollectArgs),
    /// Clean, language-filter and sample the raw snapshot
    Preprocess(PreprocessArgs),
    /// Load reviews into PostgreSQL
    Load(LoadArgs),
    /// Write charts and insights from the database
    Report,
    /// Every stage in order
    Run {
        #[command(flatten)]
        collect: CollectArgs,
        #[command(flatten)]
        preprocess: PreprocessArgs,
        #[command(flatten)]
        load: LoadArgs,
    },
}

fn build_config(paths: &PathArgs) -> PipelineConfig {
    let mut config = PipelineConfig::from_env();
    if paths.data_dir.is_some() || paths.reports_dir.is_some() {
        let data_dir = paths
            .data_dir
            .clone()
            .or_else(|| std::env::var("DATA_DIR").ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("data"));
        let reports_dir = paths
            .reports_dir
            .clone()
            .unwrap_or_else(|| config.paths.reports_dir.clone());
        config.paths = PathsConfig::under(&data_dir, &reports_dir);
    }
    config
}

fn apply_collect_args(config: &mut PipelineConfig, args: &CollectArgs) -> Result<()> {
    if let Some(path) = &args.apps_file {
        config.collector.apps = load_apps_file(path)
            .with_context(|| format!("Failed to read apps file {}", path.display()))?;
    }
    if let Some(url) = &args.source_url {
        config.collector.source_url = url.clone();
    }
    if args.max_reviews.is_some() {
        config.collector.max_reviews_per_app = args.max_reviews;
    }
    if let Some(secs) = args.app_pause {
        config.collector.app_pause = std::time::Duration::from_secs(secs);
    }
    Ok(())
}

fn apply_preprocess_args(config: &mut PipelineConfig, args: &PreprocessArgs) {
    if let Some(seed) = args.seed {
        config.sampling.seed = seed;
    }
    if let Some(max) = args.max_per_bank {
        config.sampling.max_per_group = max;
    }
}

/// Returns whether the collection thresholds were met
async fn collect(config: &PipelineConfig) -> Result<bool> {
    let source = PlayStoreSource::new(config.collector.source_url.clone())?;
    let summary = collector::run(config, &source).await?;
    summary.print();
    if !summary.meets_thresholds() {
        warn!(
            "Collection below target: need {} per bank and {} in total",
            summary.min_per_bank, summary.min_total
        );
    }
    Ok(summary.meets_thresholds())
}

fn preprocess(config: &PipelineConfig) -> Result<()> {
    let report = preprocess::run(config, &WhatlangDetector)?;
    report.print();
    Ok(())
}

async fn load(config: &PipelineConfig, args: &LoadArgs) -> Result<()> {
    let input = args.input.clone().unwrap_or_else(|| config.paths.load_file.clone());
    let summary = loader::run(config, &input).await?;
    summary.print();
    Ok(())
}

async fn report(config: &PipelineConfig) -> Result<()> {
    let summary = report::run(config).await?;
    summary.print();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut config = build_config(&cli.paths);

    match cli.command {
        Command::Collect(args) => {
            apply_collect_args(&mut config, &args)?;
            if !collect(&config).await? {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Preprocess(args) => {
            apply_preprocess_args(&mut config, &args);
            preprocess(&config)?;
        }
        Command::Load(args) => load(&config, &args).await?,
        Command::Report => report(&config).await?,
        Command::Run {
            collect: collect_args,
            preprocess: preprocess_args,
            load: load_args,
        } => {
            apply_collect_args(&mut config, &collect_args)?;
            apply_preprocess_args(&mut config, &preprocess_args);

            info!("🚀 Running full pipeline");
            let thresholds_met = collect(&config).await?;
            preprocess(&config)?;
            load(&config, &load_args).await?;
            report(&config).await?;

            if !thresholds_met {
                warn!("Pipeline finished, but collection was below target");
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
