// src/main.rs
mod browser;
mod config;
mod extractors;
mod storage;
mod traversal;
mod utils;

use browser::HttpSession;
use clap::Parser;
use config::{ExtractionSettings, RunConfig, SortBy, Strictness, TraversalSettings};
use extractors::PageExtractor;
use std::path::PathBuf;
use std::time::Duration;
use storage::{JsonlStorage, ReviewFilter};
use traversal::TraversalController;
use utils::AppError;

/// Collects gig listings from marketplace search results
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Search keyword
    #[arg(short, long, env = "GIG_SCOUT_KEYWORD", required_unless_present = "input")]
    keyword: Option<String>,

    /// Drop gigs with fewer reviews than this
    #[arg(long, env = "GIG_SCOUT_MIN_REVIEWS", default_value_t = 0)]
    min_reviews: u32,

    /// Drop gigs with more reviews than this
    #[arg(long, env = "GIG_SCOUT_MAX_REVIEWS")]
    max_reviews: Option<u32>,

    /// Number of result pages to visit
    #[arg(short, long, env = "GIG_SCOUT_PAGES", default_value_t = 1)]
    pages: u32,

    #[arg(long, env = "GIG_SCOUT_SORT_BY", value_enum, default_value_t = SortBy::Relevance)]
    sort_by: SortBy,

    /// JSON run configuration (overrides keyword/review/page/sort flags)
    #[arg(short, long, env = "GIG_SCOUT_INPUT")]
    input: Option<PathBuf>,

    /// Output directory for records and run metadata
    #[arg(short, long, env = "GIG_SCOUT_OUTPUT_DIR", default_value = "./output")]
    output_dir: PathBuf,

    /// Accept gigs that only have a title and a link
    #[arg(long, env = "GIG_SCOUT_PERMISSIVE")]
    permissive: bool,

    #[arg(long, env = "GIG_SCOUT_MIN_TITLE_LEN", default_value_t = 10)]
    min_title_len: usize,

    /// Delay after each page load before reading it
    #[arg(long, env = "GIG_SCOUT_SETTLE_MS", default_value_t = 2_000)]
    settle_ms: u64,

    #[arg(long, env = "GIG_SCOUT_LOAD_TIMEOUT_MS", default_value_t = 30_000)]
    load_timeout_ms: u64,

    #[arg(long, env = "GIG_SCOUT_PACE_MIN_MS", default_value_t = 2_000)]
    pace_min_ms: u64,

    #[arg(long, env = "GIG_SCOUT_PACE_MAX_MS", default_value_t = 5_000)]
    pace_max_ms: u64,

    /// Debug mode - save annotated snapshots of pages that yield no gigs
    #[arg(short, long, env = "GIG_SCOUT_DEBUG")]
    debug: bool,
}

impl Args {
    fn run_config(&self) -> Result<RunConfig, AppError> {
        if let Some(path) = &self.input {
            let raw = std::fs::read_to_string(path)?;
            tracing::info!("Loaded run configuration from {}", path.display());
            return RunConfig::from_json(&raw);
        }

        let config = RunConfig {
            keyword: self.keyword.clone().unwrap_or_default(),
            min_reviews: self.min_reviews,
            max_reviews: self.max_reviews,
            pages: self.pages,
            sort_by: self.sort_by,
        };
        config.validate()?;
        Ok(config)
    }

    fn extraction_settings(&self) -> ExtractionSettings {
        ExtractionSettings {
            strictness: if self.permissive { Strictness::Permissive } else { Strictness::Strict },
            min_title_len: self.min_title_len,
        }
    }

    fn traversal_settings(&self, keyword: &str) -> TraversalSettings {
        TraversalSettings {
            load_timeout: Duration::from_millis(self.load_timeout_ms),
            settle_delay: Duration::from_millis(self.settle_ms),
            pace_min: Duration::from_millis(self.pace_min_ms.min(self.pace_max_ms)),
            pace_max: Duration::from_millis(self.pace_max_ms.max(self.pace_min_ms)),
            debug_dir: self
                .debug
                .then(|| self.output_dir.join(storage::keyword_slug(keyword)).join("debug")),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let args = Args::parse();
    utils::logging::setup_logging(if args.debug { "debug" } else { "info" });
    tracing::debug!("Starting with args: {:?}", args);

    let config = args.run_config()?;
    tracing::info!(
        "Searching '{}' ({} page(s), sort: {}, reviews: {}..{:?})",
        config.keyword,
        config.pages,
        config.sort_by.as_query(),
        config.min_reviews,
        config.max_reviews
    );

    let extractor = PageExtractor::new(&args.extraction_settings())?;
    let mut session = HttpSession::new()?;
    let storage = JsonlStorage::create(&args.output_dir, &config.keyword)?;
    let mut sink = ReviewFilter::new(storage, config.min_reviews, config.max_reviews);

    let outcome = TraversalController::new(
        &mut session,
        &mut sink,
        extractor,
        args.traversal_settings(&config.keyword),
    )
    .run(&config)
    .await;

    tracing::info!(
        "{} records written to {}, {} filtered by review count",
        sink.inner().written(),
        sink.inner().path().display(),
        sink.filtered()
    );

    if let Err(e) = &outcome {
        if e.is_block() {
            tracing::warn!("The site served a block page; records gathered so far were kept");
        }
    }

    let error_text = outcome.as_ref().err().map(|e| e.to_string());
    match sink.inner().save_run_metadata(&config, outcome.as_ref().ok(), error_text.as_deref()) {
        Ok(path) => tracing::info!("Run metadata: {}", path.display()),
        Err(e) => tracing::error!("Failed to save run metadata: {}", e),
    }

    let summary = outcome?;
    tracing::info!(
        "Processing finished. Pages: {}, records pushed: {}, rejected candidates: {}",
        summary.pages_visited,
        summary.records_pushed,
        summary.candidates_rejected
    );
    Ok(())
}
