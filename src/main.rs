//! # death_case_feed
//!
//! Command-line runner for the death-case ingestion pipeline. Queries news
//! search feeds for one day, extracts and deduplicates reported death cases,
//! and extends the JSON dataset read by the dashboard.
//!
//! ## Usage
//!
//! ```sh
//! death_case_feed --date 2025-05-06 --min-records 15 -o scrap_data.json
//! ```
//!
//! Exit status is 0 when the run completed or added at least one record, 2
//! when every query ran dry without a single new record, and 1 on a fatal
//! configuration or dataset error.

use std::error::Error;

use chrono::Local;
use clap::Parser;
use death_case_feed::config::PipelineConfig;
use death_case_feed::scrapers::google_news::GoogleNewsFeed;
use death_case_feed::run_ingestion_with;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;

use cli::Cli;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("death_case_feed starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    // ---- Configuration ----
    let mut config = match &args.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::builtin()?,
    };
    if let Some(path) = &args.credibility {
        config = config.with_credibility_file(path)?;
    }

    let target_date = args.date.unwrap_or_else(|| Local::now().date_naive());
    let min_records = args.min_records.unwrap_or(config.min_records);
    let dataset_path = args
        .output
        .clone()
        .unwrap_or_else(|| config.output_file.clone());
    info!(%target_date, min_records, dataset = %dataset_path.display(), "Run parameters");

    // ---- Ingestion ----
    let feed = GoogleNewsFeed::new(config.feed.clone())?;
    let outcome =
        match run_ingestion_with(feed, &config, &dataset_path, target_date, min_records).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "Ingestion aborted; dataset left unchanged");
                return Err(e.into());
            }
        };

    if args.json {
        println!("{}", serde_json::to_string(&outcome)?);
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        accepted = outcome.accepted_count,
        status = ?outcome.status,
        "Execution complete"
    );

    if !outcome.is_success() {
        warn!(%target_date, "No new records found for target date");
        std::process::exit(2);
    }
    Ok(())
}
