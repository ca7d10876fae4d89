//! The ingestion pipeline: extract, score, deduplicate, store.
//!
//! [`run_ingestion`] is the entry point used by callers outside this crate.
//! It loads the dataset, drives the [`orchestrator::Orchestrator`] over the
//! query plan and reports how many records the run added.

pub mod dedup;
pub mod extract;
pub mod orchestrator;
pub mod verify;

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, instrument};

use crate::config::PipelineConfig;
use crate::error::IngestError;
use crate::outputs::json::RecordStore;
use crate::scrapers::FeedSource;
use crate::scrapers::google_news::GoogleNewsFeed;
use orchestrator::Orchestrator;

/// `complete` when the acceptance threshold was met, `partial` when the query
/// variants ran out first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Complete,
    Partial,
}

/// Result of one run, as reported to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunOutcome {
    pub accepted_count: usize,
    pub status: RunStatus,
    pub dataset_path: PathBuf,
}

impl RunOutcome {
    /// False only when the feeds were exhausted without a single new record.
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Complete || self.accepted_count > 0
    }
}

/// Run against Google News with the built-in tables, writing to the default
/// dataset path.
pub async fn run_ingestion(
    target_date: NaiveDate,
    min_records: usize,
) -> Result<RunOutcome, IngestError> {
    let config = PipelineConfig::builtin()?;
    let feed = GoogleNewsFeed::new(config.feed.clone())?;
    let dataset_path = config.output_file.clone();
    run_ingestion_with(feed, &config, &dataset_path, target_date, min_records).await
}

/// Run with an explicit feed, configuration and dataset file.
///
/// Loads the dataset, drives the query loop until `min_records` new records
/// are accepted or the query plan runs out, and writes the dataset back.
///
/// # Arguments
///
/// * `feed` - Source of raw entries for each query variant
/// * `config` - Lexicons, gazetteer, credibility table and tunables
/// * `dataset_path` - JSON dataset to extend; created if missing
/// * `target_date` - Day to collect records for
/// * `min_records` - Acceptance threshold for a complete run
///
/// # Returns
///
/// The [`RunOutcome`] on success. A corrupt or unwritable dataset, or invalid
/// lexicon patterns, end the run with an [`IngestError`]; fetch failures do not.
#[instrument(level = "info", skip(feed, config), fields(dataset = %dataset_path.display()))]
pub async fn run_ingestion_with<F: FeedSource>(
    feed: F,
    config: &PipelineConfig,
    dataset_path: &Path,
    target_date: NaiveDate,
    min_records: usize,
) -> Result<RunOutcome, IngestError> {
    let store = RecordStore::load(dataset_path)?;
    let orchestrator = Orchestrator::new(feed, config, store, min_records)?;
    let outcome = orchestrator.run(target_date).await?;
    info!(
        accepted = outcome.accepted_count,
        status = ?outcome.status,
        "Ingestion finished"
    );
    Ok(outcome)
}
