//! # death_case_feed
//!
//! Collects daily reported death cases from news search feeds into a
//! deduplicated JSON dataset for a dashboard to chart.
//!
//! ## Architecture
//!
//! Data flows strictly forward, one query variant at a time:
//! 1. **Fetching** ([`scrapers`]): run a search query against the news feed
//! 2. **Extraction** ([`pipeline::extract`]): pull date, state, cause and age
//!    out of each headline and snippet
//! 3. **Scoring** ([`pipeline::verify`]): mark records from credible outlets
//! 4. **Deduplication** ([`pipeline::dedup`]): drop repeats of stored events
//! 5. **Storage** ([`outputs::json`]): append and atomically rewrite the dataset
//!
//! [`pipeline::orchestrator`] repeats steps 1-4 over the query plan until
//! enough records are accepted or the queries run out.
//!
//! ## Usage
//!
//! ```no_run
//! # async fn demo() -> Result<(), death_case_feed::error::IngestError> {
//! let date = chrono::NaiveDate::from_ymd_opt(2025, 5, 6).unwrap();
//! let outcome = death_case_feed::run_ingestion(date, 15).await?;
//! println!("{} new records ({:?})", outcome.accepted_count, outcome.status);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod models;
pub mod outputs;
pub mod pipeline;
pub mod scrapers;
pub mod utils;

pub use pipeline::{RunOutcome, RunStatus, run_ingestion, run_ingestion_with};
