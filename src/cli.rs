//! Command-line interface definitions for death_case_feed.
//!
//! All arguments can be provided via command-line flags or environment variables.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::Parser;

/// Command-line arguments for one ingestion run.
///
/// # Examples
///
/// ```sh
/// # Today's cases into ./scrap_data.json
/// death_case_feed
///
/// # A specific day, stricter threshold, custom tables
/// death_case_feed --date 2025-05-06 --min-records 25 --config tables.yaml
///
/// # Machine-readable outcome for a wrapper
/// death_case_feed --json -o /srv/dashboard/scrap_data.json
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Target date (YYYY-MM-DD); defaults to today in local time
    #[arg(short, long, env = "DEATH_FEED_DATE")]
    pub date: Option<NaiveDate>,

    /// Stop querying once this many new records are accepted
    #[arg(short = 'n', long, env = "DEATH_FEED_MIN_RECORDS")]
    pub min_records: Option<usize>,

    /// Dataset file to extend
    #[arg(short, long, env = "DEATH_FEED_OUTPUT")]
    pub output: Option<PathBuf>,

    /// YAML file overriding sections of the built-in tables
    #[arg(short, long, env = "DEATH_FEED_CONFIG")]
    pub config: Option<PathBuf>,

    /// YAML credibility table (source name -> trusted|untrusted)
    #[arg(long, env = "DEATH_FEED_CREDIBILITY")]
    pub credibility: Option<PathBuf>,

    /// Print the run outcome as JSON on stdout
    #[arg(long)]
    pub json: bool,
}
