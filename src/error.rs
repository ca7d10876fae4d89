//! Error types for the ingestion pipeline.
//!
//! Only store and configuration failures are fatal to a run. A [`FetchError`]
//! costs one query variant and is tallied by the orchestrator; extraction and
//! duplicate rejections are ordinary values (see
//! [`crate::pipeline::extract::ExtractionReject`] and
//! [`crate::pipeline::dedup::Admission`]).

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure to fetch or parse one feed query.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("feed request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("feed returned HTTP {status} for {url}")]
    Status { status: u16, url: String },
    #[error("malformed feed XML: {0}")]
    Parse(#[from] quick_xml::DeError),
    #[error("invalid feed URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Failure to read or write the persisted dataset.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("dataset I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("dataset at {path} is not a valid record list: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize dataset: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Failure to load pipeline configuration tables.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid config YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid lexicon pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Fatal failure of a whole ingestion run.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}
