//! Pipeline configuration tables.
//!
//! Lexicons, the state gazetteer, the credibility table and the heuristic
//! constants are data. The built-in set lives in `config/default.yaml` and is
//! compiled into the binary; a user file passed with `--config` replaces
//! whole top-level sections and inherits the rest.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_yaml::Value;
use tracing::{info, instrument};

use crate::error::ConfigError;

const BUILTIN_YAML: &str = include_str!("../config/default.yaml");

/// Everything the pipeline stages need, loaded once at start.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Default dataset path when the caller does not pass one.
    pub output_file: PathBuf,
    /// Acceptance threshold for a run.
    pub min_records: usize,
    /// Token-overlap ratio at or above which two texts describe the same event.
    pub similarity_threshold: f64,
    /// Allowed distance in days between an entry's publication date and the target date.
    pub date_tolerance_days: i64,
    pub feed: FeedConfig,
    pub queries: QueryTemplates,
    pub death_keywords: DeathKeywords,
    pub causes: Vec<CauseEntry>,
    pub states: Vec<StateEntry>,
    pub credibility: CredibilityTable,
}

/// News feed endpoint and politeness settings.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    pub endpoint: String,
    pub locale: String,
    pub country: String,
    pub edition: String,
    pub user_agent: String,
    pub request_timeout_secs: u64,
    pub request_delay_ms: u64,
    pub max_entries_per_query: usize,
    /// Cap on entries fetched across all queries of one run.
    pub max_total_entries: usize,
}

/// Search templates. `per_state` must contain a `{state}` placeholder.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryTemplates {
    pub base: Vec<String>,
    #[serde(default)]
    pub per_state: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeathKeywords {
    pub strong: Vec<String>,
    #[serde(default)]
    pub weak: Vec<String>,
}

/// One cause of death and the phrases that indicate it.
#[derive(Debug, Clone, Deserialize)]
pub struct CauseEntry {
    pub name: String,
    /// Higher wins when several causes match the same text.
    pub specificity: u8,
    pub keywords: Vec<String>,
}

/// A state or union territory and the aliases (old names, cities) that map to it.
#[derive(Debug, Clone, Deserialize)]
pub struct StateEntry {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustLevel {
    #[serde(alias = "verified", alias = "reputable")]
    Trusted,
    #[serde(alias = "unverified", alias = "blog")]
    Untrusted,
}

/// Source name to trust level, plus publisher domains trusted by host.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CredibilityTable {
    #[serde(default)]
    pub sources: BTreeMap<String, TrustLevel>,
    #[serde(default)]
    pub domains: Vec<String>,
}

impl PipelineConfig {
    /// The compiled-in tables.
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_yaml("")
    }

    /// Parse `text` as an overlay on the built-in tables.
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let mut base: Value = serde_yaml::from_str(BUILTIN_YAML)?;
        if !text.trim().is_empty() {
            let overlay: Value = serde_yaml::from_str(text)?;
            if let (Value::Mapping(base_map), Value::Mapping(overlay_map)) = (&mut base, overlay) {
                for (key, value) in overlay_map {
                    base_map.insert(key, value);
                }
            }
        }
        let config: PipelineConfig = serde_yaml::from_value(base)?;
        config.validate()?;
        Ok(config)
    }

    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml(&text)?;
        info!(
            states = config.states.len(),
            causes = config.causes.len(),
            sources = config.credibility.sources.len(),
            "Loaded pipeline config"
        );
        Ok(config)
    }

    /// Replace the credibility table with one read from a standalone YAML file.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub fn with_credibility_file(mut self, path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.credibility = serde_yaml::from_str(&text)?;
        info!(
            sources = self.credibility.sources.len(),
            domains = self.credibility.domains.len(),
            "Loaded credibility table"
        );
        Ok(self)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(ConfigError::Invalid(format!(
                "similarity_threshold must be within 0..=1, got {}",
                self.similarity_threshold
            )));
        }
        if self.date_tolerance_days < 0 {
            return Err(ConfigError::Invalid(
                "date_tolerance_days must not be negative".to_string(),
            ));
        }
        if let Some(template) = &self.queries.per_state {
            if !template.contains("{state}") {
                return Err(ConfigError::Invalid(
                    "queries.per_state needs a {state} placeholder".to_string(),
                ));
            }
        }
        Ok(())
    }
}
