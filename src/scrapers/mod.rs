//! Feed querying.
//!
//! A run walks an ordered list of [`QueryVariant`]s produced by
//! [`query_plan`]. Each variant is sent once through a [`FeedSource`]; a
//! failed query yields a [`FetchError`] that the orchestrator logs and skips.
//!
//! # Supported Sources
//!
//! | Source | Module | Method |
//! |--------|--------|--------|
//! | Google News | [`google_news`] | RSS search endpoint |

pub mod google_news;

use chrono::{Duration, NaiveDate};

use crate::config::PipelineConfig;
use crate::error::FetchError;
use crate::models::RawEntry;

/// Anything that can answer a search query with feed entries.
pub trait FeedSource {
    /// Run one query for `target_date`. A single attempt, no retries.
    async fn fetch(
        &self,
        query: &QueryVariant,
        target_date: NaiveDate,
    ) -> Result<Vec<RawEntry>, FetchError>;
}

/// One concrete search: keyword expression plus an optional state name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryVariant {
    pub keywords: String,
    pub state: Option<String>,
}

impl QueryVariant {
    pub fn new(keywords: impl Into<String>) -> Self {
        Self {
            keywords: keywords.into(),
            state: None,
        }
    }

    /// The search string sent to the feed, narrowed to the day around `date`.
    pub fn search_string(&self, date: NaiveDate) -> String {
        let after = date - Duration::days(1);
        let before = date + Duration::days(1);
        format!("{} after:{} before:{}", self.keywords, after, before)
    }
}

/// Ordered query variants for a run: the fixed templates first, then one
/// state-targeted query per gazetteer entry.
pub fn query_plan(config: &PipelineConfig) -> Vec<QueryVariant> {
    let mut plan: Vec<QueryVariant> = config
        .queries
        .base
        .iter()
        .map(QueryVariant::new)
        .collect();

    if let Some(template) = &config.queries.per_state {
        plan.extend(config.states.iter().map(|state| QueryVariant {
            keywords: template.replace("{state}", &state.name),
            state: Some(state.name.clone()),
        }));
    }
    plan
}
