//! Source credibility scoring.
//!
//! `verified` is true only when the outlet is listed as trusted in the
//! credibility table, by name (case-insensitive) or, failing that, by the
//! host of the article link. Anything unknown is unverified.

use std::collections::HashMap;

use crate::config::{CredibilityTable, TrustLevel};
use crate::models::CandidateRecord;

#[derive(Debug, Clone)]
pub struct VerificationScorer {
    by_name: HashMap<String, TrustLevel>,
    domains: Vec<String>,
}

impl VerificationScorer {
    pub fn new(table: &CredibilityTable) -> Self {
        Self {
            by_name: table
                .sources
                .iter()
                .map(|(name, level)| (name.trim().to_lowercase(), *level))
                .collect(),
            domains: table.domains.iter().map(|d| d.trim().to_lowercase()).collect(),
        }
    }

    pub fn score(&self, candidate: &CandidateRecord) -> bool {
        match self.by_name.get(&candidate.source_name.trim().to_lowercase()) {
            Some(level) => *level == TrustLevel::Trusted,
            None => candidate
                .source_host()
                .is_some_and(|host| self.is_trusted_host(&host)),
        }
    }

    fn is_trusted_host(&self, host: &str) -> bool {
        self.domains
            .iter()
            .any(|d| host == d || host.ends_with(&format!(".{d}")))
    }
}
