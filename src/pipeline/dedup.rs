//! Duplicate detection across feed queries and runs.
//!
//! Two records describe the same event when they share the date and the
//! state (case-insensitive), and then either the normalized cause matches or
//! their texts overlap at or above the similarity threshold. An unknown cause
//! matches another unknown cause. The first record seen is kept; later
//! duplicates are dropped, never merged.

use chrono::NaiveDate;

use crate::models::{AcceptedRecord, CandidateRecord};
use crate::utils::{normalize_text, overlap_ratio};

/// Normalized `(date, state, cause)` identity of a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub date: NaiveDate,
    pub state: Option<String>,
    pub cause: Option<String>,
}

impl DedupKey {
    pub fn new(date: NaiveDate, state: Option<&str>, cause: Option<&str>) -> Self {
        Self {
            date,
            state: state.map(normalize_text),
            cause: cause.map(normalize_text),
        }
    }

    pub fn of_candidate(c: &CandidateRecord) -> Self {
        Self::new(c.date, c.state.as_deref(), c.cause.as_deref())
    }

    pub fn of_record(r: &AcceptedRecord) -> Self {
        Self::new(r.date(), r.state(), r.cause())
    }
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accept,
    /// Index into the dataset of the record this candidate repeats.
    Duplicate { of: usize },
}

#[derive(Debug, Clone)]
pub struct Deduplicator {
    similarity_threshold: f64,
}

impl Deduplicator {
    pub fn new(similarity_threshold: f64) -> Self {
        Self {
            similarity_threshold,
        }
    }

    /// Check `candidate` against every stored record, oldest first.
    ///
    /// `existing` must hold both earlier runs and records accepted so far in
    /// this run.
    pub fn admit(&self, candidate: &CandidateRecord, existing: &[AcceptedRecord]) -> Admission {
        let key = DedupKey::of_candidate(candidate);
        existing
            .iter()
            .position(|record| self.is_duplicate(&key, &candidate.raw_text, record))
            .map_or(Admission::Accept, |of| Admission::Duplicate { of })
    }

    fn is_duplicate(&self, key: &DedupKey, raw_text: &str, record: &AcceptedRecord) -> bool {
        let other = DedupKey::of_record(record);
        if key.date != other.date || key.state != other.state {
            return false;
        }
        key.cause == other.cause
            || overlap_ratio(raw_text, record.raw_text()) >= self.similarity_threshold
    }
}
