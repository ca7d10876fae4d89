//! Heuristic extraction of death-case fields from headline text.
//!
//! Rules run over the entry's title and snippet, in this order:
//!
//! 1. Publication date within `date_tolerance_days` of the target date
//! 2. At least one death keyword (strong or weak lexicon)
//! 3. A state from the gazetteer; earliest mention wins, longest on ties
//! 4. Cause from the cause lexicon; highest specificity wins
//! 5. Age from `N-year-old`, `aged N`, `Name, N,` or `(N)`, bounded to 0..=120
//!
//! A candidate needs a state plus either a cause or a strong keyword.
//! Missing cause or age is left unknown. False negatives are acceptable.

use std::cmp::Reverse;

use chrono::NaiveDate;
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::trace;

use crate::config::PipelineConfig;
use crate::error::ConfigError;
use crate::models::{CandidateRecord, RawEntry};
use crate::utils::{normalize_text, phrase_pattern};

const MAX_AGE: u16 = 120;

static AGE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\b(\d{1,3})\s*-?\s*(?:years?|yrs?)\s*-?\s*old\b",
        r"(?i)\baged\s+(?:about\s+|around\s+)?(\d{1,3})\b",
        r"(?:^|[^\d]),\s+(\d{1,3})\s*,",
        r"\((\d{1,3})\)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static age pattern"))
    .collect()
});

/// Why an entry did not become a candidate. These are expected filtering
/// outcomes, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionReject {
    MissingDate,
    OutsideWindow { published: NaiveDate },
    NotDeathRelated,
    NoLocation,
    WeakSignal,
}

impl ExtractionReject {
    pub fn label(&self) -> &'static str {
        match self {
            Self::MissingDate => "missing_date",
            Self::OutsideWindow { .. } => "outside_window",
            Self::NotDeathRelated => "not_death_related",
            Self::NoLocation => "no_location",
            Self::WeakSignal => "weak_signal",
        }
    }
}

#[derive(Debug)]
struct StateMatcher {
    name: String,
    pattern: Regex,
}

#[derive(Debug)]
struct CauseMatcher {
    name: String,
    specificity: u8,
    pattern: Regex,
}

/// Compiled lexicons. Build once per run with [`RecordExtractor::from_config`].
#[derive(Debug)]
pub struct RecordExtractor {
    tolerance_days: i64,
    strong: Regex,
    weak: Regex,
    states: Vec<StateMatcher>,
    causes: Vec<CauseMatcher>,
}

impl RecordExtractor {
    pub fn from_config(config: &PipelineConfig) -> Result<Self, ConfigError> {
        let states = config
            .states
            .iter()
            .map(|s| -> Result<StateMatcher, ConfigError> {
                let mut names = vec![s.name.clone()];
                names.extend(s.aliases.iter().cloned());
                Ok(StateMatcher {
                    name: s.name.clone(),
                    pattern: phrase_pattern(&names)?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let causes = config
            .causes
            .iter()
            .map(|c| -> Result<CauseMatcher, ConfigError> {
                Ok(CauseMatcher {
                    name: normalize_text(&c.name),
                    specificity: c.specificity,
                    pattern: phrase_pattern(&c.keywords)?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            tolerance_days: config.date_tolerance_days,
            strong: phrase_pattern(&config.death_keywords.strong)?,
            weak: phrase_pattern(&config.death_keywords.weak)?,
            states,
            causes,
        })
    }

    /// Turn one feed entry into a candidate for `target_date`.
    ///
    /// The candidate's `date` is the target date; `verified` starts false and
    /// is set by the scorer.
    pub fn extract(
        &self,
        entry: &RawEntry,
        target_date: NaiveDate,
    ) -> Result<CandidateRecord, ExtractionReject> {
        let published = entry
            .published_at
            .ok_or(ExtractionReject::MissingDate)?
            .date_naive();
        if (published - target_date).num_days().abs() > self.tolerance_days {
            return Err(ExtractionReject::OutsideWindow { published });
        }

        let text = entry.text();
        let strong = self.strong.is_match(&text);
        if !strong && !self.weak.is_match(&text) {
            return Err(ExtractionReject::NotDeathRelated);
        }

        let state = self.find_state(&text).ok_or(ExtractionReject::NoLocation)?;
        let cause = self.find_cause(&text);
        if cause.is_none() && !strong {
            return Err(ExtractionReject::WeakSignal);
        }

        let age = find_age(&text);
        trace!(state, ?cause, ?age, "Extracted candidate fields");

        Ok(CandidateRecord {
            date: target_date,
            state: Some(state.to_string()),
            cause: cause.map(str::to_string),
            age,
            verified: false,
            source_link: entry.link.clone(),
            source_name: entry.source_name.clone(),
            raw_text: text.split_whitespace().join(" "),
        })
    }

    fn find_state(&self, text: &str) -> Option<&str> {
        self.states
            .iter()
            .filter_map(|s| s.pattern.find(text).map(|m| ((m.start(), Reverse(m.len())), s)))
            .min_by_key(|(rank, _)| *rank)
            .map(|(_, s)| s.name.as_str())
    }

    fn find_cause(&self, text: &str) -> Option<&str> {
        self.causes
            .iter()
            .enumerate()
            .filter(|(_, c)| c.pattern.is_match(text))
            .max_by_key(|(i, c)| (c.specificity, Reverse(*i)))
            .map(|(_, c)| c.name.as_str())
    }
}

fn find_age(text: &str) -> Option<u8> {
    AGE_PATTERNS.iter().find_map(|re| {
        re.captures_iter(text)
            .filter_map(|cap| cap.get(1)?.as_str().parse::<u16>().ok())
            .find(|age| *age <= MAX_AGE)
            .and_then(|age| u8::try_from(age).ok())
    })
}
