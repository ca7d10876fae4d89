//! Data models for feed entries and death-case records.
//!
//! - [`RawEntry`]: one feed hit, never persisted
//! - [`CandidateRecord`]: structured fields pulled out of a [`RawEntry`]
//! - [`AcceptedRecord`]: a candidate that passed scoring and deduplication
//! - [`Dataset`]: the append-only record list written to disk
//!
//! The serialized field names of [`AcceptedRecord`] are the dataset file
//! schema read by the dashboard, so they are flat and snake_case.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A single item returned by a feed query.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEntry {
    /// Headline with any trailing ` - Source` suffix removed.
    pub title: String,
    /// Plain-text description; HTML already stripped.
    pub snippet: String,
    /// Publisher URL when the feed exposes it, otherwise the feed's own link.
    pub link: String,
    /// Outlet name as reported by the feed.
    pub source_name: String,
    pub published_at: Option<DateTime<Utc>>,
}

impl RawEntry {
    /// Title and snippet joined, the text every extraction rule runs over.
    pub fn text(&self) -> String {
        if self.snippet.is_empty() || self.snippet == self.title {
            self.title.clone()
        } else {
            format!("{} {}", self.title, self.snippet)
        }
    }
}

/// Fields extracted from one entry. `None` means the extractor could not
/// resolve the field; it never guesses.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateRecord {
    pub date: NaiveDate,
    pub state: Option<String>,
    pub cause: Option<String>,
    pub age: Option<u8>,
    pub verified: bool,
    pub source_link: String,
    pub source_name: String,
    pub raw_text: String,
}

impl CandidateRecord {
    /// Host of the source link, lowercased, without a leading `www.`.
    ///
    /// For example: `"https://www.ndtv.com/india-news/x"` -> `"ndtv.com"`
    pub fn source_host(&self) -> Option<String> {
        let parsed = url::Url::parse(&self.source_link).ok()?;
        let host = parsed.host_str()?.to_lowercase();
        Some(host.strip_prefix("www.").map(str::to_string).unwrap_or(host))
    }
}

/// A stored record. Fields are private so nothing downstream of admission can
/// change a record once it exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcceptedRecord {
    date: NaiveDate,
    state: Option<String>,
    cause: Option<String>,
    age: Option<u8>,
    verified: bool,
    source_link: String,
    source_name: String,
    raw_text: String,
}

impl From<CandidateRecord> for AcceptedRecord {
    fn from(c: CandidateRecord) -> Self {
        Self {
            date: c.date,
            state: c.state,
            cause: c.cause,
            age: c.age,
            verified: c.verified,
            source_link: c.source_link,
            source_name: c.source_name,
            raw_text: c.raw_text,
        }
    }
}

impl AcceptedRecord {
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn state(&self) -> Option<&str> {
        self.state.as_deref()
    }

    pub fn cause(&self) -> Option<&str> {
        self.cause.as_deref()
    }

    pub fn age(&self) -> Option<u8> {
        self.age
    }

    pub fn verified(&self) -> bool {
        self.verified
    }

    pub fn source_link(&self) -> &str {
        &self.source_link
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }
}

/// Ordered, append-only sequence of accepted records.
pub type Dataset = Vec<AcceptedRecord>;
