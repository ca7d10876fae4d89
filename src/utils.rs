//! Text helpers shared by the extraction and deduplication stages.
//!
//! - Normalization and tokenization for similarity checks
//! - HTML-to-text stripping for feed descriptions
//! - Word-bounded phrase matching built from lexicon tables
//! - Log-friendly truncation

use std::collections::HashSet;

use itertools::Itertools;
use regex::{Regex, RegexBuilder};
use scraper::Html;

/// Words carrying no event identity; ignored when comparing texts.
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "by", "for", "from", "has", "in", "is", "it", "its",
    "of", "on", "or", "the", "to", "was", "were", "with", "after", "his", "her", "their",
];

/// Truncate a string for logging purposes.
///
/// Long strings are cut at `max` characters with an ellipsis and the number
/// of dropped bytes appended.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((cut, _)) => format!("{}…(+{} bytes)", &s[..cut], s.len() - cut),
    }
}

/// Lowercase and collapse runs of whitespace to single spaces.
pub fn normalize_text(s: &str) -> String {
    s.split_whitespace().join(" ").to_lowercase()
}

/// Distinct lowercase alphanumeric tokens, stopwords removed.
pub fn tokens(s: &str) -> HashSet<String> {
    s.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty() && !STOPWORDS.contains(t))
        .map(str::to_string)
        .collect()
}

/// Share of the smaller token set found in the larger one, in `0.0..=1.0`.
///
/// Headlines for one event are often a short and a long phrasing of the same
/// facts, so the overlap is measured against the shorter text.
pub fn overlap_ratio(a: &str, b: &str) -> f64 {
    let (ta, tb) = (tokens(a), tokens(b));
    let smaller = ta.len().min(tb.len());
    if smaller == 0 {
        return 0.0;
    }
    ta.intersection(&tb).count() as f64 / smaller as f64
}

/// Extract visible text from an HTML fragment, whitespace collapsed.
pub fn strip_html(fragment: &str) -> String {
    let parsed = Html::parse_fragment(fragment);
    parsed.root_element().text().join(" ").split_whitespace().join(" ")
}

/// Compile a case-insensitive regex matching any phrase on word boundaries.
///
/// Inner whitespace in a phrase matches any whitespace run, so
/// `"body found"` also matches `"body\n found"`.
pub fn phrase_pattern<S: AsRef<str>>(phrases: &[S]) -> Result<Regex, regex::Error> {
    let alternation = phrases
        .iter()
        .map(|p| p.as_ref().trim())
        .filter(|p| !p.is_empty())
        .sorted_by_key(|p| std::cmp::Reverse(p.len()))
        .map(|p| p.split_whitespace().map(regex::escape).join(r"\s+"))
        .join("|");
    // An empty lexicon must never match.
    let body = if alternation.is_empty() {
        r"[^\s\S]".to_string()
    } else {
        format!(r"\b(?:{alternation})\b")
    };
    RegexBuilder::new(&body).case_insensitive(true).build()
}
