//! Query loop driving the pipeline stages.
//!
//! The run is an explicit state machine:
//!
//! ```text
//! Idle -> Querying(i) -> Extracting(i) -> Accumulating(i) -+-> Querying(i + 1)
//!                                                          +-> Done       (threshold met)
//!                                                          +-> Exhausted  (no variants or entry budget left)
//! ```
//!
//! The choice after each cycle is made by [`next_phase`] alone. Both terminal
//! phases flush the store. A batch is admitted in full even when the
//! threshold is crossed partway through it.

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use chrono::NaiveDate;
use rand::{Rng, rng};
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

use super::dedup::{Admission, Deduplicator};
use super::extract::RecordExtractor;
use super::verify::VerificationScorer;
use super::{RunOutcome, RunStatus};
use crate::config::PipelineConfig;
use crate::error::{ConfigError, IngestError};
use crate::models::{AcceptedRecord, CandidateRecord, RawEntry};
use crate::outputs::json::RecordStore;
use crate::scrapers::{FeedSource, QueryVariant, query_plan};
use crate::utils::truncate_for_log;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Querying(usize),
    Extracting(usize),
    Accumulating(usize),
    Done,
    Exhausted,
}

/// Where the run goes once `accepted` records exist and `next_variant` is the
/// next unused query index. `entries_left` is what remains of the run's
/// budget of fetched entries.
pub fn next_phase(
    accepted: usize,
    threshold: usize,
    next_variant: usize,
    total: usize,
    entries_left: usize,
) -> Phase {
    if accepted >= threshold {
        Phase::Done
    } else if next_variant < total && entries_left > 0 {
        Phase::Querying(next_variant)
    } else {
        Phase::Exhausted
    }
}

/// Per-run counters, logged when the run ends.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunTally {
    pub queries: usize,
    pub fetch_errors: usize,
    pub fetched: usize,
    pub repeated_links: usize,
    pub rejected: BTreeMap<&'static str, usize>,
    pub duplicates: usize,
    pub accepted: usize,
    pub verified: usize,
}

pub struct Orchestrator<F> {
    feed: F,
    extractor: RecordExtractor,
    scorer: VerificationScorer,
    dedup: Deduplicator,
    store: RecordStore,
    variants: Vec<QueryVariant>,
    threshold: usize,
    max_total_entries: usize,
    request_delay: Duration,
}

impl<F: FeedSource> Orchestrator<F> {
    pub fn new(
        feed: F,
        config: &PipelineConfig,
        store: RecordStore,
        threshold: usize,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            feed,
            extractor: RecordExtractor::from_config(config)?,
            scorer: VerificationScorer::new(&config.credibility),
            dedup: Deduplicator::new(config.similarity_threshold),
            store,
            variants: query_plan(config),
            threshold,
            max_total_entries: config.feed.max_total_entries,
            request_delay: Duration::from_millis(config.feed.request_delay_ms),
        })
    }

    /// Pause between consecutive queries; zero disables it.
    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    /// Run the query loop for `target_date` until the threshold is met or the
    /// query plan (or entry budget) runs out, then flush the store.
    ///
    /// Fetch failures cost one variant and are tallied; extraction rejects
    /// and duplicates are dropped silently at debug level.
    ///
    /// # Arguments
    ///
    /// * `target_date` - Day the accepted records are dated with
    ///
    /// # Returns
    ///
    /// A [`RunOutcome`] with the number of records appended this run, or an
    /// [`IngestError`] if the dataset could not be written.
    #[instrument(level = "info", skip(self), fields(threshold = self.threshold, variants = self.variants.len()))]
    pub async fn run(mut self, target_date: NaiveDate) -> Result<RunOutcome, IngestError> {
        let mut tally = RunTally::default();
        let mut seen_links: HashSet<String> = self
            .store
            .records()
            .iter()
            .map(|r| r.source_link().to_string())
            .collect();
        let mut entries: Vec<RawEntry> = Vec::new();
        let mut candidates: Vec<CandidateRecord> = Vec::new();
        let mut phase = Phase::Idle;

        loop {
            debug!(?phase, "Pipeline phase");
            phase = match phase {
                Phase::Idle => next_phase(
                    0,
                    self.threshold,
                    0,
                    self.variants.len(),
                    self.max_total_entries,
                ),
                Phase::Querying(i) => {
                    if i > 0 {
                        self.pause().await;
                    }
                    tally.queries += 1;
                    entries = match self.feed.fetch(&self.variants[i], target_date).await {
                        Ok(mut found) => {
                            let room = self.max_total_entries.saturating_sub(tally.fetched);
                            if found.len() > room {
                                debug!(dropped = found.len() - room, "Entry budget reached");
                                found.truncate(room);
                            }
                            tally.fetched += found.len();
                            found
                        }
                        Err(e) => {
                            tally.fetch_errors += 1;
                            warn!(variant = i, query = %self.variants[i].keywords, error = %e, "Feed query failed; skipping");
                            Vec::new()
                        }
                    };
                    Phase::Extracting(i)
                }
                Phase::Extracting(i) => {
                    for entry in entries.drain(..) {
                        if !seen_links.insert(entry.link.clone()) {
                            tally.repeated_links += 1;
                            continue;
                        }
                        match self.extractor.extract(&entry, target_date) {
                            Ok(mut candidate) => {
                                candidate.verified = self.scorer.score(&candidate);
                                candidates.push(candidate);
                            }
                            Err(reason) => {
                                *tally.rejected.entry(reason.label()).or_insert(0) += 1;
                                debug!(
                                    reason = reason.label(),
                                    title = %truncate_for_log(&entry.title, 120),
                                    "Entry rejected"
                                );
                            }
                        }
                    }
                    Phase::Accumulating(i)
                }
                Phase::Accumulating(i) => {
                    for candidate in candidates.drain(..) {
                        match self.dedup.admit(&candidate, self.store.records()) {
                            Admission::Accept => {
                                tally.accepted += 1;
                                if candidate.verified {
                                    tally.verified += 1;
                                }
                                debug!(state = ?candidate.state, cause = ?candidate.cause, "Record accepted");
                                self.store.append(AcceptedRecord::from(candidate));
                            }
                            Admission::Duplicate { of } => {
                                tally.duplicates += 1;
                                debug!(
                                    of,
                                    text = %truncate_for_log(&candidate.raw_text, 120),
                                    "Duplicate dropped"
                                );
                            }
                        }
                    }
                    info!(
                        variant = i + 1,
                        of = self.variants.len(),
                        accepted = tally.accepted,
                        threshold = self.threshold,
                        "Query cycle complete"
                    );
                    next_phase(
                        tally.accepted,
                        self.threshold,
                        i + 1,
                        self.variants.len(),
                        self.max_total_entries.saturating_sub(tally.fetched),
                    )
                }
                Phase::Done | Phase::Exhausted => break,
            };
        }

        let status = if phase == Phase::Done {
            RunStatus::Complete
        } else {
            RunStatus::Partial
        };
        if status == RunStatus::Partial {
            warn!(
                accepted = tally.accepted,
                threshold = self.threshold,
                shortfall = self.threshold - tally.accepted,
                fetched = tally.fetched,
                "Query variants or entry budget exhausted before threshold"
            );
        }

        self.store.flush()?;
        info!(
            queries = tally.queries,
            fetch_errors = tally.fetch_errors,
            fetched = tally.fetched,
            repeated_links = tally.repeated_links,
            rejected = ?tally.rejected,
            duplicates = tally.duplicates,
            accepted = tally.accepted,
            verified = tally.verified,
            "Run tally"
        );

        Ok(RunOutcome {
            accepted_count: self.store.appended(),
            status,
            dataset_path: self.store.path().to_path_buf(),
        })
    }

    async fn pause(&self) {
        if self.request_delay.is_zero() {
            return;
        }
        let jitter_ms: u64 = rng().random_range(0..=250);
        sleep(self.request_delay + Duration::from_millis(jitter_ms)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use chrono::{TimeZone, Utc};
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::TempDir;

    const STATES: [&str; 10] = [
        "Kerala", "Goa", "Bihar", "Assam", "Punjab", "Sikkim", "Tripura", "Manipur", "Odisha",
        "Gujarat",
    ];

    /// Canned feed keyed by query keywords; unknown queries fail.
    #[derive(Default)]
    struct StubFeed {
        responses: HashMap<String, Vec<RawEntry>>,
        calls: RefCell<Vec<String>>,
    }

    impl StubFeed {
        fn with(mut self, query: &str, entries: Vec<RawEntry>) -> Self {
            self.responses.insert(query.to_string(), entries);
            self
        }
    }

    impl FeedSource for &StubFeed {
        async fn fetch(
            &self,
            query: &QueryVariant,
            _target_date: NaiveDate,
        ) -> Result<Vec<RawEntry>, FetchError> {
            self.calls.borrow_mut().push(query.keywords.clone());
            self.responses
                .get(&query.keywords)
                .cloned()
                .ok_or_else(|| FetchError::Status {
                    status: 503,
                    url: query.keywords.clone(),
                })
        }
    }

    fn target() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, 6).unwrap()
    }

    fn entry(title: &str, link: &str) -> RawEntry {
        RawEntry {
            title: title.to_string(),
            snippet: String::new(),
            link: link.to_string(),
            source_name: "The Hindu".to_string(),
            published_at: Some(Utc.with_ymd_and_hms(2025, 5, 6, 8, 0, 0).unwrap()),
        }
    }

    fn ten_distinct_entries() -> Vec<RawEntry> {
        STATES
            .iter()
            .enumerate()
            .map(|(i, s)| entry(&format!("Man dies in {s}"), &format!("https://example.com/{i}")))
            .collect()
    }

    fn config(queries: &[&str]) -> PipelineConfig {
        let list = queries
            .iter()
            .map(|q| format!("    - \"{q}\"\n"))
            .collect::<String>();
        PipelineConfig::from_yaml(&format!("queries:\n  base:\n{list}")).unwrap()
    }

    async fn run(
        feed: &StubFeed,
        config: &PipelineConfig,
        dir: &TempDir,
        threshold: usize,
    ) -> Result<RunOutcome, IngestError> {
        let store = RecordStore::load(dir.path().join("scrap_data.json")).unwrap();
        Orchestrator::new(feed, config, store, threshold)
            .unwrap()
            .with_request_delay(Duration::ZERO)
            .run(target())
            .await
    }

    fn stored(dir: &TempDir) -> Vec<AcceptedRecord> {
        RecordStore::load(dir.path().join("scrap_data.json"))
            .unwrap()
            .records()
            .to_vec()
    }

    #[test]
    fn test_next_phase_transitions() {
        assert_eq!(next_phase(15, 15, 3, 10, 100), Phase::Done);
        assert_eq!(next_phase(20, 15, 10, 10, 100), Phase::Done);
        assert_eq!(next_phase(4, 15, 3, 10, 100), Phase::Querying(3));
        assert_eq!(next_phase(4, 15, 10, 10, 100), Phase::Exhausted);
        assert_eq!(next_phase(0, 0, 0, 0, 100), Phase::Done);
        assert_eq!(next_phase(0, 1, 0, 0, 100), Phase::Exhausted);
        assert_eq!(next_phase(4, 15, 3, 10, 0), Phase::Exhausted);
        assert_eq!(next_phase(15, 15, 3, 10, 0), Phase::Done);
    }

    #[tokio::test]
    async fn test_entry_budget_caps_fetching_across_queries() {
        let dir = TempDir::new().unwrap();
        let extra = ["Delhi", "Haryana", "Nagaland", "Mizoram", "Meghalaya"]
            .iter()
            .enumerate()
            .map(|(i, s)| entry(&format!("Man dies in {s}"), &format!("https://example.com/x{i}")))
            .collect();
        let feed = StubFeed::default()
            .with("q1", ten_distinct_entries())
            .with("q2", extra)
            .with("q3", vec![entry("Man dies in Goa", "https://example.com/goa")]);
        let mut cfg = config(&["q1", "q2", "q3"]);
        cfg.feed.max_total_entries = 12;

        let outcome = run(&feed, &cfg, &dir, 15).await.unwrap();
        assert_eq!(outcome.status, RunStatus::Partial);
        assert_eq!(outcome.accepted_count, 12);
        assert_eq!(*feed.calls.borrow(), vec!["q1".to_string(), "q2".to_string()]);
        assert_eq!(stored(&dir).len(), 12);
    }

    #[tokio::test]
    async fn test_kerala_pair_yields_one_record() {
        let dir = TempDir::new().unwrap();
        let feed = StubFeed::default().with(
            "q1",
            vec![
                entry("Man, 45, drowns in Kerala river", "https://example.com/a"),
                entry("45-year-old man dies in Kerala drowning incident", "https://example.com/b"),
            ],
        );

        let outcome = run(&feed, &config(&["q1"]), &dir, 15).await.unwrap();
        assert_eq!(outcome.accepted_count, 1);
        assert_eq!(outcome.status, RunStatus::Partial);

        let records = stored(&dir);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].raw_text(), "Man, 45, drowns in Kerala river");
        assert_eq!(records[0].age(), Some(45));
        assert!(records[0].verified());
    }

    #[tokio::test]
    async fn test_partial_run_persists_what_was_accepted() {
        let dir = TempDir::new().unwrap();
        let feed = StubFeed::default()
            .with("q1", ten_distinct_entries())
            .with("q2", vec![]);

        let outcome = run(&feed, &config(&["q1", "q2"]), &dir, 15).await.unwrap();
        assert_eq!(outcome.status, RunStatus::Partial);
        assert_eq!(outcome.accepted_count, 10);
        assert!(outcome.is_success());
        assert_eq!(stored(&dir).len(), 10);
        assert_eq!(feed.calls.borrow().len(), 2);
    }

    #[tokio::test]
    async fn test_threshold_stops_querying_but_keeps_whole_batch() {
        let dir = TempDir::new().unwrap();
        let feed = StubFeed::default()
            .with("q1", ten_distinct_entries())
            .with("q2", vec![entry("Man dies in Delhi", "https://example.com/delhi")]);

        let outcome = run(&feed, &config(&["q1", "q2"]), &dir, 3).await.unwrap();
        assert_eq!(outcome.status, RunStatus::Complete);
        assert_eq!(outcome.accepted_count, 10);
        assert_eq!(*feed.calls.borrow(), vec!["q1".to_string()]);
    }

    #[tokio::test]
    async fn test_duplicates_across_queries_are_dropped() {
        let dir = TempDir::new().unwrap();
        let feed = StubFeed::default()
            .with("q1", vec![entry("Man, 45, drowns in Kerala river", "https://example.com/a")])
            .with(
                "q2",
                vec![
                    entry("Man, 45, drowns in Kerala river", "https://example.com/a"),
                    entry("Kerala: fisherman drowned off Kollam coast", "https://example.com/c"),
                ],
            );

        let outcome = run(&feed, &config(&["q1", "q2"]), &dir, 15).await.unwrap();
        assert_eq!(outcome.accepted_count, 1);
    }

    #[tokio::test]
    async fn test_second_run_on_same_input_adds_nothing() {
        let dir = TempDir::new().unwrap();
        let feed = StubFeed::default().with("q1", ten_distinct_entries());
        let cfg = config(&["q1"]);

        let first = run(&feed, &cfg, &dir, 15).await.unwrap();
        assert_eq!(first.accepted_count, 10);
        let before = stored(&dir);

        let second = run(&feed, &cfg, &dir, 15).await.unwrap();
        assert_eq!(second.accepted_count, 0);
        assert!(!second.is_success());

        let after = stored(&dir);
        assert_eq!(after, before);
    }

    #[tokio::test]
    async fn test_second_run_extends_dataset() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&["q1"]);

        let first = StubFeed::default().with("q1", ten_distinct_entries()[..4].to_vec());
        run(&first, &cfg, &dir, 15).await.unwrap();
        let before = stored(&dir);

        let second = StubFeed::default().with("q1", ten_distinct_entries());
        let outcome = run(&second, &cfg, &dir, 15).await.unwrap();
        assert_eq!(outcome.accepted_count, 6);

        let after = stored(&dir);
        assert_eq!(after.len(), 10);
        assert_eq!(&after[..4], &before[..]);
    }

    #[tokio::test]
    async fn test_fetch_errors_are_not_fatal() {
        let dir = TempDir::new().unwrap();
        let feed = StubFeed::default().with("q2", ten_distinct_entries()[..2].to_vec());

        let outcome = run(&feed, &config(&["q1", "q2"]), &dir, 15).await.unwrap();
        assert_eq!(outcome.accepted_count, 2);
        assert_eq!(outcome.status, RunStatus::Partial);
    }

    #[tokio::test]
    async fn test_all_queries_failing_reports_empty_partial() {
        let dir = TempDir::new().unwrap();
        let feed = StubFeed::default();

        let outcome = run(&feed, &config(&["q1", "q2"]), &dir, 15).await.unwrap();
        assert_eq!(outcome.accepted_count, 0);
        assert_eq!(outcome.status, RunStatus::Partial);
        assert!(!outcome.is_success());
        assert!(stored(&dir).is_empty());
    }

    #[tokio::test]
    async fn test_rejected_entries_are_not_stored() {
        let dir = TempDir::new().unwrap();
        let feed = StubFeed::default().with(
            "q1",
            vec![
                entry("Monsoon session of parliament begins", "https://example.com/p"),
                entry("Man dies in Goa", "https://example.com/goa"),
            ],
        );

        let outcome = run(&feed, &config(&["q1"]), &dir, 15).await.unwrap();
        assert_eq!(outcome.accepted_count, 1);
        assert_eq!(stored(&dir)[0].state(), Some("Goa"));
    }

    #[tokio::test]
    async fn test_zero_threshold_completes_without_querying() {
        let dir = TempDir::new().unwrap();
        let feed = StubFeed::default().with("q1", ten_distinct_entries());

        let outcome = run(&feed, &config(&["q1"]), &dir, 0).await.unwrap();
        assert_eq!(outcome.status, RunStatus::Complete);
        assert_eq!(outcome.accepted_count, 0);
        assert!(feed.calls.borrow().is_empty());
        assert!(dir.path().join("scrap_data.json").exists());
    }

    #[tokio::test]
    async fn test_accepted_dates_match_target() {
        let dir = TempDir::new().unwrap();
        let mut entries = ten_distinct_entries();
        entries[0].published_at = Some(Utc.with_ymd_and_hms(2025, 5, 5, 22, 0, 0).unwrap());
        entries[1].published_at = Some(Utc.with_ymd_and_hms(2025, 4, 20, 22, 0, 0).unwrap());
        let feed = StubFeed::default().with("q1", entries);

        let outcome = run(&feed, &config(&["q1"]), &dir, 15).await.unwrap();
        assert_eq!(outcome.accepted_count, 9);
        assert!(stored(&dir).iter().all(|r| r.date() == target()));
    }

    #[tokio::test]
    async fn test_corrupt_dataset_aborts_and_is_preserved() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scrap_data.json");
        fs::write(&path, "not json").unwrap();

        let feed = StubFeed::default().with("q1", ten_distinct_entries());
        let err = super::super::run_ingestion_with(&feed, &config(&["q1"]), &path, target(), 15)
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Store(_)));
        assert_eq!(fs::read_to_string(&path).unwrap(), "not json");
        assert!(feed.calls.borrow().is_empty());
    }
}
