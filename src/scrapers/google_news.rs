//! Google News RSS search.
//!
//! Queries the public search feed at `news.google.com/rss/search` for one
//! [`QueryVariant`] at a time. Items are RSS 2.0:
//!
//! ```text
//! <item>
//!   <title>Man, 45, drowns in Kerala river - The Hindu</title>
//!   <link>https://news.google.com/rss/articles/...</link>
//!   <pubDate>Tue, 06 May 2025 07:00:00 GMT</pubDate>
//!   <description>&lt;a href="..."&gt;Man, 45, drowns ...&lt;/a&gt;...</description>
//!   <source url="https://www.thehindu.com">The Hindu</source>
//! </item>
//! ```
//!
//! Google appends ` - Source` to every title and wraps the description in
//! HTML; both are cleaned before a [`RawEntry`] is built.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::{FeedSource, QueryVariant};
use crate::config::FeedConfig;
use crate::error::FetchError;
use crate::models::RawEntry;
use crate::utils::strip_html;

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    description: String,
    #[serde(rename = "pubDate", default)]
    pub_date: Option<String>,
    #[serde(default)]
    source: Option<ItemSource>,
}

#[derive(Debug, Deserialize)]
struct ItemSource {
    #[serde(rename = "$text", default)]
    name: String,
}

/// Client for the Google News search feed.
#[derive(Debug)]
pub struct GoogleNewsFeed {
    client: Client,
    feed: FeedConfig,
}

impl GoogleNewsFeed {
    /// Build a client with the configured timeout and user agent.
    pub fn new(feed: FeedConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(feed.request_timeout_secs))
            .user_agent(feed.user_agent.clone())
            .build()?;
        Ok(Self { client, feed })
    }

    /// Full RSS search URL for a query on `date`.
    pub fn search_url(&self, query: &QueryVariant, date: NaiveDate) -> Result<Url, url::ParseError> {
        let raw = format!(
            "{}?q={}&hl={}&gl={}&ceid={}",
            self.feed.endpoint,
            urlencoding::encode(&query.search_string(date)),
            urlencoding::encode(&self.feed.locale),
            urlencoding::encode(&self.feed.country),
            urlencoding::encode(&self.feed.edition),
        );
        Url::parse(&raw)
    }
}

impl FeedSource for GoogleNewsFeed {
    #[instrument(level = "info", skip_all, fields(query = %query.keywords, state = ?query.state))]
    async fn fetch(
        &self,
        query: &QueryVariant,
        target_date: NaiveDate,
    ) -> Result<Vec<RawEntry>, FetchError> {
        let url = self.search_url(query, target_date)?;
        debug!(%url, "Requesting feed");

        let resp = self.client.get(url.as_str()).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = resp.text().await?;
        let entries = parse_feed(&body, self.feed.max_entries_per_query)?;
        info!(count = entries.len(), bytes = body.len(), "Fetched feed entries");
        Ok(entries)
    }
}

/// Parse an RSS document into at most `max_items` entries.
pub fn parse_feed(xml: &str, max_items: usize) -> Result<Vec<RawEntry>, FetchError> {
    let rss: Rss = quick_xml::de::from_str(xml)?;
    let total = rss.channel.items.len();
    let entries: Vec<RawEntry> = rss
        .channel
        .items
        .into_iter()
        .take(max_items)
        .filter_map(to_raw_entry)
        .collect();
    if entries.len() < total.min(max_items) {
        warn!(
            total,
            kept = entries.len(),
            "Dropped feed items without a title or link"
        );
    }
    Ok(entries)
}

fn to_raw_entry(item: Item) -> Option<RawEntry> {
    let source_name = item
        .source
        .map(|s| s.name.trim().to_string())
        .unwrap_or_default();
    let title = strip_source_suffix(item.title.trim(), &source_name);
    let link = resolve_google_link(item.link.trim());
    if title.is_empty() || link.is_empty() {
        return None;
    }

    let snippet = strip_html(&item.description);
    let snippet = snippet
        .strip_suffix(source_name.as_str())
        .unwrap_or(&snippet)
        .trim()
        .to_string();

    let published_at = item
        .pub_date
        .as_deref()
        .and_then(|d| DateTime::parse_from_rfc2822(d.trim()).ok())
        .map(|d| d.with_timezone(&Utc));

    Some(RawEntry {
        title,
        snippet,
        link,
        source_name,
        published_at,
    })
}

/// Drop the ` - Source` tail Google adds to headlines.
fn strip_source_suffix(title: &str, source_name: &str) -> String {
    if source_name.is_empty() {
        return title.to_string();
    }
    title
        .strip_suffix(source_name)
        .and_then(|t| t.trim_end().strip_suffix('-'))
        .map(|t| t.trim_end().to_string())
        .unwrap_or_else(|| title.to_string())
}

/// Unwrap Google News redirect links that carry the target in a `url` parameter.
fn resolve_google_link(link: &str) -> String {
    let Ok(parsed) = Url::parse(link) else {
        return link.to_string();
    };
    let is_google = parsed
        .host_str()
        .is_some_and(|h| h.contains("news.google"));
    if is_google {
        if let Some((_, target)) = parsed.query_pairs().find(|(k, _)| k == "url") {
            return target.into_owned();
        }
    }
    link.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use chrono::{Datelike, Timelike};

    const SAMPLE_FEED: &str = r##"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/">
  <channel>
    <generator>NFE/5.0</generator>
    <title>"drowned" - Google News</title>
    <link>https://news.google.com/search?q=drowned</link>
    <language>en-IN</language>
    <description>Google News</description>
    <item>
      <title>Man, 45, drowns in Kerala river - The Hindu</title>
      <link>https://news.google.com/rss/articles/CBMiabc?oc=5</link>
      <guid isPermaLink="false">CBMiabc</guid>
      <pubDate>Tue, 06 May 2025 07:30:00 GMT</pubDate>
      <description>&lt;a href="https://news.google.com/rss/articles/CBMiabc?oc=5" target="_blank"&gt;Man, 45, drowns in Kerala river&lt;/a&gt;&amp;nbsp;&amp;nbsp;&lt;font color="#6f6f6f"&gt;The Hindu&lt;/font&gt;</description>
      <source url="https://www.thehindu.com">The Hindu</source>
    </item>
    <item>
      <title>Two killed as bus overturns near Jaipur - NDTV</title>
      <link>https://news.google.com/url?url=https%3A%2F%2Fwww.ndtv.com%2Findia-news%2Fbus-1&amp;ct=ga</link>
      <guid isPermaLink="false">CBMidef</guid>
      <pubDate>Tue, 06 May 2025 11:05:00 GMT</pubDate>
      <description>Two killed as bus overturns near Jaipur</description>
      <source url="https://www.ndtv.com">NDTV</source>
    </item>
    <item>
      <title></title>
      <link>https://news.google.com/rss/articles/empty</link>
    </item>
  </channel>
</rss>"##;

    #[test]
    fn test_parse_feed_extracts_entries() {
        let entries = parse_feed(SAMPLE_FEED, 200).unwrap();
        assert_eq!(entries.len(), 2);

        let first = &entries[0];
        assert_eq!(first.title, "Man, 45, drowns in Kerala river");
        assert_eq!(first.source_name, "The Hindu");
        assert_eq!(first.snippet, "Man, 45, drowns in Kerala river");
        let published = first.published_at.unwrap();
        assert_eq!(published.day(), 6);
        assert_eq!(published.hour(), 7);
    }

    #[test]
    fn test_parse_feed_resolves_wrapped_links() {
        let entries = parse_feed(SAMPLE_FEED, 200).unwrap();
        assert_eq!(entries[1].link, "https://www.ndtv.com/india-news/bus-1");
        assert_eq!(entries[1].title, "Two killed as bus overturns near Jaipur");
    }

    #[test]
    fn test_parse_feed_caps_items() {
        let entries = parse_feed(SAMPLE_FEED, 1).unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_parse_feed_rejects_malformed_xml() {
        let err = parse_feed("<rss><channel><item>", 10).unwrap_err();
        assert!(matches!(err, FetchError::Parse(_)));
    }

    #[test]
    fn test_parse_feed_empty_channel() {
        let xml = r#"<rss version="2.0"><channel><title>none</title></channel></rss>"#;
        assert!(parse_feed(xml, 10).unwrap().is_empty());
    }

    #[test]
    fn test_strip_source_suffix() {
        assert_eq!(
            strip_source_suffix("Boy dies - Times of India", "Times of India"),
            "Boy dies"
        );
        assert_eq!(strip_source_suffix("Boy dies", "Times of India"), "Boy dies");
        assert_eq!(strip_source_suffix("Boy dies - X", ""), "Boy dies - X");
    }

    #[test]
    fn test_resolve_google_link_passthrough() {
        assert_eq!(
            resolve_google_link("https://www.thehindu.com/a.ece"),
            "https://www.thehindu.com/a.ece"
        );
        assert_eq!(resolve_google_link("not a url"), "not a url");
    }

    #[test]
    fn test_search_url_encodes_query() {
        let config = PipelineConfig::builtin().unwrap();
        let feed = GoogleNewsFeed::new(config.feed).unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 5, 6).unwrap();
        let url = feed
            .search_url(&QueryVariant::new("\"drowned\" site:in"), date)
            .unwrap();

        assert_eq!(url.host_str(), Some("news.google.com"));
        let q = url
            .query_pairs()
            .find(|(k, _)| k == "q")
            .map(|(_, v)| v.into_owned())
            .unwrap();
        assert_eq!(q, "\"drowned\" site:in after:2025-05-05 before:2025-05-07");
        assert!(url.query_pairs().any(|(k, v)| k == "ceid" && v == "IN:en"));
    }
}
