use std::collections::HashSet;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use intel_core::RawItem;
use tracing::{debug, info, warn};

use crate::error::IngestError;
use crate::settings::{AppSettings, FeedSource};
use crate::traits::FetchClient;

use super::parse::parse_feed;

/// Feeds downloaded at once.
pub const FEED_CONCURRENCY: usize = 4;

const USER_AGENT: &str = concat!("media-intel/", env!("CARGO_PKG_VERSION"));

/// HTTP fetch client for the feeds listed in the settings file.
pub struct RssFetcher {
    client: reqwest::Client,
    feeds: RwLock<Vec<FeedSource>>,
}

impl RssFetcher {
    pub fn new(settings: &AppSettings, timeout: Duration) -> Result<Self, IngestError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            feeds: RwLock::new(settings.feeds.clone()),
        })
    }

    pub fn feeds(&self) -> Vec<FeedSource> {
        self.feeds.read().map(|f| f.clone()).unwrap_or_default()
    }

    async fn fetch_feed(&self, feed: &FeedSource) -> Result<Vec<RawItem>, IngestError> {
        let body = self
            .client
            .get(feed.url.trim())
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        parse_feed(&body, feed)
    }
}

#[async_trait]
impl FetchClient for RssFetcher {
    async fn fetch_all(&self) -> Result<Vec<RawItem>, IngestError> {
        let feeds = self.feeds();
        if feeds.is_empty() {
            warn!("no feeds configured");
            return Ok(Vec::new());
        }

        let results: Vec<(String, Result<Vec<RawItem>, IngestError>)> = stream::iter(feeds)
            .map(|feed| async move { (feed.name.clone(), self.fetch_feed(&feed).await) })
            .buffer_unordered(FEED_CONCURRENCY)
            .collect()
            .await;

        merge_feed_results(results)
    }

    fn reload(&self, settings: &AppSettings) {
        if let Ok(mut feeds) = self.feeds.write() {
            *feeds = settings.feeds.clone();
            info!(feeds = feeds.len(), "fetcher reloaded");
        }
    }
}

/// Combine per-feed results: failed feeds are skipped unless all of them
/// failed. Output is newest first with URL duplicates removed.
fn merge_feed_results(
    results: Vec<(String, Result<Vec<RawItem>, IngestError>)>,
) -> Result<Vec<RawItem>, IngestError> {
    let total = results.len();
    let mut failures = 0;
    let mut last_error = None;
    let mut items = Vec::new();

    for (name, result) in results {
        match result {
            Ok(feed_items) => {
                debug!(feed = %name, items = feed_items.len(), "feed fetched");
                items.extend(feed_items);
            }
            Err(e) => {
                warn!(feed = %name, error = %e, "feed fetch failed, skipping");
                failures += 1;
                last_error = Some(format!("{name}: {e}"));
            }
        }
    }

    if total > 0 && failures == total {
        return Err(IngestError::Fetch(format!(
            "all {total} feeds failed (last: {})",
            last_error.unwrap_or_default()
        )));
    }

    items.sort_by(|a, b| b.published.cmp(&a.published));
    let mut seen = HashSet::new();
    items.retain(|item| seen.insert(item.normalized_url()));
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn item(url: &str, day: Option<u32>) -> RawItem {
        RawItem {
            url: url.into(),
            title: format!("story {url}"),
            summary: String::new(),
            published: day.map(|d| Utc.with_ymd_and_hms(2025, 6, d, 0, 0, 0).unwrap()),
            source: "wire".into(),
            category: String::new(),
        }
    }

    #[test]
    fn merge_sorts_newest_first_and_dedups() {
        let results = vec![
            (
                "a".to_string(),
                Ok(vec![item("https://x.com/1", Some(1)), item("https://x.com/2", Some(3))]),
            ),
            (
                "b".to_string(),
                Ok(vec![item("https://x.com/2/", Some(2)), item("https://x.com/3", None)]),
            ),
        ];
        let merged = merge_feed_results(results).unwrap();
        let urls: Vec<_> = merged.iter().map(|i| i.url.as_str()).collect();
        assert_eq!(urls, vec!["https://x.com/2", "https://x.com/1", "https://x.com/3"]);
    }

    #[test]
    fn partial_failure_is_skipped() {
        let results = vec![
            ("up".to_string(), Ok(vec![item("https://x.com/1", Some(1))])),
            ("down".to_string(), Err(IngestError::Fetch("timeout".into()))),
        ];
        assert_eq!(merge_feed_results(results).unwrap().len(), 1);
    }

    #[test]
    fn total_failure_is_an_error() {
        let results = vec![
            ("one".to_string(), Err(IngestError::Fetch("timeout".into()))),
            ("two".to_string(), Err(IngestError::Parse("bad xml".into()))),
        ];
        let err = merge_feed_results(results).unwrap_err();
        assert!(err.to_string().contains("all 2 feeds failed"));
    }

    #[tokio::test]
    async fn no_feeds_is_empty_not_error() {
        let fetcher = RssFetcher::new(&AppSettings::default(), Duration::from_secs(1)).unwrap();
        assert!(fetcher.fetch_all().await.unwrap().is_empty());
    }

    #[test]
    fn reload_swaps_feed_list() {
        let fetcher = RssFetcher::new(&AppSettings::default(), Duration::from_secs(1)).unwrap();
        let settings = AppSettings {
            feeds: vec![FeedSource {
                name: "wire".into(),
                url: "https://example.com/rss".into(),
                category: "tech".into(),
            }],
            ..AppSettings::default()
        };
        fetcher.reload(&settings);
        assert_eq!(fetcher.feeds(), settings.feeds);
    }
}
