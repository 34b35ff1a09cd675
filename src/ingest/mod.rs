// src/ingest/mod.rs
pub mod providers;
pub mod types;

use metrics::counter;

use crate::ingest::types::{FeedFetcher, FeedSource, RawEntry};
use crate::telemetry;

/// Entries fetched from one configured feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedFeed {
    pub region: Option<String>,
    pub source: FeedSource,
    pub entries: Vec<RawEntry>,
}

/// Fetch every feed in order, one at a time.
///
/// A failing feed never aborts the run: it is logged, counted and contributes
/// zero entries. Feeds without a URL are skipped.
pub async fn fetch_feeds<'a, I>(fetcher: &dyn FeedFetcher, groups: I, limit: usize) -> Vec<FetchedFeed>
where
    I: IntoIterator<Item = (Option<&'a str>, &'a [FeedSource])>,
{
    let mut out = Vec::new();
    for (region, feeds) in groups {
        for feed in feeds {
            let url = feed.url.trim();
            if url.is_empty() {
                tracing::debug!(target: "ingest", feed = %feed.name, "feed without url skipped");
                continue;
            }
            let entries = match fetcher.fetch(url, limit).await {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(target: "ingest", error = ?e, feed = %feed.name, fetcher = fetcher.name(), "feed fetch failed");
                    counter!(telemetry::FEED_ERRORS_TOTAL).increment(1);
                    Vec::new()
                }
            };
            counter!(telemetry::ENTRIES_TOTAL).increment(entries.len() as u64);
            tracing::debug!(target: "ingest", feed = %feed.name, entries = entries.len(), "feed fetched");
            out.push(FetchedFeed {
                region: region.map(str::to_string),
                source: FeedSource::new(feed.name.trim(), url),
                entries,
            });
        }
    }
    out
}
