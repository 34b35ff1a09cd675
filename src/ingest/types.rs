// src/ingest/types.rs
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// A configured syndication feed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedSource {
    #[serde(default = "unknown_source")]
    pub name: String,
    #[serde(default)]
    pub url: String,
}

fn unknown_source() -> String {
    "Unknown source".to_string()
}

impl FeedSource {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// One entry as returned by a fetcher; any field may be missing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawEntry {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub link: Option<String>,
}

/// An entry that passed the minimal-content check, tied to its source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CandidateItem {
    pub title: String,
    pub link: String, // canonicalized; empty if the entry had none
    pub source: String,
    pub summary: String,
}

impl CandidateItem {
    /// Build from a raw entry. Returns `None` when neither title nor link is present.
    pub fn from_raw(raw: &RawEntry, source: &str) -> Option<Self> {
        let title = raw.title.as_deref().unwrap_or_default().trim();
        let link = raw.link.as_deref().unwrap_or_default().trim();
        if title.is_empty() && link.is_empty() {
            return None;
        }
        Some(Self {
            title: title.to_string(),
            link: crate::dedupe::canonicalize_link(link),
            source: source.trim().to_string(),
            summary: raw.summary.as_deref().unwrap_or_default().trim().to_string(),
        })
    }
}

#[async_trait::async_trait]
pub trait FeedFetcher: Send + Sync {
    /// Fetch up to `limit` entries from `url`.
    async fn fetch(&self, url: &str, limit: usize) -> Result<Vec<RawEntry>>;
    fn name(&self) -> &'static str;
}
