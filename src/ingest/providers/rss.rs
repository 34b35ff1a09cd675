// src/ingest/providers/rss.rs
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use metrics::histogram;
use quick_xml::de::from_str;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::ingest::types::{FeedFetcher, RawEntry};

/* ----------------------------
RSS 2.0
---------------------------- */

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    description: Option<String>,
}

/* ----------------------------
Atom
---------------------------- */

#[derive(Debug, Deserialize)]
struct Atom {
    #[serde(rename = "entry", default)]
    entry: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    title: Option<AtomText>,
    summary: Option<AtomText>,
    content: Option<AtomText>,
    #[serde(rename = "link", default)]
    link: Vec<AtomLink>,
}

#[derive(Debug, Deserialize)]
struct AtomText {
    #[serde(rename = "$text", default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

impl AtomEntry {
    /// `rel="alternate"` (or no rel) wins over other links.
    fn best_link(&self) -> Option<String> {
        self.link
            .iter()
            .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
            .or_else(|| self.link.first())
            .and_then(|l| l.href.clone())
    }
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Parse an RSS 2.0 or Atom document into raw entries (document order).
pub fn parse_feed(xml: &str) -> Result<Vec<RawEntry>> {
    let xml_clean = scrub_html_entities_for_xml(xml);

    if xml_clean.contains("<rss") || xml_clean.contains("<channel") {
        let rss: Rss = from_str(&xml_clean).context("parsing rss xml")?;
        return Ok(rss
            .channel
            .item
            .into_iter()
            .map(|it| RawEntry {
                title: non_empty(it.title),
                summary: non_empty(it.description),
                link: non_empty(it.link),
            })
            .collect());
    }

    if xml_clean.contains("<feed") {
        let atom: Atom = from_str(&xml_clean).context("parsing atom xml")?;
        return Ok(atom
            .entry
            .into_iter()
            .map(|e| {
                let link = e.best_link();
                RawEntry {
                    title: non_empty(e.title.map(|t| t.value)),
                    summary: non_empty(e.summary.or(e.content).map(|t| t.value)),
                    link: non_empty(link),
                }
            })
            .collect());
    }

    Err(anyhow!("unrecognized feed format (neither RSS nor Atom)"))
}

/// XML only knows five named entities; feeds often carry HTML ones.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&bdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
}

pub struct RssFetcher {
    mode: Mode,
}

enum Mode {
    /// url -> XML body, for tests and offline runs.
    Fixture(HashMap<String, String>),
    Http {
        client: reqwest::Client,
    },
}

impl RssFetcher {
    pub fn from_fixtures<I, K, V>(fixtures: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            mode: Mode::Fixture(
                fixtures
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    pub fn http(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("daily-brief/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("building feed http client")?;
        Ok(Self {
            mode: Mode::Http { client },
        })
    }

    fn parse_limited(body: &str, url: &str, limit: usize) -> Result<Vec<RawEntry>> {
        let t0 = std::time::Instant::now();
        let mut entries = parse_feed(body).with_context(|| format!("parsing feed {url}"))?;
        entries.truncate(limit);
        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!(crate::telemetry::FEED_PARSE_MS).record(ms);
        Ok(entries)
    }
}

#[async_trait]
impl FeedFetcher for RssFetcher {
    async fn fetch(&self, url: &str, limit: usize) -> Result<Vec<RawEntry>> {
        match &self.mode {
            Mode::Fixture(map) => {
                let body = map
                    .get(url)
                    .ok_or_else(|| anyhow!("no fixture for {url}"))?;
                Self::parse_limited(body, url, limit)
            }
            Mode::Http { client } => {
                let body = client
                    .get(url)
                    .send()
                    .await
                    .with_context(|| format!("GET {url}"))?
                    .error_for_status()
                    .with_context(|| format!("GET {url} status"))?
                    .text()
                    .await
                    .with_context(|| format!("reading body of {url}"))?;
                Self::parse_limited(&body, url, limit)
            }
        }
    }

    fn name(&self) -> &'static str {
        match self.mode {
            Mode::Fixture(_) => "fixture",
            Mode::Http { .. } => "http",
        }
    }
}
