// src/config/digest.rs
//! Explicit configuration structure: every recognized option with its default.

use anyhow::{anyhow, bail, Result};
use chrono_tz::Tz;
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::classify::CategoryRule;
use crate::dedupe::{DedupeScope, DEFAULT_DEDUPE_THRESHOLD};
use crate::ingest::types::FeedSource;
use crate::render::{MarkupMode, RenderConfig};
use crate::split::{DeliveryMode, DEFAULT_MAX_MESSAGE_LEN};
use crate::text::Normalization;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DigestConfig {
    pub settings: Settings,
    pub categories: BTreeMap<String, CategoryRule>,
    pub filters: Filters,
    pub feeds: Feeds,
    pub render: RenderConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Entries considered per feed.
    #[serde(alias = "scan_per_feed")]
    pub items_per_feed: usize,
    /// Cap for every (region, category) bucket.
    #[serde(alias = "max_items_per_section")]
    pub max_items_per_category: usize,
    /// Fuzzy title threshold on a 0..=100 scale; 0 disables fuzzy dedupe.
    pub dedupe_threshold: u8,
    pub dedupe_scope: DedupeScope,
    pub delivery_mode: DeliveryMode,
    pub markup: MarkupMode,
    pub max_message_len: usize,
    pub romania_top: Option<usize>,
    pub world_top: Option<usize>,
    /// Per-region caps (shrink mode).
    pub region_top: BTreeMap<String, usize>,
    /// Cap on items across the whole digest (shrink mode).
    pub max_total_items: Option<usize>,
    /// Region whose items must look like the regional language.
    pub local_region: String,
    pub region_order: Vec<String>,
    /// Categories rendered when no run selection is supplied.
    pub default_categories: Vec<String>,
    pub timezone: String,
    pub date_format: String,
    pub normalization: Normalization,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            items_per_feed: 10,
            max_items_per_category: 12,
            dedupe_threshold: DEFAULT_DEDUPE_THRESHOLD,
            dedupe_scope: DedupeScope::Run,
            delivery_mode: DeliveryMode::Split,
            markup: MarkupMode::Html,
            max_message_len: DEFAULT_MAX_MESSAGE_LEN,
            romania_top: None,
            world_top: None,
            region_top: BTreeMap::new(),
            max_total_items: None,
            local_region: "romania".to_string(),
            region_order: vec!["romania".to_string(), "world".to_string()],
            default_categories: vec!["politics".to_string(), "economy".to_string()],
            timezone: "Europe/Bucharest".to_string(),
            date_format: "%d %b %Y".to_string(),
            normalization: Normalization::Strict,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Filters {
    pub exclude_any: Vec<String>,
}

/// Either a flat feed list or feeds grouped by region.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Feeds {
    Flat(Vec<FeedSource>),
    Regional(BTreeMap<String, Vec<FeedSource>>),
}

impl Default for Feeds {
    fn default() -> Self {
        Feeds::Flat(Vec::new())
    }
}

impl Feeds {
    pub fn is_regional(&self) -> bool {
        matches!(self, Feeds::Regional(_))
    }

    /// Feed groups in display order: `region_order` first, then the remaining
    /// regions alphabetically. A flat list is one group without a region.
    pub fn groups<'a>(&'a self, region_order: &[String]) -> Vec<(Option<&'a str>, &'a [FeedSource])> {
        match self {
            Feeds::Flat(list) => vec![(None, list.as_slice())],
            Feeds::Regional(map) => {
                let mut out: Vec<(Option<&str>, &[FeedSource])> = Vec::with_capacity(map.len());
                for r in region_order {
                    if let Some((k, v)) = map.get_key_value(r) {
                        out.push((Some(k.as_str()), v.as_slice()));
                    }
                }
                for (k, v) in map {
                    if !region_order.iter().any(|r| r == k) {
                        out.push((Some(k.as_str()), v.as_slice()));
                    }
                }
                out
            }
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Feeds::Flat(list) => list.len(),
            Feeds::Regional(map) => map.values().map(Vec::len).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DigestConfig {
    /// Check ranges and fold legacy/duplicated options. Call once after loading.
    pub fn validate(mut self) -> Result<Self> {
        let s = &mut self.settings;
        if s.dedupe_threshold > 100 {
            bail!("settings.dedupe_threshold must be within 0..=100, got {}", s.dedupe_threshold);
        }
        if s.max_message_len == 0 {
            bail!("settings.max_message_len must be positive");
        }
        s.timezone
            .parse::<Tz>()
            .map_err(|e| anyhow!("settings.timezone `{}` is not a known zone: {e}", s.timezone))?;

        if let Some(n) = s.romania_top {
            s.region_top.entry("romania".to_string()).or_insert(n);
        }
        if let Some(n) = s.world_top {
            s.region_top.entry("world".to_string()).or_insert(n);
        }
        s.default_categories = s
            .default_categories
            .iter()
            .map(|c| c.trim().to_lowercase())
            .filter(|c| !c.is_empty())
            .collect();

        // Category ids are matched against a lowercased run selection.
        let categories = std::mem::take(&mut self.categories);
        for (id, rule) in categories {
            let id = id.trim().to_lowercase();
            if let Some(label) = rule.label.as_ref().filter(|l| !l.trim().is_empty()) {
                self.render.category_labels.insert(id.clone(), label.clone());
            }
            self.categories.insert(id, rule);
        }
        Ok(self)
    }

    pub fn timezone(&self) -> Tz {
        self.settings.timezone.parse().unwrap_or(chrono_tz::Europe::Bucharest)
    }

    pub fn region_cap(&self, region: &str) -> Option<usize> {
        self.settings.region_top.get(region).copied()
    }
}

/// Parse the run selection (comma separated ids). Falls back to `defaults`
/// when the input is absent or yields no ids. Duplicates are dropped.
pub fn parse_selection(raw: Option<&str>, defaults: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for id in raw.unwrap_or_default().split(',') {
        let id = id.trim().to_lowercase();
        if !id.is_empty() && !out.contains(&id) {
            out.push(id);
        }
    }
    if out.is_empty() {
        return defaults.to_vec();
    }
    out
}
