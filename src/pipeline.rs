// src/pipeline.rs
//! One digest run: collection pass, rendering, fitting, delivery.
//!
//! Order per candidate item: exclusion, classification (intersected with the
//! run selection), regional-language gate for the local region, dedupe, then
//! bucketing. Caps are applied once after the pass.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use metrics::{counter, gauge};

use crate::bucket::{BucketKey, Buckets};
use crate::classify::{classify_with, excluded_by, looks_regional};
use crate::config::DigestConfig;
use crate::dedupe::Deduplicator;
use crate::ingest::types::{CandidateItem, FeedFetcher};
use crate::ingest::{fetch_feeds, FetchedFeed};
use crate::notify::{Deliver, MarkupMode};
use crate::render::{date_label, Renderer};
use crate::split::{cap_total, cap_where, shrink, split_messages, DeliveryMode};
use crate::telemetry;

/// Counters for one collection pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub fetched: usize,
    /// Entries with neither title nor link.
    pub empty: usize,
    pub excluded: usize,
    pub unclassified: usize,
    pub off_region: usize,
    pub duplicates: usize,
    pub kept: usize,
    /// Items removed by per-bucket caps.
    pub capped: usize,
}

#[derive(Debug, Clone)]
pub struct Curated {
    pub buckets: Buckets,
    pub stats: RunStats,
}

/// Display order of buckets: regions in feed order, then selected categories.
pub fn bucket_order(selected: &[String], feeds: &[FetchedFeed]) -> Vec<BucketKey> {
    let mut regions: Vec<Option<&str>> = Vec::new();
    for f in feeds {
        let r = f.region.as_deref();
        if !regions.contains(&r) {
            regions.push(r);
        }
    }
    if regions.is_empty() {
        regions.push(None);
    }
    regions
        .into_iter()
        .flat_map(move |r| selected.iter().map(move |c| BucketKey::new(r, c)))
        .collect()
}

/// Single sequential pass over all fetched entries.
pub fn curate(cfg: &DigestConfig, selected: &[String], feeds: &[FetchedFeed]) -> Curated {
    let s = &cfg.settings;
    let mut stats = RunStats::default();
    let mut buckets = Buckets::with_order(bucket_order(selected, feeds));
    let mut dedupe = Deduplicator::new(s.dedupe_scope, s.dedupe_threshold, s.normalization);
    tracing::debug!(target: "pipeline", scope = ?dedupe.scope(), threshold = s.dedupe_threshold, "collection pass starting");

    for feed in feeds {
        let region = feed.region.as_deref();
        let gated = region == Some(s.local_region.as_str());

        for raw in &feed.entries {
            stats.fetched += 1;
            let Some(item) = CandidateItem::from_raw(raw, &feed.source.name) else {
                stats.empty += 1;
                continue;
            };

            if let Some(kw) = excluded_by(
                &item.title,
                &item.summary,
                &item.link,
                &cfg.filters.exclude_any,
                s.normalization,
            ) {
                tracing::debug!(target: "pipeline", title = %item.title, keyword = kw, "excluded");
                stats.excluded += 1;
                continue;
            }

            let matched = classify_with(&item.title, &item.summary, &cfg.categories, s.normalization);
            let targets: Vec<BucketKey> = selected
                .iter()
                .filter(|c| matched.contains(c.as_str()))
                .map(|c| BucketKey::new(region, c))
                .collect();
            if targets.is_empty() {
                stats.unclassified += 1;
                continue;
            }

            if gated && !looks_regional(&item.title) {
                tracing::debug!(target: "pipeline", title = %item.title, region = ?region, "not in regional language");
                stats.off_region += 1;
                continue;
            }

            let accepted = dedupe.admit(&item, &targets);
            if accepted.len() < targets.len() {
                stats.duplicates += 1;
            }
            if accepted.is_empty() {
                continue;
            }
            buckets.push(&accepted, &item);
            stats.kept += 1;
        }
    }

    let before = buckets.total();
    buckets.truncate(s.max_items_per_category);
    stats.capped = before - buckets.total();

    counter!(telemetry::EXCLUDED_TOTAL).increment(stats.excluded as u64);
    counter!(telemetry::DUPLICATES_TOTAL).increment(stats.duplicates as u64);

    Curated { buckets, stats }
}

/// Render the curated buckets and fit them to the message budget.
pub fn build_messages(
    cfg: &DigestConfig,
    selected: &[String],
    curated: Curated,
    now: DateTime<Utc>,
) -> Vec<String> {
    let s = &cfg.settings;
    let renderer = Renderer::new(&cfg.render, s.markup);
    let date = date_label(now, cfg.timezone(), &s.date_format);
    let mut buckets = curated.buckets;

    match s.delivery_mode {
        DeliveryMode::Split => split_messages(&renderer.render(&date, selected, &buckets), s.max_message_len),
        DeliveryMode::Shrink => {
            let regions: Vec<String> = buckets.regions().into_iter().flatten().map(str::to_string).collect();
            for region in regions {
                let Some(cap) = cfg.region_cap(&region) else {
                    continue;
                };
                let n = cap_where(&mut buckets, cap, |k| k.region.as_deref() == Some(region.as_str()));
                if n > 0 {
                    tracing::debug!(target: "pipeline", region = %region, dropped = n, cap, "region cap applied");
                }
            }
            if let Some(max) = s.max_total_items {
                let n = cap_total(&mut buckets, max);
                if n > 0 {
                    tracing::debug!(target: "pipeline", dropped = n, max, "global item cap applied");
                }
            }
            let out = shrink(&mut buckets, |b| renderer.render(&date, selected, b), s.max_message_len);
            if out.dropped > 0 {
                tracing::info!(target: "pipeline", dropped = out.dropped, "digest shrunk to fit one message");
            }
            if out.text.chars().count() > s.max_message_len {
                // Only the fixed header is left and it is still too long.
                return split_messages(&out.text, s.max_message_len);
            }
            vec![out.text]
        }
    }
}

/// Outcome of delivering all parts of a digest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub sent: usize,
    pub failed: usize,
}

impl DeliveryReport {
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Attempt every message in order. A failed part does not stop the rest.
pub async fn deliver_all(deliverer: &dyn Deliver, messages: &[String], mode: MarkupMode) -> DeliveryReport {
    let mut report = DeliveryReport::default();
    for (i, msg) in messages.iter().enumerate() {
        match deliverer.deliver(msg, mode).await {
            Ok(()) => {
                report.sent += 1;
                counter!(telemetry::MESSAGES_SENT_TOTAL).increment(1);
            }
            Err(e) => {
                tracing::warn!(target: "notify", error = ?e, part = i + 1, of = messages.len(), transport = deliverer.name(), "delivery failed");
                report.failed += 1;
                counter!(telemetry::MESSAGES_FAILED_TOTAL).increment(1);
            }
        }
    }
    report
}

/// Full run: fetch, curate, render, deliver.
///
/// Feed failures are absorbed; any failed message makes the run an error.
pub async fn run_digest(
    cfg: &DigestConfig,
    selected: &[String],
    fetcher: &dyn FeedFetcher,
    deliverer: &dyn Deliver,
    now: DateTime<Utc>,
) -> Result<DeliveryReport> {
    telemetry::ensure_metrics_described();

    let groups = cfg.feeds.groups(&cfg.settings.region_order);
    let feeds = fetch_feeds(fetcher, groups, cfg.settings.items_per_feed).await;
    let curated = curate(cfg, selected, &feeds);
    let st = curated.stats;
    tracing::info!(
        target: "pipeline",
        feeds = feeds.len(),
        fetched = st.fetched,
        excluded = st.excluded,
        unclassified = st.unclassified,
        off_region = st.off_region,
        duplicates = st.duplicates,
        kept = st.kept,
        capped = st.capped,
        "collection pass done"
    );

    let messages = build_messages(cfg, selected, curated, now);
    let report = deliver_all(deliverer, &messages, cfg.settings.markup).await;
    gauge!(telemetry::LAST_RUN_TS).set(now.timestamp() as f64);

    if !report.is_success() {
        bail!(
            "{} of {} digest messages failed to deliver",
            report.failed,
            messages.len()
        );
    }
    tracing::info!(target: "pipeline", sent = report.sent, transport = deliverer.name(), "digest delivered");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::CategoryRule;
    use crate::ingest::types::{FeedSource, RawEntry};

    fn cfg() -> DigestConfig {
        let mut c = DigestConfig::default();
        c.categories.insert(
            "politics".into(),
            CategoryRule {
                include_any: vec!["parliament".into(), "guvern".into()],
                label: None,
            },
        );
        c.categories.insert(
            "economy".into(),
            CategoryRule {
                include_any: vec!["budget".into(), "buget".into()],
                label: None,
            },
        );
        c.filters.exclude_any = vec!["murder".into()];
        c
    }

    fn entry(title: &str, link: &str) -> RawEntry {
        RawEntry {
            title: Some(title.into()),
            summary: None,
            link: Some(link.into()),
        }
    }

    fn feed(region: Option<&str>, entries: Vec<RawEntry>) -> FetchedFeed {
        FetchedFeed {
            region: region.map(str::to_string),
            source: FeedSource::new("Src", "mem://src"),
            entries,
        }
    }

    const TOPICS: [&str; 30] = [
        "harbor tariffs", "rural schools", "wildfire relief", "pension reform", "railway strike",
        "vaccine rollout", "border checks", "housing permits", "fishing quotas", "judicial appointments",
        "energy subsidies", "teacher salaries", "highway tolls", "mining licences", "river pollution",
        "airport expansion", "farm drought", "cyber defence", "museum funding", "postal service",
        "coastal erosion", "hospital debts", "student loans", "forest logging", "tourism levy",
        "bank mergers", "police budgets", "water meters", "steel imports", "election monitors",
    ];

    fn headlines(n: usize) -> Vec<RawEntry> {
        TOPICS
            .iter()
            .take(n)
            .enumerate()
            .map(|(i, t)| entry(&format!("Parliament debates {t}"), &format!("https://a.ro/{i}")))
            .collect()
    }

    fn sel() -> Vec<String> {
        vec!["politics".into(), "economy".into()]
    }

    #[test]
    fn order_is_region_major() {
        let feeds = vec![feed(Some("romania"), vec![]), feed(Some("world"), vec![])];
        let order: Vec<String> = bucket_order(&sel(), &feeds).iter().map(|k| k.to_string()).collect();
        assert_eq!(
            order,
            vec!["romania/politics", "romania/economy", "world/politics", "world/economy"]
        );
    }

    #[test]
    fn exclusion_beats_classification() {
        let feeds = vec![feed(None, vec![entry("Parliament debates murder trial", "https://a.ro/1")])];
        let out = curate(&cfg(), &sel(), &feeds);
        assert_eq!(out.stats.excluded, 1);
        assert!(out.buckets.is_empty());
    }

    #[test]
    fn multi_label_item_lands_once_per_bucket() {
        let feeds = vec![feed(
            None,
            vec![
                entry("Parliament passes budget", "https://a.ro/1"),
                entry("Parliament passes budget", "https://a.ro/1"),
            ],
        )];
        let out = curate(&cfg(), &sel(), &feeds);
        assert_eq!(out.buckets.len_of(&BucketKey::new(None, "politics")), 1);
        assert_eq!(out.buckets.len_of(&BucketKey::new(None, "economy")), 1);
        assert_eq!(out.stats.duplicates, 1);
    }

    #[test]
    fn unselected_category_is_not_bucketed() {
        let feeds = vec![feed(None, vec![entry("Budget deficit widens", "https://a.ro/2")])];
        let out = curate(&cfg(), &["politics".to_string()], &feeds);
        assert!(out.buckets.is_empty());
        assert_eq!(out.stats.unclassified, 1);
    }

    #[test]
    fn local_region_requires_regional_language() {
        let feeds = vec![
            feed(
                Some("romania"),
                vec![
                    entry("Guvernul adoptă bugetul pe 2027", "https://ro.ro/1"),
                    entry("Government adopts the budget", "https://ro.ro/2"),
                ],
            ),
            feed(Some("world"), vec![entry("Government adopts the budget", "https://w.org/3")]),
        ];
        let out = curate(&cfg(), &sel(), &feeds);
        assert_eq!(out.stats.off_region, 1);
        assert_eq!(out.buckets.len_of(&BucketKey::new(Some("romania"), "economy")), 1);
        assert_eq!(out.buckets.len_of(&BucketKey::new(Some("world"), "economy")), 1);
    }

    #[test]
    fn caps_apply_after_the_pass() {
        let mut c = cfg();
        c.settings.max_items_per_category = 2;
        let out = curate(&c, &sel(), &[feed(None, headlines(5))]);
        assert_eq!(out.buckets.len_of(&BucketKey::new(None, "politics")), 2);
        assert_eq!(out.stats.capped, 3);
    }

    #[test]
    fn shrink_mode_produces_one_message_within_budget() {
        let mut c = cfg();
        c.settings.delivery_mode = DeliveryMode::Shrink;
        c.settings.max_message_len = 400;
        let curated = curate(&c, &sel(), &[feed(None, headlines(30))]);
        let msgs = build_messages(&c, &sel(), curated, Utc::now());
        assert_eq!(msgs.len(), 1);
        assert!(msgs[0].chars().count() <= 400);
        assert!(msgs[0].contains("Parliament debates harbor tariffs"));
        assert!(!msgs[0].contains("election monitors"));
    }

    #[test]
    fn shrink_mode_region_cap_is_region_wide() {
        let mut c = cfg();
        c.settings.delivery_mode = DeliveryMode::Shrink;
        c.settings.region_top.insert("world".into(), 1);
        let feeds = vec![feed(
            Some("world"),
            vec![
                entry("Parliament debates harbor tariffs", "https://w.org/1"),
                entry("Budget deficit widens sharply", "https://w.org/2"),
            ],
        )];
        let curated = curate(&c, &sel(), &feeds);
        assert_eq!(curated.buckets.total(), 2);
        let msgs = build_messages(&c, &sel(), curated, Utc::now());
        assert_eq!(msgs.len(), 1);
        let rendered = msgs[0].matches("  - ").count();
        assert_eq!(rendered, 1);
        assert!(msgs[0].contains("harbor tariffs"));
    }

    #[test]
    fn split_mode_keeps_everything() {
        let mut c = cfg();
        c.settings.max_message_len = 300;
        c.settings.max_items_per_category = 50;
        let curated = curate(&c, &sel(), &[feed(None, headlines(20))]);
        let kept = curated.stats.kept;
        assert_eq!(kept, 20);
        let msgs = build_messages(&c, &sel(), curated, Utc::now());
        assert!(msgs.len() > 1);
        assert!(msgs.iter().all(|m| m.chars().count() <= 300));
        assert_eq!(msgs.concat().matches("Parliament debates").count(), kept);
    }
}
