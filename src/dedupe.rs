// src/dedupe.rs
//! Duplicate detection for candidate items.
//!
//! Two checks run in order for every item:
//! - exact: canonical link or normalized title already accepted in the scope
//! - fuzzy: token-set similarity of the normalized titles reaches the threshold
//!
//! Processing is sequential: the first occurrence wins and later duplicates are
//! dropped, never merged. The scope is either the whole run or a single bucket.

use serde::Deserialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use strsim::sorensen_dice;
use url::Url;

use crate::bucket::BucketKey;
use crate::ingest::types::CandidateItem;
use crate::text::{normalize_with, tokens, Normalization};

pub const DEFAULT_DEDUPE_THRESHOLD: u8 = 85;

/// Span over which "already seen" state is tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DedupeScope {
    /// One seen-set for the whole run: an item is admitted to all its buckets or none.
    #[default]
    Run,
    /// One seen-set per (region, category) bucket.
    Bucket,
}

/// Why an item was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Duplicate {
    Link,
    Title,
    Similar { score: u8 },
}

/// Drop the fragment and keep scheme, host, path and query.
pub fn canonicalize_link(link: &str) -> String {
    let link = link.trim();
    if link.is_empty() {
        return String::new();
    }
    match Url::parse(link) {
        Ok(mut u) => {
            u.set_fragment(None);
            u.to_string()
        }
        Err(_) => link
            .split_once('#')
            .map(|(head, _)| head)
            .unwrap_or(link)
            .trim()
            .to_string(),
    }
}

/// Fold common English inflections so "resigns" and "resignation" share a token.
fn fold_token(t: &str) -> String {
    const SUFFIXES: [(&str, &str); 9] = [
        ("ations", ""),
        ("ation", ""),
        ("ments", ""),
        ("ment", ""),
        ("ings", ""),
        ("ing", ""),
        ("ies", "y"),
        ("ed", ""),
        ("s", ""),
    ];
    let n = t.chars().count();
    for (suf, rep) in SUFFIXES {
        if t.ends_with(suf) && n >= suf.chars().count() + 3 {
            if suf == "s" && t.ends_with("ss") {
                break;
            }
            return format!("{}{}", &t[..t.len() - suf.len()], rep);
        }
    }
    t.to_string()
}

/// Distinct folded word tokens of a title.
pub fn token_set(title: &str, mode: Normalization) -> BTreeSet<String> {
    let norm = normalize_with(title, mode);
    tokens(&norm).map(fold_token).collect()
}

fn join_sorted<'a>(parts: impl IntoIterator<Item = &'a String>) -> String {
    parts
        .into_iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Token-set similarity on a 0..=100 scale.
///
/// Compares the sorted intersection of both token sets against the intersection
/// extended by each side's remainder and takes the best Sørensen-Dice score.
/// Word order and repetition do not matter; empty sets score 0.
pub fn set_similarity(a: &BTreeSet<String>, b: &BTreeSet<String>) -> u8 {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let sect = join_sorted(a.intersection(b));
    let diff_ab = join_sorted(a.difference(b));
    let diff_ba = join_sorted(b.difference(a));

    let t1 = format!("{sect} {diff_ab}").trim().to_string();
    let t2 = format!("{sect} {diff_ba}").trim().to_string();

    let best = if sect.is_empty() {
        sorensen_dice(&t1, &t2)
    } else {
        sorensen_dice(&sect, &t1)
            .max(sorensen_dice(&sect, &t2))
            .max(sorensen_dice(&t1, &t2))
    };
    (best * 100.0).round().clamp(0.0, 100.0) as u8
}

/// Convenience wrapper over [`set_similarity`] for two raw titles.
pub fn token_set_similarity(a: &str, b: &str) -> u8 {
    set_similarity(
        &token_set(a, Normalization::Strict),
        &token_set(b, Normalization::Strict),
    )
}

#[derive(Debug, Default)]
struct SeenSet {
    links: HashSet<String>,
    titles: HashSet<String>,
    accepted: Vec<BTreeSet<String>>,
}

struct ItemKeys {
    link: String,
    title: String,
    tokens: BTreeSet<String>,
}

impl SeenSet {
    fn check(&self, keys: &ItemKeys, threshold: u8) -> Option<Duplicate> {
        if !keys.link.is_empty() && self.links.contains(&keys.link) {
            return Some(Duplicate::Link);
        }
        if !keys.title.is_empty() && self.titles.contains(&keys.title) {
            return Some(Duplicate::Title);
        }
        if threshold == 0 || keys.tokens.is_empty() {
            return None;
        }
        self.accepted
            .iter()
            .map(|prev| set_similarity(&keys.tokens, prev))
            .find(|&score| score >= threshold)
            .map(|score| Duplicate::Similar { score })
    }

    fn record(&mut self, keys: &ItemKeys) {
        if !keys.link.is_empty() {
            self.links.insert(keys.link.clone());
        }
        if !keys.title.is_empty() {
            self.titles.insert(keys.title.clone());
        }
        if !keys.tokens.is_empty() {
            self.accepted.push(keys.tokens.clone());
        }
    }
}

/// Run-local duplicate tracker. Create one per run; it is discarded afterwards.
#[derive(Debug)]
pub struct Deduplicator {
    scope: DedupeScope,
    threshold: u8,
    mode: Normalization,
    seen: HashMap<Option<BucketKey>, SeenSet>,
}

impl Deduplicator {
    /// `threshold` is clamped to 100; `0` disables the fuzzy check.
    pub fn new(scope: DedupeScope, threshold: u8, mode: Normalization) -> Self {
        Self {
            scope,
            threshold: threshold.min(100),
            mode,
            seen: HashMap::new(),
        }
    }

    pub fn scope(&self) -> DedupeScope {
        self.scope
    }

    fn keys(&self, item: &CandidateItem) -> ItemKeys {
        ItemKeys {
            link: canonicalize_link(&item.link),
            title: normalize_with(&item.title, self.mode),
            tokens: token_set(&item.title, self.mode),
        }
    }

    /// Offer an item for a set of target buckets.
    ///
    /// Returns the buckets that accept it (in input order) and records it in
    /// each accepting scope. With [`DedupeScope::Run`] the result is either all
    /// targets or none.
    pub fn admit(&mut self, item: &CandidateItem, targets: &[BucketKey]) -> Vec<BucketKey> {
        if targets.is_empty() {
            return Vec::new();
        }
        let keys = self.keys(item);
        let threshold = self.threshold;

        match self.scope {
            DedupeScope::Run => {
                let seen = self.seen.entry(None).or_default();
                if let Some(dup) = seen.check(&keys, threshold) {
                    tracing::debug!(target: "dedupe", title = %item.title, reason = ?dup, "duplicate dropped");
                    return Vec::new();
                }
                seen.record(&keys);
                targets.to_vec()
            }
            DedupeScope::Bucket => {
                let mut accepted = Vec::with_capacity(targets.len());
                for key in targets {
                    let seen = self.seen.entry(Some(key.clone())).or_default();
                    if let Some(dup) = seen.check(&keys, threshold) {
                        tracing::debug!(target: "dedupe", title = %item.title, bucket = %key, reason = ?dup, "duplicate dropped");
                        continue;
                    }
                    seen.record(&keys);
                    accepted.push(key.clone());
                }
                accepted
            }
        }
    }

    /// Check a single item against the run-wide scope, recording it when unique.
    pub fn offer(&mut self, item: &CandidateItem) -> Option<Duplicate> {
        let keys = self.keys(item);
        let seen = self.seen.entry(None).or_default();
        let dup = seen.check(&keys, self.threshold);
        if dup.is_none() {
            seen.record(&keys);
        }
        dup
    }
}

/// Deduplicate an ordered sequence in a single scope, keeping first occurrences.
pub fn dedupe(items: Vec<CandidateItem>, threshold: u8, mode: Normalization) -> Vec<CandidateItem> {
    let mut d = Deduplicator::new(DedupeScope::Run, threshold, mode);
    items
        .into_iter()
        .filter(|it| d.offer(it).is_none())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(title: &str, link: &str) -> CandidateItem {
        CandidateItem {
            title: title.into(),
            link: link.into(),
            source: "Test".into(),
            summary: String::new(),
        }
    }

    #[test]
    fn canonical_link_drops_fragment_keeps_query() {
        assert_eq!(
            canonicalize_link(" https://Example.ro/a/b?id=7#comments "),
            "https://example.ro/a/b?id=7"
        );
        assert_eq!(canonicalize_link("not a url#frag"), "not a url");
        assert_eq!(canonicalize_link(""), "");
    }

    #[test]
    fn similarity_ignores_order_and_repetition() {
        assert_eq!(token_set_similarity("X says Y", "Y: X says"), 100);
        assert_eq!(token_set_similarity("Tax tax TAX cut", "cut tax"), 100);
    }

    #[test]
    fn similarity_scenario_pm_resignation() {
        let s = token_set_similarity("PM resigns amid scandal", "Scandal forces PM resignation");
        assert!(s >= 85, "score {s}");
    }

    #[test]
    fn unrelated_titles_score_low() {
        let s = token_set_similarity("Parliament passes budget", "Floods hit northern towns");
        assert!(s < 50, "score {s}");
        assert_eq!(token_set_similarity("", "anything"), 0);
    }

    #[test]
    fn fold_keeps_short_and_double_s_words() {
        assert_eq!(fold_token("resigns"), "resign");
        assert_eq!(fold_token("resignation"), "resign");
        assert_eq!(fold_token("press"), "press");
        assert_eq!(fold_token("is"), "is");
    }

    #[test]
    fn exact_link_and_title_duplicates() {
        let items = vec![
            item("Budget approved", "https://a.ro/1#x"),
            item("Something else entirely", "https://a.ro/1"),
            item("BUDGET approved!", "https://b.ro/2"),
            item("Floods in the north", ""),
        ];
        let out = dedupe(items, 0, Normalization::Strict);
        let titles: Vec<_> = out.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["Budget approved", "Floods in the north"]);
    }

    #[test]
    fn fuzzy_drops_later_near_duplicate() {
        let items = vec![
            item("PM resigns amid scandal", "https://a.ro/1"),
            item("Scandal forces PM resignation", "https://b.ro/2"),
        ];
        let out = dedupe(items, 85, Normalization::Strict);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].title, "PM resigns amid scandal");
    }

    #[test]
    fn dedupe_is_a_fixed_point() {
        let items = vec![
            item("PM resigns amid scandal", "https://a.ro/1"),
            item("Scandal forces PM resignation", "https://b.ro/2"),
            item("Inflation slows in March", "https://c.ro/3"),
            item("", "https://c.ro/3#again"),
            item("Storm warning for the coast", ""),
            item("", "https://d.ro/4"),
        ];
        let once = dedupe(items, 85, Normalization::Strict);
        let twice = dedupe(once.clone(), 85, Normalization::Strict);
        assert_eq!(once, twice);
    }

    #[test]
    fn bucket_scope_tracks_each_bucket() {
        let politics = BucketKey::new(None, "politics");
        let economy = BucketKey::new(None, "economy");
        let mut d = Deduplicator::new(DedupeScope::Bucket, 85, Normalization::Strict);

        let a = item("Budget vote in parliament", "https://a.ro/1");
        assert_eq!(d.admit(&a, &[politics.clone()]), vec![politics.clone()]);

        // Same story reaches economy for the first time, politics already has it.
        let b = item("Parliament budget vote", "https://b.ro/2");
        assert_eq!(
            d.admit(&b, &[politics.clone(), economy.clone()]),
            vec![economy.clone()]
        );
    }

    #[test]
    fn run_scope_is_all_or_nothing() {
        let politics = BucketKey::new(None, "politics");
        let economy = BucketKey::new(None, "economy");
        let mut d = Deduplicator::new(DedupeScope::Run, 85, Normalization::Strict);

        let a = item("Budget vote in parliament", "https://a.ro/1");
        let targets = vec![politics.clone(), economy.clone()];
        assert_eq!(d.admit(&a, &targets), targets);
        let b = item("Parliament budget vote", "https://b.ro/2");
        assert!(d.admit(&b, &[economy]).is_empty());
    }
}
