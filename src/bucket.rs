// src/bucket.rs
//! Insertion-ordered, capped buckets keyed by (region, category).

use std::collections::HashMap;
use std::fmt;

use crate::ingest::types::CandidateItem;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BucketKey {
    pub region: Option<String>,
    pub category: String,
}

impl BucketKey {
    pub fn new(region: Option<&str>, category: &str) -> Self {
        Self {
            region: region.map(str::to_string),
            category: category.to_string(),
        }
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.region {
            Some(r) => write!(f, "{r}/{}", self.category),
            None => f.write_str(&self.category),
        }
    }
}

/// Accumulator for the single collection pass.
///
/// Items are appended in encounter order. Caps are applied once after the
/// pass with [`Buckets::truncate`]; nothing is rebalanced across buckets.
#[derive(Debug, Clone, Default)]
pub struct Buckets {
    order: Vec<BucketKey>,
    items: HashMap<BucketKey, Vec<CandidateItem>>,
}

impl Buckets {
    /// Create empty buckets in the given display order.
    pub fn with_order(order: Vec<BucketKey>) -> Self {
        let items = order.iter().map(|k| (k.clone(), Vec::new())).collect();
        Self { order, items }
    }

    /// Display order of all known buckets (including empty ones).
    pub fn order(&self) -> &[BucketKey] {
        &self.order
    }

    /// Append `item` to every bucket in `keys`. Unknown keys are registered at the end.
    pub fn push(&mut self, keys: &[BucketKey], item: &CandidateItem) {
        for key in keys {
            if !self.items.contains_key(key) {
                self.order.push(key.clone());
            }
            self.items.entry(key.clone()).or_default().push(item.clone());
        }
    }

    pub fn get(&self, key: &BucketKey) -> &[CandidateItem] {
        self.items.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn len_of(&self, key: &BucketKey) -> usize {
        self.get(key).len()
    }

    pub fn total(&self) -> usize {
        self.items.values().map(Vec::len).sum()
    }

    /// Items across the buckets whose key matches `pred`.
    pub fn total_where(&self, pred: impl Fn(&BucketKey) -> bool) -> usize {
        self.items
            .iter()
            .filter(|(k, _)| pred(*k))
            .map(|(_, v)| v.len())
            .sum()
    }

    /// Distinct regions in display order.
    pub fn regions(&self) -> Vec<Option<&str>> {
        let mut out: Vec<Option<&str>> = Vec::new();
        for k in &self.order {
            let r = k.region.as_deref();
            if !out.contains(&r) {
                out.push(r);
            }
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Iterate buckets in display order.
    pub fn iter(&self) -> impl Iterator<Item = (&BucketKey, &[CandidateItem])> {
        self.order.iter().map(move |k| (k, self.get(k)))
    }

    /// Keep the first `max` items of every bucket.
    pub fn truncate(&mut self, max: usize) {
        for v in self.items.values_mut() {
            v.truncate(max);
        }
    }

    /// Remove the last (latest-discovered) item of `key`. Returns it if any.
    pub fn pop(&mut self, key: &BucketKey) -> Option<CandidateItem> {
        self.items.get_mut(key).and_then(Vec::pop)
    }

    /// The bucket that loses an item when the digest must shrink: the largest
    /// one, with ties going to the last bucket in display order.
    pub fn lowest_priority(&self) -> Option<&BucketKey> {
        self.lowest_priority_where(|_| true)
    }

    /// [`Buckets::lowest_priority`] among the buckets whose key matches `pred`.
    pub fn lowest_priority_where(&self, pred: impl Fn(&BucketKey) -> bool) -> Option<&BucketKey> {
        let mut best: Option<(&BucketKey, usize)> = None;
        for k in self.order.iter().filter(|k| pred(*k)) {
            let n = self.len_of(k);
            if n == 0 {
                continue;
            }
            match best {
                Some((_, m)) if m > n => {}
                _ => best = Some((k, n)),
            }
        }
        best.map(|(k, _)| k)
    }
}
