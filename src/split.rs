// src/split.rs
//! Keep every delivered message within the transport's length budget.
//!
//! Two policies:
//! - [`split_messages`]: cut the blob on line boundaries into several parts
//! - [`shrink`]: drop lowest-priority items and re-render until one message fits
//!
//! Lengths are counted in `char`s.

use serde::Deserialize;

use crate::bucket::{BucketKey, Buckets};

/// Telegram caps messages at 4096; stay well below.
pub const DEFAULT_MAX_MESSAGE_LEN: usize = 3800;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// Several messages, nothing dropped.
    #[default]
    Split,
    /// Exactly one message, trailing items dropped until it fits.
    Shrink,
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Cut a line longer than `max_len` into `max_len`-sized chunks.
fn hard_wrap(line: &str, max_len: usize) -> Vec<String> {
    let chars: Vec<char> = line.chars().collect();
    chars
        .chunks(max_len.max(1))
        .map(|c| c.iter().collect())
        .collect()
}

/// Split `text` on line boundaries so that every part has at most `max_len` chars.
///
/// Lines are accumulated until the next one would overflow. Each part is
/// trimmed of trailing whitespace; whitespace-only parts are dropped. A single
/// line longer than `max_len` is the only thing ever cut mid-line.
pub fn split_messages(text: &str, max_len: usize) -> Vec<String> {
    let max_len = max_len.max(1);
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    let mut flush = |current: &mut String, current_len: &mut usize| {
        if !current.trim().is_empty() {
            parts.push(current.trim_end().to_string());
        }
        current.clear();
        *current_len = 0;
    };

    for line in text.split('\n') {
        let line_len = char_len(line);
        if line_len > max_len {
            flush(&mut current, &mut current_len);
            for chunk in hard_wrap(line, max_len) {
                current_len = char_len(&chunk) + 1;
                current = chunk;
                current.push('\n');
                flush(&mut current, &mut current_len);
            }
            continue;
        }
        if current_len + line_len + 1 > max_len {
            flush(&mut current, &mut current_len);
        }
        current.push_str(line);
        current.push('\n');
        current_len += line_len + 1;
    }
    flush(&mut current, &mut current_len);
    parts
}

/// Outcome of [`shrink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shrunk {
    pub text: String,
    pub dropped: usize,
}

/// Drop items from `buckets` until `rebuild(buckets)` fits in `max_len`.
///
/// Each round removes the latest item of [`Buckets::lowest_priority`]. Stops
/// when the text fits or no items remain (the last rendering is returned even
/// if it is still too long).
pub fn shrink<F>(buckets: &mut Buckets, rebuild: F, max_len: usize) -> Shrunk
where
    F: Fn(&Buckets) -> String,
{
    let mut dropped = 0usize;
    loop {
        let text = rebuild(buckets);
        if char_len(&text) <= max_len {
            return Shrunk { text, dropped };
        }
        let Some(key) = buckets.lowest_priority().cloned() else {
            tracing::warn!(target: "split", len = char_len(&text), max_len, "digest still over budget with no items left");
            return Shrunk { text, dropped };
        };
        if buckets.pop(&key).is_some() {
            dropped += 1;
        }
    }
}

/// Cap total items across all buckets, dropping by the same priority as [`shrink`].
pub fn cap_total(buckets: &mut Buckets, max_total: usize) -> usize {
    cap_where(buckets, max_total, |_| true)
}

/// Cap the combined item count of the buckets matching `pred` (e.g. one region).
pub fn cap_where(buckets: &mut Buckets, max: usize, pred: impl Fn(&BucketKey) -> bool) -> usize {
    let mut dropped = 0usize;
    while buckets.total_where(&pred) > max {
        let Some(key) = buckets.lowest_priority_where(&pred).cloned() else {
            break;
        };
        if buckets.pop(&key).is_none() {
            break;
        }
        dropped += 1;
    }
    dropped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::CandidateItem;

    fn lines_of(parts: &[String]) -> Vec<String> {
        parts
            .iter()
            .flat_map(|p| p.split('\n').map(str::to_string).collect::<Vec<_>>())
            .collect()
    }

    #[test]
    fn five_thousand_chars_make_at_least_two_parts() {
        let line = "x".repeat(99);
        let blob = vec![line; 50].join("\n"); // 50 * 100 - 1 = 4999 chars
        let parts = split_messages(&blob, 3800);
        assert!(parts.len() >= 2);
        assert!(parts.iter().all(|p| p.chars().count() <= 3800));
    }

    #[test]
    fn lines_survive_in_order_exactly_once() {
        let blob: String = (0..300)
            .map(|i| format!("line {i}:{}", "ab".repeat(i % 17)))
            .collect::<Vec<_>>()
            .join("\n");
        for max in [50, 100, 777, 3800] {
            let parts = split_messages(&blob, max);
            assert!(parts.iter().all(|p| p.chars().count() <= max));
            let original: Vec<String> = blob.split('\n').map(str::to_string).collect();
            assert_eq!(lines_of(&parts), original, "max {max}");
        }
    }

    #[test]
    fn short_text_is_one_part_and_blank_parts_vanish() {
        assert_eq!(split_messages("hello\n\n", 3800), vec!["hello".to_string()]);
        assert!(split_messages("   \n \n", 3800).is_empty());
    }

    #[test]
    fn overlong_line_is_hard_wrapped() {
        let blob = format!("head\n{}\ntail", "é".repeat(25));
        let parts = split_messages(&blob, 10);
        assert!(parts.iter().all(|p| p.chars().count() <= 10));
        assert_eq!(parts.concat().matches('é').count(), 25);
        assert_eq!(parts.first().map(String::as_str), Some("head"));
        assert_eq!(parts.last().map(String::as_str), Some("tail"));
    }

    fn item(t: &str) -> CandidateItem {
        CandidateItem {
            title: t.into(),
            link: String::new(),
            source: "S".into(),
            summary: String::new(),
        }
    }

    fn render_titles(b: &Buckets) -> String {
        b.iter()
            .flat_map(|(_, items)| items.iter().map(|i| i.title.clone()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn shrink_drops_from_larger_section_first() {
        let ro = BucketKey::new(Some("romania"), "news");
        let w = BucketKey::new(Some("world"), "news");
        let mut b = Buckets::with_order(vec![ro.clone(), w.clone()]);
        for t in ["r1", "r2", "r3", "r4"] {
            b.push(std::slice::from_ref(&ro), &item(t));
        }
        for t in ["w1", "w2"] {
            b.push(std::slice::from_ref(&w), &item(t));
        }
        // 4 lines of 2 chars + 3 newlines = 11 chars
        let out = shrink(&mut b, render_titles, 11);
        assert_eq!(out.dropped, 2);
        assert_eq!(out.text, "r1\nr2\nw1\nw2");
    }

    #[test]
    fn shrink_tie_goes_to_last_section() {
        let ro = BucketKey::new(Some("romania"), "news");
        let w = BucketKey::new(Some("world"), "news");
        let mut b = Buckets::with_order(vec![ro.clone(), w.clone()]);
        b.push(std::slice::from_ref(&ro), &item("r1"));
        b.push(std::slice::from_ref(&w), &item("w1"));
        let out = shrink(&mut b, render_titles, 2);
        assert_eq!(out.text, "r1");
    }

    #[test]
    fn shrink_gives_up_when_empty() {
        let mut b = Buckets::default();
        let out = shrink(&mut b, |_| "header too long".to_string(), 3);
        assert_eq!(out.dropped, 0);
        assert_eq!(out.text, "header too long");
    }

    #[test]
    fn cap_total_trims_across_buckets() {
        let a = BucketKey::new(None, "a");
        let c = BucketKey::new(None, "c");
        let mut b = Buckets::with_order(vec![a.clone(), c.clone()]);
        for t in ["1", "2", "3"] {
            b.push(std::slice::from_ref(&a), &item(t));
        }
        b.push(std::slice::from_ref(&c), &item("4"));
        assert_eq!(cap_total(&mut b, 2), 2);
        assert_eq!(b.len_of(&a), 1);
        assert_eq!(b.len_of(&c), 1);
    }

    #[test]
    fn region_cap_counts_all_categories_of_the_region() {
        let ro = BucketKey::new(Some("romania"), "politics");
        let wp = BucketKey::new(Some("world"), "politics");
        let we = BucketKey::new(Some("world"), "economy");
        let mut b = Buckets::with_order(vec![ro.clone(), wp.clone(), we.clone()]);
        b.push(std::slice::from_ref(&ro), &item("r1"));
        b.push(std::slice::from_ref(&ro), &item("r2"));
        b.push(std::slice::from_ref(&wp), &item("w1"));
        b.push(std::slice::from_ref(&we), &item("w2"));

        let dropped = cap_where(&mut b, 1, |k| k.region.as_deref() == Some("world"));
        assert_eq!(dropped, 1);
        assert_eq!(b.len_of(&wp) + b.len_of(&we), 1);
        // tie goes to the last bucket in display order
        assert_eq!(b.len_of(&wp), 1);
        assert_eq!(b.len_of(&ro), 2);
    }
}
