// src/text.rs
//! Text normalization and keyword matching shared by every curation step.
//!
//! Both the haystack and every configured keyword go through the same
//! [`normalize`] pass, so keyword casing and spacing in the config never
//! affect matching.

use once_cell::sync::OnceCell;
use regex::Regex;
use serde::Deserialize;

/// How aggressively [`normalize_with`] filters characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Normalization {
    /// Keep letters (including diacritics), digits, hyphen and space; every
    /// other character becomes a space before whitespace is collapsed.
    #[default]
    Strict,
    /// Only lowercase, strip tags and collapse whitespace.
    Lenient,
}

fn re_tags() -> &'static Regex {
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").expect("tag regex"))
}

/// Normalize with the default (strict) policy.
pub fn normalize(s: &str) -> String {
    normalize_with(s, Normalization::Strict)
}

/// Normalize text: decode entities, strip tags, lowercase, filter, collapse whitespace.
pub fn normalize_with(s: &str, mode: Normalization) -> String {
    if s.is_empty() {
        return String::new();
    }

    // 1) HTML entity decode (strict only; lenient output keeps `&` verbatim)
    let decoded = match mode {
        Normalization::Strict => html_escape::decode_html_entities(s),
        Normalization::Lenient => std::borrow::Cow::Borrowed(s),
    };

    // 2) Strip HTML tags
    let stripped = re_tags().replace_all(&decoded, " ");

    // 3) Lowercase + character filter
    let lowered = stripped.to_lowercase();
    let filtered: String = match mode {
        Normalization::Strict => lowered
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || c == '-' {
                    c
                } else {
                    ' '
                }
            })
            .collect(),
        Normalization::Lenient => lowered,
    };

    // 4) Collapse whitespace and trim
    filtered.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// True iff the normalized `text` contains at least one normalized keyword.
///
/// Keywords are checked in order and the first hit wins. Keywords that
/// normalize to the empty string never match.
pub fn matches_any<S: AsRef<str>>(text: &str, keywords: &[S]) -> bool {
    first_match(text, keywords, Normalization::Strict).is_some()
}

/// Like [`matches_any`], but reports which keyword hit first.
pub fn first_match<'k, S: AsRef<str>>(
    text: &str,
    keywords: &'k [S],
    mode: Normalization,
) -> Option<&'k str> {
    if keywords.is_empty() {
        return None;
    }
    let hay = normalize_with(text, mode);
    keywords
        .iter()
        .map(|k| k.as_ref())
        .find(|k| {
            let kk = normalize_with(k, mode);
            !kk.is_empty() && hay.contains(&kk)
        })
}

/// Split already-normalized text into word tokens.
pub fn tokens(normalized: &str) -> impl Iterator<Item = &str> {
    normalized
        .split(|c: char| !(c.is_alphanumeric() || c == '-'))
        .map(|t| t.trim_matches('-'))
        .filter(|t| !t.is_empty())
}
