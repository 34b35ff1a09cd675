// src/classify.rs
//! Keyword classification, exclusion and the regional-language gate.

use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::text::{first_match, normalize, normalize_with, Normalization};

/// Inclusion rule for one category.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct CategoryRule {
    #[serde(default)]
    pub include_any: Vec<String>,
    /// Display label; falls back to the category id.
    #[serde(default)]
    pub label: Option<String>,
}

/// Categories whose keywords hit `title + " " + summary`. The link is not part
/// of the haystack.
pub fn classify(
    title: &str,
    summary: &str,
    rules: &BTreeMap<String, CategoryRule>,
) -> BTreeSet<String> {
    classify_with(title, summary, rules, Normalization::Strict)
}

pub fn classify_with(
    title: &str,
    summary: &str,
    rules: &BTreeMap<String, CategoryRule>,
    mode: Normalization,
) -> BTreeSet<String> {
    let hay = format!("{title} {summary}");
    rules
        .iter()
        .filter(|(_, rule)| first_match(&hay, &rule.include_any, mode).is_some())
        .map(|(cat, _)| cat.clone())
        .collect()
}

/// True if any exclusion keyword hits `title + summary + link`.
///
/// The link is included so keywords can target URL sections such as `/crime/`.
/// A keyword containing `/` is a path pattern: it is matched against the raw
/// lowercased link only, so `/crime/` never fires on "Crimea" in a title.
pub fn is_excluded(title: &str, summary: &str, link: &str, exclude_any: &[String]) -> bool {
    excluded_by(title, summary, link, exclude_any, Normalization::Strict).is_some()
}

/// Like [`is_excluded`], but reports the keyword that fired.
pub fn excluded_by<'k>(
    title: &str,
    summary: &str,
    link: &str,
    exclude_any: &'k [String],
    mode: Normalization,
) -> Option<&'k str> {
    let hay = normalize_with(&format!("{title} {summary} {link}"), mode);
    let raw_link = link.trim().to_lowercase();
    exclude_any.iter().map(String::as_str).find(|kw| {
        if kw.contains('/') {
            let pattern = kw.trim().to_lowercase();
            !pattern.is_empty() && raw_link.contains(&pattern)
        } else {
            let k = normalize_with(kw, mode);
            !k.is_empty() && hay.contains(&k)
        }
    })
}

/// Diacritics specific to Romanian (comma-below and cedilla forms).
const REGIONAL_DIACRITICS: [char; 7] = ['ă', 'â', 'î', 'ș', 'ş', 'ț', 'ţ'];

/// Common Romanian function words, matched as whole tokens.
/// English-shared words such as "in" are left out.
const REGIONAL_WORDS: [&str; 23] = [
    "și", "si", "în", "la", "de", "cu", "pe", "din", "pentru", "care", "nu", "mai",
    "este", "sunt", "după", "dupa", "despre", "fost", "prin", "spre", "ale", "lui", "unui",
];

/// Heuristic: does this title look like it is written in the regional language?
pub fn looks_regional(title: &str) -> bool {
    let lowered = title.to_lowercase();
    if lowered.chars().any(|c| REGIONAL_DIACRITICS.contains(&c)) {
        return true;
    }
    let padded = format!(" {} ", normalize(&lowered));
    REGIONAL_WORDS
        .iter()
        .any(|w| padded.contains(&format!(" {w} ")))
}
