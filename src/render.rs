// src/render.rs
//! Digest rendering: header, region headings, category sections and item lines.
//!
//! Sections without items are omitted. When every section is empty a single
//! "nothing matched" line is rendered instead of an empty body.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::bucket::Buckets;
use crate::ingest::types::CandidateItem;

/// Markup flavour of the delivered text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkupMode {
    Plain,
    /// Telegram's HTML subset (`<b>`, `<i>`, `<a href>`).
    #[default]
    Html,
}

impl MarkupMode {
    /// Value of Telegram's `parse_mode` field, if any.
    pub fn parse_mode(self) -> Option<&'static str> {
        match self {
            MarkupMode::Plain => None,
            MarkupMode::Html => Some("HTML"),
        }
    }
}

/// Labels and fixed strings used by the renderer.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RenderConfig {
    pub title: String,
    pub categories_label: String,
    /// Printed before every category label.
    pub category_prefix: String,
    pub read_label: String,
    pub no_title: String,
    pub nothing_matched: String,
    pub category_labels: BTreeMap<String, String>,
    pub region_labels: BTreeMap<String, String>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        let category_labels = [
            ("politics", "🏛️ Politică"),
            ("economy", "📈 Economie"),
            ("science_health", "🧬 Știință & Sănătate"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let region_labels = [("romania", "🇷🇴 România"), ("world", "🌍 Internațional")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self {
            title: "🗞️ Daily Brief".to_string(),
            categories_label: "Categorii".to_string(),
            category_prefix: "• ".to_string(),
            read_label: "Citește".to_string(),
            no_title: "(fără titlu)".to_string(),
            nothing_matched: "Nu am găsit articole potrivite (după filtrare).".to_string(),
            category_labels,
            region_labels,
        }
    }
}

impl RenderConfig {
    pub fn category_label<'a>(&'a self, id: &'a str) -> &'a str {
        self.category_labels.get(id).map(String::as_str).unwrap_or(id)
    }

    pub fn region_label<'a>(&'a self, id: &'a str) -> &'a str {
        self.region_labels.get(id).map(String::as_str).unwrap_or(id)
    }
}

/// Localized date stamp for the header, e.g. `18 Oct 2026`.
pub fn date_label(now: DateTime<Utc>, tz: Tz, format: &str) -> String {
    now.with_timezone(&tz).format(format).to_string()
}

pub struct Renderer<'a> {
    cfg: &'a RenderConfig,
    mode: MarkupMode,
}

impl<'a> Renderer<'a> {
    pub fn new(cfg: &'a RenderConfig, mode: MarkupMode) -> Self {
        Self { cfg, mode }
    }

    fn esc(&self, s: &str) -> String {
        match self.mode {
            MarkupMode::Html => html_escape::encode_text(s).into_owned(),
            MarkupMode::Plain => s.to_string(),
        }
    }

    fn bold(&self, s: &str) -> String {
        match self.mode {
            MarkupMode::Html => format!("<b>{}</b>", self.esc(s)),
            MarkupMode::Plain => s.to_string(),
        }
    }

    fn italic(&self, s: &str) -> String {
        match self.mode {
            MarkupMode::Html => format!("<i>{}</i>", self.esc(s)),
            MarkupMode::Plain => s.to_string(),
        }
    }

    /// One line per item: title (or placeholder), optional link, source name.
    pub fn item_line(&self, item: &CandidateItem) -> String {
        let title = if item.title.trim().is_empty() {
            self.esc(&self.cfg.no_title)
        } else {
            self.esc(&item.title)
        };
        let source = self.italic(&format!("({})", item.source));

        if item.link.is_empty() {
            return format!("  - {title} {source}");
        }
        match self.mode {
            MarkupMode::Html => {
                let href = html_escape::encode_double_quoted_attribute(&item.link);
                format!(
                    "  - {title} — <a href=\"{href}\">{}</a> {source}",
                    self.esc(&self.cfg.read_label)
                )
            }
            MarkupMode::Plain => format!("  - {title} — {} {source}", item.link),
        }
    }

    /// Header: title with date stamp and the list of selected categories.
    pub fn header(&self, date_label: &str, selected: &[String]) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.bold(&format!("{} — {date_label}", self.cfg.title)));
        if !selected.is_empty() {
            let _ = writeln!(
                out,
                "{}",
                self.italic(&format!("{}: {}", self.cfg.categories_label, selected.join(", ")))
            );
        }
        out.push('\n');
        out
    }

    /// Render the full digest body.
    pub fn render(&self, date_label: &str, selected: &[String], buckets: &Buckets) -> String {
        let mut msg = self.header(date_label, selected);
        let mut any_content = false;
        let mut current_region: Option<&str> = None;

        for (key, items) in buckets.iter() {
            if items.is_empty() {
                continue;
            }
            any_content = true;

            if let Some(region) = key.region.as_deref() {
                if current_region != Some(region) {
                    let _ = writeln!(msg, "{}", self.bold(self.cfg.region_label(region)));
                    current_region = Some(region);
                }
            }

            let _ = writeln!(
                msg,
                "{}{}",
                self.esc(&self.cfg.category_prefix),
                self.bold(self.cfg.category_label(&key.category))
            );
            let lines: Vec<String> = items.iter().map(|it| self.item_line(it)).collect();
            msg.push_str(&lines.join("\n"));
            msg.push_str("\n\n");
        }

        if !any_content {
            msg.push_str(&self.esc(&self.cfg.nothing_matched));
        }
        msg
    }
}
