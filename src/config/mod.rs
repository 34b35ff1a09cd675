// src/config/mod.rs
//! Loading of the digest configuration (TOML or JSON).

pub mod digest;

pub use digest::{parse_selection, DigestConfig, Feeds, Filters, Settings};

use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_CONFIG_PATH: &str = "DAILY_BRIEF_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/daily_brief.toml";
const FALLBACK_JSON_PATH: &str = "config/daily_brief.json";

/// Load and validate configuration from an explicit path.
pub fn load_config_from(path: &Path) -> Result<DigestConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading digest config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_config(&content, ext.as_str())
        .with_context(|| format!("parsing digest config {}", path.display()))
}

/// Load configuration using env var + fallbacks:
/// 1) $DAILY_BRIEF_CONFIG
/// 2) config/daily_brief.toml
/// 3) config/daily_brief.json
pub fn load_config_default() -> Result<DigestConfig> {
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_config_from(&pb);
        }
        return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path {}", pb.display()));
    }
    for candidate in [DEFAULT_CONFIG_PATH, FALLBACK_JSON_PATH] {
        let p = PathBuf::from(candidate);
        if p.exists() {
            return load_config_from(&p);
        }
    }
    Err(anyhow!(
        "no digest config found (set {ENV_CONFIG_PATH} or create {DEFAULT_CONFIG_PATH})"
    ))
}

/// Parse config text. JSON when hinted by extension, TOML otherwise.
pub fn parse_config(s: &str, hint_ext: &str) -> Result<DigestConfig> {
    let cfg: DigestConfig = if hint_ext == "json" {
        serde_json::from_str(s).context("invalid JSON config")?
    } else {
        toml::from_str(s).context("invalid TOML config")?
    };
    cfg.validate()
}
