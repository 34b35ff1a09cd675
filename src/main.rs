//! Daily Brief: binary entrypoint.
//! Loads config, fetches feeds, curates the digest and delivers it once.
//!
//! See `README.md` for configuration and environment variables.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use daily_brief::config::{load_config_default, parse_selection};
use daily_brief::ingest::providers::RssFetcher;
use daily_brief::notify::{Deliver, StdoutNotifier, TelegramNotifier};
use daily_brief::pipeline::run_digest;

const ENV_CATEGORIES: &str = "CATEGORIES";
const ENV_DRY_RUN: &str = "DAILY_BRIEF_DRY_RUN";
const ENV_LOG_JSON: &str = "DAILY_BRIEF_LOG_JSON";
const FEED_TIMEOUT: Duration = Duration::from_secs(20);

fn env_flag(key: &str) -> bool {
    std::env::var(key).ok().is_some_and(|v| v == "1")
}

/// Compact logs by default, JSON lines when `DAILY_BRIEF_LOG_JSON=1`.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("daily_brief=info,warn"));

    let registry = tracing_subscriber::registry().with(filter);
    if env_flag(ENV_LOG_JSON) {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when the file is absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = load_config_default()?;
    let selected = parse_selection(
        std::env::var(ENV_CATEGORIES).ok().as_deref(),
        &cfg.settings.default_categories,
    );
    tracing::info!(
        target: "daily_brief",
        feeds = cfg.feeds.len(),
        regional = cfg.feeds.is_regional(),
        categories = %selected.join(","),
        mode = ?cfg.settings.delivery_mode,
        "starting digest run"
    );

    let fetcher = RssFetcher::http(FEED_TIMEOUT)?;
    let deliverer: Box<dyn Deliver> = if env_flag(ENV_DRY_RUN) {
        Box::new(StdoutNotifier)
    } else {
        Box::new(TelegramNotifier::from_env().context("telegram delivery not configured")?)
    };

    run_digest(&cfg, &selected, &fetcher, deliverer.as_ref(), chrono::Utc::now()).await?;
    Ok(())
}
