// src/telemetry.rs
//! Metric names used by the digest run.
//!
//! No exporter is installed here; with no recorder the macros are no-ops.
//! A host process that installs one gets described series.

use metrics::{describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;

pub const ENTRIES_TOTAL: &str = "digest_entries_total";
pub const EXCLUDED_TOTAL: &str = "digest_excluded_total";
pub const DUPLICATES_TOTAL: &str = "digest_duplicates_total";
pub const FEED_ERRORS_TOTAL: &str = "digest_feed_errors_total";
pub const MESSAGES_SENT_TOTAL: &str = "digest_messages_sent_total";
pub const MESSAGES_FAILED_TOTAL: &str = "digest_messages_failed_total";
pub const FEED_PARSE_MS: &str = "digest_feed_parse_ms";
pub const LAST_RUN_TS: &str = "digest_last_run_ts";

/// One-time registration so series carry descriptions.
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(ENTRIES_TOTAL, "Raw entries returned by feed fetchers.");
        describe_counter!(
            EXCLUDED_TOTAL,
            "Candidate items dropped by an exclusion keyword."
        );
        describe_counter!(
            DUPLICATES_TOTAL,
            "Candidate items dropped as exact or near duplicates."
        );
        describe_counter!(FEED_ERRORS_TOTAL, "Feed fetch/parse errors.");
        describe_counter!(MESSAGES_SENT_TOTAL, "Digest messages delivered.");
        describe_counter!(MESSAGES_FAILED_TOTAL, "Digest messages the transport rejected.");
        describe_histogram!(FEED_PARSE_MS, "Feed parse time in milliseconds.");
        describe_gauge!(LAST_RUN_TS, "Unix ts when the digest last ran.");
    });
}
