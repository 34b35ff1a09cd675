// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod bucket;
pub mod classify;
pub mod config;
pub mod dedupe;
pub mod ingest;
pub mod notify;
pub mod pipeline;
pub mod render;
pub mod split;
pub mod telemetry;
pub mod text;

// ---- Re-exports for stable public API ----
pub use crate::bucket::{BucketKey, Buckets};
pub use crate::config::{load_config_default, load_config_from, parse_selection, DigestConfig};
pub use crate::ingest::types::{CandidateItem, FeedFetcher, FeedSource, RawEntry};
pub use crate::notify::{Deliver, MarkupMode};
pub use crate::pipeline::{run_digest, DeliveryReport};
