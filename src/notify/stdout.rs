// src/notify/stdout.rs
use anyhow::Result;

use super::{Deliver, MarkupMode};

/// Dry-run transport: prints every message instead of sending it.
#[derive(Debug, Clone, Default)]
pub struct StdoutNotifier;

#[async_trait::async_trait]
impl Deliver for StdoutNotifier {
    async fn deliver(&self, text: &str, mode: MarkupMode) -> Result<()> {
        println!("----- message ({mode:?}, {} chars) -----", text.chars().count());
        println!("{text}");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "stdout"
    }
}
