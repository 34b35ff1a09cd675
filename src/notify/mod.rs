// src/notify/mod.rs
pub mod stdout;
pub mod telegram;

use anyhow::Result;

pub use crate::render::MarkupMode;
pub use stdout::StdoutNotifier;
pub use telegram::TelegramNotifier;

/// Delivery collaborator: one call per rendered message.
///
/// A failure is fatal for that message only; the caller decides what to do
/// with the remaining parts.
#[async_trait::async_trait]
pub trait Deliver: Send + Sync {
    async fn deliver(&self, text: &str, mode: MarkupMode) -> Result<()>;
    fn name(&self) -> &'static str;
}
