// src/notify/telegram.rs
use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{Deliver, MarkupMode};

pub const ENV_BOT_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
pub const ENV_CHAT_ID: &str = "TELEGRAM_CHAT_ID";
const API_BASE: &str = "https://api.telegram.org";

#[derive(Clone)]
pub struct TelegramNotifier {
    token: String,
    chat_id: String,
    api_base: String,
    client: Client,
    timeout: Duration,
    max_attempts: u8,
}

impl std::fmt::Debug for TelegramNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // never print the bot token
        f.debug_struct("TelegramNotifier")
            .field("chat_id", &self.chat_id)
            .field("api_base", &self.api_base)
            .field("timeout", &self.timeout)
            .field("max_attempts", &self.max_attempts)
            .finish()
    }
}

impl TelegramNotifier {
    pub fn new(token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            chat_id: chat_id.into(),
            api_base: API_BASE.to_string(),
            client: Client::new(),
            timeout: Duration::from_secs(30),
            max_attempts: 1,
        }
    }

    /// Build from `TELEGRAM_BOT_TOKEN` / `TELEGRAM_CHAT_ID`.
    pub fn from_env() -> Result<Self> {
        let token = non_empty_env(ENV_BOT_TOKEN)?;
        let chat_id = non_empty_env(ENV_CHAT_ID)?;
        Ok(Self::new(token, chat_id))
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    /// Total attempts per message (at least 1).
    pub fn with_retries(mut self, attempts: u8) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Point at a different Bot API host (local bot server, tests).
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.token)
    }

    fn payload<'a>(&'a self, text: &'a str, mode: MarkupMode) -> SendMessage<'a> {
        SendMessage {
            chat_id: &self.chat_id,
            text,
            parse_mode: mode.parse_mode(),
            disable_web_page_preview: true,
        }
    }

    async fn send_once(&self, payload: &SendMessage<'_>) -> Result<()> {
        let rsp = self
            .client
            .post(self.endpoint())
            .timeout(self.timeout)
            .json(payload)
            .send()
            .await
            .context("telegram sendMessage request")?
            .error_for_status()
            .map_err(|e| anyhow!("telegram sendMessage HTTP error: {}", e.without_url()))?;
        let body: ApiResponse = rsp.json().await.context("telegram response body")?;
        if !body.ok {
            return Err(anyhow!(
                "telegram rejected message: {}",
                body.description.unwrap_or_default()
            ));
        }
        Ok(())
    }
}

/// 500ms, 1s, 2s, ... capped at 32s.
fn backoff(attempt: u8) -> Duration {
    Duration::from_millis(500u64 << attempt.saturating_sub(1).min(6))
}

fn non_empty_env(key: &str) -> Result<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| anyhow!("{key} missing"))
}

#[async_trait::async_trait]
impl Deliver for TelegramNotifier {
    async fn deliver(&self, text: &str, mode: MarkupMode) -> Result<()> {
        let payload = self.payload(text, mode);
        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            match self.send_once(&payload).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.max_attempts => {
                    tracing::warn!(target: "notify", error = ?e, attempt, "telegram send failed, retrying");
                    tokio::time::sleep(backoff(attempt)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn name(&self) -> &'static str {
        "telegram"
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'static str>,
    disable_web_page_preview: bool,
}

#[derive(Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn payload_shape() {
        let n = TelegramNotifier::new("t", "-100123");
        let v = serde_json::to_value(n.payload("<b>hi</b>", MarkupMode::Html)).expect("json");
        assert_eq!(
            v,
            serde_json::json!({
                "chat_id": "-100123",
                "text": "<b>hi</b>",
                "parse_mode": "HTML",
                "disable_web_page_preview": true
            })
        );
        let v = serde_json::to_value(n.payload("hi", MarkupMode::Plain)).expect("json");
        assert!(v.get("parse_mode").is_none());
    }

    #[test]
    fn endpoint_and_debug_output_hide_token() {
        let n = TelegramNotifier::new("SECRET", "1").with_api_base("http://127.0.0.1:9/");
        assert_eq!(n.endpoint(), "http://127.0.0.1:9/botSECRET/sendMessage");
        assert!(!format!("{n:?}").contains("SECRET"));
    }

    #[test]
    #[serial]
    fn from_env_requires_both_vars() {
        std::env::set_var(ENV_BOT_TOKEN, "tok");
        std::env::remove_var(ENV_CHAT_ID);
        assert!(TelegramNotifier::from_env().is_err());
        std::env::set_var(ENV_CHAT_ID, " 42 ");
        let n = TelegramNotifier::from_env().expect("configured");
        assert_eq!(n.chat_id, "42");
        std::env::remove_var(ENV_BOT_TOKEN);
        std::env::remove_var(ENV_CHAT_ID);
    }

    #[test]
    fn backoff_is_bounded_for_any_attempt_count() {
        assert_eq!(backoff(1), Duration::from_millis(500));
        assert_eq!(backoff(2), Duration::from_secs(1));
        assert_eq!(backoff(7), Duration::from_secs(32));
        assert_eq!(backoff(200), Duration::from_secs(32));
        assert_eq!(backoff(u8::MAX), Duration::from_secs(32));
    }

    #[tokio::test]
    async fn unreachable_host_is_an_error() {
        let n = TelegramNotifier::new("t", "1")
            .with_api_base("http://127.0.0.1:9")
            .with_timeout(2);
        assert!(n.deliver("hi", MarkupMode::Plain).await.is_err());
    }
}
