//! Notification dispatch — delivers rendered schedules to chat.
//! Supports: Telegram Bot API, and a log-only fallback when no bot is set up.

use std::sync::Arc;

use async_trait::async_trait;
use dutyroll_core::config::TelegramConfig;
use dutyroll_core::{DutyrollError, Notifier, Result};

/// Telegram Bot API notifier — `sendMessage` with Markdown.
pub struct TelegramNotifier {
    bot_token: String,
    chat_id: i64,
    api_base: String,
    client: reqwest::Client,
}

impl TelegramNotifier {
    pub fn new(bot_token: &str, chat_id: i64) -> Self {
        Self {
            bot_token: bot_token.to_string(),
            chat_id,
            api_base: "https://api.telegram.org".to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Point at a different Bot API server (self-hosted or a test double).
    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.bot_token, method)
    }

    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        let resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&serde_json::json!({
                "chat_id": chat_id,
                "text": text,
                "parse_mode": "Markdown"
            }))
            .timeout(std::time::Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| DutyrollError::Dispatch(format!("Telegram send failed: {e}")))?;

        if resp.status().is_success() {
            tracing::info!("✅ Telegram message sent to {}", chat_id);
            Ok(())
        } else {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            Err(DutyrollError::Dispatch(format!("Telegram API error {status}: {body}")))
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn deliver(&self, text: &str) -> Result<()> {
        self.send_message(self.chat_id, text).await
    }

    async fn deliver_to(&self, recipient: i64, text: &str) -> Result<()> {
        self.send_message(recipient, text).await
    }
}

/// Writes messages to the log instead of sending them.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn deliver(&self, text: &str) -> Result<()> {
        tracing::info!("📢 [group] {}", text);
        Ok(())
    }

    async fn deliver_to(&self, recipient: i64, text: &str) -> Result<()> {
        tracing::info!("📢 [{}] {}", recipient, text);
        Ok(())
    }
}

/// Pick the notifier the config asks for.
pub fn notifier_from_config(telegram: &TelegramConfig) -> Arc<dyn Notifier> {
    if telegram.is_usable() {
        Arc::new(TelegramNotifier::new(&telegram.bot_token, telegram.chat_id))
    } else {
        if telegram.enabled {
            tracing::warn!("⚠️ Telegram enabled but bot_token or chat_id missing; logging notifications instead");
        }
        Arc::new(LogNotifier)
    }
}

/// Deliver to the group, logging instead of propagating failures.
/// Returns whether delivery succeeded.
pub async fn deliver_logged(notifier: &dyn Notifier, text: &str) -> bool {
    match notifier.deliver(text).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("⚠️ {} notification failed: {}", notifier.name(), e);
            false
        }
    }
}
