//! Telegram delivery configuration.

use serde::{Deserialize, Serialize};

/// Values that ship in sample configs and must never be treated as real.
const PLACEHOLDERS: &[&str] = &[
    "your_bot_token",
    "your_chat_id",
    "your_token",
    "changeme",
    "placeholder",
    "xxx",
    "none",
    "null",
];

/// Telegram bot target.
#[derive(Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot token from @BotFather
    pub bot_token: String,
    /// Numeric chat id or `@channel` handle
    pub chat_id: String,
    /// Bot API base URL
    pub api_base: String,
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"<redacted>")
            .field("chat_id", &self.chat_id)
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl TelegramConfig {
    pub const DEFAULT_API_BASE: &'static str = "https://api.telegram.org";

    pub fn new(bot_token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            chat_id: chat_id.into(),
            api_base: Self::DEFAULT_API_BASE.to_string(),
        }
    }

    /// Read TELEGRAM_BOT_TOKEN, TELEGRAM_CHAT_ID and TELEGRAM_API_BASE.
    ///
    /// Returns None unless both token and chat id hold real values.
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`TelegramConfig::from_env`] over an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let bot_token = lookup("TELEGRAM_BOT_TOKEN")?;
        let chat_id = lookup("TELEGRAM_CHAT_ID")?;
        let mut config = Self::new(bot_token.trim(), chat_id.trim());
        if let Some(base) = lookup("TELEGRAM_API_BASE") {
            if !base.trim().is_empty() {
                config.api_base = base.trim().trim_end_matches('/').to_string();
            }
        }
        config.is_configured().then_some(config)
    }

    /// Both token and chat id are present and not sample values.
    pub fn is_configured(&self) -> bool {
        !is_placeholder(&self.bot_token) && !is_placeholder(&self.chat_id)
    }

    /// Chat id is an integer or an `@channel` handle.
    pub fn chat_id_is_valid(&self) -> bool {
        let id = self.chat_id.trim();
        id.parse::<i64>().is_ok() || (id.len() > 1 && id.starts_with('@'))
    }

    pub fn send_message_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.bot_token)
    }

    /// First characters of the chat id, for logs.
    pub fn chat_id_hint(&self) -> &str {
        let end = self
            .chat_id
            .char_indices()
            .nth(6)
            .map(|(i, _)| i)
            .unwrap_or(self.chat_id.len());
        &self.chat_id[..end]
    }
}

fn is_placeholder(value: &str) -> bool {
    let lower = value.trim().to_ascii_lowercase();
    lower.is_empty() || lower.starts_with("your_") || PLACEHOLDERS.contains(&lower.as_str())
}
