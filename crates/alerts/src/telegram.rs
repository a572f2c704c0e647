//! Telegram Bot API notifier.

use crate::config::TelegramConfig;
use crate::notifier::Notifier;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum TelegramError {
    #[error("Telegram request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Telegram API returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Invalid chat id: {0}")]
    InvalidChatId(String),
}

enum Delivery {
    Live {
        config: TelegramConfig,
        http: reqwest::Client,
    },
    LogOnly,
}

/// Sends HTML messages through `sendMessage`.
///
/// Without a configured target the notifier is log-only: every message is
/// logged and reported as delivered, and no request is made.
pub struct TelegramNotifier {
    delivery: Delivery,
}

impl TelegramNotifier {
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(config: Option<TelegramConfig>) -> Result<Self, TelegramError> {
        Self::with_timeouts(config, Self::DEFAULT_CONNECT_TIMEOUT, Self::DEFAULT_REQUEST_TIMEOUT)
    }

    /// Build with explicit connect and total request timeouts.
    pub fn with_timeouts(
        config: Option<TelegramConfig>,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, TelegramError> {
        let delivery = match config.filter(TelegramConfig::is_configured) {
            Some(config) => {
                let http = reqwest::Client::builder()
                    .connect_timeout(connect_timeout)
                    .timeout(request_timeout)
                    .build()?;
                Delivery::Live { config, http }
            }
            None => Delivery::LogOnly,
        };
        Ok(Self { delivery })
    }

    async fn send_message(
        config: &TelegramConfig,
        http: &reqwest::Client,
        text: &str,
    ) -> Result<(), TelegramError> {
        if !config.chat_id_is_valid() {
            return Err(TelegramError::InvalidChatId(config.chat_id.clone()));
        }

        let body = serde_json::json!({
            "chat_id": config.chat_id.trim(),
            "text": text,
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
        });

        let response = http.post(config.send_message_url()).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TelegramError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, text: &str) -> bool {
        match &self.delivery {
            Delivery::LogOnly => {
                info!("[log-only notification]\n{}", text);
                true
            }
            Delivery::Live { config, http } => match Self::send_message(config, http, text).await {
                Ok(()) => {
                    debug!("Telegram message delivered to {}", config.chat_id_hint());
                    true
                }
                Err(e) => {
                    warn!("Failed to send Telegram message: {}", e);
                    false
                }
            },
        }
    }

    fn is_live(&self) -> bool {
        matches!(self.delivery, Delivery::Live { .. })
    }
}
