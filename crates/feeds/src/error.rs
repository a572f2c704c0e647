//! Error types for exchange requests.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while talking to an exchange REST API.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// Connection, DNS or timeout failure.
    #[error("Network error: {0}")]
    Network(String),

    /// Non-2xx response or a payload that could not be understood.
    #[error("API error{}: {message}", status_suffix(.status))]
    Api {
        status: Option<u16>,
        message: String,
    },

    /// HTTP 429.
    #[error("Rate limit exceeded")]
    RateLimited { retry_after: Option<Duration> },

    /// The exchange returned fewer candles than requested.
    #[error("Insufficient data for {symbol}: needed {needed} candles, got {got}")]
    InsufficientData {
        symbol: String,
        needed: usize,
        got: usize,
    },
}

fn status_suffix(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (HTTP {})", code),
        None => String::new(),
    }
}

impl From<reqwest::Error> for ExchangeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ExchangeError::Api {
                status: err.status().map(|s| s.as_u16()),
                message: err.to_string(),
            }
        } else {
            ExchangeError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ExchangeError {
    fn from(err: serde_json::Error) -> Self {
        ExchangeError::malformed(err.to_string())
    }
}

impl ExchangeError {
    /// An unparseable payload from a 2xx response.
    pub fn malformed(message: impl Into<String>) -> Self {
        ExchangeError::Api {
            status: None,
            message: message.into(),
        }
    }

    /// Returns true if this error is transient and likely to succeed on retry.
    pub fn is_transient(&self) -> bool {
        match self {
            ExchangeError::Network(_) | ExchangeError::RateLimited { .. } => true,
            ExchangeError::Api { status, .. } => status.map(|s| s >= 500).unwrap_or(false),
            ExchangeError::InsufficientData { .. } => false,
        }
    }

    #[inline]
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, ExchangeError::RateLimited { .. })
    }

    /// Returns a suggested retry delay for this error type, if applicable.
    pub fn suggested_retry_delay(&self) -> Option<Duration> {
        match self {
            ExchangeError::RateLimited { retry_after } => {
                Some(retry_after.unwrap_or(Duration::from_secs(60)))
            }
            ExchangeError::Network(_) => Some(Duration::from_secs(5)),
            ExchangeError::Api { .. } if self.is_transient() => Some(Duration::from_secs(5)),
            ExchangeError::Api { .. } | ExchangeError::InsufficientData { .. } => None,
        }
    }
}
