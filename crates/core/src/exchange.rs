//! Exchange identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Exchange identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Exchange {
    Binance,
    Coinbase,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown exchange: {0}")]
pub struct UnknownExchange(pub String);

impl Exchange {
    pub fn as_str(self) -> &'static str {
        match self {
            Exchange::Binance => "Binance",
            Exchange::Coinbase => "Coinbase",
        }
    }

    /// Quote asset used when listing markets and no override is configured.
    pub fn default_quote(self) -> &'static str {
        match self {
            Exchange::Binance => "USDT",
            Exchange::Coinbase => "USD",
        }
    }

    /// Public REST endpoint.
    pub fn default_base_url(self) -> &'static str {
        match self {
            Exchange::Binance => "https://api.binance.com",
            Exchange::Coinbase => "https://api.exchange.coinbase.com",
        }
    }

    pub fn all() -> &'static [Exchange] {
        &[Exchange::Binance, Exchange::Coinbase]
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Exchange {
    type Err = UnknownExchange;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "binance" => Ok(Exchange::Binance),
            "coinbase" | "coinbase-exchange" | "coinbasepro" => Ok(Exchange::Coinbase),
            other => Err(UnknownExchange(other.to_string())),
        }
    }
}
