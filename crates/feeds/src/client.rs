//! Exchange client abstraction.

use crate::error::ExchangeError;
use crate::http::HttpClient;
use crate::{BinanceClient, CoinbaseClient};
use async_trait::async_trait;
use pumpwatch_core::{Candle, CandleInterval, Exchange, Symbol};
use serde::Serialize;
use std::sync::Arc;

/// 24-hour ticker statistics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TickerStats {
    pub last_price: f64,
    /// Percent change over the trailing 24 hours
    pub percent_change: f64,
    /// Base asset volume
    pub volume: f64,
    pub high: f64,
    pub low: f64,
}

/// Market-data capabilities the monitor needs from an exchange.
///
/// Implementations are stateless per call; callers cache the symbol list.
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    fn exchange(&self) -> Exchange;

    /// Quote asset of the listed markets, used to derive display names.
    fn quote(&self) -> &str;

    /// All tradable symbols quoted in [`ExchangeClient::quote`].
    async fn list_symbols(&self) -> Result<Vec<Symbol>, ExchangeError>;

    /// The newest `count` candles, oldest first.
    ///
    /// Returns [`ExchangeError::InsufficientData`] when fewer are available.
    async fn get_recent_candles(
        &self,
        symbol: &Symbol,
        interval: CandleInterval,
        count: usize,
    ) -> Result<Vec<Candle>, ExchangeError>;

    async fn get_24h_stats(&self, symbol: &Symbol) -> Result<TickerStats, ExchangeError>;
}

/// Which exchange to connect to and how.
#[derive(Debug, Clone)]
pub struct ExchangeClientConfig {
    pub exchange: Exchange,
    /// Overrides [`Exchange::default_base_url`].
    pub base_url: Option<String>,
    /// Overrides [`Exchange::default_quote`].
    pub quote: Option<String>,
}

impl ExchangeClientConfig {
    pub fn new(exchange: Exchange) -> Self {
        Self {
            exchange,
            base_url: None,
            quote: None,
        }
    }

    pub fn base_url(&self) -> String {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.exchange.default_base_url())
            .trim_end_matches('/')
            .to_string()
    }

    pub fn quote(&self) -> String {
        self.quote
            .as_deref()
            .unwrap_or_else(|| self.exchange.default_quote())
            .to_uppercase()
    }
}

/// Build the client for `config.exchange`.
pub fn create_client(config: &ExchangeClientConfig, http: HttpClient) -> Arc<dyn ExchangeClient> {
    match config.exchange {
        Exchange::Coinbase => Arc::new(CoinbaseClient::new(http, config.base_url(), config.quote())),
        Exchange::Binance => Arc::new(BinanceClient::new(http, config.base_url(), config.quote())),
    }
}

/// Sort candles oldest first and keep the newest `count`.
pub(crate) fn take_newest(
    symbol: &Symbol,
    mut candles: Vec<Candle>,
    count: usize,
) -> Result<Vec<Candle>, ExchangeError> {
    candles.sort_by_key(|c| c.open_time);
    candles.dedup_by_key(|c| c.open_time);
    if candles.len() < count {
        return Err(ExchangeError::InsufficientData {
            symbol: symbol.to_string(),
            needed: count,
            got: candles.len(),
        });
    }
    let skip = candles.len() - count;
    candles.drain(..skip);
    Ok(candles)
}

/// Read a JSON number or numeric string.
pub(crate) fn json_f64(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn candle_at(open_time: i64) -> Candle {
        Candle {
            open_time,
            open: 1.0,
            high: 1.0,
            low: 1.0,
            close: 1.0,
            volume: 0.0,
        }
    }

    #[test]
    fn test_take_newest_orders_and_trims() {
        let symbol = Symbol::new("BTC-USD");
        let candles = vec![candle_at(300), candle_at(100), candle_at(200)];
        let newest = take_newest(&symbol, candles, 2).unwrap();
        let times: Vec<i64> = newest.iter().map(|c| c.open_time).collect();
        assert_eq!(times, vec![200, 300]);
    }

    #[test]
    fn test_take_newest_insufficient() {
        let symbol = Symbol::new("BTC-USD");
        let err = take_newest(&symbol, vec![candle_at(1)], 2).unwrap_err();
        match err {
            ExchangeError::InsufficientData { symbol, needed, got } => {
                assert_eq!(symbol, "BTC-USD");
                assert_eq!(needed, 2);
                assert_eq!(got, 1);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_json_f64() {
        assert_eq!(json_f64(&json!(1.5)), Some(1.5));
        assert_eq!(json_f64(&json!("2.25")), Some(2.25));
        assert_eq!(json_f64(&json!(null)), None);
        assert_eq!(json_f64(&json!("abc")), None);
    }

    #[test]
    fn test_client_config_defaults() {
        let config = ExchangeClientConfig::new(Exchange::Coinbase);
        assert_eq!(config.base_url(), "https://api.exchange.coinbase.com");
        assert_eq!(config.quote(), "USD");

        let config = ExchangeClientConfig {
            exchange: Exchange::Binance,
            base_url: Some("http://localhost:9000/".to_string()),
            quote: Some("usdc".to_string()),
        };
        assert_eq!(config.base_url(), "http://localhost:9000");
        assert_eq!(config.quote(), "USDC");
    }
}
