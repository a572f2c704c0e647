//! Binance Spot REST client.

use crate::client::{json_f64, take_newest, ExchangeClient, TickerStats};
use crate::error::ExchangeError;
use crate::http::HttpClient;
use async_trait::async_trait;
use pumpwatch_core::{Candle, CandleInterval, Exchange, Symbol};
use serde::Deserialize;
use tracing::debug;

/// Upper bound Binance accepts for `limit` on klines.
const MAX_KLINES: usize = 1000;

/// Binance Spot public market-data client.
pub struct BinanceClient {
    http: HttpClient,
    base_url: String,
    quote: String,
}

#[derive(Debug, Deserialize)]
struct BinanceExchangeInfo {
    symbols: Vec<BinanceSymbol>,
}

#[derive(Debug, Deserialize)]
struct BinanceSymbol {
    symbol: String,
    #[serde(rename = "quoteAsset")]
    quote_asset: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct BinanceTicker24h {
    #[serde(rename = "lastPrice")]
    last_price: String,
    #[serde(rename = "priceChangePercent")]
    price_change_percent: String,
    volume: String,
    #[serde(rename = "highPrice")]
    high_price: String,
    #[serde(rename = "lowPrice")]
    low_price: String,
}

impl BinanceClient {
    pub fn new(http: HttpClient, base_url: impl Into<String>, quote: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            quote: quote.into(),
        }
    }

    /// Parse a `/api/v3/klines` payload.
    ///
    /// Rows: `[openTime, "open", "high", "low", "close", "volume", closeTime, ...]`
    pub fn parse_klines(json: &serde_json::Value) -> Result<Vec<Candle>, ExchangeError> {
        let rows = json
            .as_array()
            .ok_or_else(|| ExchangeError::malformed("klines payload is not an array"))?;

        rows.iter()
            .map(|row| {
                let field = |idx: usize| {
                    row.get(idx)
                        .and_then(json_f64)
                        .ok_or_else(|| ExchangeError::malformed(format!("bad kline row: {}", row)))
                };
                Ok(Candle {
                    open_time: field(0)? as i64,
                    open: field(1)?,
                    high: field(2)?,
                    low: field(3)?,
                    close: field(4)?,
                    volume: field(5)?,
                })
            })
            .collect()
    }

    fn stats_from(ticker: &BinanceTicker24h) -> Result<TickerStats, ExchangeError> {
        let num = |raw: &str, name: &str| {
            raw.parse::<f64>()
                .map_err(|_| ExchangeError::malformed(format!("bad {}: {}", name, raw)))
        };
        Ok(TickerStats {
            last_price: num(&ticker.last_price, "lastPrice")?,
            percent_change: num(&ticker.price_change_percent, "priceChangePercent")?,
            volume: num(&ticker.volume, "volume")?,
            high: num(&ticker.high_price, "highPrice")?,
            low: num(&ticker.low_price, "lowPrice")?,
        })
    }
}

#[async_trait]
impl ExchangeClient for BinanceClient {
    fn exchange(&self) -> Exchange {
        Exchange::Binance
    }

    fn quote(&self) -> &str {
        &self.quote
    }

    async fn list_symbols(&self) -> Result<Vec<Symbol>, ExchangeError> {
        let url = format!("{}/api/v3/exchangeInfo", self.base_url);
        let info: BinanceExchangeInfo = self.http.get_json(&url, &[]).await?;

        let mut symbols: Vec<Symbol> = info
            .symbols
            .into_iter()
            .filter(|s| s.quote_asset.eq_ignore_ascii_case(&self.quote))
            .filter(|s| s.status == "TRADING")
            .map(|s| Symbol::new(&s.symbol))
            .collect();
        symbols.sort();

        debug!("Binance: {} {} symbols trading", symbols.len(), self.quote);
        Ok(symbols)
    }

    async fn get_recent_candles(
        &self,
        symbol: &Symbol,
        interval: CandleInterval,
        count: usize,
    ) -> Result<Vec<Candle>, ExchangeError> {
        let url = format!("{}/api/v3/klines", self.base_url);
        let query = [
            ("symbol", symbol.to_string()),
            ("interval", interval.code().to_string()),
            ("limit", count.clamp(1, MAX_KLINES).to_string()),
        ];
        let json: serde_json::Value = self.http.get_json(&url, &query).await?;
        let candles = Self::parse_klines(&json)?;
        take_newest(symbol, candles, count)
    }

    async fn get_24h_stats(&self, symbol: &Symbol) -> Result<TickerStats, ExchangeError> {
        let url = format!("{}/api/v3/ticker/24hr", self.base_url);
        let ticker: BinanceTicker24h = self
            .http
            .get_json(&url, &[("symbol", symbol.to_string())])
            .await?;
        Self::stats_from(&ticker)
    }
}
