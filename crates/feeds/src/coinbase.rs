//! Coinbase Exchange REST client.
//!
//! Products are dash-separated ("PORT3-USD"). Candle rows come back newest
//! first as `[time, low, high, open, close, volume]` with `time` in seconds.

use crate::client::{json_f64, take_newest, ExchangeClient, TickerStats};
use crate::error::ExchangeError;
use crate::http::HttpClient;
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use pumpwatch_core::{percent_change, Candle, CandleInterval, Exchange, Symbol};
use serde::Deserialize;
use tracing::debug;

/// Coinbase Exchange public market-data client.
pub struct CoinbaseClient {
    http: HttpClient,
    base_url: String,
    quote: String,
}

#[derive(Debug, Deserialize)]
struct CoinbaseProduct {
    id: String,
    quote_currency: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    trading_disabled: bool,
}

#[derive(Debug, Deserialize)]
struct CoinbaseStats {
    #[serde(default)]
    open: Option<String>,
    #[serde(default)]
    high: Option<String>,
    #[serde(default)]
    low: Option<String>,
    #[serde(default)]
    last: Option<String>,
    #[serde(default)]
    volume: Option<String>,
}

fn parse_opt(value: &Option<String>) -> f64 {
    value
        .as_deref()
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.0)
}

impl CoinbaseClient {
    pub fn new(http: HttpClient, base_url: impl Into<String>, quote: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            quote: quote.into(),
        }
    }

    /// Parse a `/products/{id}/candles` payload.
    pub fn parse_candles(json: &serde_json::Value) -> Result<Vec<Candle>, ExchangeError> {
        let rows = json
            .as_array()
            .ok_or_else(|| ExchangeError::malformed("candles payload is not an array"))?;

        rows.iter()
            .map(|row| {
                let field = |idx: usize| {
                    row.get(idx)
                        .and_then(json_f64)
                        .ok_or_else(|| ExchangeError::malformed(format!("bad candle row: {}", row)))
                };
                Ok(Candle {
                    open_time: field(0)? as i64 * 1000,
                    low: field(1)?,
                    high: field(2)?,
                    open: field(3)?,
                    close: field(4)?,
                    volume: field(5)?,
                })
            })
            .collect()
    }

    fn stats_from(stats: &CoinbaseStats) -> TickerStats {
        let open = parse_opt(&stats.open);
        let last = parse_opt(&stats.last);
        TickerStats {
            last_price: last,
            percent_change: percent_change(open, last),
            volume: parse_opt(&stats.volume),
            high: parse_opt(&stats.high),
            low: parse_opt(&stats.low),
        }
    }
}

#[async_trait]
impl ExchangeClient for CoinbaseClient {
    fn exchange(&self) -> Exchange {
        Exchange::Coinbase
    }

    fn quote(&self) -> &str {
        &self.quote
    }

    async fn list_symbols(&self) -> Result<Vec<Symbol>, ExchangeError> {
        let url = format!("{}/products", self.base_url);
        let products: Vec<CoinbaseProduct> = self.http.get_json(&url, &[]).await?;

        let mut symbols: Vec<Symbol> = products
            .into_iter()
            .filter(|p| p.quote_currency.eq_ignore_ascii_case(&self.quote))
            .filter(|p| p.status.is_empty() || p.status == "online")
            .filter(|p| !p.trading_disabled)
            .map(|p| Symbol::new(&p.id))
            .collect();
        symbols.sort();

        debug!("Coinbase: {} {} products online", symbols.len(), self.quote);
        Ok(symbols)
    }

    async fn get_recent_candles(
        &self,
        symbol: &Symbol,
        interval: CandleInterval,
        count: usize,
    ) -> Result<Vec<Candle>, ExchangeError> {
        let url = format!("{}/products/{}/candles", self.base_url, symbol);
        let granularity = interval.seconds();
        // One spare bucket so an in-progress candle does not shrink the window
        let span = chrono::Duration::seconds((granularity * (count as u64 + 1)) as i64);
        let end = Utc::now();
        let start = end - span;

        let query = [
            ("granularity", granularity.to_string()),
            ("start", start.to_rfc3339_opts(SecondsFormat::Secs, true)),
            ("end", end.to_rfc3339_opts(SecondsFormat::Secs, true)),
        ];
        let json: serde_json::Value = self.http.get_json(&url, &query).await?;
        let candles = Self::parse_candles(&json)?;
        take_newest(symbol, candles, count)
    }

    async fn get_24h_stats(&self, symbol: &Symbol) -> Result<TickerStats, ExchangeError> {
        let url = format!("{}/products/{}/stats", self.base_url, symbol);
        let stats: CoinbaseStats = self.http.get_json(&url, &[]).await?;
        Ok(Self::stats_from(&stats))
    }
}
