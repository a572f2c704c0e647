//! OHLCV candles and percent-change math.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// One fixed-interval OHLCV bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Bucket open time (ms since epoch)
    pub open_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// Percent move from this candle's open to its close.
    #[inline]
    pub fn change_pct(&self) -> f64 {
        percent_change(self.open, self.close)
    }
}

/// `(to - from) / from * 100`, or `0.0` when `from <= 0`.
///
/// A non-positive base is treated as "no move" rather than an error.
#[inline]
pub fn percent_change(from: f64, to: f64) -> f64 {
    if from > 0.0 {
        (to - from) / from * 100.0
    } else {
        0.0
    }
}

/// Percent move between the closes of two consecutive candles.
#[inline]
pub fn total_change(previous: &Candle, current: &Candle) -> f64 {
    percent_change(previous.close, current.close)
}

/// Candle bucket width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CandleInterval {
    #[default]
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "6h")]
    SixHours,
    #[serde(rename = "1d")]
    OneDay,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported candle interval: {0}")]
pub struct UnknownInterval(pub String);

impl CandleInterval {
    /// Bucket width in seconds (Coinbase `granularity`).
    pub fn seconds(self) -> u64 {
        match self {
            CandleInterval::OneMinute => 60,
            CandleInterval::FiveMinutes => 300,
            CandleInterval::FifteenMinutes => 900,
            CandleInterval::OneHour => 3_600,
            CandleInterval::SixHours => 21_600,
            CandleInterval::OneDay => 86_400,
        }
    }

    /// Interval code shared by Binance klines and the config format.
    pub fn code(self) -> &'static str {
        match self {
            CandleInterval::OneMinute => "1m",
            CandleInterval::FiveMinutes => "5m",
            CandleInterval::FifteenMinutes => "15m",
            CandleInterval::OneHour => "1h",
            CandleInterval::SixHours => "6h",
            CandleInterval::OneDay => "1d",
        }
    }
}

impl fmt::Display for CandleInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for CandleInterval {
    type Err = UnknownInterval;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1m" | "60" => Ok(CandleInterval::OneMinute),
            "5m" | "300" => Ok(CandleInterval::FiveMinutes),
            "15m" | "900" => Ok(CandleInterval::FifteenMinutes),
            "1h" | "3600" => Ok(CandleInterval::OneHour),
            "6h" | "21600" => Ok(CandleInterval::SixHours),
            "1d" | "86400" => Ok(CandleInterval::OneDay),
            other => Err(UnknownInterval(other.to_string())),
        }
    }
}
