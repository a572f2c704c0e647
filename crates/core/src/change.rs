//! Price-change events and threshold classification.

use crate::{percent_change, total_change, Candle, Symbol};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Which two prices a change is measured between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ChangeBasis {
    /// Latest candle open -> latest candle close.
    #[default]
    CandleOpenClose,
    /// Previous candle close -> latest candle close.
    PreviousClose,
}

impl ChangeBasis {
    /// Minimum number of candles needed to compute the change.
    pub fn required_candles(self) -> usize {
        match self {
            ChangeBasis::CandleOpenClose => 1,
            ChangeBasis::PreviousClose => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown change basis: {0} (expected 'candle' or 'previous-close')")]
pub struct UnknownBasis(pub String);

impl FromStr for ChangeBasis {
    type Err = UnknownBasis;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "candle" | "candle-open-close" | "open-close" => Ok(ChangeBasis::CandleOpenClose),
            "previous-close" | "prev-close" | "total" => Ok(ChangeBasis::PreviousClose),
            other => Err(UnknownBasis(other.to_string())),
        }
    }
}

/// Percent move of one symbol, derived from its latest candles.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeEvent {
    pub symbol: Symbol,
    pub basis: ChangeBasis,
    pub change_pct: f64,
    /// Latest close
    pub price: f64,
}

impl ChangeEvent {
    /// Compute the change from chronologically ordered candles.
    ///
    /// Returns `None` when there are fewer candles than `basis` needs.
    pub fn from_candles(symbol: Symbol, basis: ChangeBasis, candles: &[Candle]) -> Option<Self> {
        if candles.len() < basis.required_candles() {
            return None;
        }
        let latest = candles.last()?;
        let change_pct = match basis {
            ChangeBasis::CandleOpenClose => latest.change_pct(),
            ChangeBasis::PreviousClose => total_change(&candles[candles.len() - 2], latest),
        };
        Some(Self {
            symbol,
            basis,
            change_pct,
            price: latest.close,
        })
    }
}

/// Direction of a threshold breach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MoveKind {
    Pump,
    Dump,
}

impl MoveKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MoveKind::Pump => "PUMP",
            MoveKind::Dump => "DUMP",
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            MoveKind::Pump => "🚀",
            MoveKind::Dump => "📉",
        }
    }
}

impl fmt::Display for MoveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ThresholdError {
    #[error("pump threshold must be positive, got {0}")]
    PumpNotPositive(f64),
    #[error("dump threshold must be negative, got {0}")]
    DumpNotNegative(f64),
}

/// Alert thresholds in percent. Both comparisons are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Alert when `change >= pump`
    pub pump: f64,
    /// Alert when `change <= dump` (negative)
    pub dump: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            pump: 4.0,
            dump: -4.0,
        }
    }
}

impl Thresholds {
    pub fn new(pump: f64, dump: f64) -> Result<Self, ThresholdError> {
        if !(pump > 0.0) {
            return Err(ThresholdError::PumpNotPositive(pump));
        }
        if !(dump < 0.0) {
            return Err(ThresholdError::DumpNotNegative(dump));
        }
        Ok(Self { pump, dump })
    }

    /// `±threshold`, as most deployments configure it.
    pub fn symmetric(threshold: f64) -> Result<Self, ThresholdError> {
        Self::new(threshold.abs(), -threshold.abs())
    }

    pub fn classify(&self, change_pct: f64) -> Option<MoveKind> {
        if change_pct >= self.pump {
            Some(MoveKind::Pump)
        } else if change_pct <= self.dump {
            Some(MoveKind::Dump)
        } else {
            None
        }
    }
}

/// Format a percent change for display, e.g. `+4.00%` / `-3.99%`.
///
/// The shortest decimal form of the value is cut after the second decimal,
/// never rounded, so a value under a threshold of at most two decimals never
/// displays as reaching it. The sign always follows the raw value.
pub fn format_pct(change_pct: f64) -> String {
    if !change_pct.is_finite() {
        return "n/a".to_string();
    }
    let sign = if change_pct < 0.0 { '-' } else { '+' };
    let digits = change_pct.abs().to_string();
    let (whole, fraction) = digits.split_once('.').unwrap_or((digits.as_str(), ""));
    let cents: String = fraction.chars().chain(std::iter::repeat('0')).take(2).collect();
    format!("{}{}.{}%", sign, whole, cents)
}

/// Parse a value produced by [`format_pct`] (or a bare number).
pub fn parse_pct(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    let trimmed = trimmed.strip_suffix('%').unwrap_or(trimmed).trim();
    let trimmed = trimmed.strip_prefix('+').unwrap_or(trimmed);
    trimmed.parse::<f64>().ok()
}
