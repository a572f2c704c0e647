//! Monitor tuning knobs.

use crate::policy::{BackoffPolicy, ScanTiming};
use crate::scope::ScanScope;
use pumpwatch_core::{CandleInterval, ChangeBasis, Symbol, Thresholds};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MonitorConfigError {
    #[error("batch size must be at least 1")]
    ZeroBatchSize,
    #[error("scan period must be positive")]
    ZeroScanPeriod,
    #[error("max consecutive errors must be at least 1")]
    ZeroErrorCeiling,
    #[error("{basis:?} needs at least {needed} candles per fetch, got {got}")]
    TooFewCandles {
        basis: ChangeBasis,
        needed: usize,
        got: usize,
    },
}

/// Everything the scan loop needs besides its clients.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub thresholds: Thresholds,
    pub basis: ChangeBasis,
    pub interval: CandleInterval,
    /// Candles requested per symbol each scan
    pub candles_per_fetch: usize,
    pub timing: ScanTiming,
    pub backoff: BackoffPolicy,
    pub scope: ScanScope,
    /// Symbols fetched concurrently
    pub batch_size: usize,
    /// Pause between batches
    pub request_delay: Duration,
    /// How long a fetched symbol list stays fresh
    pub symbol_ttl: Duration,
    pub report_interval: Duration,
    /// Rows in the periodic status report
    pub top_movers: usize,
    /// Fixed symbols to scan instead of the exchange listing
    pub watchlist: Vec<Symbol>,
    /// Shown in startup and shutdown notifications
    pub host: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            basis: ChangeBasis::default(),
            interval: CandleInterval::default(),
            candles_per_fetch: 2,
            timing: ScanTiming::default(),
            backoff: BackoffPolicy::default(),
            scope: ScanScope::default(),
            batch_size: 20,
            request_delay: Duration::from_millis(250),
            symbol_ttl: Duration::from_secs(30 * 60),
            report_interval: Duration::from_secs(5 * 60),
            top_movers: 10,
            watchlist: Vec::new(),
            host: "unknown".to_string(),
        }
    }
}

impl MonitorConfig {
    pub fn validate(&self) -> Result<(), MonitorConfigError> {
        if self.batch_size == 0 {
            return Err(MonitorConfigError::ZeroBatchSize);
        }
        if self.timing.target_period.is_zero() {
            return Err(MonitorConfigError::ZeroScanPeriod);
        }
        if self.backoff.max_consecutive_errors == 0 {
            return Err(MonitorConfigError::ZeroErrorCeiling);
        }
        let needed = self.basis.required_candles();
        if self.candles_per_fetch < needed {
            return Err(MonitorConfigError::TooFewCandles {
                basis: self.basis,
                needed,
                got: self.candles_per_fetch,
            });
        }
        Ok(())
    }
}
