//! Scan failure types.

use pumpwatch_feeds::ExchangeError;
use std::time::Duration;
use thiserror::Error;

/// Why a whole scan failed.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Symbol listing failed with nothing cached, or the provider throttled us.
    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    /// The listing (or watchlist) yielded nothing to scan.
    #[error("No symbols to scan")]
    NoSymbols,

    /// Every attempted symbol failed.
    #[error("All {attempted} symbol requests failed, last error: {last}")]
    AllFailed { attempted: usize, last: ExchangeError },
}

impl MonitorError {
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, MonitorError::Exchange(e) if e.is_rate_limit())
    }

    /// Retry-After sent by the provider along with a 429.
    pub fn provider_retry_after(&self) -> Option<Duration> {
        match self {
            MonitorError::Exchange(ExchangeError::RateLimited { retry_after }) => *retry_after,
            _ => None,
        }
    }
}
