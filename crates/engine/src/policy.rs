//! Scan pacing and failure backoff policy.

use std::time::Duration;

/// Target cadence of the scan loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanTiming {
    /// Desired time between the starts of consecutive scans
    pub target_period: Duration,
    /// Never sleep less than this between scans
    pub min_sleep: Duration,
}

impl Default for ScanTiming {
    fn default() -> Self {
        Self {
            target_period: Duration::from_secs(60),
            min_sleep: Duration::from_secs(5),
        }
    }
}

impl ScanTiming {
    /// Sleep owed after a scan that took `elapsed`.
    ///
    /// `max(min_sleep, target_period - elapsed)`, saturating at zero before
    /// the floor is applied.
    pub fn sleep_after(&self, elapsed: Duration) -> Duration {
        self.target_period.saturating_sub(elapsed).max(self.min_sleep)
    }
}

/// How the monitor reacts to failed scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Failures in a row that trigger the long backoff
    pub max_consecutive_errors: u32,
    /// Pause after a failure below the ceiling
    pub short_delay: Duration,
    /// Pause once the ceiling is reached
    pub long_delay: Duration,
    /// Pause after HTTP 429 when the provider sends no Retry-After
    pub rate_limit_cooldown: Duration,
    /// Whether rate limiting advances the error counter
    pub rate_limit_counts_as_error: bool,
    /// Long backoffs in a row, without a successful scan, before giving up.
    /// `None` retries forever.
    pub max_long_backoffs: Option<u32>,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_consecutive_errors: 3,
            short_delay: Duration::from_secs(30),
            long_delay: Duration::from_secs(300),
            rate_limit_cooldown: Duration::from_secs(60),
            rate_limit_counts_as_error: false,
            max_long_backoffs: None,
        }
    }
}

/// What to do after a failed scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffDecision {
    /// Below the ceiling; pause briefly and scan again.
    Retry(Duration),
    /// Provider throttled us; pause for the cooldown.
    Cooldown(Duration),
    /// Ceiling reached: notify operators once, pause long, start counting again.
    Escalate(Duration),
    /// Long backoffs exhausted. Stop monitoring.
    Fatal,
}

impl BackoffDecision {
    /// How long to pause, if monitoring continues.
    pub fn delay(&self) -> Option<Duration> {
        match self {
            BackoffDecision::Retry(d) | BackoffDecision::Cooldown(d) | BackoffDecision::Escalate(d) => {
                Some(*d)
            }
            BackoffDecision::Fatal => None,
        }
    }
}
