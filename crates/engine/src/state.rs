//! Mutable state owned by the scan loop.

use crate::error::MonitorError;
use crate::policy::{BackoffDecision, BackoffPolicy};
use pumpwatch_core::Symbol;
use std::time::Duration;
use tokio::time::Instant;

/// Symbol list with a refresh deadline.
#[derive(Debug, Clone)]
pub struct SymbolCache {
    symbols: Vec<Symbol>,
    fetched_at: Option<Instant>,
    /// `None` for a fixed watchlist that never expires
    ttl: Option<Duration>,
}

impl SymbolCache {
    /// Empty cache refreshed from the exchange every `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            symbols: Vec::new(),
            fetched_at: None,
            ttl: Some(ttl),
        }
    }

    /// Operator-supplied list; never refreshed.
    pub fn fixed(symbols: Vec<Symbol>) -> Self {
        Self {
            symbols,
            fetched_at: None,
            ttl: None,
        }
    }

    pub fn is_fixed(&self) -> bool {
        self.ttl.is_none()
    }

    pub fn is_stale(&self, now: Instant) -> bool {
        match (self.ttl, self.fetched_at) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(ttl), Some(at)) => now.saturating_duration_since(at) >= ttl,
        }
    }

    pub fn replace(&mut self, symbols: Vec<Symbol>, now: Instant) {
        self.symbols = symbols;
        self.fetched_at = Some(now);
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

/// Counters and caches carried across scans.
#[derive(Debug)]
pub struct ScanState {
    pub cache: SymbolCache,
    /// Rotation offset for [`crate::ScanScope::Rotating`]
    pub cursor: usize,
    consecutive_errors: u32,
    long_backoffs: u32,
    last_report: Instant,
    scans_completed: u64,
    failed_scans: u64,
    alerts_sent: u64,
}

impl ScanState {
    pub fn new(cache: SymbolCache, now: Instant) -> Self {
        Self {
            cache,
            cursor: 0,
            consecutive_errors: 0,
            long_backoffs: 0,
            last_report: now,
            scans_completed: 0,
            failed_scans: 0,
            alerts_sent: 0,
        }
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    /// Long backoffs taken since the last successful scan.
    pub fn long_backoffs(&self) -> u32 {
        self.long_backoffs
    }

    pub fn scans_completed(&self) -> u64 {
        self.scans_completed
    }

    pub fn failed_scans(&self) -> u64 {
        self.failed_scans
    }

    pub fn alerts_sent(&self) -> u64 {
        self.alerts_sent
    }

    pub fn record_alert(&mut self) {
        self.alerts_sent += 1;
    }

    /// A scan completed. Clears every failure counter.
    pub fn record_success(&mut self) {
        self.consecutive_errors = 0;
        self.long_backoffs = 0;
        self.scans_completed += 1;
    }

    /// A scan failed. Advances the counters and decides how to back off.
    pub fn record_failure(&mut self, policy: &BackoffPolicy, error: &MonitorError) -> BackoffDecision {
        self.failed_scans += 1;

        let below_ceiling = if error.is_rate_limit() {
            let cooldown = error.provider_retry_after().unwrap_or(policy.rate_limit_cooldown);
            if !policy.rate_limit_counts_as_error {
                return BackoffDecision::Cooldown(cooldown);
            }
            self.consecutive_errors = self.consecutive_errors.saturating_add(1);
            (self.consecutive_errors < policy.max_consecutive_errors)
                .then_some(BackoffDecision::Cooldown(cooldown))
        } else {
            self.consecutive_errors = self.consecutive_errors.saturating_add(1);
            (self.consecutive_errors < policy.max_consecutive_errors)
                .then_some(BackoffDecision::Retry(policy.short_delay))
        };
        if let Some(decision) = below_ceiling {
            return decision;
        }

        // Ceiling reached
        self.consecutive_errors = 0;
        if let Some(limit) = policy.max_long_backoffs {
            if self.long_backoffs >= limit {
                return BackoffDecision::Fatal;
            }
        }
        self.long_backoffs += 1;
        BackoffDecision::Escalate(policy.long_delay)
    }

    pub fn report_due(&self, now: Instant, interval: Duration) -> bool {
        now.saturating_duration_since(self.last_report) >= interval
    }

    pub fn mark_reported(&mut self, now: Instant) {
        self.last_report = now;
    }
}
