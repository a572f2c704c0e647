//! The polling scan loop.
//!
//! One task owns a [`Monitor`] and drives it through
//! `Starting -> (Scanning <-> Backoff)* -> Stopped`. Each scan refreshes the
//! symbol list when stale, fetches recent candles in bounded batches, and
//! notifies on every threshold crossing. Failed scans back off per
//! [`crate::BackoffPolicy`]; a shutdown signal interrupts any await.

use crate::config::MonitorConfig;
use crate::error::MonitorError;
use crate::policy::BackoffDecision;
use crate::state::{ScanState, SymbolCache};
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use futures_util::FutureExt;
use pumpwatch_alerts::{
    format_alert, format_critical, format_issues, format_shutdown, format_startup,
    format_status_report, Notifier, ReportRow, StartupInfo,
};
use pumpwatch_core::{format_pct, ChangeEvent, MoveKind, Symbol};
use pumpwatch_feeds::{ExchangeClient, ExchangeError};
use serde::Serialize;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Upper bound on the final notification so shutdown cannot hang.
const STOP_NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorPhase {
    #[default]
    Starting,
    Scanning,
    Backoff,
    Stopped,
}

impl MonitorPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            MonitorPhase::Starting => "starting",
            MonitorPhase::Scanning => "scanning",
            MonitorPhase::Backoff => "backoff",
            MonitorPhase::Stopped => "stopped",
        }
    }
}

/// Snapshot published after every state change.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MonitorStatus {
    pub phase: MonitorPhase,
    pub symbols_tracked: usize,
    pub scans_completed: u64,
    pub failed_scans: u64,
    pub alerts_sent: u64,
    pub consecutive_errors: u32,
    pub last_scan_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    /// The shutdown signal fired (or its sender went away).
    Shutdown,
    /// Backoff gave up; carries the last scan error.
    Fatal(String),
}

/// Result of one successful scan.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub events: Vec<ChangeEvent>,
    /// Not enough candles yet
    pub skipped: Vec<Symbol>,
    pub failed: Vec<Symbol>,
    /// Threshold crossings detected
    pub alerts: usize,
}

impl ScanOutcome {
    pub fn attempted(&self) -> usize {
        self.events.len() + self.skipped.len() + self.failed.len()
    }

    /// Largest absolute moves first.
    pub fn top_movers(&self, n: usize) -> Vec<&ChangeEvent> {
        let mut movers: Vec<&ChangeEvent> = self.events.iter().collect();
        movers.sort_by(|a, b| b.change_pct.abs().total_cmp(&a.change_pct.abs()));
        movers.truncate(n);
        movers
    }
}

/// Polls one exchange and notifies on large moves.
pub struct Monitor {
    exchange: Arc<dyn ExchangeClient>,
    notifier: Arc<dyn Notifier>,
    config: MonitorConfig,
    state: ScanState,
    status: watch::Sender<MonitorStatus>,
}

impl Monitor {
    pub fn new(
        exchange: Arc<dyn ExchangeClient>,
        notifier: Arc<dyn Notifier>,
        config: MonitorConfig,
    ) -> Self {
        let cache = if config.watchlist.is_empty() {
            SymbolCache::new(config.symbol_ttl)
        } else {
            SymbolCache::fixed(config.watchlist.clone())
        };
        let (status, _) = watch::channel(MonitorStatus {
            symbols_tracked: cache.len(),
            ..MonitorStatus::default()
        });
        Self {
            exchange,
            notifier,
            config,
            state: ScanState::new(cache, Instant::now()),
            status,
        }
    }

    /// Live status updates, e.g. for the health endpoint.
    pub fn subscribe(&self) -> watch::Receiver<MonitorStatus> {
        self.status.subscribe()
    }

    pub fn state(&self) -> &ScanState {
        &self.state
    }

    fn exchange_name(&self) -> &'static str {
        self.exchange.exchange().as_str()
    }

    /// Run until `shutdown` turns true or backoff gives up.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> ExitReason {
        info!(
            "Starting {} monitor: thresholds +{}% / {}%, {} candles ({:?}), scope {}, period {:?}",
            self.exchange_name(),
            self.config.thresholds.pump,
            self.config.thresholds.dump,
            self.config.interval,
            self.config.basis,
            self.config.scope,
            self.config.timing.target_period
        );

        let reason = match AssertUnwindSafe(self.drive(&mut shutdown)).catch_unwind().await {
            Ok(reason) => reason,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!("Scan loop panicked: {}", message);
                ExitReason::Fatal(format!("monitor panicked: {}", message))
            }
        };
        self.stop(&reason).await;
        reason
    }

    async fn drive(&mut self, shutdown: &mut watch::Receiver<bool>) -> ExitReason {
        self.publish(MonitorPhase::Starting);
        tokio::select! {
            _ = shutdown_requested(shutdown) => return ExitReason::Shutdown,
            _ = self.announce() => {}
        }

        loop {
            self.publish(MonitorPhase::Scanning);
            let started = Instant::now();

            let result = tokio::select! {
                _ = shutdown_requested(shutdown) => return ExitReason::Shutdown,
                result = self.scan_once() => result,
            };

            let pause = match result {
                Ok(outcome) => {
                    self.state.record_success();
                    self.status.send_modify(|status| {
                        status.last_scan_at = Some(Utc::now());
                        status.last_error = None;
                    });
                    self.publish(MonitorPhase::Scanning);

                    if self.state.report_due(Instant::now(), self.config.report_interval) {
                        tokio::select! {
                            _ = shutdown_requested(shutdown) => return ExitReason::Shutdown,
                            _ = self.send_report(&outcome) => {}
                        }
                        self.state.mark_reported(Instant::now());
                    }

                    let pause = self.config.timing.sleep_after(started.elapsed());
                    info!(
                        "Scan complete: {} symbols, {} alerts, {} skipped, {} failed; next scan in {:.1}s",
                        outcome.attempted(),
                        outcome.alerts,
                        outcome.skipped.len(),
                        outcome.failed.len(),
                        pause.as_secs_f64()
                    );
                    pause
                }
                Err(e) => {
                    let decision = tokio::select! {
                        _ = shutdown_requested(shutdown) => return ExitReason::Shutdown,
                        decision = self.handle_failure(&e) => decision,
                    };
                    match decision.delay() {
                        Some(delay) => delay,
                        None => return ExitReason::Fatal(e.to_string()),
                    }
                }
            };

            if sleep_or_shutdown(shutdown, pause).await {
                return ExitReason::Shutdown;
            }
        }
    }

    /// Initial listing and the startup notice.
    async fn announce(&mut self) {
        if let Err(e) = self.refresh_symbols().await {
            warn!("Initial symbol listing failed: {}", e);
        }

        let quote = self.exchange.quote();
        let info = StartupInfo {
            exchange: self.exchange_name().to_string(),
            coins: self
                .state
                .cache
                .symbols()
                .iter()
                .map(|s| s.base(quote).to_string())
                .collect(),
            thresholds: self.config.thresholds,
            report_interval: self.config.report_interval,
            check_interval: self.config.timing.target_period,
            host: self.config.host.clone(),
        };
        if !self.notifier.send(&format_startup(&info)).await {
            warn!("Startup notification was not delivered");
        }
    }

    /// Reload the symbol list if the cache expired.
    ///
    /// A failed refresh keeps the previous list when there is one; rate
    /// limiting always fails so the loop can cool down.
    async fn refresh_symbols(&mut self) -> Result<(), MonitorError> {
        let now = Instant::now();
        if !self.state.cache.is_stale(now) {
            return Ok(());
        }

        match self.exchange.list_symbols().await {
            Ok(symbols) if !symbols.is_empty() => {
                info!(
                    "Loaded {} {} symbols from {}",
                    symbols.len(),
                    self.exchange.quote(),
                    self.exchange_name()
                );
                self.state.cache.replace(symbols, now);
                let phase = self.status.borrow().phase;
                self.publish(phase);
                Ok(())
            }
            Ok(_) if self.state.cache.is_empty() => Err(MonitorError::NoSymbols),
            Ok(_) => {
                warn!(
                    "{} listed no symbols, keeping {} cached",
                    self.exchange_name(),
                    self.state.cache.len()
                );
                Ok(())
            }
            Err(e) if self.state.cache.is_empty() || e.is_rate_limit() => Err(e.into()),
            Err(e) => {
                warn!(
                    "Symbol refresh failed, reusing {} cached symbols: {}",
                    self.state.cache.len(),
                    e
                );
                Ok(())
            }
        }
    }

    /// One pass over this scan's symbols.
    ///
    /// Per-symbol failures are tolerated; the scan fails only when every
    /// attempted symbol failed or the provider rate-limits us.
    pub async fn scan_once(&mut self) -> Result<ScanOutcome, MonitorError> {
        self.refresh_symbols().await?;

        let targets = self
            .config
            .scope
            .select(self.state.cache.symbols(), &mut self.state.cursor);
        if targets.is_empty() {
            return Err(MonitorError::NoSymbols);
        }
        debug!("Scanning {} of {} symbols", targets.len(), self.state.cache.len());

        let interval = self.config.interval;
        let count = self.config.candles_per_fetch;
        let basis = self.config.basis;
        let mut outcome = ScanOutcome::default();
        let mut last_error: Option<ExchangeError> = None;

        for (index, batch) in targets.chunks(self.config.batch_size).enumerate() {
            if index > 0 && !self.config.request_delay.is_zero() {
                tokio::time::sleep(self.config.request_delay).await;
            }

            let exchange = &self.exchange;
            let results = join_all(batch.iter().map(|symbol| async move {
                (symbol, exchange.get_recent_candles(symbol, interval, count).await)
            }))
            .await;

            for (symbol, result) in results {
                match result {
                    Ok(candles) => match ChangeEvent::from_candles(symbol.clone(), basis, &candles) {
                        Some(event) => {
                            if let Some(kind) = self.config.thresholds.classify(event.change_pct) {
                                outcome.alerts += 1;
                                if self.send_alert(kind, &event).await {
                                    self.state.record_alert();
                                }
                            }
                            outcome.events.push(event);
                        }
                        None => outcome.skipped.push(symbol.clone()),
                    },
                    Err(ExchangeError::InsufficientData { needed, got, .. }) => {
                        debug!("{}: {}/{} candles, skipping", symbol, got, needed);
                        outcome.skipped.push(symbol.clone());
                    }
                    Err(e) if e.is_rate_limit() => {
                        warn!("Rate limited while fetching {}, aborting scan", symbol);
                        return Err(e.into());
                    }
                    Err(e) => {
                        debug!("{}: candle fetch failed: {}", symbol, e);
                        outcome.failed.push(symbol.clone());
                        last_error = Some(e);
                    }
                }
            }
        }

        if outcome.failed.len() == targets.len() {
            if let Some(last) = last_error {
                return Err(MonitorError::AllFailed {
                    attempted: targets.len(),
                    last,
                });
            }
        }
        if !outcome.failed.is_empty() {
            warn!("{} of {} symbols failed this scan", outcome.failed.len(), targets.len());
        }
        Ok(outcome)
    }

    async fn send_alert(&self, kind: MoveKind, event: &ChangeEvent) -> bool {
        info!(
            "{} {}: {} at {}",
            kind,
            event.symbol,
            format_pct(event.change_pct),
            event.price
        );
        let text = format_alert(
            kind,
            event.symbol.base(self.exchange.quote()),
            event.change_pct,
            Some(event.price),
            self.exchange_name(),
            Utc::now(),
        );
        let delivered = self.notifier.send(&text).await;
        if !delivered {
            warn!("{} alert for {} was not delivered", kind, event.symbol);
        }
        delivered
    }

    /// Top movers of `outcome`, enriched with 24h stats when available.
    async fn send_report(&self, outcome: &ScanOutcome) {
        let movers = outcome.top_movers(self.config.top_movers);
        let exchange = &self.exchange;
        let stats = join_all(movers.iter().map(|event| exchange.get_24h_stats(&event.symbol))).await;

        let quote = self.exchange.quote();
        let mut rows: Vec<ReportRow> = movers
            .iter()
            .zip(stats)
            .map(|(event, stats)| {
                let change_24h = match stats {
                    Ok(stats) => Some(stats.percent_change),
                    Err(e) => {
                        debug!("24h stats for {} unavailable: {}", event.symbol, e);
                        None
                    }
                };
                ReportRow {
                    coin: event.symbol.base(quote).to_string(),
                    change_pct: Some(event.change_pct),
                    price: event.price,
                    change_24h,
                }
            })
            .collect();
        rows.extend(outcome.failed.iter().take(self.config.top_movers).map(|symbol| ReportRow {
            coin: symbol.base(quote).to_string(),
            change_pct: None,
            price: 0.0,
            change_24h: None,
        }));

        let text = format_status_report(self.exchange_name(), &rows, outcome.attempted(), Utc::now());
        if self.notifier.send(&text).await {
            info!("Status report sent ({} movers)", movers.len());
        } else {
            warn!("Status report was not delivered");
        }
    }

    async fn handle_failure(&mut self, err: &MonitorError) -> BackoffDecision {
        let decision = self.state.record_failure(&self.config.backoff, err);
        self.status.send_modify(|status| status.last_error = Some(err.to_string()));
        self.publish(MonitorPhase::Backoff);

        let name = self.exchange_name();
        match decision {
            BackoffDecision::Retry(delay) => {
                warn!(
                    "Scan failed ({}/{}): {}. Retrying in {:?}",
                    self.state.consecutive_errors(),
                    self.config.backoff.max_consecutive_errors,
                    err,
                    delay
                );
            }
            BackoffDecision::Cooldown(delay) => {
                warn!("Rate limited by {}, cooling down for {:?}", name, delay);
            }
            BackoffDecision::Escalate(delay) => {
                error!(
                    "{} consecutive scan failures (last: {}). Backing off for {:?}",
                    self.config.backoff.max_consecutive_errors, err, delay
                );
                if !self.notifier.send(&format_issues(name, delay)).await {
                    warn!("Issues notification was not delivered");
                }
            }
            BackoffDecision::Fatal => {
                error!(
                    "Giving up after {} long backoffs without a successful scan: {}",
                    self.state.long_backoffs(),
                    err
                );
            }
        }
        decision
    }

    async fn stop(&mut self, reason: &ExitReason) {
        self.publish(MonitorPhase::Stopped);

        let text = match reason {
            ExitReason::Shutdown => format_shutdown(self.exchange_name(), &self.config.host),
            ExitReason::Fatal(message) => format_critical(message),
        };
        match tokio::time::timeout(STOP_NOTIFY_TIMEOUT, self.notifier.send(&text)).await {
            Ok(true) => {}
            Ok(false) => warn!("Final notification was not delivered"),
            Err(_) => warn!("Final notification timed out"),
        }

        info!(
            "Monitor stopped ({:?}) after {} scans, {} alerts",
            reason,
            self.state.scans_completed(),
            self.state.alerts_sent()
        );
    }

    fn publish(&self, phase: MonitorPhase) {
        let state = &self.state;
        self.status.send_modify(|status| {
            status.phase = phase;
            status.symbols_tracked = state.cache.len();
            status.scans_completed = state.scans_completed();
            status.failed_scans = state.failed_scans();
            status.alerts_sent = state.alerts_sent();
            status.consecutive_errors = state.consecutive_errors();
        });
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(text) = panic.downcast_ref::<&str>() {
        text.to_string()
    } else if let Some(text) = panic.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Resolves once shutdown is requested. A dropped sender also counts.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// Sleep for `duration`; returns true if interrupted by shutdown.
async fn sleep_or_shutdown(shutdown: &mut watch::Receiver<bool>, duration: Duration) -> bool {
    tokio::select! {
        _ = shutdown_requested(shutdown) => true,
        _ = tokio::time::sleep(duration) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BackoffPolicy, ScanScope};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use pumpwatch_core::{Candle, CandleInterval, Exchange};
    use pumpwatch_feeds::TickerStats;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn network() -> ExchangeError {
        ExchangeError::Network("connection reset".to_string())
    }

    fn throttled() -> ExchangeError {
        ExchangeError::RateLimited {
            retry_after: Some(Duration::from_secs(45)),
        }
    }

    /// Scripted exchange: fixed moves per symbol, optional failures.
    struct FakeExchange {
        listing: Vec<Symbol>,
        moves: HashMap<Symbol, (f64, f64)>,
        broken: HashSet<Symbol>,
        /// Candle requests that fail before the fake starts answering
        failures_left: AtomicUsize,
        failure: fn() -> ExchangeError,
        listing_down: AtomicBool,
        list_calls: AtomicUsize,
        candle_calls: Mutex<Vec<Instant>>,
        /// Candle requests panic instead of answering
        defective: bool,
    }

    impl FakeExchange {
        fn new(moves: &[(&str, f64, f64)]) -> Self {
            Self {
                listing: moves.iter().map(|(s, _, _)| Symbol::new(s)).collect(),
                moves: moves.iter().map(|(s, o, c)| (Symbol::new(s), (*o, *c))).collect(),
                broken: HashSet::new(),
                failures_left: AtomicUsize::new(0),
                failure: network,
                listing_down: AtomicBool::new(false),
                list_calls: AtomicUsize::new(0),
                candle_calls: Mutex::new(Vec::new()),
                defective: false,
            }
        }

        fn defective(mut self) -> Self {
            self.defective = true;
            self
        }

        fn failing(mut self, times: usize, failure: fn() -> ExchangeError) -> Self {
            self.failures_left = AtomicUsize::new(times);
            self.failure = failure;
            self
        }

        fn broken(mut self, symbol: &str) -> Self {
            self.broken.insert(Symbol::new(symbol));
            self
        }

        fn candle_calls(&self) -> usize {
            self.candle_calls.lock().unwrap().len()
        }

        /// Whole seconds between consecutive candle requests.
        fn call_gaps(&self) -> Vec<u64> {
            let calls = self.candle_calls.lock().unwrap();
            calls.windows(2).map(|w| (w[1] - w[0]).as_secs()).collect()
        }
    }

    #[async_trait]
    impl ExchangeClient for FakeExchange {
        fn exchange(&self) -> Exchange {
            Exchange::Coinbase
        }

        fn quote(&self) -> &str {
            "USD"
        }

        async fn list_symbols(&self) -> Result<Vec<Symbol>, ExchangeError> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            if self.listing_down.load(Ordering::SeqCst) {
                return Err(network());
            }
            Ok(self.listing.clone())
        }

        async fn get_recent_candles(
            &self,
            symbol: &Symbol,
            _interval: CandleInterval,
            count: usize,
        ) -> Result<Vec<Candle>, ExchangeError> {
            self.candle_calls.lock().unwrap().push(Instant::now());
            if self.defective {
                panic!("candle row out of range");
            }
            let scripted = self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if scripted {
                return Err((self.failure)());
            }
            if self.broken.contains(symbol) {
                return Err(network());
            }
            let (open, close) = self.moves.get(symbol).copied().ok_or_else(|| {
                ExchangeError::InsufficientData {
                    symbol: symbol.to_string(),
                    needed: count,
                    got: 0,
                }
            })?;
            Ok((0..count)
                .map(|i| Candle {
                    open_time: i as i64 * 60_000,
                    open,
                    high: open.max(close),
                    low: open.min(close),
                    close,
                    volume: 1.0,
                })
                .collect())
        }

        async fn get_24h_stats(&self, symbol: &Symbol) -> Result<TickerStats, ExchangeError> {
            let (_, close) = self.moves.get(symbol).copied().ok_or_else(network)?;
            Ok(TickerStats {
                last_price: close,
                percent_change: 10.0,
                volume: 1000.0,
                high: close,
                low: close,
            })
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        messages: Mutex<Vec<String>>,
    }

    impl RecordingNotifier {
        fn count(&self, needle: &str) -> usize {
            self.messages.lock().unwrap().iter().filter(|m| m.contains(needle)).count()
        }

        fn find(&self, needle: &str) -> Option<String> {
            self.messages.lock().unwrap().iter().find(|m| m.contains(needle)).cloned()
        }

        fn last(&self) -> Option<String> {
            self.messages.lock().unwrap().last().cloned()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, text: &str) -> bool {
            self.messages.lock().unwrap().push(text.to_string());
            true
        }
    }

    fn config(watchlist: &[&str]) -> MonitorConfig {
        MonitorConfig {
            watchlist: watchlist.iter().map(|s| Symbol::new(s)).collect(),
            request_delay: Duration::ZERO,
            host: "test-host".to_string(),
            ..MonitorConfig::default()
        }
    }

    async fn wait_until(mut done: impl FnMut() -> bool) {
        while !done() {
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    }

    #[tokio::test]
    async fn test_scan_alerts_on_inclusive_thresholds() {
        let exchange = Arc::new(FakeExchange::new(&[
            ("A-USD", 100.0, 104.0),
            ("B-USD", 100.0, 96.0),
            ("C-USD", 100.0, 103.9),
        ]));
        let notifier = Arc::new(RecordingNotifier::default());
        let mut monitor = Monitor::new(
            exchange.clone(),
            notifier.clone(),
            config(&["A-USD", "B-USD", "C-USD", "D-USD"]),
        );

        let outcome = monitor.scan_once().await.unwrap();

        assert_eq!(outcome.events.len(), 3);
        assert_eq!(outcome.skipped, vec![Symbol::new("D-USD")]);
        assert_eq!(outcome.alerts, 2);
        assert_eq!(monitor.state().alerts_sent(), 2);

        let pump = notifier.find("PUMP").unwrap();
        assert!(pump.contains("A: +4.00%"));
        let dump = notifier.find("DUMP").unwrap();
        assert!(dump.contains("B: -4.00%"));
        assert_eq!(notifier.count("C:"), 0);
    }

    #[tokio::test]
    async fn test_partial_failure_still_succeeds() {
        let exchange = Arc::new(FakeExchange::new(&[("A-USD", 100.0, 101.0), ("B-USD", 1.0, 1.0)]).broken("B-USD"));
        let notifier = Arc::new(RecordingNotifier::default());
        let mut monitor = Monitor::new(exchange, notifier, config(&["A-USD", "B-USD"]));

        let outcome = monitor.scan_once().await.unwrap();
        assert_eq!(outcome.events.len(), 1);
        assert_eq!(outcome.failed, vec![Symbol::new("B-USD")]);
    }

    #[tokio::test]
    async fn test_all_symbols_failing_fails_scan() {
        let exchange = Arc::new(FakeExchange::new(&[("A-USD", 1.0, 1.0)]).failing(usize::MAX, network));
        let notifier = Arc::new(RecordingNotifier::default());
        let mut monitor = Monitor::new(exchange, notifier, config(&["A-USD", "B-USD"]));

        let err = monitor.scan_once().await.unwrap_err();
        assert!(matches!(err, MonitorError::AllFailed { attempted: 2, .. }));
    }

    #[tokio::test]
    async fn test_rate_limit_aborts_scan() {
        let exchange = Arc::new(
            FakeExchange::new(&[("A-USD", 100.0, 110.0), ("B-USD", 100.0, 110.0)]).failing(1, throttled),
        );
        let notifier = Arc::new(RecordingNotifier::default());
        let config = MonitorConfig {
            batch_size: 1,
            ..config(&["A-USD", "B-USD"])
        };
        let mut monitor = Monitor::new(exchange.clone(), notifier.clone(), config);

        let err = monitor.scan_once().await.unwrap_err();
        assert!(err.is_rate_limit());
        // second batch never requested
        assert_eq!(exchange.candle_calls(), 1);
        assert_eq!(notifier.count("PUMP"), 0);
    }

    #[tokio::test]
    async fn test_rotating_scope_limits_requests() {
        let exchange = Arc::new(FakeExchange::new(&[
            ("A-USD", 1.0, 1.0),
            ("B-USD", 1.0, 1.0),
            ("C-USD", 1.0, 1.0),
        ]));
        let notifier = Arc::new(RecordingNotifier::default());
        let config = MonitorConfig {
            scope: ScanScope::Rotating { per_scan: 2 },
            ..config(&["A-USD", "B-USD", "C-USD"])
        };
        let mut monitor = Monitor::new(exchange.clone(), notifier, config);

        assert_eq!(monitor.scan_once().await.unwrap().attempted(), 2);
        assert_eq!(monitor.scan_once().await.unwrap().attempted(), 2);
        assert_eq!(exchange.candle_calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_symbol_cache_refresh_and_fallback() {
        let exchange = Arc::new(FakeExchange::new(&[("A-USD", 1.0, 1.0), ("B-USD", 1.0, 1.0)]));
        let notifier = Arc::new(RecordingNotifier::default());
        let config = MonitorConfig {
            symbol_ttl: Duration::from_secs(600),
            ..config(&[])
        };
        let mut monitor = Monitor::new(exchange.clone(), notifier, config);

        monitor.scan_once().await.unwrap();
        monitor.scan_once().await.unwrap();
        assert_eq!(exchange.list_calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(600)).await;
        exchange.listing_down.store(true, Ordering::SeqCst);

        let outcome = monitor.scan_once().await.unwrap();
        assert_eq!(outcome.attempted(), 2);
        assert_eq!(exchange.list_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_listing_failure_without_cache_fails_scan() {
        let exchange = Arc::new(FakeExchange::new(&[("A-USD", 1.0, 1.0)]));
        exchange.listing_down.store(true, Ordering::SeqCst);
        let notifier = Arc::new(RecordingNotifier::default());
        let mut monitor = Monitor::new(exchange.clone(), notifier, config(&[]));

        let err = monitor.scan_once().await.unwrap_err();
        assert!(matches!(err, MonitorError::Exchange(ExchangeError::Network(_))));
        assert_eq!(exchange.candle_calls(), 0);
    }

    #[test]
    fn test_top_movers_by_magnitude() {
        let event = |s: &str, pct: f64| ChangeEvent {
            symbol: Symbol::new(s),
            basis: Default::default(),
            change_pct: pct,
            price: 1.0,
        };
        let outcome = ScanOutcome {
            events: vec![event("A", 1.0), event("B", -6.0), event("C", 3.0)],
            ..ScanOutcome::default()
        };
        let movers: Vec<&str> = outcome.top_movers(2).iter().map(|e| e.symbol.as_str()).collect();
        assert_eq!(movers, vec!["B", "C"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_escalates_once_at_error_ceiling() {
        let exchange = Arc::new(FakeExchange::new(&[("A-USD", 1.0, 1.0)]).failing(usize::MAX, network));
        let notifier = Arc::new(RecordingNotifier::default());
        let monitor = Monitor::new(exchange.clone(), notifier.clone(), config(&["A-USD"]));
        let status = monitor.subscribe();
        let (stop, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(monitor.run(stop_rx));

        wait_until(|| notifier.count("having issues") == 1).await;
        {
            let snapshot = status.borrow();
            assert_eq!(snapshot.phase, MonitorPhase::Backoff);
            assert_eq!(snapshot.consecutive_errors, 0);
            assert_eq!(snapshot.failed_scans, 3);
        }

        wait_until(|| exchange.candle_calls() >= 5).await;
        stop.send(true).unwrap();
        assert_eq!(handle.await.unwrap(), ExitReason::Shutdown);

        // two short retries, the long pause, then counting starts over
        assert_eq!(&exchange.call_gaps()[..4], &[30, 30, 300, 30]);
        assert_eq!(notifier.count("having issues"), 1);
        assert!(notifier.find("Will retry in 5 minutes").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_error_count() {
        let exchange = Arc::new(FakeExchange::new(&[("A-USD", 100.0, 101.0)]).failing(2, network));
        let notifier = Arc::new(RecordingNotifier::default());
        let monitor = Monitor::new(exchange.clone(), notifier.clone(), config(&["A-USD"]));
        let status = monitor.subscribe();
        let (stop, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(monitor.run(stop_rx));

        wait_until(|| status.borrow().scans_completed >= 1).await;
        {
            let snapshot = status.borrow();
            assert_eq!(snapshot.consecutive_errors, 0);
            assert_eq!(snapshot.failed_scans, 2);
            assert!(snapshot.last_scan_at.is_some());
            assert_eq!(snapshot.last_error, None);
        }

        stop.send(true).unwrap();
        handle.await.unwrap();
        assert_eq!(notifier.count("having issues"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_uses_provider_cooldown() {
        let exchange = Arc::new(FakeExchange::new(&[("A-USD", 100.0, 101.0)]).failing(1, throttled));
        let notifier = Arc::new(RecordingNotifier::default());
        let monitor = Monitor::new(exchange.clone(), notifier.clone(), config(&["A-USD"]));
        let (stop, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(monitor.run(stop_rx));

        wait_until(|| exchange.candle_calls() >= 2).await;
        stop.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(exchange.call_gaps()[0], 45);
        assert_eq!(notifier.count("having issues"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scans_follow_target_period() {
        let exchange = Arc::new(FakeExchange::new(&[("A-USD", 100.0, 101.0)]));
        let notifier = Arc::new(RecordingNotifier::default());
        let monitor = Monitor::new(exchange.clone(), notifier, config(&["A-USD"]));
        let (stop, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(monitor.run(stop_rx));

        wait_until(|| exchange.candle_calls() >= 3).await;
        stop.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(&exchange.call_gaps()[..2], &[60, 60]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_after_long_backoffs() {
        let exchange = Arc::new(FakeExchange::new(&[("A-USD", 1.0, 1.0)]).failing(usize::MAX, network));
        let notifier = Arc::new(RecordingNotifier::default());
        let config = MonitorConfig {
            backoff: BackoffPolicy {
                max_consecutive_errors: 1,
                max_long_backoffs: Some(1),
                ..BackoffPolicy::default()
            },
            ..config(&["A-USD"])
        };
        let monitor = Monitor::new(exchange.clone(), notifier.clone(), config);
        let status = monitor.subscribe();
        let (_stop, stop_rx) = watch::channel(false);

        let reason = monitor.run(stop_rx).await;

        assert!(matches!(reason, ExitReason::Fatal(ref msg) if msg.contains("connection reset")));
        assert_eq!(exchange.candle_calls(), 2);
        assert_eq!(notifier.count("having issues"), 1);
        assert!(notifier.last().unwrap().starts_with("🚨 Critical Error:"));
        assert_eq!(status.borrow().phase, MonitorPhase::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panic_in_scan_stops_with_critical_notice() {
        let exchange = Arc::new(FakeExchange::new(&[("A-USD", 100.0, 101.0)]).defective());
        let notifier = Arc::new(RecordingNotifier::default());
        let monitor = Monitor::new(exchange.clone(), notifier.clone(), config(&["A-USD"]));
        let status = monitor.subscribe();
        let (_stop, stop_rx) = watch::channel(false);

        let reason = tokio::spawn(monitor.run(stop_rx)).await.unwrap();

        assert!(matches!(reason, ExitReason::Fatal(ref msg) if msg.contains("candle row out of range")));
        assert_eq!(exchange.candle_calls(), 1);
        assert!(notifier.find("Multi-Coin Monitor Started").is_some());
        let last = notifier.last().unwrap();
        assert!(last.starts_with("🚨 Critical Error:"));
        assert!(last.contains("candle row out of range"));
        assert_eq!(status.borrow().phase, MonitorPhase::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_interrupts_sleep_and_notifies() {
        let exchange = Arc::new(FakeExchange::new(&[("A-USD", 100.0, 101.0)]));
        let notifier = Arc::new(RecordingNotifier::default());
        let monitor = Monitor::new(exchange.clone(), notifier.clone(), config(&["A-USD"]));
        let status = monitor.subscribe();
        let (stop, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(monitor.run(stop_rx));

        wait_until(|| status.borrow().scans_completed == 1).await;
        stop.send(true).unwrap();
        assert_eq!(handle.await.unwrap(), ExitReason::Shutdown);

        assert_eq!(exchange.candle_calls(), 1);
        assert!(notifier.find("Multi-Coin Monitor Started").is_some());
        assert!(notifier.last().unwrap().contains("Monitor stopped"));
        assert_eq!(status.borrow().phase, MonitorPhase::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_report_lists_movers() {
        let exchange = Arc::new(FakeExchange::new(&[("A-USD", 100.0, 102.0), ("B-USD", 100.0, 99.0)]));
        let notifier = Arc::new(RecordingNotifier::default());
        let config = MonitorConfig {
            report_interval: Duration::from_secs(120),
            ..config(&["A-USD", "B-USD"])
        };
        let monitor = Monitor::new(exchange, notifier.clone(), config);
        let (stop, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(monitor.run(stop_rx));

        wait_until(|| notifier.count("Status Report") >= 1).await;
        stop.send(true).unwrap();
        handle.await.unwrap();

        let report = notifier.find("Status Report").unwrap();
        assert!(report.contains("🟢 A: +2.00% ($102.0000) | 24h +10.00%"));
        assert!(report.contains("🔴 B: -1.00%"));
        assert!(report.find("A:").unwrap() < report.find("B:").unwrap());
        assert!(report.contains("Scanned: 2 symbols"));
    }
}
