//! Application configuration.
//!
//! Everything is read from environment variables (optionally seeded from a
//! `.env` file) with defaults for every value.

use pumpwatch_alerts::TelegramConfig;
use pumpwatch_core::{parse_symbol_list, CandleInterval, ChangeBasis, Exchange, ThresholdError, Thresholds};
use pumpwatch_engine::{BackoffPolicy, MonitorConfig, MonitorConfigError, ScanScope, ScanTiming};
use pumpwatch_feeds::{ExchangeClientConfig, HttpConfig};
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid {name}='{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
    #[error("Invalid thresholds: {0}")]
    Thresholds(#[from] ThresholdError),
    #[error("Invalid monitor settings: {0}")]
    Monitor(#[from] MonitorConfigError),
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Health server port.
    pub port: u16,
    /// Exchange selection and endpoint overrides.
    pub exchange: ExchangeClientConfig,
    /// Shared HTTP client limits.
    pub http: HttpConfig,
    /// Telegram target; `None` runs the notifier in log-only mode.
    pub telegram: Option<TelegramConfig>,
    /// Scan loop settings.
    pub monitor: MonitorSettings,
}

/// Scan loop settings, in the units operators configure them in.
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub pump_threshold: f64,
    pub dump_threshold: f64,
    pub basis: ChangeBasis,
    pub interval: CandleInterval,
    pub scan_period_secs: u64,
    pub min_sleep_secs: u64,
    pub report_interval_mins: u64,
    pub top_movers: usize,
    pub scope: ScanScope,
    pub batch_size: usize,
    pub request_delay_ms: u64,
    pub symbol_cache_mins: u64,
    pub max_consecutive_errors: u32,
    pub short_backoff_secs: u64,
    pub long_backoff_secs: u64,
    pub rate_limit_cooldown_secs: u64,
    pub rate_limit_counts_as_error: bool,
    pub max_long_backoffs: Option<u32>,
    pub watchlist: Vec<String>,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            pump_threshold: 4.0,
            dump_threshold: -4.0,
            basis: ChangeBasis::default(),
            interval: CandleInterval::default(),
            scan_period_secs: 60,
            min_sleep_secs: 5,
            report_interval_mins: 5,
            top_movers: 10,
            scope: ScanScope::All,
            batch_size: 20,
            request_delay_ms: 250,
            symbol_cache_mins: 30,
            max_consecutive_errors: 3,
            short_backoff_secs: 30,
            long_backoff_secs: 300,
            rate_limit_cooldown_secs: 60,
            rate_limit_counts_as_error: false,
            max_long_backoffs: None,
            watchlist: Vec::new(),
        }
    }
}

impl MonitorSettings {
    /// Build the engine config. Thresholds and cross-field rules are checked here.
    pub fn to_monitor_config(&self, host: &str) -> Result<MonitorConfig, ConfigError> {
        let config = MonitorConfig {
            thresholds: Thresholds::new(self.pump_threshold, self.dump_threshold)?,
            basis: self.basis,
            interval: self.interval,
            candles_per_fetch: self.basis.required_candles().max(2),
            timing: ScanTiming {
                target_period: Duration::from_secs(self.scan_period_secs),
                min_sleep: Duration::from_secs(self.min_sleep_secs),
            },
            backoff: BackoffPolicy {
                max_consecutive_errors: self.max_consecutive_errors,
                short_delay: Duration::from_secs(self.short_backoff_secs),
                long_delay: Duration::from_secs(self.long_backoff_secs),
                rate_limit_cooldown: Duration::from_secs(self.rate_limit_cooldown_secs),
                rate_limit_counts_as_error: self.rate_limit_counts_as_error,
                max_long_backoffs: self.max_long_backoffs,
            },
            scope: self.scope,
            batch_size: self.batch_size,
            request_delay: Duration::from_millis(self.request_delay_ms),
            symbol_ttl: minutes("SYMBOL_CACHE_MINS", self.symbol_cache_mins)?,
            report_interval: minutes("REPORT_INTERVAL_MINS", self.report_interval_mins)?,
            top_movers: self.top_movers,
            watchlist: parse_symbol_list(&self.watchlist.join(",")),
            host: host.to_string(),
        };
        config.validate()?;
        Ok(config)
    }
}

fn minutes(name: &'static str, mins: u64) -> Result<Duration, ConfigError> {
    mins.checked_mul(60)
        .map(Duration::from_secs)
        .ok_or_else(|| ConfigError::Invalid {
            name,
            value: mins.to_string(),
            reason: "too large".to_string(),
        })
}

/// Reads variables through a lookup function so tests need not touch the
/// process environment.
struct Vars<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> Vars<F> {
    /// Trimmed, non-empty value.
    fn get(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse<T>(&self, name: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        Ok(self.parse_opt(name)?.unwrap_or(default))
    }

    fn parse_opt<T>(&self, name: &'static str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.get(name) {
            None => Ok(None),
            Some(raw) => raw.parse().map(Some).map_err(|e: T::Err| ConfigError::Invalid {
                name,
                reason: e.to_string(),
                value: raw.clone(),
            }),
        }
    }

    fn flag(&self, name: &'static str, default: bool) -> Result<bool, ConfigError> {
        match self.get(name) {
            None => Ok(default),
            Some(raw) => match raw.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(ConfigError::Invalid {
                    name,
                    value: raw,
                    reason: "expected true or false".to_string(),
                }),
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let vars = Vars { lookup };
        let defaults = MonitorSettings::default();
        let http_defaults = HttpConfig::default();

        let exchange = ExchangeClientConfig {
            exchange: vars.parse("EXCHANGE", Exchange::Coinbase)?,
            base_url: vars.get("EXCHANGE_BASE_URL"),
            quote: vars.get("QUOTE_ASSET"),
        };

        let http = HttpConfig {
            connect_timeout: Duration::from_secs(
                vars.parse("HTTP_CONNECT_TIMEOUT_SECS", http_defaults.connect_timeout.as_secs())?,
            ),
            request_timeout: Duration::from_secs(
                vars.parse("HTTP_TIMEOUT_SECS", http_defaults.request_timeout.as_secs())?,
            ),
            max_connections: vars.parse("HTTP_MAX_CONNECTIONS", http_defaults.max_connections)?,
            ..http_defaults
        };
        if http.max_connections == 0 {
            return Err(ConfigError::Invalid {
                name: "HTTP_MAX_CONNECTIONS",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let monitor = MonitorSettings {
            pump_threshold: vars.parse("PUMP_THRESHOLD", defaults.pump_threshold)?,
            dump_threshold: vars.parse("DUMP_THRESHOLD", defaults.dump_threshold)?,
            basis: vars.parse("CHANGE_BASIS", defaults.basis)?,
            interval: vars.parse("CANDLE_INTERVAL", defaults.interval)?,
            scan_period_secs: vars.parse("SCAN_PERIOD_SECS", defaults.scan_period_secs)?,
            min_sleep_secs: vars.parse("MIN_SLEEP_SECS", defaults.min_sleep_secs)?,
            report_interval_mins: vars.parse("REPORT_INTERVAL_MINS", defaults.report_interval_mins)?,
            top_movers: vars.parse("TOP_MOVERS", defaults.top_movers)?,
            scope: vars.parse("SCAN_SCOPE", defaults.scope)?,
            batch_size: vars.parse("BATCH_SIZE", defaults.batch_size)?,
            request_delay_ms: vars.parse("REQUEST_DELAY_MS", defaults.request_delay_ms)?,
            symbol_cache_mins: vars.parse("SYMBOL_CACHE_MINS", defaults.symbol_cache_mins)?,
            max_consecutive_errors: vars.parse("MAX_CONSECUTIVE_ERRORS", defaults.max_consecutive_errors)?,
            short_backoff_secs: vars.parse("SHORT_BACKOFF_SECS", defaults.short_backoff_secs)?,
            long_backoff_secs: vars.parse("LONG_BACKOFF_SECS", defaults.long_backoff_secs)?,
            rate_limit_cooldown_secs: vars.parse("RATE_LIMIT_COOLDOWN_SECS", defaults.rate_limit_cooldown_secs)?,
            rate_limit_counts_as_error: vars.flag("RATE_LIMIT_COUNTS_AS_ERROR", defaults.rate_limit_counts_as_error)?,
            max_long_backoffs: vars.parse_opt("MAX_LONG_BACKOFFS")?,
            watchlist: vars
                .get("WATCHLIST")
                .map(|raw| parse_symbol_list(&raw).iter().map(|s| s.to_string()).collect())
                .unwrap_or_default(),
        };

        let config = Self {
            port: vars.parse("PORT", 8080)?,
            exchange,
            http,
            telegram: TelegramConfig::from_lookup(&vars.lookup),
            monitor,
        };
        // Surface threshold and cross-field errors at startup
        config.monitor.to_monitor_config("")?;
        Ok(config)
    }

    /// Apply command-line overrides.
    pub fn apply_overrides(&mut self, port: Option<u16>, exchange: Option<Exchange>) {
        if let Some(port) = port {
            self.port = port;
        }
        if let Some(exchange) = exchange {
            self.exchange.exchange = exchange;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(move |key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.exchange.exchange, Exchange::Coinbase);
        assert_eq!(config.exchange.quote(), "USD");
        assert!(config.telegram.is_none());

        let monitor = config.monitor.to_monitor_config("host").unwrap();
        assert_eq!(monitor.thresholds, Thresholds::default());
        assert_eq!(monitor.timing.target_period, Duration::from_secs(60));
        assert_eq!(monitor.timing.min_sleep, Duration::from_secs(5));
        assert_eq!(monitor.report_interval, Duration::from_secs(300));
        assert_eq!(monitor.symbol_ttl, Duration::from_secs(1800));
        assert_eq!(monitor.backoff, BackoffPolicy::default());
        assert_eq!(monitor.scope, ScanScope::All);
        assert_eq!(monitor.batch_size, 20);
        assert_eq!(monitor.host, "host");
        assert!(monitor.watchlist.is_empty());
    }

    #[test]
    fn test_overrides_from_vars() {
        let config = load(&[
            ("PORT", "9100"),
            ("EXCHANGE", "binance"),
            ("WATCHLIST", "btcusdt, ethusdt"),
            ("PUMP_THRESHOLD", "2.5"),
            ("DUMP_THRESHOLD", "-3"),
            ("CHANGE_BASIS", "previous-close"),
            ("CANDLE_INTERVAL", "5m"),
            ("SCAN_SCOPE", "rotating:40"),
            ("MAX_LONG_BACKOFFS", "4"),
            ("RATE_LIMIT_COUNTS_AS_ERROR", "yes"),
            ("HTTP_MAX_CONNECTIONS", "4"),
            ("TELEGRAM_BOT_TOKEN", "123:abc"),
            ("TELEGRAM_CHAT_ID", "-100123"),
        ])
        .unwrap();

        assert_eq!(config.port, 9100);
        assert_eq!(config.exchange.quote(), "USDT");
        assert_eq!(config.http.max_connections, 4);
        assert_eq!(config.telegram.as_ref().map(|t| t.chat_id.as_str()), Some("-100123"));

        let monitor = config.monitor.to_monitor_config("h").unwrap();
        assert_eq!(monitor.thresholds, Thresholds::new(2.5, -3.0).unwrap());
        assert_eq!(monitor.basis, ChangeBasis::PreviousClose);
        assert_eq!(monitor.candles_per_fetch, 2);
        assert_eq!(monitor.interval, CandleInterval::FiveMinutes);
        assert_eq!(monitor.scope, ScanScope::Rotating { per_scan: 40 });
        assert_eq!(monitor.backoff.max_long_backoffs, Some(4));
        assert!(monitor.backoff.rate_limit_counts_as_error);
        assert_eq!(monitor.watchlist.len(), 2);
        assert_eq!(monitor.watchlist[0].as_str(), "BTCUSDT");
    }

    #[test]
    fn test_invalid_values_are_errors() {
        let err = load(&[("PORT", "eighty")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "PORT", .. }));

        let err = load(&[("EXCHANGE", "kraken")]).unwrap_err();
        assert!(err.to_string().contains("EXCHANGE='kraken'"));

        assert!(matches!(
            load(&[("RATE_LIMIT_COUNTS_AS_ERROR", "maybe")]),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_huge_minute_values_are_errors() {
        let huge = u64::MAX.to_string();
        assert!(matches!(
            load(&[("SYMBOL_CACHE_MINS", huge.as_str())]),
            Err(ConfigError::Invalid { name: "SYMBOL_CACHE_MINS", .. })
        ));
        assert!(matches!(
            load(&[("REPORT_INTERVAL_MINS", huge.as_str())]),
            Err(ConfigError::Invalid { name: "REPORT_INTERVAL_MINS", .. })
        ));
        let config = load(&[("REPORT_INTERVAL_MINS", "1440")]).unwrap();
        let monitor = config.monitor.to_monitor_config("h").unwrap();
        assert_eq!(monitor.report_interval, Duration::from_secs(86_400));
    }

    #[test]
    fn test_cross_field_validation() {
        assert!(matches!(
            load(&[("DUMP_THRESHOLD", "2")]),
            Err(ConfigError::Thresholds(_))
        ));
        assert!(matches!(
            load(&[("BATCH_SIZE", "0")]),
            Err(ConfigError::Monitor(MonitorConfigError::ZeroBatchSize))
        ));
        assert!(matches!(
            load(&[("MAX_CONSECUTIVE_ERRORS", "0")]),
            Err(ConfigError::Monitor(MonitorConfigError::ZeroErrorCeiling))
        ));
    }

    #[test]
    fn test_blank_values_use_defaults() {
        let config = load(&[("PORT", "  "), ("SCAN_SCOPE", "")]).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.monitor.scope, ScanScope::All);
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = load(&[]).unwrap();
        config.apply_overrides(Some(3000), Some(Exchange::Binance));
        assert_eq!(config.port, 3000);
        assert_eq!(config.exchange.exchange, Exchange::Binance);
    }
}
