//! pumpwatch - Headless Server
//!
//! Polls one exchange for sharp price moves, alerts through Telegram and
//! serves a health endpoint.

mod config;
mod health;

use clap::Parser;
use config::{AppConfig, ConfigError};
use health::HealthState;
use pumpwatch_alerts::{Notifier, TelegramError, TelegramNotifier};
use pumpwatch_core::Exchange;
use pumpwatch_engine::{ExitReason, Monitor, MonitorConfig, MonitorPhase};
use pumpwatch_feeds::{create_client, ExchangeClient, ExchangeError, HttpClient};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// How long to wait for the monitor to send its final notice.
const MONITOR_STOP_TIMEOUT: Duration = Duration::from_secs(15);

/// pumpwatch CLI
#[derive(Parser, Debug)]
#[command(name = "pumpwatch")]
#[command(about = "Crypto pump/dump monitor with Telegram alerts", long_about = None)]
struct Args {
    /// Log level: trace, debug, info, warn, error (RUST_LOG takes precedence)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Health server port (overrides PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Exchange to monitor: coinbase, binance (overrides EXCHANGE)
    #[arg(short, long)]
    exchange: Option<Exchange>,
}

#[derive(Debug, Error)]
enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("HTTP client error: {0}")]
    Http(#[from] ExchangeError),
    #[error("Telegram client error: {0}")]
    Telegram(#[from] TelegramError),
    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Monitor gave up: {0}")]
    MonitorFailed(String),
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

fn host_name() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

async fn run(args: Args) -> Result<(), StartupError> {
    let mut config = AppConfig::from_env()?;
    config.apply_overrides(args.port, args.exchange);
    let monitor_config = config.monitor.to_monitor_config(&host_name())?;

    info!("🚀 pumpwatch starting...");
    info!("  Exchange: {} (quote {})", config.exchange.exchange, config.exchange.quote());
    info!(
        "  Thresholds: +{}% / {}% ({:?}, {} candles)",
        monitor_config.thresholds.pump,
        monitor_config.thresholds.dump,
        monitor_config.basis,
        monitor_config.interval
    );
    info!("  Scope: {}, batch size {}", monitor_config.scope, monitor_config.batch_size);
    if !monitor_config.watchlist.is_empty() {
        info!("  Watchlist: {} symbols", monitor_config.watchlist.len());
    }
    info!("  Health port: {}", config.port);

    let http = HttpClient::new(&config.http)?;
    let exchange = create_client(&config.exchange, http);

    let notifier = Arc::new(TelegramNotifier::with_timeouts(
        config.telegram.clone(),
        config.http.connect_timeout,
        config.http.request_timeout,
    )?);
    if notifier.is_live() {
        info!("  Telegram: enabled");
    } else {
        warn!("  Telegram: not configured, alerts are logged only");
    }

    serve(config.port, exchange, notifier, monitor_config).await
}

/// Bind the health endpoint, then run the monitor behind it until shutdown.
async fn serve(
    port: u16,
    exchange: Arc<dyn ExchangeClient>,
    notifier: Arc<dyn Notifier>,
    monitor_config: MonitorConfig,
) -> Result<(), StartupError> {
    // Bind before the monitor announces itself so a busy port fails quietly
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!("Health endpoint listening on http://{}", listener.local_addr()?);

    let monitor = Monitor::new(exchange.clone(), notifier, monitor_config);
    let status = monitor.subscribe();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let monitor_handle = tokio::spawn(monitor.run(shutdown_rx));

    let mut monitor_status = status.clone();
    let app = health::router(HealthState::new(exchange.exchange(), status));
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = shutdown_signal() => warn!("Shutdown signal received"),
                _ = monitor_status.wait_for(|s| s.phase == MonitorPhase::Stopped) => {
                    warn!("Monitor stopped, shutting down server");
                }
            }
        })
        .await?;

    let _ = shutdown_tx.send(true);
    match tokio::time::timeout(MONITOR_STOP_TIMEOUT, monitor_handle).await {
        Ok(Ok(ExitReason::Shutdown)) => {
            info!("👋 pumpwatch stopped");
            Ok(())
        }
        Ok(Ok(ExitReason::Fatal(reason))) => Err(StartupError::MonitorFailed(reason)),
        Ok(Err(e)) => Err(StartupError::MonitorFailed(format!("monitor task panicked: {}", e))),
        Err(_) => {
            warn!("Monitor did not stop within {:?}", MONITOR_STOP_TIMEOUT);
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    init_logging(&args.log_level);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
