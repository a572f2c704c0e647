//! Health check HTTP server.
//!
//! `GET /health` reports the monitor's phase and counters as JSON;
//! `GET /` returns a plain liveness banner.

use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use chrono::{DateTime, Utc};
use pumpwatch_core::Exchange;
use pumpwatch_engine::{MonitorPhase, MonitorStatus};
use serde::Serialize;
use std::time::Instant;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};

pub const SERVICE_NAME: &str = "pumpwatch";

/// Health check response payload.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// `ok`, or `stopped` once the monitor has exited
    pub status: &'static str,
    pub service: &'static str,
    pub exchange: Exchange,
    pub phase: MonitorPhase,
    pub timestamp: DateTime<Utc>,
    pub uptime_secs: u64,
    pub symbols_tracked: usize,
    pub scans_completed: u64,
    pub failed_scans: u64,
    pub alerts_sent: u64,
    pub consecutive_errors: u32,
    pub last_scan_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Shared state for health checks.
#[derive(Clone)]
pub struct HealthState {
    exchange: Exchange,
    started: Instant,
    status: watch::Receiver<MonitorStatus>,
}

impl HealthState {
    pub fn new(exchange: Exchange, status: watch::Receiver<MonitorStatus>) -> Self {
        Self {
            exchange,
            started: Instant::now(),
            status,
        }
    }

    pub fn snapshot(&self) -> (StatusCode, HealthResponse) {
        let status = self.status.borrow().clone();
        let stopped = status.phase == MonitorPhase::Stopped;
        let response = HealthResponse {
            status: if stopped { "stopped" } else { "ok" },
            service: SERVICE_NAME,
            exchange: self.exchange,
            phase: status.phase,
            timestamp: Utc::now(),
            uptime_secs: self.started.elapsed().as_secs(),
            symbols_tracked: status.symbols_tracked,
            scans_completed: status.scans_completed,
            failed_scans: status.failed_scans,
            alerts_sent: status.alerts_sent,
            consecutive_errors: status.consecutive_errors,
            last_scan_at: status.last_scan_at,
            last_error: status.last_error,
        };
        let code = if stopped {
            StatusCode::SERVICE_UNAVAILABLE
        } else {
            StatusCode::OK
        };
        (code, response)
    }
}

/// Create the health router.
pub fn router(state: HealthState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(banner_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .with_state(state)
}

async fn banner_handler(State(state): State<HealthState>) -> String {
    format!("Multi-Coin Monitor OK - {} API", state.exchange)
}

async fn health_handler(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let (code, response) = state.snapshot();
    (code, Json(response))
}
