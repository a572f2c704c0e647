//! Shared HTTP client for exchange requests.
//!
//! One `reqwest::Client` is built per process. A semaphore caps the number of
//! in-flight requests across every caller, so a batch of concurrent candle
//! fetches cannot exceed the configured connection budget.

use crate::error::ExchangeError;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, RETRY_AFTER};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::debug;

/// Longest error body kept in `ExchangeError::Api` messages.
const MAX_ERROR_BODY: usize = 200;

/// HTTP client settings.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// Total request timeout, including body.
    pub request_timeout: Duration,
    /// Max concurrent in-flight requests.
    pub max_connections: usize,
    /// Max idle connections kept per host.
    pub max_idle_per_host: usize,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            max_connections: 10,
            max_idle_per_host: 10,
            user_agent: concat!("pumpwatch/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Rate-capped JSON client shared by all exchange implementations.
#[derive(Clone)]
pub struct HttpClient {
    inner: reqwest::Client,
    permits: Arc<Semaphore>,
}

impl HttpClient {
    pub fn new(config: &HttpConfig) -> Result<Self, ExchangeError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let inner = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .pool_max_idle_per_host(config.max_idle_per_host)
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .build()
            .map_err(|e| ExchangeError::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            inner,
            permits: Arc::new(Semaphore::new(config.max_connections.max(1))),
        })
    }

    /// GET `url` with `query` and decode a JSON body.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, ExchangeError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| ExchangeError::Network("HTTP client closed".to_string()))?;

        debug!("GET {} {:?}", url, query);
        let response = self.inner.get(url).query(query).send().await?;
        let response = check_status(response).await?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Requests currently allowed to start without waiting.
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }
}

/// Map 429 and other non-2xx responses onto `ExchangeError`.
async fn check_status(response: Response) -> Result<Response, ExchangeError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);
        return Err(ExchangeError::RateLimited { retry_after });
    }

    let mut message = response.text().await.unwrap_or_default();
    if message.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !message.is_char_boundary(cut) {
            cut -= 1;
        }
        message.truncate(cut);
    }
    Err(ExchangeError::Api {
        status: Some(status.as_u16()),
        message,
    })
}

/// `Retry-After` in delay-seconds form. HTTP-date values are ignored.
fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}
