//! REST market-data clients for the monitored exchanges.
//!
//! ## Architecture
//!
//! - `client` - the `ExchangeClient` trait the monitor loop is written against
//! - `http` - shared reqwest client with timeouts and a connection cap
//! - `coinbase`, `binance` - provider implementations
//! - `error` - the `ExchangeError` taxonomy

pub mod binance;
pub mod client;
pub mod coinbase;
pub mod error;
pub mod http;

#[cfg(test)]
pub(crate) mod test_server;

pub use binance::BinanceClient;
pub use client::*;
pub use coinbase::CoinbaseClient;
pub use error::*;
pub use http::{HttpClient, HttpConfig};
