//! Pump/dump scan loop.
//!
//! Owns the polling cycle: symbol cache, batched candle fetches, threshold
//! alerts, periodic reports and failure backoff.

pub mod config;
pub mod error;
pub mod monitor;
pub mod policy;
pub mod scope;
pub mod state;

pub use config::*;
pub use error::*;
pub use monitor::*;
pub use policy::*;
pub use scope::*;
pub use state::*;
