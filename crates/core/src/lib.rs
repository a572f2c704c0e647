//! Core data types for the pump/dump monitor.

pub mod candle;
pub mod change;
pub mod exchange;
pub mod symbol;

pub use candle::*;
pub use change::*;
pub use exchange::*;
pub use symbol::*;
