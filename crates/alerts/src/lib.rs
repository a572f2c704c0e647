//! Telegram alert delivery for price moves.
//!
//! This crate provides:
//! - The `Notifier` trait the monitor loop sends through
//! - A Telegram Bot API notifier with a log-only fallback
//! - HTML message formatting for alerts, reports and lifecycle notices

pub mod config;
pub mod message;
pub mod notifier;
pub mod telegram;

pub use config::TelegramConfig;
pub use message::*;
pub use notifier::Notifier;
pub use telegram::{TelegramError, TelegramNotifier};
