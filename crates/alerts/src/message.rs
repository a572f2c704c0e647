//! HTML message formatting for Telegram.

use chrono::{DateTime, Utc};
use pumpwatch_core::{format_pct, MoveKind, Thresholds};
use std::time::Duration;

/// Coin lists longer than this are summarized by count in the startup notice.
const MAX_LISTED_COINS: usize = 20;

/// Max characters of an error message quoted in a critical notice.
const MAX_ERROR_CHARS: usize = 100;

/// Escape text for Telegram's HTML parse mode.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Format price with appropriate precision based on magnitude.
pub fn format_price(price: f64) -> String {
    if price == 0.0 {
        return "$0".to_string();
    }
    let abs_price = price.abs();
    if abs_price >= 1000.0 {
        format!("${:.2}", price)
    } else if abs_price >= 1.0 {
        format!("${:.4}", price)
    } else if abs_price >= 0.01 {
        format!("${:.6}", price)
    } else if abs_price >= 0.0001 {
        format!("${:.8}", price)
    } else {
        format!("${:.10}", price)
    }
}

fn format_clock(now: DateTime<Utc>) -> String {
    now.format("%H:%M:%S UTC").to_string()
}

fn format_minutes(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 60 && secs % 60 == 0 {
        format!("{}min", secs / 60)
    } else {
        format!("{}s", secs)
    }
}

/// Threshold breach alert.
pub fn format_alert(
    kind: MoveKind,
    coin: &str,
    change_pct: f64,
    price: Option<f64>,
    exchange: &str,
    now: DateTime<Utc>,
) -> String {
    let price_info = match price {
        Some(p) if p > 0.0 => format!("\n💰 Price: {}", format_price(p)),
        _ => String::new(),
    };

    format!(
        "{} <b>{}</b>\n\n{}: {}{}\n🕒 {}\n📊 Exchange: {}",
        kind.emoji(),
        kind,
        escape_html(coin),
        format_pct(change_pct),
        price_info,
        format_clock(now),
        escape_html(exchange)
    )
}

/// One line of a status report.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    /// Display name (base asset)
    pub coin: String,
    /// Latest candle change; None when candles could not be fetched
    pub change_pct: Option<f64>,
    pub price: f64,
    /// 24h change, when the stats request succeeded
    pub change_24h: Option<f64>,
}

/// Periodic status report.
pub fn format_status_report(
    exchange: &str,
    rows: &[ReportRow],
    scanned: usize,
    now: DateTime<Utc>,
) -> String {
    let mut lines = vec![format!(
        "📊 <b>Status Report</b> ({})\n",
        escape_html(exchange)
    )];

    if rows.is_empty() {
        lines.push("No market data this period".to_string());
    }

    for row in rows {
        let coin = escape_html(&row.coin);
        match row.change_pct {
            Some(change) => {
                let emoji = if change > 0.0 { "🟢" } else { "🔴" };
                let mut line = format!(
                    "{} {}: {} ({})",
                    emoji,
                    coin,
                    format_pct(change),
                    format_price(row.price)
                );
                if let Some(day) = row.change_24h {
                    line.push_str(&format!(" | 24h {}", format_pct(day)));
                }
                lines.push(line);
            }
            None => lines.push(format!("⚠️ {}: Data unavailable", coin)),
        }
    }

    lines.push(format!("\n🔎 Scanned: {} symbols", scanned));
    lines.push(format!("🕒 {}", format_clock(now)));
    lines.push(format!("📊 Exchange: {}", escape_html(exchange)));
    lines.join("\n")
}

/// Parameters shown in the startup notice.
#[derive(Debug, Clone)]
pub struct StartupInfo {
    pub exchange: String,
    pub coins: Vec<String>,
    pub thresholds: Thresholds,
    pub report_interval: Duration,
    pub check_interval: Duration,
    pub host: String,
}

pub fn format_startup(info: &StartupInfo) -> String {
    let coins = if info.coins.is_empty() {
        "none yet (listing pending)".to_string()
    } else if info.coins.len() > MAX_LISTED_COINS {
        format!("{} symbols", info.coins.len())
    } else {
        escape_html(&info.coins.join(", "))
    };

    let threshold = if info.thresholds.pump == -info.thresholds.dump {
        format!("±{}%", info.thresholds.pump)
    } else {
        format!("+{}% / {}%", info.thresholds.pump, info.thresholds.dump)
    };

    format!(
        "🤖 <b>Multi-Coin Monitor Started!</b>\n\n\
         📊 Exchange: {}\n\
         💰 Coins: {}\n\
         📈 Threshold: {}\n\
         ⏰ Reports every {}\n\
         🔄 Check interval: {}\n\
         🖥 Host: {}",
        escape_html(&info.exchange),
        coins,
        threshold,
        format_minutes(info.report_interval),
        format_minutes(info.check_interval),
        escape_html(&info.host)
    )
}

/// Sent once when the consecutive-error ceiling is reached.
pub fn format_issues(exchange: &str, retry_in: Duration) -> String {
    let minutes = (retry_in.as_secs() + 59) / 60;
    format!(
        "🚨 Monitor having issues with {} API. Will retry in {} minute{}.",
        escape_html(exchange),
        minutes,
        if minutes == 1 { "" } else { "s" }
    )
}

/// Sent when the monitor gives up.
pub fn format_critical(error: &str) -> String {
    let truncated: String = error.chars().take(MAX_ERROR_CHARS).collect();
    format!("🚨 Critical Error: {}", escape_html(&truncated))
}

pub fn format_shutdown(exchange: &str, host: &str) -> String {
    format!(
        "🛑 <b>Monitor stopped</b> ({})\n🖥 Host: {}",
        escape_html(exchange),
        escape_html(host)
    )
}
