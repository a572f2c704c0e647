//! Notification sink abstraction.

use async_trait::async_trait;

/// Delivers alert text to operators.
///
/// Delivery failures are reported as `false` and logged by the
/// implementation; they never surface as errors, so a broken channel cannot
/// stop market monitoring.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send `text`. Returns whether delivery succeeded.
    async fn send(&self, text: &str) -> bool;

    /// Whether messages reach a real destination (false for log-only sinks).
    fn is_live(&self) -> bool {
        true
    }
}
