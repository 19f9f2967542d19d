//! Operator notification sink.

use async_trait::async_trait;
use cdd_core::NotifyError;

/// Alert text sent when a stale or empty cache could not be refreshed.
pub const STALE_CACHE_ALERT: &str =
    "*URGENT: CDD Error* - an attempt to refresh an outdated or null cache failed.";

/// Best-effort operator alert channel.
///
/// Callers log and discard any error; a failed alert never fails the
/// caller.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, message: &str) -> Result<(), NotifyError>;
}

/// Sink used when no alert channel is configured. It only logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogOnlyNotifier;

#[async_trait]
impl NotificationSink for LogOnlyNotifier {
    async fn notify(&self, message: &str) -> Result<(), NotifyError> {
        tracing::error!(alert = message, "Operator alert (no notification channel configured)");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_only_notifier_never_fails() {
        assert!(LogOnlyNotifier.notify(STALE_CACHE_ALERT).await.is_ok());
    }
}
