//! Cache validation: the step the refresh job runs on every tick.
//!
//! Kept independent of any timer so it can be driven directly in tests
//! with a manual clock.

use crate::metadata_cache::{MetadataCache, RefreshReport};
use crate::notify::{NotificationSink, STALE_CACHE_ALERT};
use cdd_core::RefreshError;

/// What one validation pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// Snapshot present and within the staleness window; nothing done.
    Fresh,
    /// Snapshot was stale or missing and has been replaced.
    Refreshed(RefreshReport),
    /// A refresh was needed but another one was already running.
    Skipped,
    /// Snapshot was stale or missing and the refresh failed. An alert was
    /// sent; `notified` records whether the sink accepted it.
    Failed { error: RefreshError, notified: bool },
}

impl ValidationOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, ValidationOutcome::Failed { .. })
    }
}

/// Refresh the cache if it is stale or empty; alert on failure.
///
/// Notification errors are logged and discarded.
pub async fn validate_and_refresh(
    cache: &MetadataCache,
    sink: &dyn NotificationSink,
) -> ValidationOutcome {
    let now = cache.now();
    if !cache.is_stale(now) {
        tracing::trace!("Clinical attribute cache is fresh");
        return ValidationOutcome::Fresh;
    }

    tracing::info!(
        last_refreshed_at = ?cache.last_refreshed_at(),
        "Clinical attribute cache is stale or empty, refreshing"
    );

    let error = match cache.try_refresh().await {
        None => {
            tracing::debug!("Cache refresh already in progress, skipping");
            return ValidationOutcome::Skipped;
        }
        Some(Ok(report)) => return ValidationOutcome::Refreshed(report),
        Some(Err(error)) => error,
    };

    let notified = match sink.notify(STALE_CACHE_ALERT).await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(
                error = %e,
                "Failed to send notification -- cache is outdated and failed to refresh"
            );
            false
        }
    };

    ValidationOutcome::Failed { error, notified }
}
