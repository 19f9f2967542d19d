//! Cache Refresh Background Task
//!
//! Validates the clinical attribute cache once at startup and then on a
//! fixed cadence. Each validation refreshes the cache if it is empty or older
//! than its staleness window; if that refresh fails, an operator alert goes
//! out through the configured [`NotificationSink`].
//!
//! The validation itself is [`validate_and_refresh`]; this module only
//! schedules it and keeps counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cdd_cache::{validate_and_refresh, MetadataCache, NotificationSink, ValidationOutcome};
use cdd_core::ConfigError;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

use crate::config::{env_lookup, parse_var};
use crate::constants::DEFAULT_REFRESH_CHECK_INTERVAL_SECS;
use crate::telemetry::metrics;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration for the cache refresh task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshJobConfig {
    /// How often to validate the cache (default: 10 minutes)
    pub check_interval: Duration,
}

impl Default for RefreshJobConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(DEFAULT_REFRESH_CHECK_INTERVAL_SECS),
        }
    }
}

impl RefreshJobConfig {
    /// Create RefreshJobConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `CDD_REFRESH_CHECK_INTERVAL_SECS`: Validation cadence (default: 600)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secs = parse_var(
            &lookup,
            "CDD_REFRESH_CHECK_INTERVAL_SECS",
            DEFAULT_REFRESH_CHECK_INTERVAL_SECS,
        )?;
        if secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "CDD_REFRESH_CHECK_INTERVAL_SECS".to_string(),
                value: secs.to_string(),
                reason: "must be positive".to_string(),
            });
        }
        Ok(Self {
            check_interval: Duration::from_secs(secs),
        })
    }
}

// ============================================================================
// METRICS
// ============================================================================

/// Counters for the refresh task's lifetime.
#[derive(Debug, Default)]
pub struct RefreshJobMetrics {
    /// Validation cycles completed
    pub cycles: AtomicU64,

    /// Refreshes started because the cache was stale or empty
    pub refreshes_attempted: AtomicU64,

    /// Refreshes that failed
    pub refresh_failures: AtomicU64,

    /// Operator alerts accepted by the sink
    pub notifications_sent: AtomicU64,

    /// Operator alerts the sink failed to deliver
    pub notification_failures: AtomicU64,

    /// Validations skipped because another refresh was in flight
    pub skipped_overlaps: AtomicU64,
}

impl RefreshJobMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get current snapshot of all counters.
    pub fn snapshot(&self) -> RefreshJobSnapshot {
        RefreshJobSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            refreshes_attempted: self.refreshes_attempted.load(Ordering::Relaxed),
            refresh_failures: self.refresh_failures.load(Ordering::Relaxed),
            notifications_sent: self.notifications_sent.load(Ordering::Relaxed),
            notification_failures: self.notification_failures.load(Ordering::Relaxed),
            skipped_overlaps: self.skipped_overlaps.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of refresh task counters at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshJobSnapshot {
    pub cycles: u64,
    pub refreshes_attempted: u64,
    pub refresh_failures: u64,
    pub notifications_sent: u64,
    pub notification_failures: u64,
    pub skipped_overlaps: u64,
}

// ============================================================================
// BACKGROUND TASK
// ============================================================================

/// Background task that keeps the cache fresh.
///
/// The first validation runs immediately; later ones follow every
/// `check_interval`. Ticks missed while a slow refresh runs are dropped, not
/// queued. Runs until `shutdown_rx` carries `true` or its sender is dropped.
///
/// # Returns
///
/// Counters collected during the task's lifetime
pub async fn cache_refresh_task(
    cache: Arc<MetadataCache>,
    sink: Arc<dyn NotificationSink>,
    config: RefreshJobConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Arc<RefreshJobMetrics> {
    let job_metrics = Arc::new(RefreshJobMetrics::new());

    let mut check_interval = interval(config.check_interval);
    check_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        check_interval_secs = config.check_interval.as_secs(),
        max_age_days = cache.config().staleness_window.window().num_days(),
        "Cache refresh task started"
    );

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    tracing::info!("Cache refresh task shutting down");
                    break;
                }
            }

            _ = check_interval.tick() => {
                run_validation(&cache, sink.as_ref(), &job_metrics).await;
            }
        }
    }

    let snapshot = job_metrics.snapshot();
    tracing::info!(
        cycles = snapshot.cycles,
        refreshes_attempted = snapshot.refreshes_attempted,
        refresh_failures = snapshot.refresh_failures,
        notifications_sent = snapshot.notifications_sent,
        notification_failures = snapshot.notification_failures,
        skipped_overlaps = snapshot.skipped_overlaps,
        "Cache refresh task completed"
    );

    job_metrics
}

/// Perform one validation cycle and record its outcome.
pub async fn run_validation(
    cache: &MetadataCache,
    sink: &dyn NotificationSink,
    job_metrics: &RefreshJobMetrics,
) -> ValidationOutcome {
    job_metrics.cycles.fetch_add(1, Ordering::Relaxed);

    let outcome = validate_and_refresh(cache, sink).await;
    let prometheus = metrics();

    match &outcome {
        ValidationOutcome::Fresh => {}
        ValidationOutcome::Skipped => {
            job_metrics.skipped_overlaps.fetch_add(1, Ordering::Relaxed);
        }
        ValidationOutcome::Refreshed(report) => {
            job_metrics.refreshes_attempted.fetch_add(1, Ordering::Relaxed);
            if let Some(m) = prometheus {
                m.record_refresh_success(report);
            }
        }
        ValidationOutcome::Failed { error, notified } => {
            job_metrics.refreshes_attempted.fetch_add(1, Ordering::Relaxed);
            job_metrics.refresh_failures.fetch_add(1, Ordering::Relaxed);
            if *notified {
                job_metrics.notifications_sent.fetch_add(1, Ordering::Relaxed);
            } else {
                job_metrics
                    .notification_failures
                    .fetch_add(1, Ordering::Relaxed);
            }
            if let Some(m) = prometheus {
                m.record_refresh_failure();
                m.record_notification(*notified);
            }
            tracing::warn!(
                error = %error,
                notified = *notified,
                last_refreshed_at = ?cache.last_refreshed_at(),
                "Scheduled cache refresh failed"
            );
        }
    }

    outcome
}

// ============================================================================
// TESTS
// ============================================================================
