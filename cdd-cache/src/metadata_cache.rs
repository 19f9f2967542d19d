//! The process-wide metadata cache.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwapOption;
use cdd_core::{Clock, DefaultTable, OverrideTable, RefreshError, SourceError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::snapshot::{CacheRead, CacheSnapshot};
use crate::source::MetadataSource;
use crate::staleness::StalenessWindow;

/// Configuration for the metadata cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum snapshot age before a refresh is mandatory.
    pub staleness_window: StalenessWindow,
    /// Upper bound on each of the two source calls made by a refresh.
    pub fetch_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            staleness_window: StalenessWindow::default(),
            fetch_timeout: Duration::from_secs(60),
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_staleness_window(mut self, window: StalenessWindow) -> Self {
        self.staleness_window = window;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }
}

/// An override whose column header has no default record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnmatchedOverride {
    pub study_id: String,
    pub column_header: String,
}

/// Summary of a successful refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshReport {
    /// Start time of the refresh; becomes the snapshot's timestamp.
    pub refreshed_at: DateTime<Utc>,
    /// Records returned by the source, duplicates included.
    pub source_attribute_count: usize,
    /// Distinct column headers in the new default table.
    pub attribute_count: usize,
    pub study_count: usize,
    pub override_count: usize,
    pub unmatched_overrides: Vec<UnmatchedOverride>,
    #[serde(skip)]
    pub duration: Duration,
}

/// Two-tier clinical attribute cache.
///
/// Holds at most one [`CacheSnapshot`]. Reads never block and never touch
/// the network. Refreshes are single-flight and publish atomically; a failed
/// refresh leaves the previous snapshot in place.
pub struct MetadataCache {
    source: Arc<dyn MetadataSource>,
    clock: Arc<dyn Clock>,
    config: CacheConfig,
    current: ArcSwapOption<CacheSnapshot>,
    refresh_lock: Mutex<()>,
}

impl MetadataCache {
    pub fn new(source: Arc<dyn MetadataSource>, clock: Arc<dyn Clock>, config: CacheConfig) -> Self {
        Self {
            source,
            clock,
            config,
            current: ArcSwapOption::empty(),
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// The current snapshot, or `None` if no refresh has ever succeeded.
    pub fn snapshot(&self) -> Option<Arc<CacheSnapshot>> {
        self.current.load_full()
    }

    /// Default table of the current snapshot.
    pub fn defaults(&self) -> Option<CacheRead<DefaultTable>> {
        self.snapshot()
            .map(|s| CacheRead::new(s, CacheSnapshot::defaults))
    }

    /// Resolved override table of the current snapshot.
    pub fn overrides(&self) -> Option<CacheRead<OverrideTable>> {
        self.snapshot()
            .map(|s| CacheRead::new(s, CacheSnapshot::overrides))
    }

    pub fn is_populated(&self) -> bool {
        self.current.load().is_some()
    }

    pub fn last_refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.current.load_full().map(|s| s.refreshed_at())
    }

    /// True iff no snapshot exists or the snapshot is older than the
    /// staleness window at `now`.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        match self.last_refreshed_at() {
            Some(refreshed_at) => self.config.staleness_window.is_exceeded(refreshed_at, now),
            None => true,
        }
    }

    /// True while a refresh holds the refresh lock.
    pub fn is_refreshing(&self) -> bool {
        self.refresh_lock.try_lock().is_err()
    }

    /// Pull both tables from the source and publish a new snapshot.
    ///
    /// Waits for any refresh already running to finish first.
    pub async fn refresh(&self) -> Result<RefreshReport, RefreshError> {
        let _guard = self.refresh_lock.lock().await;
        self.refresh_locked().await
    }

    /// Like [`refresh`](Self::refresh) but returns `None` without doing
    /// anything when another refresh is already running.
    pub async fn try_refresh(&self) -> Option<Result<RefreshReport, RefreshError>> {
        let _guard = self.refresh_lock.try_lock().ok()?;
        Some(self.refresh_locked().await)
    }

    async fn refresh_locked(&self) -> Result<RefreshReport, RefreshError> {
        tracing::info!("Refilling clinical attribute cache");
        let refreshed_at = self.clock.now();
        let started = Instant::now();

        let defaults = self
            .fetch("fetch_defaults", self.source.fetch_defaults())
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to pull clinical attributes from repository");
                RefreshError::DefaultsUnavailable(e)
            })?;

        let overrides = self
            .fetch("fetch_overrides", self.source.fetch_overrides())
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to pull overrides from repository");
                RefreshError::OverridesUnavailable(e)
            })?;

        let source_attribute_count = defaults.len();
        let (snapshot, unmatched) = CacheSnapshot::build(defaults, overrides, refreshed_at);

        for (study_id, column_header) in &unmatched {
            tracing::warn!(
                study_id = %study_id,
                column_header = %column_header,
                "Override has no default attribute; unset fields left empty"
            );
        }

        let report = RefreshReport {
            refreshed_at,
            source_attribute_count,
            attribute_count: snapshot.defaults().len(),
            study_count: snapshot.overrides().len(),
            override_count: snapshot.override_count(),
            unmatched_overrides: unmatched
                .into_iter()
                .map(|(study_id, column_header)| UnmatchedOverride {
                    study_id,
                    column_header,
                })
                .collect(),
            duration: started.elapsed(),
        };

        self.current.store(Some(Arc::new(snapshot)));

        tracing::info!(
            attributes = report.attribute_count,
            studies = report.study_count,
            overrides = report.override_count,
            refreshed_at = %report.refreshed_at,
            duration_ms = report.duration.as_millis() as u64,
            "Refilled clinical attribute cache"
        );

        Ok(report)
    }

    async fn fetch<T, F>(&self, operation: &str, call: F) -> Result<T, SourceError>
    where
        F: Future<Output = Result<T, SourceError>>,
    {
        let after = self.config.fetch_timeout;
        tokio::time::timeout(after, call)
            .await
            .map_err(|_| SourceError::Timeout {
                operation: operation.to_string(),
                after,
            })?
    }
}

impl std::fmt::Debug for MetadataCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataCache")
            .field("config", &self.config)
            .field("last_refreshed_at", &self.last_refreshed_at())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cdd_core::{AttributeRecord, ManualClock};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use crate::source::StudyOverrideLists;

    // Mock source for testing
    #[derive(Default)]
    struct MockSource {
        fail_defaults: AtomicBool,
        fail_overrides: AtomicBool,
        priority: std::sync::RwLock<String>,
        calls: AtomicUsize,
    }

    impl MockSource {
        fn working() -> Self {
            let source = Self::default();
            *source.priority.write().unwrap() = "1".to_string();
            source
        }

        fn unavailable(operation: &str) -> SourceError {
            SourceError::Transport {
                operation: operation.to_string(),
                reason: "connection refused".to_string(),
            }
        }
    }

    #[async_trait]
    impl MetadataSource for MockSource {
        async fn fetch_defaults(&self) -> Result<Vec<AttributeRecord>, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_defaults.load(Ordering::SeqCst) {
                return Err(Self::unavailable("fetch_defaults"));
            }
            let priority = self.priority.read().unwrap().clone();
            Ok(vec![AttributeRecord::new(
                "AGE",
                "Diagnosis Age",
                "Age at diagnosis.",
                "NUMBER",
                "PATIENT",
                priority,
            )])
        }

        async fn fetch_overrides(&self) -> Result<StudyOverrideLists, SourceError> {
            if self.fail_overrides.load(Ordering::SeqCst) {
                return Err(Self::unavailable("fetch_overrides"));
            }
            let mut overrides = HashMap::new();
            overrides.insert(
                "mskimpact".to_string(),
                vec![AttributeRecord::new("AGE", "Age", "", "", "", "")],
            );
            Ok(overrides)
        }
    }

    struct HangingSource;

    #[async_trait]
    impl MetadataSource for HangingSource {
        async fn fetch_defaults(&self) -> Result<Vec<AttributeRecord>, SourceError> {
            std::future::pending().await
        }

        async fn fetch_overrides(&self) -> Result<StudyOverrideLists, SourceError> {
            std::future::pending().await
        }
    }

    fn cache_with(source: Arc<MockSource>, clock: Arc<ManualClock>) -> MetadataCache {
        MetadataCache::new(source, clock, CacheConfig::default())
    }

    #[tokio::test]
    async fn test_empty_cache_is_stale_and_unpopulated() {
        let clock = Arc::new(ManualClock::default());
        let cache = cache_with(Arc::new(MockSource::working()), clock.clone());

        assert!(!cache.is_populated());
        assert!(cache.defaults().is_none());
        assert!(cache.overrides().is_none());
        assert!(cache.is_stale(clock.now()));
    }

    #[tokio::test]
    async fn test_refresh_publishes_snapshot_at_start_time() {
        let clock = Arc::new(ManualClock::default());
        let start = clock.now();
        let cache = cache_with(Arc::new(MockSource::working()), clock.clone());

        let report = cache.refresh().await.unwrap();
        assert_eq!(report.refreshed_at, start);
        assert_eq!(report.attribute_count, 1);
        assert_eq!(report.study_count, 1);
        assert_eq!(report.override_count, 1);
        assert!(report.unmatched_overrides.is_empty());

        assert_eq!(cache.last_refreshed_at(), Some(start));
        let overrides = cache.overrides().unwrap();
        assert_eq!(overrides["mskimpact"]["AGE"].priority, "1");
        assert_eq!(overrides["mskimpact"]["AGE"].display_name, "Age");
    }

    #[tokio::test]
    async fn test_staleness_follows_clock() {
        let clock = Arc::new(ManualClock::default());
        let cache = cache_with(Arc::new(MockSource::working()), clock.clone());
        cache.refresh().await.unwrap();

        clock.advance(chrono::Duration::days(2));
        assert!(!cache.is_stale(clock.now()));

        clock.advance(chrono::Duration::days(2));
        assert!(cache.is_stale(clock.now()));
    }

    #[tokio::test]
    async fn test_failed_overrides_leave_snapshot_untouched() {
        let clock = Arc::new(ManualClock::default());
        let source = Arc::new(MockSource::working());
        let cache = cache_with(source.clone(), clock.clone());
        cache.refresh().await.unwrap();
        let before = cache.snapshot().unwrap();

        *source.priority.write().unwrap() = "99".to_string();
        source.fail_overrides.store(true, Ordering::SeqCst);
        clock.advance(chrono::Duration::hours(1));

        let err = cache.refresh().await.unwrap_err();
        assert!(matches!(err, RefreshError::OverridesUnavailable(_)));

        let after = cache.snapshot().unwrap();
        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(cache.defaults().unwrap()["AGE"].priority, "1");
    }

    #[tokio::test]
    async fn test_failed_defaults_on_empty_cache_stays_empty() {
        let source = Arc::new(MockSource::working());
        source.fail_defaults.store(true, Ordering::SeqCst);
        let cache = cache_with(source, Arc::new(ManualClock::default()));

        let err = cache.refresh().await.unwrap_err();
        assert!(matches!(err, RefreshError::DefaultsUnavailable(_)));
        assert!(cache.defaults().is_none());
        assert!(cache.overrides().is_none());
    }

    #[tokio::test]
    async fn test_refresh_twice_yields_equal_contents() {
        let cache = cache_with(Arc::new(MockSource::working()), Arc::new(ManualClock::default()));
        cache.refresh().await.unwrap();
        let first = cache.snapshot().unwrap();
        cache.refresh().await.unwrap();
        let second = cache.snapshot().unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert!(first.same_contents(&second));
    }

    #[tokio::test]
    async fn test_reader_keeps_old_snapshot_across_refresh() {
        let source = Arc::new(MockSource::working());
        let cache = cache_with(source.clone(), Arc::new(ManualClock::default()));
        cache.refresh().await.unwrap();

        let held = cache.defaults().unwrap();
        *source.priority.write().unwrap() = "2".to_string();
        cache.refresh().await.unwrap();

        assert_eq!(held["AGE"].priority, "1");
        assert_eq!(cache.defaults().unwrap()["AGE"].priority, "2");
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_source_times_out() {
        let cache = MetadataCache::new(
            Arc::new(HangingSource),
            Arc::new(ManualClock::default()),
            CacheConfig::new().with_fetch_timeout(Duration::from_secs(5)),
        );

        let err = cache.refresh().await.unwrap_err();
        match err {
            RefreshError::DefaultsUnavailable(SourceError::Timeout { operation, after }) => {
                assert_eq!(operation, "fetch_defaults");
                assert_eq!(after, Duration::from_secs(5));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(!cache.is_populated());
    }

    #[tokio::test]
    async fn test_try_refresh_skips_while_refreshing() {
        let source = Arc::new(MockSource::working());
        let cache = cache_with(source.clone(), Arc::new(ManualClock::default()));

        let guard = cache.refresh_lock.lock().await;
        assert!(cache.is_refreshing());
        assert!(cache.try_refresh().await.is_none());
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
        drop(guard);

        assert!(!cache.is_refreshing());
        assert!(cache.try_refresh().await.unwrap().is_ok());
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }
}
