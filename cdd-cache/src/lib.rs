//! Clinical attribute metadata cache.
//!
//! The metadata repository is slow and sometimes down, so requests never
//! read from it directly. Instead a background job pulls the full default
//! dictionary and every study's overrides into a [`CacheSnapshot`], and
//! readers work from whatever snapshot is current.
//!
//! # Snapshot publication
//!
//! A refresh builds a complete snapshot on the side, resolving every
//! override against the new defaults, and publishes it with a single atomic
//! pointer swap. Readers therefore see either the old snapshot or the new
//! one, never defaults from one refresh paired with overrides from another.
//! A failed refresh publishes nothing; the last good snapshot keeps serving.
//!
//! # Staleness
//!
//! A snapshot older than the [`StalenessWindow`] (3 days by default) must be
//! replaced. [`validate_and_refresh`] refreshes a stale or empty cache and
//! alerts an operator through a [`NotificationSink`] when that fails.
//!
//! # Example
//!
//! ```ignore
//! let cache = MetadataCache::new(source, Arc::new(SystemClock), CacheConfig::default());
//! match validate_and_refresh(&cache, &sink).await {
//!     ValidationOutcome::Failed { error, .. } => tracing::warn!(%error, "cache not refreshed"),
//!     _ => {}
//! }
//!
//! if let Some(defaults) = cache.defaults() {
//!     let age = defaults.get("AGE");
//! }
//! ```

pub mod metadata_cache;
pub mod notify;
pub mod snapshot;
pub mod source;
pub mod staleness;
pub mod validate;

pub use metadata_cache::{CacheConfig, MetadataCache, RefreshReport, UnmatchedOverride};
pub use notify::{LogOnlyNotifier, NotificationSink, STALE_CACHE_ALERT};
pub use snapshot::{CacheRead, CacheSnapshot};
pub use source::{MetadataSource, StudyOverrideLists};
pub use staleness::StalenessWindow;
pub use validate::{validate_and_refresh, ValidationOutcome};
