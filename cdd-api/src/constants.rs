//! Constants for the CDD API
//!
//! Defaults for every environment-driven setting live here so they can be
//! found and tested in one place.

// ============================================================================
// SERVER
// ============================================================================

/// Default bind host
pub const DEFAULT_BIND_HOST: &str = "0.0.0.0";

/// Default listen port
pub const DEFAULT_PORT: u16 = 8080;

/// Default CORS max age in seconds (24 hours)
pub const DEFAULT_CORS_MAX_AGE_SECS: u64 = 86400;

// ============================================================================
// METADATA REPOSITORY
// ============================================================================

/// Path of the default attribute list, relative to the repository base URL
pub const DEFAULT_SOURCE_DEFAULTS_PATH: &str = "clinical-attributes";

/// Path of the per-study override map, relative to the repository base URL
pub const DEFAULT_SOURCE_OVERRIDES_PATH: &str = "clinical-attributes/overrides";

/// Timeout applied to each repository call (seconds)
pub const DEFAULT_SOURCE_TIMEOUT_SECS: u64 = 60;

// ============================================================================
// CACHE REFRESH
// ============================================================================

/// Maximum snapshot age before a refresh is mandatory (days)
pub const DEFAULT_CACHE_MAX_AGE_DAYS: i64 = 3;

/// How often the refresh job validates the cache (10 minutes)
pub const DEFAULT_REFRESH_CHECK_INTERVAL_SECS: u64 = 600;

/// Body returned by a successful operator refresh
pub const REFRESH_SUCCESS_MESSAGE: &str = "Success!";

// ============================================================================
// SLACK
// ============================================================================

/// Channel operator alerts are posted to
pub const DEFAULT_SLACK_CHANNEL: &str = "#msk-pipeline-logs";

/// Username operator alerts are posted as
pub const DEFAULT_SLACK_USERNAME: &str = "cbioportal_importer";

/// Icon attached to operator alerts
pub const SLACK_ICON_EMOJI: &str = ":rotating_light:";

/// Timeout for posting an alert (seconds)
pub const SLACK_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// TELEMETRY
// ============================================================================

/// Filter used when `RUST_LOG` is not set
pub const DEFAULT_LOG_FILTER: &str = "cdd_api=debug,cdd_cache=debug,tower_http=debug,info";

/// Service name reported in logs
pub const DEFAULT_SERVICE_NAME: &str = "cdd-api";
