//! API Configuration Module
//!
//! Configuration for the HTTP server, the metadata repository client, the
//! cache, and the operator alert channel. Everything is read from
//! environment variables with defaults from [`crate::constants`]. Numeric
//! values that fail to parse are rejected rather than silently replaced.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use cdd_cache::{CacheConfig, StalenessWindow};
use cdd_core::ConfigError;

use crate::constants::{
    DEFAULT_BIND_HOST, DEFAULT_CACHE_MAX_AGE_DAYS, DEFAULT_CORS_MAX_AGE_SECS, DEFAULT_PORT,
    DEFAULT_SLACK_CHANNEL, DEFAULT_SLACK_USERNAME, DEFAULT_SOURCE_DEFAULTS_PATH,
    DEFAULT_SOURCE_OVERRIDES_PATH, DEFAULT_SOURCE_TIMEOUT_SECS,
};
use crate::jobs::RefreshJobConfig;

// ============================================================================
// ENVIRONMENT HELPERS
// ============================================================================

/// Read a non-empty, trimmed value through `lookup`.
pub(crate) fn lookup_var<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse a value through `lookup`, falling back to `default` when unset.
pub(crate) fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup_var(lookup, key) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            field: key.to_string(),
            value,
            reason: e.to_string(),
        }),
    }
}

pub(crate) fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

// ============================================================================
// API CONFIGURATION
// ============================================================================

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind.
    pub bind_host: String,

    /// Port to listen on.
    pub port: u16,

    /// Allowed CORS origins (comma-separated in env var).
    /// Empty means allow all origins.
    pub cors_origins: Vec<String>,

    /// Max age for CORS preflight cache in seconds.
    pub cors_max_age_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_host: DEFAULT_BIND_HOST.to_string(),
            port: DEFAULT_PORT,
            cors_origins: Vec::new(),
            cors_max_age_secs: DEFAULT_CORS_MAX_AGE_SECS,
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `CDD_API_BIND`: Bind host (default: 0.0.0.0)
    /// - `PORT` or `CDD_API_PORT`: Listen port (default: 8080)
    /// - `CDD_CORS_ORIGINS`: Comma-separated allowed origins (empty = allow all)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_host =
            lookup_var(&lookup, "CDD_API_BIND").unwrap_or_else(|| DEFAULT_BIND_HOST.to_string());

        let port_key = if lookup_var(&lookup, "PORT").is_some() {
            "PORT"
        } else {
            "CDD_API_PORT"
        };
        let port = parse_var(&lookup, port_key, DEFAULT_PORT)?;

        let cors_origins = lookup_var(&lookup, "CDD_CORS_ORIGINS")
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            bind_host,
            port,
            cors_origins,
            cors_max_age_secs: DEFAULT_CORS_MAX_AGE_SECS,
        })
    }

    /// The socket address to listen on.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.bind_host, self.port);
        addr.parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue {
                field: "CDD_API_BIND".to_string(),
                value: addr.clone(),
                reason: e.to_string(),
            })
    }
}

// ============================================================================
// METADATA REPOSITORY
// ============================================================================

/// Where and how to reach the metadata repository.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Base URL of the repository.
    pub base_url: String,

    /// Path of the default attribute list.
    pub defaults_path: String,

    /// Path of the per-study override map.
    pub overrides_path: String,

    /// Timeout applied to each call.
    pub timeout: Duration,
}

impl SourceConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            defaults_path: DEFAULT_SOURCE_DEFAULTS_PATH.to_string(),
            overrides_path: DEFAULT_SOURCE_OVERRIDES_PATH.to_string(),
            timeout: Duration::from_secs(DEFAULT_SOURCE_TIMEOUT_SECS),
        }
    }

    /// Create SourceConfig from environment variables.
    ///
    /// Environment variables:
    /// - `CDD_SOURCE_URL`: Repository base URL (required)
    /// - `CDD_SOURCE_DEFAULTS_PATH`: Default list path (default: clinical-attributes)
    /// - `CDD_SOURCE_OVERRIDES_PATH`: Override map path (default: clinical-attributes/overrides)
    /// - `CDD_SOURCE_TIMEOUT_SECS`: Per-call timeout (default: 60)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url =
            lookup_var(&lookup, "CDD_SOURCE_URL").ok_or_else(|| ConfigError::MissingRequired {
                field: "CDD_SOURCE_URL".to_string(),
            })?;

        let timeout_secs = parse_var(&lookup, "CDD_SOURCE_TIMEOUT_SECS", DEFAULT_SOURCE_TIMEOUT_SECS)?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "CDD_SOURCE_TIMEOUT_SECS".to_string(),
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            });
        }

        Ok(Self {
            base_url,
            defaults_path: lookup_var(&lookup, "CDD_SOURCE_DEFAULTS_PATH")
                .unwrap_or_else(|| DEFAULT_SOURCE_DEFAULTS_PATH.to_string()),
            overrides_path: lookup_var(&lookup, "CDD_SOURCE_OVERRIDES_PATH")
                .unwrap_or_else(|| DEFAULT_SOURCE_OVERRIDES_PATH.to_string()),
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// Full URL of the default attribute list.
    pub fn defaults_url(&self) -> String {
        join_url(&self.base_url, &self.defaults_path)
    }

    /// Full URL of the per-study override map.
    pub fn overrides_url(&self) -> String {
        join_url(&self.base_url, &self.overrides_path)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

// ============================================================================
// NOTIFIER
// ============================================================================

/// Operator alert channel. Without a webhook URL alerts are only logged.
#[derive(Debug, Clone)]
pub struct NotifierConfig {
    pub slack_url: Option<String>,
    pub channel: String,
    pub username: String,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            slack_url: None,
            channel: DEFAULT_SLACK_CHANNEL.to_string(),
            username: DEFAULT_SLACK_USERNAME.to_string(),
        }
    }
}

impl NotifierConfig {
    /// Environment variables:
    /// - `CDD_SLACK_URL`: Incoming webhook URL (unset = log only)
    /// - `CDD_SLACK_CHANNEL`: Channel (default: #msk-pipeline-logs)
    /// - `CDD_SLACK_USERNAME`: Username (default: cbioportal_importer)
    pub fn from_env() -> Self {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            slack_url: lookup_var(&lookup, "CDD_SLACK_URL"),
            channel: lookup_var(&lookup, "CDD_SLACK_CHANNEL")
                .unwrap_or_else(|| DEFAULT_SLACK_CHANNEL.to_string()),
            username: lookup_var(&lookup, "CDD_SLACK_USERNAME")
                .unwrap_or_else(|| DEFAULT_SLACK_USERNAME.to_string()),
        }
    }
}

// ============================================================================
// CACHE
// ============================================================================

/// Build the cache configuration.
///
/// Environment variables:
/// - `CDD_CACHE_MAX_AGE_DAYS`: Staleness window (default: 3)
/// - `CDD_SOURCE_TIMEOUT_SECS`: Per-fetch timeout (default: 60)
pub fn cache_config_from_lookup<F>(lookup: F) -> Result<CacheConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let max_age_days = parse_var(&lookup, "CDD_CACHE_MAX_AGE_DAYS", DEFAULT_CACHE_MAX_AGE_DAYS)?;
    if max_age_days <= 0 {
        return Err(ConfigError::InvalidValue {
            field: "CDD_CACHE_MAX_AGE_DAYS".to_string(),
            value: max_age_days.to_string(),
            reason: "must be positive".to_string(),
        });
    }
    let window = chrono::Duration::try_days(max_age_days).ok_or_else(|| {
        ConfigError::InvalidValue {
            field: "CDD_CACHE_MAX_AGE_DAYS".to_string(),
            value: max_age_days.to_string(),
            reason: "out of range".to_string(),
        }
    })?;
    let timeout_secs = parse_var(&lookup, "CDD_SOURCE_TIMEOUT_SECS", DEFAULT_SOURCE_TIMEOUT_SECS)?;

    Ok(CacheConfig::new()
        .with_staleness_window(StalenessWindow::new(window))
        .with_fetch_timeout(Duration::from_secs(timeout_secs)))
}

// ============================================================================
// SERVICE CONFIGURATION
// ============================================================================

/// Everything the binary needs, loaded in one place.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub api: ApiConfig,
    pub source: SourceConfig,
    pub cache: CacheConfig,
    pub refresh: RefreshJobConfig,
    pub notifier: NotifierConfig,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            api: ApiConfig::from_lookup(&lookup)?,
            source: SourceConfig::from_lookup(&lookup)?,
            cache: cache_config_from_lookup(&lookup)?,
            refresh: RefreshJobConfig::from_lookup(&lookup)?,
            notifier: NotifierConfig::from_lookup(&lookup),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_api_config_defaults() -> Result<(), ConfigError> {
        let config = ApiConfig::from_lookup(vars(&[]))?;
        assert_eq!(config.bind_host, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert!(config.cors_origins.is_empty());
        assert_eq!(config.socket_addr()?.to_string(), "0.0.0.0:8080");
        Ok(())
    }

    #[test]
    fn test_port_prefers_port_over_cdd_api_port() -> Result<(), ConfigError> {
        let config = ApiConfig::from_lookup(vars(&[("PORT", "9000"), ("CDD_API_PORT", "9100")]))?;
        assert_eq!(config.port, 9000);

        let config = ApiConfig::from_lookup(vars(&[("CDD_API_PORT", "9100")]))?;
        assert_eq!(config.port, 9100);
        Ok(())
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        let err = ApiConfig::from_lookup(vars(&[("PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "PORT"));
    }

    #[test]
    fn test_cors_origins_are_split_and_trimmed() -> Result<(), ConfigError> {
        let config = ApiConfig::from_lookup(vars(&[(
            "CDD_CORS_ORIGINS",
            "https://cbioportal.org, https://www.cbioportal.org,,",
        )]))?;
        assert_eq!(
            config.cors_origins,
            vec!["https://cbioportal.org", "https://www.cbioportal.org"]
        );
        Ok(())
    }

    #[test]
    fn test_source_url_is_required() {
        let err = SourceConfig::from_lookup(vars(&[])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::MissingRequired {
                field: "CDD_SOURCE_URL".to_string()
            }
        );
    }

    #[test]
    fn test_source_urls_are_joined() -> Result<(), ConfigError> {
        let config = SourceConfig::from_lookup(vars(&[("CDD_SOURCE_URL", "http://repo:8080/api/")]))?;
        assert_eq!(config.defaults_url(), "http://repo:8080/api/clinical-attributes");
        assert_eq!(
            config.overrides_url(),
            "http://repo:8080/api/clinical-attributes/overrides"
        );
        assert_eq!(config.timeout, Duration::from_secs(60));
        Ok(())
    }

    #[test]
    fn test_zero_source_timeout_is_rejected() {
        let err = SourceConfig::from_lookup(vars(&[
            ("CDD_SOURCE_URL", "http://repo"),
            ("CDD_SOURCE_TIMEOUT_SECS", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_cache_config_reads_max_age() -> Result<(), ConfigError> {
        let config = cache_config_from_lookup(vars(&[("CDD_CACHE_MAX_AGE_DAYS", "7")]))?;
        assert_eq!(config.staleness_window, StalenessWindow::days(7));

        let config = cache_config_from_lookup(vars(&[]))?;
        assert_eq!(config.staleness_window, StalenessWindow::default());
        Ok(())
    }

    #[test]
    fn test_cache_config_rejects_bad_max_age() {
        assert!(cache_config_from_lookup(vars(&[("CDD_CACHE_MAX_AGE_DAYS", "three")])).is_err());
        assert!(cache_config_from_lookup(vars(&[("CDD_CACHE_MAX_AGE_DAYS", "0")])).is_err());
    }

    #[test]
    fn test_cache_config_rejects_out_of_range_max_age() {
        let err = cache_config_from_lookup(vars(&[("CDD_CACHE_MAX_AGE_DAYS", "200000000000000")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { ref field, ref reason, .. }
                if field == "CDD_CACHE_MAX_AGE_DAYS" && reason == "out of range"
        ));
    }

    #[test]
    fn test_notifier_defaults_to_log_only() {
        let config = NotifierConfig::from_lookup(vars(&[]));
        assert!(config.slack_url.is_none());
        assert_eq!(config.channel, "#msk-pipeline-logs");
        assert_eq!(config.username, "cbioportal_importer");
    }

    #[test]
    fn test_service_config_from_lookup() -> Result<(), ConfigError> {
        let config = ServiceConfig::from_lookup(vars(&[
            ("CDD_SOURCE_URL", "http://repo"),
            ("CDD_SLACK_URL", "https://hooks.slack.com/services/T/B/X"),
            ("CDD_REFRESH_CHECK_INTERVAL_SECS", "30"),
        ]))?;
        assert_eq!(config.source.base_url, "http://repo");
        assert!(config.notifier.slack_url.is_some());
        assert_eq!(config.refresh.check_interval, Duration::from_secs(30));
        Ok(())
    }
}
