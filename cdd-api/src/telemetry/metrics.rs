//! Prometheus Metrics Definitions
//!
//! Defines all CDD metrics with appropriate labels and types.
//! Exposes a /metrics endpoint for Prometheus scraping.

use axum::{http::StatusCode, response::IntoResponse};
use cdd_cache::{CacheSnapshot, RefreshReport};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram, register_int_gauge, CounterVec,
    Encoder, Gauge, Histogram, IntGauge, TextEncoder,
};

use crate::error::{ApiError, ApiResult};

/// Refresh duration buckets (seconds). A refresh is two repository calls,
/// bounded by the fetch timeout.
const REFRESH_DURATION_BUCKETS: &[f64] = &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0];

/// Global metrics instance - initialized once on first use
pub static METRICS: Lazy<ApiResult<CddMetrics>> = Lazy::new(CddMetrics::new);

/// The global metrics, or `None` if registration failed.
pub fn metrics() -> Option<&'static CddMetrics> {
    METRICS.as_ref().ok()
}

/// Container for all CDD metrics.
#[derive(Clone)]
pub struct CddMetrics {
    /// HTTP request counter - labels: method, path, status
    pub http_requests_total: CounterVec,

    /// Cache refresh counter - labels: status (success/failure)
    pub cache_refreshes_total: CounterVec,

    /// Duration of successful refreshes
    pub cache_refresh_duration_seconds: Histogram,

    /// Operator alert counter - labels: status (sent/failed)
    pub cache_notifications_total: CounterVec,

    /// Unix time of the current snapshot
    pub cache_last_refresh_timestamp_seconds: Gauge,

    /// Distinct column headers in the current default table
    pub cache_default_attributes: IntGauge,

    /// Studies with overrides in the current snapshot
    pub cache_override_studies: IntGauge,
}

impl CddMetrics {
    /// Create and register all metrics with Prometheus.
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            http_requests_total: register_counter_vec!(
                "cdd_http_requests_total",
                "Total number of HTTP requests",
                &["method", "path", "status"]
            )
            .map_err(|e| registration_error("http_requests_total", e))?,

            cache_refreshes_total: register_counter_vec!(
                "cdd_cache_refreshes_total",
                "Total clinical attribute cache refresh attempts",
                &["status"]
            )
            .map_err(|e| registration_error("cache_refreshes_total", e))?,

            cache_refresh_duration_seconds: register_histogram!(
                "cdd_cache_refresh_duration_seconds",
                "Duration of successful cache refreshes in seconds",
                REFRESH_DURATION_BUCKETS.to_vec()
            )
            .map_err(|e| registration_error("cache_refresh_duration_seconds", e))?,

            cache_notifications_total: register_counter_vec!(
                "cdd_cache_notifications_total",
                "Total operator alerts for failed refreshes of a stale cache",
                &["status"]
            )
            .map_err(|e| registration_error("cache_notifications_total", e))?,

            cache_last_refresh_timestamp_seconds: register_gauge!(
                "cdd_cache_last_refresh_timestamp_seconds",
                "Unix timestamp of the current cache snapshot"
            )
            .map_err(|e| registration_error("cache_last_refresh_timestamp_seconds", e))?,

            cache_default_attributes: register_int_gauge!(
                "cdd_cache_default_attributes",
                "Number of clinical attributes in the current default table"
            )
            .map_err(|e| registration_error("cache_default_attributes", e))?,

            cache_override_studies: register_int_gauge!(
                "cdd_cache_override_studies",
                "Number of studies with overrides in the current snapshot"
            )
            .map_err(|e| registration_error("cache_override_studies", e))?,
        })
    }

    /// Record an HTTP request.
    pub fn record_http_request(&self, method: &str, path: &str, status: u16) {
        let status_str = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, path, status_str.as_str()])
            .inc();
    }

    /// Record a successful refresh and the snapshot it published.
    pub fn record_refresh_success(&self, report: &RefreshReport) {
        self.cache_refreshes_total
            .with_label_values(&["success"])
            .inc();
        self.cache_refresh_duration_seconds
            .observe(report.duration.as_secs_f64());
        self.cache_last_refresh_timestamp_seconds
            .set(report.refreshed_at.timestamp() as f64);
        self.cache_default_attributes
            .set(report.attribute_count as i64);
        self.cache_override_studies.set(report.study_count as i64);
    }

    /// Record a failed refresh.
    pub fn record_refresh_failure(&self) {
        self.cache_refreshes_total
            .with_label_values(&["failure"])
            .inc();
    }

    /// Record an operator alert attempt.
    pub fn record_notification(&self, sent: bool) {
        let status = if sent { "sent" } else { "failed" };
        self.cache_notifications_total
            .with_label_values(&[status])
            .inc();
    }

    /// Set the cache gauges from a snapshot.
    pub fn observe_snapshot(&self, snapshot: &CacheSnapshot) {
        self.cache_last_refresh_timestamp_seconds
            .set(snapshot.refreshed_at().timestamp() as f64);
        self.cache_default_attributes
            .set(snapshot.defaults().len() as i64);
        self.cache_override_studies
            .set(snapshot.overrides().len() as i64);
    }
}

fn registration_error(name: &str, e: prometheus::Error) -> ApiError {
    ApiError::internal_error(format!("Failed to register {}: {}", name, e))
}

/// Handler for GET /metrics endpoint.
///
/// Returns Prometheus text format metrics.
#[utoipa::path(
    get,
    path = "/metrics",
    tag = "Observability",
    responses(
        (status = 200, description = "Prometheus metrics in text format", content_type = "text/plain"),
        (status = 500, description = "Failed to encode metrics"),
    ),
)]
pub async fn metrics_handler() -> impl IntoResponse {
    // Make sure the CDD families are registered before the first scrape.
    if let Err(e) = METRICS.as_ref() {
        tracing::error!(error = %e, "Metrics registration failed");
    }

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {}", e).into_bytes(),
            )
        }
    }
}
