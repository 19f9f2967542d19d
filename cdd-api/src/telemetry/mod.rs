//! CDD Telemetry - Observability Infrastructure
//!
//! Structured JSON logging through `tracing` and Prometheus metrics for the
//! API layer and the cache refresh job.

pub mod metrics;
pub mod middleware;
pub mod tracer;

pub use metrics::{metrics, metrics_handler, CddMetrics, METRICS};
pub use middleware::http_metrics_middleware;
pub use tracer::{init_tracing, TelemetryConfig};
