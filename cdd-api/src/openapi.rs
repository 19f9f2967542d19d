//! OpenAPI Document for the CDD API
//!
//! Generated with utoipa from the route annotations and schema derives.

use cdd_core::AttributeRecord;
use utoipa::OpenApi;

use crate::error::{ApiError, ErrorCode};
use crate::routes::attributes::SearchRequest;
use crate::routes::health::{HealthDetails, HealthResponse, HealthStatus};
use crate::routes::{admin, attributes, health};
use crate::service::CacheStatus;
use crate::telemetry::metrics;

/// OpenAPI document for the clinical data dictionary.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Clinical Data Dictionary API",
        version = "0.1.0",
        description = "Clinical attribute metadata for cBioPortal, with per-study overrides",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT"),
    ),
    servers(
        (url = "http://localhost:8080", description = "Local Development")
    ),
    tags(
        (name = "Clinical Attributes", description = "Attribute lookup and search"),
        (name = "Cache", description = "Operator refresh and cache status"),
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Observability", description = "Prometheus metrics")
    ),
    paths(
        // === Clinical Attribute Routes ===
        attributes::list_attributes,
        attributes::attributes_by_column_headers,
        attributes::get_attribute,
        attributes::search_attributes,
        attributes::list_cancer_studies,

        // === Cache Routes ===
        admin::refresh_cache,
        admin::cache_status,

        // === Health Routes ===
        health::liveness,
        health::readiness,

        // === Metrics ===
        metrics::metrics_handler,
    ),
    components(
        schemas(
            ApiError, ErrorCode,
            AttributeRecord, SearchRequest, CacheStatus,
            HealthResponse, HealthStatus, HealthDetails,
        )
    )
)]
pub struct ApiDoc;

impl ApiDoc {
    /// Serialize the document to pretty-printed JSON.
    pub fn to_json() -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::openapi())
    }
}
