//! Operator endpoints: forced refresh and cache status.

use std::collections::BTreeMap;

use axum::{extract::State, routing::get, Json, Router};

use crate::constants::REFRESH_SUCCESS_MESSAGE;
use crate::error::{ApiError, ApiResult};
use crate::service::{CacheStatus, DictionaryService};
use crate::state::AppState;

/// GET /api/refreshCache - Refresh the cache now
///
/// Waits for any refresh already in flight, then refreshes again. On failure
/// the previous snapshot keeps serving.
#[utoipa::path(
    get,
    path = "/api/refreshCache",
    tag = "Cache",
    responses(
        (status = 200, description = "Cache refreshed: {\"response\": \"Success!\"}", body = BTreeMap<String, String>),
        (status = 503, description = "Refresh failed", body = ApiError),
    ),
)]
pub async fn refresh_cache(
    State(service): State<DictionaryService>,
) -> ApiResult<Json<BTreeMap<String, String>>> {
    let report = service.force_reset_cache().await?;
    tracing::info!(
        attributes = report.attribute_count,
        studies = report.study_count,
        overrides = report.override_count,
        "Operator cache refresh completed"
    );

    let mut response = BTreeMap::new();
    response.insert("response".to_string(), REFRESH_SUCCESS_MESSAGE.to_string());
    Ok(Json(response))
}

/// GET /api/cacheStatus - Current cache state
#[utoipa::path(
    get,
    path = "/api/cacheStatus",
    tag = "Cache",
    responses(
        (status = 200, description = "Cache status", body = CacheStatus),
    ),
)]
pub async fn cache_status(State(service): State<DictionaryService>) -> Json<CacheStatus> {
    Json(service.cache_status())
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/api/refreshCache", get(refresh_cache))
        .route("/api/cacheStatus", get(cache_status))
}
