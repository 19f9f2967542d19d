//! Clinical Attribute REST Routes
//!
//! Read-only lookups against the current cache snapshot. Every handler
//! accepts an optional `cancerStudy` query parameter selecting that study's
//! overrides.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use cdd_core::AttributeRecord;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::error::{ApiError, ApiResult};
use crate::service::DictionaryService;
use crate::state::AppState;

// ============================================================================
// REQUEST TYPES
// ============================================================================

/// Optional study selector shared by the attribute lookups.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StudyQuery {
    /// Apply this study's overrides
    #[serde(rename = "cancerStudy")]
    pub cancer_study: Option<String>,
}

impl StudyQuery {
    fn study(&self) -> Option<&str> {
        self.cancer_study
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Body of `POST /api/search`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    /// Terms matched against column header, display name and description
    pub search_terms: Vec<String>,

    /// Restrict results to `PATIENT` or `SAMPLE` attributes
    #[serde(default)]
    pub attribute_type: Option<String>,

    /// Match any term instead of all terms
    #[serde(default)]
    pub inclusive_search: bool,
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// GET /api/ - Every clinical attribute
#[utoipa::path(
    get,
    path = "/api/",
    tag = "Clinical Attributes",
    params(StudyQuery),
    responses(
        (status = 200, description = "All clinical attributes sorted by column header", body = Vec<AttributeRecord>),
        (status = 404, description = "Cancer study not found", body = ApiError),
        (status = 503, description = "Metadata source unresponsive", body = ApiError),
    ),
)]
pub async fn list_attributes(
    State(service): State<DictionaryService>,
    Query(query): Query<StudyQuery>,
) -> ApiResult<Json<Vec<AttributeRecord>>> {
    let records = service.clinical_attribute_metadata(query.study())?;
    Ok(Json(records))
}

/// POST /api/ - Clinical attributes for a list of column headers
#[utoipa::path(
    post,
    path = "/api/",
    tag = "Clinical Attributes",
    params(StudyQuery),
    request_body = Vec<String>,
    responses(
        (status = 200, description = "Requested clinical attributes in request order", body = Vec<AttributeRecord>),
        (status = 404, description = "One or more column headers or the study not found", body = ApiError),
        (status = 503, description = "Metadata source unresponsive", body = ApiError),
    ),
)]
pub async fn attributes_by_column_headers(
    State(service): State<DictionaryService>,
    Query(query): Query<StudyQuery>,
    Json(column_headers): Json<Vec<String>>,
) -> ApiResult<Json<Vec<AttributeRecord>>> {
    let records = service.metadata_by_column_headers(query.study(), &column_headers)?;
    Ok(Json(records))
}

/// GET /api/{column_header} - One clinical attribute
#[utoipa::path(
    get,
    path = "/api/{column_header}",
    tag = "Clinical Attributes",
    params(
        ("column_header" = String, Path, description = "Column header, e.g. AGE"),
        StudyQuery,
    ),
    responses(
        (status = 200, description = "Clinical attribute", body = AttributeRecord),
        (status = 404, description = "Column header or study not found", body = ApiError),
        (status = 503, description = "Metadata source unresponsive", body = ApiError),
    ),
)]
pub async fn get_attribute(
    State(service): State<DictionaryService>,
    Path(column_header): Path<String>,
    Query(query): Query<StudyQuery>,
) -> ApiResult<Json<AttributeRecord>> {
    let record = service.metadata_by_column_header(query.study(), &column_header)?;
    Ok(Json(record))
}

/// POST /api/search - Search default attributes
#[utoipa::path(
    post,
    path = "/api/search",
    tag = "Clinical Attributes",
    request_body = SearchRequest,
    responses(
        (status = 200, description = "Matching clinical attributes", body = Vec<AttributeRecord>),
        (status = 400, description = "No search terms given", body = ApiError),
        (status = 404, description = "Nothing matched", body = ApiError),
        (status = 503, description = "Metadata source unresponsive", body = ApiError),
    ),
)]
pub async fn search_attributes(
    State(service): State<DictionaryService>,
    Json(req): Json<SearchRequest>,
) -> ApiResult<Json<Vec<AttributeRecord>>> {
    if req.search_terms.iter().all(|t| t.trim().is_empty()) {
        return Err(ApiError::invalid_input("searchTerms must contain at least one term"));
    }

    let records = service.metadata_by_search_terms(
        &req.search_terms,
        req.attribute_type.as_deref().filter(|t| !t.trim().is_empty()),
        req.inclusive_search,
    )?;
    Ok(Json(records))
}

/// GET /api/cancerStudies - Studies with overrides
#[utoipa::path(
    get,
    path = "/api/cancerStudies",
    tag = "Clinical Attributes",
    responses(
        (status = 200, description = "Study ids, sorted", body = Vec<String>),
        (status = 503, description = "Metadata source unresponsive", body = ApiError),
    ),
)]
pub async fn list_cancer_studies(
    State(service): State<DictionaryService>,
) -> ApiResult<Json<Vec<String>>> {
    Ok(Json(service.cancer_studies()?))
}

// ============================================================================
// ROUTER SETUP
// ============================================================================

/// Create the clinical attribute routes.
///
/// Static paths are registered alongside `/api/:column_header`; the router
/// prefers them over the capture.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/api", get(list_attributes).post(attributes_by_column_headers))
        .route("/api/", get(list_attributes).post(attributes_by_column_headers))
        .route("/api/search", post(search_attributes))
        .route("/api/cancerStudies", get(list_cancer_studies))
        .route("/api/:column_header", get(get_attribute))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_request_defaults() {
        let req: SearchRequest =
            serde_json::from_str(r#"{"searchTerms": ["age"]}"#).unwrap();
        assert_eq!(req.search_terms, vec!["age"]);
        assert_eq!(req.attribute_type, None);
        assert!(!req.inclusive_search);
    }

    #[test]
    fn test_search_request_camel_case() {
        let req: SearchRequest = serde_json::from_str(
            r#"{"searchTerms": ["age", "stage"], "attributeType": "PATIENT", "inclusiveSearch": true}"#,
        )
        .unwrap();
        assert_eq!(req.attribute_type.as_deref(), Some("PATIENT"));
        assert!(req.inclusive_search);
    }

    #[test]
    fn test_blank_study_is_ignored() {
        let query = StudyQuery {
            cancer_study: Some("  ".to_string()),
        };
        assert_eq!(query.study(), None);

        let query = StudyQuery {
            cancer_study: Some("mskimpact".to_string()),
        };
        assert_eq!(query.study(), Some("mskimpact"));
    }
}
