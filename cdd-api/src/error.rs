//! Error Types for the CDD API
//!
//! This module defines error handling for the API layer:
//! - ApiError struct for structured error responses
//! - ErrorCode enum mapping each error category to an HTTP status
//! - Conversions from the domain errors in `cdd-core`
//!
//! All errors are serialized as JSON.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use cdd_core::{ConfigError, LookupError, RefreshError};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Request contains invalid input data
    InvalidInput,

    /// One or more requested clinical attributes do not exist
    ClinicalAttributeNotFound,

    /// Requested cancer study has no overrides
    CancerStudyNotFound,

    /// The cache has never been populated
    MetadataSourceUnresponsive,

    /// An operator-triggered refresh failed
    CacheRefreshFailed,

    /// Internal server error
    InternalError,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::InvalidInput => StatusCode::BAD_REQUEST,

            ErrorCode::ClinicalAttributeNotFound | ErrorCode::CancerStudyNotFound => {
                StatusCode::NOT_FOUND
            }

            ErrorCode::MetadataSourceUnresponsive | ErrorCode::CacheRefreshFailed => {
                StatusCode::SERVICE_UNAVAILABLE
            }

            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get a default message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::InvalidInput => "Invalid input data",
            ErrorCode::ClinicalAttributeNotFound => "Clinical attribute not found",
            ErrorCode::CancerStudyNotFound => "Cancer study not found",
            ErrorCode::MetadataSourceUnresponsive => {
                "Clinical attribute metadata source is unresponsive"
            }
            ErrorCode::CacheRefreshFailed => "Failed to refresh clinical attribute cache",
            ErrorCode::InternalError => "Internal server error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Structured error response returned by every endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ApiError {
    /// Error code categorizing the error
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Optional additional details (missing column headers, search terms)
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Create a new API error with the given code, using the default message.
    pub fn from_code(code: ErrorCode) -> Self {
        Self {
            code,
            message: code.default_message().to_string(),
            details: None,
        }
    }

    /// Add additional details to the error.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    // ========================================================================
    // Convenience constructors for common errors
    // ========================================================================

    /// Create an InvalidInput error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    /// Create an InternalError error.
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Create a ClinicalAttributeNotFound error listing every missing header.
    pub fn attributes_not_found(column_headers: &[String]) -> Self {
        Self::new(
            ErrorCode::ClinicalAttributeNotFound,
            format!(
                "Clinical attribute(s) not found: {}",
                column_headers.join(", ")
            ),
        )
        .with_details(serde_json::json!({ "column_headers": column_headers }))
    }

    /// Create a CancerStudyNotFound error.
    pub fn study_not_found(study_id: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::CancerStudyNotFound,
            format!("Cancer study {} not found", study_id),
        )
    }

    /// Create a MetadataSourceUnresponsive error.
    pub fn source_unresponsive() -> Self {
        Self::from_code(ErrorCode::MetadataSourceUnresponsive)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// AXUM INTEGRATION
// ============================================================================

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self);
        (status, body).into_response()
    }
}

// ============================================================================
// CONVERSIONS FROM DOMAIN ERRORS
// ============================================================================

impl From<LookupError> for ApiError {
    fn from(err: LookupError) -> Self {
        match err {
            LookupError::SourceUnresponsive => ApiError::source_unresponsive(),
            LookupError::AttributesNotFound { column_headers } => {
                ApiError::attributes_not_found(&column_headers)
            }
            LookupError::StudyNotFound { study_id } => ApiError::study_not_found(study_id),
            LookupError::NoSearchMatches { search_terms } => {
                let message = no_matches_message(&search_terms);
                ApiError::new(ErrorCode::ClinicalAttributeNotFound, message)
                    .with_details(serde_json::json!({ "search_terms": search_terms }))
            }
        }
    }
}

fn no_matches_message(search_terms: &[String]) -> String {
    format!(
        "No clinical attributes match search terms: {}",
        search_terms.join(", ")
    )
}

impl From<RefreshError> for ApiError {
    fn from(err: RefreshError) -> Self {
        tracing::error!(error = %err, "Operator cache refresh failed");
        ApiError::new(ErrorCode::CacheRefreshFailed, err.to_string())
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        ApiError::internal_error(format!("Invalid configuration: {}", err))
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("JSON serialization error: {:?}", err);
        ApiError::invalid_input(format!("Invalid JSON: {}", err))
    }
}

// ============================================================================
// RESULT TYPE ALIAS
// ============================================================================

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_status_mapping() {
        assert_eq!(ErrorCode::InvalidInput.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ErrorCode::ClinicalAttributeNotFound.status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(ErrorCode::CancerStudyNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ErrorCode::MetadataSourceUnresponsive.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ErrorCode::CacheRefreshFailed.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ErrorCode::InternalError.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_attributes_not_found_carries_all_headers() {
        let err: ApiError = LookupError::AttributesNotFound {
            column_headers: vec!["FOO".to_string(), "BAR".to_string()],
        }
        .into();

        assert_eq!(err.code, ErrorCode::ClinicalAttributeNotFound);
        assert!(err.message.contains("FOO, BAR"));
        assert_eq!(
            err.details,
            Some(serde_json::json!({ "column_headers": ["FOO", "BAR"] }))
        );
    }

    #[test]
    fn test_lookup_error_mapping() {
        let err: ApiError = LookupError::SourceUnresponsive.into();
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);

        let err: ApiError = LookupError::StudyNotFound {
            study_id: "nope".to_string(),
        }
        .into();
        assert_eq!(err.code, ErrorCode::CancerStudyNotFound);
        assert!(err.message.contains("nope"));

        let err: ApiError = LookupError::NoSearchMatches {
            search_terms: vec!["xyz".to_string()],
        }
        .into();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_refresh_error_maps_to_service_unavailable() {
        let err: ApiError = RefreshError::OverridesUnavailable(cdd_core::SourceError::Transport {
            operation: "fetch_overrides".to_string(),
            reason: "connection refused".to_string(),
        })
        .into();
        assert_eq!(err.code, ErrorCode::CacheRefreshFailed);
        assert!(err.message.contains("overrides"));
    }

    #[test]
    fn test_error_serialization() -> Result<(), serde_json::Error> {
        let err = ApiError::study_not_found("mskimpact");
        let json = serde_json::to_string(&err)?;

        assert!(json.contains("CANCER_STUDY_NOT_FOUND"));
        assert!(!json.contains("details"));

        let deserialized: ApiError = serde_json::from_str(&json)?;
        assert_eq!(deserialized, err);
        Ok(())
    }
}
