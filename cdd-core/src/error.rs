//! Error types for clinical data dictionary operations

use std::time::Duration;
use thiserror::Error;

/// The metadata repository could not produce data.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("Request to {operation} failed: {reason}")]
    Transport { operation: String, reason: String },

    #[error("{operation} returned status {status}: {message}")]
    Status {
        operation: String,
        status: u16,
        message: String,
    },

    #[error("Failed to parse {operation} response: {reason}")]
    Parse { operation: String, reason: String },

    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },
}

/// A cache refresh was aborted. Nothing was published.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RefreshError {
    #[error("Failed to pull clinical attributes from repository: {0}")]
    DefaultsUnavailable(SourceError),

    #[error("Failed to pull overrides from repository: {0}")]
    OverridesUnavailable(SourceError),
}

impl RefreshError {
    pub fn source_error(&self) -> &SourceError {
        match self {
            RefreshError::DefaultsUnavailable(e) | RefreshError::OverridesUnavailable(e) => e,
        }
    }
}

/// Expected outcomes of a dictionary query that carry no data.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("Clinical attribute metadata source is unresponsive")]
    SourceUnresponsive,

    #[error("Clinical attribute(s) not found: {}", column_headers.join(", "))]
    AttributesNotFound { column_headers: Vec<String> },

    #[error("Cancer study not found: {study_id}")]
    StudyNotFound { study_id: String },

    #[error("No clinical attributes match search terms: {}", search_terms.join(", "))]
    NoSearchMatches { search_terms: Vec<String> },
}

/// Operator alert delivery failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NotifyError {
    #[error("Notification delivery failed: {reason}")]
    Delivery { reason: String },

    #[error("Notification rejected with status {status}")]
    Rejected { status: u16 },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all dictionary errors.
#[derive(Debug, Clone, Error)]
pub enum CddError {
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Refresh error: {0}")]
    Refresh(#[from] RefreshError),

    #[error("Lookup error: {0}")]
    Lookup(#[from] LookupError),

    #[error("Notify error: {0}")]
    Notify(#[from] NotifyError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for dictionary operations.
pub type CddResult<T> = Result<T, CddError>;

// =============================================================================
// TESTS
// =============================================================================
