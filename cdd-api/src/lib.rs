//! CDD API - Clinical Data Dictionary REST Service
//!
//! Serves clinical attribute metadata for cBioPortal from the in-memory
//! cache in `cdd-cache`. This crate supplies the concrete collaborators the
//! cache needs (an HTTP metadata repository client and a Slack alert sink),
//! the background job that keeps the cache fresh, and the axum routes that
//! turn lookups into JSON.

pub mod config;
pub mod constants;
pub mod error;
pub mod jobs;
pub mod notify;
pub mod openapi;
pub mod routes;
pub mod service;
pub mod source;
pub mod state;
pub mod telemetry;

// Re-export commonly used types
pub use config::{ApiConfig, NotifierConfig, ServiceConfig, SourceConfig};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use jobs::{cache_refresh_task, RefreshJobConfig, RefreshJobMetrics};
pub use notify::{build_notifier, SlackNotifier};
pub use openapi::ApiDoc;
pub use routes::create_router;
pub use service::{CacheStatus, DictionaryService, HeaderLookup};
pub use source::HttpMetadataSource;
pub use state::AppState;
