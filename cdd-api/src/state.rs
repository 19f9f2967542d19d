//! Shared application state for Axum routers.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::FromRef;
use cdd_cache::MetadataCache;

use crate::service::DictionaryService;

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    pub service: DictionaryService,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(cache: Arc<MetadataCache>) -> Self {
        Self {
            service: DictionaryService::new(cache),
            start_time: Instant::now(),
        }
    }
}

impl FromRef<AppState> for DictionaryService {
    fn from_ref(state: &AppState) -> Self {
        state.service.clone()
    }
}

impl FromRef<AppState> for Instant {
    fn from_ref(state: &AppState) -> Self {
        state.start_time
    }
}
