//! CDD API Server Entry Point
//!
//! Loads configuration, wires the metadata cache to the repository and the
//! alert sink, starts the refresh job, and serves the REST API until Ctrl-C.

use std::sync::Arc;

use cdd_api::telemetry::{init_tracing, TelemetryConfig};
use cdd_api::{
    build_notifier, cache_refresh_task, create_router, ApiError, ApiResult, AppState,
    HttpMetadataSource, ServiceConfig,
};
use cdd_cache::MetadataCache;
use cdd_core::SystemClock;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::default();
    init_tracing(&telemetry_config)?;

    let config = ServiceConfig::from_env()?;

    let source = Arc::new(HttpMetadataSource::new(&config.source)?);
    tracing::info!(
        defaults_url = %source.defaults_url(),
        overrides_url = %source.overrides_url(),
        "Using metadata repository"
    );

    let cache = Arc::new(MetadataCache::new(
        source,
        Arc::new(SystemClock),
        config.cache.clone(),
    ));
    let sink = build_notifier(&config.notifier)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let refresh_job = tokio::spawn(cache_refresh_task(
        cache.clone(),
        sink,
        config.refresh.clone(),
        shutdown_rx,
    ));

    let app = create_router(AppState::new(cache), &config.api);

    let addr = config.api.socket_addr()?;
    tracing::info!(%addr, service = %telemetry_config.service_name, "Starting CDD API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            tracing::info!("Shutdown signal received");
        })
        .await
        .map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;

    // The job exits on its own if the receiver sees the sender dropped.
    let _ = shutdown_tx.send(true);
    match refresh_job.await {
        Ok(metrics) => {
            let counters = metrics.snapshot();
            tracing::info!(
                cycles = counters.cycles,
                refresh_failures = counters.refresh_failures,
                "Cache refresh job stopped"
            );
        }
        Err(e) => tracing::error!(error = %e, "Cache refresh job panicked"),
    }

    Ok(())
}
