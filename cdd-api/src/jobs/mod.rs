//! Background Jobs for the CDD API
//!
//! - `cache_refresh`: keeps the clinical attribute cache within its
//!   staleness window and alerts an operator when it cannot
//!
//! # Usage
//!
//! ```ignore
//! use cdd_api::jobs::{cache_refresh_task, RefreshJobConfig};
//! use tokio::sync::watch;
//!
//! let (shutdown_tx, shutdown_rx) = watch::channel(false);
//! let job = tokio::spawn(cache_refresh_task(
//!     Arc::clone(&cache),
//!     sink,
//!     RefreshJobConfig::default(),
//!     shutdown_rx,
//! ));
//!
//! // On shutdown
//! let _ = shutdown_tx.send(true);
//! let metrics = job.await?;
//! ```

pub mod cache_refresh;

pub use cache_refresh::{
    cache_refresh_task, run_validation, RefreshJobConfig, RefreshJobMetrics, RefreshJobSnapshot,
};
