//! dcol-ingest library interface
//!
//! Pipeline components, the collector driving them, and the HTTP surface.
//! Exposed as a library so integration tests and `dcol-analyze` share them.

pub mod api;
pub mod collector;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod metadata;
pub mod models;
pub mod normalizer;
pub mod progress;
pub mod reconcile;
pub mod report;
pub mod storage;

pub use crate::collector::Collector;
pub use crate::config::IngestConfig;
pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub collector: Arc<Collector>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(collector: Arc<Collector>) -> Self {
        Self {
            collector,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    pub async fn record_error(&self, message: String) {
        *self.last_error.write().await = Some(message);
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::acquisition_routes())
        .merge(api::storage_routes())
        .merge(api::statistics_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
