//! GET /storage/info, GET /storage/reconcile

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::error::{ApiError, ApiResult};
use crate::models::conversation::bytes_to_mb;
use crate::reconcile::ReconciliationReport;
use crate::storage::StoredFileInfo;
use crate::AppState;

/// Listing is truncated to this many files in the response
const MAX_LISTED_FILES: usize = 50;

#[derive(Debug, Serialize)]
pub struct StorageInfoResponse {
    pub storage_directory: String,
    pub total_files: usize,
    pub total_size_bytes: u64,
    pub total_size_mb: f64,
    pub files: Vec<StoredFileInfo>,
}

pub async fn storage_info(State(state): State<AppState>) -> ApiResult<Json<StorageInfoResponse>> {
    let collector = state.collector.clone();
    let listing = tokio::task::spawn_blocking(move || collector.storage_listing())
        .await
        .map_err(|e| ApiError::Internal(format!("listing task failed: {}", e)))?
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(StorageInfoResponse {
        storage_directory: listing.storage_directory.display().to_string(),
        total_files: listing.total_files,
        total_size_bytes: listing.total_size_bytes,
        total_size_mb: (bytes_to_mb(listing.total_size_bytes) * 100.0).round() / 100.0,
        files: listing.files.into_iter().take(MAX_LISTED_FILES).collect(),
    }))
}

/// Files with no record and records with no file
pub async fn storage_reconcile(
    State(state): State<AppState>,
) -> ApiResult<Json<ReconciliationReport>> {
    let report = state
        .collector
        .reconcile()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(report))
}

pub fn storage_routes() -> Router<AppState> {
    Router::new()
        .route("/storage/info", get(storage_info))
        .route("/storage/reconcile", get(storage_reconcile))
}
