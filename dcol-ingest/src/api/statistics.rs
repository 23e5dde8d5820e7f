//! GET /statistics

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::models::ProgressReport;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct StatisticsQuery {
    pub target_hours: Option<f64>,
}

impl StatisticsQuery {
    /// Requested target, or `default` when absent
    pub fn target_or(&self, default: f64) -> Result<f64, ApiError> {
        match self.target_hours {
            Some(hours) if !hours.is_finite() || hours < 0.0 => Err(ApiError::BadRequest(
                "target_hours must be a finite, non-negative number".to_string(),
            )),
            Some(hours) => Ok(hours),
            None => Ok(default),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatisticsResponse {
    pub generated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub report: ProgressReport,
    pub total_size_mb: f64,
}

pub async fn statistics(
    State(state): State<AppState>,
    Query(query): Query<StatisticsQuery>,
) -> ApiResult<Json<StatisticsResponse>> {
    let target_hours = query.target_or(state.collector.config().default_target_hours)?;
    let report = state.collector.progress(target_hours).await;

    Ok(Json(StatisticsResponse {
        generated_at: Utc::now(),
        total_size_mb: (report.total_size_mb() * 100.0).round() / 100.0,
        report,
    }))
}

pub fn statistics_routes() -> Router<AppState> {
    Router::new().route("/statistics", get(statistics))
}
