//! Acquisition endpoints
//!
//! POST /download/single and POST /download/dual take form-encoded bodies.

use axum::{extract::State, http::StatusCode, routing::post, Form, Json, Router};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

use crate::error::{AcquisitionError, ApiError, ApiResult, MetadataError};
use crate::models::conversation::bytes_to_mb;
use crate::models::{AudioUnit, ConversationRequest, ConversationStatus, UnitOutcome};
use crate::storage::validate_name_component;
use crate::AppState;

fn default_speaker_label() -> String {
    "speaker".to_string()
}

/// Form body of POST /download/single
#[derive(Debug, Deserialize)]
pub struct SingleDownloadForm {
    pub conversation_id: String,
    pub audio_url: String,
    #[serde(default = "default_speaker_label")]
    pub speaker_label: String,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl SingleDownloadForm {
    pub fn validate(&self) -> Result<(), ApiError> {
        validate_identifier("conversation_id", &self.conversation_id)?;
        validate_identifier("speaker_label", &self.speaker_label)?;
        validate_url_field("audio_url", &self.audio_url)?;
        validate_timeout(self.timeout_secs)?;
        Ok(())
    }
}

/// Form body of POST /download/dual
#[derive(Debug, Deserialize)]
pub struct DualDownloadForm {
    pub conversation_id: String,
    pub audio_url_agent: String,
    #[serde(default)]
    pub audio_url_customer: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl DualDownloadForm {
    pub fn validate(&self) -> Result<(), ApiError> {
        validate_identifier("conversation_id", &self.conversation_id)?;
        validate_url_field("audio_url_agent", &self.audio_url_agent)?;
        validate_timeout(self.timeout_secs)?;
        Ok(())
    }

    /// Typed request; a blank customer URL means "agent only"
    pub fn into_request(self) -> ConversationRequest {
        ConversationRequest {
            conversation_id: self.conversation_id.trim().to_string(),
            agent_url: self.audio_url_agent.trim().to_string(),
            customer_url: self
                .audio_url_customer
                .map(|url| url.trim().to_string())
                .filter(|url| !url.is_empty()),
            timeout: self.timeout_secs.map(Duration::from_secs),
        }
    }
}

fn validate_identifier(field: &str, value: &str) -> Result<(), ApiError> {
    validate_name_component(value.trim())
        .map_err(|_| ApiError::BadRequest(format!("{} is empty or not a valid file name component", field)))
}

fn validate_url_field(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::BadRequest(format!("{} is required", field)));
    }
    Ok(())
}

fn validate_timeout(timeout_secs: Option<u64>) -> Result<(), ApiError> {
    match timeout_secs {
        Some(0) => Err(ApiError::BadRequest("timeout_secs must be positive".to_string())),
        _ => Ok(()),
    }
}

/// Response of POST /download/single
#[derive(Debug, Serialize)]
pub struct SingleDownloadResponse {
    pub status: String,
    pub conversation_id: String,
    pub speaker_label: String,
    pub filename: String,
    pub filepath: String,
    pub file_size_mb: f64,
    pub duration_seconds: f64,
}

impl From<AudioUnit> for SingleDownloadResponse {
    fn from(unit: AudioUnit) -> Self {
        Self {
            status: "success".to_string(),
            filename: unit.filename(),
            filepath: unit.file_path.display().to_string(),
            file_size_mb: round2(unit.size_mb()),
            duration_seconds: unit.duration_seconds,
            conversation_id: unit.conversation_id,
            speaker_label: unit.speaker_label,
        }
    }
}

/// One entry of `downloads` in the dual response
#[derive(Debug, Serialize)]
pub struct UnitReport {
    pub speaker_label: String,
    pub status: String,
    pub source_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filepath: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size_mb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&UnitOutcome> for UnitReport {
    fn from(outcome: &UnitOutcome) -> Self {
        let mut report = Self {
            speaker_label: outcome.speaker_label.clone(),
            status: "failed".to_string(),
            source_url: outcome.source_url.clone(),
            filename: None,
            filepath: None,
            file_size_mb: None,
            duration_seconds: None,
            error_kind: None,
            error: None,
        };

        match &outcome.result {
            Ok(unit) => {
                report.status = "success".to_string();
                report.filename = Some(unit.filename());
                report.filepath = Some(unit.file_path.display().to_string());
                report.file_size_mb = Some(round2(bytes_to_mb(unit.size_bytes)));
                report.duration_seconds = Some(unit.duration_seconds);
            }
            Err(e) => {
                report.error_kind = Some(e.kind().to_string());
                report.error = Some(e.to_string());
            }
        }
        report
    }
}

/// Response of POST /download/dual
#[derive(Debug, Serialize)]
pub struct DualDownloadResponse {
    pub status: ConversationStatus,
    pub conversation_id: String,
    pub downloads: Vec<UnitReport>,
    pub total_files: usize,
    pub metadata_tracked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata_error: Option<String>,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// POST /download/single
///
/// Stores one unit without recording metadata.
pub async fn download_single(
    State(state): State<AppState>,
    Form(form): Form<SingleDownloadForm>,
) -> ApiResult<Json<SingleDownloadResponse>> {
    form.validate()?;

    let conversation_id = form.conversation_id.trim();
    let speaker_label = form.speaker_label.trim();
    info!(conversation_id, speaker = speaker_label, "Single download requested");

    let result = state
        .collector
        .acquire_unit(
            conversation_id,
            speaker_label,
            form.audio_url.trim(),
            form.timeout_secs.map(Duration::from_secs),
        )
        .await;

    match result {
        Ok(unit) => Ok(Json(unit.into())),
        Err(e) => {
            state
                .record_error(format!("{}/{}: {}", conversation_id, speaker_label, e))
                .await;
            Err(e.into())
        }
    }
}

/// POST /download/dual
///
/// 200 for success and partial outcomes. A failed outcome keeps the same body
/// but carries the status of its cause: 4xx for a unit fault, 5xx when the
/// metadata append failed.
pub async fn download_dual(
    State(state): State<AppState>,
    Form(form): Form<DualDownloadForm>,
) -> ApiResult<(StatusCode, Json<DualDownloadResponse>)> {
    form.validate()?;
    let request = form.into_request();
    info!(
        conversation_id = %request.conversation_id,
        with_customer = request.customer_url.is_some(),
        "Dual download requested"
    );

    let outcome = state.collector.acquire_conversation(request).await;

    let status_code = match outcome.status {
        ConversationStatus::Success | ConversationStatus::Partial => StatusCode::OK,
        ConversationStatus::Failed => failure_status(
            outcome.metadata_error.as_ref(),
            outcome.units.iter().find_map(UnitOutcome::error),
        ),
    };

    if let Some(e) = &outcome.metadata_error {
        state
            .record_error(format!("{}: {}", outcome.conversation_id, e))
            .await;
    } else if let Some(e) = outcome.units.iter().find_map(UnitOutcome::error) {
        state
            .record_error(format!("{}: {}", outcome.conversation_id, e))
            .await;
    }

    let response = DualDownloadResponse {
        status: outcome.status,
        downloads: outcome.units.iter().map(UnitReport::from).collect(),
        total_files: outcome.total_files(),
        metadata_tracked: outcome.metadata_tracked(),
        metadata_error: outcome.metadata_error.as_ref().map(|e| e.to_string()),
        conversation_id: outcome.conversation_id,
    };

    Ok((status_code, Json(response)))
}

fn failure_status(
    metadata_error: Option<&MetadataError>,
    unit_error: Option<&AcquisitionError>,
) -> StatusCode {
    match (metadata_error, unit_error) {
        (Some(e), _) => e.status_code(),
        (None, Some(e)) => e.status_code(),
        (None, None) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn acquisition_routes() -> Router<AppState> {
    Router::new()
        .route("/download/single", post(download_single))
        .route("/download/dual", post(download_dual))
}
