//! Error types for dcol-ingest
//!
//! One enum per pipeline stage, an [`AcquisitionError`] wrapping them for a
//! single audio unit, and [`ApiError`] for the HTTP surface.
//!
//! Fetch, conversion and storage failures are client faults (4xx).
//! Metadata failures are server faults (5xx).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

/// Fetcher errors
#[derive(Debug, Error)]
pub enum FetchError {
    /// URL did not parse or is not http/https
    #[error("Unsupported URL: {0}")]
    UnsupportedScheme(String),

    /// Connection failure or timeout
    #[error("Network error: {0}")]
    Network(String),

    /// Non-success HTTP status
    #[error("HTTP status {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Response body is empty")]
    EmptyBody,

    #[error("Unsupported content type: {0}")]
    UnsupportedContentType(String),
}

impl FetchError {
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::UnsupportedScheme(_) => "unsupported_scheme",
            FetchError::Network(_) => "network",
            FetchError::HttpStatus { .. } => "http_status",
            FetchError::EmptyBody => "empty_body",
            FetchError::UnsupportedContentType(_) => "unsupported_content_type",
        }
    }
}

/// Normalizer errors
#[derive(Debug, Error)]
pub enum ConversionError {
    /// Corrupt or unrecognized bitstream
    #[error("Undecodable input: {0}")]
    UndecodableInput(String),

    /// Decoding produced no samples
    #[error("Decoded audio has zero length")]
    ZeroLength,
}

impl ConversionError {
    pub fn kind(&self) -> &'static str {
        match self {
            ConversionError::UndecodableInput(_) => "undecodable_input",
            ConversionError::ZeroLength => "zero_length",
        }
    }
}

/// Storage writer errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Disk full: {0}")]
    DiskFull(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Temp file could not be moved onto the deterministic path
    #[error("Rename failed: {0}")]
    RenameFailed(String),

    /// Identifier or label would escape the storage root
    #[error("Invalid file name component: {0}")]
    InvalidName(String),

    #[error("Storage I/O error: {0}")]
    Io(String),
}

impl StorageError {
    pub fn kind(&self) -> &'static str {
        match self {
            StorageError::DiskFull(_) => "disk_full",
            StorageError::PermissionDenied(_) => "permission_denied",
            StorageError::RenameFailed(_) => "rename_failed",
            StorageError::InvalidName(_) => "invalid_name",
            StorageError::Io(_) => "storage_io",
        }
    }

    /// Classify a write-phase I/O error
    pub fn from_io(err: &std::io::Error, context: &str) -> Self {
        let message = format!("{}: {}", context, err);
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => StorageError::PermissionDenied(message),
            std::io::ErrorKind::StorageFull => StorageError::DiskFull(message),
            _ => StorageError::Io(message),
        }
    }
}

/// Metadata store errors
#[derive(Debug, Error)]
pub enum MetadataError {
    /// Durable write of the metadata document failed; in-memory state unchanged
    #[error("Metadata persist failed: {0}")]
    PersistFailed(String),

    #[error("Timed out after {0:?} waiting for metadata lock")]
    LockTimeout(Duration),

    /// Existing metadata document could not be read or parsed
    #[error("Metadata load failed: {0}")]
    LoadFailed(String),
}

impl MetadataError {
    pub fn kind(&self) -> &'static str {
        match self {
            MetadataError::PersistFailed(_) => "persist_failed",
            MetadataError::LockTimeout(_) => "lock_timeout",
            MetadataError::LoadFailed(_) => "load_failed",
        }
    }

    /// Server fault; a busy lock is reported as temporarily unavailable
    pub fn status_code(&self) -> StatusCode {
        match self {
            MetadataError::LockTimeout(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Failure of one acquisition step
#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Metadata(#[from] MetadataError),
}

impl AcquisitionError {
    pub fn kind(&self) -> &'static str {
        match self {
            AcquisitionError::Fetch(e) => e.kind(),
            AcquisitionError::Conversion(e) => e.kind(),
            AcquisitionError::Storage(e) => e.kind(),
            AcquisitionError::Metadata(e) => e.kind(),
        }
    }

    /// Whether the transport layer should report this as a client fault
    pub fn is_client_fault(&self) -> bool {
        !matches!(self, AcquisitionError::Metadata(_))
    }

    pub fn status_code(&self) -> StatusCode {
        if self.is_client_fault() {
            return StatusCode::BAD_REQUEST;
        }
        match self {
            AcquisitionError::Metadata(e) => e.status_code(),
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Acquisition failure, status depends on the failing stage
    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<MetadataError> for ApiError {
    fn from(err: MetadataError) -> Self {
        ApiError::Acquisition(AcquisitionError::Metadata(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST".to_string(), msg),
            ApiError::Acquisition(ref err) => (
                err.status_code(),
                err.kind().to_ascii_uppercase(),
                err.to_string(),
            ),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR".to_string(),
                msg,
            ),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_categories() {
        let fetch: AcquisitionError = FetchError::EmptyBody.into();
        assert!(fetch.is_client_fault());
        assert_eq!(fetch.status_code(), StatusCode::BAD_REQUEST);

        let conversion: AcquisitionError = ConversionError::ZeroLength.into();
        assert!(conversion.is_client_fault());

        let storage: AcquisitionError = StorageError::RenameFailed("x".into()).into();
        assert_eq!(storage.status_code(), StatusCode::BAD_REQUEST);

        let metadata: AcquisitionError = MetadataError::PersistFailed("disk".into()).into();
        assert!(!metadata.is_client_fault());
        assert_eq!(metadata.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let lock: AcquisitionError = MetadataError::LockTimeout(Duration::from_secs(1)).into();
        assert_eq!(lock.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_storage_error_classification() {
        let denied = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        assert_eq!(StorageError::from_io(&denied, "write").kind(), "permission_denied");

        let full = std::io::Error::new(std::io::ErrorKind::StorageFull, "full");
        assert_eq!(StorageError::from_io(&full, "write").kind(), "disk_full");

        let other = std::io::Error::new(std::io::ErrorKind::Other, "weird");
        assert_eq!(StorageError::from_io(&other, "write").kind(), "storage_io");
    }

    #[test]
    fn test_kind_passthrough() {
        let err: AcquisitionError = FetchError::UnsupportedContentType("text/html".into()).into();
        assert_eq!(err.kind(), "unsupported_content_type");
    }
}
