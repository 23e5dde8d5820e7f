//! Remote audio fetcher
//!
//! Retrieves raw bytes for one audio unit over http/https. The request is
//! bounded by the configured timeout and never retried here; retry policy
//! belongs to the caller.

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Url};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use crate::error::FetchError;

const USER_AGENT: &str = concat!("dcol-ingest/", env!("CARGO_PKG_VERSION"));

/// Input codecs accepted for normalization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Mp3,
    Wav,
    Ogg,
    Flac,
    Aac,
    M4a,
}

impl AudioFormat {
    /// Map a declared MIME type; parameters such as `; charset=` are ignored
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            "audio/wav" | "audio/wave" | "audio/x-wav" | "audio/vnd.wave" => Some(AudioFormat::Wav),
            "audio/mpeg" | "audio/mp3" => Some(AudioFormat::Mp3),
            "audio/ogg" | "application/ogg" => Some(AudioFormat::Ogg),
            "audio/flac" | "audio/x-flac" => Some(AudioFormat::Flac),
            "audio/aac" | "audio/x-aac" => Some(AudioFormat::Aac),
            "audio/mp4" | "audio/x-m4a" | "audio/m4a" => Some(AudioFormat::M4a),
            _ => None,
        }
    }

    /// Sniff the container from magic bytes
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        let kind = infer::get(bytes)?;
        match kind.extension() {
            "wav" => Some(AudioFormat::Wav),
            "mp3" => Some(AudioFormat::Mp3),
            "ogg" => Some(AudioFormat::Ogg),
            "flac" => Some(AudioFormat::Flac),
            "aac" => Some(AudioFormat::Aac),
            "m4a" | "mp4" => Some(AudioFormat::M4a),
            _ => None,
        }
    }

    /// File extension, passed to the normalizer as a format hint
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Wav => "wav",
            AudioFormat::Ogg => "ogg",
            AudioFormat::Flac => "flac",
            AudioFormat::Aac => "aac",
            AudioFormat::M4a => "m4a",
        }
    }
}

/// Content types that say nothing about the payload
fn is_generic_content_type(mime: &str) -> bool {
    let essence = mime.split(';').next().unwrap_or_default().trim();
    essence.is_empty()
        || essence.eq_ignore_ascii_case("application/octet-stream")
        || essence.eq_ignore_ascii_case("binary/octet-stream")
}

/// Decide the input format from the declared header and the body
///
/// A specific declared type must be supported. A missing or generic type
/// falls back to sniffing the body.
pub fn detect_format(declared: Option<&str>, body: &[u8]) -> Result<AudioFormat, FetchError> {
    match declared {
        Some(mime) if !is_generic_content_type(mime) => AudioFormat::from_mime(mime)
            .ok_or_else(|| FetchError::UnsupportedContentType(mime.to_string())),
        _ => AudioFormat::sniff(body).ok_or_else(|| {
            FetchError::UnsupportedContentType(
                declared.unwrap_or("unknown (no recognizable signature)").to_string(),
            )
        }),
    }
}

/// Parse and check a source URL before any I/O
pub fn validate_url(raw: &str) -> Result<Url, FetchError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| FetchError::UnsupportedScheme(format!("{}: {}", raw, e)))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(FetchError::UnsupportedScheme(format!(
            "scheme '{}' not supported (http/https only)",
            other
        ))),
    }
}

/// Bytes of one fetched unit plus the detected input format
#[derive(Debug, Clone)]
pub struct FetchedAudio {
    pub bytes: Vec<u8>,
    pub format: AudioFormat,
    pub content_type: Option<String>,
}

/// HTTP fetcher with a bounded per-request timeout
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    timeout: Duration,
}

impl Fetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| FetchError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, timeout })
    }

    pub async fn fetch(&self, url: &str) -> Result<FetchedAudio, FetchError> {
        let url = validate_url(url)?;
        debug!(url = %url, "Fetching audio");

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| self.network_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        if response.content_length() == Some(0) {
            return Err(FetchError::EmptyBody);
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let bytes = response.bytes().await.map_err(|e| self.network_error(e))?;
        if bytes.is_empty() {
            return Err(FetchError::EmptyBody);
        }

        let format = detect_format(content_type.as_deref(), &bytes)?;
        debug!(
            url = %url,
            bytes = bytes.len(),
            format = format.extension(),
            "Fetched audio"
        );

        Ok(FetchedAudio {
            bytes: bytes.to_vec(),
            format,
            content_type,
        })
    }

    fn network_error(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Network(format!("timed out after {:?}: {}", self.timeout, err))
        } else {
            FetchError::Network(err.to_string())
        }
    }
}
