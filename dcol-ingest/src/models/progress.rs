//! Progress report types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per speaker role totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RoleBreakdown {
    pub units: usize,
    pub size_bytes: u64,
    pub duration_seconds: f64,
}

/// Records created within one UTC hour
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HourlyBucket {
    pub conversations: usize,
    pub duration_hours: f64,
    pub size_bytes: u64,
}

/// Goal progress derived from one metadata snapshot
///
/// Rates and averages are reported as zero when they cannot be computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressReport {
    pub target_hours: f64,
    pub total_conversations: usize,
    pub total_duration_seconds: f64,
    pub total_duration_hours: f64,
    pub total_size_bytes: u64,
    /// Seconds per conversation
    pub average_duration_per_conversation: f64,
    pub remaining_hours: f64,
    pub progress_percentage: f64,
    pub estimated_conversations_needed: u64,
    /// Conversations per elapsed hour
    pub collection_rate: f64,
    /// Hours of audio per elapsed hour
    pub audio_collection_rate: f64,
    pub target_reached: bool,
    pub first_timestamp: Option<DateTime<Utc>>,
    pub last_timestamp: Option<DateTime<Utc>>,
    pub by_role: BTreeMap<String, RoleBreakdown>,
}

impl ProgressReport {
    pub fn total_size_mb(&self) -> f64 {
        super::conversation::bytes_to_mb(self.total_size_bytes)
    }
}
