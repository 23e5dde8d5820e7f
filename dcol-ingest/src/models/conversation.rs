//! Audio units and conversation records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Role that must succeed for a conversation record to be written
pub const AGENT_ROLE: &str = "agent";
pub const CUSTOMER_ROLE: &str = "customer";

/// Deterministic storage file name for a unit
///
/// Pure function of the pair: re-acquiring the same pair targets the same file.
pub fn canonical_filename(conversation_id: &str, speaker_label: &str) -> String {
    format!("{}_{}.wav", conversation_id, speaker_label)
}

/// One stored speaker recording, measured after normalization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioUnit {
    pub conversation_id: String,
    pub speaker_label: String,
    pub source_url: String,
    pub file_path: PathBuf,
    pub size_bytes: u64,
    pub duration_seconds: f64,
}

impl AudioUnit {
    pub fn filename(&self) -> String {
        canonical_filename(&self.conversation_id, &self.speaker_label)
    }

    pub fn size_mb(&self) -> f64 {
        bytes_to_mb(self.size_bytes)
    }

    pub fn summary(&self) -> UnitSummary {
        UnitSummary {
            file_path: self.file_path.clone(),
            source_url: self.source_url.clone(),
            size_bytes: self.size_bytes,
            duration_seconds: self.duration_seconds,
        }
    }
}

/// Per-role entry inside a [`ConversationRecord`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitSummary {
    pub file_path: PathBuf,
    pub source_url: String,
    pub size_bytes: u64,
    pub duration_seconds: f64,
}

/// Cached sums over a record's units
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    pub size_bytes: u64,
    pub duration_seconds: f64,
}

impl Totals {
    pub fn duration_hours(&self) -> f64 {
        self.duration_seconds / 3600.0
    }
}

/// Metadata for one conversation, keyed by `conversation_id` in the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub conversation_id: String,
    pub timestamp: DateTime<Utc>,
    /// Speaker role → unit summary
    pub units: BTreeMap<String, UnitSummary>,
    pub totals: Totals,
}

impl ConversationRecord {
    /// Build a record from stored units; totals are derived here
    pub fn new<I>(conversation_id: impl Into<String>, timestamp: DateTime<Utc>, units: I) -> Self
    where
        I: IntoIterator<Item = AudioUnit>,
    {
        let units: BTreeMap<String, UnitSummary> = units
            .into_iter()
            .map(|unit| (unit.speaker_label.clone(), unit.summary()))
            .collect();

        let mut record = Self {
            conversation_id: conversation_id.into(),
            timestamp,
            units,
            totals: Totals::default(),
        };
        record.refresh_totals();
        record
    }

    /// Sum of unit sizes and durations
    pub fn computed_totals(&self) -> Totals {
        self.units.values().fold(Totals::default(), |acc, unit| Totals {
            size_bytes: acc.size_bytes + unit.size_bytes,
            duration_seconds: acc.duration_seconds + unit.duration_seconds,
        })
    }

    /// Overwrite the cached totals with values recomputed from `units`
    pub fn refresh_totals(&mut self) {
        self.totals = self.computed_totals();
    }

    pub fn unit(&self, role: &str) -> Option<&UnitSummary> {
        self.units.get(role)
    }
}

pub(crate) fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}
