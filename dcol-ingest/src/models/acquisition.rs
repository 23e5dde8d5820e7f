//! Acquisition requests and per-unit outcomes
//!
//! A dual acquisition collects one [`UnitOutcome`] per requested unit; the
//! caller decides from [`ConversationStatus`] whether partial success is enough.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::conversation::{AudioUnit, ConversationRecord, AGENT_ROLE};
use crate::error::{AcquisitionError, MetadataError};

/// Typed request for an agent + optional customer acquisition
#[derive(Debug, Clone)]
pub struct ConversationRequest {
    pub conversation_id: String,
    pub agent_url: String,
    pub customer_url: Option<String>,
    /// Per-unit budget; `None` uses the configured default
    pub timeout: Option<Duration>,
}

/// Overall result of a conversation acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    /// Every requested unit stored and the record appended
    Success,
    /// Agent stored and recorded, customer failed
    Partial,
    /// Agent failed, or the record could not be persisted
    Failed,
}

impl ConversationStatus {
    pub fn classify(units: &[UnitOutcome], metadata_failed: bool) -> Self {
        let agent_ok = units
            .iter()
            .any(|u| u.speaker_label == AGENT_ROLE && u.is_success());

        if !agent_ok || metadata_failed {
            ConversationStatus::Failed
        } else if units.iter().all(UnitOutcome::is_success) {
            ConversationStatus::Success
        } else {
            ConversationStatus::Partial
        }
    }
}

/// Result for one speaker unit
#[derive(Debug)]
pub struct UnitOutcome {
    pub speaker_label: String,
    pub source_url: String,
    pub result: Result<AudioUnit, AcquisitionError>,
}

impl UnitOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn unit(&self) -> Option<&AudioUnit> {
        self.result.as_ref().ok()
    }

    pub fn error(&self) -> Option<&AcquisitionError> {
        self.result.as_ref().err()
    }
}

/// Aggregate result of [`crate::collector::Collector::acquire_conversation`]
#[derive(Debug)]
pub struct ConversationOutcome {
    pub conversation_id: String,
    pub status: ConversationStatus,
    pub units: Vec<UnitOutcome>,
    /// Record appended to the metadata store, if any
    pub record: Option<ConversationRecord>,
    pub metadata_error: Option<MetadataError>,
}

impl ConversationOutcome {
    pub fn metadata_tracked(&self) -> bool {
        self.record.is_some()
    }

    pub fn total_files(&self) -> usize {
        self.units.iter().filter(|u| u.is_success()).count()
    }

    pub fn unit(&self, speaker_label: &str) -> Option<&UnitOutcome> {
        self.units.iter().find(|u| u.speaker_label == speaker_label)
    }
}
