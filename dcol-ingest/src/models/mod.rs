//! Data models for dcol-ingest
//!
//! - Audio units and conversation records (persisted metadata)
//! - Acquisition requests and per-unit outcomes
//! - Progress reports derived from the metadata store

pub mod acquisition;
pub mod conversation;
pub mod progress;

pub use acquisition::{ConversationOutcome, ConversationRequest, ConversationStatus, UnitOutcome};
pub use conversation::{canonical_filename, AudioUnit, ConversationRecord, Totals, UnitSummary};
pub use progress::{HourlyBucket, ProgressReport, RoleBreakdown};
