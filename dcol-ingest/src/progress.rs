//! Goal progress over the metadata store
//!
//! Everything here is read-only: [`ProgressAggregator::summarize`] takes one
//! snapshot and hands it to the pure [`summarize_records`].

use std::collections::BTreeMap;
use std::sync::Arc;

use dcol_common::time::{hour_bucket, hours_between};

use crate::metadata::MetadataStore;
use crate::models::{ConversationRecord, HourlyBucket, ProgressReport, RoleBreakdown};

/// Read-only view producing [`ProgressReport`]s
#[derive(Debug, Clone)]
pub struct ProgressAggregator {
    store: Arc<MetadataStore>,
}

impl ProgressAggregator {
    pub fn new(store: Arc<MetadataStore>) -> Self {
        Self { store }
    }

    pub async fn summarize(&self, target_hours: f64) -> ProgressReport {
        let records = self.store.all_records().await;
        summarize_records(&records, target_hours)
    }
}

/// Compute the progress report for a snapshot of records
///
/// Zero-denominator cases yield zero instead of a division fault. A target
/// of zero or less counts as reached.
pub fn summarize_records(records: &[ConversationRecord], target_hours: f64) -> ProgressReport {
    let total_conversations = records.len();
    let total_duration_seconds: f64 = records.iter().map(|r| r.totals.duration_seconds).sum();
    let total_size_bytes: u64 = records.iter().map(|r| r.totals.size_bytes).sum();
    let total_duration_hours = total_duration_seconds / 3600.0;

    let average_duration_per_conversation = if total_conversations > 0 {
        total_duration_seconds / total_conversations as f64
    } else {
        0.0
    };

    let target_reached = total_duration_hours >= target_hours;
    let progress_percentage = if target_hours <= 0.0 {
        100.0
    } else {
        (100.0 * total_duration_hours / target_hours).min(100.0)
    };
    let remaining_hours = (target_hours - total_duration_hours).max(0.0);

    let average_hours = average_duration_per_conversation / 3600.0;
    let estimated_conversations_needed = if target_reached || average_hours <= 0.0 {
        0
    } else {
        (remaining_hours / average_hours).ceil() as u64
    };

    let first_timestamp = records.iter().map(|r| r.timestamp).min();
    let last_timestamp = records.iter().map(|r| r.timestamp).max();

    let elapsed_hours = match (first_timestamp, last_timestamp) {
        (Some(first), Some(last)) if total_conversations >= 2 => hours_between(&first, &last),
        _ => 0.0,
    };
    let (collection_rate, audio_collection_rate) = if elapsed_hours > 0.0 {
        (
            total_conversations as f64 / elapsed_hours,
            total_duration_hours / elapsed_hours,
        )
    } else {
        (0.0, 0.0)
    };

    ProgressReport {
        target_hours,
        total_conversations,
        total_duration_seconds,
        total_duration_hours,
        total_size_bytes,
        average_duration_per_conversation,
        remaining_hours,
        progress_percentage,
        estimated_conversations_needed,
        collection_rate,
        audio_collection_rate,
        target_reached,
        first_timestamp,
        last_timestamp,
        by_role: role_breakdown(records),
    }
}

fn role_breakdown(records: &[ConversationRecord]) -> BTreeMap<String, RoleBreakdown> {
    let mut by_role: BTreeMap<String, RoleBreakdown> = BTreeMap::new();
    for (role, unit) in records.iter().flat_map(|r| r.units.iter()) {
        let entry = by_role.entry(role.clone()).or_default();
        entry.units += 1;
        entry.size_bytes += unit.size_bytes;
        entry.duration_seconds += unit.duration_seconds;
    }
    by_role
}

/// Bucket records by the UTC hour of their timestamp
pub fn hourly_breakdown(records: &[ConversationRecord]) -> BTreeMap<String, HourlyBucket> {
    let mut buckets: BTreeMap<String, HourlyBucket> = BTreeMap::new();
    for record in records {
        let bucket = buckets.entry(hour_bucket(&record.timestamp)).or_default();
        bucket.conversations += 1;
        bucket.duration_hours += record.totals.duration_hours();
        bucket.size_bytes += record.totals.size_bytes;
    }
    buckets
}
