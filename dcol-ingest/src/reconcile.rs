//! Storage directory versus metadata store
//!
//! Files are matched by name. A record's unit points at its stored file
//! through `file_path`; when that path has no file name the canonical
//! `{conversation_id}_{speaker_label}.wav` is assumed.

use serde::Serialize;
use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::models::{canonical_filename, ConversationRecord};
use crate::storage::StorageListing;

/// A unit recorded in metadata whose file is absent from storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingFile {
    pub conversation_id: String,
    pub speaker_label: String,
    pub filename: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationReport {
    pub storage_directory: PathBuf,
    pub files_on_disk: usize,
    pub files_referenced: usize,
    /// Stored files no record points at
    pub untracked_files: Vec<String>,
    /// Record units with no stored file
    pub missing_files: Vec<MissingFile>,
}

impl ReconciliationReport {
    pub fn is_consistent(&self) -> bool {
        self.untracked_files.is_empty() && self.missing_files.is_empty()
    }
}

/// Compare a storage listing with the records that should describe it
pub fn reconcile(listing: &StorageListing, records: &[ConversationRecord]) -> ReconciliationReport {
    let on_disk: BTreeSet<&str> = listing.files.iter().map(|f| f.filename.as_str()).collect();

    let mut referenced = BTreeSet::new();
    let mut missing_files = Vec::new();

    for record in records {
        for (label, unit) in &record.units {
            let filename = unit
                .file_path
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_else(|| canonical_filename(&record.conversation_id, label));

            if !on_disk.contains(filename.as_str()) {
                missing_files.push(MissingFile {
                    conversation_id: record.conversation_id.clone(),
                    speaker_label: label.clone(),
                    filename: filename.clone(),
                });
            }
            referenced.insert(filename);
        }
    }

    let untracked_files = on_disk
        .iter()
        .filter(|name| !referenced.contains(**name))
        .map(|name| name.to_string())
        .collect();

    ReconciliationReport {
        storage_directory: listing.storage_directory.clone(),
        files_on_disk: listing.total_files,
        files_referenced: referenced.len(),
        untracked_files,
        missing_files,
    }
}

/// Console section printed by `dcol-analyze --reconcile`
pub fn render_reconciliation(report: &ReconciliationReport) -> String {
    let mut lines = vec![
        format!("Storage check:       {}", report.storage_directory.display()),
        format!(
            "Files on disk:       {} ({} referenced by metadata)",
            report.files_on_disk, report.files_referenced
        ),
    ];

    if report.is_consistent() {
        lines.push("Storage and metadata agree".to_string());
        return lines.join("\n");
    }

    if !report.untracked_files.is_empty() {
        lines.push(format!("Untracked files:     {}", report.untracked_files.len()));
        for name in &report.untracked_files {
            lines.push(format!("  {}", name));
        }
    }
    if !report.missing_files.is_empty() {
        lines.push(format!("Missing files:       {}", report.missing_files.len()));
        for missing in &report.missing_files {
            lines.push(format!(
                "  {} ({} of {})",
                missing.filename, missing.speaker_label, missing.conversation_id
            ));
        }
    }

    lines.join("\n")
}
