//! Canonical audio storage
//!
//! Files live flat under the storage root as `{conversation_id}_{speaker_label}.wav`.
//! Each write goes to a temp file in the same directory and is renamed onto
//! the final path, so readers see either no file or a complete one. A second
//! write to the same pair replaces the first.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::StorageError;
use crate::models::canonical_filename;

/// Reject identifiers that could escape the storage root or hide the file
pub fn validate_name_component(value: &str) -> Result<(), StorageError> {
    let invalid = value.is_empty()
        || value.starts_with('.')
        || value.contains(['/', '\\', '\0'])
        || value.contains("..");

    if invalid {
        Err(StorageError::InvalidName(value.to_string()))
    } else {
        Ok(())
    }
}

/// Location and measured size of a stored unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub file_path: PathBuf,
    pub size_bytes: u64,
}

/// One entry of [`StorageListing`]
#[derive(Debug, Clone, Serialize)]
pub struct StoredFileInfo {
    pub filename: String,
    pub size_bytes: u64,
    pub modified: Option<DateTime<Utc>>,
}

/// Read-only view of the storage root
#[derive(Debug, Clone, Serialize)]
pub struct StorageListing {
    pub storage_directory: PathBuf,
    pub total_files: usize,
    pub total_size_bytes: u64,
    /// Sorted by file name
    pub files: Vec<StoredFileInfo>,
}

/// Writes canonical WAV files under a storage root
#[derive(Debug, Clone)]
pub struct StorageWriter {
    root: PathBuf,
}

impl StorageWriter {
    /// Create the writer, creating the storage root if needed
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .map_err(|e| StorageError::from_io(&e, &format!("create {}", root.display())))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Deterministic final path for a unit
    pub fn path_for(&self, conversation_id: &str, speaker_label: &str) -> Result<PathBuf, StorageError> {
        validate_name_component(conversation_id)?;
        validate_name_component(speaker_label)?;
        Ok(self.root.join(canonical_filename(conversation_id, speaker_label)))
    }

    /// Atomically write `wav_bytes` to the unit's deterministic path
    ///
    /// The temp file is removed on every failure path (dropped `NamedTempFile`).
    pub fn store(
        &self,
        conversation_id: &str,
        speaker_label: &str,
        wav_bytes: &[u8],
    ) -> Result<StoredFile, StorageError> {
        let final_path = self.path_for(conversation_id, speaker_label)?;

        let mut tmp = tempfile::Builder::new()
            .prefix(&format!(".{}_{}.", conversation_id, speaker_label))
            .suffix(".tmp")
            .tempfile_in(&self.root)
            .map_err(|e| StorageError::from_io(&e, "create temp file"))?;

        tmp.write_all(wav_bytes)
            .map_err(|e| StorageError::from_io(&e, "write temp file"))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| StorageError::from_io(&e, "sync temp file"))?;

        tmp.persist(&final_path).map_err(|e| {
            StorageError::RenameFailed(format!("{}: {}", final_path.display(), e.error))
        })?;

        // What this call wrote; a later same-path rename may already have replaced it
        let size_bytes = wav_bytes.len() as u64;

        debug!(
            conversation_id,
            speaker = speaker_label,
            path = %final_path.display(),
            size_bytes,
            "Stored audio file"
        );

        Ok(StoredFile {
            file_path: final_path,
            size_bytes,
        })
    }

    /// Enumerate stored WAV files with their aggregate size
    ///
    /// Derived from the directory alone; independent of the metadata store.
    pub fn listing(&self) -> Result<StorageListing, StorageError> {
        listing_of(&self.root)
    }
}

/// List canonical WAV files under `root` without creating anything
///
/// A missing root lists as empty. Hidden temp files are skipped.
pub fn listing_of(root: &Path) -> Result<StorageListing, StorageError> {
    let mut files = Vec::new();

    if root.is_dir() {
        for entry in WalkDir::new(root).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| StorageError::Io(format!("list storage: {}", e)))?;
            if !entry.file_type().is_file() {
                continue;
            }

            let filename = entry.file_name().to_string_lossy().to_string();
            if filename.starts_with('.') || !filename.ends_with(".wav") {
                continue;
            }

            let metadata = entry
                .metadata()
                .map_err(|e| StorageError::Io(format!("stat {}: {}", filename, e)))?;

            files.push(StoredFileInfo {
                filename,
                size_bytes: metadata.len(),
                modified: metadata.modified().ok().map(DateTime::<Utc>::from),
            });
        }
    }

    files.sort_by(|a, b| a.filename.cmp(&b.filename));

    Ok(StorageListing {
        storage_directory: root.to_path_buf(),
        total_files: files.len(),
        total_size_bytes: files.iter().map(|f| f.size_bytes).sum(),
        files,
    })
}
