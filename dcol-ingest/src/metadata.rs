//! Durable conversation metadata store
//!
//! The store owns the only copy of the metadata document in this process.
//! Records live in insertion order with a `conversation_id` index. Every
//! mutation holds the write lock while the next document is written (temp
//! file + rename). The in-memory state only changes after that write succeeds.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};
use tracing::{debug, info, warn};

use crate::error::MetadataError;
use crate::models::ConversationRecord;

/// Records plus position index, always mutated together
#[derive(Debug, Clone, Default)]
struct StoreState {
    records: Vec<ConversationRecord>,
    index: HashMap<String, usize>,
}

impl StoreState {
    fn from_records(records: Vec<ConversationRecord>) -> Self {
        let mut state = Self::default();
        for mut record in records {
            record.refresh_totals();
            state.upsert(record);
        }
        state
    }

    /// Insert or replace; a replacement moves to the end as the newest record.
    /// Returns true when an existing record was replaced.
    fn upsert(&mut self, record: ConversationRecord) -> bool {
        let replaced = match self.index.remove(&record.conversation_id) {
            Some(position) => {
                self.records.remove(position);
                self.rebuild_index();
                true
            }
            None => false,
        };

        self.index
            .insert(record.conversation_id.clone(), self.records.len());
        self.records.push(record);
        replaced
    }

    fn rebuild_index(&mut self) {
        self.index = self
            .records
            .iter()
            .enumerate()
            .map(|(position, record)| (record.conversation_id.clone(), position))
            .collect();
    }

    fn get(&self, conversation_id: &str) -> Option<&ConversationRecord> {
        self.index
            .get(conversation_id)
            .and_then(|&position| self.records.get(position))
    }
}

/// Concurrency-safe, write-through metadata store
#[derive(Debug)]
pub struct MetadataStore {
    path: PathBuf,
    state: Arc<RwLock<StoreState>>,
    lock_timeout: Duration,
}

impl MetadataStore {
    /// Load the document at `path`, creating an empty one when missing
    pub fn open(path: impl Into<PathBuf>, lock_timeout: Duration) -> Result<Self, MetadataError> {
        let path = path.into();
        let records = if path.exists() {
            read_document(&path)?
        } else {
            info!("Creating metadata document: {}", path.display());
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| {
                    MetadataError::PersistFailed(format!("create {}: {}", parent.display(), e))
                })?;
            }
            write_document(&path, &[])?;
            Vec::new()
        };

        Ok(Self::with_records(path, records, lock_timeout))
    }

    /// Load the document at `path` without creating anything on disk
    ///
    /// A missing document yields an empty store. Used by offline analysis.
    pub fn open_without_create(
        path: impl Into<PathBuf>,
        lock_timeout: Duration,
    ) -> Result<Self, MetadataError> {
        let path = path.into();
        let records = if path.exists() {
            read_document(&path)?
        } else {
            warn!("Metadata document {} not found, treating as empty", path.display());
            Vec::new()
        };

        Ok(Self::with_records(path, records, lock_timeout))
    }

    fn with_records(path: PathBuf, records: Vec<ConversationRecord>, lock_timeout: Duration) -> Self {
        let state = StoreState::from_records(records);
        info!(
            records = state.records.len(),
            path = %path.display(),
            "Metadata store loaded"
        );
        Self {
            path,
            state: Arc::new(RwLock::new(state)),
            lock_timeout,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert or replace `record` keyed by `conversation_id`, then persist
    ///
    /// Returns true when an existing record was replaced. The commit runs on
    /// its own task holding the write guard, so dropping the returned future
    /// neither interrupts the write nor leaves memory ahead of the document.
    pub async fn append_record(&self, record: ConversationRecord) -> Result<bool, MetadataError> {
        let guard = tokio::time::timeout(self.lock_timeout, Arc::clone(&self.state).write_owned())
            .await
            .map_err(|_| MetadataError::LockTimeout(self.lock_timeout))?;

        tokio::spawn(commit_record(guard, self.path.clone(), record))
            .await
            .unwrap_or_else(|e| Err(MetadataError::PersistFailed(format!("commit task failed: {}", e))))
    }

    /// Consistent snapshot of every record in insertion order
    pub async fn all_records(&self) -> Vec<ConversationRecord> {
        self.state.read().await.records.clone()
    }

    pub async fn record_count(&self) -> usize {
        self.state.read().await.records.len()
    }

    /// Earliest record timestamp
    pub async fn first_timestamp(&self) -> Option<DateTime<Utc>> {
        self.state.read().await.records.iter().map(|r| r.timestamp).min()
    }

    /// Latest record timestamp
    pub async fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.state.read().await.records.iter().map(|r| r.timestamp).max()
    }

    pub async fn get(&self, conversation_id: &str) -> Option<ConversationRecord> {
        self.state.read().await.get(conversation_id).cloned()
    }

    pub async fn contains(&self, conversation_id: &str) -> bool {
        self.state.read().await.index.contains_key(conversation_id)
    }
}

/// Persist the next state, then swap it in; memory is untouched on failure
async fn commit_record(
    mut state: OwnedRwLockWriteGuard<StoreState>,
    path: PathBuf,
    record: ConversationRecord,
) -> Result<bool, MetadataError> {
    let conversation_id = record.conversation_id.clone();
    let mut next = (*state).clone();
    let replaced = next.upsert(record);

    let persisted = match serde_json::to_vec_pretty(&next.records) {
        Ok(bytes) => tokio::task::spawn_blocking(move || write_bytes_atomic(&path, &bytes))
            .await
            .unwrap_or_else(|e| {
                Err(MetadataError::PersistFailed(format!("persist task failed: {}", e)))
            }),
        Err(e) => Err(MetadataError::PersistFailed(format!("serialize: {}", e))),
    };

    if let Err(e) = persisted {
        warn!(
            conversation_id = %conversation_id,
            error = %e,
            "Metadata persist failed, record not applied"
        );
        return Err(e);
    }

    *state = next;
    debug!(
        conversation_id = %conversation_id,
        replaced,
        records = state.records.len(),
        "Metadata record persisted"
    );
    Ok(replaced)
}

fn read_document(path: &Path) -> Result<Vec<ConversationRecord>, MetadataError> {
    let content = std::fs::read(path)
        .map_err(|e| MetadataError::LoadFailed(format!("read {}: {}", path.display(), e)))?;

    if content.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }

    serde_json::from_slice(&content)
        .map_err(|e| MetadataError::LoadFailed(format!("parse {}: {}", path.display(), e)))
}

fn write_document(path: &Path, records: &[ConversationRecord]) -> Result<(), MetadataError> {
    let bytes = serde_json::to_vec_pretty(records)
        .map_err(|e| MetadataError::PersistFailed(format!("serialize: {}", e)))?;
    write_bytes_atomic(path, &bytes)
}

/// Replace `path` with `bytes` via a synced temp file in the same directory
fn write_bytes_atomic(path: &Path, bytes: &[u8]) -> Result<(), MetadataError> {
    let persist_err =
        |e: std::io::Error| MetadataError::PersistFailed(format!("{}: {}", path.display(), e));

    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(persist_err)?;
    tmp.write_all(bytes).map_err(persist_err)?;
    tmp.as_file().sync_all().map_err(persist_err)?;
    tmp.persist(path).map_err(|e| persist_err(e.error))?;
    Ok(())
}
