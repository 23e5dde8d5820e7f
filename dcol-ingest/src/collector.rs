//! Acquisition pipeline
//!
//! Drives Fetcher → Normalizer → StorageWriter for each unit and appends one
//! [`ConversationRecord`] per conversation once the agent unit is stored.
//! Units never share state; the metadata append is the only synchronization
//! point.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::IngestConfig;
use crate::error::{AcquisitionError, ConversionError, FetchError, StorageError};
use crate::fetcher::Fetcher;
use crate::metadata::MetadataStore;
use crate::models::conversation::{AGENT_ROLE, CUSTOMER_ROLE};
use crate::models::{
    AudioUnit, ConversationOutcome, ConversationRecord, ConversationRequest, ConversationStatus,
    ProgressReport, UnitOutcome,
};
use crate::normalizer::Normalizer;
use crate::progress::ProgressAggregator;
use crate::reconcile::{reconcile, ReconciliationReport};
use crate::storage::{listing_of, validate_name_component, StorageListing, StorageWriter};

/// Owns one instance of each pipeline component
#[derive(Debug)]
pub struct Collector {
    config: IngestConfig,
    fetcher: Fetcher,
    normalizer: Normalizer,
    storage: StorageWriter,
    metadata: Arc<MetadataStore>,
    progress: ProgressAggregator,
}

impl Collector {
    /// Build every component, creating the storage root and loading metadata
    pub fn new(config: IngestConfig) -> Result<Self, AcquisitionError> {
        let fetcher = Fetcher::new(config.fetch_timeout)?;
        let storage = StorageWriter::new(&config.storage_dir)?;
        let metadata = Arc::new(MetadataStore::open(
            &config.metadata_file,
            config.lock_timeout,
        )?);

        info!(
            storage_dir = %config.storage_dir.display(),
            metadata_file = %config.metadata_file.display(),
            "Collector ready"
        );

        Ok(Self {
            progress: ProgressAggregator::new(Arc::clone(&metadata)),
            normalizer: Normalizer::new(),
            config,
            fetcher,
            storage,
            metadata,
        })
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub fn metadata(&self) -> &Arc<MetadataStore> {
        &self.metadata
    }

    pub fn storage(&self) -> &StorageWriter {
        &self.storage
    }

    /// Fetch, normalize and store one unit; never touches metadata
    ///
    /// `timeout` bounds the whole unit and defaults to the configured budget.
    /// Expiry fails the unit with a network error.
    pub async fn acquire_unit(
        &self,
        conversation_id: &str,
        speaker_label: &str,
        url: &str,
        timeout: Option<Duration>,
    ) -> Result<AudioUnit, AcquisitionError> {
        let budget = timeout.unwrap_or(self.config.unit_timeout);

        let result = tokio::time::timeout(budget, self.run_unit(conversation_id, speaker_label, url))
            .await
            .unwrap_or_else(|_| {
                Err(FetchError::Network(format!("timed out after {:?}", budget)).into())
            });

        match &result {
            Ok(unit) => info!(
                conversation_id,
                speaker = speaker_label,
                url,
                size_bytes = unit.size_bytes,
                duration_seconds = unit.duration_seconds,
                "Unit acquired"
            ),
            Err(e) => warn!(
                conversation_id,
                speaker = speaker_label,
                url,
                kind = e.kind(),
                error = %e,
                "Unit acquisition failed"
            ),
        }

        result
    }

    async fn run_unit(
        &self,
        conversation_id: &str,
        speaker_label: &str,
        url: &str,
    ) -> Result<AudioUnit, AcquisitionError> {
        // Reject bad names before any network traffic
        validate_name_component(conversation_id)?;
        validate_name_component(speaker_label)?;

        let fetched = self.fetcher.fetch(url).await?;
        debug!(
            conversation_id,
            speaker = speaker_label,
            content_type = fetched.content_type.as_deref().unwrap_or("-"),
            format = fetched.format.extension(),
            bytes = fetched.bytes.len(),
            "Unit fetched"
        );

        let normalizer = self.normalizer.clone();
        let normalized = tokio::task::spawn_blocking(move || {
            normalizer.normalize(fetched.bytes, Some(fetched.format))
        })
        .await
        .map_err(|e| ConversionError::UndecodableInput(format!("decoder task failed: {}", e)))??;

        let storage = self.storage.clone();
        let id = conversation_id.to_string();
        let label = speaker_label.to_string();
        let duration_seconds = normalized.duration_seconds;
        let stored = tokio::task::spawn_blocking(move || {
            storage.store(&id, &label, &normalized.wav_bytes)
        })
        .await
        .map_err(|e| StorageError::Io(format!("storage task failed: {}", e)))??;

        Ok(AudioUnit {
            conversation_id: conversation_id.to_string(),
            speaker_label: speaker_label.to_string(),
            source_url: url.to_string(),
            file_path: stored.file_path,
            size_bytes: stored.size_bytes,
            duration_seconds,
        })
    }

    /// Acquire agent and optional customer concurrently, then record them
    ///
    /// A record holding the successful units is appended whenever the agent
    /// unit succeeds. A failed append marks the whole conversation failed even
    /// though its files are on disk.
    pub async fn acquire_conversation(&self, request: ConversationRequest) -> ConversationOutcome {
        let ConversationRequest {
            conversation_id,
            agent_url,
            customer_url,
            timeout,
        } = request;

        let agent = self.acquire_unit(&conversation_id, AGENT_ROLE, &agent_url, timeout);
        let customer = async {
            match &customer_url {
                Some(url) => Some(
                    self.acquire_unit(&conversation_id, CUSTOMER_ROLE, url, timeout)
                        .await,
                ),
                None => None,
            }
        };
        let (agent_result, customer_result) = tokio::join!(agent, customer);

        let mut units = vec![UnitOutcome {
            speaker_label: AGENT_ROLE.to_string(),
            source_url: agent_url,
            result: agent_result,
        }];
        if let (Some(url), Some(result)) = (customer_url, customer_result) {
            units.push(UnitOutcome {
                speaker_label: CUSTOMER_ROLE.to_string(),
                source_url: url,
                result,
            });
        }

        let agent_ok = units[0].is_success();
        let (record, metadata_error) = if agent_ok {
            let record = ConversationRecord::new(
                conversation_id.as_str(),
                dcol_common::time::now(),
                units.iter().filter_map(|u| u.unit().cloned()),
            );
            match self.metadata.append_record(record.clone()).await {
                Ok(replaced) => {
                    if replaced {
                        info!(conversation_id = %conversation_id, "Replaced existing conversation record");
                    }
                    (Some(record), None)
                }
                Err(e) => {
                    warn!(
                        conversation_id = %conversation_id,
                        kind = e.kind(),
                        error = %e,
                        "Conversation stored but metadata append failed"
                    );
                    (None, Some(e))
                }
            }
        } else {
            (None, None)
        };

        let status = ConversationStatus::classify(&units, metadata_error.is_some());
        info!(
            conversation_id = %conversation_id,
            status = ?status,
            units = units.len(),
            "Conversation acquisition finished"
        );

        ConversationOutcome {
            conversation_id,
            status,
            units,
            record,
            metadata_error,
        }
    }

    pub async fn progress(&self, target_hours: f64) -> ProgressReport {
        self.progress.summarize(target_hours).await
    }

    pub fn storage_listing(&self) -> Result<StorageListing, StorageError> {
        self.storage.listing()
    }

    /// Compare stored files with metadata records
    ///
    /// Records are read before the directory, so a unit stored but not yet
    /// recorded shows as untracked rather than a recorded unit as missing.
    pub async fn reconcile(&self) -> Result<ReconciliationReport, StorageError> {
        let records = self.metadata.all_records().await;
        let root = self.config.storage_dir.clone();
        let listing = tokio::task::spawn_blocking(move || listing_of(&root))
            .await
            .map_err(|e| StorageError::Io(format!("listing task failed: {}", e)))??;
        Ok(reconcile(&listing, &records))
    }
}
