//! Resolved runtime configuration for dcol-ingest

use dcol_common::config::{RootFolderInitializer, TomlConfig};
use dcol_common::time::secs_to_duration;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_STORAGE_DIR: &str = "audio";
pub const DEFAULT_METADATA_FILE: &str = "conversations_metadata.json";
pub const DEFAULT_REPORT_DIR: &str = "reports";

/// Configuration with every path resolved against the root folder
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub root_folder: PathBuf,
    pub bind_address: String,
    pub port: u16,
    /// Canonical WAV files land here
    pub storage_dir: PathBuf,
    /// JSON metadata document
    pub metadata_file: PathBuf,
    /// Snapshot reports written by the analysis tool
    pub report_dir: PathBuf,
    pub fetch_timeout: Duration,
    pub unit_timeout: Duration,
    pub lock_timeout: Duration,
    pub default_target_hours: f64,
}

impl IngestConfig {
    pub fn from_toml(root_folder: impl Into<PathBuf>, toml_config: &TomlConfig) -> Self {
        let initializer = RootFolderInitializer::new(root_folder.into());

        Self {
            storage_dir: initializer
                .resolve_path(toml_config.storage_dir.as_deref(), DEFAULT_STORAGE_DIR),
            metadata_file: initializer
                .resolve_path(toml_config.metadata_file.as_deref(), DEFAULT_METADATA_FILE),
            report_dir: initializer
                .resolve_path(toml_config.report_dir.as_deref(), DEFAULT_REPORT_DIR),
            root_folder: initializer.root_folder().to_path_buf(),
            bind_address: toml_config.bind_address.clone(),
            port: toml_config.port,
            fetch_timeout: secs_to_duration(toml_config.fetch_timeout_secs),
            unit_timeout: secs_to_duration(toml_config.unit_timeout_secs),
            lock_timeout: secs_to_duration(toml_config.lock_timeout_secs),
            default_target_hours: toml_config.default_target_hours,
        }
    }

    /// Default settings under `root_folder`
    pub fn for_root(root_folder: impl Into<PathBuf>) -> Self {
        Self::from_toml(root_folder, &TomlConfig::default())
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }

    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_resolve_under_root() {
        let config = IngestConfig::for_root("/data/dcol");

        assert_eq!(config.storage_dir, PathBuf::from("/data/dcol/audio"));
        assert_eq!(
            config.metadata_file,
            PathBuf::from("/data/dcol/conversations_metadata.json")
        );
        assert_eq!(config.report_dir, PathBuf::from("/data/dcol/reports"));
        assert_eq!(config.fetch_timeout, Duration::from_secs(30));
        assert_eq!(config.unit_timeout, Duration::from_secs(120));
        assert_eq!(config.lock_timeout, Duration::from_secs(10));
        assert_eq!(config.listen_address(), "0.0.0.0:8888");
    }

    #[test]
    fn test_configured_paths() {
        let toml_config = TomlConfig {
            storage_dir: Some(PathBuf::from("/mnt/audio")),
            metadata_file: Some(PathBuf::from("meta/records.json")),
            port: 9100,
            ..TomlConfig::default()
        };
        let config = IngestConfig::from_toml("/data/dcol", &toml_config);

        assert_eq!(config.storage_dir, PathBuf::from("/mnt/audio"));
        assert_eq!(config.metadata_file, PathBuf::from("/data/dcol/meta/records.json"));
        assert_eq!(config.port, 9100);
    }
}
