//! Integration tests for configuration loading and root folder resolution
//!
//! Tests that manipulate DCOL_ROOT_FOLDER or DCOL_CONFIG are marked with #[serial]
//! so they never race each other on process environment.

use dcol_common::config::{
    load_or_default, load_toml_config, LoggingConfig, RootFolderInitializer,
    RootFolderResolver, TomlConfig, CONFIG_FILE_ENV, ROOT_FOLDER_ENV,
};
use dcol_common::Error;
use serial_test::serial;
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
#[serial]
fn test_cli_argument_has_highest_priority() {
    env::set_var(ROOT_FOLDER_ENV, "/from/env");
    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/from/toml")),
        ..Default::default()
    };

    let resolved = RootFolderResolver::new("dcol-ingest")
        .with_cli_arg(Some(PathBuf::from("/from/cli")))
        .resolve(&toml);

    env::remove_var(ROOT_FOLDER_ENV);
    assert_eq!(resolved, PathBuf::from("/from/cli"));
}

#[test]
#[serial]
fn test_env_beats_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/from/env");
    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/from/toml")),
        ..Default::default()
    };

    let resolved = RootFolderResolver::new("dcol-ingest").resolve(&toml);

    env::remove_var(ROOT_FOLDER_ENV);
    assert_eq!(resolved, PathBuf::from("/from/env"));
}

#[test]
#[serial]
fn test_toml_used_when_no_cli_or_env() {
    env::remove_var(ROOT_FOLDER_ENV);
    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/from/toml")),
        ..Default::default()
    };

    let resolved = RootFolderResolver::new("dcol-ingest").resolve(&toml);
    assert_eq!(resolved, PathBuf::from("/from/toml"));
}

#[test]
#[serial]
fn test_compiled_default_is_non_empty() {
    env::remove_var(ROOT_FOLDER_ENV);
    let resolved = RootFolderResolver::new("dcol-ingest").resolve(&TomlConfig::default());
    assert!(!resolved.as_os_str().is_empty());
}

#[test]
#[serial]
fn test_missing_config_file_falls_back_to_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("nope.toml");

    let config = load_or_default(Some(&missing)).unwrap();
    assert_eq!(config, TomlConfig::default());
}

#[test]
#[serial]
fn test_config_env_points_at_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("custom.toml");
    std::fs::write(&path, "port = 7001\ndefault_target_hours = 12.5\n").unwrap();

    env::set_var(CONFIG_FILE_ENV, &path);
    let config = load_or_default(None);
    env::remove_var(CONFIG_FILE_ENV);

    let config = config.unwrap();
    assert_eq!(config.port, 7001);
    assert_eq!(config.default_target_hours, 12.5);
}

#[test]
fn test_invalid_toml_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("broken.toml");
    std::fs::write(&path, "port = \"not a number\"").unwrap();

    let result = load_toml_config(&path);
    assert!(result.is_err(), "Malformed config must fail fast");
}

#[test]
fn test_zero_unit_timeout_rejected_at_load() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(&path, "port = 9100\nunit_timeout_secs = 0\n").unwrap();

    let err = load_toml_config(&path).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
    assert!(err.to_string().contains("unit_timeout_secs"));

    // Same result through the fallback loader
    assert!(load_or_default(Some(&path)).is_err());
}

#[test]
fn test_logging_section_round_trips_through_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(&path, "root_folder = \"/srv/dcol\"\n[logging]\nlevel = \"debug\"\n").unwrap();

    let loaded = load_toml_config(&path).unwrap();
    assert_eq!(loaded.root_folder, Some(PathBuf::from("/srv/dcol")));
    assert_eq!(
        loaded.logging,
        LoggingConfig {
            level: "debug".to_string()
        }
    );
}

#[test]
fn test_initializer_creates_directory() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("a").join("b");

    let init = RootFolderInitializer::new(root.clone());
    init.ensure_directory_exists().unwrap();

    assert!(root.is_dir());
    assert_eq!(init.root_folder(), root.as_path());
}
