//! Configuration loading and root folder resolution
//!
//! Root folder priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable `DCOL_ROOT_FOLDER`
//! 3. TOML config file (`root_folder` key)
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "DCOL_ROOT_FOLDER";

/// Environment variable pointing at an explicit TOML config file
pub const CONFIG_FILE_ENV: &str = "DCOL_CONFIG";

/// Logging section of the TOML config
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter level when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// On-disk TOML configuration
///
/// Every field is optional in the file; missing keys fall back to [`Default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Root folder holding audio, metadata and reports
    pub root_folder: Option<PathBuf>,
    /// HTTP bind address
    pub bind_address: String,
    /// HTTP port
    pub port: u16,
    /// Audio storage directory (relative paths resolve against root folder)
    pub storage_dir: Option<PathBuf>,
    /// Metadata document path (relative paths resolve against root folder)
    pub metadata_file: Option<PathBuf>,
    /// Snapshot report directory (relative paths resolve against root folder)
    pub report_dir: Option<PathBuf>,
    /// Per-request fetch timeout
    pub fetch_timeout_secs: u64,
    /// Budget for one unit (fetch + normalize + store)
    pub unit_timeout_secs: u64,
    /// Maximum wait for the metadata write lock
    pub lock_timeout_secs: u64,
    /// Target used when a progress query omits one
    pub default_target_hours: f64,
    pub logging: LoggingConfig,
}

impl TomlConfig {
    /// Reject values that would make every request fail
    pub fn validate(&self) -> Result<()> {
        for (key, value) in [
            ("fetch_timeout_secs", self.fetch_timeout_secs),
            ("unit_timeout_secs", self.unit_timeout_secs),
            ("lock_timeout_secs", self.lock_timeout_secs),
        ] {
            if value == 0 {
                return Err(Error::Config(format!("{} must be greater than zero", key)));
            }
        }

        if !self.default_target_hours.is_finite() || self.default_target_hours < 0.0 {
            return Err(Error::Config(
                "default_target_hours must be a finite, non-negative number".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            bind_address: "0.0.0.0".to_string(),
            port: 8888,
            storage_dir: None,
            metadata_file: None,
            report_dir: None,
            fetch_timeout_secs: 30,
            unit_timeout_secs: 120,
            lock_timeout_secs: 10,
            default_target_hours: 100.0,
            logging: LoggingConfig::default(),
        }
    }
}

/// Locate the TOML config file, if any
///
/// `DCOL_CONFIG` wins; otherwise `~/.config/dcol/config.toml`, then
/// `/etc/dcol/config.toml` on Linux.
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
        return Some(PathBuf::from(path));
    }

    let user_config = dirs::config_dir().map(|d| d.join("dcol").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/dcol/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Parse and validate a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;
    config
        .validate()
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
    Ok(config)
}

/// Load the TOML config, falling back to defaults when no file exists
///
/// A missing file is not an error. A file that exists but does not parse is.
pub fn load_or_default(explicit: Option<&Path>) -> Result<TomlConfig> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => config_file_path(),
    };

    match path {
        Some(path) if path.exists() => {
            info!("Loading config: {}", path.display());
            load_toml_config(&path)
        }
        Some(path) => {
            info!("Config file {} not found, using defaults", path.display());
            Ok(TomlConfig::default())
        }
        None => {
            debug!("No config file found, using defaults");
            Ok(TomlConfig::default())
        }
    }
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("dcol"))
        .unwrap_or_else(|| PathBuf::from("./dcol_data"))
}

/// Resolves the root folder following the priority order in the module docs
#[derive(Debug, Clone)]
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
            cli_arg: None,
        }
    }

    /// Attach the command-line value (highest priority)
    pub fn with_cli_arg(mut self, cli_arg: Option<PathBuf>) -> Self {
        self.cli_arg = cli_arg;
        self
    }

    pub fn resolve(&self, toml_config: &TomlConfig) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            debug!(module = %self.module_name, "Root folder from command line");
            return path.clone();
        }

        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.trim().is_empty() {
                debug!(module = %self.module_name, "Root folder from {}", ROOT_FOLDER_ENV);
                return PathBuf::from(path);
            }
        }

        if let Some(path) = &toml_config.root_folder {
            debug!(module = %self.module_name, "Root folder from TOML config");
            return path.clone();
        }

        default_root_folder()
    }
}

/// Creates the root folder and resolves paths inside it
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }

    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root_folder.exists() {
            info!("Creating root folder: {}", self.root_folder.display());
        }
        std::fs::create_dir_all(&self.root_folder)?;
        Ok(())
    }

    /// Resolve a configured path: absolute paths are kept, relative paths
    /// join the root folder, `None` uses `default_name` under the root folder.
    pub fn resolve_path(&self, configured: Option<&Path>, default_name: &str) -> PathBuf {
        match configured {
            Some(path) if path.is_absolute() => path.to_path_buf(),
            Some(path) => self.root_folder.join(path),
            None => self.root_folder.join(default_name),
        }
    }
}
