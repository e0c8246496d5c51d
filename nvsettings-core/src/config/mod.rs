//! Configuration management for nvsettings
//!
//! Configuration comes from defaults, a TOML file, or environment variables,
//! and is validated before use.

use crate::logging::LogLevel;
use crate::registry::DEFAULT_LOCK_TIMEOUT;
use crate::store::{self, FileStore, MemoryStore, StoreBackend, StoreError};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

mod error;

pub use error::ConfigError;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Registry configuration
    pub registry: RegistryConfig,

    /// Store backend configuration
    pub store: StoreConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Debounced autosave configuration
    pub autosave: AutosaveConfig,
}

/// Registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Storage partition the registry reads and writes
    pub namespace: String,

    /// Bounded wait for a setting's lock during save/load
    #[serde(with = "humantime_serde")]
    pub lock_timeout: Duration,
}

/// Which store backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Memory,
    File,
}

/// Store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: BackendKind,

    /// Data directory for the file backend
    pub data_dir: PathBuf,

    /// Maximum keys per namespace
    pub max_entries: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Enable JSON formatting
    pub json_format: bool,

    /// Include timestamps
    pub with_timestamp: bool,

    /// Include target module
    pub with_target: bool,
}

/// Autosave configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutosaveConfig {
    pub enabled: bool,

    /// Quiet period after the last change before a save runs
    #[serde(with = "humantime_serde")]
    pub debounce: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            namespace: "Global".to_string(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::File,
            data_dir: PathBuf::from("./nvs"),
            max_entries: store::file_store::DEFAULT_MAX_ENTRIES,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            with_timestamp: true,
            with_target: true,
        }
    }
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            debounce: Duration::from_secs(5),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Environment variables follow the pattern: NVSETTINGS_<SECTION>_<KEY>
    /// Example: NVSETTINGS_STORE_DATA_DIR=/var/lib/nvs
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Override fields from NVSETTINGS_* environment variables
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        // Registry config
        if let Ok(namespace) = env::var("NVSETTINGS_REGISTRY_NAMESPACE") {
            self.registry.namespace = namespace;
        }
        if let Ok(timeout) = env::var("NVSETTINGS_REGISTRY_LOCK_TIMEOUT") {
            self.registry.lock_timeout = humantime_serde::re::humantime::parse_duration(&timeout)
                .map_err(|e| ConfigError::InvalidValue(format!("Invalid lock timeout: {}", e)))?;
        }

        // Store config
        if let Ok(backend) = env::var("NVSETTINGS_STORE_BACKEND") {
            self.store.backend = match backend.to_lowercase().as_str() {
                "memory" => BackendKind::Memory,
                "file" => BackendKind::File,
                other => {
                    return Err(ConfigError::InvalidValue(format!(
                        "Invalid store backend: {}",
                        other
                    )))
                }
            };
        }
        if let Ok(data_dir) = env::var("NVSETTINGS_STORE_DATA_DIR") {
            self.store.data_dir = PathBuf::from(data_dir);
        }
        if let Ok(max_entries) = env::var("NVSETTINGS_STORE_MAX_ENTRIES") {
            self.store.max_entries = max_entries
                .parse()
                .map_err(|e| ConfigError::InvalidValue(format!("Invalid max entries: {}", e)))?;
        }

        // Logging config
        if let Ok(level) = env::var("NVSETTINGS_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(json) = env::var("NVSETTINGS_LOG_JSON") {
            self.logging.json_format = json
                .parse()
                .map_err(|e| ConfigError::InvalidValue(format!("Invalid JSON flag: {}", e)))?;
        }
        if let Ok(timestamp) = env::var("NVSETTINGS_LOG_TIMESTAMP") {
            self.logging.with_timestamp = timestamp
                .parse()
                .map_err(|e| ConfigError::InvalidValue(format!("Invalid timestamp flag: {}", e)))?;
        }
        if let Ok(target) = env::var("NVSETTINGS_LOG_TARGET") {
            self.logging.with_target = target
                .parse()
                .map_err(|e| ConfigError::InvalidValue(format!("Invalid target flag: {}", e)))?;
        }

        // Autosave config
        if let Ok(enabled) = env::var("NVSETTINGS_AUTOSAVE_ENABLED") {
            self.autosave.enabled = enabled
                .parse()
                .map_err(|e| ConfigError::InvalidValue(format!("Invalid autosave flag: {}", e)))?;
        }
        if let Ok(debounce) = env::var("NVSETTINGS_AUTOSAVE_DEBOUNCE") {
            self.autosave.debounce = humantime_serde::re::humantime::parse_duration(&debounce)
                .map_err(|e| ConfigError::InvalidValue(format!("Invalid autosave debounce: {}", e)))?;
        }

        Ok(())
    }

    /// Load configuration from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::FileReadError(e.to_string()))?;

        let config: Self =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        store::validate_namespace(&self.registry.namespace).map_err(|_| {
            ConfigError::ValidationFailed(format!(
                "namespace must be 1-{} characters of [A-Za-z0-9_-]: {:?}",
                store::MAX_NAMESPACE_LEN,
                self.registry.namespace
            ))
        })?;

        if self.registry.lock_timeout.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "lock_timeout must be greater than 0".to_string(),
            ));
        }

        if self.store.max_entries == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_entries must be greater than 0".to_string(),
            ));
        }

        if self.autosave.enabled && self.autosave.debounce.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "autosave debounce must be greater than 0".to_string(),
            ));
        }

        self.logging
            .level
            .parse::<LogLevel>()
            .map_err(|e| ConfigError::ValidationFailed(e.to_string()))?;

        Ok(())
    }

    /// Save configuration to file
    pub fn save_to_file(&self, path: impl AsRef<std::path::Path>) -> Result<(), ConfigError> {
        let contents =
            toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, contents).map_err(|e| ConfigError::FileWriteError(e.to_string()))?;

        Ok(())
    }

    /// Construct the configured store backend
    pub fn open_backend(&self) -> Result<Arc<dyn StoreBackend>, ConfigError> {
        if self.store.backend == BackendKind::File && self.store.data_dir.is_file() {
            return Err(ConfigError::Backend(StoreError::Backend(format!(
                "{} is not a directory",
                self.store.data_dir.display()
            ))));
        }

        let backend: Arc<dyn StoreBackend> = match self.store.backend {
            BackendKind::Memory => {
                Arc::new(MemoryStore::new().with_max_entries(self.store.max_entries))
            }
            BackendKind::File => Arc::new(
                FileStore::new(&self.store.data_dir).with_max_entries(self.store.max_entries),
            ),
        };
        Ok(backend)
    }
}
