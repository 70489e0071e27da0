#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Configuration management for pkgreg
//!
//! This crate handles loading and merging configuration from:
//! - Default values (hard-coded)
//! - Configuration file (~/.config/pkgreg/config.toml)
//! - Environment variables (`PKGREG_*`)
//! - CLI flags

pub mod constants;

use pkgreg_errors::{ConfigError, Error};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub paths: PathConfig,

    #[serde(default)]
    pub catalog: CatalogConfig,

    #[serde(default)]
    pub upload: UploadConfig,

    #[serde(default)]
    pub urls: UrlConfig,

    #[serde(default)]
    pub retry: RetryConfig,
}

/// Path configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PathConfig {
    pub data_dir: Option<PathBuf>,
    pub blob_dir: Option<PathBuf>,
    pub catalog_path: Option<PathBuf>,
}

/// Which catalog implementation backs the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CatalogBackend {
    #[default]
    Sqlite,
    Memory,
}

/// Catalog configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default)]
    pub backend: CatalogBackend,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout: u64, // seconds
}

/// Upload limits and policies
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: u64,
    #[serde(default = "default_max_package_size")]
    pub max_package_size: u64,
    /// Replace an existing committed identity instead of rejecting it
    #[serde(default)]
    pub allow_overwrite: bool,
    #[serde(default = "default_pending_ttl")]
    pub pending_ttl: u64, // seconds
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval: u64, // seconds
}

/// Download URL issuance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlConfig {
    #[serde(default = "default_url_base")]
    pub base_url: String,
    #[serde(default = "default_url_ttl")]
    pub ttl: u64, // seconds
    /// Hex-encoded 32-byte key; a random key is generated at startup if unset
    pub signing_key: Option<String>,
}

/// Internal retry policy for transient storage failures
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    #[serde(default = "default_jitter_factor")]
    pub jitter_factor: f64,
}

// Default implementations

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            backend: CatalogBackend::Sqlite,
            max_connections: 5,
            busy_timeout: 30,
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: constants::DEFAULT_MAX_CHUNK_SIZE,
            max_package_size: constants::DEFAULT_MAX_PACKAGE_SIZE,
            allow_overwrite: false,
            pending_ttl: 3600,   // 1 hour
            sweep_interval: 300, // 5 minutes
        }
    }
}

impl Default for UrlConfig {
    fn default() -> Self {
        Self {
            base_url: constants::DEFAULT_URL_BASE.to_string(),
            ttl: 900, // 15 minutes
            signing_key: None,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 100,
            max_delay_ms: 5_000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

// Default value functions for serde
fn default_max_connections() -> u32 {
    5
}

fn default_busy_timeout() -> u64 {
    30
}

fn default_max_chunk_size() -> u64 {
    constants::DEFAULT_MAX_CHUNK_SIZE
}

fn default_max_package_size() -> u64 {
    constants::DEFAULT_MAX_PACKAGE_SIZE
}

fn default_pending_ttl() -> u64 {
    3600
}

fn default_sweep_interval() -> u64 {
    300
}

fn default_url_base() -> String {
    constants::DEFAULT_URL_BASE.to_string()
}

fn default_url_ttl() -> u64 {
    900
}

fn default_retries() -> u32 {
    3
}

fn default_initial_delay() -> u64 {
    100
}

fn default_max_delay() -> u64 {
    5_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_jitter_factor() -> f64 {
    0.1
}

impl UploadConfig {
    #[must_use]
    pub fn pending_ttl(&self) -> Duration {
        Duration::from_secs(self.pending_ttl)
    }

    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval)
    }
}

impl UrlConfig {
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl)
    }

    /// Decode the configured signing key
    ///
    /// # Errors
    ///
    /// Returns an error if the key is not 64 hex characters.
    pub fn signing_key_bytes(&self) -> Result<Option<[u8; 32]>, Error> {
        let Some(key) = &self.signing_key else {
            return Ok(None);
        };
        let invalid = || ConfigError::InvalidValue {
            field: "urls.signing_key".to_string(),
            value: "<redacted>".to_string(),
        };
        let bytes = hex::decode(key.trim()).map_err(|_| invalid())?;
        let key: [u8; 32] = bytes.try_into().map_err(|_| invalid())?;
        Ok(Some(key))
    }
}

impl RetryConfig {
    #[must_use]
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    #[must_use]
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

impl Config {
    /// Get the default config file path
    ///
    /// # Errors
    ///
    /// Returns an error if the system config directory cannot be determined.
    pub fn default_path() -> Result<PathBuf, Error> {
        let config_dir = dirs::config_dir().ok_or_else(|| ConfigError::NotFound {
            path: "config directory".to_string(),
        })?;
        Ok(config_dir.join("pkgreg").join("config.toml"))
    }

    /// Load configuration from file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the file contents
    /// contain invalid TOML syntax that cannot be parsed.
    pub async fn load_from_file(path: &Path) -> Result<Self, Error> {
        let contents = fs::read_to_string(path)
            .await
            .map_err(|_| ConfigError::NotFound {
                path: path.display().to_string(),
            })?;

        toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError {
                message: e.to_string(),
            })
            .map_err(Into::into)
    }

    /// Load configuration with fallback to defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be read
    /// or contains invalid TOML syntax.
    pub async fn load() -> Result<Self, Error> {
        let config_path = Self::default_path()?;

        if config_path.exists() {
            Self::load_from_file(&config_path).await
        } else {
            tracing::debug!(path = %config_path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration from an optional path or use default
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed
    pub async fn load_or_default(path: Option<&Path>) -> Result<Self, Error> {
        match path {
            Some(config_path) => Self::load_from_file(config_path).await,
            None => Self::load().await,
        }
    }

    /// Merge with environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if environment variables contain invalid values
    /// that cannot be parsed into the expected types.
    pub fn merge_env(&mut self) -> Result<(), Error> {
        // PKGREG_DATA_DIR
        if let Ok(dir) = std::env::var("PKGREG_DATA_DIR") {
            self.paths.data_dir = Some(PathBuf::from(dir));
        }

        // PKGREG_CATALOG_BACKEND
        if let Ok(backend) = std::env::var("PKGREG_CATALOG_BACKEND") {
            self.catalog.backend = match backend.as_str() {
                "sqlite" => CatalogBackend::Sqlite,
                "memory" => CatalogBackend::Memory,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        field: "PKGREG_CATALOG_BACKEND".to_string(),
                        value: backend,
                    }
                    .into())
                }
            };
        }

        // PKGREG_MAX_CHUNK_SIZE
        if let Ok(size) = std::env::var("PKGREG_MAX_CHUNK_SIZE") {
            self.upload.max_chunk_size = size.parse().map_err(|_| ConfigError::InvalidValue {
                field: "PKGREG_MAX_CHUNK_SIZE".to_string(),
                value: size,
            })?;
        }

        // PKGREG_MAX_PACKAGE_SIZE
        if let Ok(size) = std::env::var("PKGREG_MAX_PACKAGE_SIZE") {
            self.upload.max_package_size =
                size.parse().map_err(|_| ConfigError::InvalidValue {
                    field: "PKGREG_MAX_PACKAGE_SIZE".to_string(),
                    value: size,
                })?;
        }

        // PKGREG_ALLOW_OVERWRITE
        if let Ok(overwrite) = std::env::var("PKGREG_ALLOW_OVERWRITE") {
            self.upload.allow_overwrite = match overwrite.as_str() {
                "true" | "1" | "yes" => true,
                "false" | "0" | "no" => false,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        field: "PKGREG_ALLOW_OVERWRITE".to_string(),
                        value: overwrite,
                    }
                    .into())
                }
            };
        }

        // PKGREG_URL_BASE
        if let Ok(base) = std::env::var("PKGREG_URL_BASE") {
            self.urls.base_url = base;
        }

        // PKGREG_SIGNING_KEY
        if let Ok(key) = std::env::var("PKGREG_SIGNING_KEY") {
            self.urls.signing_key = Some(key);
        }

        Ok(())
    }

    /// Check cross-field constraints
    ///
    /// # Errors
    ///
    /// Returns an error describing the first violated constraint.
    pub fn validate(&self) -> Result<(), Error> {
        if self.upload.max_chunk_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "upload.max_chunk_size".to_string(),
                value: "0".to_string(),
            }
            .into());
        }
        if self.upload.max_chunk_size > self.upload.max_package_size {
            return Err(ConfigError::Invalid {
                message: format!(
                    "upload.max_chunk_size ({}) exceeds upload.max_package_size ({})",
                    self.upload.max_chunk_size, self.upload.max_package_size
                ),
            }
            .into());
        }
        if self.urls.ttl == 0 {
            return Err(ConfigError::InvalidValue {
                field: "urls.ttl".to_string(),
                value: "0".to_string(),
            }
            .into());
        }
        if self.catalog.max_connections == 0 {
            return Err(ConfigError::InvalidValue {
                field: "catalog.max_connections".to_string(),
                value: "0".to_string(),
            }
            .into());
        }
        self.urls.signing_key_bytes()?;
        Ok(())
    }

    /// Get the data directory (with default)
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.paths
            .data_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(constants::DATA_DIR))
    }

    /// Get the blob store directory (with default)
    #[must_use]
    pub fn blob_dir(&self) -> PathBuf {
        self.paths
            .blob_dir
            .clone()
            .unwrap_or_else(|| self.data_dir().join(constants::BLOB_DIR_NAME))
    }

    /// Get the catalog database path (with default)
    #[must_use]
    pub fn catalog_path(&self) -> PathBuf {
        self.paths
            .catalog_path
            .clone()
            .unwrap_or_else(|| self.data_dir().join(constants::CATALOG_FILE_NAME))
    }
}
