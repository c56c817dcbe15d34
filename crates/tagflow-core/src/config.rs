//! Configuration management for Tagflow.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration.
///
/// This is loaded from `~/.config/tagflow/config.toml` (or platform equivalent).
/// If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Job processor settings
    pub processor: ProcessorConfig,
    /// Remote segment API settings
    pub segment_api: SegmentApiConfig,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            tracing::debug!("Loading config from {}", config_path.display());
            let contents = fs::read_to_string(&config_path)?;
            let config = toml::from_str(&contents)?;
            Ok(config)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `TAGFLOW_MAX_CONCURRENT_JOBS`: Override processor concurrency ceiling
    /// - `TAGFLOW_BATCH_SIZE`: Override mutation batch size
    /// - `TAGFLOW_SEGMENT_API_URL`: Override the remote API base URL
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;

        // Override from environment
        if let Ok(val) = std::env::var("TAGFLOW_MAX_CONCURRENT_JOBS") {
            if let Ok(max) = val.parse() {
                config.processor.max_concurrent_jobs = max;
                tracing::debug!("Override max_concurrent_jobs from env: {}", max);
            }
        }

        if let Ok(val) = std::env::var("TAGFLOW_BATCH_SIZE") {
            if let Ok(size) = val.parse() {
                config.processor.batch_size = size;
                tracing::debug!("Override batch_size from env: {}", size);
            }
        }

        if let Ok(val) = std::env::var("TAGFLOW_SEGMENT_API_URL") {
            config.segment_api.base_url = val.clone();
            tracing::debug!("Override segment_api.base_url from env: {}", val);
        }

        Ok(config)
    }

    /// Save configuration to disk.
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn save(&self) -> ConfigResult<()> {
        let config_path = Self::config_path()?;
        let config_dir = config_path
            .parent()
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "config_path".to_string(),
                reason: "no parent directory".to_string(),
            })?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", config_path.display());

        let contents = toml::to_string_pretty(self)?;
        fs::write(config_path, contents)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/tagflow/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs =
            ProjectDirs::from("com", "tagflow", "tagflow").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Get the data directory path.
    ///
    /// Uses XDG base directories: `~/.local/share/tagflow`
    pub fn data_dir() -> ConfigResult<PathBuf> {
        let dirs =
            ProjectDirs::from("com", "tagflow", "tagflow").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.data_dir().to_path_buf())
    }
}

/// Job processor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Maximum jobs executing at once per owner scope
    pub max_concurrent_jobs: usize,
    /// Hard timeout for one job execution, in minutes
    pub job_timeout_minutes: u64,
    /// Number of members mutated between progress checkpoints
    pub batch_size: usize,
    /// Minutes after which a running job with no progress update is presumed orphaned
    pub stale_after_minutes: u64,
    /// Pause between batches, in milliseconds
    pub batch_delay_ms: u64,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 3,
            job_timeout_minutes: 60,
            batch_size: 10,
            stale_after_minutes: 5,
            batch_delay_ms: 500,
        }
    }
}

impl ProcessorConfig {
    /// Job timeout as a `Duration`.
    #[must_use]
    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_minutes * 60)
    }

    /// Staleness threshold as a `Duration`.
    #[must_use]
    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_minutes * 60)
    }

    /// Inter-batch delay as a `Duration`.
    #[must_use]
    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }
}

/// Remote segment API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentApiConfig {
    /// Base URL of the remote customer API
    pub base_url: String,
    /// Page size for member listing (capped at the remote API's maximum)
    pub page_size: u32,
    /// Upper bound on members resolved per segment
    pub max_members: u32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// User agent string
    pub user_agent: String,
}

impl Default for SegmentApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.example.com/v1".to_string(),
            page_size: 250,
            max_members: 30_000,
            timeout_secs: 30,
            user_agent: "Tagflow/0.1.0 (+https://github.com/tagflow/tagflow)".to_string(),
        }
    }
}
