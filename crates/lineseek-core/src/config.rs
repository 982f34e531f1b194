//! Configuration management for lineseek.
//!
//! This module provides configuration loading, saving, and defaults.
//! Configuration is stored in TOML format in a platform-appropriate location.
//! Command-line flags override every value loaded here.

use crate::builder::{BuildOptions, DEFAULT_PROGRESS_INTERVAL};
use crate::error::{LineseekError, Result};
use crate::index::DEFAULT_CHUNK_SIZE;
use crate::paths::IndexDirPolicy;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Main configuration structure for lineseek.
///
/// ## Example Configuration File (lineseek.toml)
///
/// ```toml
/// [general]
/// log_level = "warn"
///
/// [index]
/// dir = "/var/cache/lineseek"
/// hidden = false
/// full_name = false
/// chunk_size = 1000000
/// snap_length = 16
///
/// [build]
/// progress_interval = 100000000
/// max_line_length = 67108864
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Index placement and layout
    pub index: IndexConfig,

    /// Build tuning
    pub build: BuildConfig,
}

/// General configuration options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        GeneralConfig {
            log_level: "warn".to_string(),
        }
    }
}

/// Index placement and layout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Directory for index files; "." stores them next to the source
    pub dir: String,

    /// Prefix index file names with a dot
    pub hidden: bool,

    /// Name the index after the source file instead of a path digest
    pub full_name: bool,

    /// Bytes between checkpoints
    pub chunk_size: u64,

    /// Leading bytes captured per checkpoint (0 disables content search)
    pub snap_length: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        IndexConfig {
            dir: "/tmp".to_string(),
            hidden: false,
            full_name: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
            snap_length: 0,
        }
    }
}

/// Build tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Bytes between progress reports
    pub progress_interval: u64,

    /// Longest accepted line in bytes (None = unbounded)
    pub max_line_length: Option<usize>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        BuildConfig {
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            max_line_length: None,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default config if no config file exists.
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Config::default());
        }

        info!(path = %path.display(), "Loading configuration");
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents).map_err(|e| LineseekError::ConfigError {
            reason: format!("Failed to parse config {}: {}", path.display(), e),
        })?;

        Ok(config)
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> Result<PathBuf> {
        let dirs =
            ProjectDirs::from("", "", "lineseek").ok_or_else(|| LineseekError::ConfigError {
                reason: "Could not determine config directory".to_string(),
            })?;

        Ok(dirs.config_dir().join("lineseek.toml"))
    }

    /// Where index files go.
    pub fn index_dir_policy(&self) -> IndexDirPolicy {
        IndexDirPolicy::parse(&self.index.dir)
    }

    /// Build options seeded from this configuration.
    pub fn build_options(&self) -> BuildOptions {
        BuildOptions::new(self.index.chunk_size, self.index.snap_length)
            .progress_interval(self.build.progress_interval)
            .max_line_length(self.build.max_line_length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.index.dir, "/tmp");
        assert_eq!(config.index.chunk_size, 1_000_000);
        assert_eq!(config.index.snap_length, 0);
        assert_eq!(config.build.max_line_length, None);
        assert_eq!(config.general.log_level, "warn");
    }

    #[test]
    fn test_round_trip_through_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let mut config = Config::default();
        config.index.dir = ".".to_string();
        config.index.snap_length = 8;
        config.build.max_line_length = Some(4096);

        fs::write(&config_path, toml::to_string_pretty(&config).unwrap()).unwrap();
        let loaded = Config::load_from(&config_path).unwrap();

        assert_eq!(loaded.index.dir, ".");
        assert_eq!(loaded.index.snap_length, 8);
        assert_eq!(loaded.build.max_line_length, Some(4096));
        assert_eq!(loaded.index_dir_policy(), IndexDirPolicy::SameAsSource);
    }

    #[test]
    fn test_load_nonexistent() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.toml");

        let config = Config::load_from(&config_path).unwrap();
        assert_eq!(config.index.chunk_size, DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("partial.toml");
        fs::write(&config_path, "[index]\nchunk_size = 4096\n").unwrap();

        let config = Config::load_from(&config_path).unwrap();
        assert_eq!(config.index.chunk_size, 4096);
        assert_eq!(config.index.dir, "/tmp");
        assert_eq!(config.build.progress_interval, DEFAULT_PROGRESS_INTERVAL);
    }

    #[test]
    fn test_invalid_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("bad.toml");
        fs::write(&config_path, "[index]\nchunk_size = \"big\"\n").unwrap();

        let err = Config::load_from(&config_path).unwrap_err();
        assert!(matches!(err, LineseekError::ConfigError { .. }));
    }

    #[test]
    fn test_build_options() {
        let mut config = Config::default();
        config.index.chunk_size = 500;
        config.index.snap_length = 4;
        config.build.progress_interval = 10;

        let options = config.build_options();
        assert_eq!(options.chunk_size, 500);
        assert_eq!(options.snap_length, 4);
        assert_eq!(options.progress_interval, 10);
        assert!(!options.force);
    }
}
