//! Configuration management for the raw file conversion pipeline.
//!
//! This module handles loading and parsing configuration from TOML files,
//! with sensible defaults for all settings.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory settings
    pub data: DataConfig,

    /// Logging settings
    pub logging: LoggingConfig,

    /// Conversion settings
    #[serde(default)]
    pub conversion: ConversionConfig,

    /// Meta data providers whose working directories are converted
    #[serde(default)]
    pub providers: Vec<ProviderEntry>,
}

/// Data directory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Root data directory path
    pub root_dir: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log directory path (relative to data directory or absolute)
    pub log_dir: String,

    /// Default log level (trace, debug, info, warn, error)
    pub default_level: String,

    /// Enable console output
    pub console: bool,

    /// Enable file output
    pub file: bool,

    /// Enable JSON formatting for file logs
    pub json_format: bool,
}

/// Conversion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionConfig {
    /// Directory receiving converted records (relative to data directory or absolute)
    pub converted_dir: String,

    /// Shortest pause between two empty watch polls
    pub min_poll_backoff_ms: u64,

    /// Longest pause between two empty watch polls
    pub max_poll_backoff_ms: u64,

    /// Interval of the "everything converted" status check
    pub status_poll_interval_ms: u64,

    /// How long `status --wait` blocks before giving up
    pub wait_timeout_seconds: u64,
}

/// A single provider entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEntry {
    /// Unique name, also the name of the working directory
    pub name: String,

    /// Hostname of the meta data provider
    pub hostname: String,

    /// Suffix of raw files downloaded for this provider
    pub file_suffix: String,

    /// Entry link template, `{id}` is replaced by the anime id
    #[serde(default)]
    pub link_template: Option<String>,

    /// Names of providers whose files must exist before conversion
    #[serde(default)]
    pub depends_on: Vec<String>,

    /// Run a conversion service for this provider
    #[serde(default = "default_true")]
    pub convert: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            converted_dir: "converted".to_string(),
            min_poll_backoff_ms: 10,
            max_poll_backoff_ms: 1000,
            status_poll_interval_ms: 1000,
            wait_timeout_seconds: 3600,
        }
    }
}

impl ConversionConfig {
    pub fn min_poll_backoff(&self) -> Duration {
        Duration::from_millis(self.min_poll_backoff_ms)
    }

    pub fn max_poll_backoff(&self) -> Duration {
        Duration::from_millis(self.max_poll_backoff_ms)
    }

    pub fn status_poll_interval(&self) -> Duration {
        Duration::from_millis(self.status_poll_interval_ms)
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_seconds)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data: DataConfig {
                root_dir: "data".to_string(),
            },
            logging: LoggingConfig {
                log_dir: "logs".to_string(),
                default_level: "info".to_string(),
                console: true,
                file: true,
                json_format: false,
            },
            conversion: ConversionConfig::default(),
            providers: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// If the file doesn't exist, returns the default configuration.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::warn!(
                path = %path.display(),
                "Config file not found, using defaults"
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        tracing::info!(
            path = %path.display(),
            providers = config.providers.len(),
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    /// Load configuration from a TOML file or create default if not found
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::from_file(path).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to load config, using defaults");
            Self::default()
        })
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = toml::to_string_pretty(self)
            .context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!(
            path = %path.display(),
            "Configuration saved successfully"
        );

        Ok(())
    }

    /// Check cross-field constraints serde cannot express
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for provider in &self.providers {
            if !names.insert(provider.name.as_str()) {
                bail!("Duplicate provider name: {}", provider.name);
            }
            if provider.file_suffix.trim_start_matches('.').is_empty() {
                bail!("Provider {} has an empty file suffix", provider.name);
            }
        }

        for provider in &self.providers {
            for dependency in &provider.depends_on {
                if !names.contains(dependency.as_str()) {
                    bail!(
                        "Provider {} depends on unknown provider {}",
                        provider.name,
                        dependency
                    );
                }
                if dependency == &provider.name {
                    bail!("Provider {} depends on itself", provider.name);
                }
            }
        }

        if self.conversion.min_poll_backoff_ms == 0 {
            bail!("min_poll_backoff_ms must be at least 1");
        }
        if self.conversion.min_poll_backoff_ms > self.conversion.max_poll_backoff_ms {
            bail!(
                "min_poll_backoff_ms ({}) exceeds max_poll_backoff_ms ({})",
                self.conversion.min_poll_backoff_ms,
                self.conversion.max_poll_backoff_ms
            );
        }

        Ok(())
    }

    /// Get the absolute path for the data directory
    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.data.root_dir)
    }

    /// Get the absolute path for the log directory
    pub fn log_dir(&self) -> PathBuf {
        self.resolve(&self.logging.log_dir)
    }

    /// Get the absolute path for the converted records directory
    pub fn converted_dir(&self) -> PathBuf {
        self.resolve(&self.conversion.converted_dir)
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir().join(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn provider(name: &str, hostname: &str, suffix: &str) -> ProviderEntry {
        ProviderEntry {
            name: name.to_string(),
            hostname: hostname.to_string(),
            file_suffix: suffix.to_string(),
            link_template: None,
            depends_on: Vec::new(),
            convert: true,
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.data.root_dir, "data");
        assert_eq!(config.conversion.min_poll_backoff(), Duration::from_millis(10));
        assert_eq!(config.conversion.max_poll_backoff(), Duration::from_secs(1));
        assert!(config.providers.is_empty());
    }

    #[test]
    fn test_save_and_load_config() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("config.toml");

        let mut original_config = Config::default();
        original_config.providers.push(provider("kitsu", "kitsu.app", "json"));
        original_config.save(&config_path)?;

        assert!(config_path.exists());

        let loaded_config = Config::from_file(&config_path)?;
        assert_eq!(loaded_config.data.root_dir, original_config.data.root_dir);
        assert_eq!(loaded_config.providers.len(), 1);
        assert_eq!(loaded_config.providers[0].hostname, "kitsu.app");

        Ok(())
    }

    #[test]
    fn test_load_nonexistent_config() {
        let config = Config::from_file("nonexistent.toml").unwrap();
        // Should return default config without error
        assert_eq!(config.data.root_dir, "data");
    }

    #[test]
    fn test_load_or_default_on_invalid_config() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("config.toml");
        std::fs::write(&config_path, "[data]\nroot_dir = 42\n")?;

        let config = Config::load_or_default(&config_path);
        assert_eq!(config.data.root_dir, "data");

        Ok(())
    }

    #[test]
    fn test_parse_provider_section() -> Result<()> {
        let content = r#"
            [data]
            root_dir = "/srv/modb"

            [logging]
            log_dir = "logs"
            default_level = "debug"
            console = true
            file = false
            json_format = false

            [[providers]]
            name = "anilist"
            hostname = "anilist.co"
            file_suffix = "json"
            depends_on = ["anilist-relations"]

            [[providers]]
            name = "anilist-relations"
            hostname = "anilist.co"
            file_suffix = "json"
            convert = false
        "#;

        let config: Config = toml::from_str(content)?;
        config.validate()?;

        let main = &config.providers[0];
        assert!(main.convert);
        assert_eq!(main.depends_on, vec!["anilist-relations".to_string()]);
        assert!(!config.providers[1].convert);
        assert_eq!(config.conversion.converted_dir, "converted");

        Ok(())
    }

    #[test]
    fn test_validate_rejects_bad_providers() {
        let mut config = Config::default();
        config.providers.push(provider("kitsu", "kitsu.app", "json"));
        config.providers.push(provider("kitsu", "kitsu.app", "json"));
        assert!(config.validate().is_err());

        let mut config = Config::default();
        let mut main = provider("anidb", "anidb.net", "html");
        main.depends_on.push("anidb-tags".to_string());
        config.providers.push(main);
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.providers.push(provider("livechart", "livechart.me", "."));
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.conversion.min_poll_backoff_ms = 5000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_poll_backoff() {
        let mut config = Config::default();
        config.conversion.min_poll_backoff_ms = 0;
        assert!(config.validate().is_err());

        config.conversion.min_poll_backoff_ms = 1;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_path_resolution() {
        let config = Config::default();

        let log_dir = config.log_dir();
        assert!(log_dir.ends_with("data/logs"));

        let converted_dir = config.converted_dir();
        assert!(converted_dir.ends_with("data/converted"));
    }
}
