//! Configuration for the scan engine
//!
//! One TOML file covers everything: scan parameters and logging. All
//! fields have built-in defaults, so a missing file (or a file with only
//! some keys) is fine. Parameters are validated after command-line
//! overrides are applied, so a bad override fails startup the same way a
//! bad file does.
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments (--window-size, --min-consensus)
//! 2. TOML configuration file
//! 3. Built-in defaults

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use scanfirm_common::ScanParams;

use crate::error::{Error, Result};

/// Configuration file contents
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    /// Scan parameter overrides (optional)
    #[serde(default)]
    pub scan: ScanParams,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Resolved application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Scan parameters, validated
    pub scan: ScanParams,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file plus command-line overrides
    ///
    /// A missing file is not an error: defaults apply and a warning is
    /// logged. A file that exists but does not parse, or parameters that
    /// fail validation after overrides, are errors.
    pub async fn load(toml_path: &Path, cli_overrides: ConfigOverrides) -> Result<Self> {
        let toml_config = match tokio::fs::read_to_string(toml_path).await {
            Ok(toml_str) => {
                let parsed: TomlConfig = toml::from_str(&toml_str).map_err(|e| {
                    Error::Config(format!("Failed to parse {:?}: {}", toml_path, e))
                })?;
                info!("Loaded configuration from {:?}", toml_path);
                parsed
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Config file {:?} not found, using defaults", toml_path);
                TomlConfig::default()
            }
            Err(e) => {
                return Err(Error::Config(format!(
                    "Failed to read config file {:?}: {}",
                    toml_path, e
                )));
            }
        };

        let mut scan = toml_config.scan;
        if let Some(window_size) = cli_overrides.window_size {
            scan.window_size = window_size;
        }
        if let Some(min_consensus) = cli_overrides.min_consensus {
            scan.min_consensus = min_consensus;
        }
        scan.validate()?;

        Ok(Config {
            scan,
            logging: toml_config.logging,
        })
    }
}

/// Command-line configuration overrides
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub window_size: Option<usize>,
    pub min_consensus: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_log_level() {
        assert_eq!(default_log_level(), "info");
    }

    #[tokio::test]
    async fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("does-not-exist.toml");

        let config = Config::load(&path, ConfigOverrides::default())
            .await
            .unwrap();
        assert_eq!(config.scan, ScanParams::default());
        assert_eq!(config.logging.level, "info");
    }

    #[tokio::test]
    async fn partial_file_fills_remaining_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[scan]\nwindow_size = 8\n\n[logging]\nlevel = \"debug\"").unwrap();

        let config = Config::load(file.path(), ConfigOverrides::default())
            .await
            .unwrap();
        assert_eq!(config.scan.window_size, 8);
        assert_eq!(config.scan.min_consensus, 2);
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.file.is_none());
    }

    #[tokio::test]
    async fn cli_overrides_beat_file_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[scan]\nwindow_size = 8\nmin_consensus = 3").unwrap();

        let overrides = ConfigOverrides {
            window_size: Some(16),
            min_consensus: None,
        };
        let config = Config::load(file.path(), overrides).await.unwrap();
        assert_eq!(config.scan.window_size, 16);
        assert_eq!(config.scan.min_consensus, 3);
    }

    #[tokio::test]
    async fn invalid_merged_params_fail() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[scan]\nwindow_size = 4").unwrap();

        // Override pushes min_consensus past the window size
        let overrides = ConfigOverrides {
            window_size: None,
            min_consensus: Some(9),
        };
        assert!(Config::load(file.path(), overrides).await.is_err());
    }

    #[tokio::test]
    async fn malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[scan\nwindow_size = ").unwrap();

        assert!(Config::load(file.path(), ConfigOverrides::default())
            .await
            .is_err());
    }
}
