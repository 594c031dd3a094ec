//! Typed configuration from environment variables or a TOML file.
//!
//! Loads once at startup and fails fast on malformed values. Nothing here is
//! adjustable while a service is running.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default ceiling on concurrently running workers.
pub const DEFAULT_MAX_WORKERS: usize = 4;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory scanned and watched for `*.txt` inputs. Must exist.
    pub input_dir: PathBuf,
    /// Directory receiving one result file per processed input.
    pub output_dir: PathBuf,
    /// Maximum number of workers running at once.
    pub max_workers: usize,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("input"),
            output_dir: PathBuf::from("output"),
            max_workers: DEFAULT_MAX_WORKERS,
            otel_endpoint: None,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`Config::from_env`], reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let max_workers = match lookup("WATCHQ_MAX_WORKERS") {
            Some(raw) => raw.trim().parse::<usize>().map_err(|e| {
                Error::Config(format!("WATCHQ_MAX_WORKERS must be a positive integer, got {raw:?}: {e}"))
            })?,
            None => defaults.max_workers,
        };

        let config = Self {
            input_dir: lookup("WATCHQ_INPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.input_dir),
            output_dir: lookup("WATCHQ_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            max_workers,
            otel_endpoint: lookup("OTEL_ENDPOINT").filter(|s| !s.is_empty()),
            log_level: lookup("LOG_LEVEL").unwrap_or(defaults.log_level),
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file. Missing keys take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read config file {}: {e}", path.display()))
        })?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("bad config file {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_workers == 0 {
            return Err(Error::Config("max_workers must be at least 1".to_string()));
        }
        Ok(())
    }
}
