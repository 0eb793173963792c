//! Configuration management for the CLI
//!
//! Precedence, lowest first: built-in defaults, `~/.config/rightsize/config.toml`,
//! `RIGHTSIZE_*` environment variables, command-line flags.

use crate::output::OutputFormat;
use anyhow::{anyhow, Context, Result};
use clap::ValueEnum;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// CLI configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Upper bound for one stats collection, in seconds
    pub timeout_secs: u64,
    /// Directory of rule files used instead of the bundled rules
    #[serde(default)]
    pub rules_dir: Option<PathBuf>,
    /// Emit logs as JSON
    pub log_json: bool,
    /// Default output format
    pub format: String,
}

impl Settings {
    /// Load from the default config file location and the environment
    pub fn load() -> Result<Self> {
        Self::load_from(Self::config_path().as_deref())
    }

    /// Load from an explicit config file (missing files are ignored) and the environment
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder()
            .set_default("timeout_secs", 30)?
            .set_default("log_json", false)?
            .set_default("format", "table")?;

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }

        let settings = builder
            .add_source(config::Environment::with_prefix("RIGHTSIZE").try_parsing(true))
            .build()
            .context("Failed to load configuration")?;

        settings
            .try_deserialize()
            .context("Failed to parse configuration")
    }

    /// Get the configuration file path
    fn config_path() -> Option<PathBuf> {
        dirs_next::home_dir().map(|home| home.join(".config").join("rightsize").join("config.toml"))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn output_format(&self) -> Result<OutputFormat> {
        OutputFormat::from_str(&self.format, true)
            .map_err(|_| anyhow!("Unknown output format in configuration: {}", self.format))
    }
}
