//! Minimal configuration loading for Rondo.
//!
//! This crate provides configuration loading with minimal dependencies so it
//! can be imported by every Rondo crate without dependency cycles.
//!
//! # Usage
//!
//! ```rust,no_run
//! use rondoconf::RondoConfig;
//!
//! let config = RondoConfig::load().expect("Failed to load config");
//!
//! println!("songs dir: {}", config.paths.songs_dir.display());
//! println!("listening on: {}", config.bind.listen);
//! ```
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/rondo/config.toml` (system)
//! 2. `~/.config/rondo/config.toml` (user)
//! 3. `./rondo.toml` (local override)
//! 4. Environment variables (`RONDO_*`)
//!
//! # Example Config
//!
//! ```toml
//! [paths]
//! songs_dir = "~/.local/share/rondo/songs"
//! scratch_dir = "~/.local/share/rondo/outbox"
//!
//! [bind]
//! listen = "0.0.0.0:9310"
//!
//! [transfer]
//! chunk_size = 4096
//! timeout_secs = 30
//!
//! [telemetry]
//! log_level = "info"
//! ```

pub mod loader;
pub mod sections;

pub use loader::{discover_config_files, discover_config_files_with_override, ConfigSources};
pub use sections::{BindConfig, PathsConfig, TelemetryConfig, TransferConfig};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Complete Rondo configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RondoConfig {
    /// Filesystem locations for songs and staged parts.
    #[serde(default)]
    pub paths: PathsConfig,

    /// Network bind addresses.
    #[serde(default)]
    pub bind: BindConfig,

    /// Transfer tuning: chunking and per-client timeout.
    #[serde(default)]
    pub transfer: TransferConfig,

    /// Logging configuration.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl RondoConfig {
    /// Load configuration from all sources.
    ///
    /// Load order (later wins):
    /// 1. Compiled defaults
    /// 2. `/etc/rondo/config.toml`
    /// 3. `~/.config/rondo/config.toml`
    /// 4. `./rondo.toml`
    /// 5. Environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration from a specific file path, then apply env overrides.
    ///
    /// If `config_path` is provided, it takes precedence over the local
    /// `./rondo.toml` override. System and user configs still load first.
    pub fn load_from(config_path: Option<&std::path::Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration and return information about sources.
    pub fn load_with_sources() -> Result<(Self, ConfigSources), ConfigError> {
        Self::load_with_sources_from(None)
    }

    /// Load configuration from optional path and return information about sources.
    pub fn load_with_sources_from(
        config_path: Option<&std::path::Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut config = RondoConfig::default();

        for path in loader::discover_config_files_with_override(config_path) {
            loader::apply_file(&mut config, &path)?;
            sources.files.push(path);
        }

        loader::apply_env_overrides(&mut config, &mut sources);

        Ok((config, sources))
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> String {
        // Build TOML manually for nicer formatting
        let mut output = String::new();

        output.push_str("# Rondo Configuration\n\n");

        output.push_str("[paths]\n");
        output.push_str(&format!(
            "songs_dir = \"{}\"\n",
            self.paths.songs_dir.display()
        ));
        output.push_str(&format!(
            "scratch_dir = \"{}\"\n",
            self.paths.scratch_dir.display()
        ));

        output.push_str("\n[bind]\n");
        output.push_str(&format!("listen = \"{}\"\n", self.bind.listen));

        output.push_str("\n[transfer]\n");
        output.push_str(&format!("chunk_size = {}\n", self.transfer.chunk_size));
        output.push_str(&format!("timeout_secs = {}\n", self.transfer.timeout_secs));

        output.push_str("\n[telemetry]\n");
        output.push_str(&format!("log_level = \"{}\"\n", self.telemetry.log_level));

        output
    }
}
