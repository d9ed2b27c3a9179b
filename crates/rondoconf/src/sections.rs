//! Configuration sections - things that cannot change at runtime.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Filesystem paths for songs and staged parts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory of source MIDI songs. Read-only to the server.
    /// Default: ~/.local/share/rondo/songs
    #[serde(default = "PathsConfig::default_songs_dir")]
    pub songs_dir: PathBuf,

    /// Scratch directory for generated parts. Deleted and recreated at the
    /// start of every distribution session - nothing of value may live here.
    /// Default: ~/.local/share/rondo/outbox
    #[serde(default = "PathsConfig::default_scratch_dir")]
    pub scratch_dir: PathBuf,
}

impl PathsConfig {
    fn default_songs_dir() -> PathBuf {
        directories::BaseDirs::new()
            .map(|dirs| dirs.home_dir().join(".local/share/rondo/songs"))
            .unwrap_or_else(|| PathBuf::from(".local/share/rondo/songs"))
    }

    fn default_scratch_dir() -> PathBuf {
        directories::BaseDirs::new()
            .map(|dirs| dirs.home_dir().join(".local/share/rondo/outbox"))
            .unwrap_or_else(|| PathBuf::from(".local/share/rondo/outbox"))
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            songs_dir: Self::default_songs_dir(),
            scratch_dir: Self::default_scratch_dir(),
        }
    }
}

/// Network bind addresses for this process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindConfig {
    /// TCP address the performer listener binds to.
    /// Default: 0.0.0.0:9310
    #[serde(default = "BindConfig::default_listen")]
    pub listen: String,
}

impl BindConfig {
    fn default_listen() -> String {
        "0.0.0.0:9310".to_string()
    }
}

impl Default for BindConfig {
    fn default() -> Self {
        Self {
            listen: Self::default_listen(),
        }
    }
}

/// Transfer tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Payload chunk size in bytes for socket writes.
    /// Default: 4096
    #[serde(default = "TransferConfig::default_chunk_size")]
    pub chunk_size: usize,

    /// Per-client inactivity timeout in seconds. A transfer exceeding this
    /// is recorded as failed without affecting sibling transfers.
    /// Default: 30
    #[serde(default = "TransferConfig::default_timeout_secs")]
    pub timeout_secs: u64,
}

impl TransferConfig {
    fn default_chunk_size() -> usize {
        4096
    }

    fn default_timeout_secs() -> u64 {
        30
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: Self::default_chunk_size(),
            timeout_secs: Self::default_timeout_secs(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Default log level directive when RUST_LOG is unset.
    /// Default: info
    #[serde(default = "TelemetryConfig::default_log_level")]
    pub log_level: String,
}

impl TelemetryConfig {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
        }
    }
}
