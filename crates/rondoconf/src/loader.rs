//! Config file discovery, loading, and environment variable overlay.

use crate::{ConfigError, RondoConfig};
use std::env;
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files in standard locations.
///
/// Returns paths in load order (system, user, local).
/// Only returns files that exist.
pub fn discover_config_files() -> Vec<PathBuf> {
    discover_config_files_with_override(None)
}

/// Discover config files, optionally with a CLI override path.
///
/// If `cli_path` is provided and exists, it replaces the local override.
/// Returns paths in load order (system, user, local/cli).
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    // System config
    let system = PathBuf::from("/etc/rondo/config.toml");
    if system.exists() {
        files.push(system);
    }

    // User config (XDG_CONFIG_HOME or ~/.config)
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("rondo/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    // CLI override takes precedence over local
    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    // Local override (current directory)
    let local = PathBuf::from("rondo.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Load a TOML file and overlay its values onto `config`.
///
/// Only keys present in the file are applied, so files loaded later win
/// without clobbering earlier values with defaults.
pub fn apply_file(config: &mut RondoConfig, path: &Path) -> Result<(), ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    apply_toml(config, &contents, path)
}

/// Overlay values from a TOML string onto `config`.
fn apply_toml(config: &mut RondoConfig, contents: &str, path: &Path) -> Result<(), ConfigError> {
    // Parse as raw TOML table so absent keys leave earlier values alone
    let table: toml::Table = contents
        .parse()
        .map_err(|e: toml::de::Error| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    if let Some(paths) = table.get("paths").and_then(|v| v.as_table()) {
        if let Some(v) = paths.get("songs_dir").and_then(|v| v.as_str()) {
            config.paths.songs_dir = expand_path(v);
        }
        if let Some(v) = paths.get("scratch_dir").and_then(|v| v.as_str()) {
            config.paths.scratch_dir = expand_path(v);
        }
    }

    if let Some(bind) = table.get("bind").and_then(|v| v.as_table()) {
        if let Some(v) = bind.get("listen").and_then(|v| v.as_str()) {
            config.bind.listen = v.to_string();
        }
    }

    if let Some(transfer) = table.get("transfer").and_then(|v| v.as_table()) {
        if let Some(v) = transfer.get("chunk_size").and_then(|v| v.as_integer()) {
            config.transfer.chunk_size = v as usize;
        }
        if let Some(v) = transfer.get("timeout_secs").and_then(|v| v.as_integer()) {
            config.transfer.timeout_secs = v as u64;
        }
    }

    if let Some(telemetry) = table.get("telemetry").and_then(|v| v.as_table()) {
        if let Some(v) = telemetry.get("log_level").and_then(|v| v.as_str()) {
            config.telemetry.log_level = v.to_string();
        }
    }

    Ok(())
}

/// Apply environment variable overrides to config.
pub fn apply_env_overrides(config: &mut RondoConfig, sources: &mut ConfigSources) {
    if let Ok(v) = env::var("RONDO_SONGS_DIR") {
        config.paths.songs_dir = expand_path(&v);
        sources.env_overrides.push("RONDO_SONGS_DIR".to_string());
    }
    if let Ok(v) = env::var("RONDO_SCRATCH_DIR") {
        config.paths.scratch_dir = expand_path(&v);
        sources.env_overrides.push("RONDO_SCRATCH_DIR".to_string());
    }
    if let Ok(v) = env::var("RONDO_LISTEN") {
        config.bind.listen = v;
        sources.env_overrides.push("RONDO_LISTEN".to_string());
    }
    if let Ok(v) = env::var("RONDO_CHUNK_SIZE") {
        if let Ok(n) = v.parse::<usize>() {
            config.transfer.chunk_size = n;
            sources.env_overrides.push("RONDO_CHUNK_SIZE".to_string());
        }
    }
    if let Ok(v) = env::var("RONDO_TIMEOUT_SECS") {
        if let Ok(n) = v.parse::<u64>() {
            config.transfer.timeout_secs = n;
            sources.env_overrides.push("RONDO_TIMEOUT_SECS".to_string());
        }
    }
    if let Ok(v) = env::var("RONDO_LOG_LEVEL") {
        config.telemetry.log_level = v;
        sources.env_overrides.push("RONDO_LOG_LEVEL".to_string());
    }
}

/// Expand `~` at the start of a path to the user's home directory.
fn expand_path(value: &str) -> PathBuf {
    if let Some(rest) = value.strip_prefix("~/") {
        if let Some(dirs) = directories::BaseDirs::new() {
            return dirs.home_dir().join(rest);
        }
    }
    PathBuf::from(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn apply_toml_overlays_present_keys_only() {
        let mut config = RondoConfig::default();
        let default_songs = config.paths.songs_dir.clone();

        let contents = r#"
[bind]
listen = "127.0.0.1:4000"

[transfer]
timeout_secs = 5
"#;
        apply_toml(&mut config, contents, Path::new("test.toml")).unwrap();

        assert_eq!(config.bind.listen, "127.0.0.1:4000");
        assert_eq!(config.transfer.timeout_secs, 5);
        // Untouched sections keep earlier values
        assert_eq!(config.paths.songs_dir, default_songs);
        assert_eq!(config.transfer.chunk_size, 4096);
    }

    #[test]
    fn apply_file_reports_parse_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "this is not toml = = =").unwrap();

        let mut config = RondoConfig::default();
        let err = apply_file(&mut config, file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn later_files_win() {
        let mut config = RondoConfig::default();
        apply_toml(
            &mut config,
            "[transfer]\nchunk_size = 1024\n",
            Path::new("a.toml"),
        )
        .unwrap();
        apply_toml(
            &mut config,
            "[transfer]\nchunk_size = 8192\n",
            Path::new("b.toml"),
        )
        .unwrap();
        assert_eq!(config.transfer.chunk_size, 8192);
    }

    #[test]
    fn expand_path_handles_tilde() {
        let expanded = expand_path("~/songs");
        assert!(!expanded.to_string_lossy().starts_with('~'));

        let plain = expand_path("/var/lib/rondo");
        assert_eq!(plain, PathBuf::from("/var/lib/rondo"));
    }
}
