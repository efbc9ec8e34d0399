//! Data directory resolution and `config.toml` loading.
//!
//! All persistent state lives under one data directory, overridable via
//! `DRIFTCHAT_DATA_DIR` for tests and packaging.

use std::path::{Path, PathBuf};

use tracing::warn;

use driftchat_types::config::ServerConfig;

/// Resolve the data directory: `DRIFTCHAT_DATA_DIR` if set, otherwise
/// `~/.driftchat`.
pub fn data_dir() -> PathBuf {
    match std::env::var("DRIFTCHAT_DATA_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".driftchat"),
    }
}

/// Load `config.toml` from the data directory.
///
/// A missing file yields the full default configuration; a present but
/// partial file fills the gaps with defaults (every field has a serde
/// default). A file that fails to read or parse is logged and replaced by
/// the defaults rather than aborting startup.
pub fn load_config(data_dir: &Path) -> ServerConfig {
    let path = data_dir.join("config.toml");
    if !path.exists() {
        return ServerConfig::default();
    }
    let raw = match std::fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(err) => {
            warn!(path = %path.display(), %err, "Failed to read config.toml, using defaults");
            return ServerConfig::default();
        }
    };
    match toml::from_str(&raw) {
        Ok(config) => config,
        Err(err) => {
            warn!(path = %path.display(), %err, "Failed to parse config.toml, using defaults");
            ServerConfig::default()
        }
    }
}
