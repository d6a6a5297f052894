//! Configuration loader.
//!
//! Reads `config.toml` from the data directory (`~/.feedstash/` by default)
//! and deserializes it into [`StashConfig`]. Falls back to defaults when the
//! file is missing or malformed; a broken config file must never prevent the
//! persistence layer from starting.

use std::path::{Path, PathBuf};

use feedstash_types::config::StashConfig;

/// Load configuration from `{data_dir}/config.toml`.
///
/// - If the file does not exist, returns [`StashConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the
///   default.
/// - Otherwise returns the parsed config, with absent fields defaulted.
pub async fn load_stash_config(data_dir: &Path) -> StashConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return StashConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return StashConfig::default();
        }
    };

    match toml::from_str::<StashConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            StashConfig::default()
        }
    }
}

/// Resolve the data directory: `FEEDSTASH_DATA_DIR` if set, else
/// `~/.feedstash`, else `.feedstash` relative to the working directory for
/// environments with no resolvable home.
pub fn default_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("FEEDSTASH_DATA_DIR") {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }
    match dirs::home_dir() {
        Some(home) => home.join(".feedstash"),
        None => PathBuf::from(".feedstash"),
    }
}
