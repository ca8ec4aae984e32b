//! Initialize the configuration directory: create ~/.canvasqa, the default config, and an empty storage file.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config;

static DEFAULT_CONFIG: &str = include_str!("../config/config.json");

/// Create the config directory and default files if they do not exist.
/// - Creates the config directory (parent of config file path).
/// - Writes `config.json` from the bundled template if missing.
/// - Writes an empty storage file (`{}`) at the resolved storage path if missing.
///
/// Returns the config directory.
pub fn init_config_dir(config_path: &Path) -> Result<PathBuf> {
    let config_dir = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(config_dir)
        .with_context(|| format!("creating config directory {}", config_dir.display()))?;

    if !config_path.exists() {
        std::fs::write(config_path, DEFAULT_CONFIG)
            .with_context(|| format!("writing default config to {}", config_path.display()))?;
        log::info!("created default config at {}", config_path.display());
    } else {
        log::debug!("config already exists at {}, skipping", config_path.display());
    }

    let (cfg, _) = config::load_config(Some(config_path.to_path_buf()))?;
    let storage_path = config::resolve_storage_path(&cfg, config_path);
    if !storage_path.exists() {
        if let Some(parent) = storage_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating storage directory {}", parent.display()))?;
        }
        std::fs::write(&storage_path, b"{}")
            .with_context(|| format!("writing storage file {}", storage_path.display()))?;
        log::info!("created storage file at {}", storage_path.display());
    }

    Ok(config_dir.to_path_buf())
}
