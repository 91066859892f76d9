//! Default values for asset-shelf configuration.
//!
//! This module provides centralized default values used across commands,
//! ensuring consistency and avoiding duplication.

use std::path::PathBuf;

/// File name of the configuration file.
pub const DEFAULT_CONFIG_FILENAME: &str = "asset-shelf.yaml";

/// File name of the catalog definition file at every library root.
pub const CATALOG_FILENAME: &str = "asset_catalogs.txt";

/// Returns the default configuration file location.
///
/// Uses the platform-appropriate config directory:
/// - Linux: `~/.config/asset-shelf/asset-shelf.yaml`
/// - macOS: `~/Library/Application Support/asset-shelf/asset-shelf.yaml`
/// - Windows: `{FOLDERID_RoamingAppData}\asset-shelf\asset-shelf.yaml`
///
/// Falls back to `asset-shelf.yaml` in the current directory if the platform
/// config directory cannot be determined.
///
/// This can be overridden by the `--config` CLI flag or the
/// `ASSET_SHELF_CONFIG` environment variable.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("asset-shelf").join(DEFAULT_CONFIG_FILENAME))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILENAME))
}

/// Returns the default trash directory for disposed containers.
///
/// Uses the platform data directory (`~/.local/share/asset-shelf/trash` on
/// Linux) and falls back to `.asset-shelf-trash` in the current directory.
pub fn default_trash_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("asset-shelf").join("trash"))
        .unwrap_or_else(|| PathBuf::from(".asset-shelf-trash"))
}
