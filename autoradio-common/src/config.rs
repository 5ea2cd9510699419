//! Configuration file discovery and data folder resolution

use crate::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directory name used under the platform config/data folders
pub const APP_DIR_NAME: &str = "autoradio";

/// Environment variable naming an explicit configuration file
pub const CONFIG_ENV_VAR: &str = "AUTORADIO_CONFIG";

/// Locate the bootstrap configuration file.
///
/// Priority order:
/// 1. Command-line argument (highest priority, must exist)
/// 2. Environment variable
/// 3. Platform config file (`~/.config/autoradio/config.toml`, then
///    `/etc/autoradio/config.toml` on Linux)
///
/// Returns `Ok(None)` when nothing was requested explicitly and no platform
/// file exists; callers then run on built-in defaults.
pub fn resolve_config_path(cli_arg: Option<&Path>, env_var_name: &str) -> Result<Option<PathBuf>> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        if !path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        return Ok(Some(path.to_path_buf()));
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        let path = PathBuf::from(path);
        if !path.exists() {
            return Err(Error::Config(format!(
                "Config file from {} not found: {}",
                env_var_name,
                path.display()
            )));
        }
        return Ok(Some(path));
    }

    // Priority 3: platform default locations
    let found = platform_config_file();
    if found.is_none() {
        debug!("No configuration file found, using built-in defaults");
    }
    Ok(found)
}

/// Get default configuration file path for the platform, if one exists
fn platform_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join("config.toml"));

    if let Some(path) = user_config {
        if path.exists() {
            debug!("Using user config file: {}", path.display());
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc").join(APP_DIR_NAME).join("config.toml");
        if system_config.exists() {
            debug!("Using system config file: {}", system_config.display());
            return Some(system_config);
        }
    }

    None
}

/// Get OS-dependent default data folder (database, sink output)
pub fn default_data_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/autoradio (or /var/lib/autoradio for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join(APP_DIR_NAME))
            .unwrap_or_else(|| PathBuf::from("/var/lib").join(APP_DIR_NAME))
    } else {
        dirs::data_local_dir()
            .map(|d| d.join(APP_DIR_NAME))
            .unwrap_or_else(|| PathBuf::from("./autoradio_data"))
    }
}
