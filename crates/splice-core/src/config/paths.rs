//! Standard locations of Splice configuration files

use std::path::PathBuf;

/// Directory holding every Splice config file
///
/// Returns: `~/.config/splice` (or the platform equivalent)
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("splice")
}

/// Default path of a named config file inside [`config_dir`]
pub fn default_config_path(filename: &str) -> PathBuf {
    config_dir().join(filename)
}
