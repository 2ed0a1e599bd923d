//! YAML configuration files
//!
//! Every Splice binary keeps its settings in one YAML file. Loading never
//! fails hard: a missing or unreadable file falls back to defaults so a fresh
//! machine starts without any setup.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Read and parse a config file
///
/// `Ok(None)` when the file does not exist.
pub fn read_config<T>(path: &Path) -> Result<Option<T>>
where
    T: DeserializeOwned,
{
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;
    let config = serde_yaml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;
    Ok(Some(config))
}

/// Load a config file, falling back to `T::default()`
pub fn load_config<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    match read_config(path) {
        Ok(Some(config)) => {
            log::info!("load_config: loaded {:?}", path);
            config
        }
        Ok(None) => {
            log::info!("load_config: {:?} not found, using defaults", path);
            T::default()
        }
        Err(e) => {
            log::warn!("load_config: {:#}, using defaults", e);
            T::default()
        }
    }
}

/// Write a config file
///
/// The YAML is written to a temporary file next to `path` and renamed over
/// it, so a crash never leaves a truncated config behind.
pub fn save_config<T>(config: &T, path: &Path) -> Result<()>
where
    T: Serialize,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create config directory: {:?}", dir))?;

    let yaml = serde_yaml::to_string(config).context("Failed to serialize config to YAML")?;

    let mut staged = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to stage config in {:?}", dir))?;
    staged
        .write_all(yaml.as_bytes())
        .context("Failed to write staged config")?;
    staged
        .persist(path)
        .with_context(|| format!("Failed to write config file: {:?}", path))?;

    log::info!("save_config: wrote {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    struct Settings {
        url: String,
        margin_ms: u32,
    }

    impl Default for Settings {
        fn default() -> Self {
            Self {
                url: "ws://localhost:8080/ws".to_string(),
                margin_ms: 50,
            }
        }
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings: Settings = load_config(&dir.path().join("absent.yaml"));
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("client.yaml");
        let settings = Settings {
            url: "ws://relay:9000/ws".to_string(),
            margin_ms: 80,
        };

        save_config(&settings, &path).unwrap();
        let loaded: Settings = load_config(&path);
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.yaml");
        std::fs::write(&path, "margin_ms: 10\n").unwrap();

        let loaded: Settings = load_config(&path);
        assert_eq!(loaded.margin_ms, 10);
        assert_eq!(loaded.url, Settings::default().url);
    }

    #[test]
    fn test_invalid_file_is_an_error_for_read_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        std::fs::write(&path, "margin_ms: [not a number").unwrap();

        assert!(read_config::<Settings>(&path).is_err());
        let loaded: Settings = load_config(&path);
        assert_eq!(loaded, Settings::default());
    }
}
