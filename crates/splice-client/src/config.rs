//! Client configuration for splice-client
//!
//! Configuration is stored as YAML in the user's config directory.
//! Default location: ~/.config/splice/client.yaml

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use splice_core::audio::AudioConfig;
use splice_core::config::default_config_path as core_config_path;
use splice_core::engine::{Knobs, DEFAULT_SAFETY_MARGIN};
use splice_core::Role;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Relay websocket URL
    pub server_url: String,
    /// Participation mode (editor, player or both)
    pub role: Role,
    /// Output device settings
    pub audio: AudioConfig,
    /// Playback scheduling
    pub scheduler: SchedulerConfig,
    /// Knob values applied at start-up (until a peer sends its own)
    pub knobs: Knobs,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://localhost:8080/ws".to_string(),
            role: Role::default(),
            audio: AudioConfig::default(),
            scheduler: SchedulerConfig::default(),
            knobs: Knobs::default(),
        }
    }
}

/// Scheduler section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// How long before a block boundary the next block is scheduled
    pub safety_margin_ms: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            safety_margin_ms: (DEFAULT_SAFETY_MARGIN * 1000.0) as u32,
        }
    }
}

impl SchedulerConfig {
    pub fn safety_margin(&self) -> f64 {
        self.safety_margin_ms as f64 / 1000.0
    }
}

/// Get the default config file path
///
/// Returns: ~/.config/splice/client.yaml
pub fn default_config_path() -> PathBuf {
    core_config_path("client.yaml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use splice_core::config::{load_config, save_config};

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.role, Role::Both);
        assert_eq!(config.scheduler.safety_margin_ms, 50);
        assert!((config.scheduler.safety_margin() - 0.05).abs() < 1e-9);
    }

    #[test]
    fn test_yaml_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.yaml");
        std::fs::write(
            &path,
            "server_url: ws://relay.local:8080/ws\nrole: player\nscheduler:\n  safety_margin_ms: 80\nknobs: [0.5, 0.0, 0.0, 0.5]\n",
        )
        .unwrap();

        let config: ClientConfig = load_config(&path);
        assert_eq!(config.server_url, "ws://relay.local:8080/ws");
        assert_eq!(config.role, Role::Player);
        assert_eq!(config.scheduler.safety_margin_ms, 80);
        assert_eq!(config.knobs, Knobs([0.5, 0.0, 0.0, 0.5]));
        assert_eq!(config.audio, AudioConfig::default());

        save_config(&config, &path).unwrap();
        let again: ClientConfig = load_config(&path);
        assert_eq!(again.role, Role::Player);
    }
}
