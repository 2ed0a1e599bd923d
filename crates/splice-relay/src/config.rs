//! Relay configuration
//!
//! Stored as YAML; default location: ~/.config/splice/relay.yaml

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use splice_core::config::default_config_path as core_config_path;

/// Placeholder in speech-to-text arguments replaced by the extracted WAV path
pub const AUDIO_PLACEHOLDER: &str = "{audio}";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Listen address
    pub bind: String,
    /// Where transcoded videos and alignments are written (served at /uploads)
    pub upload_dir: PathBuf,
    /// ffmpeg executable
    pub ffmpeg: PathBuf,
    pub speech_to_text: SpeechToTextConfig,
    /// Base URL of the forced-alignment service
    pub aligner_url: String,
    /// Delay between alignment status polls
    pub status_poll_ms: u64,
    /// Largest accepted upload
    pub max_upload_mb: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
            upload_dir: PathBuf::from("uploads"),
            ffmpeg: PathBuf::from("ffmpeg"),
            speech_to_text: SpeechToTextConfig::default(),
            aligner_url: "http://localhost:8765".to_string(),
            status_poll_ms: 500,
            max_upload_mb: 512,
        }
    }
}

impl RelayConfig {
    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}

/// External speech-to-text command; the transcript is read from its stdout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechToTextConfig {
    pub command: PathBuf,
    pub args: Vec<String>,
}

impl Default for SpeechToTextConfig {
    fn default() -> Self {
        Self {
            command: PathBuf::from("whisper-cli"),
            args: vec![
                "-m".to_string(),
                "models/ggml-base.en.bin".to_string(),
                "-f".to_string(),
                AUDIO_PLACEHOLDER.to_string(),
                "-nt".to_string(),
            ],
        }
    }
}

impl SpeechToTextConfig {
    /// Arguments with the audio placeholder filled in
    pub fn args_for(&self, audio: &str) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| arg.replace(AUDIO_PLACEHOLDER, audio))
            .collect()
    }
}

/// Returns: ~/.config/splice/relay.yaml
pub fn default_config_path() -> PathBuf {
    core_config_path("relay.yaml")
}
