//! Audio output error types

use thiserror::Error;

/// Errors that can occur while opening the audio output
#[derive(Error, Debug)]
pub enum AudioError {
    /// Host has no default output device
    #[error("No default audio output device")]
    NoDefaultDevice,

    /// Configured device does not exist
    #[error("Audio device not found: {0}")]
    DeviceNotFound(String),

    /// Device enumeration or configuration query failed
    #[error("Failed to get device config: {0}")]
    ConfigError(String),

    /// Failed to build audio stream
    #[error("Failed to build audio stream: {0}")]
    StreamBuildError(String),

    /// Failed to start the stream
    #[error("Failed to start audio stream: {0}")]
    StreamPlayError(String),
}

/// Result type for audio operations
pub type AudioResult<T> = Result<T, AudioError>;
