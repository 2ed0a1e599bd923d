//! Audio output configuration

use serde::{Deserialize, Serialize};

/// Upper bound on the buffer size accepted from configuration (frames)
pub const MAX_BUFFER_SIZE: u32 = 8192;

/// Buffer size used when none is configured (frames)
pub const DEFAULT_BUFFER_SIZE: u32 = 512;

/// Sample rate requested when none is configured
pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

/// Configuration for the audio output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Output device name (None = system default)
    pub device: Option<String>,
    /// Preferred sample rate (None = 48 kHz if the device supports it)
    pub sample_rate: Option<u32>,
    /// Preferred buffer size in frames (None = 512)
    pub buffer_size: Option<u32>,
}

impl AudioConfig {
    /// Requested buffer size, clamped into a sane range
    pub fn buffer_frames(&self) -> u32 {
        self.buffer_size
            .unwrap_or(DEFAULT_BUFFER_SIZE)
            .clamp(64, MAX_BUFFER_SIZE)
    }

    pub fn target_sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE)
    }

    /// Latency of one buffer in milliseconds at `sample_rate`
    pub fn latency_ms(&self, sample_rate: u32) -> f32 {
        (self.buffer_frames() as f32 / sample_rate.max(1) as f32) * 1000.0
    }
}
