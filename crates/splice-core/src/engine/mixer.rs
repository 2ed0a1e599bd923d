//! Parameter mixer - knobs to audio gain and video filter values
//!
//! Four knobs in `[0, 1]`:
//!
//! | knob | controls |
//! |------|----------|
//! | 0 | volume (exponential, 72 dB range) |
//! | 1 | brightness |
//! | 2 | sepia |
//! | 3 | contrast |

use serde::{Deserialize, Serialize};

use crate::types::NUM_KNOBS;

/// Dynamic range of the volume knob in decibels
pub const VOLUME_RANGE_DB: f32 = 72.0;

/// Knob index of the volume control
pub const KNOB_VOLUME: usize = 0;
/// Knob index of the brightness control
pub const KNOB_BRIGHTNESS: usize = 1;
/// Knob index of the sepia control
pub const KNOB_SEPIA: usize = 2;
/// Knob index of the contrast control
pub const KNOB_CONTRAST: usize = 3;

/// Map a volume fraction to a linear gain
///
/// `0` is silence; otherwise `10^(72·(frac−1)/20)`, so `1` is unity gain and
/// `0.5` is -36 dB.
pub fn volume_to_gain(frac: f32) -> f32 {
    if frac <= 0.0 {
        0.0
    } else {
        10f32.powf(VOLUME_RANGE_DB * (frac.min(1.0) - 1.0) / 20.0)
    }
}

/// The four mixer knobs
///
/// Serialized as a plain array (`[0.8, 0.0, 0.0, 0.5]`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Knobs(pub [f32; NUM_KNOBS]);

impl Default for Knobs {
    /// Full volume, neutral brightness, no sepia, normal contrast
    fn default() -> Self {
        Self([1.0, 0.0, 0.0, 0.5])
    }
}

impl Knobs {
    /// Build knobs from raw values, clamping each into `[0, 1]`
    ///
    /// NaN is treated as zero.
    pub fn clamped(values: [f32; NUM_KNOBS]) -> Self {
        Self(values.map(clamp_unit))
    }

    /// Set one knob (clamped). Out-of-range indices are ignored.
    pub fn set(&mut self, index: usize, value: f32) -> bool {
        match self.0.get_mut(index) {
            Some(slot) => {
                *slot = clamp_unit(value);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, index: usize) -> Option<f32> {
        self.0.get(index).copied()
    }

    pub fn volume(&self) -> f32 {
        self.0[KNOB_VOLUME]
    }

    /// Linear output gain for the volume knob
    pub fn gain(&self) -> f32 {
        volume_to_gain(self.volume())
    }

    /// Video filter for the brightness/sepia/contrast knobs
    pub fn video_filter(&self) -> VideoFilter {
        VideoFilter::from_knobs(self)
    }
}

fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Video filter values in percent
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoFilter {
    pub brightness: f32,
    pub contrast: f32,
    pub sepia: f32,
}

impl VideoFilter {
    pub fn from_knobs(knobs: &Knobs) -> Self {
        Self {
            brightness: 100.0 + 300.0 * knobs.0[KNOB_BRIGHTNESS],
            contrast: 200.0 * knobs.0[KNOB_CONTRAST],
            sepia: 100.0 * knobs.0[KNOB_SEPIA],
        }
    }

    /// CSS filter string for the video collaborator
    pub fn to_css(&self) -> String {
        format!(
            "brightness({}%) contrast({}%) sepia({}%)",
            self.brightness, self.contrast, self.sepia
        )
    }
}

impl std::fmt::Display for VideoFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_css())
    }
}
