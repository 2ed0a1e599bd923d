//! Audio output seam
//!
//! The scheduler never talks to a device directly. It asks an [`AudioOutput`]
//! for the audio clock and hands it [`ScheduledRange`]s to play at absolute
//! clock times. Two implementations exist:
//!
//! - [`CpalOutput`](crate::audio::CpalOutput): a real device; ranges are
//!   mixed on the audio thread
//! - [`NullOutput`]: wall clock only, used when no device is available

use std::time::Instant;

use crate::media::DecodedAudio;

/// A sub-range of the loaded source to play at an absolute clock time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledRange {
    /// Audio-clock time in seconds at which playback of the range begins
    pub start_at: f64,
    /// Offset into the source in seconds
    pub offset: f64,
    /// Length of the range in seconds
    pub duration: f64,
}

impl ScheduledRange {
    /// Audio-clock time at which the range has finished
    pub fn end_at(&self) -> f64 {
        self.start_at + self.duration
    }
}

/// Something that can play ranges of a decoded source against its own clock
pub trait AudioOutput {
    /// Current audio-clock time in seconds
    fn now(&self) -> f64;

    /// Queue a range for playback
    fn schedule(&mut self, range: ScheduledRange);

    /// Set the output gain (linear)
    fn set_gain(&mut self, gain: f32);

    /// Silence and discard every queued or sounding range
    fn stop_all(&mut self);

    /// Replace the source buffer that ranges are read from
    fn load_source(&mut self, audio: DecodedAudio);
}

/// Output with no device behind it
///
/// The clock is wall time since creation. Useful for editor-only machines
/// without a sound card ("UI-only mode").
#[derive(Debug)]
pub struct NullOutput {
    epoch: Instant,
}

impl NullOutput {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for NullOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioOutput for NullOutput {
    fn now(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    fn schedule(&mut self, range: ScheduledRange) {
        log::trace!(
            "null output: range {:.3}s+{:.3}s at {:.3}",
            range.offset,
            range.duration,
            range.start_at
        );
    }

    fn set_gain(&mut self, gain: f32) {
        log::trace!("null output: gain {:.4}", gain);
    }

    fn stop_all(&mut self) {}

    fn load_source(&mut self, audio: DecodedAudio) {
        log::debug!(
            "null output: source of {:.2}s ignored",
            audio.duration()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_output_clock_advances() {
        let mut output = NullOutput::new();
        let t0 = output.now();
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(output.now() > t0);

        output.schedule(ScheduledRange {
            start_at: 0.0,
            offset: 1.0,
            duration: 0.5,
        });
        output.set_gain(0.25);
        output.stop_all();
        assert!(output.now() > t0);
    }
}
