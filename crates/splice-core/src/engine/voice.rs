//! Audio-thread voice mixer
//!
//! Owned exclusively by the audio callback. Each scheduled range becomes a
//! voice with a start frame on the output clock; rendering walks the output
//! frames and sums every voice that is sounding at that frame, reading the
//! source with linear interpolation so the source and device rates may
//! differ.
//!
//! ```text
//!  output clock:   ... |==== voice A ====|==== voice B ====| ...
//!                      ^ start_frame      ^ start_frame (A's end)
//! ```
//!
//! Because voices are placed by absolute frame, back-to-back ranges join
//! without gaps or overlap regardless of buffer boundaries.

use std::sync::Arc;

use basedrop::Shared;

use super::command::{OutputAtomics, OutputCommand};
use super::output::ScheduledRange;
use crate::media::DecodedAudio;

/// Maximum simultaneously tracked voices
///
/// With one-block lookahead at most two or three are alive at once.
pub const MAX_VOICES: usize = 32;

#[derive(Debug, Clone, Copy)]
struct Voice {
    /// First output frame of the voice
    start_frame: u64,
    /// Output frame one past the last
    end_frame: u64,
    /// Source position (in source samples) at `start_frame`
    source_start: f64,
}

/// Mixes scheduled voices into a mono output buffer
pub struct VoiceMixer {
    atomics: Arc<OutputAtomics>,
    source: Option<Shared<DecodedAudio>>,
    voices: Vec<Voice>,
    /// Whether rendered audio reaches the device (false for editors)
    connected: bool,
}

impl VoiceMixer {
    pub fn new(atomics: Arc<OutputAtomics>, connected: bool) -> Self {
        Self {
            atomics,
            source: None,
            voices: Vec::with_capacity(MAX_VOICES),
            connected,
        }
    }

    /// Number of live voices
    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    /// Drain the command queue
    pub fn process_commands(&mut self, rx: &mut rtrb::Consumer<OutputCommand>) {
        while let Ok(command) = rx.pop() {
            self.handle(command);
        }
    }

    fn handle(&mut self, command: OutputCommand) {
        match command {
            OutputCommand::LoadSource(source) => {
                self.voices.clear();
                // The old buffer's last reference is dropped here; basedrop
                // defers the free to the collector thread
                self.source = Some(source);
            }
            OutputCommand::Schedule(range) => self.add_voice(range),
            OutputCommand::StopAll => self.voices.clear(),
        }
    }

    fn add_voice(&mut self, range: ScheduledRange) {
        let Some(source) = &self.source else {
            return;
        };
        if self.voices.len() >= MAX_VOICES || range.duration <= 0.0 {
            return;
        }
        let rate = self.atomics.sample_rate() as f64;
        let start_frame = (range.start_at * rate).round().max(0.0) as u64;
        let length = (range.duration * rate).round() as u64;
        self.voices.push(Voice {
            start_frame,
            end_frame: start_frame + length,
            source_start: range.offset * source.sample_rate as f64,
        });
    }

    /// Render `out.len()` mono frames and advance the clock
    pub fn render(&mut self, out: &mut [f32]) {
        let frames = out.len() as u64;
        let clock = self.atomics.frames();

        out.fill(0.0);

        if let (true, Some(source)) = (self.connected, &self.source) {
            let gain = self.atomics.gain();
            let step = source.sample_rate as f64 / self.atomics.sample_rate() as f64;

            for voice in &self.voices {
                let from = voice.start_frame.max(clock);
                let to = voice.end_frame.min(clock + frames);
                for frame in from..to {
                    let position = voice.source_start + (frame - voice.start_frame) as f64 * step;
                    out[(frame - clock) as usize] += sample_at(&source.samples, position);
                }
            }

            if gain != 1.0 {
                for sample in out.iter_mut() {
                    *sample *= gain;
                }
            }
        }

        let end = clock + frames;
        self.voices.retain(|v| v.end_frame > end);
        self.atomics.advance(frames);
    }
}

/// Linearly interpolated read; silence outside the buffer
#[inline]
fn sample_at(samples: &[f32], position: f64) -> f32 {
    if position < 0.0 {
        return 0.0;
    }
    let index = position as usize;
    let frac = (position - index as f64) as f32;
    match (samples.get(index), samples.get(index + 1)) {
        (Some(&a), Some(&b)) => a + (b - a) * frac,
        (Some(&a), None) => a * (1.0 - frac),
        _ => 0.0,
    }
}
