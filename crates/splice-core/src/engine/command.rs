//! Lock-free command queue to the audio thread
//!
//! The runner pushes commands into an `rtrb` ring buffer; the audio callback
//! drains it at the start of every buffer. Neither side blocks, and the queue
//! is allocated once at start-up.
//!
//! Gain and the frame clock are not commands: they live in [`OutputAtomics`]
//! so the runner can read the clock at any time without a round trip.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use basedrop::Shared;

use super::output::ScheduledRange;
use crate::media::DecodedAudio;

/// Capacity of the command queue
///
/// Scheduling runs one block ahead, so the queue rarely holds more than a
/// couple of entries.
pub const COMMAND_QUEUE_CAPACITY: usize = 256;

/// Commands sent from the runner to the audio thread
pub enum OutputCommand {
    /// Swap in a new source buffer; sounding voices are dropped
    LoadSource(Shared<DecodedAudio>),
    /// Start a voice for a range of the current source
    Schedule(ScheduledRange),
    /// Drop every voice
    StopAll,
}

impl std::fmt::Debug for OutputCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputCommand::LoadSource(audio) => f
                .debug_struct("LoadSource")
                .field("samples", &audio.samples.len())
                .field("sample_rate", &audio.sample_rate)
                .finish(),
            OutputCommand::Schedule(range) => f.debug_tuple("Schedule").field(range).finish(),
            OutputCommand::StopAll => f.write_str("StopAll"),
        }
    }
}

/// Create the command queue
///
/// Returns `(Producer, Consumer)`: the producer stays with the runner, the
/// consumer moves into the audio callback.
pub fn command_channel() -> (rtrb::Producer<OutputCommand>, rtrb::Consumer<OutputCommand>) {
    rtrb::RingBuffer::new(COMMAND_QUEUE_CAPACITY)
}

/// State shared between the runner and the audio thread
///
/// All accesses are relaxed: each field is independent and only needs to be
/// eventually visible.
#[derive(Debug)]
pub struct OutputAtomics {
    /// Frames rendered since the stream started
    frames: AtomicU64,
    /// Output gain as `f32` bits
    gain: AtomicU32,
    sample_rate: u32,
}

impl OutputAtomics {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            frames: AtomicU64::new(0),
            gain: AtomicU32::new(0f32.to_bits()),
            sample_rate: sample_rate.max(1),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Frames rendered so far
    #[inline]
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn advance(&self, frames: u64) {
        self.frames.fetch_add(frames, Ordering::Relaxed);
    }

    /// Audio clock in seconds
    pub fn now(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    #[inline]
    pub fn gain(&self) -> f32 {
        f32::from_bits(self.gain.load(Ordering::Relaxed))
    }

    pub fn set_gain(&self, gain: f32) {
        self.gain.store(gain.to_bits(), Ordering::Relaxed);
    }
}
