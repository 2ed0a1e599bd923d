//! Playback engine - scheduler, parameter mixer, audio-thread plumbing
//!
//! This module contains the playback side of a Splice client:
//! - Scheduler: lookahead loop turning the editor sequence into timed ranges
//! - Mixer: knob values to output gain and video filter values
//! - Output: the `AudioOutput` seam between the scheduler and a device
//! - Voice mixer: the audio-thread renderer behind the cpal output

mod command;
mod deferred;
pub mod gc;
mod mixer;
mod output;
mod scheduler;
mod voice;

pub use command::{command_channel, OutputAtomics, OutputCommand, COMMAND_QUEUE_CAPACITY};
pub use deferred::{DeferredTask, Fired};
pub use mixer::*;
pub use output::{AudioOutput, NullOutput, ScheduledRange};
pub use scheduler::{
    PlaybackObserver, Scheduler, SchedulerState, DEFAULT_SAFETY_MARGIN,
};
pub use voice::{VoiceMixer, MAX_VOICES};
