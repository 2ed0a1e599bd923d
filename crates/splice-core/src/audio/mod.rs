//! Audio device output
//!
//! Opens a cpal stream whose callback renders the voices the scheduler
//! queued. The runner talks to it only through [`CpalOutput`], which
//! implements [`AudioOutput`](crate::engine::AudioOutput).

mod config;
mod cpal_backend;
mod device;
mod error;

pub use config::{AudioConfig, DEFAULT_BUFFER_SIZE, DEFAULT_SAMPLE_RATE, MAX_BUFFER_SIZE};
pub use cpal_backend::CpalOutput;
pub use device::{default_device, find_device_by_name, output_device_names};
pub use error::{AudioError, AudioResult};
