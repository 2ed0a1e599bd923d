//! Splice Core - Shared library for the Splice transcript cut-up tools
//!
//! This crate provides the core functionality shared between the Splice
//! client and relay:
//! - Segment model: alignment results to contiguous transcript blocks
//! - Sequence engine: reorderable editor blocks with stable identity
//! - Playback engine: lookahead scheduler, parameter mixer, audio output
//! - Sync protocol: relay messages and the per-client session
//! - Config: YAML configuration I/O

pub mod audio;
pub mod config;
pub mod engine;
pub mod media;
pub mod segment;
pub mod sequence;
pub mod sync;
pub mod types;

pub use types::*;
