//! CPAL audio output
//!
//! ```text
//! ┌──────────────────┐   push()    ┌─────────────────────┐
//! │   Runner task    │────────────►│   Command Queue     │
//! │ (Scheduler poll) │             │  (lock-free SPSC)   │
//! └──────────────────┘             └──────────┬──────────┘
//!         ▲                                   │ pop()
//!         │ Relaxed atomics                   ▼
//! ┌──────────────────┐             ┌─────────────────────┐
//! │  OutputAtomics   │◄────────────│  CPAL Audio Thread  │
//! │ (clock, gain)    │   advance   │  (owns VoiceMixer)  │
//! └──────────────────┘             └─────────────────────┘
//! ```
//!
//! The audio thread owns the [`VoiceMixer`] outright; nothing is locked on
//! either side.

use std::sync::Arc;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{BufferSize as CpalBufferSize, SampleFormat, Stream, StreamConfig};

use super::config::{AudioConfig, MAX_BUFFER_SIZE};
use super::device::{default_device, find_device_by_name};
use super::error::{AudioError, AudioResult};
use crate::engine::gc::share_source;
use crate::engine::{
    command_channel, AudioOutput, OutputAtomics, OutputCommand, ScheduledRange, VoiceMixer,
};
use crate::media::DecodedAudio;

/// Audio output backed by a cpal stream
///
/// Keeps the stream alive; drop it to stop audio.
pub struct CpalOutput {
    _stream: Stream,
    producer: rtrb::Producer<OutputCommand>,
    atomics: Arc<OutputAtomics>,
    sample_rate: u32,
    buffer_size: u32,
}

impl CpalOutput {
    /// Open the configured device and start the stream
    ///
    /// With `connected == false` the stream runs and the clock advances, but
    /// only silence reaches the device.
    pub fn open(config: &AudioConfig, connected: bool) -> AudioResult<Self> {
        let device = match &config.device {
            Some(name) => find_device_by_name(name)?,
            None => default_device()?,
        };

        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        log::info!("Using audio device: {}", device_name);

        let supported = output_config(&device, config)?;
        let sample_rate = supported.sample_rate().0;
        let buffer_size = config.buffer_frames();
        let stream_config = StreamConfig {
            channels: supported.channels(),
            sample_rate: supported.sample_rate(),
            buffer_size: CpalBufferSize::Fixed(buffer_size),
        };

        log::info!(
            "Audio config: {} channels, {}Hz, {} frames (~{:.1}ms latency){}",
            stream_config.channels,
            sample_rate,
            buffer_size,
            config.latency_ms(sample_rate),
            if connected { "" } else { ", muted" }
        );

        let atomics = Arc::new(OutputAtomics::new(sample_rate));
        let (producer, consumer) = command_channel();
        let mixer = VoiceMixer::new(Arc::clone(&atomics), connected);

        let stream = build_output_stream(&device, &stream_config, mixer, consumer)?;
        stream
            .play()
            .map_err(|e| AudioError::StreamPlayError(e.to_string()))?;

        Ok(Self {
            _stream: stream,
            producer,
            atomics,
            sample_rate,
            buffer_size,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn buffer_size(&self) -> u32 {
        self.buffer_size
    }

    fn send(&mut self, command: OutputCommand) {
        if let Err(e) = self.producer.push(command) {
            log::warn!("Audio command queue full, dropping {:?}", e);
        }
    }
}

impl AudioOutput for CpalOutput {
    fn now(&self) -> f64 {
        self.atomics.now()
    }

    fn schedule(&mut self, range: ScheduledRange) {
        self.send(OutputCommand::Schedule(range));
    }

    fn set_gain(&mut self, gain: f32) {
        self.atomics.set_gain(gain);
    }

    fn stop_all(&mut self) {
        self.send(OutputCommand::StopAll);
    }

    fn load_source(&mut self, audio: DecodedAudio) {
        self.send(OutputCommand::LoadSource(share_source(audio)));
    }
}

/// Pick an f32 output configuration at the requested rate if possible
fn output_config(
    device: &cpal::Device,
    config: &AudioConfig,
) -> AudioResult<cpal::SupportedStreamConfig> {
    let supported: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?
        .filter(|c| c.sample_format() == SampleFormat::F32)
        .collect();

    let target = config.target_sample_rate();
    let in_range =
        |c: &cpal::SupportedStreamConfigRange| target >= c.min_sample_rate().0 && target <= c.max_sample_rate().0;

    let best = supported
        .iter()
        .find(|c| in_range(*c))
        .or_else(|| supported.first())
        .ok_or_else(|| AudioError::ConfigError("No f32 output configuration".to_string()))?;

    let sample_rate = if in_range(best) {
        cpal::SampleRate(target)
    } else {
        let fallback = best.max_sample_rate();
        log::warn!(
            "Audio device doesn't support {}Hz, falling back to {}Hz",
            target,
            fallback.0
        );
        fallback
    };

    Ok(best.clone().with_sample_rate(sample_rate))
}

fn build_output_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    mut mixer: VoiceMixer,
    mut consumer: rtrb::Consumer<OutputCommand>,
) -> AudioResult<Stream> {
    let channels = config.channels.max(1) as usize;
    // Mono scratch, allocated once
    let mut scratch = vec![0.0f32; MAX_BUFFER_SIZE as usize];

    device
        .build_output_stream(
            config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                mixer.process_commands(&mut consumer);

                for chunk in data.chunks_mut(channels * scratch.len()) {
                    let frames = chunk.len() / channels;
                    let mono = &mut scratch[..frames];
                    mixer.render(mono);
                    for (frame, &sample) in chunk.chunks_mut(channels).zip(mono.iter()) {
                        frame.fill(sample);
                    }
                }
            },
            move |err| {
                log::error!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| AudioError::StreamBuildError(e.to_string()))
}
