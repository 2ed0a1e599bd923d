//! Media decoding
//!
//! A loaded video contributes two things to a session: the decoded audio
//! track, which the scheduler slices into block-sized ranges, and the
//! alignment result the transcript blocks are generated from. Both are turned
//! into a [`LoadedMedia`] before the session sees them, so a failed decode
//! aborts the load without touching the current state.

mod error;

pub use error::{MediaError, MediaResult};

use std::io::Cursor;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::segment;
use crate::types::{AlignmentResult, TranscriptBlock};

/// Mono audio at its native sample rate
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Length in seconds
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Everything a session needs to install a video
#[derive(Debug, Clone)]
pub struct LoadedMedia {
    /// Base URL the media was fetched from (without extension)
    pub url: String,
    pub audio: DecodedAudio,
    pub transcript: Vec<TranscriptBlock>,
}

impl LoadedMedia {
    /// Decode the media bytes and build the transcript blocks
    ///
    /// The transcript covers the decoded audio's full duration.
    pub fn prepare(url: &str, media: Vec<u8>, alignment_json: &str) -> MediaResult<Self> {
        let alignment = AlignmentResult::from_json(alignment_json)?;
        let audio = decode_audio(media, Some("mp4"))?;
        let transcript = segment::generate(&alignment, audio.duration());

        log::info!(
            "prepare: {} decoded ({:.2}s @ {}Hz, {} blocks)",
            url,
            audio.duration(),
            audio.sample_rate,
            transcript.len()
        );

        Ok(Self {
            url: url.to_string(),
            audio,
            transcript,
        })
    }
}

/// Decode the first audio track of an in-memory container, downmixed to mono
pub fn decode_audio(bytes: Vec<u8>, extension: Option<&str>) -> MediaResult<DecodedAudio> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| MediaError::UnsupportedFormat(e.to_string()))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(MediaError::NoAudioTrack)?;

    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| MediaError::UnsupportedFormat("Unknown sample rate".to_string()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| MediaError::UnsupportedFormat(e.to_string()))?;

    let mut samples: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;
    let mut channels = 1usize;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => {
                log::warn!("decode_audio: error reading packet: {}", e);
                break;
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(e) => {
                log::warn!("decode_audio: error decoding packet: {}", e);
                continue;
            }
        };

        if sample_buf.is_none() {
            let spec = *decoded.spec();
            channels = spec.channels.count().max(1);
            sample_buf = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
        }

        if let Some(ref mut buf) = sample_buf {
            buf.copy_interleaved_ref(decoded);
            downmix_into(buf.samples(), channels, &mut samples);
        }
    }

    if samples.is_empty() {
        return Err(MediaError::Empty);
    }

    Ok(DecodedAudio::new(samples, sample_rate))
}

/// Average interleaved frames into mono samples
fn downmix_into(interleaved: &[f32], channels: usize, out: &mut Vec<f32>) {
    if channels == 1 {
        out.extend_from_slice(interleaved);
        return;
    }
    let scale = 1.0 / channels as f32;
    out.extend(
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() * scale),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_bytes(channels: u16, sample_rate: u32, frames: usize, value: i16) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for _ in 0..frames * channels as usize {
                writer.write_sample(value).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_decode_mono_wav() {
        let audio = decode_audio(wav_bytes(1, 16_000, 1600, 16384), Some("wav")).unwrap();
        assert_eq!(audio.sample_rate, 16_000);
        assert_eq!(audio.samples.len(), 1600);
        assert!((audio.duration() - 0.1).abs() < 1e-9);
        assert!((audio.samples[10] - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_decode_stereo_is_downmixed() {
        let audio = decode_audio(wav_bytes(2, 8_000, 800, 8192), Some("wav")).unwrap();
        assert_eq!(audio.samples.len(), 800);
        assert!((audio.samples[0] - 0.25).abs() < 1e-3);
    }

    #[test]
    fn test_decode_garbage_fails() {
        let result = decode_audio(vec![0u8; 64], None);
        assert!(matches!(result, Err(MediaError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_prepare_rejects_bad_alignment() {
        let result = LoadedMedia::prepare("/uploads/x", wav_bytes(1, 8_000, 80, 0), "{");
        assert!(matches!(result, Err(MediaError::Alignment(_))));
    }

    #[test]
    fn test_downmix_averages_frames() {
        let mut out = Vec::new();
        downmix_into(&[1.0, 0.0, 0.5, 0.5], 2, &mut out);
        assert_eq!(out, vec![0.5, 0.5]);
    }
}
