//! Segment model - alignment result to transcript blocks
//!
//! Turns the aligner's word list into an ordered, gapless sequence of
//! [`TranscriptBlock`]s covering `[0, duration)` of media time:
//!
//! ```text
//!  transcript:  "\n This is a sentence."
//!  blocks:      [gap "\n "][word "This"][gap "␣"][word "is"] ... [gap "."]
//!  time:        0 ------- 1.02 ------ 1.47 --- 1.52 ---- 1.72    ... duration
//! ```
//!
//! # Preconditions
//!
//! Word offsets and times are assumed to be non-overlapping and in order.
//! This is not validated: a malformed result from the alignment service
//! produces blocks that break contiguity rather than an error.

mod highlight;

pub use highlight::{block_at, phone_at, phone_label};

use crate::types::{AlignmentResult, TranscriptBlock};

/// Visible stand-in for the first space of a whitespace-only gap
pub const SPACE_GLYPH: char = '␣';

/// Generate the transcript blocks for a loaded video
///
/// `duration` is the media duration in seconds; the trailing gap block always
/// ends there. Words that were not aligned are skipped (their text is only
/// kept when a later gap block spans it).
pub fn generate(result: &AlignmentResult, duration: f64) -> Vec<TranscriptBlock> {
    let transcript = CharText::new(&result.transcript);
    let mut blocks: Vec<TranscriptBlock> = Vec::with_capacity(result.words.len() * 2 + 1);

    let mut current_offset = 0usize;
    let mut current_time = 0.0f64;

    for word in result.words.iter().filter(|w| w.is_aligned()) {
        if word.start_offset > current_offset {
            blocks.push(gap_block(
                transcript.slice(current_offset, word.start_offset),
                current_time,
                current_time.max(word.start),
            ));
        }

        blocks.push(TranscriptBlock {
            source: 0,
            text: transcript.slice(word.start_offset, word.end_offset).to_string(),
            start: word.start,
            end: word.end,
            word: Some(word.clone()),
        });

        current_offset = word.end_offset;
        current_time = word.end;
    }

    blocks.push(gap_block(
        transcript.slice(current_offset, transcript.len()),
        current_time,
        duration,
    ));

    for (index, block) in blocks.iter_mut().enumerate() {
        block.source = index;
    }

    log::debug!(
        "generate: {} blocks from {} words over {:.2}s",
        blocks.len(),
        result.words.len(),
        duration
    );

    blocks
}

/// Concatenate block text back into the transcript it was cut from
///
/// Undoes the [`SPACE_GLYPH`] substitution on gap blocks.
pub fn restore_text(blocks: &[TranscriptBlock]) -> String {
    blocks
        .iter()
        .map(|block| {
            if block.is_gap() {
                block.text.replacen(SPACE_GLYPH, " ", 1)
            } else {
                block.text.clone()
            }
        })
        .collect()
}

fn gap_block(text: &str, start: f64, end: f64) -> TranscriptBlock {
    TranscriptBlock {
        source: 0,
        text: mark_space(text),
        start,
        end,
        word: None,
    }
}

/// Replace the first space of a whitespace-only string with [`SPACE_GLYPH`]
fn mark_space(text: &str) -> String {
    if !text.is_empty() && text.chars().all(char::is_whitespace) {
        text.replacen(' ', &SPACE_GLYPH.to_string(), 1)
    } else {
        text.to_string()
    }
}

/// Transcript text addressed by character offsets
///
/// The aligner counts characters, not bytes.
struct CharText<'a> {
    text: &'a str,
    /// Byte index of each char boundary, plus the total length
    bounds: Vec<usize>,
}

impl<'a> CharText<'a> {
    fn new(text: &'a str) -> Self {
        let bounds = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        Self { text, bounds }
    }

    /// Length in characters
    fn len(&self) -> usize {
        self.bounds.len() - 1
    }

    /// Characters `[start, end)`, clamped; empty when `end <= start`
    fn slice(&self, start: usize, end: usize) -> &'a str {
        let start = start.min(self.len());
        let end = end.min(self.len());
        if end <= start {
            return "";
        }
        &self.text[self.bounds[start]..self.bounds[end]]
    }
}
