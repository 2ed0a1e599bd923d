//! Time-to-block and time-to-phone lookups for highlighting

use crate::types::{TranscriptBlock, Word};

/// Tolerance in seconds at block edges
const EDGE_EPSILON: f64 = 0.01;

/// Find the block playing at media time `t`
///
/// Returns the last block that `t` falls strictly inside (with a small edge
/// tolerance), so that on a shared boundary the later block wins.
pub fn block_at(blocks: &[TranscriptBlock], t: f64) -> Option<&TranscriptBlock> {
    // TODO: binary search once blocks are guaranteed sorted by start
    blocks
        .iter()
        .filter(|b| t - b.start > EDGE_EPSILON && b.end - t > EDGE_EPSILON)
        .last()
}

/// Index of the phone of `word` sounding at media time `t`
pub fn phone_at(word: &Word, t: f64) -> Option<usize> {
    let mut hit = None;
    let mut cursor = word.start;
    for (idx, phone) in word.phones.iter().enumerate() {
        if cursor <= t && cursor + phone.duration >= t {
            hit = Some(idx);
        }
        cursor += phone.duration;
    }
    hit
}

/// Phone name without its position suffix (`"dh_B"` -> `"dh"`)
pub fn phone_label(phone: &str) -> &str {
    phone.split('_').next().unwrap_or(phone)
}
