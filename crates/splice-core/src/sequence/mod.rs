//! Sequence mutation engine
//!
//! The editor sequence is the ordered, mutable list of [`EditorBlock`]s that
//! the scheduler plays back. Every operation here derives a new ordering and
//! then re-seeds the id counter, so that ids stay unique within the live
//! sequence:
//!
//! - after a mutation the counter is `max(ids) + 1`, or `0` when empty
//! - copies (from the transcript or of an existing block) always get a fresh
//!   id, never the original identity, so an in-flight playback cursor that
//!   still references the old id cannot be confused with the copy
//!
//! The operations are pure with respect to I/O: broadcasting the result and
//! waking the scheduler is the [`Session`](crate::sync::Session)'s job.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::types::{BlockId, EditorBlock, TranscriptBlock};

/// Filters applicable to the editor sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    /// Keep only gap blocks
    RemoveWords,
    /// Keep only word blocks
    RemoveSpaces,
    /// Keep each block independently with probability 0.5
    Forget,
}

impl std::str::FromStr for FilterKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "remove-words" => Ok(FilterKind::RemoveWords),
            "remove-spaces" => Ok(FilterKind::RemoveSpaces),
            "forget" => Ok(FilterKind::Forget),
            other => Err(format!("unknown filter: {}", other)),
        }
    }
}

/// Where a dragged block comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragSource {
    /// A block of the immutable transcript, by `source` index
    Transcript(usize),
    /// A block already in the editor sequence, by id
    Editor(BlockId),
}

/// Resolve the index of the block that plays after `current`
///
/// Lookup is by id against the sequence as it is *now*. If `current` is
/// `None` or no longer present its index resolves to `-1`, so playback
/// resumes at index 0.
/// This means removing the playing block skips everything after it and wraps
/// to the start; that wraparound is the defined recovery rule.
///
/// Returns `None` only for an empty sequence.
pub fn next_index(blocks: &[EditorBlock], current: Option<BlockId>) -> Option<usize> {
    if blocks.is_empty() {
        return None;
    }
    let current_index = blocks
        .iter()
        .position(|b| Some(b.id) == current)
        .map(|i| i as isize)
        .unwrap_or(-1);
    Some(((current_index + 1) as usize) % blocks.len())
}

/// The editor sequence and its id counter
#[derive(Debug, Clone, Default)]
pub struct EditorSequence {
    blocks: Vec<EditorBlock>,
    next_id: BlockId,
}

impl EditorSequence {
    /// Create an empty sequence
    pub fn new() -> Self {
        Self::default()
    }

    /// Current blocks in playback order
    pub fn blocks(&self) -> &[EditorBlock] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// The id the next allocated block will receive
    pub fn next_id(&self) -> BlockId {
        self.next_id
    }

    /// Find a block by id
    pub fn get(&self, id: BlockId) -> Option<&EditorBlock> {
        self.blocks.iter().find(|b| b.id == id)
    }

    /// Replace the sequence with a fresh copy of the transcript
    pub fn reset(&mut self, transcript: &[TranscriptBlock]) {
        let mut blocks = Vec::with_capacity(transcript.len());
        for block in transcript {
            let id = self.allocate_id();
            blocks.push(EditorBlock::copy_of(block, id));
        }
        self.blocks = blocks;
        self.reseed();
    }

    /// Remove everything and restart ids at 0
    pub fn clear(&mut self) {
        self.blocks.clear();
        self.next_id = 0;
    }

    /// Uniform random permutation (Fisher–Yates); ids are preserved
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.blocks.shuffle(rng);
        self.reseed();
    }

    /// Stable sort by block text
    pub fn sort(&mut self) {
        self.blocks.sort_by(|a, b| a.text().cmp(b.text()));
        self.reseed();
    }

    /// Drop the blocks the filter rejects
    pub fn filter<R: Rng + ?Sized>(&mut self, kind: FilterKind, rng: &mut R) {
        match kind {
            FilterKind::RemoveWords => self.blocks.retain(|b| b.is_gap()),
            FilterKind::RemoveSpaces => self.blocks.retain(|b| !b.is_gap()),
            FilterKind::Forget => self.blocks.retain(|_| rng.gen_bool(0.5)),
        }
        self.reseed();
    }

    /// Drop a block at `destination` (drag and drop)
    ///
    /// A block dragged from within the sequence is removed first, and the
    /// destination is shifted down by one if the removal happened before it.
    /// A copy with a freshly allocated id is then inserted at the destination
    /// (clamped to the end). Returns the id of the inserted copy, or `None`
    /// when nothing happened (no destination, or an unknown source).
    pub fn move_block(
        &mut self,
        source: DragSource,
        destination: Option<usize>,
        transcript: &[TranscriptBlock],
    ) -> Option<BlockId> {
        let mut destination = destination?;

        let dragged = match source {
            DragSource::Transcript(index) => {
                let block = transcript.get(index)?;
                EditorBlock::copy_of(block, 0)
            }
            DragSource::Editor(id) => {
                let index = self.blocks.iter().position(|b| b.id == id)?;
                let removed = self.blocks.remove(index);
                if index < destination {
                    destination -= 1;
                }
                removed
            }
        };

        let id = self.allocate_id();
        let destination = destination.min(self.blocks.len());
        self.blocks.insert(destination, dragged.with_id(id));
        self.reseed();
        Some(id)
    }

    /// Replace the whole sequence (remote sync)
    pub fn replace(&mut self, blocks: Vec<EditorBlock>) {
        self.blocks = blocks;
        self.reseed();
    }

    fn allocate_id(&mut self) -> BlockId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Re-seed the counter from the live ids
    fn reseed(&mut self) {
        self.next_id = self
            .blocks
            .iter()
            .map(|b| b.id)
            .max()
            .map(|max| max + 1)
            .unwrap_or(0);
    }
}
