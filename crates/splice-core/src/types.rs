//! Common types for Splice
//!
//! This module contains the fundamental data types shared by every Splice
//! component: the alignment result produced by the aligner, the immutable
//! transcript blocks derived from it, and the identity-bearing editor blocks
//! the user rearranges.

use serde::{Deserialize, Serialize};

/// Number of mixer knobs (volume, brightness, sepia, contrast)
pub const NUM_KNOBS: usize = 4;

/// Identifier of an editor block
///
/// Allocated from a monotonically increasing counter owned by the
/// [`EditorSequence`](crate::sequence::EditorSequence). Unique within the live
/// sequence, never reused while a block carrying it is alive.
pub type BlockId = u64;

// ─────────────────────────────────────────────────────────────────────────────
// Alignment result
// ─────────────────────────────────────────────────────────────────────────────

/// Alignment outcome for a single word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WordCase {
    /// Word was located in the audio; timing fields are meaningful
    Success,
    /// Word was heard but is not part of the transcript
    NotFoundInTranscript,
    /// Word is in the transcript but could not be located in the audio
    NotFoundInAudio,
}

/// One phonetic unit of an aligned word
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phone {
    /// Phone name with position suffix, e.g. `"dh_B"`
    pub phone: String,
    /// Duration in seconds
    pub duration: f64,
}

/// A word from the alignment result
///
/// Untimed words (anything other than [`WordCase::Success`]) are emitted by
/// the aligner without timing or offsets, so every numeric field defaults to
/// zero when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Word {
    pub case: WordCase,
    #[serde(default)]
    pub word: String,
    #[serde(default)]
    pub aligned_word: String,
    /// Start time in seconds into the source media
    #[serde(default)]
    pub start: f64,
    /// End time in seconds into the source media
    #[serde(default)]
    pub end: f64,
    /// Character offset of the first character in the transcript
    #[serde(default)]
    pub start_offset: usize,
    /// Character offset one past the last character in the transcript
    #[serde(default)]
    pub end_offset: usize,
    #[serde(default)]
    pub phones: Vec<Phone>,
}

impl Word {
    /// Whether this word carries meaningful timing
    pub fn is_aligned(&self) -> bool {
        self.case == WordCase::Success
    }
}

/// Result returned by the alignment service (`{url}.json`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentResult {
    pub transcript: String,
    #[serde(default)]
    pub words: Vec<Word>,
}

impl AlignmentResult {
    /// Parse an alignment result from JSON text
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Blocks
// ─────────────────────────────────────────────────────────────────────────────

/// A contiguous, time-bounded unit of the transcript
///
/// Either a word block (wraps one aligned [`Word`]) or a gap block (untimed
/// text between or around words). `source` is the block's index in the
/// immutable transcript array it was generated into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptBlock {
    pub source: usize,
    pub text: String,
    pub start: f64,
    pub end: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word: Option<Word>,
}

impl TranscriptBlock {
    /// Whether this is a gap block (no associated word)
    #[inline]
    pub fn is_gap(&self) -> bool {
        self.word.is_none()
    }

    /// Playback length in seconds (never negative)
    #[inline]
    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }
}

/// An editor-owned copy of a [`TranscriptBlock`] with its own identity
///
/// Serialized flat on the wire: `{ id, source, text, start, end, word? }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditorBlock {
    pub id: BlockId,
    #[serde(flatten)]
    pub block: TranscriptBlock,
}

impl EditorBlock {
    /// Copy a transcript block under a new identity
    pub fn copy_of(block: &TranscriptBlock, id: BlockId) -> Self {
        Self {
            id,
            block: block.clone(),
        }
    }

    /// Copy this block under a new identity
    pub fn with_id(&self, id: BlockId) -> Self {
        Self {
            id,
            block: self.block.clone(),
        }
    }

    #[inline]
    pub fn start(&self) -> f64 {
        self.block.start
    }

    #[inline]
    pub fn end(&self) -> f64 {
        self.block.end
    }

    #[inline]
    pub fn duration(&self) -> f64 {
        self.block.duration()
    }

    #[inline]
    pub fn text(&self) -> &str {
        &self.block.text
    }

    #[inline]
    pub fn is_gap(&self) -> bool {
        self.block.is_gap()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Roles & origins
// ─────────────────────────────────────────────────────────────────────────────

/// Where a state change came from
///
/// Remote changes are applied exactly like local ones but are never sent back
/// to the relay; this is the only thing preventing echo between clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Local,
    Remote,
}

impl Origin {
    #[inline]
    pub fn is_local(self) -> bool {
        self == Origin::Local
    }
}

/// A client's participation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Edits the sequence; audio is monitored silently
    Editor,
    /// Plays back what editors produce
    Player,
    /// Editor and player in one process
    #[default]
    Both,
}

impl Role {
    /// Whether the sequence editing controls are available
    pub fn can_edit(self) -> bool {
        matches!(self, Role::Editor | Role::Both)
    }

    /// Whether audio reaches the output device
    pub fn audio_connected(self) -> bool {
        !matches!(self, Role::Editor)
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "editor" => Ok(Role::Editor),
            "player" => Ok(Role::Player),
            "both" | "" => Ok(Role::Both),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Editor => write!(f, "editor"),
            Role::Player => write!(f, "player"),
            Role::Both => write!(f, "both"),
        }
    }
}
