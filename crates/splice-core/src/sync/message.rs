//! Relay wire protocol
//!
//! JSON objects discriminated by `type`:
//!
//! ```text
//! { "type": "video",      "url": "/uploads/2024-05-01T10:00:00" | null }
//! { "type": "blocks",     "blocks": [EditorBlock, ...] }
//! { "type": "playback",   "playing": true, "looping": true, "id": 7 }
//! { "type": "parameters", "knobs": [1.0, 0.0, 0.0, 0.5] }
//! ```
//!
//! Messages are decoded once at the socket boundary; everything past it
//! works with [`SyncMessage`].

use serde::{Deserialize, Serialize};

use crate::engine::Knobs;
use crate::types::{BlockId, EditorBlock};

fn default_looping() -> bool {
    true
}

/// A state change exchanged through the relay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SyncMessage {
    /// Load (or unload) a video by base URL
    Video { url: Option<String> },
    /// Replace the whole editor sequence
    Blocks { blocks: Vec<EditorBlock> },
    /// Transport state and playback cursor
    Playback {
        playing: bool,
        #[serde(default = "default_looping")]
        looping: bool,
        #[serde(default)]
        id: Option<BlockId>,
    },
    /// Mixer knob values
    Parameters { knobs: Knobs },
}

/// The four message kinds, in relay replay order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MessageKind {
    Video,
    Blocks,
    Playback,
    Parameters,
}

impl MessageKind {
    /// Every kind, in the order a late joiner must receive them
    pub const ALL: [MessageKind; 4] = [
        MessageKind::Video,
        MessageKind::Blocks,
        MessageKind::Playback,
        MessageKind::Parameters,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Video => "video",
            MessageKind::Blocks => "blocks",
            MessageKind::Playback => "playback",
            MessageKind::Parameters => "parameters",
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl SyncMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            SyncMessage::Video { .. } => MessageKind::Video,
            SyncMessage::Blocks { .. } => MessageKind::Blocks,
            SyncMessage::Playback { .. } => MessageKind::Playback,
            SyncMessage::Parameters { .. } => MessageKind::Parameters,
        }
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
