//! Media loading error types

use thiserror::Error;

/// Errors that can occur while fetching or decoding a video's media
#[derive(Error, Debug)]
pub enum MediaError {
    /// HTTP request could not be made
    #[error("Request for {url} failed: {reason}")]
    Request { url: String, reason: String },

    /// Server answered with a non-success status
    #[error("Fetching {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// Container or codec not understood
    #[error("Unsupported media format: {0}")]
    UnsupportedFormat(String),

    /// Container has no decodable audio track
    #[error("No audio track found")]
    NoAudioTrack,

    /// Decoding produced no samples
    #[error("Decoded audio is empty")]
    Empty,

    /// Alignment JSON did not parse
    #[error("Invalid alignment result: {0}")]
    Alignment(#[from] serde_json::Error),
}

pub type MediaResult<T> = Result<T, MediaError>;
