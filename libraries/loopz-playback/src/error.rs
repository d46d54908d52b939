//! Error types for playback management

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure reported by a media element while loading or decoding a source
///
/// Mirrors the HTML media error codes; anything the platform cannot classify
/// lands in `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaErrorKind {
    /// Fetch aborted by the user agent
    Aborted,

    /// Network failed mid-download
    NetworkFailure,

    /// Source could not be decoded
    DecodeFailure,

    /// Source format or MIME type not supported
    UnsupportedFormat,

    /// Unclassified failure
    Unknown,
}

impl MediaErrorKind {
    /// Map an HTML `MediaError.code` to a kind
    pub fn from_code(code: u16) -> Self {
        match code {
            1 => Self::Aborted,
            2 => Self::NetworkFailure,
            3 => Self::DecodeFailure,
            4 => Self::UnsupportedFormat,
            _ => Self::Unknown,
        }
    }

    /// Banner text shown to the listener
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Aborted => "Playback was interrupted before the song finished loading.",
            Self::NetworkFailure => "The song could not be loaded. Check your connection.",
            Self::DecodeFailure => "The song file appears to be damaged and cannot be played.",
            Self::UnsupportedFormat => "This song's audio format is not supported by your browser.",
            Self::Unknown => "Something went wrong while playing this song.",
        }
    }
}

/// Playback errors
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// Platform refused to start audio (usually autoplay policy)
    #[error("Playback rejected: {0}")]
    PlaybackRejected(String),

    /// Media element failure
    #[error("{}", .0.user_message())]
    Media(MediaErrorKind),

    /// Recommendation gateway failed or returned garbage
    #[error("Recommendation fetch failed: {0}")]
    RecommendationFetchFailed(String),

    /// Nothing loaded to act on
    #[error("Queue is empty")]
    EmptyQueue,

    /// Index out of bounds
    #[error("Index out of bounds: {0}")]
    IndexOutOfBounds(usize),

    /// Settings storage refused a write
    #[error("Settings storage error: {0}")]
    Storage(String),
}

impl PlaybackError {
    /// Message for the dismissible error banner
    ///
    /// Recommendation failures and empty queues are never shown, so they map to `None`.
    pub fn user_message(&self) -> Option<String> {
        match self {
            Self::PlaybackRejected(_) => {
                Some("Your browser blocked playback. Press play to start listening.".to_string())
            }
            Self::Media(kind) => Some(kind.user_message().to_string()),
            Self::RecommendationFetchFailed(_) | Self::EmptyQueue => None,
            Self::IndexOutOfBounds(_) | Self::Storage(_) => Some(self.to_string()),
        }
    }
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;
