//! Player events and read model
//!
//! The controller queues a [`PlayerEvent`] for every observable change; the
//! UI drains them after each action or media callback. [`PlayerSnapshot`] is
//! the full read model for components that would rather re-render from
//! scratch.

use crate::types::{PlaybackState, Track};
use serde::{Deserialize, Serialize};

/// Events emitted by the player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum PlayerEvent {
    /// Playback state changed
    StateChanged { state: PlaybackState },

    /// A different track became current
    TrackChanged {
        track_id: String,
        previous_track_id: Option<String>,
    },

    /// Queue contents or order changed
    QueueChanged { length: usize },

    /// Elapsed time moved (media time update or seek)
    PositionUpdate { elapsed_secs: f64, duration_secs: f64 },

    /// Volume or mute changed
    VolumeChanged { volume: f32, muted: bool },

    ShuffleChanged { enabled: bool },

    LoopChanged { enabled: bool },

    /// Message for the dismissible error banner
    Error { message: String },

    /// Banner dismissed
    ErrorCleared,

    /// Upcoming track is buffering on the preload channel
    NextTrackPreloaded { track_id: String },

    /// Host should fetch recommendations for this track
    RecommendationsRequested { track_id: String },

    /// Recommendations appended to the queue
    QueueExtended { added: usize },

    /// Ran out of tracks; the player is empty
    QueueExhausted,
}

/// Everything the UI shows about the player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub state: PlaybackState,
    pub current_track: Option<Track>,
    pub current_index: Option<usize>,
    pub is_playing: bool,
    pub is_loading: bool,
    pub elapsed_secs: f64,
    pub duration_secs: f64,
    pub volume: f32,
    pub is_muted: bool,
    pub is_shuffled: bool,
    pub is_looping: bool,
    pub source_id: Option<String>,
    pub last_error: Option<String>,
    /// Active queue, in play order
    pub queue: Vec<Track>,
}
