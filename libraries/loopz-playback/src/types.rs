//! Core types for playback management

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

/// URL schemes a media element can stream from
const PLAYABLE_SCHEMES: [&str; 3] = ["http", "https", "blob"];

/// A playable song
///
/// Identity is by `id`; two tracks with the same id are the same song even if
/// the rest of the metadata differs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    /// Unique track identifier from the platform
    pub id: String,

    /// Track title
    pub title: String,

    /// Length in seconds as reported by the platform (0 when unknown)
    #[serde(default)]
    pub duration_secs: f64,

    /// Streaming URL; absolute once the track has passed [`Track::resolve`]
    pub audio_url: String,

    /// Cover art
    #[serde(default)]
    pub artwork_url: Option<String>,

    /// Contributing artists, display names
    #[serde(default)]
    pub artists: Vec<String>,
}

impl Track {
    pub fn new(id: impl Into<String>, title: impl Into<String>, audio_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            duration_secs: 0.0,
            audio_url: audio_url.into(),
            artwork_url: None,
            artists: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_duration(mut self, secs: f64) -> Self {
        self.duration_secs = if secs.is_finite() && secs > 0.0 { secs } else { 0.0 };
        self
    }

    #[must_use]
    pub fn with_artwork(mut self, url: impl Into<String>) -> Self {
        self.artwork_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn with_artists(mut self, artists: Vec<String>) -> Self {
        self.artists = artists;
        self
    }

    /// Validate the track and turn its audio URL into an absolute streaming URL
    ///
    /// Relative URLs are joined onto `base`. Returns `None` when the id or
    /// title is blank or the URL cannot be resolved.
    pub fn resolve(mut self, base: Option<&Url>) -> Option<Self> {
        self.id = self.id.trim().to_string();
        self.title = self.title.trim().to_string();
        if self.id.is_empty() || self.title.is_empty() {
            return None;
        }

        let raw = self.audio_url.trim();
        if raw.is_empty() {
            return None;
        }

        let resolved = match Url::parse(raw) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => base?.join(raw).ok()?,
            Err(_) => return None,
        };

        if !PLAYABLE_SCHEMES.contains(&resolved.scheme()) {
            return None;
        }

        self.audio_url = resolved.to_string();
        Some(self)
    }

    /// Whether the track can enter a queue as-is
    pub fn is_playable(&self) -> bool {
        !self.id.trim().is_empty()
            && !self.title.trim().is_empty()
            && Url::parse(&self.audio_url)
                .map(|url| PLAYABLE_SCHEMES.contains(&url.scheme()))
                .unwrap_or(false)
    }
}

/// Resolve every track against `base`, dropping the ones that cannot be played
pub fn prepare_tracks(tracks: Vec<Track>, base: Option<&Url>) -> Vec<Track> {
    let total = tracks.len();
    let prepared: Vec<Track> = tracks
        .into_iter()
        .filter_map(|track| {
            let id = track.id.clone();
            let resolved = track.resolve(base);
            if resolved.is_none() {
                debug!(track_id = %id, "Dropping unplayable track");
            }
            resolved
        })
        .collect();

    if prepared.len() != total {
        debug!(
            kept = prepared.len(),
            dropped = total - prepared.len(),
            "Filtered track list"
        );
    }

    prepared
}

/// Player state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    /// Nothing loaded
    Empty,

    /// Track selected, primary channel buffering
    Loading,

    /// Audio is audible
    Playing,

    /// Track loaded, playback halted
    Paused,
}

impl PlaybackState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Loading => "loading",
            Self::Playing => "playing",
            Self::Paused => "paused",
        }
    }
}

/// How a container page asks for its tracks to be played
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadOptions {
    /// Opaque tag of the UI context that owns the queue (e.g. `album-42`)
    #[serde(default)]
    pub source_id: Option<String>,

    /// Position in the supplied list to start at
    #[serde(default)]
    pub start_index: usize,

    /// The listener clicked one specific track rather than "play all"
    #[serde(default)]
    pub direct_click: bool,
}

impl LoadOptions {
    pub fn new(source_id: impl Into<String>) -> Self {
        Self {
            source_id: Some(source_id.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn starting_at(mut self, index: usize) -> Self {
        self.start_index = index;
        self
    }

    /// Start at `index` because the listener clicked it
    #[must_use]
    pub fn clicked(mut self, index: usize) -> Self {
        self.start_index = index;
        self.direct_click = true;
        self
    }
}

/// Configuration for the playback controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Volume used when nothing valid is persisted (0.0-1.0, default: 0.5)
    pub default_volume: f32,

    /// Base URL relative audio URLs are joined onto
    pub media_base_url: Option<String>,

    /// Fixed shuffle seed, for reproducible orderings
    pub shuffle_seed: Option<u64>,

    /// Fetch recommendations before the queue runs out (default: true)
    pub prefetch_recommendations: bool,

    /// Keep the upcoming track buffered on the preload channel (default: true)
    pub preload_next: bool,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            default_volume: 0.5,
            media_base_url: None,
            shuffle_seed: None,
            prefetch_recommendations: true,
            preload_next: true,
        }
    }
}

impl PlayerConfig {
    /// Parsed media base URL; an unparsable value is logged and ignored
    pub fn media_base(&self) -> Option<Url> {
        let raw = self.media_base_url.as_deref()?;
        match Url::parse(raw) {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(url = %raw, error = %e, "Ignoring invalid media base URL");
                None
            }
        }
    }
}
