//! Wire types for the LoopZ backend API.
//!
//! The backend is not strict about its track records: ids come as numbers or
//! strings, durations as seconds or `mm:ss`, and artwork under one of two
//! keys. Everything here deserializes leniently and converts into the
//! player's [`Track`].

use loopz_playback::{lenient, Track};
use serde::Deserialize;

pub use loopz_playback::parse_duration;

/// Track record as returned by the backend
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApiTrack {
    #[serde(deserialize_with = "lenient::id")]
    pub id: String,

    #[serde(default, alias = "title")]
    pub titulo: String,

    #[serde(default, alias = "audio_url")]
    pub archivo_url: String,

    /// Length in seconds
    #[serde(default, deserialize_with = "lenient::duration")]
    pub duracion: Option<f64>,

    #[serde(default)]
    pub imagen: Option<String>,

    #[serde(default)]
    pub portada: Option<String>,

    /// Contributing users
    #[serde(default)]
    pub usuarios: Vec<ApiUser>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApiUser {
    #[serde(default, alias = "nombre")]
    pub name: String,
}

impl From<ApiTrack> for Track {
    fn from(api: ApiTrack) -> Self {
        let artists = api
            .usuarios
            .into_iter()
            .map(|u| u.name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();

        let mut track = Track::new(api.id, api.titulo, api.archivo_url)
            .with_duration(api.duracion.unwrap_or(0.0))
            .with_artists(artists);
        track.artwork_url = api
            .imagen
            .or(api.portada)
            .filter(|url| !url.trim().is_empty());
        track
    }
}

/// Recommendation payload: a bare list or a list wrapped in an object
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RecommendationsResponse {
    List(Vec<ApiTrack>),
    Wrapped {
        #[serde(alias = "data", alias = "recommendations")]
        canciones: Vec<ApiTrack>,
    },
}

impl RecommendationsResponse {
    pub fn into_tracks(self) -> Vec<ApiTrack> {
        match self {
            Self::List(tracks) | Self::Wrapped { canciones: tracks } => tracks,
        }
    }
}
