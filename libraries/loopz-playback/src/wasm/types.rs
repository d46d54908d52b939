//! WASM-compatible type definitions

use crate::{lenient, LoadOptions, Track};
use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

/// Track as exchanged with JavaScript
///
/// Same shape as [`Track`] but with getters so it can cross the boundary as a
/// class as well as a plain object. Raw platform records (`titulo`,
/// `archivo_url`, numeric ids, `usuarios`) are accepted too.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
#[wasm_bindgen]
pub struct WasmTrack {
    #[serde(default, deserialize_with = "lenient::id")]
    id: String,
    #[serde(default, alias = "titulo", deserialize_with = "lenient::text")]
    title: String,
    #[serde(default, alias = "archivo_url", alias = "archivoUrl", deserialize_with = "lenient::text")]
    audio_url: String,
    #[serde(default, alias = "duracion", deserialize_with = "lenient::duration_or_zero")]
    duration_secs: f64,
    #[serde(default, alias = "imagen", alias = "portada")]
    artwork_url: Option<String>,
    #[serde(default, alias = "usuarios", deserialize_with = "lenient::artists")]
    artists: Vec<String>,
}

#[wasm_bindgen]
impl WasmTrack {
    #[wasm_bindgen(constructor)]
    pub fn new(id: String, title: String, audio_url: String, duration_secs: f64) -> Self {
        Self {
            id,
            title,
            audio_url,
            duration_secs,
            artwork_url: None,
            artists: Vec::new(),
        }
    }

    #[wasm_bindgen(getter)]
    pub fn id(&self) -> String {
        self.id.clone()
    }

    #[wasm_bindgen(getter)]
    pub fn title(&self) -> String {
        self.title.clone()
    }

    #[wasm_bindgen(getter, js_name = audioUrl)]
    pub fn audio_url(&self) -> String {
        self.audio_url.clone()
    }

    #[wasm_bindgen(getter, js_name = durationSecs)]
    pub fn duration_secs(&self) -> f64 {
        self.duration_secs
    }

    #[wasm_bindgen(getter, js_name = artworkUrl)]
    pub fn artwork_url(&self) -> Option<String> {
        self.artwork_url.clone()
    }

    #[wasm_bindgen(setter, js_name = artworkUrl)]
    pub fn set_artwork_url(&mut self, url: Option<String>) {
        self.artwork_url = url;
    }

    /// Contributing artists, comma separated
    #[wasm_bindgen(getter)]
    pub fn artists(&self) -> String {
        self.artists.join(", ")
    }
}

impl From<&Track> for WasmTrack {
    fn from(track: &Track) -> Self {
        Self {
            id: track.id.clone(),
            title: track.title.clone(),
            audio_url: track.audio_url.clone(),
            duration_secs: track.duration_secs,
            artwork_url: track.artwork_url.clone(),
            artists: track.artists.clone(),
        }
    }
}

impl From<WasmTrack> for Track {
    fn from(track: WasmTrack) -> Self {
        let mut converted = Track::new(track.id, track.title, track.audio_url)
            .with_duration(track.duration_secs)
            .with_artists(track.artists);
        converted.artwork_url = track.artwork_url;
        converted
    }
}

/// Options object passed by browse pages: `{ id, iniciar, clickDirecto }`
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct JsLoadOptions {
    #[serde(default)]
    id: Option<SourceId>,
    #[serde(default)]
    iniciar: Option<usize>,
    #[serde(default)]
    click_directo: bool,
}

/// Source ids arrive as numbers from some pages and strings from others
#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum SourceId {
    Number(i64),
    Text(String),
}

impl From<JsLoadOptions> for LoadOptions {
    fn from(options: JsLoadOptions) -> Self {
        let source_id = options.id.map(|id| match id {
            SourceId::Number(n) => n.to_string(),
            SourceId::Text(s) => s,
        });
        let start_index = options.iniciar.unwrap_or(0);
        LoadOptions {
            source_id,
            start_index,
            direct_click: options.click_directo,
        }
    }
}
