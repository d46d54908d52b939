//! WASM-compatible PlaybackController wrapper

use super::backend::{HtmlAudioBackend, SessionStorage};
use super::types::{JsLoadOptions, WasmTrack};
use crate::{
    ChannelId, FetchPurpose, MediaEvent, MediaEventKind, MemoryStorage, PlaybackController,
    PlaybackError, PlayerConfig, PlayerEvent, RecommendationRequest, SettingsStorage, Track,
    Transition, FIRST_CHANNEL, SECOND_CHANNEL,
};
use js_sys::Function;
use wasm_bindgen::prelude::*;
use web_sys::HtmlAudioElement;

/// WASM-compatible player
///
/// Wraps [`PlaybackController`] with a JavaScript-friendly API. Recommendation
/// fetches are delegated to JS: `onRecommendationRequest(trackId, purpose)`
/// asks for them and `receiveRecommendations` / `recommendationsFailed` hand
/// the answer back.
#[wasm_bindgen]
pub struct WasmPlayer {
    inner: PlaybackController,
    pending: Vec<RecommendationRequest>,

    // Event callbacks
    on_event: Option<Function>,
    on_state_change: Option<Function>,
    on_track_change: Option<Function>,
    on_queue_change: Option<Function>,
    on_error: Option<Function>,
    on_recommendation_request: Option<Function>,
}

#[wasm_bindgen]
impl WasmPlayer {
    /// Create a player over two `<audio>` elements
    ///
    /// `first` is channel 0 and `second` channel 1 in `handleMediaEvent`.
    /// `config` is an optional `PlayerConfig` object (snake_case keys).
    /// `on_play_rejected(channel, src, error)` receives autoplay refusals; it
    /// should forward them as a `"playrejected"` media event.
    #[wasm_bindgen(constructor)]
    pub fn new(
        first: HtmlAudioElement,
        second: HtmlAudioElement,
        config: JsValue,
        on_play_rejected: Option<Function>,
    ) -> Result<WasmPlayer, JsValue> {
        console_error_panic_hook::set_once();

        let config: PlayerConfig = if config.is_undefined() || config.is_null() {
            PlayerConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config)
                .map_err(|e| JsValue::from_str(&format!("Invalid player config: {}", e)))?
        };

        let storage: Box<dyn SettingsStorage> = match SessionStorage::open() {
            Some(storage) => Box::new(storage),
            None => Box::new(MemoryStorage::new()),
        };

        let mut first = HtmlAudioBackend::new(first);
        let mut second = HtmlAudioBackend::new(second);
        if let Some(callback) = on_play_rejected {
            first = first.with_rejection_handler(FIRST_CHANNEL.0, callback.clone());
            second = second.with_rejection_handler(SECOND_CHANNEL.0, callback);
        }

        Ok(Self {
            inner: PlaybackController::new(config, Box::new(first), Box::new(second), storage),
            pending: Vec::new(),
            on_event: None,
            on_state_change: None,
            on_track_change: None,
            on_queue_change: None,
            on_error: None,
            on_recommendation_request: None,
        })
    }

    // ===== Queue Loading =====

    /// Load tracks and start playing
    ///
    /// `options` is the browse-page object `{ id, iniciar, clickDirecto }`.
    #[wasm_bindgen(js_name = loadQueueAndStart)]
    pub fn load_queue_and_start(&mut self, tracks: JsValue, options: JsValue) -> Result<(), JsValue> {
        let tracks = parse_tracks(tracks)?;
        let options = parse_options(options)?;
        let result = self.inner.load_queue_and_start(tracks, options.into());
        self.flush();
        result.map_err(|e| to_js(&e))
    }

    /// Load tracks without starting playback
    #[wasm_bindgen(js_name = loadQueue)]
    pub fn load_queue(&mut self, tracks: JsValue, options: JsValue) -> Result<(), JsValue> {
        let tracks = parse_tracks(tracks)?;
        let options = parse_options(options)?;
        self.inner.load_queue(tracks, options.into());
        self.flush();
        Ok(())
    }

    // ===== Playback Control =====

    /// Start or resume playback
    pub fn play(&mut self) -> Result<(), JsValue> {
        let result = self.inner.play();
        self.flush();
        result.map_err(|e| to_js(&e))
    }

    /// Pause playback
    pub fn pause(&mut self) {
        self.inner.pause();
        self.flush();
    }

    /// Skip to next track
    pub fn next(&mut self) {
        let transition = self.inner.begin_next();
        self.settle(transition);
        self.flush();
    }

    /// Go to previous track
    pub fn previous(&mut self) -> Result<(), JsValue> {
        let result = self.inner.previous();
        self.flush();
        result.map_err(|e| to_js(&e))
    }

    /// Jump to track at active queue index
    #[wasm_bindgen(js_name = playQueueIndex)]
    pub fn play_queue_index(&mut self, index: usize) -> Result<(), JsValue> {
        let result = self.inner.play_queue_index(index);
        self.flush();
        result.map_err(|e| to_js(&e))
    }

    /// Seek to position in seconds
    pub fn seek(&mut self, seconds: f64) -> Option<f64> {
        let applied = self.inner.seek(seconds);
        self.flush();
        applied
    }

    // ===== Volume Control =====

    /// Set volume (0.0-1.0)
    #[wasm_bindgen(js_name = setVolume)]
    pub fn set_volume(&mut self, volume: f32) {
        self.inner.set_volume(volume);
        self.flush();
    }

    #[wasm_bindgen(js_name = getVolume)]
    pub fn get_volume(&self) -> f32 {
        self.inner.volume()
    }

    #[wasm_bindgen(js_name = toggleMute)]
    pub fn toggle_mute(&mut self) {
        self.inner.toggle_mute();
        self.flush();
    }

    #[wasm_bindgen(js_name = isMuted)]
    pub fn is_muted(&self) -> bool {
        self.inner.is_muted()
    }

    // ===== Shuffle & Loop =====

    #[wasm_bindgen(js_name = toggleShuffle)]
    pub fn toggle_shuffle(&mut self) {
        self.inner.toggle_shuffle();
        self.flush();
    }

    #[wasm_bindgen(js_name = toggleLoop)]
    pub fn toggle_loop(&mut self) {
        self.inner.toggle_loop();
        self.flush();
    }

    #[wasm_bindgen(js_name = clearError)]
    pub fn clear_error(&mut self) {
        self.inner.clear_error();
        self.flush();
    }

    // ===== Media Events =====

    /// Forward a DOM media event
    ///
    /// `channel` is 0 for the first element and 1 for the second; `value`
    /// carries `currentTime`, `duration`, or `error.code` as appropriate.
    #[wasm_bindgen(js_name = handleMediaEvent)]
    pub fn handle_media_event(&mut self, channel: u8, name: &str, value: f64, src: String) {
        let Some(kind) = MediaEventKind::from_dom(name, value) else {
            return;
        };
        let transition = self
            .inner
            .handle_media_event(ChannelId(channel), MediaEvent::new(src, kind));
        self.settle(transition);
        self.flush();
    }

    // ===== Recommendations =====

    /// Answer an `onRecommendationRequest` call
    #[wasm_bindgen(js_name = receiveRecommendations)]
    ///
    /// Unreadable payloads count as a failed fetch; the error is still
    /// returned so the caller can log it.
    pub fn receive_recommendations(&mut self, track_id: &str, tracks: JsValue) -> Result<(), JsValue> {
        match parse_tracks(tracks) {
            Ok(tracks) => {
                self.answer(track_id, Ok(tracks));
                Ok(())
            }
            Err(e) => {
                let reason = e.as_string().unwrap_or_else(|| "unreadable tracks".to_string());
                self.answer(
                    track_id,
                    Err(PlaybackError::RecommendationFetchFailed(reason)),
                );
                Err(e)
            }
        }
    }

    /// Report that a requested fetch failed
    #[wasm_bindgen(js_name = recommendationsFailed)]
    pub fn recommendations_failed(&mut self, track_id: &str, reason: String) {
        self.answer(
            track_id,
            Err(PlaybackError::RecommendationFetchFailed(reason)),
        );
    }

    // ===== State Queries =====

    #[wasm_bindgen(js_name = getState)]
    pub fn get_state(&self) -> String {
        self.inner.state().as_str().to_string()
    }

    #[wasm_bindgen(js_name = getCurrentTrack)]
    pub fn get_current_track(&self) -> Option<WasmTrack> {
        self.inner.current_track().map(WasmTrack::from)
    }

    #[wasm_bindgen(js_name = getCurrentIndex)]
    pub fn get_current_index(&self) -> Option<usize> {
        self.inner.current_index()
    }

    #[wasm_bindgen(js_name = getElapsed)]
    pub fn get_elapsed(&self) -> f64 {
        self.inner.elapsed()
    }

    #[wasm_bindgen(js_name = getDuration)]
    pub fn get_duration(&self) -> f64 {
        self.inner.duration()
    }

    #[wasm_bindgen(js_name = isShuffled)]
    pub fn is_shuffled(&self) -> bool {
        self.inner.is_shuffled()
    }

    #[wasm_bindgen(js_name = isLooping)]
    pub fn is_looping(&self) -> bool {
        self.inner.is_looping()
    }

    #[wasm_bindgen(js_name = getLastError)]
    pub fn get_last_error(&self) -> Option<String> {
        self.inner.last_error().map(str::to_string)
    }

    /// Active queue as an array of plain track objects
    #[wasm_bindgen(js_name = getQueue)]
    pub fn get_queue(&self) -> JsValue {
        let tracks: Vec<WasmTrack> = self
            .inner
            .active_queue()
            .into_iter()
            .map(WasmTrack::from)
            .collect();

        serde_wasm_bindgen::to_value(&tracks).unwrap_or(JsValue::NULL)
    }

    /// Full read model
    pub fn snapshot(&self) -> JsValue {
        serde_wasm_bindgen::to_value(&self.inner.snapshot()).unwrap_or(JsValue::NULL)
    }

    // ===== Event Listeners =====

    /// Every player event as `{ type, ... }`
    #[wasm_bindgen(js_name = onEvent)]
    pub fn on_event(&mut self, callback: Function) {
        self.on_event = Some(callback);
    }

    #[wasm_bindgen(js_name = onStateChange)]
    pub fn on_state_change(&mut self, callback: Function) {
        self.on_state_change = Some(callback);
    }

    #[wasm_bindgen(js_name = onTrackChange)]
    pub fn on_track_change(&mut self, callback: Function) {
        self.on_track_change = Some(callback);
    }

    #[wasm_bindgen(js_name = onQueueChange)]
    pub fn on_queue_change(&mut self, callback: Function) {
        self.on_queue_change = Some(callback);
    }

    #[wasm_bindgen(js_name = onError)]
    pub fn on_error(&mut self, callback: Function) {
        self.on_error = Some(callback);
    }

    /// Called with `(trackId, purpose)`; `purpose` is `"prefetch"` or `"advance"`
    #[wasm_bindgen(js_name = onRecommendationRequest)]
    pub fn on_recommendation_request(&mut self, callback: Function) {
        self.on_recommendation_request = Some(callback);
    }
}

impl WasmPlayer {
    fn answer(&mut self, track_id: &str, result: crate::Result<Vec<Track>>) {
        let Some(position) = self.pending.iter().position(|r| r.track_id == track_id) else {
            return;
        };
        let request = self.pending.remove(position);
        let transition = self.inner.receive_recommendations(request, result);
        self.settle(transition);
        self.flush();
    }

    fn settle(&mut self, transition: Transition) {
        if let Transition::NeedsRecommendations(request) = transition {
            self.request(request);
        }
    }

    fn request(&mut self, request: RecommendationRequest) {
        let purpose = match request.purpose {
            FetchPurpose::Prefetch => "prefetch",
            FetchPurpose::Advance => "advance",
        };
        let track_id = JsValue::from_str(&request.track_id);
        self.pending.push(request);

        if let Some(ref cb) = self.on_recommendation_request {
            cb.call2(&JsValue::NULL, &track_id, &JsValue::from_str(purpose))
                .ok();
        }
    }

    // ===== Internal Event Emitters =====

    fn flush(&mut self) {
        if let Some(request) = self.inner.take_recommendation_request() {
            self.request(request);
        }

        for event in self.inner.drain_events() {
            self.emit(&event);
        }
    }

    fn emit(&self, event: &PlayerEvent) {
        if let Some(ref cb) = self.on_event {
            if let Ok(js_event) = serde_wasm_bindgen::to_value(event) {
                cb.call1(&JsValue::NULL, &js_event).ok();
            }
        }

        match event {
            PlayerEvent::StateChanged { state } => {
                if let Some(ref cb) = self.on_state_change {
                    cb.call1(&JsValue::NULL, &JsValue::from_str(state.as_str()))
                        .ok();
                }
            }
            PlayerEvent::TrackChanged { .. } => {
                if let Some(ref cb) = self.on_track_change {
                    let track = self
                        .inner
                        .current_track()
                        .map(WasmTrack::from)
                        .and_then(|t| serde_wasm_bindgen::to_value(&t).ok())
                        .unwrap_or(JsValue::NULL);
                    cb.call1(&JsValue::NULL, &track).ok();
                }
            }
            PlayerEvent::QueueChanged { .. } | PlayerEvent::QueueExhausted => {
                if let Some(ref cb) = self.on_queue_change {
                    cb.call0(&JsValue::NULL).ok();
                }
            }
            PlayerEvent::Error { message } => {
                if let Some(ref cb) = self.on_error {
                    cb.call1(&JsValue::NULL, &JsValue::from_str(message)).ok();
                }
            }
            _ => {}
        }
    }
}

fn parse_tracks(tracks: JsValue) -> Result<Vec<Track>, JsValue> {
    let tracks: Vec<WasmTrack> = serde_wasm_bindgen::from_value(tracks)
        .map_err(|e| JsValue::from_str(&format!("Failed to parse tracks: {}", e)))?;
    Ok(tracks.into_iter().map(Track::from).collect())
}

fn parse_options(options: JsValue) -> Result<JsLoadOptions, JsValue> {
    if options.is_undefined() || options.is_null() {
        return Ok(JsLoadOptions::default());
    }
    serde_wasm_bindgen::from_value(options)
        .map_err(|e| JsValue::from_str(&format!("Failed to parse load options: {}", e)))
}

fn to_js(error: &PlaybackError) -> JsValue {
    JsValue::from_str(&error.to_string())
}
