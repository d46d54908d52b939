//! Playback controller - core orchestration
//!
//! Owns the queue, both audio channels, the settings store, and the
//! observable state. Every action mutates state synchronously; anything that
//! needs the network comes back out as a [`Transition`] for the host to finish.

use crate::{
    advance::{plan_next, plan_previous, AdvanceInput, NextStep, PreviousStep},
    channel::{AudioChannel, ChannelEvent, ChannelId, MediaBackend, MediaEvent},
    error::{PlaybackError, Result},
    events::{PlayerEvent, PlayerSnapshot},
    persistence::{
        encode_flag, encode_index, PersistedSettings, SettingsStorage, LAST_INDEX_KEY, LOOP_KEY,
        SHUFFLE_KEY, VOLUME_KEY,
    },
    queue::QueueStore,
    recommendations::{
        FetchPurpose, FetchState, NoRecommendations, RecommendationGateway,
        RecommendationRequest, Transition,
    },
    types::{prepare_tracks, LoadOptions, PlaybackState, PlayerConfig, Track},
    volume::Volume,
};
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// Identity of the two media elements handed to [`PlaybackController::new`]
pub const FIRST_CHANNEL: ChannelId = ChannelId(0);
pub const SECOND_CHANNEL: ChannelId = ChannelId(1);

/// Continuous playback state machine
///
/// ```text
/// Empty ──load──▶ Loading ──ready──▶ Playing ◀──▶ Paused
///                    ▲                  │
///                    └──── advance ◀────┘ (track ended / next)
///                                       │
///                                       └──▶ Empty (queue exhausted)
/// ```
///
/// One instance per session, owned by the host and handed to the UI layer.
pub struct PlaybackController {
    // State
    state: PlaybackState,
    wants_playback: bool,
    elapsed: f64,
    duration: f64,
    last_error: Option<String>,
    source_id: Option<String>,

    // Queue
    queue: QueueStore,
    restore_index: Option<usize>,

    // Settings
    volume: Volume,
    looping: bool,
    config: PlayerConfig,
    media_base: Option<Url>,

    // Audio
    primary: AudioChannel,
    preload: AudioChannel,

    // Recommendations
    gateway: Arc<dyn RecommendationGateway>,
    generation: u64,
    fetch: FetchState,
    pending_request: Option<RecommendationRequest>,

    // Collaborators / UI sync
    storage: Box<dyn SettingsStorage>,
    pending_events: Vec<PlayerEvent>,
}

impl PlaybackController {
    /// Create a controller, restoring persisted settings from `storage`
    ///
    /// `first` starts out as the primary channel and is addressed as
    /// [`FIRST_CHANNEL`] in media events; `second` starts as the preload
    /// channel and is [`SECOND_CHANNEL`].
    pub fn new(
        config: PlayerConfig,
        first: Box<dyn MediaBackend>,
        second: Box<dyn MediaBackend>,
        storage: Box<dyn SettingsStorage>,
    ) -> Self {
        let settings = PersistedSettings::restore(storage.as_ref(), config.default_volume);

        let mut queue = QueueStore::new(config.shuffle_seed);
        queue.set_shuffle(settings.shuffle);

        let volume = Volume::new(settings.volume);
        let mut primary = AudioChannel::new(FIRST_CHANNEL, first);
        let mut preload = AudioChannel::new(SECOND_CHANNEL, second);
        primary.set_volume(volume.gain());
        preload.set_volume(0.0);

        debug!(
            volume = settings.volume,
            shuffle = settings.shuffle,
            looping = settings.looping,
            last_index = ?settings.last_index,
            "Restored player settings"
        );

        Self {
            state: PlaybackState::Empty,
            wants_playback: false,
            elapsed: 0.0,
            duration: 0.0,
            last_error: None,
            source_id: None,
            queue,
            restore_index: settings.last_index,
            volume,
            looping: settings.looping,
            media_base: config.media_base(),
            config,
            primary,
            preload,
            gateway: Arc::new(NoRecommendations),
            generation: 0,
            fetch: FetchState::Idle,
            pending_request: None,
            storage,
            pending_events: Vec::new(),
        }
    }

    /// Use `gateway` for recommendation fetches driven by the async helpers
    #[must_use]
    pub fn with_gateway(mut self, gateway: Arc<dyn RecommendationGateway>) -> Self {
        self.gateway = gateway;
        self
    }

    /// Gateway handle, for hosts that run fetches themselves
    pub fn gateway(&self) -> Arc<dyn RecommendationGateway> {
        Arc::clone(&self.gateway)
    }

    // ===== Queue Loading =====

    /// Replace the queue with `tracks` and start playing
    ///
    /// Asking again for the source that is already playing, with the same
    /// tracks, does not interrupt it (a paused player resumes). A direct click
    /// on a different track of that source, or any other source, restarts at
    /// the requested track.
    pub fn load_queue_and_start(&mut self, tracks: Vec<Track>, options: LoadOptions) -> Result<()> {
        let (tracks, options) = self.prepare_load(tracks, options);
        self.restore_index = None;

        if self.is_active_source(&tracks, &options) {
            debug!(source_id = ?options.source_id, "Source already active, keeping playback");
            if self.state == PlaybackState::Paused {
                return self.play();
            }
            return Ok(());
        }

        self.replace_queue(tracks, &options);
        if self.queue.is_empty() {
            self.teardown();
            return Ok(());
        }

        let result = self.start_current(None, true);
        self.after_move();
        result
    }

    /// Replace the queue without starting playback
    ///
    /// The first load after startup puts the cursor back on the persisted
    /// index, so a reloaded page can resume where it left off.
    pub fn load_queue(&mut self, tracks: Vec<Track>, options: LoadOptions) {
        let (tracks, options) = self.prepare_load(tracks, options);
        let restore = self.restore_index.take();

        self.replace_queue(tracks, &options);
        if self.queue.is_empty() {
            self.teardown();
            return;
        }

        if let Some(index) = restore.filter(|_| !options.direct_click) {
            if self.queue.set_current(index) {
                debug!(index, "Restored queue position");
            }
        }

        let Some(track) = self.queue.current_track().cloned() else {
            return;
        };
        self.primary.load(&track);
        self.elapsed = 0.0;
        self.duration = track.duration_secs;
        self.wants_playback = false;
        self.set_state(PlaybackState::Paused);
        self.emit(PlayerEvent::TrackChanged {
            track_id: track.id,
            previous_track_id: None,
        });
        self.after_move();
    }

    /// Resolve tracks for loading, keeping `start_index` on the same track
    fn prepare_load(&self, tracks: Vec<Track>, mut options: LoadOptions) -> (Vec<Track>, LoadOptions) {
        let requested = tracks
            .get(options.start_index)
            .map(|t| t.id.trim().to_string());
        let tracks = prepare_tracks(tracks, self.media_base.as_ref());
        options.start_index = requested
            .and_then(|id| tracks.iter().position(|t| t.id == id))
            .unwrap_or(0);
        (tracks, options)
    }

    fn is_active_source(&self, tracks: &[Track], options: &LoadOptions) -> bool {
        if self.state == PlaybackState::Empty
            || options.source_id.is_none()
            || self.source_id != options.source_id
        {
            return false;
        }

        let queued = self.queue.original_queue();
        if tracks.is_empty()
            || queued.len() < tracks.len()
            || !queued.iter().zip(tracks).all(|(a, b)| a.id == b.id)
        {
            return false;
        }

        if !options.direct_click {
            return true;
        }

        match (tracks.get(options.start_index), self.queue.current_track()) {
            (Some(requested), Some(current)) => requested.id == current.id,
            _ => false,
        }
    }

    fn replace_queue(&mut self, tracks: Vec<Track>, options: &LoadOptions) {
        self.generation += 1;
        self.fetch = FetchState::Idle;
        self.pending_request = None;
        self.preload.release();
        self.source_id.clone_from(&options.source_id);

        self.queue.load(tracks, options);
        info!(
            source_id = ?self.source_id,
            tracks = self.queue.len(),
            shuffled = self.queue.is_shuffled(),
            "Loaded queue"
        );
        self.emit(PlayerEvent::QueueChanged {
            length: self.queue.len(),
        });
    }

    // ===== Playback Control =====

    /// Start or resume playback
    ///
    /// With nothing loaded this is a no-op. A refusal from the platform leaves
    /// the player paused with an error message and is also returned.
    pub fn play(&mut self) -> Result<()> {
        if self.queue.is_empty() {
            return Ok(());
        }

        if self.state == PlaybackState::Playing {
            return Ok(());
        }

        if self.primary.is_loaded() && self.queue.current_track().is_some() {
            self.wants_playback = true;
            return match self.primary.resume() {
                Ok(()) => {
                    let state = if self.primary.is_ready() {
                        PlaybackState::Playing
                    } else {
                        PlaybackState::Loading
                    };
                    self.set_state(state);
                    Ok(())
                }
                Err(e) => Err(self.surface_error(e)),
            };
        }

        let index = self.queue.current_index().unwrap_or(0);
        self.go_to(index)
    }

    /// Pause playback
    pub fn pause(&mut self) {
        if self.state == PlaybackState::Empty {
            return;
        }
        self.wants_playback = false;
        self.primary.pause();
        self.set_state(PlaybackState::Paused);
    }

    /// Skip to next track
    ///
    /// Returns [`Transition::NeedsRecommendations`] when the queue ran out
    /// and the gateway has to be asked before deciding.
    pub fn begin_next(&mut self) -> Transition {
        self.advance(false, true)
    }

    /// Skip to next track, fetching recommendations through the gateway if needed
    pub async fn next(&mut self) {
        let transition = self.begin_next();
        self.settle(transition).await;
    }

    /// Go to previous track
    ///
    /// At the top of a non-looping queue there is nowhere to go, so the
    /// current track restarts instead.
    pub fn previous(&mut self) -> Result<()> {
        let step = plan_previous(self.queue.current_index(), self.queue.len(), self.looping);
        match step {
            PreviousStep::Idle => Ok(()),
            PreviousStep::RestartCurrent => {
                self.primary.rewind();
                self.elapsed = 0.0;
                self.emit_position();
                Ok(())
            }
            PreviousStep::Move(index) => self.go_to(index),
        }
    }

    /// Jump to `index` of the active queue
    pub fn play_queue_index(&mut self, index: usize) -> Result<()> {
        if index >= self.queue.len() {
            return Err(PlaybackError::IndexOutOfBounds(index));
        }
        self.go_to(index)
    }

    // ===== Seek =====

    /// Seek in the current track
    ///
    /// Ignored until the duration is known. Returns the applied position.
    pub fn seek(&mut self, seconds: f64) -> Option<f64> {
        let position = self.primary.seek_to(seconds)?;
        self.elapsed = position;
        self.emit_position();
        Some(position)
    }

    // ===== Volume =====

    /// Set volume (0.0-1.0)
    pub fn set_volume(&mut self, volume: f32) {
        if !self.volume.set_level(volume) {
            return;
        }
        self.primary.set_volume(self.volume.gain());
        let level = self.volume.level().to_string();
        self.persist(VOLUME_KEY, &level);
        self.emit_volume();
    }

    pub fn mute(&mut self) {
        self.volume.mute();
        self.primary.set_volume(self.volume.gain());
        self.emit_volume();
    }

    pub fn unmute(&mut self) {
        self.volume.unmute();
        self.primary.set_volume(self.volume.gain());
        self.emit_volume();
    }

    pub fn toggle_mute(&mut self) {
        self.volume.toggle_mute();
        self.primary.set_volume(self.volume.gain());
        self.emit_volume();
    }

    // ===== Shuffle / Loop =====

    /// Flip shuffle without interrupting the current track
    pub fn toggle_shuffle(&mut self) {
        let enabled = !self.queue.is_shuffled();
        self.set_shuffle(enabled);
    }

    pub fn set_shuffle(&mut self, enabled: bool) {
        if !self.queue.set_shuffle(enabled) {
            return;
        }

        debug!(enabled, index = ?self.queue.current_index(), "Shuffle changed");
        self.persist(SHUFFLE_KEY, encode_flag(enabled));
        self.emit(PlayerEvent::ShuffleChanged { enabled });
        self.emit(PlayerEvent::QueueChanged {
            length: self.queue.len(),
        });
        self.after_move();
    }

    pub fn toggle_loop(&mut self) {
        let enabled = !self.looping;
        self.set_loop(enabled);
    }

    pub fn set_loop(&mut self, enabled: bool) {
        if self.looping == enabled {
            return;
        }
        self.looping = enabled;
        self.persist(LOOP_KEY, encode_flag(enabled));
        self.emit(PlayerEvent::LoopChanged { enabled });
        self.refresh_preload();
    }

    // ===== Errors =====

    /// Dismiss the error banner
    pub fn clear_error(&mut self) {
        if self.last_error.take().is_some() {
            self.emit(PlayerEvent::ErrorCleared);
        }
    }

    // ===== Media Events =====

    /// Feed a native media event from one of the two elements
    pub fn handle_media_event(&mut self, channel: ChannelId, event: MediaEvent) -> Transition {
        if channel == self.primary.id() {
            match self.primary.handle(event) {
                Some(signal) => self.on_primary_signal(signal),
                None => Transition::Complete,
            }
        } else if channel == self.preload.id() {
            if let Some(signal) = self.preload.handle(event) {
                self.on_preload_signal(signal);
            }
            Transition::Complete
        } else {
            warn!(channel = channel.0, "Media event for unknown channel");
            Transition::Complete
        }
    }

    /// [`handle_media_event`](Self::handle_media_event), fetching recommendations if a track end needs them
    pub async fn dispatch_media_event(&mut self, channel: ChannelId, event: MediaEvent) {
        let transition = self.handle_media_event(channel, event);
        self.settle(transition).await;
    }

    fn on_primary_signal(&mut self, signal: ChannelEvent) -> Transition {
        match signal {
            ChannelEvent::TimeUpdate(secs) => {
                self.elapsed = secs;
                self.emit_position();
            }
            ChannelEvent::DurationKnown(secs) => {
                self.duration = secs;
                self.emit_position();
            }
            ChannelEvent::Buffering => {
                if self.wants_playback {
                    self.set_state(PlaybackState::Loading);
                }
            }
            ChannelEvent::ReadyToPlay | ChannelEvent::Started => {
                if self.wants_playback {
                    self.set_state(PlaybackState::Playing);
                } else if signal == ChannelEvent::Started {
                    // Element started after the listener paused
                    self.primary.pause();
                }
            }
            ChannelEvent::Ended => {
                debug!(track_id = ?self.primary.track_id(), "Track ended");
                self.set_state(PlaybackState::Loading);
                return self.advance(false, true);
            }
            ChannelEvent::Error(kind) => {
                self.surface_error(PlaybackError::Media(kind));
            }
            ChannelEvent::PlaybackRejected(reason) => {
                self.surface_error(PlaybackError::PlaybackRejected(reason));
            }
        }
        Transition::Complete
    }

    fn on_preload_signal(&mut self, signal: ChannelEvent) {
        match signal {
            ChannelEvent::Error(kind) => {
                warn!(
                    track_id = ?self.preload.track_id(),
                    error = ?kind,
                    "Preload failed, next track will load on demand"
                );
                self.preload.release();
            }
            ChannelEvent::ReadyToPlay => {
                debug!(track_id = ?self.preload.track_id(), "Preload ready");
            }
            _ => {}
        }
    }

    // ===== Recommendations =====

    /// Background fetch the host should run, if any
    pub fn take_recommendation_request(&mut self) -> Option<RecommendationRequest> {
        self.pending_request.take()
    }

    /// Hand back the result of a [`RecommendationRequest`]
    ///
    /// Failures count as "nothing to recommend". Results for a queue that has
    /// since been replaced or extended are dropped, as are results for an
    /// end-of-queue advance the listener already moved away from.
    pub fn receive_recommendations(
        &mut self,
        request: RecommendationRequest,
        result: Result<Vec<Track>>,
    ) -> Transition {
        if request.generation != self.generation {
            debug!(track_id = %request.track_id, "Dropping recommendations for a replaced queue");
            return Transition::Complete;
        }

        let still_last = self
            .queue
            .last_original_track()
            .is_some_and(|t| t.id == request.track_id);
        if !still_last {
            debug!(track_id = %request.track_id, "Dropping recommendations for an extended queue");
            return Transition::Complete;
        }

        let tracks = match result {
            Ok(tracks) => prepare_tracks(tracks, self.media_base.as_ref()),
            Err(e) => {
                warn!(track_id = %request.track_id, error = %e, "Recommendation fetch failed");
                Vec::new()
            }
        };

        match request.purpose {
            FetchPurpose::Prefetch => {
                if !self.queue.is_at_end() {
                    // Listener went back; fetch again when the end comes round
                    self.fetch = FetchState::Idle;
                    return Transition::Complete;
                }
                self.fetch = FetchState::Completed(request.track_id.clone());
                let buffered = self.queue.set_recommendations(tracks);
                debug!(track_id = %request.track_id, buffered, "Buffered recommendations");
                self.refresh_preload();
                Transition::Complete
            }
            FetchPurpose::Advance => {
                self.fetch = FetchState::Completed(request.track_id.clone());
                self.queue.set_recommendations(tracks);
                if self.queue.current_index() != request.cursor {
                    debug!("Listener moved on while recommendations were loading");
                    self.refresh_preload();
                    return Transition::Complete;
                }
                // A pause while the fetch ran holds: the next track is cued, not played
                self.advance(true, self.wants_playback)
            }
        }
    }

    /// Run the pending background fetch through the gateway, if there is one
    pub async fn fetch_pending_recommendations(&mut self) {
        if let Some(request) = self.take_recommendation_request() {
            let gateway = Arc::clone(&self.gateway);
            let result = request.run(gateway.as_ref()).await;
            let transition = self.receive_recommendations(request, result);
            self.settle(transition).await;
        }
    }

    async fn settle(&mut self, mut transition: Transition) {
        while let Transition::NeedsRecommendations(request) = transition {
            let gateway = Arc::clone(&self.gateway);
            let result = request.run(gateway.as_ref()).await;
            transition = self.receive_recommendations(request, result);
        }
    }

    // ===== Transitions =====

    fn advance(&mut self, fetch_attempted: bool, autoplay: bool) -> Transition {
        let last_id = self.queue.last_original_track().map(|t| t.id.clone());
        let settled = last_id
            .as_deref()
            .is_some_and(|id| self.fetch.is_settled_for(id));

        let step = plan_next(AdvanceInput {
            current: self.queue.current_index(),
            len: self.queue.len(),
            looping: self.looping,
            has_recommendations: self.queue.has_recommendations(),
            fetch_attempted: fetch_attempted || settled,
        });
        debug!(?step, index = ?self.queue.current_index(), "Advancing");

        match step {
            NextStep::Idle => {}
            NextStep::Advance(index) => self.go_to_quietly(index, autoplay),
            NextStep::Wrap => {
                let previous_id = self.current_track_id();
                self.queue.wrap_for_loop();
                self.fetch = FetchState::Idle;
                self.emit(PlayerEvent::QueueChanged {
                    length: self.queue.len(),
                });
                if let Err(e) = self.start_current(previous_id, autoplay) {
                    debug!(error = %e, "Start after wrap failed");
                }
                self.after_move();
            }
            NextStep::ExtendAndAdvance => {
                let next = self.queue.current_index().map_or(0, |c| c + 1);
                let added = self.queue.fold_in_recommendations();
                if added == 0 {
                    self.exhaust();
                    return Transition::Complete;
                }
                info!(added, "Extended queue with recommendations");
                self.fetch = FetchState::Idle;
                self.emit(PlayerEvent::QueueExtended { added });
                self.emit(PlayerEvent::QueueChanged {
                    length: self.queue.len(),
                });
                self.go_to_quietly(next, autoplay);
            }
            NextStep::FetchRecommendations => {
                if let Some(track_id) = last_id {
                    debug!(track_id = %track_id, "Queue ran out, asking for recommendations");
                    if autoplay {
                        self.wants_playback = true;
                        self.set_state(PlaybackState::Loading);
                    }
                    self.fetch = FetchState::InFlight(track_id.clone());
                    self.emit(PlayerEvent::RecommendationsRequested {
                        track_id: track_id.clone(),
                    });
                    return Transition::NeedsRecommendations(
                        self.request_for(track_id, FetchPurpose::Advance),
                    );
                }
                self.exhaust();
            }
            NextStep::Exhausted => self.exhaust(),
        }

        Transition::Complete
    }

    fn go_to(&mut self, index: usize) -> Result<()> {
        self.move_to(index, true)
    }

    fn move_to(&mut self, index: usize, autoplay: bool) -> Result<()> {
        let previous_id = self.current_track_id();
        if !self.queue.set_current(index) {
            return Err(PlaybackError::IndexOutOfBounds(index));
        }
        let result = self.start_current(previous_id, autoplay);
        self.after_move();
        result
    }

    /// [`move_to`](Self::move_to) for automatic moves; failures are already surfaced
    fn go_to_quietly(&mut self, index: usize, autoplay: bool) {
        if let Err(e) = self.move_to(index, autoplay) {
            debug!(index, error = %e, "Automatic advance could not start playback");
        }
    }

    /// Put the current track on the primary channel, playing it if `autoplay`
    fn start_current(&mut self, previous_id: Option<String>, autoplay: bool) -> Result<()> {
        let Some(track) = self.queue.current_track().cloned() else {
            return Err(PlaybackError::EmptyQueue);
        };

        self.elapsed = 0.0;
        self.duration = track.duration_secs;

        if self.preload.is_holding(&track) && !self.primary.is_holding(&track) {
            std::mem::swap(&mut self.primary, &mut self.preload);
            self.preload.release();
            self.preload.set_volume(0.0);
            self.primary.set_volume(self.volume.gain());
            if let Some(duration) = self.primary.duration() {
                self.duration = duration;
            }
            debug!(track_id = %track.id, "Swapped in preloaded track");
        } else if self.primary.load(&track) {
            debug!(track_id = %track.id, url = %track.audio_url, "Loading track");
        }

        if previous_id.as_deref() != Some(track.id.as_str()) {
            self.emit(PlayerEvent::TrackChanged {
                track_id: track.id.clone(),
                previous_track_id: previous_id,
            });
        }

        if !autoplay {
            self.wants_playback = false;
            self.primary.rewind();
            self.set_state(PlaybackState::Paused);
            self.emit_position();
            return Ok(());
        }

        self.wants_playback = true;
        match self.primary.play_from_start() {
            Ok(()) => {
                let state = if self.primary.is_ready() {
                    PlaybackState::Playing
                } else {
                    PlaybackState::Loading
                };
                self.set_state(state);
                self.emit_position();
                Ok(())
            }
            Err(e) => Err(self.surface_error(e)),
        }
    }

    /// Bookkeeping after the cursor or queue order changed
    fn after_move(&mut self) {
        let index = encode_index(self.queue.current_index());
        self.persist(LAST_INDEX_KEY, &index);
        self.maybe_prefetch();
        self.refresh_preload();
    }

    fn exhaust(&mut self) {
        info!(source_id = ?self.source_id, "Queue exhausted");
        self.teardown();
        self.emit(PlayerEvent::QueueExhausted);
    }

    /// Back to `Empty`
    fn teardown(&mut self) {
        self.primary.release();
        self.preload.release();
        self.queue.clear();
        self.source_id = None;
        self.elapsed = 0.0;
        self.duration = 0.0;
        self.wants_playback = false;
        self.generation += 1;
        self.fetch = FetchState::Idle;
        self.pending_request = None;
        self.persist(LAST_INDEX_KEY, &encode_index(None));
        self.emit(PlayerEvent::QueueChanged { length: 0 });
        self.set_state(PlaybackState::Empty);
    }

    /// Pause, record the banner message, and hand the error back
    fn surface_error(&mut self, error: PlaybackError) -> PlaybackError {
        warn!(error = %error, track_id = ?self.primary.track_id(), "Playback error");
        self.wants_playback = false;
        self.primary.pause();
        if !self.queue.is_empty() {
            self.set_state(PlaybackState::Paused);
        }
        if let Some(message) = error.user_message() {
            self.last_error = Some(message.clone());
            self.emit(PlayerEvent::Error { message });
        }
        error
    }

    /// Issue a background fetch when the cursor reaches the end of the queue
    fn maybe_prefetch(&mut self) {
        if !self.config.prefetch_recommendations
            || !self.queue.is_at_end()
            || self.queue.has_recommendations()
        {
            return;
        }

        let Some(track_id) = self.queue.last_original_track().map(|t| t.id.clone()) else {
            return;
        };
        if self.fetch.is_pending_for(&track_id) {
            return;
        }

        debug!(track_id = %track_id, "Prefetching recommendations");
        self.fetch = FetchState::InFlight(track_id.clone());
        self.pending_request = Some(self.request_for(track_id.clone(), FetchPurpose::Prefetch));
        self.emit(PlayerEvent::RecommendationsRequested { track_id });
    }

    fn request_for(&self, track_id: String, purpose: FetchPurpose) -> RecommendationRequest {
        RecommendationRequest {
            track_id,
            purpose,
            generation: self.generation,
            cursor: self.queue.current_index(),
        }
    }

    /// Keep the preload channel one track ahead
    fn refresh_preload(&mut self) {
        if !self.config.preload_next {
            return;
        }

        match self.upcoming_track() {
            Some(track) if self.preload.is_holding(&track) => {}
            Some(track) => {
                self.preload.load(&track);
                self.preload.set_volume(0.0);
                debug!(track_id = %track.id, "Preloading next track");
                self.emit(PlayerEvent::NextTrackPreloaded { track_id: track.id });
            }
            None => {
                if self.preload.is_loaded() {
                    self.preload.release();
                }
            }
        }
    }

    /// The track "next" would land on, when that is knowable ahead of time
    ///
    /// Reshuffles make the answer random, so those cases return `None`.
    pub fn upcoming_track(&self) -> Option<Track> {
        let current = self.queue.current_track()?;
        let step = plan_next(AdvanceInput {
            current: self.queue.current_index(),
            len: self.queue.len(),
            looping: self.looping,
            has_recommendations: self.queue.has_recommendations(),
            fetch_attempted: false,
        });

        let shuffled = self.queue.is_shuffled();
        let upcoming = match step {
            NextStep::Advance(index) => self.queue.track_at(index),
            NextStep::Wrap if !shuffled => self.queue.track_at(0),
            NextStep::ExtendAndAdvance if !shuffled => self.queue.recommendations().first(),
            _ => None,
        }?;

        (upcoming.id != current.id).then(|| upcoming.clone())
    }

    // ===== State Queries =====

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.queue.current_track()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.queue.current_index()
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn is_loading(&self) -> bool {
        self.state == PlaybackState::Loading
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn volume(&self) -> f32 {
        self.volume.level()
    }

    pub fn is_muted(&self) -> bool {
        self.volume.is_muted()
    }

    pub fn is_shuffled(&self) -> bool {
        self.queue.is_shuffled()
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn source_id(&self) -> Option<&str> {
        self.source_id.as_deref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Tracks in play order
    pub fn active_queue(&self) -> Vec<&Track> {
        self.queue.active_queue()
    }

    /// Buffered recommendations not yet in the queue
    pub fn recommendations(&self) -> &[Track] {
        self.queue.recommendations()
    }

    /// Track buffered on the preload channel
    pub fn preloaded_track_id(&self) -> Option<&str> {
        self.preload.track_id()
    }

    /// Which element is currently audible
    pub fn primary_channel(&self) -> ChannelId {
        self.primary.id()
    }

    /// Full read model
    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            state: self.state,
            current_track: self.queue.current_track().cloned(),
            current_index: self.queue.current_index(),
            is_playing: self.is_playing(),
            is_loading: self.is_loading(),
            elapsed_secs: self.elapsed,
            duration_secs: self.duration,
            volume: self.volume.level(),
            is_muted: self.volume.is_muted(),
            is_shuffled: self.queue.is_shuffled(),
            is_looping: self.looping,
            source_id: self.source_id.clone(),
            last_error: self.last_error.clone(),
            queue: self.queue.active_queue().into_iter().cloned().collect(),
        }
    }

    // ===== Events =====

    /// Drain all pending events
    ///
    /// The UI should call this after every action and media callback.
    pub fn drain_events(&mut self) -> Vec<PlayerEvent> {
        std::mem::take(&mut self.pending_events)
    }

    pub fn has_pending_events(&self) -> bool {
        !self.pending_events.is_empty()
    }

    fn emit(&mut self, event: PlayerEvent) {
        self.pending_events.push(event);
    }

    fn set_state(&mut self, state: PlaybackState) {
        if self.state != state {
            self.state = state;
            self.emit(PlayerEvent::StateChanged { state });
        }
    }

    fn emit_position(&mut self) {
        self.emit(PlayerEvent::PositionUpdate {
            elapsed_secs: self.elapsed,
            duration_secs: self.duration,
        });
    }

    fn emit_volume(&mut self) {
        self.emit(PlayerEvent::VolumeChanged {
            volume: self.volume.level(),
            muted: self.volume.is_muted(),
        });
    }

    fn current_track_id(&self) -> Option<String> {
        self.queue.current_track().map(|t| t.id.clone())
    }

    fn persist(&mut self, key: &str, value: &str) {
        if let Err(e) = self.storage.set_item(key, value) {
            warn!(key, error = %e, "Failed to persist player setting");
        }
    }
}

impl std::fmt::Debug for PlaybackController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackController")
            .field("state", &self.state)
            .field("current_index", &self.queue.current_index())
            .field("queue_len", &self.queue.len())
            .field("source_id", &self.source_id)
            .field("primary", &self.primary)
            .field("preload", &self.preload)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{MediaEventKind, NullBackend};
    use crate::persistence::MemoryStorage;

    fn track(id: &str) -> Track {
        Track::new(id, format!("Song {}", id), format!("https://loopz.test/{}.mp3", id))
            .with_duration(200.0)
    }

    fn tracks(n: usize) -> Vec<Track> {
        (0..n).map(|i| track(&i.to_string())).collect()
    }

    fn controller() -> PlaybackController {
        let config = PlayerConfig {
            shuffle_seed: Some(42),
            ..PlayerConfig::default()
        };
        PlaybackController::new(
            config,
            Box::new(NullBackend::default()),
            Box::new(NullBackend::default()),
            Box::new(MemoryStorage::new()),
        )
    }

    #[test]
    fn create_controller() {
        let player = controller();
        assert_eq!(player.state(), PlaybackState::Empty);
        assert_eq!(player.volume(), 0.5);
        assert!(player.current_track().is_none());
        assert_eq!(player.current_index(), None);
    }

    #[test]
    fn load_starts_loading() {
        let mut player = controller();
        player
            .load_queue_and_start(tracks(3), LoadOptions::new("album-1"))
            .unwrap();

        assert_eq!(player.state(), PlaybackState::Loading);
        assert_eq!(player.current_track().unwrap().id, "0");
        assert_eq!(player.preloaded_track_id(), Some("1"));
    }

    #[test]
    fn ready_event_moves_to_playing() {
        let mut player = controller();
        player
            .load_queue_and_start(tracks(2), LoadOptions::new("album-1"))
            .unwrap();

        let src = player.current_track().unwrap().audio_url.clone();
        let t = player.handle_media_event(FIRST_CHANNEL, MediaEvent::new(src, MediaEventKind::CanPlay));
        assert_eq!(t, Transition::Complete);
        assert_eq!(player.state(), PlaybackState::Playing);
    }

    #[test]
    fn play_on_empty_is_noop() {
        let mut player = controller();
        assert!(player.play().is_ok());
        assert_eq!(player.state(), PlaybackState::Empty);
        assert_eq!(player.begin_next(), Transition::Complete);
        assert!(player.previous().is_ok());
    }

    #[test]
    fn pause_and_resume() {
        let mut player = controller();
        player
            .load_queue_and_start(tracks(2), LoadOptions::new("album-1"))
            .unwrap();
        player.pause();
        assert_eq!(player.state(), PlaybackState::Paused);

        player.play().unwrap();
        assert_eq!(player.state(), PlaybackState::Loading);
        assert_eq!(player.current_index(), Some(0));
    }

    #[test]
    fn media_error_pauses_and_keeps_queue() {
        let mut player = controller();
        player
            .load_queue_and_start(tracks(3), LoadOptions::new("album-1").starting_at(1))
            .unwrap();

        let src = player.current_track().unwrap().audio_url.clone();
        let _ = player.handle_media_event(
            FIRST_CHANNEL,
            MediaEvent::new(src, MediaEventKind::Error { code: 2 }),
        );

        assert_eq!(player.state(), PlaybackState::Paused);
        assert_eq!(player.current_index(), Some(1));
        assert!(player.last_error().is_some());

        player.clear_error();
        assert!(player.last_error().is_none());
    }

    #[test]
    fn play_queue_index_bounds() {
        let mut player = controller();
        player
            .load_queue_and_start(tracks(2), LoadOptions::new("album-1"))
            .unwrap();

        assert!(matches!(
            player.play_queue_index(5),
            Err(PlaybackError::IndexOutOfBounds(5))
        ));
        player.play_queue_index(1).unwrap();
        assert_eq!(player.current_track().unwrap().id, "1");
    }

    #[test]
    fn volume_is_clamped() {
        let mut player = controller();
        player.set_volume(1.7);
        assert_eq!(player.volume(), 1.0);
        player.set_volume(f32::NAN);
        assert_eq!(player.volume(), 1.0);
    }

    #[test]
    fn prefetch_issued_at_end_of_queue() {
        let mut player = controller();
        player
            .load_queue_and_start(tracks(2), LoadOptions::new("album-1"))
            .unwrap();
        assert!(player.take_recommendation_request().is_none());

        player.play_queue_index(1).unwrap();
        let request = player.take_recommendation_request().unwrap();
        assert_eq!(request.track_id, "1");
        assert_eq!(request.purpose, FetchPurpose::Prefetch);

        // Not issued twice for the same track
        player.previous().unwrap();
        player.play_queue_index(1).unwrap();
        assert!(player.take_recommendation_request().is_none());
    }

    #[test]
    fn stale_recommendations_are_dropped() {
        let mut player = controller();
        player
            .load_queue_and_start(tracks(1), LoadOptions::new("album-1"))
            .unwrap();
        let request = player.take_recommendation_request().unwrap();

        player
            .load_queue_and_start(tracks(2), LoadOptions::new("album-2"))
            .unwrap();
        let t = player.receive_recommendations(request, Ok(vec![track("r1")]));

        assert_eq!(t, Transition::Complete);
        assert!(player.recommendations().is_empty());
    }

    #[test]
    fn snapshot_reflects_state() {
        let mut player = controller();
        player
            .load_queue_and_start(tracks(3), LoadOptions::new("playlist-9").starting_at(2))
            .unwrap();
        player.toggle_loop();

        let snapshot = player.snapshot();
        assert_eq!(snapshot.current_index, Some(2));
        assert_eq!(snapshot.source_id.as_deref(), Some("playlist-9"));
        assert!(snapshot.is_looping);
        assert!(snapshot.is_loading);
        assert_eq!(snapshot.queue.len(), 3);
    }
}
