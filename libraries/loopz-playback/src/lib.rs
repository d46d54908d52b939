//! LoopZ - Continuous Playback
//!
//! Platform-agnostic playback engine for the LoopZ web player.
//!
//! This crate provides:
//! - Queue with order-preserving shuffle (direct-click pinning)
//! - Loop mode and end-of-queue extension from recommendations
//! - Two audio channels: one audible, one preloading the next track
//! - Volume with mute, persisted settings
//! - Event queue and snapshot read model for the UI
//!
//! # Architecture
//!
//! `loopz-playback` never touches the DOM or the network:
//! - Media elements are driven through the [`MediaBackend`] trait
//! - Settings go through [`SettingsStorage`]
//! - Recommendations come from a [`RecommendationGateway`]
//!
//! Actions are synchronous. When one needs recommendations before it can
//! finish, it returns [`Transition::NeedsRecommendations`]; the host runs the
//! request and hands the result back. The `async` helpers on
//! [`PlaybackController`] do that round trip through the configured gateway.
//!
//! Browser bindings live behind the `wasm` feature.
//!
//! # Example: Basic Playback
//!
//! ```rust
//! use loopz_playback::{
//!     LoadOptions, MemoryStorage, NullBackend, PlaybackController, PlaybackState, PlayerConfig,
//!     Track,
//! };
//!
//! let mut player = PlaybackController::new(
//!     PlayerConfig::default(),
//!     Box::new(NullBackend::default()),
//!     Box::new(NullBackend::default()),
//!     Box::new(MemoryStorage::new()),
//! );
//!
//! let tracks = vec![
//!     Track::new("1", "Intro", "https://cdn.loopz.test/1.mp3"),
//!     Track::new("2", "Outro", "https://cdn.loopz.test/2.mp3"),
//! ];
//! player.load_queue_and_start(tracks, LoadOptions::new("album-7")).ok();
//! assert_eq!(player.state(), PlaybackState::Loading);
//!
//! player.set_volume(0.8);
//! player.toggle_shuffle();
//!
//! for event in player.drain_events() {
//!     // push to the UI
//!     let _ = event;
//! }
//! ```
//!
//! # Example: End of Queue
//!
//! ```rust,no_run
//! use loopz_playback::{PlaybackController, Transition};
//!
//! async fn skip(player: &mut PlaybackController) {
//!     if let Transition::NeedsRecommendations(request) = player.begin_next() {
//!         let gateway = player.gateway();
//!         let result = request.run(gateway.as_ref()).await;
//!         let _ = player.receive_recommendations(request, result);
//!     }
//! }
//! ```

mod advance;
mod channel;
mod controller;
mod error;
mod events;
pub mod lenient;
mod persistence;
mod queue;
mod recommendations;
mod shuffle;
pub mod types;
mod volume;

#[cfg(feature = "wasm")]
pub mod wasm;

// Public exports
pub use advance::{plan_next, plan_previous, AdvanceInput, NextStep, PreviousStep};
pub use channel::{
    AudioChannel, ChannelEvent, ChannelId, MediaBackend, MediaEvent, MediaEventKind, NullBackend,
};
pub use controller::{PlaybackController, FIRST_CHANNEL, SECOND_CHANNEL};
pub use error::{MediaErrorKind, PlaybackError, Result};
pub use events::{PlayerEvent, PlayerSnapshot};
pub use lenient::parse_duration;
pub use persistence::{
    MemoryStorage, PersistedSettings, SettingsStorage, LAST_INDEX_KEY, LOOP_KEY, SHUFFLE_KEY,
    VOLUME_KEY,
};
pub use queue::QueueStore;
pub use recommendations::{
    FetchPurpose, NoRecommendations, RecommendationGateway, RecommendationRequest, Transition,
};
pub use types::{prepare_tracks, LoadOptions, PlaybackState, PlayerConfig, Track};
pub use volume::Volume;
