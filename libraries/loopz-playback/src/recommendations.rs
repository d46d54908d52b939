//! Recommendation gateway seam
//!
//! When a queue is about to run out the controller asks for tracks that could
//! follow its last song. The fetch itself belongs to the host; failures are
//! never shown to the listener and count as "nothing to recommend".

use crate::error::Result;
use crate::types::Track;
use async_trait::async_trait;

/// Source of follow-up tracks
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
pub trait RecommendationGateway: Send + Sync {
    /// Tracks that could play after `track_id`
    async fn fetch_recommendations(&self, track_id: &str) -> Result<Vec<Track>>;
}

/// Gateway that never recommends anything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRecommendations;

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl RecommendationGateway for NoRecommendations {
    async fn fetch_recommendations(&self, _track_id: &str) -> Result<Vec<Track>> {
        Ok(Vec::new())
    }
}

/// Why the controller wants recommendations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPurpose {
    /// Background fetch while the last track is still playing
    Prefetch,

    /// The listener hit the end of the queue; playback continues once the result arrives
    Advance,
}

/// A fetch the host must run, then hand back via `receive_recommendations`
///
/// Carries enough context for the controller to recognise a result that
/// arrives after the queue was replaced or the listener moved on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecommendationRequest {
    pub track_id: String,
    pub purpose: FetchPurpose,
    pub(crate) generation: u64,
    pub(crate) cursor: Option<usize>,
}

impl RecommendationRequest {
    /// Run this request against `gateway`
    pub async fn run(&self, gateway: &dyn RecommendationGateway) -> Result<Vec<Track>> {
        gateway.fetch_recommendations(&self.track_id).await
    }
}

/// State of the fetch for the current queue's last track
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) enum FetchState {
    #[default]
    Idle,
    InFlight(String),
    Completed(String),
}

impl FetchState {
    pub(crate) fn is_settled_for(&self, track_id: &str) -> bool {
        matches!(self, Self::Completed(id) if id == track_id)
    }

    pub(crate) fn is_pending_for(&self, track_id: &str) -> bool {
        matches!(self, Self::InFlight(id) | Self::Completed(id) if id == track_id)
    }
}

/// Transition that may need a recommendation fetch to finish
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// State is final
    Complete,

    /// Run the request and pass its result to `receive_recommendations`
    NeedsRecommendations(RecommendationRequest),
}
