//! LoopZ Client
//!
//! Backend access for the LoopZ player.
//!
//! # Features
//!
//! - **Recommendations**: [`LoopzClient`] implements the player's
//!   [`RecommendationGateway`](loopz_playback::RecommendationGateway)
//! - **Lenient parsing**: backend track records in either payload shape
//! - **Configuration**: [`LoopzConfig`] from a TOML file plus `LOOPZ_` environment variables
//!
//! # Example
//!
//! ```ignore
//! use loopz_client::{LoopzClient, LoopzConfig};
//! use loopz_playback::{MemoryStorage, NullBackend, PlaybackController};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = LoopzConfig::load()?;
//!     let client = LoopzClient::new(config.gateway.clone())?;
//!
//!     let mut player = PlaybackController::new(
//!         config.player,
//!         Box::new(NullBackend::default()),
//!         Box::new(NullBackend::default()),
//!         Box::new(MemoryStorage::new()),
//!     )
//!     .with_gateway(Arc::new(client));
//!
//!     player.next().await;
//!     Ok(())
//! }
//! ```

mod client;
mod error;
mod settings;
mod types;

// Re-export main types
pub use client::LoopzClient;
pub use error::{ClientError, Result};
pub use settings::{GatewaySettings, LoopzConfig, DEFAULT_RECOMMENDATIONS_PATH};
pub use types::{parse_duration, ApiTrack, ApiUser, RecommendationsResponse};
