//! WASM bindings for loopz-playback
//!
//! Browser implementations of the media and storage seams, plus a
//! JavaScript-facing wrapper around the PlaybackController.

pub mod backend;
pub mod manager;
pub mod types;

pub use backend::{HtmlAudioBackend, SessionStorage};
pub use manager::WasmPlayer;
pub use types::WasmTrack;
