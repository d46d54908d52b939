//! Audio channels
//!
//! An [`AudioChannel`] owns one platform media element (behind
//! [`MediaBackend`]) and turns its raw lifecycle into the handful of signals
//! the controller acts on. The controller keeps two: the audible primary and
//! a silent preload that buffers the upcoming track.

use crate::error::{MediaErrorKind, PlaybackError, Result};
use crate::types::Track;
use tracing::debug;

/// Platform media element
///
/// Implementations only forward commands; everything they observe comes back
/// through [`MediaEvent`]s delivered to the controller. On the web this is an
/// `HTMLAudioElement`; tests use recording fakes.
pub trait MediaBackend {
    /// Point the element at `url` and start buffering
    fn set_source(&mut self, url: &str);

    /// Detach the source and free the underlying resource
    fn clear_source(&mut self);

    /// Ask the element to play from its current position
    ///
    /// Returns `Err(PlaybackError::PlaybackRejected)` when the platform refuses
    /// synchronously. Refusals the platform reports later arrive as
    /// [`MediaEventKind::PlayRejected`].
    fn play(&mut self) -> Result<()>;

    fn pause(&mut self);

    fn set_position(&mut self, seconds: f64);

    /// Output gain, 0.0-1.0
    fn set_volume(&mut self, volume: f32);
}

/// Stable identity of a media element, assigned when the controller is built
///
/// Survives primary/preload swaps, so the host can tag events with the
/// element they came from without knowing which role it currently plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId(pub u8);

/// Native media element event
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEventKind {
    TimeUpdate(f64),
    DurationChange(f64),
    Waiting,
    Stalled,
    CanPlay,
    CanPlayThrough,
    Playing,
    Ended,
    Error { code: u16 },
    PlayRejected { reason: String },
}

impl MediaEventKind {
    /// Build from a DOM event name; `value` carries the time, duration, or error code
    pub fn from_dom(name: &str, value: f64) -> Option<Self> {
        let kind = match name {
            "timeupdate" => Self::TimeUpdate(value),
            "durationchange" | "loadedmetadata" => Self::DurationChange(value),
            "waiting" => Self::Waiting,
            "stalled" => Self::Stalled,
            "canplay" => Self::CanPlay,
            "canplaythrough" => Self::CanPlayThrough,
            "playing" => Self::Playing,
            "ended" => Self::Ended,
            "error" => Self::Error {
                code: if value.is_finite() && value >= 0.0 { value as u16 } else { 0 },
            },
            "playrejected" => Self::PlayRejected {
                reason: "NotAllowedError".to_string(),
            },
            _ => return None,
        };
        Some(kind)
    }
}

/// Native event tagged with the source URL it belongs to
#[derive(Debug, Clone, PartialEq)]
pub struct MediaEvent {
    pub src: String,
    pub kind: MediaEventKind,
}

impl MediaEvent {
    pub fn new(src: impl Into<String>, kind: MediaEventKind) -> Self {
        Self {
            src: src.into(),
            kind,
        }
    }
}

/// Signals the controller reacts to
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    TimeUpdate(f64),
    DurationKnown(f64),
    Buffering,
    ReadyToPlay,
    Started,
    Ended,
    Error(MediaErrorKind),
    PlaybackRejected(String),
}

/// One owned media element plus what the controller needs to know about it
pub struct AudioChannel {
    id: ChannelId,
    backend: Box<dyn MediaBackend>,
    src: Option<String>,
    track_id: Option<String>,
    duration: Option<f64>,
    position: f64,
    ready: bool,
}

impl AudioChannel {
    pub fn new(id: ChannelId, backend: Box<dyn MediaBackend>) -> Self {
        Self {
            id,
            backend,
            src: None,
            track_id: None,
            duration: None,
            position: 0.0,
            ready: false,
        }
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    /// Start buffering `track`
    ///
    /// Returns `false` without touching the element when the URL is already
    /// the current source.
    pub fn load(&mut self, track: &Track) -> bool {
        self.track_id = Some(track.id.clone());
        if self.src.as_deref() == Some(track.audio_url.as_str()) {
            return false;
        }

        self.backend.set_source(&track.audio_url);
        self.src = Some(track.audio_url.clone());
        self.duration = None;
        self.position = 0.0;
        self.ready = false;
        true
    }

    /// Rewind and play
    pub fn play_from_start(&mut self) -> Result<()> {
        if self.src.is_none() {
            return Err(PlaybackError::EmptyQueue);
        }
        self.backend.set_position(0.0);
        self.position = 0.0;
        self.backend.play()
    }

    /// Play from the current position
    pub fn resume(&mut self) -> Result<()> {
        if self.src.is_none() {
            return Err(PlaybackError::EmptyQueue);
        }
        self.backend.play()
    }

    pub fn pause(&mut self) {
        if self.src.is_some() {
            self.backend.pause();
        }
    }

    /// Seek within the loaded source
    ///
    /// Clamped to the known duration. Returns the applied position, or `None`
    /// while the duration is still unknown.
    pub fn seek_to(&mut self, seconds: f64) -> Option<f64> {
        let duration = self.duration?;
        let target = if seconds.is_finite() {
            seconds.clamp(0.0, duration)
        } else {
            0.0
        };
        self.backend.set_position(target);
        self.position = target;
        Some(target)
    }

    /// Back to 0:00 without touching play/pause
    pub fn rewind(&mut self) {
        if self.src.is_some() {
            self.backend.set_position(0.0);
        }
        self.position = 0.0;
    }

    /// Detach and free the source
    pub fn release(&mut self) {
        if self.src.is_some() {
            self.backend.pause();
            self.backend.clear_source();
        }
        self.src = None;
        self.track_id = None;
        self.duration = None;
        self.position = 0.0;
        self.ready = false;
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.backend.set_volume(volume);
    }

    /// Translate a native event
    ///
    /// Events for a source this channel no longer holds are dropped.
    pub fn handle(&mut self, event: MediaEvent) -> Option<ChannelEvent> {
        if self.src.as_deref() != Some(event.src.as_str()) {
            debug!(channel = self.id.0, src = %event.src, "Ignoring stale media event");
            return None;
        }

        let translated = match event.kind {
            MediaEventKind::TimeUpdate(secs) => {
                if !secs.is_finite() || secs < 0.0 {
                    return None;
                }
                self.position = secs;
                ChannelEvent::TimeUpdate(secs)
            }
            MediaEventKind::DurationChange(secs) => {
                if !secs.is_finite() || secs <= 0.0 {
                    return None;
                }
                self.duration = Some(secs);
                ChannelEvent::DurationKnown(secs)
            }
            MediaEventKind::Waiting | MediaEventKind::Stalled => ChannelEvent::Buffering,
            MediaEventKind::CanPlay | MediaEventKind::CanPlayThrough => {
                self.ready = true;
                ChannelEvent::ReadyToPlay
            }
            MediaEventKind::Playing => {
                self.ready = true;
                ChannelEvent::Started
            }
            MediaEventKind::Ended => ChannelEvent::Ended,
            MediaEventKind::Error { code } => {
                self.ready = false;
                ChannelEvent::Error(MediaErrorKind::from_code(code))
            }
            MediaEventKind::PlayRejected { reason } => ChannelEvent::PlaybackRejected(reason),
        };

        Some(translated)
    }

    /// Source URL currently attached
    pub fn src(&self) -> Option<&str> {
        self.src.as_deref()
    }

    /// Id of the track currently attached
    pub fn track_id(&self) -> Option<&str> {
        self.track_id.as_deref()
    }

    pub fn is_holding(&self, track: &Track) -> bool {
        self.track_id.as_deref() == Some(track.id.as_str())
            && self.src.as_deref() == Some(track.audio_url.as_str())
    }

    pub fn is_loaded(&self) -> bool {
        self.src.is_some()
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    pub fn position(&self) -> f64 {
        self.position
    }
}

impl std::fmt::Debug for AudioChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioChannel")
            .field("id", &self.id)
            .field("src", &self.src)
            .field("track_id", &self.track_id)
            .field("duration", &self.duration)
            .field("ready", &self.ready)
            .finish()
    }
}

/// Backend that only remembers what it was told
///
/// Lets the controller run headless (tests, server-side previews).
#[derive(Debug, Default, Clone)]
pub struct NullBackend {
    pub src: Option<String>,
    pub position: f64,
    pub volume: f32,
    pub playing: bool,
}

impl MediaBackend for NullBackend {
    fn set_source(&mut self, url: &str) {
        self.src = Some(url.to_string());
        self.position = 0.0;
        self.playing = false;
    }

    fn clear_source(&mut self) {
        self.src = None;
        self.playing = false;
    }

    fn play(&mut self) -> Result<()> {
        self.playing = true;
        Ok(())
    }

    fn pause(&mut self) {
        self.playing = false;
    }

    fn set_position(&mut self, seconds: f64) {
        self.position = seconds;
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Calls {
        loads: Vec<String>,
        clears: usize,
        positions: Vec<f64>,
    }

    struct RecordingBackend(Rc<RefCell<Calls>>);

    impl MediaBackend for RecordingBackend {
        fn set_source(&mut self, url: &str) {
            self.0.borrow_mut().loads.push(url.to_string());
        }
        fn clear_source(&mut self) {
            self.0.borrow_mut().clears += 1;
        }
        fn play(&mut self) -> Result<()> {
            Ok(())
        }
        fn pause(&mut self) {}
        fn set_position(&mut self, seconds: f64) {
            self.0.borrow_mut().positions.push(seconds);
        }
        fn set_volume(&mut self, _volume: f32) {}
    }

    fn channel() -> (AudioChannel, Rc<RefCell<Calls>>) {
        let calls = Rc::new(RefCell::new(Calls::default()));
        let channel = AudioChannel::new(ChannelId(0), Box::new(RecordingBackend(calls.clone())));
        (channel, calls)
    }

    fn track(id: &str) -> Track {
        Track::new(id, "Song", format!("https://loopz.test/{}.mp3", id))
    }

    #[test]
    fn load_is_idempotent_for_same_url() {
        let (mut channel, calls) = channel();
        assert!(channel.load(&track("1")));
        assert!(!channel.load(&track("1")));
        assert_eq!(calls.borrow().loads.len(), 1);
        assert!(channel.is_holding(&track("1")));
    }

    #[test]
    fn seek_is_noop_until_duration_known() {
        let (mut channel, calls) = channel();
        channel.load(&track("1"));
        assert_eq!(channel.seek_to(30.0), None);
        assert!(calls.borrow().positions.is_empty());

        let src = channel.src().unwrap().to_string();
        channel.handle(MediaEvent::new(&src, MediaEventKind::DurationChange(120.0)));

        assert_eq!(channel.seek_to(30.0), Some(30.0));
        assert_eq!(channel.seek_to(500.0), Some(120.0));
        assert_eq!(channel.seek_to(-4.0), Some(0.0));
    }

    #[test]
    fn stale_events_are_dropped() {
        let (mut channel, _) = channel();
        channel.load(&track("1"));
        let old_src = channel.src().unwrap().to_string();
        channel.load(&track("2"));

        assert!(channel.handle(MediaEvent::new(old_src, MediaEventKind::Ended)).is_none());
    }

    #[test]
    fn events_translate() {
        let (mut channel, _) = channel();
        channel.load(&track("1"));
        let src = channel.src().unwrap().to_string();

        assert_eq!(
            channel.handle(MediaEvent::new(&src, MediaEventKind::Stalled)),
            Some(ChannelEvent::Buffering)
        );
        assert_eq!(
            channel.handle(MediaEvent::new(&src, MediaEventKind::CanPlayThrough)),
            Some(ChannelEvent::ReadyToPlay)
        );
        assert!(channel.is_ready());
        assert_eq!(
            channel.handle(MediaEvent::new(&src, MediaEventKind::Error { code: 3 })),
            Some(ChannelEvent::Error(MediaErrorKind::DecodeFailure))
        );
        assert_eq!(
            channel.handle(MediaEvent::new(&src, MediaEventKind::DurationChange(f64::NAN))),
            None
        );
    }

    #[test]
    fn release_clears_everything() {
        let (mut channel, calls) = channel();
        channel.load(&track("1"));
        channel.release();

        assert!(!channel.is_loaded());
        assert!(channel.track_id().is_none());
        assert_eq!(calls.borrow().clears, 1);

        // Releasing twice does not touch the element again
        channel.release();
        assert_eq!(calls.borrow().clears, 1);
    }

    #[test]
    fn play_without_source_is_empty_queue() {
        let (mut channel, _) = channel();
        assert!(matches!(channel.play_from_start(), Err(PlaybackError::EmptyQueue)));
    }

    #[test]
    fn dom_names_parse() {
        assert_eq!(
            MediaEventKind::from_dom("timeupdate", 3.5),
            Some(MediaEventKind::TimeUpdate(3.5))
        );
        assert_eq!(
            MediaEventKind::from_dom("error", 2.0),
            Some(MediaEventKind::Error { code: 2 })
        );
        assert_eq!(MediaEventKind::from_dom("volumechange", 0.0), None);
    }
}
