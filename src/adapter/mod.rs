//! External player adapter: the seam between the session and the embeddable widget
//!
//! The widget is opaque: it loads asynchronously, may not expose every method,
//! and pushes a handful of events (ready, numeric state changes, source loaded,
//! errors). This module holds the raw trait such a widget implements, the
//! channel its events flow through, and the factory that builds one per
//! session. `facade` wraps the raw widget into a checked command surface and
//! `bootstrap` guards the one-time script load.

pub mod bootstrap;
pub mod facade;
pub mod scripted;

use crate::lesson::VideoSource;
use crate::Result;
use tokio::sync::mpsc;

/// Methods a raw widget handle actually exposes.
///
/// Probed once when the facade is built; a missing capability turns the
/// corresponding facade command into a silent no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub play: bool,
    pub pause: bool,
    pub seek: bool,
    pub volume: bool,
    pub mute: bool,
    pub playback_rate: bool,
    pub quality_hint: bool,
    pub load_source: bool,
    pub current_time: bool,
    pub duration: bool,
    pub loaded_fraction: bool,
    pub destroy: bool,
}

impl Capabilities {
    pub const fn all() -> Self {
        Self {
            play: true,
            pause: true,
            seek: true,
            volume: true,
            mute: true,
            playback_rate: true,
            quality_hint: true,
            load_source: true,
            current_time: true,
            duration: true,
            loaded_fraction: true,
            destroy: true,
        }
    }

    pub const fn none() -> Self {
        Self {
            play: false,
            pause: false,
            seek: false,
            volume: false,
            mute: false,
            playback_rate: false,
            quality_hint: false,
            load_source: false,
            current_time: false,
            duration: false,
            loaded_fraction: false,
            destroy: false,
        }
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::all()
    }
}

/// Raw handle to an embeddable video widget.
///
/// Implementations forward to whatever the platform provides. Methods not
/// listed in `capabilities()` are never called by the facade, so they may be
/// left as no-ops.
pub trait Widget: Send {
    /// Which of the methods below are safe to call on this handle
    fn capabilities(&self) -> Capabilities;

    fn play_video(&mut self);
    fn pause_video(&mut self);
    fn seek_to(&mut self, seconds: f64, allow_seek_ahead: bool);
    /// Volume on the widget's 0..=100 scale
    fn set_volume(&mut self, volume: u8);
    fn mute(&mut self);
    fn unmute(&mut self);
    fn set_playback_rate(&mut self, rate: f64);
    /// Hint a quality level (e.g. `hd720`) without changing the source
    fn set_playback_quality(&mut self, quality: &str);
    /// Replace the underlying media source; the widget later emits `SourceLoaded`
    fn load_source(&mut self, url: &str);

    fn current_time(&self) -> f64;
    fn duration(&self) -> f64;
    /// Fraction of the media buffered so far, 0.0..=1.0
    fn loaded_fraction(&self) -> f64;

    /// Release the widget and everything it holds
    fn destroy(&mut self);
}

/// Events pushed by the widget.
#[derive(Debug, Clone, PartialEq)]
pub enum WidgetEvent {
    /// The widget finished constructing and accepts commands
    Ready,
    /// Numeric state code as reported by the widget (see `PlaybackState::from_code`)
    StateChange(i32),
    /// A source swapped in with `load_source` has loaded
    SourceLoaded,
    /// Playback or embedding error reported by the widget
    Error { code: Option<i32>, message: String },
}

/// Sending half of a widget's event channel.
///
/// Emitting after the owning session was torn down is a silent no-op.
#[derive(Debug, Clone)]
pub struct WidgetEvents {
    tx: mpsc::UnboundedSender<WidgetEvent>,
}

impl WidgetEvents {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<WidgetEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn emit(&self, event: WidgetEvent) {
        if self.tx.send(event).is_err() {
            log::debug!("widget event dropped: session already torn down");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// What a factory needs to build a widget for one session.
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetRequest {
    /// Identifier extracted from the lesson's video URL
    pub source: VideoSource,
    /// Initial source URL when the lesson ships explicit resolutions
    pub initial_source_url: Option<String>,
    /// Position to start from, in seconds
    pub start_seconds: f64,
}

/// Builds one widget per session once the bootstrap script is ready.
pub trait WidgetFactory: Send + Sync {
    fn create(&self, request: &WidgetRequest, events: WidgetEvents) -> Result<Box<dyn Widget>>;
}
