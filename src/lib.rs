//! Lessonsync
//!
//! Playback synchronization and timestamped annotations for lesson videos
//! hosted in an external, asynchronously loaded embeddable player.
//!
//! # Features
//!
//! - **Adapter**: wraps an opaque widget behind a capability-checked facade
//! - **Polled clock**: keeps current time, buffering and transcript position fresh
//! - **Annotations**: timestamped notes and transcript segments with active-segment lookup
//! - **Quality switching**: swaps sources without losing position or play state
//! - **Completion**: an idempotent "lesson finished" signal
//!
//! # Example
//!
//! ```no_run
//! use lessonsync::adapter::scripted::{ScriptedFactory, ScriptedHost};
//! use lessonsync::{LessonDescriptor, LessonMedia, PlayerConfig, PlayerEnvironment, PlayerSession, SessionHooks};
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let env = PlayerEnvironment::new(Arc::new(ScriptedHost::ready()), Arc::new(ScriptedFactory::new(600.0)));
//! let hooks = SessionHooks::new()
//!     .on_time_update(|t| println!("at {t:.1}s"))
//!     .on_complete(|| println!("lesson finished"));
//!
//! let lesson = LessonDescriptor::new("l1", "Intro", "https://youtu.be/dQw4w9WgXcQ");
//! let session = PlayerSession::mount(lesson, LessonMedia::default(), env, PlayerConfig::default(), hooks);
//! session.play();
//! # }
//! ```

use serde::Deserialize;

pub mod error;
pub use error::{Error, Result};

// External widget seam: raw widget trait, facade, bootstrap gate, scripted impls
pub mod adapter;

pub mod annotations;
pub mod completion;
pub mod controls;
pub mod lesson;
pub mod playback;
pub mod progress;
pub mod quality;
pub mod session;
pub mod sync;

mod timers;

pub use adapter::bootstrap::{BootstrapGate, BootstrapStatus, ScriptHost};
pub use adapter::facade::WidgetFacade;
pub use adapter::{Capabilities, Widget, WidgetEvent, WidgetEvents, WidgetFactory, WidgetRequest};
pub use annotations::notes::{NoteBook, NoteDraft, NoteFilter, PointNote};
pub use annotations::transcript::{ActiveSegmentTracker, RangeSegment, TranscriptIndex};
pub use annotations::Annotation;
pub use completion::CompletionDetector;
pub use lesson::{LessonDescriptor, VideoSource};
pub use playback::{PlaybackState, StateMachine, Transition};
pub use progress::{format_timestamp, percent, Progress};
pub use quality::{ResolutionOption, ResolutionSet, AUTO_QUALITY_HINT};
pub use session::{
    Availability, LessonMedia, PlayerEnvironment, PlayerSession, PlayerStatus, SessionHooks,
    PLAYBACK_RATES,
};

/// Time sync period in milliseconds
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;
/// Distance from the end (seconds) at which a lesson counts as finished
pub const DEFAULT_COMPLETION_EPSILON_SECS: f64 = 0.5;
/// Pointer inactivity window before controls hide, in milliseconds
pub const DEFAULT_CONTROLS_HIDE_DELAY_MS: u64 = 3000;
/// Number of readiness probes before the widget script is declared unavailable
pub const DEFAULT_BOOTSTRAP_MAX_ATTEMPTS: u32 = 5;
/// Fixed spacing between readiness probes, in milliseconds
pub const DEFAULT_BOOTSTRAP_RETRY_MS: u64 = 1000;
/// Bootstrap script of the hosted video platform's embeddable player
pub const DEFAULT_BOOTSTRAP_SCRIPT_URL: &str = "https://www.youtube.com/iframe_api";

/// Configuration for a player session
///
/// The defaults reproduce the behavior lessons have always had: a 500 ms
/// clock, a half-second completion guard and a 3 s control auto-hide. The
/// poll interval and the completion epsilon are independent knobs; neither
/// is derived from the other.
///
/// # Examples
///
/// ```
/// let cfg = lessonsync::PlayerConfig::default();
/// assert_eq!(cfg.poll_interval_ms, 500);
/// assert!(cfg.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Time sync period in milliseconds
    pub poll_interval_ms: u64,
    /// Completion guard for widgets that never emit a clean end signal
    pub completion_epsilon_secs: f64,
    /// Pointer inactivity window before controls hide
    pub controls_hide_delay_ms: u64,
    /// Readiness probes before the bootstrap is declared unavailable
    pub bootstrap_max_attempts: u32,
    /// Spacing between readiness probes
    pub bootstrap_retry_ms: u64,
    /// Script injected (once per process) to bootstrap the widget API
    pub bootstrap_script_url: String,
    /// Initial volume, 0..=100
    pub default_volume: u8,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            completion_epsilon_secs: DEFAULT_COMPLETION_EPSILON_SECS,
            controls_hide_delay_ms: DEFAULT_CONTROLS_HIDE_DELAY_MS,
            bootstrap_max_attempts: DEFAULT_BOOTSTRAP_MAX_ATTEMPTS,
            bootstrap_retry_ms: DEFAULT_BOOTSTRAP_RETRY_MS,
            bootstrap_script_url: DEFAULT_BOOTSTRAP_SCRIPT_URL.to_string(),
            default_volume: 100,
        }
    }
}

impl PlayerConfig {
    /// Parse a configuration from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let cfg: PlayerConfig = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject values that would stall a timer or break the progress math.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(Error::Config("poll_interval_ms must be positive".into()));
        }
        if self.controls_hide_delay_ms == 0 {
            return Err(Error::Config("controls_hide_delay_ms must be positive".into()));
        }
        if self.bootstrap_max_attempts == 0 {
            return Err(Error::Config("bootstrap_max_attempts must be at least 1".into()));
        }
        if !self.completion_epsilon_secs.is_finite() || self.completion_epsilon_secs < 0.0 {
            return Err(Error::Config(format!(
                "completion_epsilon_secs must be a non-negative number, got {}",
                self.completion_epsilon_secs
            )));
        }
        if self.default_volume > 100 {
            return Err(Error::Config(format!(
                "default_volume must be within 0..=100, got {}",
                self.default_volume
            )));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.poll_interval_ms)
    }

    pub fn controls_hide_delay(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.controls_hide_delay_ms)
    }

    pub fn bootstrap_retry(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.bootstrap_retry_ms)
    }
}
