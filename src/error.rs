//! Error types for the lesson player core

use thiserror::Error;

/// Result type alias for player operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned to callers of the player core.
///
/// Failures raised by the external widget never appear here: they are
/// logged and surfaced through `PlayerStatus` instead of being returned.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Transcript segments violate ordering or range rules
    #[error("Invalid transcript: {0}")]
    InvalidTranscript(String),

    /// No resolution option with the requested id
    #[error("Unknown resolution: {0}")]
    UnknownResolution(String),

    /// The lesson has no resolution options to switch between
    #[error("Quality switching is not available for this lesson")]
    QualityUnavailable,

    /// Playback rate outside the accepted range
    #[error("Playback rate {0} is outside the supported range")]
    InvalidPlaybackRate(f64),

    /// No note with the requested id
    #[error("Unknown note: {0}")]
    UnknownNote(String),

    /// A note must carry some text
    #[error("Note content is empty")]
    EmptyNote,

    /// The widget factory could not construct a widget
    #[error("Widget creation failed: {0}")]
    WidgetCreation(String),

    /// JSON (de)serialization failed
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}
