//! Resolution options and the state of an in-flight source swap

use serde::{Deserialize, Serialize};

/// Hint that hands quality selection back to the widget
pub const AUTO_QUALITY_HINT: &str = "default";

/// One selectable rendition of a lesson's video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionOption {
    pub id: String,
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub source_url: String,
}

impl ResolutionOption {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        width: u32,
        height: u32,
        source_url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            width,
            height,
            source_url: source_url.into(),
        }
    }

    /// Quality level understood by widgets that only accept a hint.
    pub fn quality_hint(&self) -> &'static str {
        match self.height {
            1080 => "hd1080",
            720 => "hd720",
            480 => "large",
            360 => "medium",
            240 => "small",
            144 => "tiny",
            _ => AUTO_QUALITY_HINT,
        }
    }
}

/// Static per-lesson set of options, ordered ascending by height.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolutionSet {
    options: Vec<ResolutionOption>,
}

impl ResolutionSet {
    pub fn new(mut options: Vec<ResolutionOption>) -> Self {
        options.sort_by_key(|o| o.height);
        Self { options }
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn options(&self) -> &[ResolutionOption] {
        &self.options
    }

    pub fn get(&self, id: &str) -> Option<&ResolutionOption> {
        self.options.iter().find(|o| o.id == id)
    }

    /// Full HD when offered, otherwise the highest option.
    pub fn preferred(&self) -> Option<&ResolutionOption> {
        self.options
            .iter()
            .find(|o| o.width == 1920 && o.height == 1080)
            .or_else(|| self.options.last())
    }
}

impl From<Vec<ResolutionOption>> for ResolutionSet {
    fn from(options: Vec<ResolutionOption>) -> Self {
        Self::new(options)
    }
}

/// A playback command issued while the new source is loading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DeferredCommand {
    Play,
    Pause,
    Seek(f64),
    /// Rewind and play after the lesson ended
    Restart,
}

/// Position and play state captured when a source swap starts.
///
/// Playback commands issued until the new source loads are queued here and
/// replayed, in order, after the position is restored.
#[derive(Debug, Clone, PartialEq)]
pub struct QualitySwitch {
    pub target_id: String,
    pub captured_time: f64,
    pub was_playing: bool,
    deferred: Vec<DeferredCommand>,
}

/// What the session must do once the new source has loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct RestorePlan {
    pub seek_to: f64,
    pub commands: Vec<DeferredCommand>,
}

impl QualitySwitch {
    pub fn begin(target_id: impl Into<String>, captured_time: f64, was_playing: bool) -> Self {
        Self {
            target_id: target_id.into(),
            captured_time,
            was_playing,
            deferred: Vec::new(),
        }
    }

    pub fn defer(&mut self, command: DeferredCommand) {
        log::debug!("deferring {command:?} until source {} loads", self.target_id);
        self.deferred.push(command);
    }

    pub fn deferred(&self) -> &[DeferredCommand] {
        &self.deferred
    }

    /// Point a pending switch at another option, keeping the position and
    /// play state captured when the first swap started.
    pub fn retarget(self, target_id: impl Into<String>) -> Self {
        Self {
            target_id: target_id.into(),
            ..self
        }
    }

    /// Restore the play state, then replay whatever the user did during the
    /// swap. A deferred seek overrides the captured position.
    pub fn finish(self) -> RestorePlan {
        let mut commands = Vec::with_capacity(self.deferred.len() + 1);
        commands.push(if self.was_playing {
            DeferredCommand::Play
        } else {
            DeferredCommand::Pause
        });
        commands.extend(self.deferred);
        RestorePlan {
            seek_to: self.captured_time,
            commands,
        }
    }
}
