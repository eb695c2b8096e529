//! Playback lifecycle derived from widget events

use serde::Serialize;

/// Canonical playback state.
///
/// `Ended` is terminal: only an explicit `StateMachine::reset` (replay)
/// leaves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    Unstarted,
    Cued,
    Buffering,
    Playing,
    Paused,
    Ended,
}

impl PlaybackState {
    /// Map the widget's numeric state code.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            -1 => Some(PlaybackState::Unstarted),
            0 => Some(PlaybackState::Ended),
            1 => Some(PlaybackState::Playing),
            2 => Some(PlaybackState::Paused),
            3 => Some(PlaybackState::Buffering),
            5 => Some(PlaybackState::Cued),
            _ => None,
        }
    }

    pub fn code(self) -> i32 {
        match self {
            PlaybackState::Unstarted => -1,
            PlaybackState::Ended => 0,
            PlaybackState::Playing => 1,
            PlaybackState::Paused => 2,
            PlaybackState::Buffering => 3,
            PlaybackState::Cued => 5,
        }
    }
}

/// Outcome of feeding a reported state into the machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The state changed
    Entered { from: PlaybackState, to: PlaybackState },
    /// Same state reported again; coalesced
    Repeated(PlaybackState),
    /// Refused because the machine is in `Ended`
    Rejected { to: PlaybackState },
}

impl Transition {
    pub fn entered(&self, state: PlaybackState) -> bool {
        matches!(self, Transition::Entered { to, .. } if *to == state)
    }

    pub fn left(&self, state: PlaybackState) -> bool {
        matches!(self, Transition::Entered { from, .. } if *from == state)
    }
}

/// The widget is authoritative for every move between non-terminal states,
/// including skips such as `Unstarted -> Playing`.
#[derive(Debug, Clone)]
pub struct StateMachine {
    state: PlaybackState,
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            state: PlaybackState::Unstarted,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn apply(&mut self, to: PlaybackState) -> Transition {
        if to == self.state {
            return Transition::Repeated(to);
        }
        if self.state == PlaybackState::Ended {
            return Transition::Rejected { to };
        }
        let from = self.state;
        self.state = to;
        Transition::Entered { from, to }
    }

    /// Leave `Ended` (or any state) for a fresh start.
    pub fn reset(&mut self) {
        self.state = PlaybackState::Unstarted;
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}
