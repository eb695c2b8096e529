//! One player session per visible lesson player
//!
//! A `PlayerSession` owns the widget facade, the playback state machine, the
//! time sync loop, the control visibility timer, the transcript index and
//! the completion latch for a single mounted lesson. Nothing here is shared
//! between sessions except the process-wide bootstrap gate.
//!
//! Widget events, timer ticks and user commands all funnel through one
//! mutex-guarded core. Consumer hooks are collected while the lock is held
//! and invoked after it is released, so a hook may call back into the
//! session.

use crate::adapter::bootstrap::{BootstrapGate, BootstrapStatus, ScriptHost};
use crate::adapter::facade::{QualityChange, WidgetFacade};
use crate::adapter::{WidgetEvent, WidgetEvents, WidgetFactory, WidgetRequest};
use crate::annotations::notes::PointNote;
use crate::annotations::transcript::{ActiveSegmentTracker, RangeSegment, TranscriptIndex};
use crate::completion::CompletionDetector;
use crate::controls::ControlVisibility;
use crate::lesson::{LessonDescriptor, VideoSource};
use crate::playback::{PlaybackState, StateMachine, Transition};
use crate::progress::Progress;
use crate::quality::{DeferredCommand, QualitySwitch, ResolutionOption, ResolutionSet};
use crate::sync::TimeSync;
use crate::timers::TaskSlot;
use crate::{Error, PlayerConfig, Result};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// Lowest accepted playback rate
pub const MIN_PLAYBACK_RATE: f64 = 0.25;
/// Highest accepted playback rate
pub const MAX_PLAYBACK_RATE: f64 = 2.0;
/// Rates offered by the player menu
pub const PLAYBACK_RATES: [f64; 6] = [0.5, 0.75, 1.0, 1.25, 1.5, 2.0];

pub type TimeUpdateHandler = Arc<dyn Fn(f64) + Send + Sync>;
pub type CompleteHandler = Arc<dyn Fn() + Send + Sync>;
pub type ActiveSegmentHandler = Arc<dyn Fn(Option<&RangeSegment>) + Send + Sync>;
pub type ErrorHandler = Arc<dyn Fn(&str) + Send + Sync>;

/// Callbacks consumed by progress tracking and the host UI.
#[derive(Clone, Default)]
pub struct SessionHooks {
    on_time_update: Option<TimeUpdateHandler>,
    on_complete: Option<CompleteHandler>,
    on_active_segment: Option<ActiveSegmentHandler>,
    on_error: Option<ErrorHandler>,
}

impl SessionHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called at most once per sync tick while playing.
    pub fn on_time_update<F>(mut self, f: F) -> Self
    where
        F: Fn(f64) + Send + Sync + 'static,
    {
        self.on_time_update = Some(Arc::new(f));
        self
    }

    /// Called exactly once per lesson view.
    pub fn on_complete<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_complete = Some(Arc::new(f));
        self
    }

    /// Called when the active transcript segment changes identity.
    pub fn on_active_segment<F>(mut self, f: F) -> Self
    where
        F: Fn(Option<&RangeSegment>) + Send + Sync + 'static,
    {
        self.on_active_segment = Some(Arc::new(f));
        self
    }

    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(f));
        self
    }
}

/// Page-level collaborators a session needs to build its widget.
#[derive(Clone)]
pub struct PlayerEnvironment {
    host: Arc<dyn ScriptHost>,
    factory: Arc<dyn WidgetFactory>,
    gate: Arc<BootstrapGate>,
}

impl PlayerEnvironment {
    /// Uses the process-wide bootstrap gate.
    pub fn new(host: Arc<dyn ScriptHost>, factory: Arc<dyn WidgetFactory>) -> Self {
        Self {
            host,
            factory,
            gate: BootstrapGate::global(),
        }
    }

    /// Use a dedicated gate instead of the process-wide one.
    pub fn with_gate(mut self, gate: Arc<BootstrapGate>) -> Self {
        self.gate = gate;
        self
    }

    pub fn gate(&self) -> &Arc<BootstrapGate> {
        &self.gate
    }
}

/// Optional per-lesson media: resolution options and transcript segments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LessonMedia {
    pub resolutions: Vec<ResolutionOption>,
    pub segments: Vec<RangeSegment>,
}

impl LessonMedia {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resolutions(mut self, resolutions: Vec<ResolutionOption>) -> Self {
        self.resolutions = resolutions;
        self
    }

    pub fn with_segments(mut self, segments: Vec<RangeSegment>) -> Self {
        self.segments = segments;
        self
    }
}

/// What the host page should render in place of the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    /// Waiting for the widget script or the widget itself
    Loading,
    /// Widget is ready and scriptable
    Live,
    /// Source can only be shown through a plain embed
    EmbedOnly,
    /// The video URL could not be resolved
    Placeholder,
    /// The widget failed to load; the rest of the page keeps working
    Unavailable,
}

/// Snapshot of the session for the host UI.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerStatus {
    pub is_loading: bool,
    pub is_playing: bool,
    pub playback_rate: f64,
    pub current_resolution_id: Option<String>,
    pub show_controls: bool,
    pub state: PlaybackState,
    pub availability: Availability,
    pub current_time: f64,
    pub duration: f64,
    pub buffered_seconds: f64,
    pub volume: u8,
    pub muted: bool,
    pub completed: bool,
    pub last_error: Option<String>,
}

enum Notice {
    Time(f64),
    Complete,
    Segment(Option<RangeSegment>),
    Error(String),
}

struct SessionCore {
    lesson: LessonDescriptor,
    source: Option<VideoSource>,
    availability: Availability,
    facade: Option<WidgetFacade>,
    machine: StateMachine,
    current_time: f64,
    duration: f64,
    buffered_seconds: f64,
    volume: u8,
    muted: bool,
    playback_rate: f64,
    resolutions: ResolutionSet,
    active_resolution: Option<String>,
    loaded_resolution: Option<String>,
    switch: Option<QualitySwitch>,
    transcript: TranscriptIndex,
    tracker: ActiveSegmentTracker,
    completion: CompletionDetector,
    controls: ControlVisibility,
    sync: TimeSync,
    attach: TaskSlot,
    // bumped on every lesson change; events from an older widget are ignored
    generation: u64,
    last_error: Option<String>,
    torn_down: bool,
}

impl SessionCore {
    fn is_loading(&self) -> bool {
        match self.availability {
            Availability::Loading => true,
            Availability::Live => self.machine.state() == PlaybackState::Buffering,
            _ => false,
        }
    }

    fn clamp_time(&self, t: f64) -> f64 {
        let t = if t.is_finite() { t.max(0.0) } else { 0.0 };
        if self.duration > 0.0 {
            t.min(self.duration)
        } else {
            t
        }
    }

    fn refresh_segment(&mut self, out: &mut Vec<Notice>) {
        let active = self.transcript.active_at(self.current_time);
        if self.tracker.update(active) {
            out.push(Notice::Segment(active.cloned()));
        }
    }

    fn load_media(&mut self, media: LessonMedia) {
        self.transcript = match TranscriptIndex::new(media.segments) {
            Ok(index) => index,
            Err(err) => {
                log::warn!("lesson {}: {err}; running without a transcript", self.lesson.id);
                TranscriptIndex::empty()
            }
        };
        self.tracker.reset();
        self.resolutions = ResolutionSet::new(media.resolutions);
        self.active_resolution = self.resolutions.preferred().map(|o| o.id.clone());
        self.loaded_resolution = None;
    }

    /// Release the widget and stop every task. Leaves the core reusable.
    fn release(&mut self) {
        self.attach.cancel();
        self.sync.stop();
        self.controls.cancel();
        self.switch = None;
        if let Some(mut facade) = self.facade.take() {
            facade.destroy();
        }
    }
}

struct Shared {
    core: Mutex<SessionCore>,
    hooks: SessionHooks,
    config: PlayerConfig,
    env: PlayerEnvironment,
}

/// Handle to a mounted lesson player. Dropping it unmounts the player.
pub struct PlayerSession {
    shared: Arc<Shared>,
}

impl PlayerSession {
    /// Mount a lesson: resolve its video, then bootstrap and build the widget
    /// in the background. Must be called from within a tokio runtime.
    ///
    /// An invalid `config` is replaced by the defaults (with a warning); an
    /// invalid transcript degrades to "no transcript".
    pub fn mount(
        lesson: LessonDescriptor,
        media: LessonMedia,
        env: PlayerEnvironment,
        config: PlayerConfig,
        hooks: SessionHooks,
    ) -> Self {
        let config = match config.validate() {
            Ok(()) => config,
            Err(err) => {
                log::warn!("{err}; falling back to default player configuration");
                PlayerConfig::default()
            }
        };

        let core = SessionCore {
            source: None,
            availability: Availability::Loading,
            facade: None,
            machine: StateMachine::new(),
            current_time: 0.0,
            duration: 0.0,
            buffered_seconds: 0.0,
            volume: config.default_volume,
            muted: false,
            playback_rate: 1.0,
            resolutions: ResolutionSet::default(),
            active_resolution: None,
            loaded_resolution: None,
            switch: None,
            transcript: TranscriptIndex::empty(),
            tracker: ActiveSegmentTracker::new(),
            completion: CompletionDetector::new(lesson.id.clone(), config.completion_epsilon_secs),
            controls: ControlVisibility::new(config.controls_hide_delay()),
            sync: TimeSync::new(config.poll_interval()),
            attach: TaskSlot::new(),
            generation: 0,
            last_error: None,
            torn_down: false,
            lesson,
        };

        let shared = Arc::new(Shared {
            core: Mutex::new(core),
            hooks,
            config,
            env,
        });
        {
            let mut guard = shared.lock();
            shared.start(&mut guard, media);
        }
        Self { shared }
    }

    pub fn status(&self) -> PlayerStatus {
        let core = self.shared.lock();
        PlayerStatus {
            is_loading: core.is_loading(),
            is_playing: core.machine.is_playing(),
            playback_rate: core.playback_rate,
            current_resolution_id: core.active_resolution.clone(),
            show_controls: core.controls.is_visible(),
            state: core.machine.state(),
            availability: core.availability,
            current_time: core.current_time,
            duration: core.duration,
            buffered_seconds: core.buffered_seconds,
            volume: core.volume,
            muted: core.muted,
            completed: core.completion.is_completed(),
            last_error: core.last_error.clone(),
        }
    }

    pub fn progress(&self) -> Progress {
        let core = self.shared.lock();
        Progress::new(core.current_time, core.buffered_seconds, core.duration)
    }

    pub fn state(&self) -> PlaybackState {
        self.shared.lock().machine.state()
    }

    pub fn current_time(&self) -> f64 {
        self.shared.lock().current_time
    }

    pub fn lesson(&self) -> LessonDescriptor {
        self.shared.lock().lesson.clone()
    }

    pub fn source(&self) -> Option<VideoSource> {
        self.shared.lock().source.clone()
    }

    pub fn resolutions(&self) -> Vec<ResolutionOption> {
        self.shared.lock().resolutions.options().to_vec()
    }

    pub fn transcript(&self) -> Vec<RangeSegment> {
        self.shared.lock().transcript.segments().to_vec()
    }

    pub fn active_segment(&self) -> Option<RangeSegment> {
        let core = self.shared.lock();
        core.transcript.active_at(core.current_time).cloned()
    }

    pub fn search_transcript(&self, query: &str) -> Vec<RangeSegment> {
        self.shared
            .lock()
            .transcript
            .search(query)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Start playback. After the lesson ended this replays from the start.
    pub fn play(&self) {
        self.shared.command(|_, core, out| {
            if let Some(switch) = core.switch.as_mut() {
                let left_end = switch
                    .deferred()
                    .iter()
                    .any(|c| matches!(c, DeferredCommand::Seek(_) | DeferredCommand::Restart));
                if core.machine.state() == PlaybackState::Ended && !left_end {
                    switch.defer(DeferredCommand::Restart);
                } else {
                    switch.defer(DeferredCommand::Play);
                }
                return;
            }
            if core.machine.state() == PlaybackState::Ended {
                restart(core, out);
                return;
            }
            if let Some(facade) = core.facade.as_mut() {
                facade.play();
            }
        });
    }

    pub fn pause(&self) {
        self.shared.command(|_, core, _| {
            if let Some(switch) = core.switch.as_mut() {
                switch.defer(DeferredCommand::Pause);
                return;
            }
            if let Some(facade) = core.facade.as_mut() {
                facade.pause();
            }
        });
    }

    pub fn toggle_play(&self) {
        let playing = {
            let core = self.shared.lock();
            match &core.switch {
                Some(switch) => switch
                    .deferred()
                    .iter()
                    .rev()
                    .find_map(|c| match c {
                        DeferredCommand::Play | DeferredCommand::Restart => Some(true),
                        DeferredCommand::Pause => Some(false),
                        DeferredCommand::Seek(_) => None,
                    })
                    .unwrap_or(switch.was_playing),
                None => core.machine.is_playing(),
            }
        };
        if playing {
            self.pause();
        } else {
            self.play();
        }
    }

    /// Explicit reset out of `Ended`: rewind and play again.
    ///
    /// The completion latch is kept; the lesson already counts as finished
    /// for this view.
    pub fn replay(&self) {
        self.shared.command(|_, core, out| {
            if let Some(switch) = core.switch.as_mut() {
                switch.defer(DeferredCommand::Restart);
                return;
            }
            restart(core, out);
        });
    }

    /// Reposition playback. `current_time` is updated right away instead of
    /// waiting for the next sync tick.
    pub fn seek_to(&self, seconds: f64) {
        self.shared.command(|_, core, out| seek(core, seconds, out));
    }

    /// Seek to a pinned note. Returns `false` for a note without timestamp.
    pub fn seek_to_note(&self, note: &PointNote) -> bool {
        match note.timestamp {
            Some(t) => {
                self.seek_to(t);
                true
            }
            None => false,
        }
    }

    pub fn seek_to_segment(&self, segment: &RangeSegment) {
        self.seek_to(segment.start_time);
    }

    /// Set the volume (0..=100). Zero mutes; a non-zero volume unmutes.
    pub fn set_volume(&self, volume: u8) {
        let volume = volume.min(100);
        self.shared.command(|_, core, _| {
            let Some(facade) = core.facade.as_mut() else {
                return;
            };
            if !facade.set_volume(volume) {
                return;
            }
            core.volume = volume;
            if volume == 0 && !core.muted {
                core.muted = facade.mute();
            } else if volume > 0 && core.muted && facade.unmute() {
                core.muted = false;
            }
        });
    }

    pub fn mute(&self) {
        self.shared.command(|_, core, _| {
            if let Some(facade) = core.facade.as_mut() {
                if facade.mute() {
                    core.muted = true;
                }
            }
        });
    }

    pub fn unmute(&self) {
        self.shared.command(|_, core, _| {
            if let Some(facade) = core.facade.as_mut() {
                if facade.unmute() {
                    core.muted = false;
                }
            }
        });
    }

    pub fn toggle_mute(&self) {
        if self.shared.lock().muted {
            self.unmute();
        } else {
            self.mute();
        }
    }

    /// Change the playback rate; accepted range is 0.25..=2.0.
    pub fn set_playback_rate(&self, rate: f64) -> Result<()> {
        if !rate.is_finite() || !(MIN_PLAYBACK_RATE..=MAX_PLAYBACK_RATE).contains(&rate) {
            return Err(Error::InvalidPlaybackRate(rate));
        }
        self.shared.command(|_, core, _| {
            if let Some(facade) = core.facade.as_mut() {
                if facade.set_playback_rate(rate) {
                    core.playback_rate = rate;
                }
            }
        });
        Ok(())
    }

    /// Switch to another resolution, keeping position and play state.
    ///
    /// Before the widget is ready the choice is only recorded; it decides the
    /// initial source or is applied once the widget reports ready.
    pub fn set_quality(&self, resolution_id: &str) -> Result<()> {
        let mut guard = self.shared.lock();
        let core = &mut *guard;
        if core.torn_down {
            return Ok(());
        }
        if core.resolutions.is_empty() {
            return Err(Error::QualityUnavailable);
        }
        if core.resolutions.get(resolution_id).is_none() {
            return Err(Error::UnknownResolution(resolution_id.to_string()));
        }
        if core.active_resolution.as_deref() == Some(resolution_id) {
            return Ok(());
        }
        if let Some(facade) = core.facade.as_ref() {
            let caps = facade.capabilities();
            if facade.is_ready() && !caps.load_source && !caps.quality_hint {
                return Err(Error::QualityUnavailable);
            }
        }
        core.active_resolution = Some(resolution_id.to_string());
        apply_quality(core);
        Ok(())
    }

    /// Leave quality selection to the widget. Widgets that only swap sources
    /// keep playing whatever they loaded last.
    pub fn set_auto_quality(&self) {
        self.shared.command(|_, core, _| {
            if core.active_resolution.take().is_some() {
                apply_quality(core);
            }
        });
    }

    /// Pointer activity over the player: show controls, restart the timer.
    pub fn pointer_moved(&self) {
        self.shared.command(|shared, core, _| shared.arm_controls(core, true));
    }

    /// Replace the lesson in this player. The old widget is released and a
    /// new one built; the completion latch resets only if the id changes.
    pub fn change_lesson(&self, lesson: LessonDescriptor, media: LessonMedia) {
        let mut guard = self.shared.lock();
        if guard.torn_down {
            return;
        }
        log::info!("changing lesson {} -> {}", guard.lesson.id, lesson.id);
        guard.release();
        guard.generation += 1;
        guard.completion.rebind(&lesson.id);
        guard.lesson = lesson;
        guard.machine.reset();
        guard.current_time = 0.0;
        guard.duration = 0.0;
        guard.buffered_seconds = 0.0;
        guard.playback_rate = 1.0;
        guard.last_error = None;
        guard.controls.force_visible();
        self.shared.start(&mut guard, media);
    }

    /// Tear the player down: stop every timer and release the widget. No
    /// widget reads happen after this returns. Idempotent.
    pub fn unmount(&self) {
        let mut core = self.shared.lock();
        if core.torn_down {
            return;
        }
        core.torn_down = true;
        core.release();
        log::info!("lesson {} unmounted", core.lesson.id);
    }
}

impl Drop for PlayerSession {
    fn drop(&mut self) {
        self.unmount();
    }
}

fn seek(core: &mut SessionCore, seconds: f64, out: &mut Vec<Notice>) {
    if let Some(switch) = core.switch.as_mut() {
        switch.defer(DeferredCommand::Seek(seconds));
        return;
    }
    let target = core.clamp_time(seconds);
    let Some(facade) = core.facade.as_mut() else {
        return;
    };
    if !facade.seek(target) {
        return;
    }
    // seeking away from the end is an explicit reset
    if core.machine.state() == PlaybackState::Ended {
        core.machine.reset();
    }
    core.current_time = target;
    core.refresh_segment(out);
}

fn restart(core: &mut SessionCore, out: &mut Vec<Notice>) {
    let Some(facade) = core.facade.as_mut() else {
        return;
    };
    if !facade.is_ready() {
        return;
    }
    core.machine.reset();
    facade.seek(0.0);
    facade.play();
    core.current_time = 0.0;
    core.refresh_segment(out);
}

fn apply_quality(core: &mut SessionCore) {
    let Some(facade) = core.facade.as_mut() else {
        // no widget yet; the choice becomes the initial source
        return;
    };
    if !facade.is_ready() {
        log::debug!("recording quality choice; widget not ready yet");
        return;
    }
    let Some(target) = core.active_resolution.clone() else {
        if facade.set_auto_quality() {
            log::info!("quality handed back to the widget");
        }
        core.loaded_resolution = None;
        return;
    };
    let Some(option) = core.resolutions.get(&target).cloned() else {
        return;
    };

    let captured = facade.current_time().unwrap_or(core.current_time);
    let was_playing = core.machine.is_playing();
    match facade.set_quality(&option) {
        QualityChange::Reloading => {
            log::info!("switching source to {target} at {captured:.1}s");
            core.switch = Some(match core.switch.take() {
                Some(pending) => pending.retarget(target.clone()),
                None => QualitySwitch::begin(target.clone(), captured, was_playing),
            });
        }
        QualityChange::Hinted => {
            log::info!("hinted quality {}", option.quality_hint());
            core.loaded_resolution = Some(target);
        }
        QualityChange::Dropped => {}
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SessionCore> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run a command against the core, then deliver any notices it produced.
    fn command<F>(self: &Arc<Self>, f: F)
    where
        F: FnOnce(&Arc<Self>, &mut SessionCore, &mut Vec<Notice>),
    {
        let mut out = Vec::new();
        {
            let mut guard = self.lock();
            if guard.torn_down {
                return;
            }
            f(self, &mut *guard, &mut out);
        }
        self.dispatch(out);
    }

    fn dispatch(&self, out: Vec<Notice>) {
        for notice in out {
            match notice {
                Notice::Time(t) => {
                    if let Some(h) = &self.hooks.on_time_update {
                        h(t);
                    }
                }
                Notice::Complete => {
                    if let Some(h) = &self.hooks.on_complete {
                        h();
                    }
                }
                Notice::Segment(segment) => {
                    if let Some(h) = &self.hooks.on_active_segment {
                        h(segment.as_ref());
                    }
                }
                Notice::Error(message) => {
                    if let Some(h) = &self.hooks.on_error {
                        h(&message);
                    }
                }
            }
        }
    }

    /// Resolve the lesson's source and, for a scriptable one, start attaching
    /// a widget in the background.
    fn start(self: &Arc<Self>, core: &mut SessionCore, media: LessonMedia) {
        core.load_media(media);
        core.source = core.lesson.source();
        core.availability = match &core.source {
            None => Availability::Placeholder,
            Some(source) if !source.supports_player_api() => Availability::EmbedOnly,
            Some(_) => Availability::Loading,
        };
        match core.availability {
            Availability::Placeholder => {
                log::warn!(
                    "lesson {}: unsupported video url {:?}; showing placeholder",
                    core.lesson.id,
                    core.lesson.video_url
                );
            }
            Availability::EmbedOnly => {
                log::info!("lesson {}: source is embed-only", core.lesson.id);
            }
            _ => {
                log::info!("mounting lesson {} ({})", core.lesson.id, core.lesson.title);
                let weak = Arc::downgrade(self);
                let generation = core.generation;
                core.attach.replace(tokio::spawn(attach(weak, generation)));
            }
        }
    }

    fn widget_request(&self, generation: u64) -> Option<WidgetRequest> {
        let mut core = self.lock();
        if core.torn_down || core.generation != generation {
            return None;
        }
        let source = core.source.clone()?;
        let initial = core
            .active_resolution
            .as_deref()
            .and_then(|id| core.resolutions.get(id))
            .map(|o| (o.id.clone(), o.source_url.clone()));
        let start_seconds = core.lesson.resume_from.filter(|t| *t > 0.0).unwrap_or(0.0);
        let (loaded, initial_source_url) = initial.unzip();
        core.loaded_resolution = loaded;
        Some(WidgetRequest {
            source,
            initial_source_url,
            start_seconds,
        })
    }

    fn install(&self, generation: u64, facade: WidgetFacade) {
        let mut core = self.lock();
        if core.torn_down || core.generation != generation {
            return;
        }
        core.facade = Some(facade);
    }

    fn fail(&self, generation: u64, message: String) {
        {
            let mut core = self.lock();
            if core.torn_down || core.generation != generation {
                return;
            }
            log::error!("lesson {}: {message}", core.lesson.id);
            core.availability = Availability::Unavailable;
            core.last_error = Some(message.clone());
        }
        self.dispatch(vec![Notice::Error(message)]);
    }

    fn handle_event(self: &Arc<Self>, generation: u64, event: WidgetEvent) {
        let mut out = Vec::new();
        {
            let mut guard = self.lock();
            let core = &mut *guard;
            if core.torn_down || core.generation != generation {
                return;
            }
            match event {
                WidgetEvent::Ready => self.on_ready(core, &mut out),
                WidgetEvent::StateChange(code) => match PlaybackState::from_code(code) {
                    Some(state) => self.on_state(core, state, &mut out),
                    None => log::debug!("ignoring unknown widget state code {code}"),
                },
                WidgetEvent::SourceLoaded => on_source_loaded(core, &mut out),
                WidgetEvent::Error { code, message } => {
                    let message = match code {
                        Some(code) => format!("widget error {code}: {message}"),
                        None => format!("widget error: {message}"),
                    };
                    log::warn!("lesson {}: {message}", core.lesson.id);
                    core.last_error = Some(message.clone());
                    out.push(Notice::Error(message));
                }
            }
        }
        self.dispatch(out);
    }

    fn on_ready(&self, core: &mut SessionCore, out: &mut Vec<Notice>) {
        let Some(facade) = core.facade.as_mut() else {
            return;
        };
        if facade.is_ready() {
            log::debug!("duplicate ready event ignored");
            return;
        }
        facade.mark_ready();
        core.availability = Availability::Live;
        core.duration = facade.duration().unwrap_or(0.0);
        log::info!("lesson {} ready ({:.1}s)", core.lesson.id, core.duration);

        if core.volume < 100 {
            facade.set_volume(core.volume);
            if core.volume == 0 {
                core.muted = facade.mute();
            }
        }
        if let Some(t) = core.lesson.resume_from.filter(|t| *t > 0.0) {
            let t = core.clamp_time(t);
            if let Some(facade) = core.facade.as_mut() {
                facade.seek(t);
            }
            core.current_time = t;
        }
        core.refresh_segment(out);

        if core.active_resolution != core.loaded_resolution {
            apply_quality(core);
        }
    }

    fn on_state(self: &Arc<Self>, core: &mut SessionCore, state: PlaybackState, out: &mut Vec<Notice>) {
        let transition = core.machine.apply(state);
        match transition {
            Transition::Repeated(_) => return,
            Transition::Rejected { to } => {
                log::warn!("ignoring {to:?} after the lesson ended; replay to restart");
                return;
            }
            Transition::Entered { from, to } => {
                log::debug!("playback {from:?} -> {to:?}");
            }
        }

        if transition.left(PlaybackState::Playing) {
            core.sync.stop();
        }
        match state {
            PlaybackState::Playing => {
                let weak = Arc::downgrade(self);
                core.sync.start(move || match weak.upgrade() {
                    Some(shared) => shared.sync_tick(),
                    None => false,
                });
                self.arm_controls(core, false);
            }
            PlaybackState::Paused => core.controls.force_visible(),
            PlaybackState::Ended => {
                core.controls.force_visible();
                if core.duration > 0.0 {
                    core.current_time = core.duration;
                }
                if core.completion.on_ended() {
                    out.push(Notice::Complete);
                }
            }
            PlaybackState::Unstarted | PlaybackState::Cued | PlaybackState::Buffering => {}
        }
    }

    fn arm_controls(self: &Arc<Self>, core: &mut SessionCore, reveal: bool) {
        let weak = Arc::downgrade(self);
        let on_expire = move || {
            if let Some(shared) = weak.upgrade() {
                shared.controls_expired();
            }
        };
        if reveal {
            core.controls.reveal(on_expire);
        } else {
            core.controls.arm(on_expire);
        }
    }

    fn controls_expired(&self) {
        let mut core = self.lock();
        if core.torn_down {
            return;
        }
        let playing = core.machine.is_playing();
        core.controls.expire(playing);
    }

    /// One poll of the widget clock. Returns `false` to end the loop.
    fn sync_tick(&self) -> bool {
        let mut out = Vec::new();
        {
            let mut guard = self.lock();
            let core = &mut *guard;
            if core.torn_down || !core.machine.is_playing() {
                return false;
            }
            // a reloading source reports 0; keep the captured position
            if core.switch.is_some() {
                return true;
            }
            let Some(facade) = core.facade.as_ref() else {
                return false;
            };
            let Some(t) = facade.current_time() else {
                return true;
            };
            let buffered = facade.buffered_fraction();
            if let Some(d) = facade.duration().filter(|d| *d > 0.0) {
                core.duration = d;
            }
            core.current_time = core.clamp_time(t);
            if let Some(fraction) = buffered {
                core.buffered_seconds = fraction * core.duration;
            }
            out.push(Notice::Time(core.current_time));
            core.refresh_segment(&mut out);
            if core.completion.observe(core.current_time, core.duration) {
                out.push(Notice::Complete);
            }
        }
        self.dispatch(out);
        true
    }
}

fn on_source_loaded(core: &mut SessionCore, out: &mut Vec<Notice>) {
    let Some(switch) = core.switch.take() else {
        log::debug!("source loaded with no switch pending");
        return;
    };
    let target = switch.target_id.clone();
    let plan = switch.finish();
    let Some(facade) = core.facade.as_mut() else {
        return;
    };
    if let Some(d) = facade.duration().filter(|d| *d > 0.0) {
        core.duration = d;
    }

    // restoring the captured position is not a user seek; Ended stays put
    let resume_at = core.clamp_time(plan.seek_to);
    if let Some(facade) = core.facade.as_mut() {
        facade.seek(resume_at);
    }
    core.current_time = resume_at;

    for command in plan.commands {
        match command {
            DeferredCommand::Play => {
                if let Some(facade) = core.facade.as_mut() {
                    facade.play();
                }
            }
            DeferredCommand::Pause => {
                if let Some(facade) = core.facade.as_mut() {
                    facade.pause();
                }
            }
            DeferredCommand::Seek(t) => seek(core, t, out),
            DeferredCommand::Restart => restart(core, out),
        }
    }
    log::info!("source {target} loaded; restored {:.1}s", core.current_time);
    core.loaded_resolution = Some(target);
    core.refresh_segment(out);
}

/// Background attach: wait for the bootstrap gate, build the widget, then
/// pump its events into the session until the task is aborted.
async fn attach(weak: Weak<Shared>, generation: u64) {
    let (gate, host, factory, config) = match weak.upgrade() {
        Some(shared) => (
            shared.env.gate.clone(),
            shared.env.host.clone(),
            shared.env.factory.clone(),
            shared.config.clone(),
        ),
        None => return,
    };

    gate.ensure_loaded(
        host,
        &config.bootstrap_script_url,
        config.bootstrap_max_attempts,
        config.bootstrap_retry(),
    );
    let status = gate.wait().await;

    let Some(shared) = weak.upgrade() else {
        return;
    };
    if status != BootstrapStatus::Ready {
        shared.fail(generation, "widget API unavailable".to_string());
        return;
    }
    let Some(request) = shared.widget_request(generation) else {
        return;
    };

    let (events, mut rx) = WidgetEvents::channel();
    match factory.create(&request, events) {
        Ok(widget) => shared.install(generation, WidgetFacade::new(widget)),
        Err(err) => {
            shared.fail(generation, err.to_string());
            return;
        }
    }
    drop(shared);

    while let Some(event) = rx.recv().await {
        let Some(shared) = weak.upgrade() else {
            break;
        };
        shared.handle_event(generation, event);
    }
}
