//! Deterministic in-memory widget, factory and script host
//!
//! These stand in for the hosted platform's embeddable player in tests and
//! demos. Time advances with the tokio clock while playing, so paused-clock
//! tests see realistic positions. Every command is recorded.

use super::bootstrap::ScriptHost;
use super::{Capabilities, Widget, WidgetEvent, WidgetEvents, WidgetFactory, WidgetRequest};
use crate::playback::PlaybackState;
use crate::{Error, Result};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::time::Instant;

/// A command observed by a scripted widget
#[derive(Debug, Clone, PartialEq)]
pub enum WidgetCall {
    Play,
    Pause,
    Seek(f64),
    Volume(u8),
    Mute,
    Unmute,
    Rate(f64),
    QualityHint(String),
    LoadSource(String),
    Destroy,
}

#[derive(Debug)]
struct ScriptedState {
    duration: f64,
    position: f64,
    playing_since: Option<Instant>,
    rate: f64,
    loaded_fraction: f64,
    source: Option<String>,
    auto_source_load: bool,
    destroyed: bool,
    calls: Vec<WidgetCall>,
}

impl ScriptedState {
    fn now_position(&self) -> f64 {
        let pos = match self.playing_since {
            Some(since) => self.position + since.elapsed().as_secs_f64() * self.rate,
            None => self.position,
        };
        if self.duration > 0.0 {
            pos.min(self.duration)
        } else {
            pos
        }
    }

    fn freeze(&mut self) {
        self.position = self.now_position();
        if self.playing_since.is_some() {
            self.playing_since = Some(Instant::now());
        }
    }
}

fn lock(state: &Mutex<ScriptedState>) -> MutexGuard<'_, ScriptedState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Scripted widget handed to the session.
pub struct ScriptedWidget {
    state: Arc<Mutex<ScriptedState>>,
    events: WidgetEvents,
    caps: Capabilities,
}

/// Test-side handle onto a scripted widget's state.
#[derive(Clone)]
pub struct ScriptedHandle {
    state: Arc<Mutex<ScriptedState>>,
    events: WidgetEvents,
}

impl ScriptedWidget {
    pub fn new(duration: f64, events: WidgetEvents) -> Self {
        Self {
            state: Arc::new(Mutex::new(ScriptedState {
                duration,
                position: 0.0,
                playing_since: None,
                rate: 1.0,
                loaded_fraction: 0.0,
                source: None,
                auto_source_load: true,
                destroyed: false,
                calls: Vec::new(),
            })),
            events,
            caps: Capabilities::all(),
        }
    }

    pub fn with_capabilities(mut self, caps: Capabilities) -> Self {
        self.caps = caps;
        self
    }

    /// Keep `load_source` pending until `ScriptedHandle::finish_source_load`.
    pub fn with_manual_source_load(self) -> Self {
        lock(&self.state).auto_source_load = false;
        self
    }

    pub fn handle(&self) -> ScriptedHandle {
        ScriptedHandle {
            state: self.state.clone(),
            events: self.events.clone(),
        }
    }

    fn record(&self, call: WidgetCall) -> MutexGuard<'_, ScriptedState> {
        let mut s = lock(&self.state);
        s.calls.push(call);
        s
    }
}

impl Widget for ScriptedWidget {
    fn capabilities(&self) -> Capabilities {
        self.caps
    }

    fn play_video(&mut self) {
        let mut s = self.record(WidgetCall::Play);
        if s.playing_since.is_none() {
            s.playing_since = Some(Instant::now());
        }
        drop(s);
        self.events.emit(WidgetEvent::StateChange(PlaybackState::Playing.code()));
    }

    fn pause_video(&mut self) {
        let mut s = self.record(WidgetCall::Pause);
        s.position = s.now_position();
        s.playing_since = None;
        drop(s);
        self.events.emit(WidgetEvent::StateChange(PlaybackState::Paused.code()));
    }

    fn seek_to(&mut self, seconds: f64, _allow_seek_ahead: bool) {
        let mut s = self.record(WidgetCall::Seek(seconds));
        s.position = if s.duration > 0.0 {
            seconds.clamp(0.0, s.duration)
        } else {
            seconds.max(0.0)
        };
        if s.playing_since.is_some() {
            s.playing_since = Some(Instant::now());
        }
    }

    fn set_volume(&mut self, volume: u8) {
        self.record(WidgetCall::Volume(volume));
    }

    fn mute(&mut self) {
        self.record(WidgetCall::Mute);
    }

    fn unmute(&mut self) {
        self.record(WidgetCall::Unmute);
    }

    fn set_playback_rate(&mut self, rate: f64) {
        let mut s = self.record(WidgetCall::Rate(rate));
        s.freeze();
        s.rate = rate;
    }

    fn set_playback_quality(&mut self, quality: &str) {
        self.record(WidgetCall::QualityHint(quality.to_string()));
    }

    fn load_source(&mut self, url: &str) {
        let mut s = self.record(WidgetCall::LoadSource(url.to_string()));
        s.source = Some(url.to_string());
        s.position = 0.0;
        s.playing_since = None;
        s.loaded_fraction = 0.0;
        let auto = s.auto_source_load;
        drop(s);
        self.events.emit(WidgetEvent::StateChange(PlaybackState::Buffering.code()));
        if auto {
            self.events.emit(WidgetEvent::SourceLoaded);
        }
    }

    fn current_time(&self) -> f64 {
        lock(&self.state).now_position()
    }

    fn duration(&self) -> f64 {
        lock(&self.state).duration
    }

    fn loaded_fraction(&self) -> f64 {
        lock(&self.state).loaded_fraction
    }

    fn destroy(&mut self) {
        let mut s = self.record(WidgetCall::Destroy);
        s.destroyed = true;
        s.playing_since = None;
    }
}

impl ScriptedHandle {
    pub fn calls(&self) -> Vec<WidgetCall> {
        lock(&self.state).calls.clone()
    }

    pub fn clear_calls(&self) {
        lock(&self.state).calls.clear();
    }

    pub fn is_destroyed(&self) -> bool {
        lock(&self.state).destroyed
    }

    pub fn is_playing(&self) -> bool {
        lock(&self.state).playing_since.is_some()
    }

    pub fn position(&self) -> f64 {
        lock(&self.state).now_position()
    }

    pub fn loaded_source(&self) -> Option<String> {
        lock(&self.state).source.clone()
    }

    /// Jump the media clock without recording a command.
    pub fn set_current_time(&self, seconds: f64) {
        let mut s = lock(&self.state);
        s.position = seconds;
        if s.playing_since.is_some() {
            s.playing_since = Some(Instant::now());
        }
    }

    pub fn set_duration(&self, seconds: f64) {
        lock(&self.state).duration = seconds;
    }

    pub fn set_loaded_fraction(&self, fraction: f64) {
        lock(&self.state).loaded_fraction = fraction;
    }

    /// Push an event as if the widget emitted it.
    pub fn emit(&self, event: WidgetEvent) {
        self.events.emit(event);
    }

    /// Emit a raw state code, e.g. a duplicate end signal.
    pub fn emit_state(&self, state: PlaybackState) {
        if state != PlaybackState::Playing {
            let mut s = lock(&self.state);
            s.position = s.now_position();
            s.playing_since = None;
        }
        self.events.emit(WidgetEvent::StateChange(state.code()));
    }

    pub fn finish_source_load(&self) {
        self.events.emit(WidgetEvent::SourceLoaded);
    }
}

/// Factory producing scripted widgets and keeping a handle to each.
pub struct ScriptedFactory {
    duration: f64,
    caps: Capabilities,
    auto_ready: bool,
    manual_source_load: bool,
    fail: bool,
    created: Mutex<Vec<(WidgetRequest, ScriptedHandle)>>,
}

impl ScriptedFactory {
    pub fn new(duration: f64) -> Self {
        Self {
            duration,
            caps: Capabilities::all(),
            auto_ready: true,
            manual_source_load: false,
            fail: false,
            created: Mutex::new(Vec::new()),
        }
    }

    pub fn with_capabilities(mut self, caps: Capabilities) -> Self {
        self.caps = caps;
        self
    }

    /// Do not emit `Ready` on creation; tests emit it through the handle.
    pub fn without_auto_ready(mut self) -> Self {
        self.auto_ready = false;
        self
    }

    pub fn with_manual_source_load(mut self) -> Self {
        self.manual_source_load = true;
        self
    }

    /// Every `create` call fails.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn created(&self) -> usize {
        self.created.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn last_handle(&self) -> Option<ScriptedHandle> {
        self.created
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .map(|(_, h)| h.clone())
    }

    pub fn last_request(&self) -> Option<WidgetRequest> {
        self.created
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .map(|(r, _)| r.clone())
    }
}

impl WidgetFactory for ScriptedFactory {
    fn create(&self, request: &WidgetRequest, events: WidgetEvents) -> Result<Box<dyn Widget>> {
        if self.fail {
            return Err(Error::WidgetCreation("scripted factory configured to fail".into()));
        }
        let mut widget = ScriptedWidget::new(self.duration, events.clone()).with_capabilities(self.caps);
        if self.manual_source_load {
            widget = widget.with_manual_source_load();
        }
        {
            let mut s = lock(&widget.state);
            s.source = request.initial_source_url.clone();
            s.position = request.start_seconds.max(0.0);
        }
        self.created
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((request.clone(), widget.handle()));
        if self.auto_ready {
            events.emit(WidgetEvent::Ready);
        }
        Ok(Box::new(widget))
    }
}

/// Script host whose readiness can be scripted.
pub struct ScriptedHost {
    ready: Mutex<bool>,
    ready_after_probes: Option<u32>,
    injections: Mutex<Vec<String>>,
    probes: Mutex<u32>,
}

impl ScriptedHost {
    fn with(ready: bool, ready_after_probes: Option<u32>) -> Self {
        Self {
            ready: Mutex::new(ready),
            ready_after_probes,
            injections: Mutex::new(Vec::new()),
            probes: Mutex::new(0),
        }
    }

    /// The widget API is available as soon as it is probed.
    pub fn ready() -> Self {
        Self::with(true, None)
    }

    /// The widget API never appears.
    pub fn never_ready() -> Self {
        Self::with(false, None)
    }

    /// The widget API appears on the `n`th probe.
    pub fn ready_after(n: u32) -> Self {
        Self::with(false, Some(n))
    }

    pub fn set_ready(&self, ready: bool) {
        *self.ready.lock().unwrap_or_else(PoisonError::into_inner) = ready;
    }

    pub fn injections(&self) -> Vec<String> {
        self.injections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn probes(&self) -> u32 {
        *self.probes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ScriptHost for ScriptedHost {
    fn inject_script(&self, src: &str) {
        self.injections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(src.to_string());
    }

    fn api_ready(&self) -> bool {
        let mut probes = self.probes.lock().unwrap_or_else(PoisonError::into_inner);
        *probes += 1;
        if let Some(n) = self.ready_after_probes {
            if *probes >= n {
                return true;
            }
        }
        *self.ready.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
