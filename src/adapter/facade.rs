//! Capability-checked facade over a raw widget handle
//!
//! Every command is a no-op until the widget reports ready and a no-op
//! forever if the widget lacks the method. Commands are dropped, never
//! queued; the one exception (quality switching) is handled by the session.

use super::{Capabilities, Widget};
use crate::quality::{ResolutionOption, AUTO_QUALITY_HINT};

/// How a quality change was applied by the widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityChange {
    /// The source was swapped; position must be restored once it loads
    Reloading,
    /// A quality hint was sent; no reload happens
    Hinted,
    /// Widget not ready or incapable; nothing happened
    Dropped,
}

pub struct WidgetFacade {
    widget: Box<dyn Widget>,
    caps: Capabilities,
    ready: bool,
    destroyed: bool,
}

impl WidgetFacade {
    /// Wrap a raw handle, probing its capabilities once.
    pub fn new(widget: Box<dyn Widget>) -> Self {
        let caps = widget.capabilities();
        Self {
            widget,
            caps,
            ready: false,
            destroyed: false,
        }
    }

    pub fn mark_ready(&mut self) {
        if !self.destroyed {
            self.ready = true;
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready && !self.destroyed
    }

    pub fn capabilities(&self) -> Capabilities {
        self.caps
    }

    fn dispatch(&mut self, supported: bool, name: &str, f: impl FnOnce(&mut dyn Widget)) -> bool {
        if !self.is_ready() {
            log::debug!("dropping {name}: widget not ready");
            return false;
        }
        if !supported {
            log::debug!("dropping {name}: widget does not support it");
            return false;
        }
        f(self.widget.as_mut());
        true
    }

    fn read(&self, supported: bool, f: impl FnOnce(&dyn Widget) -> f64) -> Option<f64> {
        if !self.is_ready() || !supported {
            return None;
        }
        let v = f(self.widget.as_ref());
        v.is_finite().then_some(v.max(0.0))
    }

    pub fn play(&mut self) -> bool {
        self.dispatch(self.caps.play, "play", |w| w.play_video())
    }

    pub fn pause(&mut self) -> bool {
        self.dispatch(self.caps.pause, "pause", |w| w.pause_video())
    }

    pub fn seek(&mut self, seconds: f64) -> bool {
        self.dispatch(self.caps.seek, "seek", |w| w.seek_to(seconds, true))
    }

    pub fn set_volume(&mut self, volume: u8) -> bool {
        let volume = volume.min(100);
        self.dispatch(self.caps.volume, "set_volume", |w| w.set_volume(volume))
    }

    pub fn mute(&mut self) -> bool {
        self.dispatch(self.caps.mute, "mute", |w| w.mute())
    }

    pub fn unmute(&mut self) -> bool {
        self.dispatch(self.caps.mute, "unmute", |w| w.unmute())
    }

    pub fn set_playback_rate(&mut self, rate: f64) -> bool {
        self.dispatch(self.caps.playback_rate, "set_playback_rate", |w| {
            w.set_playback_rate(rate)
        })
    }

    /// Prefer a full source swap; fall back to a quality hint.
    pub fn set_quality(&mut self, option: &ResolutionOption) -> QualityChange {
        if self.caps.load_source {
            if self.dispatch(true, "load_source", |w| w.load_source(&option.source_url)) {
                return QualityChange::Reloading;
            }
            return QualityChange::Dropped;
        }
        let hint = option.quality_hint();
        if self.dispatch(self.caps.quality_hint, "set_playback_quality", |w| {
            w.set_playback_quality(hint)
        }) {
            QualityChange::Hinted
        } else {
            QualityChange::Dropped
        }
    }

    /// Let the widget pick the quality again. Only hint-capable widgets
    /// understand this; a source-swapping widget keeps its current source.
    pub fn set_auto_quality(&mut self) -> bool {
        self.dispatch(self.caps.quality_hint, "set_playback_quality", |w| {
            w.set_playback_quality(AUTO_QUALITY_HINT)
        })
    }

    pub fn current_time(&self) -> Option<f64> {
        self.read(self.caps.current_time, |w| w.current_time())
    }

    pub fn duration(&self) -> Option<f64> {
        self.read(self.caps.duration, |w| w.duration())
    }

    pub fn buffered_fraction(&self) -> Option<f64> {
        self.read(self.caps.loaded_fraction, |w| w.loaded_fraction())
            .map(|f| f.min(1.0))
    }

    /// Release the widget. Every later call is a no-op.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        self.ready = false;
        if self.caps.destroy {
            self.widget.destroy();
        }
    }
}

impl Drop for WidgetFacade {
    fn drop(&mut self) {
        self.destroy();
    }
}
