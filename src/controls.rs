//! Debounced auto-hide of on-screen controls

use crate::timers::TaskSlot;
use std::time::Duration;

/// Visibility of the player controls plus the inactivity timer behind it.
///
/// Every pointer movement fully restarts the window (debounce, not
/// throttle). When the timer fires the owner calls [`expire`], which hides
/// the controls only if playback is running at that moment.
///
/// [`expire`]: ControlVisibility::expire
#[derive(Debug)]
pub struct ControlVisibility {
    visible: bool,
    delay: Duration,
    timer: TaskSlot,
}

impl ControlVisibility {
    pub fn new(delay: Duration) -> Self {
        Self {
            visible: true,
            delay,
            timer: TaskSlot::new(),
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_armed(&self) -> bool {
        self.timer.is_active()
    }

    /// Start (or restart) the inactivity window without touching visibility.
    pub fn arm<F>(&mut self, on_expire: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let delay = self.delay;
        self.timer.replace(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            on_expire();
        }));
    }

    /// Pointer activity: show the controls and restart the window.
    pub fn reveal<F>(&mut self, on_expire: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.visible = true;
        self.arm(on_expire);
    }

    /// Show the controls and stop the timer, e.g. on pause.
    pub fn force_visible(&mut self) {
        self.visible = true;
        self.timer.cancel();
    }

    /// The window elapsed. Returns `true` if the controls were hidden.
    pub fn expire(&mut self, playing: bool) -> bool {
        if playing && self.visible {
            self.visible = false;
            log::debug!("hiding controls after {:?} of inactivity", self.delay);
            return true;
        }
        false
    }

    pub fn cancel(&mut self) {
        self.timer.cancel();
    }
}
