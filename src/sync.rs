//! Fixed-interval time sync loop
//!
//! The widget never pushes continuous time updates, so the session polls it.
//! The loop only runs while playing; the owner starts it on entering
//! `Playing` and stops it on leaving. Stopping aborts the task, so no tick
//! runs after `stop` returns.

use crate::timers::TaskSlot;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};

#[derive(Debug)]
pub struct TimeSync {
    period: Duration,
    task: TaskSlot,
}

impl TimeSync {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            task: TaskSlot::new(),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_running(&self) -> bool {
        self.task.is_active()
    }

    /// Run `tick` every period, first one period from now, until it returns
    /// `false` or the loop is stopped. A running loop is left untouched.
    pub fn start<F>(&mut self, mut tick: F)
    where
        F: FnMut() -> bool + Send + 'static,
    {
        if self.is_running() {
            return;
        }
        let period = self.period;
        self.task.replace(tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if !tick() {
                    log::debug!("time sync loop finished");
                    break;
                }
            }
        }));
    }

    pub fn stop(&mut self) {
        self.task.cancel();
    }
}
