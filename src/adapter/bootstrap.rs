//! One-time bootstrap of the widget API script
//!
//! The hosted platform's player API arrives by injecting a script into the
//! page. `BootstrapGate` injects it at most once for the lifetime of the gate
//! (use `BootstrapGate::global()` for process-wide sharing), probes for the API
//! with a bounded, fixed-interval retry, and notifies every waiter when the
//! load settles. A load that never becomes ready settles as `Unavailable`
//! rather than failing the caller; the next `ensure_loaded` probes again.

use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;
use tokio::sync::watch;

/// Side-effecting access to the page hosting the widget.
pub trait ScriptHost: Send + Sync {
    /// Insert the bootstrap script into the page
    fn inject_script(&self, src: &str);

    /// Whether the widget API has become usable
    fn api_ready(&self) -> bool;
}

/// Load status of the widget API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapStatus {
    Idle,
    Loading,
    Ready,
    Unavailable,
}

impl BootstrapStatus {
    pub fn is_settled(self) -> bool {
        matches!(self, BootstrapStatus::Ready | BootstrapStatus::Unavailable)
    }
}

type ReadyCallback = Box<dyn FnOnce(BootstrapStatus) + Send>;

struct GateInner {
    injected: bool,
    waiters: Vec<ReadyCallback>,
}

pub struct BootstrapGate {
    inner: Mutex<GateInner>,
    status: watch::Sender<BootstrapStatus>,
}

static GLOBAL_GATE: OnceLock<Arc<BootstrapGate>> = OnceLock::new();

impl BootstrapGate {
    pub fn new() -> Self {
        let (status, _) = watch::channel(BootstrapStatus::Idle);
        Self {
            inner: Mutex::new(GateInner {
                injected: false,
                waiters: Vec::new(),
            }),
            status,
        }
    }

    /// The gate shared by every session in this process.
    pub fn global() -> Arc<BootstrapGate> {
        GLOBAL_GATE.get_or_init(|| Arc::new(BootstrapGate::new())).clone()
    }

    fn lock(&self) -> MutexGuard<'_, GateInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn status(&self) -> BootstrapStatus {
        *self.status.borrow()
    }

    /// Inject the script (first call only) and start probing for the API.
    ///
    /// A call made after the load settled `Unavailable` probes again with a
    /// fresh bounded retry but never injects a second time. Any other later
    /// call is a no-op. Must be called from within a tokio runtime.
    pub fn ensure_loaded(
        self: &Arc<Self>,
        host: Arc<dyn ScriptHost>,
        script_url: &str,
        max_attempts: u32,
        retry: Duration,
    ) {
        let inject = {
            let mut inner = self.lock();
            if !inner.injected {
                inner.injected = true;
                true
            } else if self.status() == BootstrapStatus::Unavailable {
                self.status.send_replace(BootstrapStatus::Loading);
                false
            } else {
                return;
            }
        };

        if host.api_ready() {
            log::debug!("widget API already present; skipping injection");
            self.settle(BootstrapStatus::Ready);
            return;
        }

        if inject {
            log::info!("injecting widget bootstrap script {script_url}");
            host.inject_script(script_url);
            self.status.send_replace(BootstrapStatus::Loading);
        } else {
            log::info!("widget API still missing; probing again");
        }
        self.probe(host, max_attempts, retry);
    }

    fn probe(self: &Arc<Self>, host: Arc<dyn ScriptHost>, max_attempts: u32, retry: Duration) {
        let gate = Arc::clone(self);
        tokio::spawn(async move {
            for attempt in 1..=max_attempts {
                tokio::time::sleep(retry).await;
                if gate.status().is_settled() {
                    return;
                }
                if host.api_ready() {
                    gate.settle(BootstrapStatus::Ready);
                    return;
                }
                log::debug!("waiting for widget API (attempt {attempt}/{max_attempts})");
            }
            log::error!("widget API failed to load after {max_attempts} attempts");
            gate.settle(BootstrapStatus::Unavailable);
        });
    }

    /// Push-style readiness: the page announced the API is loaded.
    pub fn signal_ready(&self) {
        self.settle(BootstrapStatus::Ready);
    }

    fn settle(&self, status: BootstrapStatus) {
        let waiters = {
            let mut inner = self.lock();
            if self.status().is_settled() {
                return;
            }
            self.status.send_replace(status);
            std::mem::take(&mut inner.waiters)
        };
        log::info!("widget bootstrap settled: {status:?}");
        for waiter in waiters {
            waiter(status);
        }
    }

    /// Run `callback` once the load settles (immediately if it already has).
    pub fn when_ready<F>(&self, callback: F)
    where
        F: FnOnce(BootstrapStatus) + Send + 'static,
    {
        let status = {
            let mut inner = self.lock();
            let status = self.status();
            if !status.is_settled() {
                inner.waiters.push(Box::new(callback));
                return;
            }
            status
        };
        callback(status);
    }

    /// Wait until the load settles.
    pub async fn wait(&self) -> BootstrapStatus {
        let mut rx = self.status.subscribe();
        let settled = rx.wait_for(|s| s.is_settled()).await.map(|s| *s);
        settled.unwrap_or(BootstrapStatus::Unavailable)
    }
}

impl Default for BootstrapGate {
    fn default() -> Self {
        Self::new()
    }
}
