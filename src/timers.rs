use tokio::task::JoinHandle;

/// Owns at most one background task; replacing or dropping the slot aborts it.
#[derive(Debug, Default)]
pub(crate) struct TaskSlot {
    handle: Option<JoinHandle<()>>,
}

impl TaskSlot {
    pub(crate) fn new() -> Self {
        Self { handle: None }
    }

    pub(crate) fn replace(&mut self, handle: JoinHandle<()>) {
        if let Some(old) = self.handle.replace(handle) {
            old.abort();
        }
    }

    pub(crate) fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for TaskSlot {
    fn drop(&mut self) {
        self.cancel();
    }
}
