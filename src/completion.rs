//! Idempotent "lesson finished" latch

/// Fires at most once per lesson view.
///
/// Either a clean end signal or the clock reaching `duration - epsilon`
/// completes the lesson; the latch only resets when the lesson id changes.
#[derive(Debug, Clone)]
pub struct CompletionDetector {
    lesson_id: String,
    epsilon: f64,
    completed: bool,
}

impl CompletionDetector {
    pub fn new(lesson_id: impl Into<String>, epsilon: f64) -> Self {
        Self {
            lesson_id: lesson_id.into(),
            epsilon: epsilon.max(0.0),
            completed: false,
        }
    }

    pub fn lesson_id(&self) -> &str {
        &self.lesson_id
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Returns `true` only the first time the lesson ends.
    pub fn on_ended(&mut self) -> bool {
        self.latch("end signal")
    }

    /// Epsilon guard for widgets that never report a clean end.
    ///
    /// An unknown (zero) duration never completes.
    pub fn observe(&mut self, current_time: f64, duration: f64) -> bool {
        if self.completed || !duration.is_finite() || duration <= 0.0 || !current_time.is_finite() {
            return false;
        }
        if current_time >= duration - self.epsilon {
            return self.latch("epsilon guard");
        }
        false
    }

    fn latch(&mut self, reason: &str) -> bool {
        if self.completed {
            log::debug!("lesson {} already completed; ignoring {reason}", self.lesson_id);
            return false;
        }
        self.completed = true;
        log::info!("lesson {} completed ({reason})", self.lesson_id);
        true
    }

    /// Point the detector at another lesson. Rebinding to the same id keeps
    /// the latch.
    pub fn rebind(&mut self, lesson_id: &str) {
        if self.lesson_id != lesson_id {
            self.lesson_id = lesson_id.to_string();
            self.completed = false;
        }
    }
}
