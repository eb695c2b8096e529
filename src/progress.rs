//! Zero-safe progress math and timestamp formatting

use serde::Serialize;

/// `part` as a percentage of `whole`, clamped to 0..=100.
///
/// An unknown (zero, negative or non-finite) `whole` yields 0 rather than
/// `NaN` or infinity.
///
/// ```
/// assert_eq!(lessonsync::percent(5.0, 0.0), 0.0);
/// assert_eq!(lessonsync::percent(30.0, 120.0), 25.0);
/// ```
pub fn percent(part: f64, whole: f64) -> f64 {
    if !whole.is_finite() || whole <= 0.0 || !part.is_finite() {
        return 0.0;
    }
    (part / whole * 100.0).clamp(0.0, 100.0)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Progress {
    pub played_percent: f64,
    pub buffered_percent: f64,
}

impl Progress {
    pub fn new(current_time: f64, buffered_seconds: f64, duration: f64) -> Self {
        Self {
            played_percent: percent(current_time, duration),
            buffered_percent: percent(buffered_seconds, duration),
        }
    }
}

/// `M:SS`, or `H:MM:SS` from one hour on.
pub fn format_timestamp(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m}:{s:02}")
    }
}
