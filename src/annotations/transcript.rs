//! Transcript segments and active-segment resolution
//!
//! Segments are sorted by start time and pairwise non-overlapping, so the
//! active segment for a time `t` is unique. Two segments may share a
//! boundary (`end[i] == start[i + 1]`); at that instant the earlier one wins.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeSegment {
    pub id: String,
    #[serde(alias = "startTime", alias = "start")]
    pub start_time: f64,
    #[serde(alias = "endTime", alias = "end")]
    pub end_time: f64,
    pub text: String,
    #[serde(default)]
    pub speaker: Option<String>,
}

impl RangeSegment {
    pub fn new(id: impl Into<String>, start_time: f64, end_time: f64, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            start_time,
            end_time,
            text: text.into(),
            speaker: None,
        }
    }

    pub fn with_speaker(mut self, speaker: impl Into<String>) -> Self {
        self.speaker = Some(speaker.into());
        self
    }

    pub fn contains(&self, t: f64) -> bool {
        self.start_time <= t && t <= self.end_time
    }
}

/// Validated, ordered transcript for one lesson.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranscriptIndex {
    segments: Vec<RangeSegment>,
}

impl TranscriptIndex {
    pub fn new(segments: Vec<RangeSegment>) -> Result<Self> {
        for (i, s) in segments.iter().enumerate() {
            if !s.start_time.is_finite() || !s.end_time.is_finite() || s.start_time < 0.0 {
                return Err(Error::InvalidTranscript(format!(
                    "segment {} has an invalid time range",
                    s.id
                )));
            }
            if s.start_time > s.end_time {
                return Err(Error::InvalidTranscript(format!(
                    "segment {} ends ({}) before it starts ({})",
                    s.id, s.end_time, s.start_time
                )));
            }
            if let Some(next) = segments.get(i + 1) {
                if s.end_time > next.start_time {
                    return Err(Error::InvalidTranscript(format!(
                        "segment {} overlaps or is out of order with {}",
                        s.id, next.id
                    )));
                }
            }
        }
        Ok(Self { segments })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let segments: Vec<RangeSegment> = serde_json::from_str(json)?;
        Self::new(segments)
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn segments(&self) -> &[RangeSegment] {
        &self.segments
    }

    pub fn get(&self, id: &str) -> Option<&RangeSegment> {
        self.segments.iter().find(|s| s.id == id)
    }

    /// Binary search for the segment containing `t`.
    pub fn active_at(&self, t: f64) -> Option<&RangeSegment> {
        if !t.is_finite() {
            return None;
        }
        let idx = self.segments.partition_point(|s| s.end_time < t);
        self.segments.get(idx).filter(|s| s.start_time <= t)
    }

    /// Linear scan; same answer as `active_at`.
    pub fn active_at_linear(&self, t: f64) -> Option<&RangeSegment> {
        self.segments.iter().find(|s| s.contains(t))
    }

    /// Case-insensitive substring match over segment text, in time order.
    pub fn search(&self, query: &str) -> Vec<&RangeSegment> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Vec::new();
        }
        self.segments
            .iter()
            .filter(|s| s.text.to_lowercase().contains(&query))
            .collect()
    }
}

/// Remembers the last active segment and reports identity changes only.
#[derive(Debug, Clone, Default)]
pub struct ActiveSegmentTracker {
    current: Option<String>,
}

impl ActiveSegmentTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_id(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Returns `true` when `active` differs from the last observed segment.
    pub fn update(&mut self, active: Option<&RangeSegment>) -> bool {
        let id = active.map(|s| s.id.as_str());
        if self.current.as_deref() == id {
            return false;
        }
        self.current = id.map(str::to_string);
        true
    }

    pub fn reset(&mut self) {
        self.current = None;
    }
}
