//! Timestamp-addressed annotations: user notes and transcript segments

pub mod notes;
pub mod transcript;

use notes::PointNote;
use serde::Serialize;
use transcript::RangeSegment;

/// Either a markable point or a transcript-like time range.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Annotation {
    Point(PointNote),
    Range(RangeSegment),
}

impl Annotation {
    pub fn id(&self) -> &str {
        match self {
            Annotation::Point(n) => &n.id,
            Annotation::Range(s) => &s.id,
        }
    }

    /// Where a click on this annotation seeks to, if anywhere.
    pub fn start(&self) -> Option<f64> {
        match self {
            Annotation::Point(n) => n.timestamp,
            Annotation::Range(s) => Some(s.start_time),
        }
    }
}

impl From<PointNote> for Annotation {
    fn from(note: PointNote) -> Self {
        Annotation::Point(note)
    }
}

impl From<RangeSegment> for Annotation {
    fn from(segment: RangeSegment) -> Self {
        Annotation::Range(segment)
    }
}
