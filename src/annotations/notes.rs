//! User notes, optionally pinned to a moment in the lesson
//!
//! A `NoteBook` outlives player sessions: it is handed to the data layer for
//! persistence and only borrowed by the session for seek-on-click.

use crate::progress::percent;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Colors offered by the note editor
pub const NOTE_COLORS: [&str; 6] = ["#4F46E5", "#DC2626", "#2563EB", "#16A34A", "#9333EA", "#F59E0B"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointNote {
    pub id: String,
    #[serde(default)]
    pub course_id: Option<String>,
    /// Lesson the note was taken in; `None` for a course-wide note
    #[serde(default)]
    pub lesson_id: Option<String>,
    /// Seconds into the lesson; `None` for a general note
    pub timestamp: Option<f64>,
    pub content: String,
    pub tags: Vec<String>,
    pub color: String,
    pub favorite: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Editable fields of a note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteDraft {
    #[serde(default)]
    pub course_id: Option<String>,
    #[serde(default)]
    pub lesson_id: Option<String>,
    pub timestamp: Option<f64>,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_color")]
    pub color: String,
}

fn default_color() -> String {
    NOTE_COLORS[0].to_string()
}

impl NoteDraft {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            course_id: None,
            lesson_id: None,
            timestamp: None,
            content: content.into(),
            tags: Vec::new(),
            color: default_color(),
        }
    }

    pub fn at(mut self, seconds: f64) -> Self {
        self.timestamp = Some(seconds);
        self
    }

    /// Attach the note to a lesson of a course.
    pub fn in_lesson(mut self, course_id: impl Into<String>, lesson_id: impl Into<String>) -> Self {
        self.course_id = Some(course_id.into());
        self.lesson_id = Some(lesson_id.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
        self
    }

    pub fn color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    fn checked_timestamp(&self) -> Option<f64> {
        self.timestamp.filter(|t| t.is_finite() && *t >= 0.0)
    }
}

/// Projection over the note collection. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct NoteFilter {
    /// Only notes taken in this lesson
    pub lesson: Option<String>,
    pub tag: Option<String>,
    pub query: Option<String>,
    pub favorites_only: bool,
}

impl NoteFilter {
    fn matches(&self, note: &PointNote) -> bool {
        if self.favorites_only && !note.favorite {
            return false;
        }
        if let Some(lesson) = &self.lesson {
            if note.lesson_id.as_ref() != Some(lesson) {
                return false;
            }
        }
        if let Some(tag) = &self.tag {
            if !note.tags.iter().any(|t| t == tag) {
                return false;
            }
        }
        match self.query.as_deref().map(str::trim) {
            Some(q) if !q.is_empty() => note.content.to_lowercase().contains(&q.to_lowercase()),
            _ => true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoteBook {
    notes: Vec<PointNote>,
}

impl NoteBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore a collection loaded by the data layer.
    pub fn from_notes(notes: Vec<PointNote>) -> Self {
        Self { notes }
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Newest first.
    pub fn notes(&self) -> &[PointNote] {
        &self.notes
    }

    pub fn get(&self, id: &str) -> Option<&PointNote> {
        self.notes.iter().find(|n| n.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut PointNote> {
        self.notes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| Error::UnknownNote(id.to_string()))
    }

    pub fn add(&mut self, draft: NoteDraft) -> Result<&PointNote> {
        if draft.content.trim().is_empty() {
            return Err(Error::EmptyNote);
        }
        let now = Utc::now();
        let timestamp = draft.checked_timestamp();
        let note = PointNote {
            id: Uuid::new_v4().to_string(),
            course_id: draft.course_id,
            lesson_id: draft.lesson_id,
            timestamp,
            content: draft.content,
            tags: draft.tags,
            color: draft.color,
            favorite: false,
            created_at: now,
            updated_at: now,
        };
        self.notes.insert(0, note);
        Ok(&self.notes[0])
    }

    /// Replace content, tags and color. The timestamp and the lesson stay
    /// where the note was pinned.
    pub fn update(&mut self, id: &str, draft: NoteDraft) -> Result<&PointNote> {
        if draft.content.trim().is_empty() {
            return Err(Error::EmptyNote);
        }
        let note = self.get_mut(id)?;
        note.content = draft.content;
        note.tags = draft.tags;
        note.color = draft.color;
        note.updated_at = Utc::now();
        Ok(note)
    }

    pub fn delete(&mut self, id: &str) -> Result<PointNote> {
        let pos = self
            .notes
            .iter()
            .position(|n| n.id == id)
            .ok_or_else(|| Error::UnknownNote(id.to_string()))?;
        Ok(self.notes.remove(pos))
    }

    /// Flip the favorite flag and return its new value.
    pub fn toggle_favorite(&mut self, id: &str) -> Result<bool> {
        let note = self.get_mut(id)?;
        note.favorite = !note.favorite;
        Ok(note.favorite)
    }

    pub fn filter(&self, filter: &NoteFilter) -> Vec<&PointNote> {
        self.notes.iter().filter(|n| filter.matches(n)).collect()
    }

    /// Every tag in use, in first-seen order.
    pub fn all_tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = Vec::new();
        for tag in self.notes.iter().flat_map(|n| n.tags.iter()) {
            if !tags.contains(&tag.as_str()) {
                tags.push(tag);
            }
        }
        tags
    }

    /// Timestamped notes in playback order, for markers on the seek bar.
    pub fn timeline(&self) -> Vec<&PointNote> {
        let mut pinned: Vec<&PointNote> = self.notes.iter().filter(|n| n.timestamp.is_some()).collect();
        pinned.sort_by(|a, b| a.timestamp.unwrap_or(0.0).total_cmp(&b.timestamp.unwrap_or(0.0)));
        pinned
    }

    /// Marker position along the seek bar; `None` for an untimed note.
    pub fn marker_percent(note: &PointNote, duration: f64) -> Option<f64> {
        note.timestamp.map(|t| percent(t, duration))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.notes)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self::from_notes(serde_json::from_str(json)?))
    }
}
