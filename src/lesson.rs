//! Lesson descriptors and video source resolution

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use url::Url;

static HOSTED_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("hosted id regex should compile"));

static SHARED_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-\w]{25,}").expect("shared file id regex should compile"));

const HOSTED_EMBED_PARAMS: &str =
    "controls=0&rel=0&modestbranding=1&playsinline=1&enablejsapi=1&iv_load_policy=3";

/// Where a lesson's video lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VideoSource {
    /// Hosted video platform with a scriptable embeddable player
    Hosted { video_id: String },
    /// File-sharing provider; embeddable but not scriptable
    Shared { file_id: String },
}

impl VideoSource {
    /// Extract a stable identifier from any accepted URL format.
    ///
    /// Returns `None` for malformed or unsupported links; the caller shows a
    /// placeholder instead of a player.
    ///
    /// ```
    /// use lessonsync::VideoSource;
    ///
    /// let src = VideoSource::from_url("https://youtu.be/dQw4w9WgXcQ").unwrap();
    /// assert_eq!(src.id(), "dQw4w9WgXcQ");
    /// assert!(VideoSource::from_url("https://example.com/video.mp4").is_none());
    /// ```
    pub fn from_url(raw: &str) -> Option<Self> {
        let url = Url::parse(raw.trim()).ok()?;
        let host = url.host_str()?.trim_start_matches("www.").trim_start_matches("m.");
        match host {
            "youtu.be" => {
                let id = url.path_segments()?.next()?;
                hosted(id)
            }
            "youtube.com" | "youtube-nocookie.com" => {
                if let Some((_, v)) = url.query_pairs().find(|(k, _)| k == "v") {
                    return hosted(&v);
                }
                let mut segments = url.path_segments()?;
                match segments.next()? {
                    "embed" | "v" | "shorts" | "live" => hosted(segments.next()?),
                    _ => None,
                }
            }
            "drive.google.com" | "docs.google.com" => {
                let from_query = url
                    .query_pairs()
                    .find(|(k, _)| k == "id")
                    .map(|(_, v)| v.into_owned());
                let candidate = match from_query {
                    Some(id) => id,
                    None => {
                        let segments: Vec<&str> = url.path_segments()?.collect();
                        let pos = segments.iter().position(|s| *s == "d")?;
                        segments.get(pos + 1)?.to_string()
                    }
                };
                shared(&candidate)
            }
            _ => None,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            VideoSource::Hosted { video_id } => video_id,
            VideoSource::Shared { file_id } => file_id,
        }
    }

    /// Whether the source is played through the scriptable widget API.
    pub fn supports_player_api(&self) -> bool {
        matches!(self, VideoSource::Hosted { .. })
    }

    pub fn embed_url(&self) -> String {
        match self {
            VideoSource::Hosted { video_id } => {
                format!("https://www.youtube.com/embed/{video_id}?{HOSTED_EMBED_PARAMS}")
            }
            VideoSource::Shared { file_id } => {
                format!("https://drive.google.com/file/d/{file_id}/preview")
            }
        }
    }

    pub fn thumbnail_url(&self) -> Option<String> {
        match self {
            VideoSource::Hosted { video_id } => {
                Some(format!("https://img.youtube.com/vi/{video_id}/hqdefault.jpg"))
            }
            VideoSource::Shared { .. } => None,
        }
    }
}

fn hosted(id: &str) -> Option<VideoSource> {
    HOSTED_ID.is_match(id).then(|| VideoSource::Hosted {
        video_id: id.to_string(),
    })
}

fn shared(candidate: &str) -> Option<VideoSource> {
    let m = SHARED_ID.find(candidate)?;
    (m.start() == 0 && m.end() == candidate.len()).then(|| VideoSource::Shared {
        file_id: candidate.to_string(),
    })
}

/// A lesson as handed over by the course catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonDescriptor {
    pub id: String,
    pub title: String,
    pub video_url: String,
    /// Catalog duration, informational only
    #[serde(default)]
    pub duration_hint: Option<f64>,
    /// Position to seek to once the widget is ready
    #[serde(default)]
    pub resume_from: Option<f64>,
}

impl LessonDescriptor {
    pub fn new(id: impl Into<String>, title: impl Into<String>, video_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            video_url: video_url.into(),
            duration_hint: None,
            resume_from: None,
        }
    }

    pub fn with_duration_hint(mut self, seconds: f64) -> Self {
        self.duration_hint = Some(seconds);
        self
    }

    pub fn with_resume_from(mut self, seconds: f64) -> Self {
        self.resume_from = Some(seconds);
        self
    }

    pub fn source(&self) -> Option<VideoSource> {
        VideoSource::from_url(&self.video_url)
    }
}
