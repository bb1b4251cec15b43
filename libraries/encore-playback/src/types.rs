//! Core types for the playback session

use crate::fade::FadeCurve;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// What kind of item a track is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    /// Regular song
    #[default]
    Song,
    /// Audiobook (or one chapter of one)
    Audiobook,
}

/// Immutable descriptor of one playable item
///
/// Tracks are values: replacing a track in the queue replaces the whole
/// value, nothing mutates a track in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    /// Unique identifier (server id)
    pub id: String,

    /// Display title
    pub title: String,

    /// Artist label (author for audiobooks)
    pub artist: String,

    /// Thumbnail URL or path
    pub thumbnail: Option<String>,

    /// Audio resource: URL or local path
    pub resource: String,

    /// Nominal duration, if known before loading
    pub duration: Option<Duration>,

    /// Position to start from once loaded (audiobook chapters)
    pub start_offset: Option<Duration>,

    /// Song or audiobook
    #[serde(default)]
    pub kind: TrackKind,
}

impl Track {
    /// Create a song track with no duration or offset
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        artist: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artist: artist.into(),
            thumbnail: None,
            resource: resource.into(),
            duration: None,
            start_offset: None,
            kind: TrackKind::Song,
        }
    }

    /// Set thumbnail
    #[must_use]
    pub fn with_thumbnail(mut self, thumbnail: impl Into<String>) -> Self {
        self.thumbnail = Some(thumbnail.into());
        self
    }

    /// Set nominal duration
    #[must_use]
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Set start offset
    #[must_use]
    pub fn with_start_offset(mut self, offset: Duration) -> Self {
        self.start_offset = Some(offset);
        self
    }

    /// Set kind
    #[must_use]
    pub fn with_kind(mut self, kind: TrackKind) -> Self {
        self.kind = kind;
        self
    }
}

/// Playback session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    /// No sound loaded
    Idle,
    /// A sound for the current track is being loaded
    Loading,
    /// Loaded, about to start or pause
    Ready,
    /// Audio is playing
    Playing,
    /// Loaded and paused
    Paused,
    /// Load failed; waits for the user to pick a track again
    Failed,
    /// Session torn down (terminal)
    Released,
}

impl PlaybackState {
    /// States in which a seek can be forwarded to the sound
    pub fn is_seekable(self) -> bool {
        matches!(self, Self::Ready | Self::Paused | Self::Playing)
    }

    /// Lowercase name, as used in events and the JS bindings
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Playing => "playing",
            Self::Paused => "paused",
            Self::Failed => "failed",
            Self::Released => "released",
        }
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Playback configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Initial volume (0.0 - 1.0)
    pub volume: f32,

    /// Fade-out applied to an audible sound before it is released (ms, 0 = none)
    pub fade_out_ms: u64,

    /// Extra time granted to the backend to report fade completion (ms)
    pub fade_grace_ms: u64,

    /// Curve used for the release fade
    pub fade_curve: FadeCurve,

    /// How far below a seek target a sampled position may lag (ms)
    pub seek_tolerance_ms: u64,

    /// Start playing when the user selects a queue or a queue entry
    pub autoplay_on_select: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            volume: 0.5,
            fade_out_ms: 100,
            fade_grace_ms: 250,
            fade_curve: FadeCurve::Linear,
            seek_tolerance_ms: 50,
            autoplay_on_select: true,
        }
    }
}

impl PlaybackConfig {
    /// Release fade duration
    pub fn fade_out(&self) -> Duration {
        Duration::from_millis(self.fade_out_ms)
    }

    /// Fade duration plus grace: when a fading sound is released regardless
    pub fn fade_deadline(&self) -> Duration {
        Duration::from_millis(self.fade_out_ms.saturating_add(self.fade_grace_ms))
    }

    /// Seek regression tolerance
    pub fn seek_tolerance(&self) -> Duration {
        Duration::from_millis(self.seek_tolerance_ms)
    }
}

/// Format a position as `m:ss`
pub fn format_time(position: Duration) -> String {
    let secs = position.as_secs();
    format!("{}:{:02}", secs / 60, secs % 60)
}
