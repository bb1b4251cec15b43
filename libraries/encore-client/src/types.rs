//! Types for Encore server API requests and responses.

use encore_playback::{Track, TrackKind};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for connecting to an Encore server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL of the server (e.g., "https://music.example.com")
    pub url: String,
    /// Bearer token (if authenticated)
    pub token: Option<String>,
}

impl ServerConfig {
    /// Create a new server config with just the URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: None,
        }
    }

    /// Create a config with an existing token.
    pub fn with_token(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: Some(token.into()),
        }
    }
}

// =============================================================================
// Authentication Types
// =============================================================================

/// Request body for login endpoint.
#[derive(Debug, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Response from successful login: the user record plus its token.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    #[serde(rename = "_id")]
    pub user_id: String,
    pub email: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

// =============================================================================
// Catalog Types
// =============================================================================

/// `{ "data": [...] }` list envelope.
#[derive(Debug, Deserialize)]
pub(crate) struct DataList<T> {
    pub data: Vec<T>,
}

/// Uploader of a song: populated user object, or a bare id.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ArtistRef {
    User(ArtistUser),
    Id(String),
}

/// Populated uploader fields.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtistUser {
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub username: String,
}

/// A song as returned by the server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SongRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    /// Audio URL
    pub track: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
    /// Free-text author label
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub artist: Option<ArtistRef>,
}

impl SongRecord {
    /// Label shown as the artist: the author, else the uploader's name.
    pub fn artist_label(&self) -> String {
        if let Some(author) = self.author.as_deref().map(str::trim) {
            if !author.is_empty() {
                return author.to_string();
            }
        }
        match &self.artist {
            Some(ArtistRef::User(user)) => {
                let name = format!("{} {}", user.first_name, user.last_name);
                let name = name.trim();
                if name.is_empty() {
                    user.username.clone()
                } else {
                    name.to_string()
                }
            }
            _ => String::new(),
        }
    }
}

impl From<SongRecord> for Track {
    fn from(song: SongRecord) -> Self {
        let artist = song.artist_label();
        let mut track = Track::new(song.id, song.name, artist, song.track);
        track.thumbnail = song.thumbnail;
        track
    }
}

/// A chapter of an audiobook; times in seconds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterRecord {
    pub name: String,
    pub start_time: f64,
    pub end_time: f64,
}

/// An audiobook as returned by the server.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudiobookRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub author: String,
    #[serde(default)]
    pub narrator: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    pub audio_file: String,
    /// Total length in seconds
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub chapters: Vec<ChapterRecord>,
}

fn seconds(value: f64) -> Option<Duration> {
    (value.is_finite() && value >= 0.0).then(|| Duration::from_secs_f64(value))
}

impl AudiobookRecord {
    /// The whole book as one track.
    pub fn to_track(&self) -> Track {
        let mut track = Track::new(&self.id, &self.name, &self.author, &self.audio_file)
            .with_kind(TrackKind::Audiobook);
        track.thumbnail = self.thumbnail.clone();
        track.duration = self.duration.and_then(seconds);
        track
    }

    /// One track per chapter, each starting at the chapter's offset.
    ///
    /// A book without chapters yields the single whole-book track.
    pub fn chapter_tracks(&self) -> Vec<Track> {
        if self.chapters.is_empty() {
            return vec![self.to_track()];
        }
        self.chapters
            .iter()
            .map(|chapter| {
                let mut track = self.to_track();
                track.title = format!("{}: {}", self.name, chapter.name);
                track.start_offset = seconds(chapter.start_time).filter(|s| !s.is_zero());
                track
            })
            .collect()
    }
}

/// A playlist with its populated songs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PlaylistRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub songs: Vec<SongRecord>,
}

/// Response from the liked-status endpoint.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct IsLikedResponse {
    pub is_liked: bool,
}

/// Request body for like/unlike.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SongIdRequest<'a> {
    pub song_id: &'a str,
}

/// Request body for adding a song to a playlist.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AddToPlaylistRequest<'a> {
    pub playlist_id: &'a str,
    pub song_id: &'a str,
}

/// Request body for audiobook progress.
#[derive(Debug, Serialize)]
pub(crate) struct ProgressRequest {
    /// Seconds listened
    pub progress: f64,
}
