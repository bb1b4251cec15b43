//! Catalog and library operations: track lists, likes, playlists, audiobooks.

use crate::error::{ClientError, Result};
use crate::types::{
    AddToPlaylistRequest, AudiobookRecord, DataList, IsLikedResponse, PlaylistRecord,
    ProgressRequest, SongIdRequest, SongRecord,
};
use encore_playback::Track;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Library client for the Encore server.
pub struct LibraryClient<'a> {
    http: &'a Client,
    base_url: &'a str,
    token: &'a str,
}

impl<'a> LibraryClient<'a> {
    pub(crate) fn new(http: &'a Client, base_url: &'a str, token: &'a str) -> Self {
        Self {
            http,
            base_url,
            token,
        }
    }

    /// Songs uploaded by the current user.
    pub async fn my_songs(&self) -> Result<Vec<Track>> {
        self.song_list("/song/get/mysongs").await
    }

    /// Trending songs (most recent uploads).
    pub async fn trending(&self) -> Result<Vec<Track>> {
        self.song_list("/song/get/trending").await
    }

    /// Songs the current user has liked.
    pub async fn liked_songs(&self) -> Result<Vec<Track>> {
        self.song_list("/song/liked").await
    }

    /// Songs whose name matches `name` (case-insensitive, server side).
    pub async fn search_songs(&self, name: &str) -> Result<Vec<Track>> {
        let mut url = Url::parse(&format!("{}/song/get/songname", self.base_url))
            .map_err(|e| ClientError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| ClientError::InvalidUrl(self.base_url.to_string()))?
            .push(name);

        debug!(url = %url, query = %name, "Searching songs");
        let list: DataList<SongRecord> = read_json(self.send(self.http.get(url)).await?).await?;
        debug!(results = list.data.len(), "Search complete");
        Ok(list.data.into_iter().map(Track::from).collect())
    }

    /// A playlist's songs, in playlist order.
    pub async fn playlist(&self, playlist_id: &str) -> Result<Vec<Track>> {
        let url = format!("{}/playlist/get/playlist/{}", self.base_url, playlist_id);
        debug!(url = %url, playlist_id = %playlist_id, "Fetching playlist");

        let response = self.send(self.http.get(&url)).await?;
        if response.status().as_u16() == 404 {
            return Err(ClientError::NotFound(format!("playlist {}", playlist_id)));
        }
        let playlist: PlaylistRecord = read_json(response).await?;

        debug!(name = %playlist.name, songs = playlist.songs.len(), "Fetched playlist");
        Ok(playlist.songs.into_iter().map(Track::from).collect())
    }

    /// Playlists owned by the current user, songs included.
    pub async fn my_playlists(&self) -> Result<Vec<PlaylistRecord>> {
        let url = format!("{}/playlist/get/me", self.base_url);
        debug!(url = %url, "Fetching own playlists");

        let list: DataList<PlaylistRecord> =
            read_json(self.send(self.http.get(&url)).await?).await?;
        debug!(playlists = list.data.len(), "Fetched own playlists");
        Ok(list.data)
    }

    /// All audiobooks.
    pub async fn audiobooks(&self) -> Result<Vec<AudiobookRecord>> {
        let url = format!("{}/audiobook/get/all", self.base_url);
        debug!(url = %url, "Fetching audiobooks");

        let list: DataList<AudiobookRecord> =
            read_json(self.send(self.http.get(&url)).await?).await?;
        debug!(audiobooks = list.data.len(), "Fetched audiobooks");
        Ok(list.data)
    }

    /// Whether the current user likes `song_id`.
    pub async fn is_liked(&self, song_id: &str) -> Result<bool> {
        let url = format!("{}/song/is-liked/{}", self.base_url, song_id);
        let response: IsLikedResponse = read_json(self.send(self.http.get(&url)).await?).await?;
        Ok(response.is_liked)
    }

    /// Like a song. Idempotent on the server.
    pub async fn like(&self, song_id: &str) -> Result<()> {
        self.post_song_id("/song/like", song_id).await
    }

    /// Unlike a song.
    pub async fn unlike(&self, song_id: &str) -> Result<()> {
        self.post_song_id("/song/unlike", song_id).await
    }

    /// Set the liked flag to `liked`.
    pub async fn set_liked(&self, song_id: &str, liked: bool) -> Result<()> {
        if liked {
            self.like(song_id).await
        } else {
            self.unlike(song_id).await
        }
    }

    /// Add a song to a playlist; a song already present is left in place.
    pub async fn add_to_playlist(&self, playlist_id: &str, song_id: &str) -> Result<()> {
        let url = format!("{}/playlist/add/song", self.base_url);
        debug!(playlist_id = %playlist_id, song_id = %song_id, "Adding song to playlist");

        let request = AddToPlaylistRequest {
            playlist_id,
            song_id,
        };
        let response = self.send(self.http.post(&url).json(&request)).await?;
        if response.status().as_u16() == 404 {
            return Err(ClientError::NotFound(format!(
                "playlist {} or song {}",
                playlist_id, song_id
            )));
        }
        expect_success(response).await
    }

    /// Store how far the user has listened into an audiobook.
    pub async fn update_audiobook_progress(&self, audiobook_id: &str, position: Duration) -> Result<()> {
        let url = format!("{}/audiobook/progress/{}", self.base_url, audiobook_id);
        debug!(audiobook_id = %audiobook_id, seconds = position.as_secs_f64(), "Saving audiobook progress");

        let request = ProgressRequest {
            progress: position.as_secs_f64(),
        };
        let response = self.send(self.http.post(&url).json(&request)).await?;
        if response.status().as_u16() == 404 {
            return Err(ClientError::NotFound(format!("audiobook {}", audiobook_id)));
        }
        expect_success(response).await
    }

    async fn song_list(&self, path: &str) -> Result<Vec<Track>> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "Fetching songs");

        let list: DataList<SongRecord> = read_json(self.send(self.http.get(&url)).await?).await?;
        debug!(songs = list.data.len(), "Fetched songs");
        Ok(list.data.into_iter().map(Track::from).collect())
    }

    async fn post_song_id(&self, path: &str, song_id: &str) -> Result<()> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, song_id = %song_id, "Updating liked status");

        let response = self
            .send(self.http.post(&url).json(&SongIdRequest { song_id }))
            .await?;
        if response.status().as_u16() == 404 {
            return Err(ClientError::NotFound(format!("song {}", song_id)));
        }
        expect_success(response).await
    }

    /// Send with the bearer token; a 401 becomes `AuthRequired`.
    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request
            .bearer_auth(self.token)
            .send()
            .await
            .map_err(ClientError::from_send)?;

        if response.status().as_u16() == 401 {
            return Err(ClientError::AuthRequired);
        }
        Ok(response)
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        return Err(ClientError::ServerError {
            status: status.as_u16(),
            message: error_text,
        });
    }
    response
        .json()
        .await
        .map_err(|e| ClientError::ParseError(e.to_string()))
}

async fn expect_success(response: Response) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        let error_text = response.text().await.unwrap_or_default();
        Err(ClientError::ServerError {
            status: status.as_u16(),
            message: error_text,
        })
    }
}
