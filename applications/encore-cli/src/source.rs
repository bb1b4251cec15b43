//! Where a play command gets its queue from

use anyhow::{bail, Context};
use encore_client::LibraryClientHandle;
use encore_playback::Track;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackSource {
    Files(Vec<PathBuf>),
    MySongs,
    Trending,
    Liked,
    Search(String),
    Playlist(String),
    Audiobooks,
}

impl TrackSource {
    pub fn needs_server(&self) -> bool {
        !matches!(self, Self::Files(_))
    }

    /// Resolve the source into a queue
    pub async fn fetch(&self, library: Option<&LibraryClientHandle>) -> anyhow::Result<Vec<Track>> {
        let Self::Files(paths) = self else {
            let library = library.context("Not logged in; run `encore login` first")?;
            return self.fetch_remote(library).await;
        };

        let tracks: Vec<Track> = paths.iter().map(|path| file_track(path)).collect();
        if tracks.is_empty() {
            bail!("No files given");
        }
        Ok(tracks)
    }

    async fn fetch_remote(&self, library: &LibraryClientHandle) -> anyhow::Result<Vec<Track>> {
        let client = library.client();
        let tracks = match self {
            Self::Files(_) => Vec::new(),
            Self::MySongs => client.my_songs().await?,
            Self::Trending => client.trending().await?,
            Self::Liked => client.liked_songs().await?,
            Self::Search(name) => client.search_songs(name).await?,
            Self::Playlist(id) => client.playlist(id).await?,
            Self::Audiobooks => client
                .audiobooks()
                .await?
                .iter()
                .flat_map(|book| book.chapter_tracks())
                .collect(),
        };
        tracing::info!(source = ?self, tracks = tracks.len(), "queue fetched");
        Ok(tracks)
    }
}

/// A local file as a track: title from the file name, no artist
pub fn file_track(path: &Path) -> Track {
    let resource = path.to_string_lossy().into_owned();
    let title = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| resource.clone());
    Track::new(resource.clone(), title, "", resource)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_track_uses_stem_as_title() {
        let track = file_track(Path::new("/music/01 Intro.flac"));
        assert_eq!(track.title, "01 Intro");
        assert_eq!(track.resource, "/music/01 Intro.flac");
        assert_eq!(track.id, track.resource);
    }

    #[test]
    fn only_files_play_offline() {
        assert!(!TrackSource::Files(vec![]).needs_server());
        assert!(TrackSource::Trending.needs_server());
        assert!(TrackSource::Playlist("p".into()).needs_server());
    }

    #[tokio::test]
    async fn remote_source_without_login_fails() {
        let err = TrackSource::Liked.fetch(None).await.unwrap_err();
        assert!(err.to_string().contains("login"));
    }

    #[tokio::test]
    async fn empty_file_list_fails() {
        assert!(TrackSource::Files(vec![]).fetch(None).await.is_err());
    }
}
