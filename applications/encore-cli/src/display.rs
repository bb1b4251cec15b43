//! Terminal rendering of the session state

use encore_client::PlaylistRecord;
use encore_playback::{format_time, PlaybackEvent, PlaybackSession, PlaybackState};
use std::time::Duration;

/// Snapshot of what the status line shows
#[derive(Debug, Clone, PartialEq)]
pub struct StatusLine {
    pub state: PlaybackState,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub position: Duration,
    pub duration: Option<Duration>,
    pub volume: f32,
    pub muted: bool,
    pub liked: bool,
    pub changing: bool,
}

impl StatusLine {
    pub fn capture(session: &PlaybackSession) -> Self {
        let track = session.current_track();
        Self {
            state: session.state(),
            title: track.map(|t| t.title.clone()),
            artist: track.map(|t| t.artist.clone()),
            position: session.position(),
            duration: session.duration(),
            volume: session.volume(),
            muted: session.is_muted(),
            liked: session.is_liked(),
            changing: session.is_changing_song(),
        }
    }

    pub fn render(&self) -> String {
        let icon = match self.state {
            PlaybackState::Playing => ">",
            PlaybackState::Paused | PlaybackState::Ready => "||",
            PlaybackState::Loading => "..",
            PlaybackState::Failed => "!",
            _ => "-",
        };

        let mut line = format!("[{}]", icon);
        match (&self.title, &self.artist) {
            (Some(title), Some(artist)) if !artist.is_empty() => {
                line.push_str(&format!(" {} - {}", title, artist));
            }
            (Some(title), _) => line.push_str(&format!(" {}", title)),
            _ => line.push_str(" (nothing queued)"),
        }

        if self.changing {
            line.push_str("  loading...");
        } else {
            let total = self
                .duration
                .map(format_time)
                .unwrap_or_else(|| "--:--".to_string());
            line.push_str(&format!("  {} / {}", format_time(self.position), total));
        }

        if self.muted {
            line.push_str("  muted");
        } else {
            line.push_str(&format!("  vol {:>3}%", (self.volume * 100.0).round() as u32));
        }
        if self.liked {
            line.push_str("  <3");
        }
        line
    }
}

/// Line to print for an event, if it deserves one outside the status line
pub fn describe_event(event: &PlaybackEvent, session: &PlaybackSession) -> Option<String> {
    match event {
        PlaybackEvent::TrackChanged { index, .. } => session.current_track().map(|track| {
            format!(
                "Now playing [{}/{}]: {}",
                index + 1,
                session.queue().len(),
                track.title
            )
        }),
        PlaybackEvent::LoadFailed { track_id, reason } => Some(format!(
            "Could not load {}: {} (press r to retry, n to skip)",
            track_id, reason
        )),
        PlaybackEvent::PlaylistChanged {
            added_to: Some(playlist_id),
            pending: false,
            ..
        } => Some(format!("Added to playlist {}", playlist_id)),
        PlaybackEvent::QueueEmpty => Some("Queue is empty".to_string()),
        PlaybackEvent::Error { message } => Some(format!("Error: {}", message)),
        _ => None,
    }
}

/// One line per playlist: id, name and song count
pub fn describe_playlists(playlists: &[PlaylistRecord]) -> String {
    if playlists.is_empty() {
        return "You have no playlists".to_string();
    }
    playlists
        .iter()
        .map(|p| format!("{}  {} ({} songs)", p.id, p.name, p.songs.len()))
        .collect::<Vec<_>>()
        .join("\n")
}
