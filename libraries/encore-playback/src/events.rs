//! Playback events
//!
//! The session queues events as it changes state; the UI drains them with
//! `PlaybackSession::drain_events` after each call or pump.

use crate::types::PlaybackState;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Events emitted by the playback session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlaybackEvent {
    /// Session state changed
    StateChanged {
        /// The new state
        state: PlaybackState,
    },

    /// Current track changed
    TrackChanged {
        /// ID of the new current track
        track_id: String,
        /// ID of the previous track, if any
        previous_track_id: Option<String>,
        /// Queue index of the new track
        index: usize,
    },

    /// A track change started or finished loading
    ChangingSong {
        /// True while the new track is loading
        changing: bool,
    },

    /// The current track finished loading
    TrackLoaded {
        /// Track id
        track_id: String,
        /// Duration reported by the backend
        duration_ms: Option<u64>,
    },

    /// Position published by the progress tracker
    PositionUpdate {
        /// Current position
        position_ms: u64,
        /// Known duration
        duration_ms: Option<u64>,
    },

    /// A seek was applied
    Seeked {
        /// New position
        position_ms: u64,
    },

    /// Volume or mute changed
    VolumeChanged {
        /// Level (0.0 - 1.0)
        volume: f32,
        /// Whether audio is muted
        muted: bool,
    },

    /// Queue was replaced
    QueueChanged {
        /// Number of tracks
        length: usize,
        /// Current index
        index: Option<usize>,
    },

    /// Navigation was requested on an empty queue
    QueueEmpty,

    /// The current track failed to load
    LoadFailed {
        /// Track id
        track_id: String,
        /// Reason reported by the backend
        reason: String,
    },

    /// Liked flag of the current track changed
    LikeChanged {
        /// Track id
        track_id: String,
        /// Liked flag
        liked: bool,
        /// Whether a toggle is in flight
        pending: bool,
    },

    /// Playlist membership of the current track changed
    PlaylistChanged {
        /// Track id
        track_id: String,
        /// Playlist the track was last added to
        added_to: Option<String>,
        /// Whether an addition is in flight
        pending: bool,
    },

    /// Recoverable error (e.g. a backend control call failed)
    Error {
        /// Message
        message: String,
    },
}

pub(crate) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
