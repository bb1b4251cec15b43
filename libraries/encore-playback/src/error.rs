//! Error types for the playback session

use crate::types::PlaybackState;
use thiserror::Error;

/// Playback errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    /// The audio resource for a track could not be loaded or decoded
    #[error("Failed to load track {track_id}: {reason}")]
    Load {
        /// Track that failed
        track_id: String,
        /// Backend-provided reason
        reason: String,
    },

    /// Queue index outside the current queue
    #[error("Index {index} out of range for queue of length {len}")]
    OutOfRange {
        /// Requested index
        index: usize,
        /// Queue length at the time of the request
        len: usize,
    },

    /// Queue has no tracks
    #[error("Queue is empty")]
    EmptyQueue,

    /// Seek requested while no loaded sound can honor it
    #[error("Cannot seek while {0}")]
    NotSeekable(PlaybackState),

    /// Session or sound handle was already released
    #[error("Playback resources already released")]
    Released,

    /// Sound backend reported an error
    #[error("Sound backend error: {0}")]
    Backend(String),

    /// Operation not valid in the current state
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

impl PlaybackError {
    /// Shorthand for a backend error from anything displayable
    pub fn backend(err: impl std::fmt::Display) -> Self {
        Self::Backend(err.to_string())
    }
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;
