//! Queue controller
//!
//! Owns the ordered track list and the current index. Navigation wraps in
//! both directions. Every mutation hands back a [`TrackChange`] that the
//! session uses to decide whether a new sound has to be loaded.

use crate::error::{PlaybackError, Result};
use crate::types::Track;

/// Notification that the current queue position changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackChange {
    /// Index before the change
    pub previous: Option<usize>,
    /// Index after the change
    pub current: Option<usize>,
}

impl TrackChange {
    /// The move landed where it started (e.g. advancing a one-track queue)
    pub fn same_track(&self) -> bool {
        self.previous.is_some() && self.previous == self.current
    }
}

/// Outcome of a relative move (next / previous)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueMove {
    /// Index moved
    Moved(TrackChange),
    /// Queue is empty, nothing happened
    Empty,
}

/// Ordered track list plus current index
#[derive(Debug, Clone, Default)]
pub struct QueueController {
    tracks: Vec<Track>,
    index: Option<usize>,
}

impl QueueController {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the queue
    ///
    /// An out-of-range `start_index` falls back to the first track; an empty
    /// queue has no current index.
    pub fn set_queue(&mut self, tracks: Vec<Track>, start_index: usize) -> TrackChange {
        self.index = if tracks.is_empty() {
            None
        } else if start_index < tracks.len() {
            Some(start_index)
        } else {
            Some(0)
        };
        self.tracks = tracks;

        // Previous index refers to the old list, so it is not reported
        TrackChange {
            previous: None,
            current: self.index,
        }
    }

    /// Track at the current index
    pub fn current(&self) -> Option<&Track> {
        self.index.and_then(|i| self.tracks.get(i))
    }

    /// Current index
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    /// Move to the next track, wrapping to the start
    pub fn advance(&mut self) -> QueueMove {
        let len = self.tracks.len();
        if len == 0 {
            return QueueMove::Empty;
        }
        let previous = self.index;
        let next = previous.map_or(0, |i| (i + 1) % len);
        self.index = Some(next);
        QueueMove::Moved(TrackChange {
            previous,
            current: self.index,
        })
    }

    /// Move to the previous track, wrapping to the end
    pub fn retreat(&mut self) -> QueueMove {
        let len = self.tracks.len();
        if len == 0 {
            return QueueMove::Empty;
        }
        let previous = self.index;
        let next = previous.map_or(len - 1, |i| (i + len - 1) % len);
        self.index = Some(next);
        QueueMove::Moved(TrackChange {
            previous,
            current: self.index,
        })
    }

    /// Jump to an absolute index
    pub fn jump_to(&mut self, index: usize) -> Result<TrackChange> {
        if index >= self.tracks.len() {
            return Err(PlaybackError::OutOfRange {
                index,
                len: self.tracks.len(),
            });
        }
        let previous = self.index;
        self.index = Some(index);
        Ok(TrackChange {
            previous,
            current: self.index,
        })
    }

    /// Track after the current one, without moving
    pub fn peek_next(&self) -> Option<&Track> {
        let len = self.tracks.len();
        if len == 0 {
            return None;
        }
        let next = self.index.map_or(0, |i| (i + 1) % len);
        self.tracks.get(next)
    }

    /// Index of the track with `id`
    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.tracks.iter().position(|t| t.id == id)
    }

    /// Remove all tracks
    pub fn clear(&mut self) -> TrackChange {
        let previous = self.index;
        self.tracks.clear();
        self.index = None;
        TrackChange {
            previous,
            current: None,
        }
    }

    /// All tracks in order
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Number of tracks
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}
