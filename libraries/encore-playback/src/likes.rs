//! Liked flag and playlist membership of the current track
//!
//! Liking and adding to a playlist are fire-and-forget from the session's
//! point of view: the host sends the request to the server and reports the
//! outcome. The trackers only keep the flags the UI shows and drop answers
//! that arrive after the user moved to another track.

/// One like/unlike request handed to the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LikeTicket {
    /// Track the request is about
    pub track_id: String,
    /// True to like, false to unlike
    pub like: bool,
    seq: u64,
}

/// Liked state for the current track
#[derive(Debug, Clone, Default)]
pub struct LikeTracker {
    track_id: Option<String>,
    liked: bool,
    pending: Option<u64>,
    next_seq: u64,
}

impl LikeTracker {
    /// Tracker with no track
    pub fn new() -> Self {
        Self::default()
    }

    /// Follow a new current track; resets the flag
    pub fn bind(&mut self, track_id: Option<&str>) {
        if self.track_id.as_deref() == track_id {
            return;
        }
        self.track_id = track_id.map(str::to_owned);
        self.liked = false;
        self.pending = None;
    }

    /// Server told us the liked status of `track_id`; true if it applied
    pub fn set_known(&mut self, track_id: &str, liked: bool) -> bool {
        if self.track_id.as_deref() != Some(track_id) || self.pending.is_some() {
            return false;
        }
        self.liked = liked;
        true
    }

    /// Start a toggle; `None` without a track or while one is in flight
    pub fn request_toggle(&mut self) -> Option<LikeTicket> {
        let track_id = self.track_id.clone()?;
        if self.pending.is_some() {
            return None;
        }
        self.next_seq += 1;
        self.pending = Some(self.next_seq);
        Some(LikeTicket {
            track_id,
            like: !self.liked,
            seq: self.next_seq,
        })
    }

    /// Host finished the request; true if the ticket was still current
    pub fn complete(&mut self, ticket: &LikeTicket, succeeded: bool) -> bool {
        if self.pending != Some(ticket.seq) || self.track_id.as_deref() != Some(&ticket.track_id) {
            tracing::debug!(track_id = %ticket.track_id, "stale like result ignored");
            return false;
        }
        self.pending = None;
        if succeeded {
            self.liked = ticket.like;
        }
        true
    }

    /// Track the flag belongs to
    pub fn track_id(&self) -> Option<&str> {
        self.track_id.as_deref()
    }

    /// Liked flag
    pub fn liked(&self) -> bool {
        self.liked
    }

    /// Whether a toggle is in flight
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

/// One add-to-playlist request handed to the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistTicket {
    /// Track to add
    pub track_id: String,
    /// Playlist receiving the track
    pub playlist_id: String,
    seq: u64,
}

/// Playlist additions of the current track
#[derive(Debug, Clone, Default)]
pub struct PlaylistTracker {
    track_id: Option<String>,
    added_to: Option<String>,
    pending: Option<u64>,
    next_seq: u64,
}

impl PlaylistTracker {
    /// Tracker with no track
    pub fn new() -> Self {
        Self::default()
    }

    /// Follow a new current track; forgets earlier additions
    pub fn bind(&mut self, track_id: Option<&str>) {
        if self.track_id.as_deref() == track_id {
            return;
        }
        self.track_id = track_id.map(str::to_owned);
        self.added_to = None;
        self.pending = None;
    }

    /// Start adding the current track to `playlist_id`
    ///
    /// `None` without a track or while another addition is in flight.
    pub fn request_add(&mut self, playlist_id: &str) -> Option<PlaylistTicket> {
        let track_id = self.track_id.clone()?;
        if self.pending.is_some() {
            return None;
        }
        self.next_seq += 1;
        self.pending = Some(self.next_seq);
        Some(PlaylistTicket {
            track_id,
            playlist_id: playlist_id.to_owned(),
            seq: self.next_seq,
        })
    }

    /// Host finished the request; true if the ticket was still current
    pub fn complete(&mut self, ticket: &PlaylistTicket, succeeded: bool) -> bool {
        if self.pending != Some(ticket.seq) || self.track_id.as_deref() != Some(&ticket.track_id) {
            tracing::debug!(track_id = %ticket.track_id, playlist_id = %ticket.playlist_id, "stale playlist result ignored");
            return false;
        }
        self.pending = None;
        if succeeded {
            self.added_to = Some(ticket.playlist_id.clone());
        }
        true
    }

    /// Track the flags belong to
    pub fn track_id(&self) -> Option<&str> {
        self.track_id.as_deref()
    }

    /// Playlist the current track was last added to
    pub fn added_to(&self) -> Option<&str> {
        self.added_to.as_deref()
    }

    /// Whether an addition is in flight
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}
