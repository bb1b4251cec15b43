//! Playback session
//!
//! The session is the single owner of the live sound. It reacts to queue
//! changes, drives the sound through its lifecycle, samples progress on
//! display frames, turns drag gestures into seeks and volume changes, and
//! hands the UI a stream of [`PlaybackEvent`]s.
//!
//! # Event sources
//!
//! Everything runs on the host's event loop. Three things move the session
//! forward besides direct method calls:
//! - [`pump`](PlaybackSession::pump): applies completions reported by the
//!   sound backend (load finished or failed, track ended, fade finished)
//! - [`on_frame`](PlaybackSession::on_frame): the display-refresh callback
//!   requested through the [`FrameScheduler`]
//! - the `drag_*` methods: pointer gestures over the seek and volume bars
//!
//! # Stale completions
//!
//! Every acquired sound gets a fresh [`Generation`]. Completions carry the
//! generation of the sound that produced them and are dropped unless it
//! matches the live sound, so a slow load for a track the user already
//! skipped can never take over.

use crate::drag::{
    ControlExtent, DragController, DragSurface, NoCapture, PointerCapture, PointerEvent,
    SharedCapture,
};
use crate::error::{PlaybackError, Result};
use crate::events::{millis, PlaybackEvent};
use crate::frame::{Clock, FrameRequest, FrameScheduler, MonotonicClock};
use crate::lifecycle::{Lifecycle, ReleaseReason};
use crate::likes::{LikeTicket, LikeTracker, PlaylistTicket, PlaylistTracker};
use crate::progress::ProgressTracker;
use crate::queue::{QueueController, QueueMove};
use crate::sound::{Generation, SoundBackend, SoundEvent, SoundEventKind, SoundHandle, SoundState};
use crate::types::{PlaybackConfig, PlaybackState, Track};
use crate::volume::Volume;
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// Builder for [`PlaybackSession`]
pub struct SessionBuilder {
    backend: Box<dyn SoundBackend>,
    frames: Box<dyn FrameScheduler>,
    capture: Option<SharedCapture>,
    clock: Option<Box<dyn Clock>>,
    config: PlaybackConfig,
}

impl SessionBuilder {
    /// Playback configuration
    #[must_use]
    pub fn config(mut self, config: PlaybackConfig) -> Self {
        self.config = config;
        self
    }

    /// Host pointer capture used by drags (default: none)
    #[must_use]
    pub fn pointer_capture(mut self, capture: impl PointerCapture + 'static) -> Self {
        self.capture = Some(Rc::new(RefCell::new(capture)));
        self
    }

    /// Time source for fade deadlines (default: [`MonotonicClock`])
    #[must_use]
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Box::new(clock));
        self
    }

    /// Build the session
    pub fn build(self) -> PlaybackSession {
        let (events_tx, events_rx) = unbounded();
        let capture = self
            .capture
            .unwrap_or_else(|| Rc::new(RefCell::new(NoCapture)));
        let clock = self
            .clock
            .unwrap_or_else(|| Box::new(MonotonicClock::new()));

        PlaybackSession {
            lifecycle: Lifecycle::new(
                self.config.fade_out(),
                self.config.fade_deadline(),
                self.config.fade_curve,
            ),
            tracker: ProgressTracker::new(self.config.seek_tolerance()),
            volume: Volume::new(self.config.volume),
            drags: DragController::new(capture),
            backend: self.backend,
            frames: self.frames,
            clock,
            config: self.config,
            queue: QueueController::new(),
            state: PlaybackState::Idle,
            generation: Generation::ZERO,
            handle: None,
            pending_load: false,
            desired_playing: false,
            on_player_screen: true,
            bound_track: None,
            likes: LikeTracker::new(),
            playlists: PlaylistTracker::new(),
            failure: None,
            outstanding_frame: None,
            events_tx,
            events_rx,
            pending_events: Vec::new(),
        }
    }
}

/// Playback session state machine
pub struct PlaybackSession {
    config: PlaybackConfig,
    backend: Box<dyn SoundBackend>,
    frames: Box<dyn FrameScheduler>,
    clock: Box<dyn Clock>,

    queue: QueueController,
    state: PlaybackState,

    // Tag of the most recently acquired sound
    generation: Generation,
    handle: Option<SoundHandle>,
    lifecycle: Lifecycle,
    // A load waits for the retiring sound to be released
    pending_load: bool,

    tracker: ProgressTracker,
    drags: DragController,
    volume: Volume,
    likes: LikeTracker,
    playlists: PlaylistTracker,

    desired_playing: bool,
    on_player_screen: bool,
    bound_track: Option<String>,
    failure: Option<PlaybackError>,
    outstanding_frame: Option<FrameRequest>,

    events_tx: Sender<SoundEvent>,
    events_rx: Receiver<SoundEvent>,
    pending_events: Vec<PlaybackEvent>,
}

impl PlaybackSession {
    /// Start building a session on `backend`, scheduling frames with `frames`
    pub fn builder(
        backend: impl SoundBackend + 'static,
        frames: impl FrameScheduler + 'static,
    ) -> SessionBuilder {
        SessionBuilder {
            backend: Box::new(backend),
            frames: Box::new(frames),
            capture: None,
            clock: None,
            config: PlaybackConfig::default(),
        }
    }

    // ===== Queue =====

    /// Replace the queue and start at `start_index`
    ///
    /// An out-of-range index starts at the first track.
    pub fn set_queue(&mut self, tracks: Vec<Track>, start_index: usize) -> Result<()> {
        self.ensure_live()?;
        self.queue.set_queue(tracks, start_index);
        self.emit(PlaybackEvent::QueueChanged {
            length: self.queue.len(),
            index: self.queue.index(),
        });
        let autoplay = self.config.autoplay_on_select || self.desired_playing;
        self.change_track(autoplay);
        self.sync_frames();
        Ok(())
    }

    /// Make queue entry `index` current
    pub fn jump_to(&mut self, index: usize) -> Result<()> {
        self.ensure_live()?;
        self.queue.jump_to(index)?;
        let autoplay = self.config.autoplay_on_select || self.desired_playing;
        self.change_track(autoplay);
        self.sync_frames();
        Ok(())
    }

    /// Next track, wrapping to the start
    pub fn next(&mut self) -> Result<()> {
        self.ensure_live()?;
        match self.queue.advance() {
            QueueMove::Empty => self.emit(PlaybackEvent::QueueEmpty),
            QueueMove::Moved(_) => self.change_track(self.desired_playing),
        }
        self.sync_frames();
        Ok(())
    }

    /// Previous track, wrapping to the end
    pub fn previous(&mut self) -> Result<()> {
        self.ensure_live()?;
        match self.queue.retreat() {
            QueueMove::Empty => self.emit(PlaybackEvent::QueueEmpty),
            QueueMove::Moved(_) => self.change_track(self.desired_playing),
        }
        self.sync_frames();
        Ok(())
    }

    /// Empty the queue and release the sound
    pub fn clear_queue(&mut self) -> Result<()> {
        self.ensure_live()?;
        self.queue.clear();
        self.emit(PlaybackEvent::QueueChanged {
            length: 0,
            index: None,
        });
        self.change_track(false);
        self.sync_frames();
        Ok(())
    }

    // ===== Transport =====

    /// Play if paused, pause if playing
    ///
    /// While a track is loading this only flips whether it starts playing
    /// once loaded.
    pub fn toggle_play_pause(&mut self) -> Result<()> {
        match self.state {
            PlaybackState::Playing => self.pause(),
            PlaybackState::Loading => {
                self.desired_playing = !self.desired_playing;
                debug!(desired_playing = self.desired_playing, "play intent changed while loading");
                Ok(())
            }
            _ => self.play(),
        }
    }

    /// Start or resume playback
    pub fn play(&mut self) -> Result<()> {
        self.ensure_live()?;
        match self.state {
            PlaybackState::Playing => {}
            PlaybackState::Ready | PlaybackState::Paused => self.begin_playing(),
            PlaybackState::Loading => self.desired_playing = true,
            PlaybackState::Idle => {
                if self.queue.current().is_none() {
                    return Err(PlaybackError::EmptyQueue);
                }
                self.desired_playing = true;
                self.reload_current();
            }
            PlaybackState::Failed => {
                return Err(PlaybackError::InvalidOperation(
                    "current track failed to load".into(),
                ))
            }
            PlaybackState::Released => return Err(PlaybackError::Released),
        }
        self.sync_frames();
        Ok(())
    }

    /// Pause playback
    pub fn pause(&mut self) -> Result<()> {
        self.ensure_live()?;
        match self.state {
            PlaybackState::Playing => {
                let result = self.handle.as_mut().map_or(Ok(()), SoundHandle::pause);
                match result {
                    Ok(()) => {
                        self.desired_playing = false;
                        self.tracker.stop();
                        self.set_state(PlaybackState::Paused);
                    }
                    Err(e) => self.fail_control(e),
                }
            }
            PlaybackState::Loading => self.desired_playing = false,
            _ => {}
        }
        self.sync_frames();
        Ok(())
    }

    /// Reload the current track after a load failure
    pub fn retry(&mut self) -> Result<()> {
        self.ensure_live()?;
        if self.state == PlaybackState::Failed {
            info!(track_id = ?self.bound_track, "retrying failed track");
            self.desired_playing = true;
            self.reload_current();
        }
        self.sync_frames();
        Ok(())
    }

    /// Seek to `position`, clamped to the track duration
    pub fn seek_to(&mut self, position: Duration) -> Result<()> {
        self.ensure_live()?;
        if !self.state.is_seekable() {
            return Err(PlaybackError::NotSeekable(self.state));
        }
        let target = self.duration().map_or(position, |d| position.min(d));
        let Some(handle) = self.handle.as_mut() else {
            return Err(PlaybackError::NotSeekable(self.state));
        };

        match handle.seek(target) {
            Ok(()) => {
                debug!(position_ms = millis(target), "seek");
                self.tracker.seeked(target);
                self.emit(PlaybackEvent::Seeked {
                    position_ms: millis(target),
                });
                self.emit_position();
            }
            Err(e) => self.fail_control(e),
        }
        self.sync_frames();
        Ok(())
    }

    /// Seek to a fraction (0.0 - 1.0) of the track
    pub fn seek_to_fraction(&mut self, fraction: f64) -> Result<()> {
        self.ensure_live()?;
        if !self.state.is_seekable() {
            return Err(PlaybackError::NotSeekable(self.state));
        }
        let duration = self.duration().ok_or_else(|| {
            PlaybackError::InvalidOperation("track duration unknown".into())
        })?;
        let fraction = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };
        self.seek_to(duration.mul_f64(fraction))
    }

    /// Set volume (0.0 - 1.0); kept for later tracks
    pub fn set_volume(&mut self, level: f32) -> Result<()> {
        self.ensure_live()?;
        self.apply_volume(level);
        Ok(())
    }

    /// Toggle mute
    pub fn toggle_mute(&mut self) -> Result<()> {
        self.ensure_live()?;
        self.volume.toggle_mute();
        self.push_volume();
        Ok(())
    }

    // ===== Screen & teardown =====

    /// The player left the screen: fade out and release the sound
    pub fn leave_player_screen(&mut self) -> Result<()> {
        self.ensure_live()?;
        if !self.on_player_screen {
            return Ok(());
        }
        self.on_player_screen = false;
        self.drags.cancel_all();
        self.tracker.resume();
        self.desired_playing = false;
        self.pending_load = false;
        self.retire_active(ReleaseReason::Navigation);
        self.set_state(PlaybackState::Idle);
        self.sync_frames();
        Ok(())
    }

    /// The player is shown again: reload the current track, paused
    pub fn enter_player_screen(&mut self) -> Result<()> {
        self.ensure_live()?;
        if self.on_player_screen {
            return Ok(());
        }
        self.on_player_screen = true;
        if self.state == PlaybackState::Idle && self.queue.current().is_some() {
            self.desired_playing = false;
            self.reload_current();
        }
        self.sync_frames();
        Ok(())
    }

    /// Tear the session down
    ///
    /// An audible sound still fades out; keep calling [`pump`](Self::pump)
    /// until [`has_live_sound`](Self::has_live_sound) is false, or drop the
    /// session to cut it off.
    pub fn release(&mut self) {
        if self.state == PlaybackState::Released {
            return;
        }
        info!("releasing playback session");
        self.drags.cancel_all();
        self.pending_load = false;
        self.retire_active(ReleaseReason::Teardown);
        self.set_state(PlaybackState::Released);
        self.sync_frames();
    }

    // ===== Event sources =====

    /// Apply all pending backend completions; returns how many were handled
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            handled += 1;
            self.apply_sound_event(event);
        }
        self.poll_retirement();
        self.sync_frames();
        handled
    }

    /// Display-refresh callback for a frame requested by the session
    pub fn on_frame(&mut self, request: FrameRequest) {
        if self.outstanding_frame != Some(request) {
            trace!(?request, "stale frame ignored");
            return;
        }
        self.outstanding_frame = None;

        if self.state == PlaybackState::Playing {
            if let Some(sampled) = self.handle.as_ref().map(SoundHandle::position) {
                if self.tracker.tick(sampled).is_some() {
                    self.emit_position();
                } else if let Some(target) = self.tracker.take_reseek() {
                    self.reissue_seek(target);
                }
            }
        }

        self.poll_retirement();
        self.sync_frames();
    }

    // ===== Drags =====

    /// Pointer went down on a bar
    pub fn drag_start(
        &mut self,
        surface: DragSurface,
        event: PointerEvent,
        extent: ControlExtent,
    ) -> Result<()> {
        self.ensure_live()?;
        let update = self.drags.start(surface, event, extent);
        match surface {
            DragSurface::Seek => {
                self.tracker.suspend();
                self.emit_position();
            }
            DragSurface::Volume => self.apply_volume(update.fraction as f32),
        }
        self.sync_frames();
        Ok(())
    }

    /// Pointer moved during a drag
    pub fn drag_move(&mut self, surface: DragSurface, event: PointerEvent) {
        let Some(update) = self.drags.update(surface, event) else {
            return;
        };
        match surface {
            DragSurface::Seek => self.emit_position(),
            DragSurface::Volume => self.apply_volume(update.fraction as f32),
        }
    }

    /// Pointer went up; a seek drag commits its position here
    pub fn drag_end(&mut self, surface: DragSurface, event: PointerEvent) -> Result<()> {
        let Some(update) = self.drags.finish(surface, event) else {
            return Ok(());
        };
        let result = match surface {
            DragSurface::Seek => {
                self.tracker.resume();
                self.seek_to_fraction(update.fraction)
            }
            DragSurface::Volume => Ok(()),
        };
        self.sync_frames();
        result
    }

    /// Host lost the pointer capture; the drag ends without committing
    pub fn drag_cancel(&mut self, surface: DragSurface) {
        if self.drags.cancel(surface) && surface == DragSurface::Seek {
            self.tracker.resume();
            self.emit_position();
        }
        self.sync_frames();
    }

    /// Provisional fraction of an open drag
    pub fn drag_preview(&self, surface: DragSurface) -> Option<f64> {
        self.drags.provisional(surface)
    }

    // ===== Likes =====

    /// Start toggling the liked flag of the current track
    ///
    /// The host sends the request and reports back with
    /// [`complete_like`](Self::complete_like).
    pub fn request_like_toggle(&mut self) -> Option<LikeTicket> {
        let ticket = self.likes.request_toggle()?;
        self.emit_like();
        Some(ticket)
    }

    /// Report the outcome of a like request
    pub fn complete_like(&mut self, ticket: &LikeTicket, succeeded: bool) {
        if self.likes.complete(ticket, succeeded) {
            self.emit_like();
        }
    }

    /// Report the liked status the server has for `track_id`
    pub fn set_liked_status(&mut self, track_id: &str, liked: bool) {
        if self.likes.set_known(track_id, liked) {
            self.emit_like();
        }
    }

    /// Start adding the current track to `playlist_id`
    ///
    /// The host sends the request and reports back with
    /// [`complete_playlist_add`](Self::complete_playlist_add).
    pub fn request_playlist_add(&mut self, playlist_id: &str) -> Option<PlaylistTicket> {
        let ticket = self.playlists.request_add(playlist_id)?;
        self.emit_playlist();
        Some(ticket)
    }

    /// Report the outcome of an add-to-playlist request
    pub fn complete_playlist_add(&mut self, ticket: &PlaylistTicket, succeeded: bool) {
        if self.playlists.complete(ticket, succeeded) {
            self.emit_playlist();
        }
    }

    // ===== State =====

    /// Session state
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// True while a track change is loading
    pub fn is_changing_song(&self) -> bool {
        self.state == PlaybackState::Loading
    }

    /// Whether playback starts (or continues) once possible
    pub fn wants_playback(&self) -> bool {
        self.desired_playing
    }

    /// Current track
    pub fn current_track(&self) -> Option<&Track> {
        self.queue.current()
    }

    /// Current queue index
    pub fn current_index(&self) -> Option<usize> {
        self.queue.index()
    }

    /// Queue
    pub fn queue(&self) -> &QueueController {
        &self.queue
    }

    /// Displayed position: the seek drag's value while one is open
    pub fn position(&self) -> Duration {
        match (self.drags.provisional(DragSurface::Seek), self.duration()) {
            (Some(fraction), Some(duration)) => duration.mul_f64(fraction),
            _ => self.tracker.position(),
        }
    }

    /// Duration of the current track, once known
    pub fn duration(&self) -> Option<Duration> {
        self.tracker
            .duration()
            .or_else(|| self.handle.as_ref().and_then(SoundHandle::duration))
            .or_else(|| self.queue.current().and_then(|t| t.duration))
    }

    /// Volume level
    pub fn volume(&self) -> f32 {
        self.volume.level()
    }

    /// Mute state
    pub fn is_muted(&self) -> bool {
        self.volume.is_muted()
    }

    /// Why the session is in [`PlaybackState::Failed`]
    pub fn failure(&self) -> Option<&PlaybackError> {
        self.failure.as_ref()
    }

    /// Liked flag of the current track
    pub fn is_liked(&self) -> bool {
        self.likes.liked()
    }

    /// Whether a like toggle is in flight
    pub fn like_pending(&self) -> bool {
        self.likes.is_pending()
    }

    /// Playlist the current track was added to during this session
    pub fn added_to_playlist(&self) -> Option<&str> {
        self.playlists.added_to()
    }

    /// Whether an add-to-playlist request is in flight
    pub fn playlist_add_pending(&self) -> bool {
        self.playlists.is_pending()
    }

    /// Generation of the most recently acquired sound
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Whether a sound is loaded or still fading out
    pub fn has_live_sound(&self) -> bool {
        self.handle.is_some() || self.lifecycle.is_retiring()
    }

    /// Whether the player screen is shown
    pub fn on_player_screen(&self) -> bool {
        self.on_player_screen
    }

    /// Configuration
    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    /// Take all queued events
    pub fn drain_events(&mut self) -> Vec<PlaybackEvent> {
        std::mem::take(&mut self.pending_events)
    }

    /// Check if there are queued events
    pub fn has_pending_events(&self) -> bool {
        !self.pending_events.is_empty()
    }

    // ===== Internals =====

    fn ensure_live(&self) -> Result<()> {
        if self.state == PlaybackState::Released {
            Err(PlaybackError::Released)
        } else {
            Ok(())
        }
    }

    /// The queue's current entry changed: drop the old sound, load the new one
    fn change_track(&mut self, autoplay: bool) {
        if self.drags.cancel(DragSurface::Seek) {
            debug!("seek drag cancelled by track change");
        }
        self.retire_active(ReleaseReason::TrackChange);
        self.tracker.reset();
        self.failure = None;
        self.desired_playing = autoplay;

        let Some(track) = self.queue.current().cloned() else {
            self.bound_track = None;
            self.likes.bind(None);
            self.playlists.bind(None);
            self.pending_load = false;
            self.set_state(PlaybackState::Idle);
            return;
        };

        let index = self.queue.index().unwrap_or_default();
        let previous_track_id = self.bound_track.replace(track.id.clone());
        self.likes.bind(Some(&track.id));
        self.playlists.bind(Some(&track.id));
        info!(track_id = %track.id, index, autoplay, "track changed");
        self.emit(PlaybackEvent::TrackChanged {
            track_id: track.id,
            previous_track_id,
            index,
        });
        self.emit_like();

        self.set_state(PlaybackState::Loading);
        self.request_load();
    }

    fn reload_current(&mut self) {
        self.failure = None;
        self.tracker.reset();
        self.set_state(PlaybackState::Loading);
        self.request_load();
    }

    fn request_load(&mut self) {
        if self.lifecycle.is_retiring() {
            debug!("load deferred until the previous sound is released");
            self.pending_load = true;
        } else {
            self.start_load();
        }
    }

    fn start_load(&mut self) {
        self.pending_load = false;
        let Some(track) = self.queue.current().cloned() else {
            self.set_state(PlaybackState::Idle);
            return;
        };

        self.generation = self.generation.next();
        let handle = SoundHandle::acquire(
            self.backend.as_mut(),
            &track,
            self.generation,
            self.volume.gain(),
            self.events_tx.clone(),
        );

        if handle.state() == SoundState::Failed {
            let reason = handle.failure().unwrap_or("load refused").to_owned();
            drop(handle);
            self.fail_load(track.id, reason);
            return;
        }

        debug!(generation = %self.generation, track_id = %track.id, "loading");
        self.handle = Some(handle);
    }

    fn retire_active(&mut self, reason: ReleaseReason) {
        self.tracker.stop();
        if let Some(handle) = self.handle.take() {
            let now = self.clock.now();
            let generation = handle.generation();
            let retirement = self.lifecycle.retire(handle, reason, now);
            debug!(%generation, ?reason, ?retirement, "sound retired");
        }
    }

    fn poll_retirement(&mut self) {
        if self.lifecycle.is_retiring() && self.lifecycle.poll_deadline(self.clock.now()) {
            self.after_retirement();
        }
    }

    fn after_retirement(&mut self) {
        if self.pending_load && self.state == PlaybackState::Loading {
            self.start_load();
        }
    }

    fn apply_sound_event(&mut self, event: SoundEvent) {
        if event.kind == SoundEventKind::FadeComplete {
            if self.lifecycle.on_fade_complete(event.generation) {
                self.after_retirement();
            }
            return;
        }

        let live = self.handle.as_ref().map(SoundHandle::generation);
        if live != Some(event.generation) {
            debug!(generation = %event.generation, ?live, kind = ?event.kind, "stale sound event dropped");
            return;
        }

        match event.kind {
            SoundEventKind::Loaded { duration } => self.on_loaded(duration),
            SoundEventKind::LoadFailed { reason } => {
                if let Some(mut handle) = self.handle.take() {
                    handle.mark_failed(reason.clone());
                    let track_id = handle.track_id().to_owned();
                    handle.release();
                    self.fail_load(track_id, reason);
                }
            }
            SoundEventKind::Ended => self.on_ended(),
            SoundEventKind::FadeComplete => {}
        }
    }

    fn on_loaded(&mut self, duration: Option<Duration>) {
        if self.state != PlaybackState::Loading {
            return;
        }
        let Some(handle) = self.handle.as_mut() else {
            return;
        };
        if !handle.mark_loaded() {
            return;
        }

        let track = self.queue.current();
        let duration = duration
            .or_else(|| handle.duration())
            .or_else(|| track.and_then(|t| t.duration));
        let offset = track
            .and_then(|t| t.start_offset)
            .filter(|offset| !offset.is_zero())
            .map(|offset| duration.map_or(offset, |d| offset.min(d)));
        let track_id = handle.track_id().to_owned();

        self.tracker.set_duration(duration);
        if let Some(offset) = offset {
            if let Err(e) = handle.seek(offset) {
                self.fail_control(e);
                return;
            }
            self.tracker.set_position(offset);
        }

        info!(track_id = %track_id, duration_ms = ?duration.map(millis), "track loaded");
        self.emit(PlaybackEvent::TrackLoaded {
            track_id,
            duration_ms: duration.map(millis),
        });
        self.emit_position();
        self.set_state(PlaybackState::Ready);

        if self.desired_playing {
            self.begin_playing();
        } else {
            self.set_state(PlaybackState::Paused);
        }
    }

    /// The sound reached its end
    ///
    /// A pause applied after the backend queued the end still advances, but
    /// the next track then loads paused.
    fn on_ended(&mut self) {
        if !matches!(self.state, PlaybackState::Playing | PlaybackState::Paused) {
            return;
        }
        let autoplay = self.state == PlaybackState::Playing && self.desired_playing;
        if let Some(handle) = self.handle.as_mut() {
            handle.mark_ended();
        }
        self.tracker.stop();
        info!(track_id = ?self.bound_track, "track ended");

        match self.queue.advance() {
            QueueMove::Empty => {
                self.emit(PlaybackEvent::QueueEmpty);
                self.rewind_paused();
            }
            QueueMove::Moved(change) if change.same_track() => self.rewind_paused(),
            QueueMove::Moved(_) => self.change_track(autoplay),
        }
    }

    fn reissue_seek(&mut self, target: Duration) {
        debug!(position_ms = millis(target), "seek not reflected yet, seeking again");
        let result = self.handle.as_mut().map_or(Ok(()), |handle| handle.seek(target));
        if let Err(e) = result {
            self.fail_control(e);
        }
    }

    fn rewind_paused(&mut self) {
        self.desired_playing = false;
        if let Some(handle) = self.handle.as_mut() {
            if let Err(e) = handle.seek(Duration::ZERO) {
                self.fail_control(e);
                return;
            }
        }
        self.tracker.set_position(Duration::ZERO);
        self.set_state(PlaybackState::Paused);
        self.emit_position();
    }

    fn begin_playing(&mut self) {
        let Some(handle) = self.handle.as_mut() else {
            return;
        };
        match handle.play() {
            Ok(()) => {
                self.desired_playing = true;
                self.tracker.start();
                self.set_state(PlaybackState::Playing);
            }
            Err(e) => self.fail_control(e),
        }
    }

    fn fail_load(&mut self, track_id: String, reason: String) {
        error!(track_id = %track_id, reason = %reason, "track failed to load");
        self.tracker.stop();
        self.failure = Some(PlaybackError::Load {
            track_id: track_id.clone(),
            reason: reason.clone(),
        });
        self.emit(PlaybackEvent::LoadFailed { track_id, reason });
        self.set_state(PlaybackState::Failed);
    }

    /// A backend control call (play, pause, seek) failed
    fn fail_control(&mut self, err: PlaybackError) {
        warn!(error = %err, "sound control failed");
        self.tracker.stop();
        if let Some(mut handle) = self.handle.take() {
            handle.release();
        }
        self.emit(PlaybackEvent::Error {
            message: err.to_string(),
        });
        self.failure = Some(err);
        self.set_state(PlaybackState::Failed);
    }

    fn apply_volume(&mut self, level: f32) {
        self.volume.set_level(level);
        self.push_volume();
    }

    fn push_volume(&mut self) {
        let gain = self.volume.gain();
        if let Some(handle) = self.handle.as_mut() {
            handle.set_volume(gain);
        }
        self.emit(PlaybackEvent::VolumeChanged {
            volume: self.volume.level(),
            muted: self.volume.is_muted(),
        });
    }

    fn set_state(&mut self, state: PlaybackState) {
        if self.state == state {
            return;
        }
        let was_changing = self.is_changing_song();
        debug!(from = %self.state, to = %state, "state changed");
        self.state = state;
        self.emit(PlaybackEvent::StateChanged { state });
        if was_changing != self.is_changing_song() {
            self.emit(PlaybackEvent::ChangingSong {
                changing: self.is_changing_song(),
            });
        }
    }

    /// Keep exactly one frame requested while anything needs frames
    fn sync_frames(&mut self) {
        let wanted = self.state != PlaybackState::Released
            && ((self.state == PlaybackState::Playing && self.tracker.wants_frames())
                || self.lifecycle.is_retiring());

        match (wanted, self.outstanding_frame) {
            (true, None) => self.outstanding_frame = Some(self.frames.request_frame()),
            (false, Some(request)) => {
                self.frames.cancel_frame(request);
                self.outstanding_frame = None;
            }
            _ => {}
        }
    }

    fn emit(&mut self, event: PlaybackEvent) {
        self.pending_events.push(event);
    }

    fn emit_position(&mut self) {
        let position = self.position();
        let duration = self.duration();
        self.emit(PlaybackEvent::PositionUpdate {
            position_ms: millis(position),
            duration_ms: duration.map(millis),
        });
    }

    fn emit_like(&mut self) {
        if let Some(track_id) = self.likes.track_id() {
            let event = PlaybackEvent::LikeChanged {
                track_id: track_id.to_owned(),
                liked: self.likes.liked(),
                pending: self.likes.is_pending(),
            };
            self.emit(event);
        }
    }

    fn emit_playlist(&mut self) {
        if let Some(track_id) = self.playlists.track_id() {
            let event = PlaybackEvent::PlaylistChanged {
                track_id: track_id.to_owned(),
                added_to: self.playlists.added_to().map(str::to_owned),
                pending: self.playlists.is_pending(),
            };
            self.emit(event);
        }
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        self.drags.cancel_all();
        if let Some(mut handle) = self.handle.take() {
            handle.release();
        }
        self.lifecycle.force_release();
        if let Some(request) = self.outstanding_frame.take() {
            self.frames.cancel_frame(request);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FramePulse;
    use crate::testing::{ManualClock, RecordingCapture, ScriptedBackend};

    struct Rig {
        session: PlaybackSession,
        backend: ScriptedBackend,
        pulse: FramePulse,
        clock: ManualClock,
    }

    fn rig() -> Rig {
        rig_with(PlaybackConfig::default())
    }

    fn rig_with(config: PlaybackConfig) -> Rig {
        let backend = ScriptedBackend::new();
        let pulse = FramePulse::new();
        let clock = ManualClock::new();
        let session = PlaybackSession::builder(backend.clone(), pulse.clone())
            .config(config)
            .clock(clock.clone())
            .pointer_capture(RecordingCapture::new())
            .build();
        Rig {
            session,
            backend,
            pulse,
            clock,
        }
    }

    fn tracks(n: usize) -> Vec<Track> {
        (0..n)
            .map(|i| {
                Track::new(format!("t{i}"), format!("Track {i}"), "Artist", format!("/t{i}.mp3"))
            })
            .collect()
    }

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    impl Rig {
        fn load(&mut self, index: usize, duration: u64) {
            self.backend.finish_load(index, Some(secs(duration)));
            self.session.pump();
        }

        fn frame(&mut self) {
            if let Some(request) = self.pulse.take_due() {
                self.session.on_frame(request);
            }
        }
    }

    #[test]
    fn set_queue_loads_and_autoplays() {
        let mut rig = rig();
        rig.session.set_queue(tracks(3), 0).unwrap();
        assert_eq!(rig.session.state(), PlaybackState::Loading);
        assert!(rig.session.is_changing_song());
        assert_eq!(rig.backend.sound(0).resource, "/t0.mp3");

        rig.load(0, 180);
        assert_eq!(rig.session.state(), PlaybackState::Playing);
        assert!(!rig.session.is_changing_song());
        assert!(rig.backend.sound(0).playing);
        assert_eq!(rig.session.duration(), Some(secs(180)));
    }

    #[test]
    fn ready_is_observable_before_playing() {
        let mut rig = rig();
        rig.session.set_queue(tracks(1), 0).unwrap();
        rig.load(0, 60);

        let states: Vec<PlaybackState> = rig
            .session
            .drain_events()
            .into_iter()
            .filter_map(|e| match e {
                PlaybackEvent::StateChanged { state } => Some(state),
                _ => None,
            })
            .collect();
        assert_eq!(
            states,
            vec![PlaybackState::Loading, PlaybackState::Ready, PlaybackState::Playing]
        );
    }

    #[test]
    fn no_autoplay_loads_paused() {
        let mut rig = rig_with(PlaybackConfig {
            autoplay_on_select: false,
            ..PlaybackConfig::default()
        });
        rig.session.set_queue(tracks(2), 0).unwrap();
        rig.load(0, 60);
        assert_eq!(rig.session.state(), PlaybackState::Paused);
        assert!(!rig.backend.sound(0).playing);
    }

    #[test]
    fn toggle_while_loading_sets_intent() {
        let mut rig = rig();
        rig.session.set_queue(tracks(2), 0).unwrap();
        rig.session.toggle_play_pause().unwrap();
        assert!(!rig.session.wants_playback());
        rig.load(0, 60);
        assert_eq!(rig.session.state(), PlaybackState::Paused);

        rig.session.toggle_play_pause().unwrap();
        assert_eq!(rig.session.state(), PlaybackState::Playing);
        rig.session.toggle_play_pause().unwrap();
        assert_eq!(rig.session.state(), PlaybackState::Paused);
    }

    #[test]
    fn load_failure_halts_without_advancing() {
        let mut rig = rig();
        rig.session.set_queue(tracks(3), 0).unwrap();
        rig.backend.fail_load(0, "404");
        rig.session.pump();

        assert_eq!(rig.session.state(), PlaybackState::Failed);
        assert_eq!(rig.session.current_index(), Some(0));
        assert_eq!(rig.backend.sound_count(), 1);
        assert!(!rig.session.is_changing_song());
        assert!(matches!(
            rig.session.failure(),
            Some(PlaybackError::Load { track_id, .. }) if track_id == "t0"
        ));
        assert_eq!(rig.backend.live_count(), 0);
    }

    #[test]
    fn refused_load_fails_immediately() {
        let mut rig = rig();
        let mut backend = rig.backend.clone();
        backend.refuse_next_load("bad scheme");
        rig.session.set_queue(tracks(1), 0).unwrap();
        assert_eq!(rig.session.state(), PlaybackState::Failed);
    }

    #[test]
    fn retry_reloads_failed_track() {
        let mut rig = rig();
        rig.session.set_queue(tracks(2), 1).unwrap();
        rig.backend.fail_load(0, "timeout");
        rig.session.pump();

        rig.session.retry().unwrap();
        assert_eq!(rig.session.state(), PlaybackState::Loading);
        assert_eq!(rig.backend.sound(1).track_id, "t1");
        rig.load(1, 30);
        assert_eq!(rig.session.state(), PlaybackState::Playing);
    }

    #[test]
    fn stale_load_never_becomes_visible() {
        let mut rig = rig();
        rig.session.set_queue(tracks(3), 0).unwrap();
        rig.session.next().unwrap();

        // first load completes after the user already moved on
        rig.backend.finish_load(0, Some(secs(100)));
        rig.session.pump();
        assert_eq!(rig.session.state(), PlaybackState::Loading);
        assert_eq!(rig.session.current_track().unwrap().id, "t1");

        rig.load(1, 200);
        assert_eq!(rig.session.state(), PlaybackState::Playing);
        assert_eq!(rig.session.duration(), Some(secs(200)));
    }

    #[test]
    fn end_of_track_advances_and_autoplays() {
        let mut rig = rig();
        rig.session.set_queue(tracks(3), 0).unwrap();
        rig.load(0, 10);
        rig.backend.end(0);
        rig.session.pump();

        assert_eq!(rig.session.current_index(), Some(1));
        assert_eq!(rig.session.state(), PlaybackState::Loading);
        assert!(rig.session.wants_playback());
    }

    #[test]
    fn end_queued_before_pause_loads_next_paused() {
        let mut rig = rig();
        rig.session.set_queue(tracks(3), 0).unwrap();
        rig.load(0, 10);
        rig.backend.end(0);
        rig.session.pause().unwrap();
        rig.session.pump();

        assert_eq!(rig.session.current_index(), Some(1));
        assert!(!rig.session.wants_playback());

        rig.load(1, 10);
        assert_eq!(rig.session.state(), PlaybackState::Paused);
        assert!(!rig.backend.sound(1).playing);
    }

    #[test]
    fn single_track_end_pauses_at_zero() {
        let mut rig = rig();
        rig.session.set_queue(tracks(1), 0).unwrap();
        rig.load(0, 10);
        rig.backend.end(0);
        rig.session.pump();

        assert_eq!(rig.session.state(), PlaybackState::Paused);
        assert_eq!(rig.session.position(), Duration::ZERO);
        assert_eq!(rig.backend.sound(0).seeks.last(), Some(&Duration::ZERO));
        assert_eq!(rig.backend.sound_count(), 1);
    }

    #[test]
    fn playing_sound_fades_before_next_load() {
        let mut rig = rig();
        rig.session.set_queue(tracks(2), 0).unwrap();
        rig.load(0, 100);
        rig.session.next().unwrap();

        assert_eq!(rig.backend.sound(0).fade, Some(Duration::from_millis(100)));
        assert_eq!(rig.backend.sound_count(), 1);
        assert!(rig.session.is_changing_song());

        rig.backend.complete_fade(0);
        rig.session.pump();
        assert_eq!(rig.backend.sound(0).unload_count, 1);
        assert_eq!(rig.backend.sound_count(), 2);
        assert_eq!(rig.backend.sound(1).live_at_creation, 0);
    }

    #[test]
    fn fade_deadline_releases_and_loads() {
        let mut rig = rig();
        rig.session.set_queue(tracks(2), 0).unwrap();
        rig.load(0, 100);
        rig.session.next().unwrap();

        rig.clock.advance(Duration::from_millis(349));
        rig.frame();
        assert_eq!(rig.backend.sound_count(), 1);

        rig.clock.advance(Duration::from_millis(1));
        rig.frame();
        assert_eq!(rig.backend.sound(0).unload_count, 1);
        assert_eq!(rig.backend.sound_count(), 2);
    }

    #[test]
    fn volume_carries_to_next_track() {
        let mut rig = rig_with(PlaybackConfig {
            fade_out_ms: 0,
            ..PlaybackConfig::default()
        });
        rig.session.set_queue(tracks(2), 0).unwrap();
        rig.load(0, 100);
        rig.session.set_volume(0.3).unwrap();
        assert_eq!(rig.backend.sound(0).volume, 0.3);

        rig.session.next().unwrap();
        assert_eq!(rig.backend.sound(1).volume, 0.3);
    }

    #[test]
    fn mute_sends_zero_gain() {
        let mut rig = rig();
        rig.session.set_queue(tracks(1), 0).unwrap();
        rig.session.toggle_mute().unwrap();
        assert_eq!(rig.backend.sound(0).volume, 0.0);
        assert_eq!(rig.session.volume(), 0.5);
        rig.session.toggle_mute().unwrap();
        assert_eq!(rig.backend.sound(0).volume, 0.5);
    }

    #[test]
    fn frames_follow_playback() {
        let mut rig = rig();
        rig.session.set_queue(tracks(1), 0).unwrap();
        assert!(!rig.pulse.is_pending());

        rig.load(0, 100);
        assert!(rig.pulse.is_pending());

        rig.backend.set_position(0, secs(3));
        rig.frame();
        assert_eq!(rig.session.position(), secs(3));
        assert!(rig.pulse.is_pending());

        rig.session.pause().unwrap();
        assert!(!rig.pulse.is_pending());
        assert_eq!(rig.pulse.cancelled(), 1);
    }

    #[test]
    fn stale_frame_is_ignored() {
        let mut rig = rig();
        rig.session.set_queue(tracks(1), 0).unwrap();
        rig.load(0, 100);
        rig.backend.set_position(0, secs(5));
        rig.session.on_frame(FrameRequest(999));
        assert_eq!(rig.session.position(), Duration::ZERO);
    }

    #[test]
    fn seek_publishes_target_immediately() {
        let mut rig = rig();
        rig.session.set_queue(tracks(1), 0).unwrap();
        rig.load(0, 100);
        rig.session.seek_to(secs(40)).unwrap();
        assert_eq!(rig.session.position(), secs(40));
        assert_eq!(rig.backend.sound(0).seeks, vec![secs(40)]);

        rig.session.seek_to(secs(500)).unwrap();
        assert_eq!(rig.session.position(), secs(100));
    }

    #[test]
    fn slow_backend_seek_never_shows_old_position() {
        let mut rig = rig();
        rig.session.set_queue(tracks(1), 0).unwrap();
        rig.load(0, 100);
        rig.backend.set_position(0, secs(5));
        rig.frame();
        rig.session.seek_to(secs(60)).unwrap();

        for _ in 0..40 {
            rig.backend.set_position(0, secs(5));
            rig.frame();
            assert!(rig.session.position() >= secs(60) - Duration::from_millis(50));
        }
        assert_eq!(rig.backend.sound(0).seeks, vec![secs(60), secs(60)]);

        rig.backend.set_position(0, Duration::from_millis(60_020));
        rig.frame();
        assert_eq!(rig.session.position(), Duration::from_millis(60_020));
    }

    #[test]
    fn seek_while_loading_is_rejected() {
        let mut rig = rig();
        rig.session.set_queue(tracks(1), 0).unwrap();
        assert_eq!(
            rig.session.seek_to(secs(1)),
            Err(PlaybackError::NotSeekable(PlaybackState::Loading))
        );
    }

    #[test]
    fn seek_failure_surfaces_as_failed() {
        let mut rig = rig();
        let mut backend = rig.backend.clone();
        rig.session.set_queue(tracks(1), 0).unwrap();
        rig.load(0, 100);
        backend.fail_seek(true);
        rig.session.seek_to(secs(1)).unwrap();
        assert_eq!(rig.session.state(), PlaybackState::Failed);
        assert!(matches!(rig.session.failure(), Some(PlaybackError::Backend(_))));
    }

    #[test]
    fn start_offset_is_applied_on_load() {
        let mut rig = rig();
        let chapter = Track::new("c2", "Chapter 2", "Author", "/book.mp3")
            .with_start_offset(secs(600));
        rig.session.set_queue(vec![chapter], 0).unwrap();
        rig.load(0, 3_600);
        assert_eq!(rig.backend.sound(0).seeks, vec![secs(600)]);
        assert_eq!(rig.session.position(), secs(600));
    }

    #[test]
    fn seek_drag_suspends_and_commits() {
        let mut rig = rig();
        rig.session.set_queue(tracks(1), 0).unwrap();
        rig.load(0, 100);
        let bar = ControlExtent::new(0.0, 200.0);

        rig.session
            .drag_start(DragSurface::Seek, PointerEvent::new(1, 50.0), bar)
            .unwrap();
        assert!(!rig.pulse.is_pending());
        assert_eq!(rig.session.position(), secs(25));

        rig.session.drag_move(DragSurface::Seek, PointerEvent::new(1, 100.0));
        assert_eq!(rig.session.position(), secs(50));
        assert!(rig.backend.sound(0).seeks.is_empty());

        rig.session
            .drag_end(DragSurface::Seek, PointerEvent::new(1, 150.0))
            .unwrap();
        assert_eq!(rig.backend.sound(0).seeks, vec![secs(75)]);
        assert!(rig.pulse.is_pending());
    }

    #[test]
    fn volume_drag_commits_every_move() {
        let mut rig = rig();
        rig.session.set_queue(tracks(1), 0).unwrap();
        rig.load(0, 100);
        let bar = ControlExtent::new(10.0, 100.0);

        rig.session
            .drag_start(DragSurface::Volume, PointerEvent::new(1, 30.0), bar)
            .unwrap();
        assert!((rig.backend.sound(0).volume - 0.2).abs() < 1e-6);
        assert!(rig.pulse.is_pending());

        rig.session.drag_move(DragSurface::Volume, PointerEvent::new(1, 500.0));
        assert_eq!(rig.backend.sound(0).volume, 1.0);
        rig.session
            .drag_end(DragSurface::Volume, PointerEvent::new(1, 10.0))
            .unwrap();
        assert_eq!(rig.session.volume(), 1.0);
    }

    #[test]
    fn track_change_cancels_seek_drag() {
        let mut rig = rig();
        rig.session.set_queue(tracks(2), 0).unwrap();
        rig.load(0, 100);
        rig.session
            .drag_start(DragSurface::Seek, PointerEvent::new(1, 10.0), ControlExtent::new(0.0, 100.0))
            .unwrap();
        rig.session.next().unwrap();
        assert!(rig.session.drag_preview(DragSurface::Seek).is_none());
    }

    #[test]
    fn leave_and_enter_player_screen() {
        let mut rig = rig_with(PlaybackConfig {
            fade_out_ms: 0,
            ..PlaybackConfig::default()
        });
        rig.session.set_queue(tracks(2), 1).unwrap();
        rig.load(0, 100);

        rig.session.leave_player_screen().unwrap();
        assert_eq!(rig.session.state(), PlaybackState::Idle);
        assert!(!rig.session.has_live_sound());

        rig.session.enter_player_screen().unwrap();
        assert_eq!(rig.session.state(), PlaybackState::Loading);
        rig.load(1, 100);
        assert_eq!(rig.session.state(), PlaybackState::Paused);
        assert_eq!(rig.backend.sound(1).track_id, "t1");
    }

    #[test]
    fn release_is_terminal() {
        let mut rig = rig();
        rig.session.set_queue(tracks(2), 0).unwrap();
        rig.load(0, 100);
        rig.session.release();

        assert_eq!(rig.session.state(), PlaybackState::Released);
        assert!(!rig.pulse.is_pending());
        assert_eq!(rig.session.next(), Err(PlaybackError::Released));
        assert_eq!(rig.session.play(), Err(PlaybackError::Released));

        // fade still finishes
        rig.backend.complete_fade(0);
        rig.session.pump();
        assert!(!rig.session.has_live_sound());
        assert_eq!(rig.backend.sound_count(), 1);
    }

    #[test]
    fn drop_unloads_everything() {
        let rig = rig();
        let Rig {
            mut session,
            backend,
            ..
        } = rig;
        session.set_queue(tracks(1), 0).unwrap();
        backend.finish_load(0, Some(secs(10)));
        session.pump();
        drop(session);
        assert_eq!(backend.live_count(), 0);
    }

    #[test]
    fn like_follows_current_track() {
        let mut rig = rig();
        rig.session.set_queue(tracks(2), 0).unwrap();
        let ticket = rig.session.request_like_toggle().unwrap();
        assert!(rig.session.like_pending());

        rig.session.next().unwrap();
        rig.session.complete_like(&ticket, true);
        assert!(!rig.session.is_liked());

        rig.session.set_liked_status("t1", true);
        assert!(rig.session.is_liked());
    }

    #[test]
    fn playlist_add_reflects_outcome_for_current_track() {
        let mut rig = rig();
        rig.session.set_queue(tracks(2), 0).unwrap();
        rig.session.drain_events();

        let ticket = rig.session.request_playlist_add("mix").unwrap();
        assert!(rig.session.playlist_add_pending());
        rig.session.complete_playlist_add(&ticket, true);
        assert_eq!(rig.session.added_to_playlist(), Some("mix"));
        assert_eq!(
            rig.session.drain_events().last(),
            Some(&PlaybackEvent::PlaylistChanged {
                track_id: "t0".into(),
                added_to: Some("mix".into()),
                pending: false,
            })
        );

        let late = rig.session.request_playlist_add("other").unwrap();
        rig.session.next().unwrap();
        assert_eq!(rig.session.added_to_playlist(), None);
        rig.session.complete_playlist_add(&late, true);
        assert_eq!(rig.session.added_to_playlist(), None);
        assert!(!rig.session.playlist_add_pending());
    }

    #[test]
    fn empty_queue_navigation_signals() {
        let mut rig = rig();
        rig.session.next().unwrap();
        assert_eq!(rig.session.drain_events(), vec![PlaybackEvent::QueueEmpty]);
        assert_eq!(rig.session.play(), Err(PlaybackError::EmptyQueue));
    }

    #[test]
    fn jump_out_of_range_keeps_state() {
        let mut rig = rig();
        rig.session.set_queue(tracks(2), 0).unwrap();
        assert_eq!(
            rig.session.jump_to(9),
            Err(PlaybackError::OutOfRange { index: 9, len: 2 })
        );
        assert_eq!(rig.backend.sound_count(), 1);
    }
}
