//! Sound handles
//!
//! A sound is one loaded audio resource bound to one track. Platforms provide
//! sounds through [`SoundBackend`]; the session only ever talks to them through
//! [`SoundHandle`], which tracks the lifecycle state and guarantees the sound
//! is unloaded exactly once.
//!
//! Backends report asynchronous completions (load finished, track ended, fade
//! finished) through a [`SoundNotifier`]. Each notifier carries the
//! [`Generation`] of the handle it belongs to so the session can drop events
//! from sounds it has already moved past.

use crate::error::{PlaybackError, Result};
use crate::fade::FadeCurve;
use crate::types::Track;
use crossbeam_channel::Sender;
use std::fmt;
use std::time::Duration;

/// Monotonic tag identifying one sound acquisition
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
    /// Generation before any sound was acquired
    pub const ZERO: Self = Self(0);

    /// Next generation
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Raw value
    pub fn get(self) -> u64 {
        self.0
    }

    /// From a raw value (hosts that round-trip generations through JS)
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Asynchronous completion reported by a backend
#[derive(Debug, Clone, PartialEq)]
pub enum SoundEventKind {
    /// Resource decoded and ready to play
    Loaded {
        /// Duration, if the backend could determine it
        duration: Option<Duration>,
    },
    /// Resource could not be loaded
    LoadFailed {
        /// Reason
        reason: String,
    },
    /// Playback reached the end of the resource
    Ended,
    /// A fade started with [`Sound::fade_out`] reached silence
    FadeComplete,
}

/// Completion tagged with the generation of the sound that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct SoundEvent {
    /// Generation of the reporting sound
    pub generation: Generation,
    /// What happened
    pub kind: SoundEventKind,
}

/// Sending side of the session's sound-event channel for one sound
///
/// Cheap to clone and `Send`, so loader and audio threads can report.
#[derive(Debug, Clone)]
pub struct SoundNotifier {
    generation: Generation,
    tx: Sender<SoundEvent>,
}

impl SoundNotifier {
    /// Notifier for the sound acquired as `generation`
    pub fn new(generation: Generation, tx: Sender<SoundEvent>) -> Self {
        Self { generation, tx }
    }

    /// Generation this notifier reports for
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Report load success
    pub fn loaded(&self, duration: Option<Duration>) {
        self.send(SoundEventKind::Loaded { duration });
    }

    /// Report load failure
    pub fn failed(&self, reason: impl Into<String>) {
        self.send(SoundEventKind::LoadFailed {
            reason: reason.into(),
        });
    }

    /// Report end of playback
    pub fn ended(&self) {
        self.send(SoundEventKind::Ended);
    }

    /// Report fade completion
    pub fn fade_complete(&self) {
        self.send(SoundEventKind::FadeComplete);
    }

    fn send(&self, kind: SoundEventKind) {
        let event = SoundEvent {
            generation: self.generation,
            kind,
        };
        if self.tx.send(event).is_err() {
            tracing::trace!(generation = %self.generation, "session gone, sound event dropped");
        }
    }
}

/// Everything a backend needs to start loading a sound
#[derive(Debug, Clone)]
pub struct LoadRequest {
    /// Generation of the handle being acquired
    pub generation: Generation,
    /// Track id, for logging
    pub track_id: String,
    /// Audio resource (URL or path)
    pub resource: String,
    /// Initial gain
    pub volume: f32,
    /// Completion channel for this sound
    pub notifier: SoundNotifier,
}

/// How a backend answered a fade request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeStart {
    /// Fade is running; completion arrives as [`SoundEventKind::FadeComplete`]
    Started,
    /// Backend cannot fade; release right away
    Immediate,
}

/// One loaded audio resource, provided by a platform backend
pub trait Sound {
    /// Start or resume playback
    fn play(&mut self) -> Result<()>;

    /// Pause playback
    fn pause(&mut self) -> Result<()>;

    /// Move the playback position
    fn seek(&mut self, position: Duration) -> Result<()>;

    /// Current playback position
    fn position(&self) -> Duration;

    /// Total duration, once known
    fn duration(&self) -> Option<Duration>;

    /// Set gain (0.0 - 1.0)
    fn set_volume(&mut self, volume: f32);

    /// Fade to silence over `duration`
    fn fade_out(&mut self, _duration: Duration, _curve: FadeCurve) -> Result<FadeStart> {
        Ok(FadeStart::Immediate)
    }

    /// Free the resource; no events may be reported afterwards
    fn unload(&mut self);
}

/// Platform factory for sounds
pub trait SoundBackend {
    /// Begin loading `request.resource`
    ///
    /// Returns the sound immediately; completion is reported through
    /// `request.notifier`. An `Err` means the load could not even start.
    fn load(&mut self, request: LoadRequest) -> Result<Box<dyn Sound>>;
}

/// Lifecycle state of a sound handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundState {
    /// Waiting for the backend
    Loading,
    /// Loaded, not started
    Ready,
    /// Playing
    Playing,
    /// Paused
    Paused,
    /// Reached the end
    Ended,
    /// Load or control failure
    Failed,
    /// Unloaded
    Released,
}

/// Owning wrapper around one backend sound
///
/// Unloads the sound exactly once: on [`release`](Self::release) or on drop.
pub struct SoundHandle {
    generation: Generation,
    track_id: String,
    sound: Option<Box<dyn Sound>>,
    state: SoundState,
    failure: Option<String>,
}

impl SoundHandle {
    /// Ask `backend` for a sound for `track`
    ///
    /// A backend that refuses the load yields a handle already in
    /// [`SoundState::Failed`].
    pub fn acquire(
        backend: &mut dyn SoundBackend,
        track: &Track,
        generation: Generation,
        volume: f32,
        tx: Sender<SoundEvent>,
    ) -> Self {
        let request = LoadRequest {
            generation,
            track_id: track.id.clone(),
            resource: track.resource.clone(),
            volume,
            notifier: SoundNotifier::new(generation, tx),
        };

        match backend.load(request) {
            Ok(sound) => {
                tracing::debug!(%generation, track_id = %track.id, "sound acquired");
                Self {
                    generation,
                    track_id: track.id.clone(),
                    sound: Some(sound),
                    state: SoundState::Loading,
                    failure: None,
                }
            }
            Err(e) => {
                tracing::warn!(%generation, track_id = %track.id, error = %e, "backend refused load");
                Self {
                    generation,
                    track_id: track.id.clone(),
                    sound: None,
                    state: SoundState::Failed,
                    failure: Some(e.to_string()),
                }
            }
        }
    }

    /// Generation this handle was acquired as
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Track the sound belongs to
    pub fn track_id(&self) -> &str {
        &self.track_id
    }

    /// Lifecycle state
    pub fn state(&self) -> SoundState {
        self.state
    }

    /// Failure reason, if the handle failed
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// Whether the sound was unloaded
    pub fn is_released(&self) -> bool {
        self.state == SoundState::Released
    }

    /// Loading → Ready; false if the handle was not loading
    pub fn mark_loaded(&mut self) -> bool {
        if self.state == SoundState::Loading {
            self.state = SoundState::Ready;
            true
        } else {
            false
        }
    }

    /// Record a failure reported by the backend
    pub fn mark_failed(&mut self, reason: impl Into<String>) {
        if self.state != SoundState::Released {
            self.state = SoundState::Failed;
            self.failure = Some(reason.into());
        }
    }

    /// Playing/Paused → Ended
    pub fn mark_ended(&mut self) -> bool {
        if matches!(self.state, SoundState::Playing | SoundState::Paused) {
            self.state = SoundState::Ended;
            true
        } else {
            false
        }
    }

    /// Start playback from Ready, Paused or Ended
    pub fn play(&mut self) -> Result<()> {
        match self.state {
            SoundState::Ready | SoundState::Paused | SoundState::Ended => {}
            SoundState::Playing => return Ok(()),
            SoundState::Released => return Err(PlaybackError::Released),
            other => {
                return Err(PlaybackError::InvalidOperation(format!(
                    "cannot play a sound that is {other:?}"
                )))
            }
        }
        let result = self.sound_mut()?.play();
        self.settle(result, SoundState::Playing)
    }

    /// Pause playback
    pub fn pause(&mut self) -> Result<()> {
        match self.state {
            SoundState::Playing => {}
            SoundState::Paused | SoundState::Ready | SoundState::Ended => return Ok(()),
            SoundState::Released => return Err(PlaybackError::Released),
            other => {
                return Err(PlaybackError::InvalidOperation(format!(
                    "cannot pause a sound that is {other:?}"
                )))
            }
        }
        let result = self.sound_mut()?.pause();
        self.settle(result, SoundState::Paused)
    }

    /// Seek; an ended sound becomes paused at the new position
    pub fn seek(&mut self, position: Duration) -> Result<()> {
        let next = match self.state {
            SoundState::Ready | SoundState::Paused | SoundState::Playing => self.state,
            SoundState::Ended => SoundState::Paused,
            SoundState::Released => return Err(PlaybackError::Released),
            other => {
                return Err(PlaybackError::InvalidOperation(format!(
                    "cannot seek a sound that is {other:?}"
                )))
            }
        };
        let result = self.sound_mut()?.seek(position);
        self.settle(result, next)
    }

    /// Current position; zero when nothing is loaded
    pub fn position(&self) -> Duration {
        self.sound.as_ref().map_or(Duration::ZERO, |s| s.position())
    }

    /// Duration reported by the sound
    pub fn duration(&self) -> Option<Duration> {
        self.sound.as_ref().and_then(|s| s.duration())
    }

    /// Set gain; ignored once released
    pub fn set_volume(&mut self, volume: f32) {
        if let Some(sound) = self.sound.as_mut() {
            sound.set_volume(volume);
        }
    }

    /// Ask the sound to fade out
    pub fn fade_out(&mut self, duration: Duration, curve: FadeCurve) -> Result<FadeStart> {
        self.sound_mut()?.fade_out(duration, curve)
    }

    /// Unload the sound; returns true the first time only
    pub fn release(&mut self) -> bool {
        match self.sound.take() {
            Some(mut sound) => {
                sound.unload();
                self.state = SoundState::Released;
                tracing::debug!(generation = %self.generation, track_id = %self.track_id, "sound released");
                true
            }
            None => {
                self.state = SoundState::Released;
                false
            }
        }
    }

    fn sound_mut(&mut self) -> Result<&mut Box<dyn Sound>> {
        self.sound.as_mut().ok_or(PlaybackError::Released)
    }

    fn settle(&mut self, result: Result<()>, next: SoundState) -> Result<()> {
        match result {
            Ok(()) => {
                self.state = next;
                Ok(())
            }
            Err(e) => {
                self.state = SoundState::Failed;
                self.failure = Some(e.to_string());
                Err(e)
            }
        }
    }
}

impl fmt::Debug for SoundHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoundHandle")
            .field("generation", &self.generation)
            .field("track_id", &self.track_id)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Drop for SoundHandle {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedBackend;
    use crossbeam_channel::unbounded;

    fn track() -> Track {
        Track::new("t1", "Song", "Artist", "/song.mp3")
    }

    #[test]
    fn generations_increase() {
        let g = Generation::ZERO.next().next();
        assert_eq!(g.get(), 2);
        assert!(g > Generation::ZERO);
        assert_eq!(g.to_string(), "#2");
    }

    #[test]
    fn notifier_tags_events() {
        let (tx, rx) = unbounded();
        let notifier = SoundNotifier::new(Generation::from_raw(7), tx);
        notifier.loaded(Some(Duration::from_secs(3)));
        notifier.ended();

        let first = rx.try_recv().unwrap();
        assert_eq!(first.generation.get(), 7);
        assert_eq!(
            first.kind,
            SoundEventKind::Loaded {
                duration: Some(Duration::from_secs(3))
            }
        );
        assert_eq!(rx.try_recv().unwrap().kind, SoundEventKind::Ended);
    }

    #[test]
    fn notifier_survives_closed_channel() {
        let (tx, rx) = unbounded();
        drop(rx);
        SoundNotifier::new(Generation::ZERO, tx).failed("gone");
    }

    #[test]
    fn lifecycle_transitions() {
        let mut backend = ScriptedBackend::new();
        let (tx, _rx) = unbounded();
        let mut handle =
            SoundHandle::acquire(&mut backend, &track(), Generation::ZERO.next(), 0.5, tx);

        assert_eq!(handle.state(), SoundState::Loading);
        assert!(handle.play().is_err());
        assert!(handle.mark_loaded());
        assert!(!handle.mark_loaded());

        handle.play().unwrap();
        assert_eq!(handle.state(), SoundState::Playing);
        handle.pause().unwrap();
        assert_eq!(handle.state(), SoundState::Paused);
        handle.play().unwrap();
        assert!(handle.mark_ended());
        handle.seek(Duration::ZERO).unwrap();
        assert_eq!(handle.state(), SoundState::Paused);
    }

    #[test]
    fn release_unloads_once() {
        let mut backend = ScriptedBackend::new();
        let probe = backend.clone();
        let (tx, _rx) = unbounded();
        let mut handle =
            SoundHandle::acquire(&mut backend, &track(), Generation::ZERO.next(), 0.5, tx);

        assert!(handle.release());
        assert!(!handle.release());
        drop(handle);

        assert_eq!(probe.sound(0).unload_count, 1);
        assert_eq!(probe.live_count(), 0);
    }

    #[test]
    fn drop_releases() {
        let mut backend = ScriptedBackend::new();
        let probe = backend.clone();
        let (tx, _rx) = unbounded();
        {
            let _handle =
                SoundHandle::acquire(&mut backend, &track(), Generation::ZERO.next(), 0.5, tx);
            assert_eq!(probe.live_count(), 1);
        }
        assert_eq!(probe.live_count(), 0);
    }

    #[test]
    fn refused_load_is_failed() {
        let mut backend = ScriptedBackend::new();
        backend.refuse_next_load("unsupported scheme");
        let (tx, _rx) = unbounded();
        let handle = SoundHandle::acquire(&mut backend, &track(), Generation::ZERO.next(), 0.5, tx);

        assert_eq!(handle.state(), SoundState::Failed);
        assert!(handle.failure().unwrap().contains("unsupported scheme"));
    }

    #[test]
    fn control_error_marks_failed() {
        let mut backend = ScriptedBackend::new();
        backend.fail_play(true);
        let (tx, _rx) = unbounded();
        let mut handle =
            SoundHandle::acquire(&mut backend, &track(), Generation::ZERO.next(), 0.5, tx);
        handle.mark_loaded();

        assert!(handle.play().is_err());
        assert_eq!(handle.state(), SoundState::Failed);
    }

    #[test]
    fn released_handle_rejects_controls() {
        let mut backend = ScriptedBackend::new();
        let (tx, _rx) = unbounded();
        let mut handle =
            SoundHandle::acquire(&mut backend, &track(), Generation::ZERO.next(), 0.5, tx);
        handle.release();

        assert_eq!(handle.play(), Err(PlaybackError::Released));
        assert_eq!(handle.position(), Duration::ZERO);
        handle.set_volume(0.1);
    }
}
