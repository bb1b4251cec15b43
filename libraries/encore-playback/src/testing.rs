//! In-memory doubles for headless hosts and tests
//!
//! [`ScriptedBackend`] creates sounds that never touch an audio device. The
//! caller drives their completions by hand (`finish_load`, `end`,
//! `complete_fade`) and inspects what the session did to them through
//! [`SoundRecord`] snapshots. Clones share state, so keep one clone as a probe
//! after handing the other to the session.

use crate::drag::{DragSurface, PointerCapture};
use crate::error::{PlaybackError, Result};
use crate::fade::FadeCurve;
use crate::frame::Clock;
use crate::sound::{FadeStart, Generation, LoadRequest, Sound, SoundBackend, SoundNotifier};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

/// Snapshot of one scripted sound
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SoundRecord {
    /// Generation it was loaded as
    pub generation: Generation,
    /// Track id from the load request
    pub track_id: String,
    /// Resource from the load request
    pub resource: String,
    /// Last gain set
    pub volume: f32,
    /// Current position
    pub position: Duration,
    /// Duration reported on load
    pub duration: Option<Duration>,
    /// Whether play was called more recently than pause
    pub playing: bool,
    /// Every seek target, in order
    pub seeks: Vec<Duration>,
    /// Requested fade duration
    pub fade: Option<Duration>,
    /// Number of unload calls
    pub unload_count: u32,
    /// Sounds still loaded when this one was created
    pub live_at_creation: usize,
}

impl SoundRecord {
    /// Loaded and not yet unloaded
    pub fn is_live(&self) -> bool {
        self.unload_count == 0
    }
}

#[derive(Debug)]
struct BackendState {
    sounds: Vec<SoundRecord>,
    notifiers: Vec<SoundNotifier>,
    refuse_next: Option<String>,
    fail_play: bool,
    fail_seek: bool,
    fades: bool,
}

/// Sound backend that only records what happens
#[derive(Debug, Clone)]
pub struct ScriptedBackend {
    state: Rc<RefCell<BackendState>>,
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedBackend {
    /// Backend whose sounds support fades and never fail
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(BackendState {
                sounds: Vec::new(),
                notifiers: Vec::new(),
                refuse_next: None,
                fail_play: false,
                fail_seek: false,
                fades: true,
            })),
        }
    }

    /// Make the next `load` call return an error
    pub fn refuse_next_load(&mut self, reason: impl Into<String>) {
        self.state.borrow_mut().refuse_next = Some(reason.into());
    }

    /// Make `play` fail on every sound
    pub fn fail_play(&mut self, fail: bool) {
        self.state.borrow_mut().fail_play = fail;
    }

    /// Make `seek` fail on every sound
    pub fn fail_seek(&mut self, fail: bool) {
        self.state.borrow_mut().fail_seek = fail;
    }

    /// Whether sounds accept fade requests
    pub fn supports_fade(&mut self, fades: bool) {
        self.state.borrow_mut().fades = fades;
    }

    /// Snapshot of the `index`-th sound created
    ///
    /// # Panics
    /// If fewer than `index + 1` sounds were created.
    pub fn sound(&self, index: usize) -> SoundRecord {
        self.state.borrow().sounds[index].clone()
    }

    /// Snapshot of the most recent sound
    pub fn last(&self) -> Option<SoundRecord> {
        self.state.borrow().sounds.last().cloned()
    }

    /// Number of sounds created
    pub fn sound_count(&self) -> usize {
        self.state.borrow().sounds.len()
    }

    /// Number of sounds not yet unloaded
    pub fn live_count(&self) -> usize {
        self.state.borrow().sounds.iter().filter(|s| s.is_live()).count()
    }

    /// Largest number of live sounds seen when a new one was created
    pub fn max_live_at_creation(&self) -> usize {
        self.state
            .borrow()
            .sounds
            .iter()
            .map(|s| s.live_at_creation)
            .max()
            .unwrap_or(0)
    }

    /// Report load success for sound `index`
    pub fn finish_load(&self, index: usize, duration: Option<Duration>) {
        let notifier = {
            let mut state = self.state.borrow_mut();
            state.sounds[index].duration = duration;
            state.notifiers[index].clone()
        };
        notifier.loaded(duration);
    }

    /// Report load failure for sound `index`
    pub fn fail_load(&self, index: usize, reason: &str) {
        let notifier = self.state.borrow().notifiers[index].clone();
        notifier.failed(reason);
    }

    /// Run sound `index` to its end and report it
    pub fn end(&self, index: usize) {
        let notifier = {
            let mut state = self.state.borrow_mut();
            let sound = &mut state.sounds[index];
            sound.position = sound.duration.unwrap_or(sound.position);
            sound.playing = false;
            state.notifiers[index].clone()
        };
        notifier.ended();
    }

    /// Report fade completion for sound `index`
    pub fn complete_fade(&self, index: usize) {
        let notifier = self.state.borrow().notifiers[index].clone();
        notifier.fade_complete();
    }

    /// Move the playback position of sound `index`
    pub fn set_position(&self, index: usize, position: Duration) {
        self.state.borrow_mut().sounds[index].position = position;
    }
}

impl SoundBackend for ScriptedBackend {
    fn load(&mut self, request: LoadRequest) -> Result<Box<dyn Sound>> {
        let mut state = self.state.borrow_mut();
        if let Some(reason) = state.refuse_next.take() {
            return Err(PlaybackError::Backend(reason));
        }

        let live_at_creation = state.sounds.iter().filter(|s| s.is_live()).count();
        state.sounds.push(SoundRecord {
            generation: request.generation,
            track_id: request.track_id,
            resource: request.resource,
            volume: request.volume,
            live_at_creation,
            ..SoundRecord::default()
        });
        state.notifiers.push(request.notifier);

        Ok(Box::new(ScriptedSound {
            index: state.sounds.len() - 1,
            state: Rc::clone(&self.state),
        }))
    }
}

struct ScriptedSound {
    index: usize,
    state: Rc<RefCell<BackendState>>,
}

impl ScriptedSound {
    fn with<R>(&self, f: impl FnOnce(&mut SoundRecord) -> R) -> R {
        f(&mut self.state.borrow_mut().sounds[self.index])
    }
}

impl Sound for ScriptedSound {
    fn play(&mut self) -> Result<()> {
        if self.state.borrow().fail_play {
            return Err(PlaybackError::Backend("scripted play failure".into()));
        }
        self.with(|s| s.playing = true);
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        self.with(|s| s.playing = false);
        Ok(())
    }

    fn seek(&mut self, position: Duration) -> Result<()> {
        if self.state.borrow().fail_seek {
            return Err(PlaybackError::Backend("scripted seek failure".into()));
        }
        self.with(|s| {
            s.position = position;
            s.seeks.push(position);
        });
        Ok(())
    }

    fn position(&self) -> Duration {
        self.with(|s| s.position)
    }

    fn duration(&self) -> Option<Duration> {
        self.with(|s| s.duration)
    }

    fn set_volume(&mut self, volume: f32) {
        self.with(|s| s.volume = volume);
    }

    fn fade_out(&mut self, duration: Duration, _curve: FadeCurve) -> Result<FadeStart> {
        if !self.state.borrow().fades {
            return Ok(FadeStart::Immediate);
        }
        self.with(|s| s.fade = Some(duration));
        Ok(FadeStart::Started)
    }

    fn unload(&mut self) {
        self.with(|s| {
            s.unload_count += 1;
            s.playing = false;
        });
    }
}

/// Clock moved by hand
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Duration>>,
}

impl ManualClock {
    /// Clock at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Move forward
    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

/// Pointer capture that records which pointers are captured
#[derive(Debug, Clone, Default)]
pub struct RecordingCapture {
    active: Rc<RefCell<Vec<(DragSurface, u32)>>>,
    captures: Rc<Cell<u32>>,
}

impl RecordingCapture {
    /// Nothing captured
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `pointer_id` is captured for `surface`
    pub fn is_captured(&self, surface: DragSurface, pointer_id: u32) -> bool {
        self.active.borrow().contains(&(surface, pointer_id))
    }

    /// Captures currently held
    pub fn active_count(&self) -> usize {
        self.active.borrow().len()
    }

    /// Captures ever taken
    pub fn capture_count(&self) -> u32 {
        self.captures.get()
    }
}

impl PointerCapture for RecordingCapture {
    fn capture(&mut self, surface: DragSurface, pointer_id: u32) {
        self.captures.set(self.captures.get() + 1);
        self.active.borrow_mut().push((surface, pointer_id));
    }

    fn release(&mut self, surface: DragSurface, pointer_id: u32) {
        self.active.borrow_mut().retain(|entry| *entry != (surface, pointer_id));
    }
}
