//! Release of sound handles
//!
//! Every handle the session gives up passes through [`Lifecycle::retire`]. A
//! handle that is audible fades out first; it is unloaded when the backend
//! reports the fade finished or when the fade deadline passes, whichever comes
//! first. Anything else is unloaded on the spot.
//!
//! Only one handle can be retiring at a time. The session does not acquire a
//! replacement until [`Lifecycle::is_retiring`] is false, which keeps at most
//! one live sound in existence.

use crate::fade::FadeCurve;
use crate::sound::{FadeStart, Generation, SoundHandle, SoundState};
use std::time::Duration;

/// Why a handle is being released
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseReason {
    /// Current track changed
    TrackChange,
    /// User left the player screen
    Navigation,
    /// Session torn down
    Teardown,
}

/// What `retire` did with the handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retirement {
    /// Unloaded right away
    Released,
    /// Fading; unload follows
    Fading,
}

#[derive(Debug)]
struct Retiring {
    handle: SoundHandle,
    deadline: Duration,
    reason: ReleaseReason,
}

/// Fade-then-unload of retired handles
#[derive(Debug)]
pub struct Lifecycle {
    fade_out: Duration,
    deadline: Duration,
    curve: FadeCurve,
    retiring: Option<Retiring>,
}

impl Lifecycle {
    /// Fade for `fade_out`, give up waiting after `deadline`
    pub fn new(fade_out: Duration, deadline: Duration, curve: FadeCurve) -> Self {
        Self {
            fade_out,
            deadline: deadline.max(fade_out),
            curve,
            retiring: None,
        }
    }

    /// Give up `handle`
    ///
    /// A handle that is already retiring is unloaded first, so at most one
    /// handle is ever fading.
    pub fn retire(&mut self, mut handle: SoundHandle, reason: ReleaseReason, now: Duration) -> Retirement {
        self.force_release();

        if handle.state() == SoundState::Playing && !self.fade_out.is_zero() {
            match handle.fade_out(self.fade_out, self.curve) {
                Ok(FadeStart::Started) => {
                    tracing::debug!(
                        generation = %handle.generation(),
                        ?reason,
                        fade_ms = self.fade_out.as_millis() as u64,
                        "fading out before release"
                    );
                    self.retiring = Some(Retiring {
                        handle,
                        deadline: now.saturating_add(self.deadline),
                        reason,
                    });
                    return Retirement::Fading;
                }
                Ok(FadeStart::Immediate) => {}
                Err(e) => {
                    tracing::warn!(generation = %handle.generation(), error = %e, "fade failed, releasing now");
                }
            }
        }

        handle.release();
        Retirement::Released
    }

    /// Backend reported a finished fade; true if it was the retiring handle
    pub fn on_fade_complete(&mut self, generation: Generation) -> bool {
        if self.retiring_generation() != Some(generation) {
            return false;
        }
        self.finish("fade complete");
        true
    }

    /// Release the retiring handle if its deadline passed; true if released
    pub fn poll_deadline(&mut self, now: Duration) -> bool {
        match &self.retiring {
            Some(retiring) if now >= retiring.deadline => {
                self.finish("fade deadline");
                true
            }
            _ => false,
        }
    }

    /// Unload the retiring handle now; true if there was one
    pub fn force_release(&mut self) -> bool {
        if self.retiring.is_some() {
            self.finish("forced");
            true
        } else {
            false
        }
    }

    /// Whether a handle is fading
    pub fn is_retiring(&self) -> bool {
        self.retiring.is_some()
    }

    /// Generation of the fading handle
    pub fn retiring_generation(&self) -> Option<Generation> {
        self.retiring.as_ref().map(|r| r.handle.generation())
    }

    fn finish(&mut self, cause: &'static str) {
        if let Some(mut retiring) = self.retiring.take() {
            retiring.handle.release();
            tracing::debug!(
                generation = %retiring.handle.generation(),
                reason = ?retiring.reason,
                cause,
                "retired sound released"
            );
        }
    }
}

impl Drop for Lifecycle {
    fn drop(&mut self) {
        self.force_release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedBackend;
    use crate::types::Track;
    use crossbeam_channel::unbounded;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn playing_handle(backend: &mut ScriptedBackend, generation: u64) -> SoundHandle {
        let (tx, _rx) = unbounded();
        let track = Track::new("t", "T", "A", "/t.mp3");
        let mut handle = SoundHandle::acquire(backend, &track, Generation::from_raw(generation), 0.5, tx);
        handle.mark_loaded();
        handle.play().unwrap();
        handle
    }

    #[test]
    fn paused_handle_is_released_immediately() {
        let mut backend = ScriptedBackend::new();
        let probe = backend.clone();
        let mut handle = playing_handle(&mut backend, 1);
        handle.pause().unwrap();

        let mut lifecycle = Lifecycle::new(ms(100), ms(350), FadeCurve::Linear);
        assert_eq!(lifecycle.retire(handle, ReleaseReason::TrackChange, ms(0)), Retirement::Released);
        assert_eq!(probe.live_count(), 0);
        assert!(probe.sound(0).fade.is_none());
    }

    #[test]
    fn playing_handle_fades_until_complete() {
        let mut backend = ScriptedBackend::new();
        let probe = backend.clone();
        let handle = playing_handle(&mut backend, 4);

        let mut lifecycle = Lifecycle::new(ms(100), ms(350), FadeCurve::Linear);
        assert_eq!(lifecycle.retire(handle, ReleaseReason::TrackChange, ms(0)), Retirement::Fading);
        assert_eq!(probe.sound(0).fade, Some(ms(100)));
        assert_eq!(probe.live_count(), 1);

        assert!(!lifecycle.on_fade_complete(Generation::from_raw(3)));
        assert!(lifecycle.on_fade_complete(Generation::from_raw(4)));
        assert!(!lifecycle.is_retiring());
        assert_eq!(probe.live_count(), 0);
    }

    #[test]
    fn deadline_releases_stuck_fade() {
        let mut backend = ScriptedBackend::new();
        let probe = backend.clone();
        let handle = playing_handle(&mut backend, 1);

        let mut lifecycle = Lifecycle::new(ms(100), ms(350), FadeCurve::Linear);
        lifecycle.retire(handle, ReleaseReason::Navigation, ms(1_000));
        assert!(lifecycle.is_retiring());

        assert!(!lifecycle.poll_deadline(ms(1_349)));
        assert!(lifecycle.poll_deadline(ms(1_350)));
        assert_eq!(probe.sound(0).unload_count, 1);
    }

    #[test]
    fn backend_without_fade_releases_immediately() {
        let mut backend = ScriptedBackend::new();
        backend.supports_fade(false);
        let probe = backend.clone();
        let handle = playing_handle(&mut backend, 1);

        let mut lifecycle = Lifecycle::new(ms(100), ms(350), FadeCurve::Linear);
        assert_eq!(lifecycle.retire(handle, ReleaseReason::Teardown, ms(0)), Retirement::Released);
        assert_eq!(probe.live_count(), 0);
    }

    #[test]
    fn zero_fade_releases_immediately() {
        let mut backend = ScriptedBackend::new();
        let handle = playing_handle(&mut backend, 1);

        let mut lifecycle = Lifecycle::new(Duration::ZERO, Duration::ZERO, FadeCurve::Linear);
        assert_eq!(lifecycle.retire(handle, ReleaseReason::TrackChange, ms(0)), Retirement::Released);
    }

    #[test]
    fn second_retirement_releases_first() {
        let mut backend = ScriptedBackend::new();
        let probe = backend.clone();
        let first = playing_handle(&mut backend, 1);
        let second = playing_handle(&mut backend, 2);

        let mut lifecycle = Lifecycle::new(ms(100), ms(350), FadeCurve::Linear);
        lifecycle.retire(first, ReleaseReason::TrackChange, ms(0));
        lifecycle.retire(second, ReleaseReason::TrackChange, ms(10));

        assert_eq!(probe.sound(0).unload_count, 1);
        assert_eq!(lifecycle.retiring_generation(), Some(Generation::from_raw(2)));
    }

    #[test]
    fn drop_releases_fading_handle() {
        let mut backend = ScriptedBackend::new();
        let probe = backend.clone();
        let handle = playing_handle(&mut backend, 1);
        {
            let mut lifecycle = Lifecycle::new(ms(100), ms(350), FadeCurve::Linear);
            lifecycle.retire(handle, ReleaseReason::Teardown, ms(0));
        }
        assert_eq!(probe.live_count(), 0);
    }
}
