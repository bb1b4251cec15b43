//! Display-refresh scheduling and time
//!
//! The session never samples playback position on its own timer. It asks the
//! host for one frame callback at a time ([`FrameScheduler::request_frame`]),
//! the way a browser page uses `requestAnimationFrame`, and the host calls
//! `PlaybackSession::on_frame` with the matching [`FrameRequest`] when the
//! display refreshes.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Identifier of one outstanding frame callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameRequest(pub u64);

/// Host primitive for display-refresh callbacks
pub trait FrameScheduler {
    /// Schedule one callback for the next display refresh
    fn request_frame(&mut self) -> FrameRequest;

    /// Cancel a callback that has not fired yet
    fn cancel_frame(&mut self, request: FrameRequest);
}

#[derive(Debug, Default)]
struct PulseState {
    next_id: u64,
    pending: Option<FrameRequest>,
    requested: u64,
    cancelled: u64,
}

/// Frame scheduler for hosts driven by a fixed-rate ticker
///
/// Clones share state: hand one clone to the session and keep another in the
/// host loop, which calls [`take_due`](Self::take_due) on every tick.
#[derive(Debug, Clone, Default)]
pub struct FramePulse {
    state: Rc<RefCell<PulseState>>,
}

impl FramePulse {
    /// New pulse with nothing pending
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the pending request, if any; the host then calls `on_frame` with it
    pub fn take_due(&self) -> Option<FrameRequest> {
        self.state.borrow_mut().pending.take()
    }

    /// Whether a frame is currently requested
    pub fn is_pending(&self) -> bool {
        self.state.borrow().pending.is_some()
    }

    /// Total frames requested so far
    pub fn requested(&self) -> u64 {
        self.state.borrow().requested
    }

    /// Total frames cancelled so far
    pub fn cancelled(&self) -> u64 {
        self.state.borrow().cancelled
    }
}

impl FrameScheduler for FramePulse {
    fn request_frame(&mut self) -> FrameRequest {
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        state.requested += 1;
        let request = FrameRequest(state.next_id);
        state.pending = Some(request);
        request
    }

    fn cancel_frame(&mut self, request: FrameRequest) {
        let mut state = self.state.borrow_mut();
        if state.pending == Some(request) {
            state.pending = None;
            state.cancelled += 1;
        }
    }
}

/// Monotonic time source
pub trait Clock {
    /// Time elapsed since an arbitrary fixed origin
    fn now(&self) -> Duration;
}

/// Clock backed by [`Instant`]
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Clock with its origin at the moment of creation
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}
