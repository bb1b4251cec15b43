//! Progress tracker
//!
//! Publishes the playback position sampled on display-refresh frames. The
//! tracker only wants frames while it is running (sound playing) and not
//! suspended (a seek drag owns the displayed position).
//!
//! After a seek the published value jumps to the target right away. Samples
//! that still reflect the pre-seek position are held back until the backend
//! catches up, so the displayed position never flickers back. A backend that
//! has not caught up after [`SEEK_SETTLE_FRAMES`] frames is asked to seek
//! again through [`ProgressTracker::take_reseek`].

use std::time::Duration;

/// Frames to wait for a backend to reflect a seek before issuing it again
pub const SEEK_SETTLE_FRAMES: u32 = 30;

#[derive(Debug, Clone, Copy)]
struct PendingSeek {
    target: Duration,
    before: Duration,
    frames_waited: u32,
    reseek: bool,
}

/// Frame-driven position publisher
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    position: Duration,
    duration: Option<Duration>,
    running: bool,
    suspended: bool,
    pending_seek: Option<PendingSeek>,
    tolerance: Duration,
}

impl ProgressTracker {
    /// Tracker accepting samples up to `tolerance` short of a seek target
    pub fn new(tolerance: Duration) -> Self {
        Self {
            position: Duration::ZERO,
            duration: None,
            running: false,
            suspended: false,
            pending_seek: None,
            tolerance,
        }
    }

    /// Last published position
    pub fn position(&self) -> Duration {
        self.position
    }

    /// Known duration
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    /// Set known duration
    pub fn set_duration(&mut self, duration: Option<Duration>) {
        self.duration = duration;
    }

    /// Start sampling (sound is playing)
    pub fn start(&mut self) {
        self.running = true;
    }

    /// Stop sampling (paused, ended, released)
    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Suspend publishing while a drag owns the position
    pub fn suspend(&mut self) {
        self.suspended = true;
    }

    /// Resume publishing
    pub fn resume(&mut self) {
        self.suspended = false;
    }

    /// Whether a drag suspended the tracker
    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Whether the tracker is sampling
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Whether the tracker needs the next display frame
    pub fn wants_frames(&self) -> bool {
        self.running && !self.suspended
    }

    /// Publish a seek target immediately
    pub fn seeked(&mut self, target: Duration) {
        self.pending_seek = Some(PendingSeek {
            target,
            before: self.position,
            frames_waited: 0,
            reseek: false,
        });
        self.position = target;
    }

    /// Overwrite the position (track start, rewind)
    pub fn set_position(&mut self, position: Duration) {
        self.pending_seek = None;
        self.position = position;
    }

    /// Feed one frame's sample; returns the newly published position
    pub fn tick(&mut self, sampled: Duration) -> Option<Duration> {
        if !self.wants_frames() {
            return None;
        }

        if let Some(seek) = self.pending_seek.as_mut() {
            let short_of_target = sampled + self.tolerance < seek.target;
            let stuck_before = seek.target < seek.before && sampled + self.tolerance >= seek.before;
            if short_of_target || stuck_before {
                seek.frames_waited += 1;
                if seek.frames_waited >= SEEK_SETTLE_FRAMES {
                    seek.frames_waited = 0;
                    seek.reseek = true;
                }
                return None;
            }
            self.pending_seek = None;
        }

        self.position = sampled;
        Some(sampled)
    }

    /// Seek target to issue again because the backend never reflected it
    pub fn take_reseek(&mut self) -> Option<Duration> {
        let seek = self.pending_seek.as_mut()?;
        std::mem::take(&mut seek.reseek).then_some(seek.target)
    }

    /// Back to a stopped tracker at zero with no duration
    pub fn reset(&mut self) {
        self.position = Duration::ZERO;
        self.duration = None;
        self.running = false;
        self.suspended = false;
        self.pending_seek = None;
    }
}
