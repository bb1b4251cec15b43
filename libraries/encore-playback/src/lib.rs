//! Encore - Playback Session Engine
//!
//! Platform-agnostic playback engine for Encore. It owns exactly one loaded
//! track at a time and drives it from an ordered queue.
//!
//! This crate provides:
//! - Queue with wrapping next/previous navigation
//! - Sound handle lifecycle (load, play, pause, seek, volume, unload)
//! - Frame-driven progress publishing that never regresses after a seek
//! - Drag sessions for the seek bar and the volume bar with scoped pointer capture
//! - Fade-out before a playing sound is released
//! - Stale-completion rejection through generation tags
//! - Liked flag bookkeeping for the current track
//!
//! # Architecture
//!
//! `encore-playback` performs no audio I/O:
//! - No dependency on CPAL or any decoder
//! - No dependency on an HTTP client
//! - Works in a terminal host, a desktop shell, or the browser (feature `wasm`)
//!
//! Platforms plug in through three traits: [`SoundBackend`] (load and control
//! sounds), [`FrameScheduler`] (display-refresh callbacks) and
//! [`PointerCapture`] (pointer capture during drags).
//!
//! # Example
//!
//! ```rust
//! use encore_playback::testing::ScriptedBackend;
//! use encore_playback::{FramePulse, PlaybackSession, PlaybackState, Track};
//! use std::time::Duration;
//!
//! let backend = ScriptedBackend::new();
//! let probe = backend.clone();
//! let pulse = FramePulse::new();
//!
//! let mut session = PlaybackSession::builder(backend, pulse.clone()).build();
//! session
//!     .set_queue(
//!         vec![
//!             Track::new("1", "First", "Artist", "https://cdn.example/1.mp3"),
//!             Track::new("2", "Second", "Artist", "https://cdn.example/2.mp3"),
//!         ],
//!         0,
//!     )
//!     .unwrap();
//! assert!(session.is_changing_song());
//!
//! // The backend reports the load asynchronously; the host pumps it in.
//! probe.finish_load(0, Some(Duration::from_secs(200)));
//! session.pump();
//! assert_eq!(session.state(), PlaybackState::Playing);
//!
//! // Display refresh: sample and publish the position.
//! probe.set_position(0, Duration::from_secs(12));
//! if let Some(frame) = pulse.take_due() {
//!     session.on_frame(frame);
//! }
//! assert_eq!(session.position(), Duration::from_secs(12));
//! ```

pub mod drag;
pub mod error;
pub mod events;
pub mod fade;
pub mod frame;
pub mod lifecycle;
pub mod likes;
pub mod progress;
pub mod queue;
pub mod session;
pub mod sound;
pub mod testing;
pub mod types;
pub mod volume;

#[cfg(feature = "wasm")]
pub mod wasm;

pub use drag::{ControlExtent, DragSurface, NoCapture, PointerCapture, PointerEvent};
pub use error::{PlaybackError, Result};
pub use events::PlaybackEvent;
pub use fade::{FadeCurve, FadeRamp};
pub use frame::{Clock, FramePulse, FrameRequest, FrameScheduler, MonotonicClock};
pub use lifecycle::ReleaseReason;
pub use likes::{LikeTicket, PlaylistTicket};
pub use queue::{QueueController, QueueMove, TrackChange};
pub use session::{PlaybackSession, SessionBuilder};
pub use sound::{
    FadeStart, Generation, LoadRequest, Sound, SoundBackend, SoundEvent, SoundEventKind,
    SoundHandle, SoundNotifier, SoundState,
};
pub use types::{format_time, PlaybackConfig, PlaybackState, Track, TrackKind};
pub use volume::Volume;

#[cfg(feature = "wasm")]
pub use wasm::WasmPlaybackSession;
