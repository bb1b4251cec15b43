//! Desktop sound backend for the Encore playback session
//!
//! Implements [`encore_playback::SoundBackend`] with CPAL output, Symphonia
//! decoding and Rubato resampling.
//!
//! # Features
//!
//! - Local files and HTTP(S) URLs
//! - Every format Symphonia supports (MP3, FLAC, OGG, WAV, AAC, ...)
//! - Automatic sample rate conversion to the device rate
//! - Per-sound volume and fade-out in the audio callback
//!
//! # Example
//!
//! ```no_run
//! use encore_audio_desktop::{DesktopBackend, OutputSettings};
//! use encore_playback::{FramePulse, PlaybackSession, Track};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = DesktopBackend::new(OutputSettings::default())?;
//! let pulse = FramePulse::new();
//! let mut session = PlaybackSession::builder(backend, pulse.clone()).build();
//!
//! session.set_queue(vec![Track::new("1", "Song", "Artist", "/music/song.flac")], 0)?;
//! loop {
//!     session.pump();
//!     if let Some(frame) = pulse.take_due() {
//!         session.on_frame(frame);
//!     }
//!     std::thread::sleep(std::time::Duration::from_millis(16));
//! #   break;
//! }
//! # Ok(())
//! # }
//! ```

mod backend;
pub mod decode;
mod error;
pub mod fetch;
mod loader;
mod mixer;
pub mod resample;

pub use backend::{DesktopBackend, DesktopSound, OutputSettings};
pub use error::{AudioError, Result};
pub use resample::ResamplingQuality;
