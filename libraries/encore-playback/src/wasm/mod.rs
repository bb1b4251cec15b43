//! WASM bindings for encore-playback
//!
//! Exposes the playback session to a browser page. The page supplies the
//! audio element, `requestAnimationFrame` and pointer capture through a host
//! object (see [`host`]) and forwards their callbacks into the session.

#[cfg(feature = "wasm")]
pub mod host;

#[cfg(feature = "wasm")]
pub mod session;

#[cfg(feature = "wasm")]
pub mod types;

#[cfg(feature = "wasm")]
pub use session::WasmPlaybackSession;

#[cfg(feature = "wasm")]
pub use types::WasmTrack;
