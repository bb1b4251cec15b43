//! WASM-compatible PlaybackSession wrapper

use super::host::{JsCapture, JsClock, JsFrames, JsSoundBackend, NotifierRegistry};
use super::types::WasmTrack;
use crate::drag::{ControlExtent, DragSurface, PointerEvent};
use crate::frame::FrameRequest;
use crate::likes::{LikeTicket, PlaylistTicket};
use crate::{PlaybackConfig, PlaybackError, PlaybackSession, Track};
use js_sys::Function;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;
use wasm_bindgen::prelude::*;

/// WASM-compatible playback session
///
/// Wraps [`PlaybackSession`] with a JavaScript-friendly API. Every call that
/// can change state flushes the queued events to the `onEvent` callback.
#[wasm_bindgen]
pub struct WasmPlaybackSession {
    inner: PlaybackSession,
    notifiers: NotifierRegistry,
    like_tickets: HashMap<String, LikeTicket>,
    playlist_ticket: Option<PlaylistTicket>,
    on_event: Option<Function>,
}

fn parse_surface(surface: &str) -> Result<DragSurface, JsValue> {
    match surface {
        "seek" => Ok(DragSurface::Seek),
        "volume" => Ok(DragSurface::Volume),
        _ => Err(JsValue::from_str("Invalid surface. Use 'seek' or 'volume'")),
    }
}

fn to_js(err: PlaybackError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

#[wasm_bindgen]
impl WasmPlaybackSession {
    /// Create a session on a host object (see the `host` module docs)
    ///
    /// `config` is an optional plain object with `PlaybackConfig` fields.
    #[wasm_bindgen(constructor)]
    pub fn new(host: JsValue, config: JsValue) -> Result<WasmPlaybackSession, JsValue> {
        console_error_panic_hook::set_once();

        let config: PlaybackConfig = if config.is_undefined() || config.is_null() {
            PlaybackConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config)
                .map_err(|e| JsValue::from_str(&format!("Invalid config: {}", e)))?
        };

        let notifiers: NotifierRegistry = Rc::new(RefCell::new(HashMap::new()));
        let inner = PlaybackSession::builder(
            JsSoundBackend::new(host.clone(), Rc::clone(&notifiers)),
            JsFrames::new(host.clone()),
        )
        .config(config)
        .pointer_capture(JsCapture::new(host.clone()))
        .clock(JsClock::new(host))
        .build();

        Ok(Self {
            inner,
            notifiers,
            like_tickets: HashMap::new(),
            playlist_ticket: None,
            on_event: None,
        })
    }

    // ===== Queue =====

    /// Replace the queue with an array of tracks
    #[wasm_bindgen(js_name = setQueue)]
    pub fn set_queue(&mut self, tracks: JsValue, start_index: usize) -> Result<(), JsValue> {
        let tracks: Vec<WasmTrack> = serde_wasm_bindgen::from_value(tracks)
            .map_err(|e| JsValue::from_str(&format!("Failed to parse tracks: {}", e)))?;
        let tracks: Vec<Track> = tracks.into_iter().map(Track::from).collect();
        let result = self.inner.set_queue(tracks, start_index).map_err(to_js);
        self.flush();
        result
    }

    #[wasm_bindgen(js_name = jumpTo)]
    pub fn jump_to(&mut self, index: usize) -> Result<(), JsValue> {
        let result = self.inner.jump_to(index).map_err(to_js);
        self.flush();
        result
    }

    pub fn next(&mut self) -> Result<(), JsValue> {
        let result = self.inner.next().map_err(to_js);
        self.flush();
        result
    }

    pub fn previous(&mut self) -> Result<(), JsValue> {
        let result = self.inner.previous().map_err(to_js);
        self.flush();
        result
    }

    // ===== Transport =====

    #[wasm_bindgen(js_name = togglePlayPause)]
    pub fn toggle_play_pause(&mut self) -> Result<(), JsValue> {
        let result = self.inner.toggle_play_pause().map_err(to_js);
        self.flush();
        result
    }

    pub fn retry(&mut self) -> Result<(), JsValue> {
        let result = self.inner.retry().map_err(to_js);
        self.flush();
        result
    }

    #[wasm_bindgen(js_name = seekTo)]
    pub fn seek_to(&mut self, position_secs: f64) -> Result<(), JsValue> {
        if !position_secs.is_finite() || position_secs < 0.0 {
            return Err(JsValue::from_str("Invalid seek position"));
        }
        let result = self
            .inner
            .seek_to(Duration::from_secs_f64(position_secs))
            .map_err(to_js);
        self.flush();
        result
    }

    #[wasm_bindgen(js_name = setVolume)]
    pub fn set_volume(&mut self, level: f32) -> Result<(), JsValue> {
        let result = self.inner.set_volume(level).map_err(to_js);
        self.flush();
        result
    }

    #[wasm_bindgen(js_name = toggleMute)]
    pub fn toggle_mute(&mut self) -> Result<(), JsValue> {
        let result = self.inner.toggle_mute().map_err(to_js);
        self.flush();
        result
    }

    #[wasm_bindgen(js_name = leavePlayerScreen)]
    pub fn leave_player_screen(&mut self) -> Result<(), JsValue> {
        let result = self.inner.leave_player_screen().map_err(to_js);
        self.flush();
        result
    }

    #[wasm_bindgen(js_name = enterPlayerScreen)]
    pub fn enter_player_screen(&mut self) -> Result<(), JsValue> {
        let result = self.inner.enter_player_screen().map_err(to_js);
        self.flush();
        result
    }

    pub fn release(&mut self) {
        self.inner.release();
        self.flush();
    }

    // ===== Host callbacks =====

    #[wasm_bindgen(js_name = soundLoaded)]
    pub fn sound_loaded(&mut self, generation: f64, duration_secs: Option<f64>) {
        let duration = duration_secs
            .filter(|d| d.is_finite() && *d >= 0.0)
            .map(Duration::from_secs_f64);
        self.notify(generation, |n| n.loaded(duration));
    }

    #[wasm_bindgen(js_name = soundFailed)]
    pub fn sound_failed(&mut self, generation: f64, reason: String) {
        self.notify(generation, |n| n.failed(reason));
    }

    #[wasm_bindgen(js_name = soundEnded)]
    pub fn sound_ended(&mut self, generation: f64) {
        self.notify(generation, |n| n.ended());
    }

    #[wasm_bindgen(js_name = fadeComplete)]
    pub fn fade_complete(&mut self, generation: f64) {
        self.notify(generation, |n| n.fade_complete());
    }

    /// Called from the page's `requestAnimationFrame` callback
    #[wasm_bindgen(js_name = onFrame)]
    pub fn on_frame(&mut self, id: f64) {
        self.inner.on_frame(FrameRequest(id as u64));
        self.flush();
    }

    // ===== Drags =====

    #[wasm_bindgen(js_name = dragStart)]
    pub fn drag_start(
        &mut self,
        surface: &str,
        pointer_id: u32,
        x: f64,
        left: f64,
        width: f64,
    ) -> Result<(), JsValue> {
        let surface = parse_surface(surface)?;
        let result = self
            .inner
            .drag_start(surface, PointerEvent::new(pointer_id, x), ControlExtent::new(left, width))
            .map_err(to_js);
        self.flush();
        result
    }

    #[wasm_bindgen(js_name = dragMove)]
    pub fn drag_move(&mut self, surface: &str, pointer_id: u32, x: f64) -> Result<(), JsValue> {
        let surface = parse_surface(surface)?;
        self.inner.drag_move(surface, PointerEvent::new(pointer_id, x));
        self.flush();
        Ok(())
    }

    #[wasm_bindgen(js_name = dragEnd)]
    pub fn drag_end(&mut self, surface: &str, pointer_id: u32, x: f64) -> Result<(), JsValue> {
        let surface = parse_surface(surface)?;
        let result = self
            .inner
            .drag_end(surface, PointerEvent::new(pointer_id, x))
            .map_err(to_js);
        self.flush();
        result
    }

    #[wasm_bindgen(js_name = dragCancel)]
    pub fn drag_cancel(&mut self, surface: &str) -> Result<(), JsValue> {
        let surface = parse_surface(surface)?;
        self.inner.drag_cancel(surface);
        self.flush();
        Ok(())
    }

    // ===== Likes and playlists =====

    /// Start a like toggle; returns `{ trackId, like }` for the page to send
    #[wasm_bindgen(js_name = requestLikeToggle)]
    pub fn request_like_toggle(&mut self) -> JsValue {
        let Some(ticket) = self.inner.request_like_toggle() else {
            return JsValue::NULL;
        };
        let payload = js_sys::Object::new();
        let _ = js_sys::Reflect::set(&payload, &"trackId".into(), &ticket.track_id.as_str().into());
        let _ = js_sys::Reflect::set(&payload, &"like".into(), &ticket.like.into());
        self.like_tickets.insert(ticket.track_id.clone(), ticket);
        self.flush();
        payload.into()
    }

    #[wasm_bindgen(js_name = completeLike)]
    pub fn complete_like(&mut self, track_id: String, succeeded: bool) {
        if let Some(ticket) = self.like_tickets.remove(&track_id) {
            self.inner.complete_like(&ticket, succeeded);
            self.flush();
        }
    }

    #[wasm_bindgen(js_name = setLikedStatus)]
    pub fn set_liked_status(&mut self, track_id: &str, liked: bool) {
        self.inner.set_liked_status(track_id, liked);
        self.flush();
    }

    /// Start adding the current track to a playlist; returns
    /// `{ trackId, playlistId }` for the page to send
    #[wasm_bindgen(js_name = requestPlaylistAdd)]
    pub fn request_playlist_add(&mut self, playlist_id: &str) -> JsValue {
        let Some(ticket) = self.inner.request_playlist_add(playlist_id) else {
            return JsValue::NULL;
        };
        let payload = js_sys::Object::new();
        let _ = js_sys::Reflect::set(&payload, &"trackId".into(), &ticket.track_id.as_str().into());
        let _ = js_sys::Reflect::set(&payload, &"playlistId".into(), &ticket.playlist_id.as_str().into());
        self.playlist_ticket = Some(ticket);
        self.flush();
        payload.into()
    }

    #[wasm_bindgen(js_name = completePlaylistAdd)]
    pub fn complete_playlist_add(&mut self, succeeded: bool) {
        if let Some(ticket) = self.playlist_ticket.take() {
            self.inner.complete_playlist_add(&ticket, succeeded);
            self.flush();
        }
    }

    // ===== State =====

    #[wasm_bindgen(js_name = getState)]
    pub fn get_state(&self) -> String {
        self.inner.state().as_str().to_string()
    }

    #[wasm_bindgen(js_name = isChangingSong)]
    pub fn is_changing_song(&self) -> bool {
        self.inner.is_changing_song()
    }

    #[wasm_bindgen(js_name = getPosition)]
    pub fn get_position(&self) -> f64 {
        self.inner.position().as_secs_f64()
    }

    #[wasm_bindgen(js_name = getDuration)]
    pub fn get_duration(&self) -> Option<f64> {
        self.inner.duration().map(|d| d.as_secs_f64())
    }

    #[wasm_bindgen(js_name = getVolume)]
    pub fn get_volume(&self) -> f32 {
        self.inner.volume()
    }

    #[wasm_bindgen(js_name = isMuted)]
    pub fn is_muted(&self) -> bool {
        self.inner.is_muted()
    }

    #[wasm_bindgen(js_name = isLiked)]
    pub fn is_liked(&self) -> bool {
        self.inner.is_liked()
    }

    #[wasm_bindgen(js_name = getAddedToPlaylist)]
    pub fn get_added_to_playlist(&self) -> Option<String> {
        self.inner.added_to_playlist().map(str::to_owned)
    }

    #[wasm_bindgen(js_name = getCurrentTrack)]
    pub fn get_current_track(&self) -> JsValue {
        self.inner
            .current_track()
            .map(WasmTrack::from)
            .and_then(|t| serde_wasm_bindgen::to_value(&t).ok())
            .unwrap_or(JsValue::NULL)
    }

    #[wasm_bindgen(js_name = getCurrentIndex)]
    pub fn get_current_index(&self) -> Option<usize> {
        self.inner.current_index()
    }

    // ===== Event Listeners =====

    /// Register the event callback; receives one event object per call
    #[wasm_bindgen(js_name = onEvent)]
    pub fn on_event(&mut self, callback: Function) {
        self.on_event = Some(callback);
    }

    // ===== Internal =====

    fn notify(&mut self, generation: f64, report: impl FnOnce(&crate::SoundNotifier)) {
        let notifier = self.notifiers.borrow().get(&(generation as u64)).cloned();
        if let Some(notifier) = notifier {
            report(&notifier);
        }
        self.inner.pump();
        self.flush();
    }

    fn flush(&mut self) {
        let events = self.inner.drain_events();
        let Some(callback) = self.on_event.as_ref() else {
            return;
        };
        for event in events {
            if let Ok(value) = serde_wasm_bindgen::to_value(&event) {
                callback.call1(&JsValue::NULL, &value).ok();
            }
        }
    }
}
