//! Host adapters backed by a JavaScript object
//!
//! The page passes one object implementing:
//!
//! ```text
//! loadSound(generation, resource, volume) -> sound
//! requestFrame() -> id
//! cancelFrame(id)
//! capturePointer(surface, pointerId)
//! releasePointer(surface, pointerId)
//! now() -> milliseconds
//! ```
//!
//! and each `sound` implements `play()`, `pause()`, `seek(secs)`,
//! `position() -> secs`, `duration() -> secs | null`, `setVolume(v)`,
//! `fadeOut(ms) -> bool` and `unload()`.

use crate::drag::{DragSurface, PointerCapture};
use crate::error::{PlaybackError, Result};
use crate::fade::FadeCurve;
use crate::frame::{Clock, FrameRequest, FrameScheduler};
use crate::sound::{FadeStart, LoadRequest, Sound, SoundBackend, SoundNotifier};
use js_sys::{Array, Function, Reflect};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

/// Notifiers of live sounds, keyed by raw generation
pub(crate) type NotifierRegistry = Rc<RefCell<HashMap<u64, SoundNotifier>>>;

fn call(target: &JsValue, method: &str, args: &[JsValue]) -> std::result::Result<JsValue, JsValue> {
    let func: Function = Reflect::get(target, &JsValue::from_str(method))?.dyn_into()?;
    let args: Array = args.iter().collect();
    func.apply(target, &args)
}

fn backend_error(method: &str, err: JsValue) -> PlaybackError {
    let message = err
        .as_string()
        .or_else(|| err.dyn_ref::<js_sys::Error>().map(|e| String::from(e.message())))
        .unwrap_or_else(|| format!("{err:?}"));
    PlaybackError::Backend(format!("{method}: {message}"))
}

fn surface_name(surface: DragSurface) -> &'static str {
    match surface {
        DragSurface::Seek => "seek",
        DragSurface::Volume => "volume",
    }
}

/// Sound backend calling `host.loadSound`
pub struct JsSoundBackend {
    host: JsValue,
    notifiers: NotifierRegistry,
}

impl JsSoundBackend {
    pub(crate) fn new(host: JsValue, notifiers: NotifierRegistry) -> Self {
        Self { host, notifiers }
    }
}

impl SoundBackend for JsSoundBackend {
    fn load(&mut self, request: LoadRequest) -> Result<Box<dyn Sound>> {
        let generation = request.generation.get();
        let sound = call(
            &self.host,
            "loadSound",
            &[
                JsValue::from_f64(generation as f64),
                JsValue::from_str(&request.resource),
                JsValue::from_f64(f64::from(request.volume)),
            ],
        )
        .map_err(|e| backend_error("loadSound", e))?;

        self.notifiers
            .borrow_mut()
            .insert(generation, request.notifier);

        Ok(Box::new(JsSound {
            sound,
            generation,
            notifiers: Rc::clone(&self.notifiers),
        }))
    }
}

struct JsSound {
    sound: JsValue,
    generation: u64,
    notifiers: NotifierRegistry,
}

impl JsSound {
    fn invoke(&self, method: &str, args: &[JsValue]) -> Result<JsValue> {
        call(&self.sound, method, args).map_err(|e| backend_error(method, e))
    }
}

impl Sound for JsSound {
    fn play(&mut self) -> Result<()> {
        self.invoke("play", &[]).map(|_| ())
    }

    fn pause(&mut self) -> Result<()> {
        self.invoke("pause", &[]).map(|_| ())
    }

    fn seek(&mut self, position: Duration) -> Result<()> {
        self.invoke("seek", &[JsValue::from_f64(position.as_secs_f64())])
            .map(|_| ())
    }

    fn position(&self) -> Duration {
        self.invoke("position", &[])
            .ok()
            .and_then(|v| v.as_f64())
            .filter(|v| v.is_finite() && *v >= 0.0)
            .map_or(Duration::ZERO, Duration::from_secs_f64)
    }

    fn duration(&self) -> Option<Duration> {
        self.invoke("duration", &[])
            .ok()
            .and_then(|v| v.as_f64())
            .filter(|v| v.is_finite() && *v >= 0.0)
            .map(Duration::from_secs_f64)
    }

    fn set_volume(&mut self, volume: f32) {
        if let Err(e) = self.invoke("setVolume", &[JsValue::from_f64(f64::from(volume))]) {
            tracing::warn!(error = %e, "setVolume failed");
        }
    }

    fn fade_out(&mut self, duration: Duration, _curve: FadeCurve) -> Result<FadeStart> {
        let started = self.invoke("fadeOut", &[JsValue::from_f64(duration.as_millis() as f64)])?;
        if started.as_bool().unwrap_or(false) {
            Ok(FadeStart::Started)
        } else {
            Ok(FadeStart::Immediate)
        }
    }

    fn unload(&mut self) {
        self.notifiers.borrow_mut().remove(&self.generation);
        if let Err(e) = self.invoke("unload", &[]) {
            tracing::warn!(error = %e, "unload failed");
        }
    }
}

/// Frame scheduler calling `host.requestFrame` / `host.cancelFrame`
pub struct JsFrames {
    host: JsValue,
}

impl JsFrames {
    pub(crate) fn new(host: JsValue) -> Self {
        Self { host }
    }
}

impl FrameScheduler for JsFrames {
    fn request_frame(&mut self) -> FrameRequest {
        let id = call(&self.host, "requestFrame", &[])
            .ok()
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0);
        FrameRequest(id as u64)
    }

    fn cancel_frame(&mut self, request: FrameRequest) {
        let _ = call(&self.host, "cancelFrame", &[JsValue::from_f64(request.0 as f64)]);
    }
}

/// Pointer capture calling `host.capturePointer` / `host.releasePointer`
pub struct JsCapture {
    host: JsValue,
}

impl JsCapture {
    pub(crate) fn new(host: JsValue) -> Self {
        Self { host }
    }
}

impl PointerCapture for JsCapture {
    fn capture(&mut self, surface: DragSurface, pointer_id: u32) {
        let _ = call(
            &self.host,
            "capturePointer",
            &[JsValue::from_str(surface_name(surface)), JsValue::from(pointer_id)],
        );
    }

    fn release(&mut self, surface: DragSurface, pointer_id: u32) {
        let _ = call(
            &self.host,
            "releasePointer",
            &[JsValue::from_str(surface_name(surface)), JsValue::from(pointer_id)],
        );
    }
}

/// Clock calling `host.now()` (milliseconds)
pub struct JsClock {
    host: JsValue,
}

impl JsClock {
    pub(crate) fn new(host: JsValue) -> Self {
        Self { host }
    }
}

impl Clock for JsClock {
    fn now(&self) -> Duration {
        call(&self.host, "now", &[])
            .ok()
            .and_then(|v| v.as_f64())
            .filter(|v| v.is_finite() && *v >= 0.0)
            .map_or(Duration::ZERO, |ms| Duration::from_secs_f64(ms / 1000.0))
    }
}
