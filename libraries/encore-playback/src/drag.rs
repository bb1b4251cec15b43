//! Drag sessions over the seek bar and the volume bar
//!
//! A drag starts on pointer-down, follows pointer moves, and ends on
//! pointer-up or when the host loses the pointer capture. While open, the
//! drag holds a [`CaptureGuard`]; dropping the guard releases the capture, so
//! every way a drag can end (including the session being dropped) gives the
//! pointer back to the host.

use std::cell::RefCell;
use std::rc::Rc;

/// Pointer position reported by the host
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    /// Host pointer id
    pub pointer_id: u32,
    /// Horizontal position in the same coordinate space as [`ControlExtent`]
    pub x: f64,
}

impl PointerEvent {
    /// Pointer `pointer_id` at `x`
    pub fn new(pointer_id: u32, x: f64) -> Self {
        Self { pointer_id, x }
    }
}

/// Horizontal bounds of a bar control
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlExtent {
    /// Left edge
    pub left: f64,
    /// Width
    pub width: f64,
}

impl ControlExtent {
    /// Control spanning `left..left + width`
    pub fn new(left: f64, width: f64) -> Self {
        Self { left, width }
    }

    /// Fraction of the control at `x`, clamped to `[0, 1]`
    pub fn fraction_at(&self, x: f64) -> f64 {
        if self.width <= 0.0 || !self.width.is_finite() || x.is_nan() {
            return 0.0;
        }
        (x - self.left).clamp(0.0, self.width) / self.width
    }
}

/// Which bar a drag belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DragSurface {
    /// Progress bar: commits a seek on release
    Seek,
    /// Volume bar: commits on every move
    Volume,
}

/// Host pointer-capture primitive
pub trait PointerCapture {
    /// Route all further events of `pointer_id` to `surface`
    fn capture(&mut self, surface: DragSurface, pointer_id: u32);

    /// Stop routing `pointer_id` to `surface`
    fn release(&mut self, surface: DragSurface, pointer_id: u32);
}

/// Capture that does nothing, for hosts without pointer capture
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCapture;

impl PointerCapture for NoCapture {
    fn capture(&mut self, _surface: DragSurface, _pointer_id: u32) {}

    fn release(&mut self, _surface: DragSurface, _pointer_id: u32) {}
}

/// Shared handle to the host capture
pub type SharedCapture = Rc<RefCell<dyn PointerCapture>>;

/// Releases a pointer capture when dropped
pub struct CaptureGuard {
    capture: SharedCapture,
    surface: DragSurface,
    pointer_id: u32,
}

impl CaptureGuard {
    /// Capture `pointer_id` for `surface`
    pub fn acquire(capture: &SharedCapture, surface: DragSurface, pointer_id: u32) -> Self {
        capture.borrow_mut().capture(surface, pointer_id);
        Self {
            capture: Rc::clone(capture),
            surface,
            pointer_id,
        }
    }
}

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        match self.capture.try_borrow_mut() {
            Ok(mut capture) => capture.release(self.surface, self.pointer_id),
            Err(_) => {
                tracing::warn!(surface = ?self.surface, pointer_id = self.pointer_id, "pointer capture busy, release skipped");
            }
        }
    }
}

/// Provisional value while a drag is open
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragUpdate {
    /// Surface being dragged
    pub surface: DragSurface,
    /// Fraction of the bar under the pointer
    pub fraction: f64,
}

struct DragSession {
    pointer_id: u32,
    extent: ControlExtent,
    fraction: f64,
    _guard: CaptureGuard,
}

/// Open drags on the two bars
pub struct DragController {
    capture: SharedCapture,
    seek: Option<DragSession>,
    volume: Option<DragSession>,
}

impl DragController {
    /// Controller using the host capture
    pub fn new(capture: SharedCapture) -> Self {
        Self {
            capture,
            seek: None,
            volume: None,
        }
    }

    /// Open a drag; an open drag on the same surface is replaced
    pub fn start(
        &mut self,
        surface: DragSurface,
        event: PointerEvent,
        extent: ControlExtent,
    ) -> DragUpdate {
        // Drop the old guard before capturing again
        *self.slot(surface) = None;

        let fraction = extent.fraction_at(event.x);
        let guard = CaptureGuard::acquire(&self.capture, surface, event.pointer_id);
        *self.slot(surface) = Some(DragSession {
            pointer_id: event.pointer_id,
            extent,
            fraction,
            _guard: guard,
        });
        DragUpdate { surface, fraction }
    }

    /// Follow a pointer move; `None` if no drag on `surface` owns the pointer
    pub fn update(&mut self, surface: DragSurface, event: PointerEvent) -> Option<DragUpdate> {
        let session = self.slot(surface).as_mut()?;
        if session.pointer_id != event.pointer_id {
            return None;
        }
        session.fraction = session.extent.fraction_at(event.x);
        Some(DragUpdate {
            surface,
            fraction: session.fraction,
        })
    }

    /// Close a drag on pointer-up, returning the final value
    pub fn finish(&mut self, surface: DragSurface, event: PointerEvent) -> Option<DragUpdate> {
        let update = self.update(surface, event)?;
        *self.slot(surface) = None;
        Some(update)
    }

    /// Close a drag without a final value; true if one was open
    pub fn cancel(&mut self, surface: DragSurface) -> bool {
        self.slot(surface).take().is_some()
    }

    /// Close both drags
    pub fn cancel_all(&mut self) {
        self.seek = None;
        self.volume = None;
    }

    /// Whether a drag is open on `surface`
    pub fn is_open(&self, surface: DragSurface) -> bool {
        match surface {
            DragSurface::Seek => self.seek.is_some(),
            DragSurface::Volume => self.volume.is_some(),
        }
    }

    /// Provisional fraction of an open drag
    pub fn provisional(&self, surface: DragSurface) -> Option<f64> {
        let session = match surface {
            DragSurface::Seek => self.seek.as_ref(),
            DragSurface::Volume => self.volume.as_ref(),
        };
        session.map(|s| s.fraction)
    }

    fn slot(&mut self, surface: DragSurface) -> &mut Option<DragSession> {
        match surface {
            DragSurface::Seek => &mut self.seek,
            DragSurface::Volume => &mut self.volume,
        }
    }
}
