// ============================================================================
// CANVAS SURFACE – viewport → canvas coordinate mapping and gesture tracking
// ============================================================================

use serde::{Deserialize, Serialize};

/// On-screen rectangle the canvas is rendered into (CSS pixels).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViewportRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl ViewportRect {
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }
}

/// Raw pointer input in viewport coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PointerEvent {
    Down { x: f32, y: f32 },
    Move { x: f32, y: f32 },
    Up,
    Leave,
}

/// Why a gesture ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EndReason {
    Up,
    Leave,
    /// A structural action (undo, tool switch, layer switch...) cut it short.
    Interrupted,
}

/// Gesture signal in logical canvas coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Gesture {
    Start { x: f32, y: f32 },
    Move { x: f32, y: f32 },
    End { reason: EndReason },
}

/// Maps pointer events onto the canvas backing store and turns the raw
/// down/move/up/leave stream into start/move/end gestures.
///
/// Coordinates are not clamped: a drag that wanders off the canvas keeps
/// reporting out-of-range positions until it ends.
#[derive(Clone, Debug)]
pub struct CanvasSurface {
    rect: ViewportRect,
    canvas_width: u32,
    canvas_height: u32,
    pressed: bool,
}

impl CanvasSurface {
    /// A surface whose viewport rect matches the backing resolution 1:1.
    pub fn new(canvas_width: u32, canvas_height: u32) -> Self {
        Self {
            rect: ViewportRect::new(0.0, 0.0, canvas_width as f32, canvas_height as f32),
            canvas_width,
            canvas_height,
            pressed: false,
        }
    }

    pub fn set_viewport(&mut self, rect: ViewportRect) {
        self.rect = rect;
    }

    pub fn viewport(&self) -> ViewportRect {
        self.rect
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    /// Viewport point → canvas pixel space.  A degenerate rect (zero or
    /// negative size) maps with scale 1 rather than producing NaN.
    pub fn to_canvas(&self, client_x: f32, client_y: f32) -> (f32, f32) {
        let sx = if self.rect.width > 0.0 {
            self.canvas_width as f32 / self.rect.width
        } else {
            1.0
        };
        let sy = if self.rect.height > 0.0 {
            self.canvas_height as f32 / self.rect.height
        } else {
            1.0
        };
        (
            (client_x - self.rect.left) * sx,
            (client_y - self.rect.top) * sy,
        )
    }

    /// Feed one pointer event.  Returns the gesture signal it produces, if any.
    ///
    /// `leave` while pressed ends the gesture exactly like `up`; `leave` or
    /// `move` with no button down (hover) produce nothing.
    pub fn handle(&mut self, event: PointerEvent) -> Option<Gesture> {
        match event {
            PointerEvent::Down { x, y } => {
                let (cx, cy) = self.to_canvas(x, y);
                if !cx.is_finite() || !cy.is_finite() {
                    log::warn!("CanvasSurface: dropped non-finite pointer down");
                    return None;
                }
                self.pressed = true;
                Some(Gesture::Start { x: cx, y: cy })
            }
            PointerEvent::Move { x, y } => {
                if !self.pressed {
                    return None;
                }
                let (cx, cy) = self.to_canvas(x, y);
                if !cx.is_finite() || !cy.is_finite() {
                    return None;
                }
                Some(Gesture::Move { x: cx, y: cy })
            }
            PointerEvent::Up => self.end(EndReason::Up),
            PointerEvent::Leave => self.end(EndReason::Leave),
        }
    }

    /// Force the current gesture (if any) to end.
    pub fn interrupt(&mut self) -> Option<Gesture> {
        self.end(EndReason::Interrupted)
    }

    fn end(&mut self, reason: EndReason) -> Option<Gesture> {
        if !self.pressed {
            return None;
        }
        self.pressed = false;
        Some(Gesture::End { reason })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_through_css_scaling() {
        let mut surface = CanvasSurface::new(800, 800);
        surface.set_viewport(ViewportRect::new(10.0, 20.0, 400.0, 200.0));
        assert_eq!(surface.to_canvas(10.0, 20.0), (0.0, 0.0));
        assert_eq!(surface.to_canvas(210.0, 120.0), (400.0, 400.0));
        // off-canvas positions pass through unclamped
        assert_eq!(surface.to_canvas(0.0, 0.0), (-20.0, -80.0));
    }

    #[test]
    fn degenerate_viewport_uses_unit_scale() {
        let mut surface = CanvasSurface::new(100, 100);
        surface.set_viewport(ViewportRect::new(5.0, 5.0, 0.0, -3.0));
        assert_eq!(surface.to_canvas(15.0, 25.0), (10.0, 20.0));
    }

    #[test]
    fn leave_ends_a_pressed_gesture_like_up() {
        let mut surface = CanvasSurface::new(100, 100);
        assert_eq!(
            surface.handle(PointerEvent::Down { x: 1.0, y: 2.0 }),
            Some(Gesture::Start { x: 1.0, y: 2.0 })
        );
        assert_eq!(
            surface.handle(PointerEvent::Leave),
            Some(Gesture::End { reason: EndReason::Leave })
        );
        // the gesture is over; a trailing up is ignored
        assert_eq!(surface.handle(PointerEvent::Up), None);
    }

    #[test]
    fn hover_produces_nothing() {
        let mut surface = CanvasSurface::new(100, 100);
        assert_eq!(surface.handle(PointerEvent::Move { x: 3.0, y: 3.0 }), None);
        assert_eq!(surface.handle(PointerEvent::Leave), None);
        assert_eq!(surface.interrupt(), None);
    }
}
