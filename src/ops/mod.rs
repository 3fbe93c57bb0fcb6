pub mod composite;
pub mod gradient;
pub mod pattern;
pub mod shapes;
pub mod stroke;
pub mod symmetry;
pub mod text;

use image::Rgba;

use crate::canvas::LiveCanvas;

/// Half-open pixel rectangle `[x0, x1) × [y0, y1)` inside the canvas.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl PixelRect {
    /// Pixel rect covering the float bounds, clamped to `canvas_w × canvas_h`.
    /// `None` when nothing of it lands on the canvas.
    pub fn from_bounds(
        min_x: f32,
        min_y: f32,
        max_x: f32,
        max_y: f32,
        canvas_w: u32,
        canvas_h: u32,
    ) -> Option<Self> {
        if !(min_x.is_finite() && min_y.is_finite() && max_x.is_finite() && max_y.is_finite()) {
            return None;
        }
        let x0 = (min_x.floor() as i64).clamp(0, canvas_w as i64) as u32;
        let y0 = (min_y.floor() as i64).clamp(0, canvas_h as i64) as u32;
        let x1 = (max_x.ceil() as i64).clamp(0, canvas_w as i64) as u32;
        let y1 = (max_y.ceil() as i64).clamp(0, canvas_h as i64) as u32;
        if x0 >= x1 || y0 >= y1 {
            None
        } else {
            Some(Self { x0, y0, x1, y1 })
        }
    }

    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x0: 0,
            y0: 0,
            x1: width,
            y1: height,
        }
    }

    pub fn width(&self) -> u32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> u32 {
        self.y1 - self.y0
    }

    pub fn union(&self, other: &PixelRect) -> PixelRect {
        PixelRect {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x0 && x < self.x1 && y >= self.y0 && y < self.y1
    }
}

/// Grow an optional dirty rect by another.
pub fn merge_rect(acc: Option<PixelRect>, add: Option<PixelRect>) -> Option<PixelRect> {
    match (acc, add) {
        (Some(a), Some(b)) => Some(a.union(&b)),
        (a, b) => a.or(b),
    }
}

/// Per-pixel paint coverage (0..1) over a rectangle of the canvas.
#[derive(Clone, Debug)]
pub struct CoverageMask {
    pub rect: PixelRect,
    /// Row-major, `rect.width() * rect.height()` entries.
    pub coverage: Vec<f32>,
}

impl CoverageMask {
    pub fn new(rect: PixelRect) -> Self {
        Self {
            rect,
            coverage: vec![0.0; rect.width() as usize * rect.height() as usize],
        }
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> f32 {
        if !self.rect.contains(x, y) {
            return 0.0;
        }
        let idx = (y - self.rect.y0) as usize * self.rect.width() as usize
            + (x - self.rect.x0) as usize;
        self.coverage[idx]
    }

    /// Composite `color` through this mask onto the live canvas using its
    /// current composite op.
    pub fn paint(&self, canvas: &mut LiveCanvas, color: Rgba<u8>, opacity: f32) {
        let op = canvas.composite_op();
        let r = self.rect;
        let w = r.width() as usize;
        let coverage = &self.coverage;
        canvas.pixels_mut().modify_region(r.x0, r.y0, r.x1, r.y1, true, |x, y, px| {
            let cov = coverage[(y - r.y0) as usize * w + (x - r.x0) as usize];
            if cov > 0.001 {
                LiveCanvas::apply(px, op, color, cov * opacity);
            }
        });
    }
}

// ============================================================================
// SHARED RASTER MATH
// ============================================================================

/// Smoothstep between edge0 and edge1.
#[inline]
pub(crate) fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Coverage of a pixel whose centre lies at signed distance `d` from an
/// edge (negative = inside), with a one-pixel anti-aliased rim.
#[inline]
pub(crate) fn edge_coverage(d: f32) -> f32 {
    smoothstep(0.5, -0.5, d)
}

/// Distance from a point to a line segment.  A zero-length segment is a point.
#[inline]
pub(crate) fn sdf_line_segment(px: f32, py: f32, ax: f32, ay: f32, bx: f32, by: f32) -> f32 {
    let dx = bx - ax;
    let dy = by - ay;
    let len_sq = dx * dx + dy * dy;
    let t = if len_sq > f32::EPSILON {
        (((px - ax) * dx + (py - ay) * dy) / len_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let cx = ax + t * dx;
    let cy = ay + t * dy;
    ((px - cx) * (px - cx) + (py - cy) * (py - cy)).sqrt()
}
