use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::ops::symmetry::MirrorTransform;
use crate::ops::{edge_coverage, CoverageMask, PixelRect};

/// Available shape primitives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    #[default]
    Rectangle,
    Circle,
}

/// A shape placed on the canvas, described by its centre and half-extents.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlacedShape {
    pub kind: ShapeKind,
    pub cx: f32,
    pub cy: f32,
    pub hw: f32,
    pub hh: f32,
    /// Radians, around the centre.
    pub rotation: f32,
    pub outline_width: f32,
}

impl PlacedShape {
    /// Shape for a drag from `anchor` to `current`.
    ///
    /// Rectangle: bounding box of the two points.  Circle: centred on the
    /// anchor with the drag distance as radius.
    pub fn from_drag(
        kind: ShapeKind,
        anchor: (f32, f32),
        current: (f32, f32),
        outline_width: f32,
    ) -> Self {
        match kind {
            ShapeKind::Rectangle => Self {
                kind,
                cx: (anchor.0 + current.0) * 0.5,
                cy: (anchor.1 + current.1) * 0.5,
                hw: (current.0 - anchor.0).abs() * 0.5,
                hh: (current.1 - anchor.1).abs() * 0.5,
                rotation: 0.0,
                outline_width,
            },
            ShapeKind::Circle => {
                let r = ((current.0 - anchor.0).powi(2) + (current.1 - anchor.1).powi(2)).sqrt();
                Self {
                    kind,
                    cx: anchor.0,
                    cy: anchor.1,
                    hw: r,
                    hh: r,
                    rotation: 0.0,
                    outline_width,
                }
            }
        }
    }

    /// The same shape carried through a symmetry copy.
    pub fn transformed(&self, t: &MirrorTransform) -> Self {
        let (cx, cy) = t.apply(self.cx, self.cy);
        Self {
            cx,
            cy,
            rotation: self.rotation + t.rotation(),
            ..*self
        }
    }
}

// ============================================================================
// SDF functions: return signed distance (negative = inside)
// ============================================================================

/// SDF for a box centred at origin with half-extents (hx, hy).
#[inline]
fn sdf_box(px: f32, py: f32, hx: f32, hy: f32) -> f32 {
    let dx = px.abs() - hx;
    let dy = py.abs() - hy;
    let outside = (dx.max(0.0) * dx.max(0.0) + dy.max(0.0) * dy.max(0.0)).sqrt();
    let inside = dx.max(dy).min(0.0);
    outside + inside
}

#[inline]
fn sdf_circle(px: f32, py: f32, r: f32) -> f32 {
    (px * px + py * py).sqrt() - r
}

pub fn shape_sdf(kind: ShapeKind, px: f32, py: f32, hx: f32, hy: f32) -> f32 {
    match kind {
        ShapeKind::Rectangle => sdf_box(px, py, hx, hy),
        ShapeKind::Circle => sdf_circle(px, py, hx),
    }
}

/// Rasterize a shape outline (stroke of `outline_width` centred on the
/// boundary) into a coverage mask clipped to the canvas.
pub fn rasterize_shape(placed: &PlacedShape, canvas_w: u32, canvas_h: u32) -> Option<CoverageMask> {
    // Axis-aligned bounding box that contains the rotated shape
    let cos_r = placed.rotation.cos();
    let sin_r = placed.rotation.sin();
    let corners = [
        (-placed.hw, -placed.hh),
        (placed.hw, -placed.hh),
        (placed.hw, placed.hh),
        (-placed.hw, placed.hh),
    ];
    let mut min_x = f32::MAX;
    let mut min_y = f32::MAX;
    let mut max_x = f32::MIN;
    let mut max_y = f32::MIN;
    for (cx, cy) in &corners {
        let rx = cx * cos_r - cy * sin_r + placed.cx;
        let ry = cx * sin_r + cy * cos_r + placed.cy;
        min_x = min_x.min(rx);
        min_y = min_y.min(ry);
        max_x = max_x.max(rx);
        max_y = max_y.max(ry);
    }
    // Padding for outline width + AA
    let pad = placed.outline_width * 0.5 + 2.0;
    let rect = PixelRect::from_bounds(
        min_x - pad,
        min_y - pad,
        max_x + pad,
        max_y + pad,
        canvas_w,
        canvas_h,
    )?;

    let mut mask = CoverageMask::new(rect);
    let row_len = rect.width() as usize;

    // inverse rotation = transpose for rotation matrices
    let inv_cos = cos_r;
    let inv_sin = -sin_r;
    let outline_half = (placed.outline_width * 0.5).max(0.5);
    let PlacedShape {
        kind, cx, cy, hw, hh, ..
    } = *placed;

    mask.coverage
        .par_chunks_mut(row_len)
        .enumerate()
        .for_each(|(row, row_buf)| {
            let py_canvas = (rect.y0 + row as u32) as f32 + 0.5;
            for (col, out) in row_buf.iter_mut().enumerate() {
                let px_canvas = (rect.x0 + col as u32) as f32 + 0.5;

                // Shape-local coordinates (inverse rotate around center)
                let dx = px_canvas - cx;
                let dy = py_canvas - cy;
                let lx = dx * inv_cos - dy * inv_sin;
                let ly = dx * inv_sin + dy * inv_cos;

                let d = shape_sdf(kind, lx, ly, hw, hh);
                let band = d.abs() - outline_half;
                let cov = edge_coverage(band);
                if cov > 0.001 {
                    *out = cov;
                }
            }
        });

    Some(mask)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::symmetry::{SymmetryAxis, SymmetryKind, SymmetrySettings};

    #[test]
    fn rectangle_from_drag_is_bounding_box() {
        let s = PlacedShape::from_drag(ShapeKind::Rectangle, (30.0, 10.0), (10.0, 50.0), 2.0);
        assert_eq!((s.cx, s.cy, s.hw, s.hh), (20.0, 30.0, 10.0, 20.0));
    }

    #[test]
    fn circle_radius_is_drag_distance() {
        let s = PlacedShape::from_drag(ShapeKind::Circle, (50.0, 50.0), (53.0, 54.0), 2.0);
        assert_eq!((s.cx, s.cy, s.hw), (50.0, 50.0, 5.0));
    }

    #[test]
    fn outline_leaves_interior_untouched() {
        let s = PlacedShape::from_drag(ShapeKind::Rectangle, (10.0, 10.0), (50.0, 50.0), 4.0);
        let mask = rasterize_shape(&s, 64, 64).unwrap();
        assert_eq!(mask.get(30, 30), 0.0);
        assert_eq!(mask.get(10, 30), 1.0);
        assert_eq!(mask.get(30, 49), 1.0);
        assert_eq!(mask.get(5, 5), 0.0);
    }

    #[test]
    fn circle_ring_at_radius() {
        let s = PlacedShape::from_drag(ShapeKind::Circle, (32.0, 32.0), (52.0, 32.0), 3.0);
        let mask = rasterize_shape(&s, 64, 64).unwrap();
        assert_eq!(mask.get(51, 32), 1.0);
        assert_eq!(mask.get(32, 32), 0.0);
    }

    #[test]
    fn mirrored_rectangle_moves_its_centre() {
        let sym = SymmetrySettings {
            kind: SymmetryKind::Horizontal,
            fold_count: 2,
            axis: SymmetryAxis { x: 50.0, y: 0.0 },
        };
        let s = PlacedShape::from_drag(ShapeKind::Rectangle, (10.0, 10.0), (20.0, 30.0), 1.0);
        let t = sym.transforms()[0];
        let m = s.transformed(&t);
        assert_eq!((m.cx, m.cy, m.hw, m.hh, m.rotation), (85.0, 20.0, 5.0, 10.0, 0.0));
    }

    #[test]
    fn shape_entirely_off_canvas_yields_nothing() {
        let s = PlacedShape::from_drag(ShapeKind::Circle, (-100.0, -100.0), (-90.0, -100.0), 2.0);
        assert!(rasterize_shape(&s, 64, 64).is_none());
    }
}
