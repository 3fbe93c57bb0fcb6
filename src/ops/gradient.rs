use image::Rgba;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::canvas::{blend_over, LiveCanvas};

// ============================================================================
// GRADIENT FILL
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GradientKind {
    #[default]
    Linear,
    Radial,
    Conic,
}

/// A single color stop in the gradient.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GradientStop {
    /// Position along the gradient, 0.0 = start, 1.0 = end
    pub position: f32,
    /// RGBA color (un-premultiplied)
    pub color: [u8; 4],
}

impl GradientStop {
    pub fn new(position: f32, color: [u8; 4]) -> Self {
        Self { position, color }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradientSettings {
    #[serde(rename = "type")]
    pub kind: GradientKind,
    pub stops: Vec<GradientStop>,
    /// Degrees.  Direction of a zero-length drag; start offset for conic.
    pub angle: f32,
    pub opacity: f32,
}

impl Default for GradientSettings {
    fn default() -> Self {
        Self {
            kind: GradientKind::Linear,
            stops: vec![
                GradientStop::new(0.0, [0, 0, 0, 255]),
                GradientStop::new(1.0, [255, 255, 255, 255]),
            ],
            angle: 0.0,
            opacity: 1.0,
        }
    }
}

/// Pre-computed 256-entry RGBA lookup table.
pub struct GradientLut {
    lut: Vec<u8>,
}

impl GradientLut {
    /// Build the table from stops (sorted by position, linearly
    /// interpolated in unpremultiplied RGBA).
    pub fn build(stops: &[GradientStop]) -> Self {
        let mut lut = vec![0u8; 256 * 4];
        if stops.is_empty() {
            return Self { lut };
        }
        let mut sorted: Vec<(f32, [u8; 4])> = stops.iter().map(|s| (s.position, s.color)).collect();
        sorted.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        let first = sorted[0];
        let last = sorted[sorted.len() - 1];

        for (i, px) in lut.chunks_exact_mut(4).enumerate() {
            let t = i as f32 / 255.0;
            let c = if t <= first.0 {
                first.1
            } else if t >= last.0 {
                last.1
            } else {
                // Find the two surrounding stops
                let (left, right) = sorted
                    .windows(2)
                    .find(|w| w[0].0 <= t && w[1].0 >= t)
                    .map(|w| (w[0], w[1]))
                    .unwrap_or((first, last));
                let span = right.0 - left.0;
                let local_t = if span > 0.0 { (t - left.0) / span } else { 0.0 };
                let inv = 1.0 - local_t;
                let mut c = [0u8; 4];
                for ch in 0..4 {
                    c[ch] = (left.1[ch] as f32 * inv + right.1[ch] as f32 * local_t).round() as u8;
                }
                c
            };
            px.copy_from_slice(&c);
        }
        Self { lut }
    }

    /// Sample at position t (0.0..1.0 clamped).
    #[inline(always)]
    pub fn sample(&self, t: f32) -> [u8; 4] {
        let idx = (t.clamp(0.0, 1.0) * 255.0).round() as usize;
        let off = idx * 4;
        [
            self.lut[off],
            self.lut[off + 1],
            self.lut[off + 2],
            self.lut[off + 3],
        ]
    }
}

/// Resolved gradient geometry for one frame.
#[derive(Clone, Copy, Debug)]
struct GradientGeometry {
    kind: GradientKind,
    ax: f32,
    ay: f32,
    dx: f32,
    dy: f32,
    len_sq: f32,
    angle_rad: f32,
}

impl GradientGeometry {
    fn new(
        settings: &GradientSettings,
        anchor: (f32, f32),
        current: (f32, f32),
        canvas_w: u32,
        canvas_h: u32,
    ) -> Self {
        let angle_rad = settings.angle.to_radians();
        let mut dx = current.0 - anchor.0;
        let mut dy = current.1 - anchor.1;
        let mut len_sq = dx * dx + dy * dy;
        if len_sq < 1e-6 {
            // No drag: follow the angle setting across the whole canvas
            let diag = ((canvas_w as f32).powi(2) + (canvas_h as f32).powi(2)).sqrt().max(1.0);
            dx = angle_rad.cos() * diag;
            dy = angle_rad.sin() * diag;
            len_sq = diag * diag;
        }
        Self {
            kind: settings.kind,
            ax: anchor.0,
            ay: anchor.1,
            dx,
            dy,
            len_sq,
            angle_rad,
        }
    }

    /// Gradient parameter `t` for a pixel centre.
    #[inline(always)]
    fn compute_t(&self, px: f32, py: f32) -> f32 {
        let rx = px - self.ax;
        let ry = py - self.ay;
        match self.kind {
            GradientKind::Linear => ((rx * self.dx + ry * self.dy) / self.len_sq).clamp(0.0, 1.0),
            GradientKind::Radial => {
                ((rx * rx + ry * ry).sqrt() / self.len_sq.sqrt()).clamp(0.0, 1.0)
            }
            GradientKind::Conic => {
                let a = ry.atan2(rx) - self.angle_rad;
                a.rem_euclid(std::f32::consts::TAU) / std::f32::consts::TAU
            }
        }
    }
}

/// Render the gradient for a drag into a full-canvas RGBA buffer.
pub fn render_gradient(
    settings: &GradientSettings,
    anchor: (f32, f32),
    current: (f32, f32),
    canvas_w: u32,
    canvas_h: u32,
) -> Vec<u8> {
    let lut = GradientLut::build(&settings.stops);
    let geo = GradientGeometry::new(settings, anchor, current, canvas_w, canvas_h);
    let row_bytes = canvas_w as usize * 4;
    let mut buf = vec![0u8; row_bytes * canvas_h as usize];
    buf.par_chunks_mut(row_bytes)
        .enumerate()
        .for_each(|(y, row)| {
            let py = y as f32 + 0.5;
            for (x, px) in row.chunks_exact_mut(4).enumerate() {
                let t = geo.compute_t(x as f32 + 0.5, py);
                px.copy_from_slice(&lut.sample(t));
            }
        });
    buf
}

/// Fill the whole live canvas with the gradient, blended source-over at
/// the configured opacity.
pub fn paint_gradient(
    canvas: &mut LiveCanvas,
    settings: &GradientSettings,
    anchor: (f32, f32),
    current: (f32, f32),
) {
    let (w, h) = (canvas.width(), canvas.height());
    let buf = render_gradient(settings, anchor, current, w, h);
    let opacity = settings.opacity.clamp(0.0, 1.0);
    let stride = w as usize * 4;
    canvas.pixels_mut().modify_region(0, 0, w, h, true, |x, y, px| {
        let off = y as usize * stride + x as usize * 4;
        let top = Rgba([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]]);
        *px = blend_over(*px, top, opacity);
    });
}
