use image::Rgba;
use serde::{Deserialize, Serialize};

// ============================================================================
// PROCEDURAL PATTERNS – canvas-anchored, so tiles line up across strokes
// ============================================================================

/// Cell size in pixels at `scale == 1.0`.
const BASE_CELL: f32 = 8.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternKind {
    #[default]
    Wood,
    Stone,
    Fabric,
    Brick,
    Dots,
    Stripes,
}

impl PatternKind {
    pub fn all() -> &'static [PatternKind] {
        &[
            PatternKind::Wood,
            PatternKind::Stone,
            PatternKind::Fabric,
            PatternKind::Brick,
            PatternKind::Dots,
            PatternKind::Stripes,
        ]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PatternSettings {
    #[serde(rename = "type")]
    pub kind: PatternKind,
    pub scale: f32,
    pub opacity: f32,
    /// Stroke width in pixels.
    pub size: f32,
    pub color: [u8; 4],
}

impl Default for PatternSettings {
    fn default() -> Self {
        Self {
            kind: PatternKind::Wood,
            scale: 1.0,
            opacity: 1.0,
            size: 20.0,
            color: [139, 90, 43, 255],
        }
    }
}

/// Integer hash → [0, 1).
#[inline]
fn hash2(x: i32, y: i32) -> f32 {
    let mut h = (x as u32).wrapping_mul(0x8da6_b343) ^ (y as u32).wrapping_mul(0xd816_3841);
    h ^= h >> 13;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 16;
    (h & 0x00ff_ffff) as f32 / 16_777_216.0
}

/// Smooth value noise in [0, 1).
fn value_noise(x: f32, y: f32) -> f32 {
    let xi = x.floor();
    let yi = y.floor();
    let fx = x - xi;
    let fy = y - yi;
    let (xi, yi) = (xi as i32, yi as i32);
    let sx = fx * fx * (3.0 - 2.0 * fx);
    let sy = fy * fy * (3.0 - 2.0 * fy);
    let top = hash2(xi, yi) * (1.0 - sx) + hash2(xi + 1, yi) * sx;
    let bottom = hash2(xi, yi + 1) * (1.0 - sx) + hash2(xi + 1, yi + 1) * sx;
    top * (1.0 - sy) + bottom * sy
}

/// Samples one pattern at canvas positions.
pub struct PatternSampler {
    kind: PatternKind,
    cell: f32,
    tint: [u8; 4],
}

impl PatternSampler {
    pub fn new(settings: &PatternSettings) -> Self {
        let scale = if settings.scale.is_finite() { settings.scale.max(0.1) } else { 1.0 };
        Self {
            kind: settings.kind,
            cell: BASE_CELL * scale,
            tint: settings.color,
        }
    }

    /// `(shade, alpha)` of the pattern at a pixel centre, both in 0..1.
    fn shade(&self, x: f32, y: f32) -> (f32, f32) {
        let s = self.cell;
        match self.kind {
            PatternKind::Wood => {
                let warp = value_noise(x / (s * 4.0), y / (s * 4.0)) * 2.0;
                let rings = (x / s + warp).sin() * 0.5 + 0.5;
                let grain = value_noise(x / (s * 0.5), y / (s * 8.0));
                (0.55 + 0.3 * rings + 0.15 * grain, 1.0)
            }
            PatternKind::Stone => {
                let coarse = value_noise(x / (s * 2.0), y / (s * 2.0));
                let fine = value_noise(x / (s * 0.5), y / (s * 0.5));
                let n = 0.7 * coarse + 0.3 * fine;
                // Dark seams where the coarse noise crosses mid-grey
                let seam = ((coarse - 0.5).abs() * 20.0).min(1.0);
                ((0.45 + 0.55 * n) * (0.6 + 0.4 * seam), 1.0)
            }
            PatternKind::Fabric => {
                let cx = (x / s).floor() as i32;
                let cy = (y / s).floor() as i32;
                let over = (cx + cy).rem_euclid(2) == 0;
                let along = if over { x } else { y };
                let thread = (along / s * std::f32::consts::PI * 2.0).sin() * 0.5 + 0.5;
                (if over { 0.75 } else { 0.6 } + 0.25 * thread, 1.0)
            }
            PatternKind::Brick => {
                let bh = s * 1.5;
                let bw = s * 3.0;
                let row = (y / bh).floor();
                let offset = if (row as i32).rem_euclid(2) == 1 { bw * 0.5 } else { 0.0 };
                let lx = (x + offset).rem_euclid(bw);
                let ly = y.rem_euclid(bh);
                let mortar = (s * 0.2).max(1.0);
                if lx < mortar || ly < mortar {
                    (1.0, 1.0)
                } else {
                    let col = ((x + offset) / bw).floor() as i32;
                    (0.55 + 0.25 * hash2(col, row as i32), 1.0)
                }
            }
            PatternKind::Dots => {
                let lx = x.rem_euclid(s * 2.0) - s;
                let ly = y.rem_euclid(s * 2.0) - s;
                let d = (lx * lx + ly * ly).sqrt() - s * 0.6;
                (1.0, crate::ops::edge_coverage(d))
            }
            PatternKind::Stripes => {
                let band = ((x + y) / s).rem_euclid(2.0);
                (1.0, if band < 1.0 { 1.0 } else { 0.0 })
            }
        }
    }

    /// Pattern colour at integer pixel `(x, y)`.
    pub fn sample(&self, x: u32, y: u32) -> Rgba<u8> {
        let (shade, alpha) = self.shade(x as f32 + 0.5, y as f32 + 0.5);
        let shade = shade.clamp(0.0, 1.0);
        let t = self.tint;
        Rgba([
            (t[0] as f32 * shade).round() as u8,
            (t[1] as f32 * shade).round() as u8,
            (t[2] as f32 * shade).round() as u8,
            (t[3] as f32 * alpha.clamp(0.0, 1.0)).round() as u8,
        ])
    }
}
