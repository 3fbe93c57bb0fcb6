use std::collections::HashMap;
use std::path::Path;

use ab_glyph::{point, Font, FontArc, GlyphId, ScaleFont};

use crate::error::{EngineError, Result};
use crate::ops::{CoverageMask, PixelRect};

// ============================================================================
// GLYPH MASK
// ============================================================================

/// Single-channel coverage of rendered text, positioned relative to the pen
/// origin (the left end of the first line's baseline).
#[derive(Clone, Debug, Default)]
pub struct GlyphMask {
    pub width: u32,
    pub height: u32,
    /// Row-major, `width * height` entries in 0..1.
    pub coverage: Vec<f32>,
    /// Top-left of the mask relative to the pen origin.
    pub offset_x: i32,
    pub offset_y: i32,
}

impl GlyphMask {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Place the mask with its pen origin at canvas `(x, y)`, clipped to the
    /// canvas.
    pub fn place(&self, x: f32, y: f32, canvas_w: u32, canvas_h: u32) -> Option<CoverageMask> {
        if self.is_empty() {
            return None;
        }
        let left = x.round() as i64 + self.offset_x as i64;
        let top = y.round() as i64 + self.offset_y as i64;
        let rect = PixelRect::from_bounds(
            left as f32,
            top as f32,
            (left + self.width as i64) as f32,
            (top + self.height as i64) as f32,
            canvas_w,
            canvas_h,
        )?;
        let mut out = CoverageMask::new(rect);
        let out_w = rect.width() as usize;
        for cy in rect.y0..rect.y1 {
            let my = (cy as i64 - top) as usize;
            for cx in rect.x0..rect.x1 {
                let mx = (cx as i64 - left) as usize;
                out.coverage[(cy - rect.y0) as usize * out_w + (cx - rect.x0) as usize] =
                    self.coverage[my * self.width as usize + mx];
            }
        }
        Some(out)
    }
}

/// Turns a string into glyph coverage.  The engine only ever talks to this
/// trait, so tests and headless hosts can supply their own glyphs.
pub trait TextRasterizer: Send + Sync {
    fn rasterize(&self, font: &str, text: &str, size: f32) -> Result<GlyphMask>;
}

// ============================================================================
// FONT LIBRARY + ab_glyph RASTERIZER
// ============================================================================

/// Fonts loaded from bytes or files, looked up by case-insensitive name.
#[derive(Default, Clone)]
pub struct FontLibrary {
    fonts: HashMap<String, FontArc>,
    fallback: Option<FontArc>,
}

impl FontLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a TTF/OTF font under `name`.  The first font registered also
    /// becomes the fallback for unknown names.
    pub fn register(&mut self, name: &str, bytes: Vec<u8>) -> Result<()> {
        let font = FontArc::try_from_vec(bytes)
            .map_err(|e| EngineError::Config(format!("invalid font '{}': {}", name, e)))?;
        if self.fallback.is_none() {
            self.fallback = Some(font.clone());
        }
        self.fonts.insert(name.to_ascii_lowercase(), font);
        Ok(())
    }

    pub fn load_file(&mut self, name: &str, path: &Path) -> Result<()> {
        let bytes = std::fs::read(path)?;
        self.register(name, bytes)
    }

    pub fn get(&self, name: &str) -> Option<&FontArc> {
        self.fonts
            .get(&name.to_ascii_lowercase())
            .or(self.fallback.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }
}

/// Lay out a single line of text at the pen origin.
/// Returns `(glyphs, total_width)`; glyph y is the baseline.
pub fn layout_line(font: &FontArc, text: &str, font_size: f32) -> (Vec<(GlyphId, f32)>, f32) {
    let scaled = font.as_scaled(font_size);
    let mut glyphs = Vec::new();
    let mut cursor_x = 0.0f32;
    let mut last_glyph: Option<GlyphId> = None;

    for ch in text.chars() {
        let glyph_id = font.glyph_id(ch);
        if let Some(prev) = last_glyph {
            cursor_x += scaled.kern(prev, glyph_id);
        }
        glyphs.push((glyph_id, cursor_x));
        cursor_x += scaled.h_advance(glyph_id);
        last_glyph = Some(glyph_id);
    }
    (glyphs, cursor_x)
}

pub struct AbGlyphRasterizer {
    fonts: FontLibrary,
}

impl AbGlyphRasterizer {
    pub fn new(fonts: FontLibrary) -> Self {
        Self { fonts }
    }

    pub fn fonts(&self) -> &FontLibrary {
        &self.fonts
    }
}

impl TextRasterizer for AbGlyphRasterizer {
    fn rasterize(&self, font_name: &str, text: &str, size: f32) -> Result<GlyphMask> {
        let font = self
            .fonts
            .get(font_name)
            .ok_or_else(|| EngineError::FontUnavailable(font_name.to_string()))?;
        let size = if size.is_finite() && size > 0.0 { size } else { 16.0 };
        let line_height = font.as_scaled(size).height();

        // Lay out every line, baseline y = line_idx * line_height
        let mut all: Vec<(GlyphId, f32, f32)> = Vec::new();
        for (line_idx, line) in text.split('\n').enumerate() {
            let y = line_idx as f32 * line_height;
            let (glyphs, _) = layout_line(font, line, size);
            all.extend(glyphs.into_iter().map(|(id, x)| (id, x, y)));
        }

        let outlined: Vec<_> = all
            .iter()
            .filter_map(|&(id, x, y)| {
                font.outline_glyph(id.with_scale_and_position(size, point(x.round(), y.round())))
            })
            .collect();
        if outlined.is_empty() {
            return Ok(GlyphMask::default());
        }

        let mut min_x = f32::MAX;
        let mut min_y = f32::MAX;
        let mut max_x = f32::MIN;
        let mut max_y = f32::MIN;
        for g in &outlined {
            let b = g.px_bounds();
            min_x = min_x.min(b.min.x);
            min_y = min_y.min(b.min.y);
            max_x = max_x.max(b.max.x);
            max_y = max_y.max(b.max.y);
        }
        let offset_x = min_x.floor() as i32;
        let offset_y = min_y.floor() as i32;
        let width = (max_x.ceil() as i32 - offset_x).max(0) as u32;
        let height = (max_y.ceil() as i32 - offset_y).max(0) as u32;

        let mut coverage = vec![0.0f32; width as usize * height as usize];
        for g in &outlined {
            let b = g.px_bounds();
            let gx = b.min.x as i32 - offset_x;
            let gy = b.min.y as i32 - offset_y;
            g.draw(|px, py, cov| {
                let x = gx + px as i32;
                let y = gy + py as i32;
                if x >= 0 && y >= 0 && (x as u32) < width && (y as u32) < height {
                    let idx = y as usize * width as usize + x as usize;
                    coverage[idx] = coverage[idx].max(cov);
                }
            });
        }

        Ok(GlyphMask {
            width,
            height,
            coverage,
            offset_x,
            offset_y,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block_mask() -> GlyphMask {
        GlyphMask {
            width: 4,
            height: 3,
            coverage: (0..12).map(|i| i as f32 / 11.0).collect(),
            offset_x: -1,
            offset_y: -3,
        }
    }

    #[test]
    fn place_positions_relative_to_baseline() {
        let mask = block_mask().place(10.0, 20.0, 64, 64).unwrap();
        assert_eq!(mask.rect, PixelRect { x0: 9, y0: 17, x1: 13, y1: 20 });
        assert_eq!(mask.get(9, 17), 0.0);
        assert_eq!(mask.get(12, 19), 1.0);
    }

    #[test]
    fn place_clips_at_canvas_edge() {
        let mask = block_mask().place(0.0, 2.0, 64, 64).unwrap();
        assert_eq!(mask.rect, PixelRect { x0: 0, y0: 0, x1: 3, y1: 2 });
        // first visible column is mask column 1, row 1
        assert_eq!(mask.get(0, 0), 5.0 / 11.0);
        assert!(block_mask().place(-50.0, -50.0, 64, 64).is_none());
    }

    #[test]
    fn empty_library_reports_missing_font() {
        let r = AbGlyphRasterizer::new(FontLibrary::new());
        assert!(matches!(
            r.rasterize("serif", "hi", 12.0),
            Err(EngineError::FontUnavailable(_))
        ));
    }

    #[test]
    fn garbage_font_bytes_are_rejected() {
        let mut lib = FontLibrary::new();
        assert!(lib.register("bad", vec![1, 2, 3, 4]).is_err());
        assert!(lib.is_empty());
    }
}
