use image::Rgba;
use rayon::prelude::*;

use crate::canvas::{CompositeOp, LiveCanvas, TiledImage};
use crate::ops::{edge_coverage, sdf_line_segment, PixelRect};

// ============================================================================
// STROKE MASK – accumulated coverage of one gesture
// ============================================================================

/// Coverage of every capsule painted so far in the current gesture.
///
/// Segments are merged with `max`, and pixels are recomputed from the
/// gesture-start snapshot, so round joins where consecutive segments overlap
/// never darken and erasing the same spot twice in one stroke changes
/// nothing more.
pub struct StrokeMask {
    width: u32,
    height: u32,
    /// Allocated on first use; most gestures on a large canvas touch little.
    coverage: Vec<f32>,
}

impl StrokeMask {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            coverage: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.coverage.is_empty()
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> f32 {
        if self.coverage.is_empty() || x >= self.width || y >= self.height {
            return 0.0;
        }
        self.coverage[y as usize * self.width as usize + x as usize]
    }

    /// Add a round-capped segment from `a` to `b`.  Returns the touched
    /// pixel rect, or `None` if the capsule misses the canvas.
    pub fn add_segment(&mut self, a: (f32, f32), b: (f32, f32), radius: f32) -> Option<PixelRect> {
        let radius = radius.max(0.5);
        let pad = radius + 1.0;
        let rect = PixelRect::from_bounds(
            a.0.min(b.0) - pad,
            a.1.min(b.1) - pad,
            a.0.max(b.0) + pad,
            a.1.max(b.1) + pad,
            self.width,
            self.height,
        )?;

        if self.coverage.is_empty() {
            self.coverage = vec![0.0; self.width as usize * self.height as usize];
        }

        let w = self.width as usize;
        let (x0, x1) = (rect.x0 as usize, rect.x1 as usize);
        self.coverage
            .par_chunks_mut(w)
            .enumerate()
            .skip(rect.y0 as usize)
            .take(rect.height() as usize)
            .for_each(|(row, row_buf)| {
                let py = row as f32 + 0.5;
                for (col, cov) in row_buf.iter_mut().enumerate().take(x1).skip(x0) {
                    let px = col as f32 + 0.5;
                    let d = sdf_line_segment(px, py, a.0, a.1, b.0, b.1) - radius;
                    let c = edge_coverage(d);
                    if c > *cov {
                        *cov = c;
                    }
                }
            });
        Some(rect)
    }
}

/// Recompute `rect` of the live canvas as `base` with the stroke applied.
///
/// `paint` supplies the colour for each covered pixel (solid for brushes,
/// sampled for patterns).  The canvas' current composite op decides whether
/// the stroke adds colour or removes alpha.
pub fn composite_stroke<F>(
    canvas: &mut LiveCanvas,
    base: &TiledImage,
    mask: &StrokeMask,
    rect: PixelRect,
    opacity: f32,
    paint: F,
) where
    F: Fn(u32, u32) -> Rgba<u8>,
{
    let op = canvas.composite_op();
    // Erasing can never make a transparent chunk non-transparent.
    let create_missing = op == CompositeOp::SourceOver;
    canvas
        .pixels_mut()
        .modify_region(rect.x0, rect.y0, rect.x1, rect.y1, create_missing, |x, y, px| {
            let mut out = *base.get_pixel(x, y);
            let cov = mask.get(x, y);
            if cov > 0.001 {
                LiveCanvas::apply(&mut out, op, paint(x, y), cov * opacity);
            }
            *px = out;
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertical_segment_is_size_wide() {
        let mut mask = StrokeMask::new(200, 300);
        let rect = mask.add_segment((100.0, 100.0), (100.0, 200.0), 5.0).unwrap();
        assert!(rect.x0 <= 94 && rect.x1 >= 106);
        for x in 95..105 {
            assert_eq!(mask.get(x, 150), 1.0, "x = {x}");
        }
        assert_eq!(mask.get(93, 150), 0.0);
        assert_eq!(mask.get(106, 150), 0.0);
        // round caps extend past the endpoints
        assert_eq!(mask.get(100, 97), 1.0);
        assert_eq!(mask.get(100, 206), 0.0);
    }

    #[test]
    fn off_canvas_segment_is_ignored() {
        let mut mask = StrokeMask::new(50, 50);
        assert!(mask.add_segment((-40.0, -40.0), (-20.0, -30.0), 3.0).is_none());
        assert!(mask.is_empty());
    }

    #[test]
    fn overlapping_segments_do_not_compound() {
        let mut canvas = LiveCanvas::new(40, 40);
        let base = canvas.snapshot();
        let mut mask = StrokeMask::new(40, 40);
        let color = Rgba([0, 0, 255, 255]);

        let r1 = mask.add_segment((10.0, 20.0), (20.0, 20.0), 4.0).unwrap();
        composite_stroke(&mut canvas, &base, &mask, r1, 0.5, |_, _| color);
        let once = canvas.pixels().get_pixel(20, 20)[3];

        let r2 = mask.add_segment((20.0, 20.0), (30.0, 20.0), 4.0).unwrap();
        composite_stroke(&mut canvas, &base, &mask, r2, 0.5, |_, _| color);
        assert_eq!(canvas.pixels().get_pixel(20, 20)[3], once);
    }

    #[test]
    fn erasing_transparent_area_allocates_nothing() {
        let mut canvas = LiveCanvas::new(128, 128);
        let base = canvas.snapshot();
        let mut mask = StrokeMask::new(128, 128);
        let rect = mask.add_segment((10.0, 10.0), (100.0, 100.0), 6.0).unwrap();
        canvas.with_composite(CompositeOp::DestinationOut, |c| {
            composite_stroke(c, &base, &mask, rect, 1.0, |_, _| Rgba([0, 0, 0, 255]));
        });
        assert_eq!(canvas.pixels().chunk_count(), 0);
    }
}
