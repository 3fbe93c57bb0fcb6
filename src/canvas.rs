use std::sync::Arc;

use image::{Rgba, RgbaImage};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

// ============================================================================
// TILED IMAGE – sparse 64×64 chunk storage (Vec-indexed for speed)
// ============================================================================

pub const CHUNK_SIZE: u32 = 64;

/// Hard ceiling on canvas area; larger requests are clamped to 1×1.
const MAX_PIXELS: u64 = 256_000_000;

/// A pixel with zero alpha, returned by reference for missing chunks.
static TRANSPARENT_PIXEL: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Sparse tiled image backed by a flat `Vec<Option<Arc<RgbaImage>>>`.
/// Chunk coordinates are mapped to a flat index via `cy * chunks_per_row + cx`.
///
/// Chunks are wrapped in `Arc` for copy-on-write semantics: `clone()` only
/// bumps reference counts, and every mutation goes through `Arc::make_mut`
/// so a clone held by a layer or a history snapshot never observes later
/// edits. This is what makes a `TiledImage` usable as an immutable raster
/// value.
#[derive(Clone)]
pub struct TiledImage {
    width: u32,
    height: u32,
    chunks_per_row: u32,
    chunks: Vec<Option<Arc<RgbaImage>>>,
}

impl std::fmt::Debug for TiledImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TiledImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("chunks", &self.chunk_count())
            .finish()
    }
}

impl TiledImage {
    // ---- construction -------------------------------------------------------

    /// Create an empty (fully transparent) tiled image.
    pub fn new(width: u32, height: u32) -> Self {
        let (width, height) = {
            let total = (width as u64) * (height as u64);
            if total > MAX_PIXELS || width == 0 || height == 0 {
                log::warn!(
                    "TiledImage::new: dimensions {}×{} are invalid, clamped to 1×1",
                    width,
                    height
                );
                (1, 1)
            } else {
                (width, height)
            }
        };
        let chunks_per_row = width.div_ceil(CHUNK_SIZE);
        let chunks_per_col = height.div_ceil(CHUNK_SIZE);
        let total = (chunks_per_row * chunks_per_col) as usize;
        Self {
            width,
            height,
            chunks_per_row,
            chunks: vec![None; total],
        }
    }

    /// Fill the entire image with `color`.  A transparent fill costs nothing.
    pub fn new_filled(width: u32, height: u32, color: Rgba<u8>) -> Self {
        let mut img = Self::new(width, height);
        if color[3] > 0 {
            img.fill(color);
        }
        img
    }

    /// Import from a flat `RgbaImage`.  Only non-transparent chunks are stored.
    /// Chunk conversion is parallelised with rayon.
    pub fn from_rgba_image(src: &RgbaImage) -> Self {
        let width = src.width();
        let height = src.height();
        let mut img = Self::new(width, height);
        if img.width != width || img.height != height {
            return img;
        }

        let chunks_x = img.chunks_per_row as usize;
        let total_chunks = img.chunks.len();
        let src_raw = src.as_raw();

        let chunk_results: Vec<(usize, Option<Arc<RgbaImage>>)> = (0..total_chunks)
            .into_par_iter()
            .map(|flat| {
                let cx = (flat % chunks_x) as u32;
                let cy = (flat / chunks_x) as u32;
                let base_x = cx * CHUNK_SIZE;
                let base_y = cy * CHUNK_SIZE;

                let cw = CHUNK_SIZE.min(width - base_x);
                let ch = CHUNK_SIZE.min(height - base_y);
                let chunk_stride = CHUNK_SIZE as usize * 4;
                let mut chunk_data = vec![0u8; chunk_stride * CHUNK_SIZE as usize];
                let mut has_content = false;

                for ly in 0..ch {
                    let src_start = ((base_y + ly) * width + base_x) as usize * 4;
                    let dst_start = ly as usize * chunk_stride;
                    let byte_len = cw as usize * 4;
                    chunk_data[dst_start..dst_start + byte_len]
                        .copy_from_slice(&src_raw[src_start..src_start + byte_len]);

                    if !has_content {
                        has_content = chunk_data[dst_start..dst_start + byte_len]
                            .chunks_exact(4)
                            .any(|px| px[3] != 0);
                    }
                }

                let chunk = if has_content {
                    RgbaImage::from_raw(CHUNK_SIZE, CHUNK_SIZE, chunk_data).map(Arc::new)
                } else {
                    None
                };
                (flat, chunk)
            })
            .collect();

        for (idx, chunk) in chunk_results {
            img.chunks[idx] = chunk;
        }
        img
    }

    /// Flatten back to a contiguous `RgbaImage`.
    pub fn to_rgba_image(&self) -> RgbaImage {
        let mut out = RgbaImage::new(self.width, self.height);
        let out_stride = self.width as usize * 4;
        let out_raw: &mut [u8] = &mut out;
        for (cx, cy) in self.chunk_keys() {
            if let Some(chunk) = self.get_chunk(cx, cy) {
                let base_x = cx * CHUNK_SIZE;
                let base_y = cy * CHUNK_SIZE;
                let cw = CHUNK_SIZE.min(self.width.saturating_sub(base_x)) as usize;
                let ch = CHUNK_SIZE.min(self.height.saturating_sub(base_y));
                let chunk_raw = chunk.as_raw();
                let chunk_stride = CHUNK_SIZE as usize * 4;
                for ly in 0..ch as usize {
                    let src_start = ly * chunk_stride;
                    let dst_start = (base_y as usize + ly) * out_stride + base_x as usize * 4;
                    out_raw[dst_start..dst_start + cw * 4]
                        .copy_from_slice(&chunk_raw[src_start..src_start + cw * 4]);
                }
            }
        }
        out
    }

    // ---- indexing helpers ----------------------------------------------------

    #[inline(always)]
    fn flat_index(&self, cx: u32, cy: u32) -> usize {
        (cy * self.chunks_per_row + cx) as usize
    }

    #[inline(always)]
    fn chunk_coord(x: u32, y: u32) -> (u32, u32) {
        (x / CHUNK_SIZE, y / CHUNK_SIZE)
    }

    #[inline(always)]
    fn local(x: u32, y: u32) -> (u32, u32) {
        (x % CHUNK_SIZE, y % CHUNK_SIZE)
    }

    // ---- pixel access -------------------------------------------------------

    /// Read a pixel (returns `&TRANSPARENT_PIXEL` for missing chunks).
    #[inline]
    pub fn get_pixel(&self, x: u32, y: u32) -> &Rgba<u8> {
        if x >= self.width || y >= self.height {
            return &TRANSPARENT_PIXEL;
        }
        let (cx, cy) = Self::chunk_coord(x, y);
        let (lx, ly) = Self::local(x, y);
        let idx = self.flat_index(cx, cy);
        self.chunks[idx]
            .as_ref()
            .map(|c| c.get_pixel(lx, ly))
            .unwrap_or(&TRANSPARENT_PIXEL)
    }

    /// Write a pixel (creates the chunk on demand, COW-clones if shared).
    #[inline]
    pub fn put_pixel(&mut self, x: u32, y: u32, pixel: Rgba<u8>) {
        if x >= self.width || y >= self.height {
            return;
        }
        let (cx, cy) = Self::chunk_coord(x, y);
        let (lx, ly) = Self::local(x, y);
        let idx = self.flat_index(cx, cy);
        let arc = self.chunks[idx]
            .get_or_insert_with(|| Arc::new(RgbaImage::new(CHUNK_SIZE, CHUNK_SIZE)));
        Arc::make_mut(arc).put_pixel(lx, ly, pixel);
    }

    /// Visit every pixel of the half-open rectangle `[min, max)` mutably,
    /// chunk by chunk.  The rectangle is clamped to the image.
    ///
    /// With `create_missing == false` pixels in absent (fully transparent)
    /// chunks are skipped, which keeps alpha-reducing operations from
    /// allocating storage for pixels they could never change.
    pub fn modify_region<F>(
        &mut self,
        min_x: u32,
        min_y: u32,
        max_x: u32,
        max_y: u32,
        create_missing: bool,
        mut f: F,
    ) where
        F: FnMut(u32, u32, &mut Rgba<u8>),
    {
        let max_x = max_x.min(self.width);
        let max_y = max_y.min(self.height);
        if min_x >= max_x || min_y >= max_y {
            return;
        }
        let cs = CHUNK_SIZE;
        for cy in (min_y / cs)..=((max_y - 1) / cs) {
            for cx in (min_x / cs)..=((max_x - 1) / cs) {
                let base_x = cx * cs;
                let base_y = cy * cs;
                let lx0 = min_x.saturating_sub(base_x);
                let ly0 = min_y.saturating_sub(base_y);
                let lx1 = (max_x - base_x).min(cs);
                let ly1 = (max_y - base_y).min(cs);
                let idx = self.flat_index(cx, cy);
                let slot = &mut self.chunks[idx];
                if slot.is_none() && !create_missing {
                    continue;
                }
                let arc =
                    slot.get_or_insert_with(|| Arc::new(RgbaImage::new(cs, cs)));
                let chunk = Arc::make_mut(arc);
                for ly in ly0..ly1 {
                    for lx in lx0..lx1 {
                        f(base_x + lx, base_y + ly, chunk.get_pixel_mut(lx, ly));
                    }
                }
            }
        }
    }

    /// Read-only access to a chunk (if it exists).
    pub fn get_chunk(&self, cx: u32, cy: u32) -> Option<&RgbaImage> {
        let idx = self.flat_index(cx, cy);
        self.chunks.get(idx).and_then(|c| c.as_deref())
    }

    /// Iterator over populated chunk coordinates.
    pub fn chunk_keys(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        let cpr = self.chunks_per_row;
        self.chunks.iter().enumerate().filter_map(move |(i, slot)| {
            slot.as_ref()
                .map(|_| ((i as u32) % cpr, (i as u32) / cpr))
        })
    }

    /// Number of populated chunks.
    pub fn chunk_count(&self) -> usize {
        self.chunks.iter().filter(|c| c.is_some()).count()
    }

    /// Number of populated chunks whose storage is shared with another clone.
    pub fn shared_chunk_count(&self) -> usize {
        self.chunks
            .iter()
            .flatten()
            .filter(|arc| Arc::strong_count(arc) > 1)
            .count()
    }

    // ---- bulk operations ----------------------------------------------------

    /// Fill every pixel with `color`.
    pub fn fill(&mut self, color: Rgba<u8>) {
        for slot in &mut self.chunks {
            *slot = Some(Arc::new(RgbaImage::from_pixel(CHUNK_SIZE, CHUNK_SIZE, color)));
        }
    }

    /// Drop all chunks (make the image fully transparent).
    pub fn clear(&mut self) {
        for slot in &mut self.chunks {
            *slot = None;
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Approximate memory usage in bytes.
    /// Shared (COW) chunks are counted at pointer cost only, since their
    /// pixel data is owned jointly with history snapshots.
    pub fn memory_bytes(&self) -> usize {
        let chunk_byte_size = (CHUNK_SIZE * CHUNK_SIZE * 4) as usize;
        self.chunks
            .iter()
            .flatten()
            .map(|arc| {
                if Arc::strong_count(arc) == 1 {
                    chunk_byte_size
                } else {
                    std::mem::size_of::<usize>() * 2
                }
            })
            .sum()
    }

    /// Pixel-wise equality. A missing chunk compares equal to a chunk of
    /// transparent black; storage layout never matters.
    pub fn pixels_eq(&self, other: &TiledImage) -> bool {
        if self.width != other.width || self.height != other.height {
            return false;
        }
        for (idx, (a, b)) in self.chunks.iter().zip(other.chunks.iter()).enumerate() {
            match (a, b) {
                (None, None) => continue,
                (Some(a), Some(b)) if Arc::ptr_eq(a, b) => continue,
                _ => {}
            }
            let cx = idx as u32 % self.chunks_per_row;
            let cy = idx as u32 / self.chunks_per_row;
            let base_x = cx * CHUNK_SIZE;
            let base_y = cy * CHUNK_SIZE;
            let cw = CHUNK_SIZE.min(self.width - base_x);
            let ch = CHUNK_SIZE.min(self.height - base_y);
            for ly in 0..ch {
                for lx in 0..cw {
                    if self.get_pixel(base_x + lx, base_y + ly)
                        != other.get_pixel(base_x + lx, base_y + ly)
                    {
                        return false;
                    }
                }
            }
        }
        true
    }
}

impl PartialEq for TiledImage {
    fn eq(&self, other: &Self) -> bool {
        self.pixels_eq(other)
    }
}

// ============================================================================
// PIXEL BLENDING
// ============================================================================

/// How new paint combines with the pixels already on the live canvas.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CompositeOp {
    /// Normal alpha compositing ("draw over").
    #[default]
    SourceOver,
    /// New coverage removes existing alpha ("subtract").
    DestinationOut,
}

/// Source-over blend of `top` onto `base` in unpremultiplied RGBA,
/// with `top`'s alpha scaled by `opacity`.
pub fn blend_over(base: Rgba<u8>, top: Rgba<u8>, opacity: f32) -> Rgba<u8> {
    let opacity = opacity.clamp(0.0, 1.0);
    if top[3] == 0 || opacity <= 0.0 {
        return base;
    }
    // Fast path: fully opaque top pixel just overwrites
    if opacity >= 1.0 && top[3] == 255 {
        return top;
    }

    let top_a = (top[3] as f32 / 255.0) * opacity;
    let base_a = base[3] as f32 / 255.0;
    let out_a = top_a + base_a * (1.0 - top_a);
    if out_a <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }

    let channel = |i: usize| -> u8 {
        let t = top[i] as f32 / 255.0;
        let b = base[i] as f32 / 255.0;
        let c = (t * top_a + b * base_a * (1.0 - top_a)) / out_a;
        (c * 255.0).round().clamp(0.0, 255.0) as u8
    };

    Rgba([
        channel(0),
        channel(1),
        channel(2),
        (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}

/// Destination-out: reduce `base` alpha by `strength` (0..1).
/// Colour channels are kept; a fully erased pixel becomes transparent black.
pub fn erase_alpha(base: Rgba<u8>, strength: f32) -> Rgba<u8> {
    let strength = strength.clamp(0.0, 1.0);
    if base[3] == 0 || strength <= 0.0 {
        return base;
    }
    let new_a = (base[3] as f32 * (1.0 - strength)).round() as u8;
    if new_a == 0 {
        Rgba([0, 0, 0, 0])
    } else {
        Rgba([base[0], base[1], base[2], new_a])
    }
}

/// Parse `#rrggbb` / `#rrggbbaa` (leading `#` optional).
pub fn parse_hex_color(s: &str) -> Option<[u8; 4]> {
    let hex = s.trim().trim_start_matches('#');
    let byte = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    match hex.len() {
        6 => Some([byte(0)?, byte(2)?, byte(4)?, 255]),
        8 => Some([byte(0)?, byte(2)?, byte(4)?, byte(6)?]),
        _ => None,
    }
}

pub fn to_hex_color(c: [u8; 4]) -> String {
    if c[3] == 255 {
        format!("#{:02x}{:02x}{:02x}", c[0], c[1], c[2])
    } else {
        format!("#{:02x}{:02x}{:02x}{:02x}", c[0], c[1], c[2], c[3])
    }
}

// ============================================================================
// LAYERS
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    #[default]
    Drawing,
    /// Created from an imported picture.
    Image,
    /// A blank drawing layer that had text placed on it first.
    Text,
}

/// The committed raster of a layer.
///
/// Always treated as an immutable value: painting produces a new
/// `LayerContent`, it never edits one that a layer or history entry holds.
/// `Raster` clones share tiles copy-on-write, so snapshotting is cheap.
#[derive(Clone, Debug, Default)]
pub enum LayerContent {
    /// A fresh layer with nothing on it.
    #[default]
    Empty,
    Raster(TiledImage),
    /// Encoded image bytes (PNG) not yet decoded, e.g. an imported picture.
    Encoded(Arc<[u8]>),
}

impl LayerContent {
    pub fn is_empty(&self) -> bool {
        matches!(self, LayerContent::Empty)
    }

    /// Decode into a `width × height` raster.  Encoded images of another
    /// size are placed at the origin and clipped.
    pub fn decode(&self, width: u32, height: u32) -> Result<TiledImage> {
        match self {
            LayerContent::Empty => Ok(TiledImage::new(width, height)),
            LayerContent::Raster(img) => Ok(img.clone()),
            LayerContent::Encoded(bytes) => {
                let decoded = crate::io::decode_image(bytes)?;
                if decoded.width() == width && decoded.height() == height {
                    return Ok(TiledImage::from_rgba_image(&decoded));
                }
                let mut out = TiledImage::new(width, height);
                let w = decoded.width().min(width);
                let h = decoded.height().min(height);
                out.modify_region(0, 0, w, h, true, |x, y, px| {
                    *px = *decoded.get_pixel(x, y);
                });
                Ok(out)
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct Layer {
    pub id: String,
    pub name: String,
    pub visible: bool,
    pub opacity: f32,
    pub content: LayerContent,
    pub kind: LayerKind,
}

impl Layer {
    pub fn new(name: impl Into<String>, kind: LayerKind, content: LayerContent) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            visible: true,
            opacity: 1.0,
            content,
            kind,
        }
    }

    /// A blank drawing layer (`content == Empty`).
    pub fn blank(name: impl Into<String>) -> Self {
        Self::new(name, LayerKind::Drawing, LayerContent::Empty)
    }
}

// ============================================================================
// LIVE CANVAS & PREVIEW BUFFER
// ============================================================================

/// The mutable working surface of the active layer.
///
/// Tools paint here directly during a gesture; on completion the pixels are
/// read back with [`LiveCanvas::snapshot`] into the layer's content.
pub struct LiveCanvas {
    pixels: TiledImage,
    composite_op: CompositeOp,
}

impl LiveCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: TiledImage::new(width, height),
            composite_op: CompositeOp::SourceOver,
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &TiledImage {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut TiledImage {
        &mut self.pixels
    }

    pub fn composite_op(&self) -> CompositeOp {
        self.composite_op
    }

    /// Run `draw` with `op` selected, then put the canvas back to
    /// source-over no matter what `draw` did.
    pub fn with_composite<R>(&mut self, op: CompositeOp, draw: impl FnOnce(&mut Self) -> R) -> R {
        self.composite_op = op;
        let out = draw(self);
        self.composite_op = CompositeOp::SourceOver;
        out
    }

    /// Composite one pixel of paint (`coverage` in 0..1) with the current op.
    #[inline]
    pub fn apply(px: &mut Rgba<u8>, op: CompositeOp, color: Rgba<u8>, coverage: f32) {
        match op {
            CompositeOp::SourceOver => *px = blend_over(*px, color, coverage),
            CompositeOp::DestinationOut => {
                *px = erase_alpha(*px, coverage * (color[3] as f32 / 255.0))
            }
        }
    }

    /// Clear-then-draw: replace every pixel with `pixels`.
    pub fn replace(&mut self, pixels: &TiledImage) {
        if pixels.width() != self.width() || pixels.height() != self.height() {
            log::warn!(
                "LiveCanvas::replace: size mismatch {}×{} vs {}×{}",
                pixels.width(),
                pixels.height(),
                self.width(),
                self.height()
            );
        }
        self.pixels = pixels.clone();
    }

    pub fn clear(&mut self) {
        self.pixels.clear();
    }

    /// Immutable copy of the current pixels (shares tiles until either side
    /// is painted again).
    pub fn snapshot(&self) -> TiledImage {
        self.pixels.clone()
    }
}

/// Pixels of the live canvas captured at gesture start, used to redraw
/// shape and gradient previews without committing them.
pub struct PreviewBuffer {
    snapshot: TiledImage,
}

impl PreviewBuffer {
    pub fn capture(canvas: &LiveCanvas) -> Self {
        Self {
            snapshot: canvas.snapshot(),
        }
    }

    /// Undo the previous preview frame.
    pub fn restore_into(&self, canvas: &mut LiveCanvas) {
        canvas.replace(&self.snapshot);
    }

    pub fn pixels(&self) -> &TiledImage {
        &self.snapshot
    }
}

/// Validate a layer index against a length.
pub(crate) fn check_index(index: usize, len: usize) -> Result<()> {
    if index < len {
        Ok(())
    } else {
        Err(EngineError::LayerIndexOutOfRange { index, len })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clone_is_copy_on_write() {
        let mut a = TiledImage::new_filled(130, 70, Rgba([255, 255, 255, 255]));
        let b = a.clone();
        assert_eq!(b.shared_chunk_count(), b.chunk_count());

        a.put_pixel(3, 3, Rgba([0, 0, 0, 255]));
        assert_eq!(*b.get_pixel(3, 3), Rgba([255, 255, 255, 255]));
        assert_eq!(*a.get_pixel(3, 3), Rgba([0, 0, 0, 255]));
        // only the touched chunk was cloned
        assert_eq!(a.shared_chunk_count(), a.chunk_count() - 1);
    }

    #[test]
    fn missing_chunks_equal_transparent_chunks() {
        let a = TiledImage::new(100, 100);
        let mut b = TiledImage::new(100, 100);
        b.put_pixel(10, 10, Rgba([0, 0, 0, 0]));
        assert_eq!(b.chunk_count(), 1);
        assert!(a.pixels_eq(&b));
        b.put_pixel(99, 99, Rgba([1, 0, 0, 1]));
        assert!(!a.pixels_eq(&b));
    }

    #[test]
    fn rgba_image_round_trip_drops_empty_chunks() {
        let mut flat = RgbaImage::new(150, 90);
        flat.put_pixel(140, 80, Rgba([9, 8, 7, 255]));
        let tiled = TiledImage::from_rgba_image(&flat);
        assert_eq!(tiled.chunk_count(), 1);
        assert_eq!(tiled.to_rgba_image(), flat);
    }

    #[test]
    fn modify_region_skips_absent_chunks_when_asked() {
        let mut img = TiledImage::new(200, 200);
        let mut visited = 0;
        img.modify_region(0, 0, 200, 200, false, |_, _, _| visited += 1);
        assert_eq!(visited, 0);
        img.modify_region(10, 10, 20, 20, true, |_, _, px| *px = Rgba([1, 2, 3, 4]));
        assert_eq!(*img.get_pixel(19, 19), Rgba([1, 2, 3, 4]));
        assert_eq!(*img.get_pixel(20, 20), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn blend_over_respects_opacity() {
        let white = Rgba([255, 255, 255, 255]);
        let black = Rgba([0, 0, 0, 255]);
        assert_eq!(blend_over(white, black, 1.0), black);
        assert_eq!(blend_over(white, black, 0.0), white);
        let half = blend_over(white, black, 0.5);
        assert!((126..=129).contains(&half[0]));
        assert_eq!(half[3], 255);
    }

    #[test]
    fn erasing_transparent_pixels_is_a_no_op() {
        let clear = Rgba([0, 0, 0, 0]);
        assert_eq!(erase_alpha(clear, 1.0), clear);
        assert_eq!(erase_alpha(Rgba([10, 20, 30, 255]), 1.0), clear);
        assert_eq!(erase_alpha(Rgba([10, 20, 30, 200]), 0.5)[3], 100);
    }

    #[test]
    fn composite_op_resets_after_scoped_use() {
        let mut canvas = LiveCanvas::new(8, 8);
        let seen = canvas.with_composite(CompositeOp::DestinationOut, |c| c.composite_op());
        assert_eq!(seen, CompositeOp::DestinationOut);
        assert_eq!(canvas.composite_op(), CompositeOp::SourceOver);
    }

    #[test]
    fn hex_colors() {
        assert_eq!(parse_hex_color("#000000"), Some([0, 0, 0, 255]));
        assert_eq!(parse_hex_color("ff000080"), Some([255, 0, 0, 128]));
        assert_eq!(parse_hex_color("#fff"), None);
        assert_eq!(to_hex_color([255, 0, 16, 255]), "#ff0010");
    }
}
