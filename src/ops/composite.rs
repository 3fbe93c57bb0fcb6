use image::{Rgba, RgbaImage};
use rayon::prelude::*;

use crate::canvas::{blend_over, Layer, TiledImage, CHUNK_SIZE};

// ============================================================================
// COMPOSITE RENDERER – flatten visible layers bottom→top
// ============================================================================

/// Flatten `layers` into one raster.
///
/// Layers are drawn in index order (0 = bottom) at their opacity; hidden
/// layers and layers at opacity 0 contribute nothing at all.  `live`
/// substitutes the pixels of one layer (the active layer's working surface)
/// for its committed content, which is how previews are rendered.
///
/// Pure with respect to its inputs: the same layers always flatten to the
/// same pixels.  Content that cannot be decoded is skipped with a warning so
/// a flattened image is always produced.
pub fn flatten(
    layers: &[Layer],
    width: u32,
    height: u32,
    live: Option<(usize, &TiledImage)>,
) -> RgbaImage {
    let resolved: Vec<(TiledImage, f32)> = layers
        .iter()
        .enumerate()
        .filter(|(_, layer)| layer.visible && layer.opacity > 0.0)
        .filter_map(|(idx, layer)| {
            if let Some((live_idx, pixels)) = live {
                if live_idx == idx {
                    return Some((pixels.clone(), layer.opacity));
                }
            }
            match layer.content.decode(width, height) {
                Ok(pixels) => Some((pixels, layer.opacity)),
                Err(e) => {
                    log::warn!("composite: skipping layer '{}': {}", layer.name, e);
                    None
                }
            }
        })
        .collect();

    composite_tiled(&resolved, width, height)
}

/// Blend pre-resolved rasters (bottom first) chunk by chunk.
pub fn composite_tiled(layers: &[(TiledImage, f32)], width: u32, height: u32) -> RgbaImage {
    let mut out = RgbaImage::new(width, height);
    if width == 0 || height == 0 {
        return out;
    }

    // Only chunks that some layer populates can be non-transparent
    let mut keys: Vec<(u32, u32)> = layers
        .iter()
        .flat_map(|(pixels, _)| pixels.chunk_keys().collect::<Vec<_>>())
        .collect();
    keys.sort_unstable();
    keys.dedup();

    let blended: Vec<((u32, u32), RgbaImage)> = keys
        .par_iter()
        .map(|&(cx, cy)| {
            let mut chunk = RgbaImage::new(CHUNK_SIZE, CHUNK_SIZE);
            for (pixels, opacity) in layers {
                let Some(src) = pixels.get_chunk(cx, cy) else {
                    continue;
                };
                for (dst, top) in chunk.pixels_mut().zip(src.pixels()) {
                    *dst = blend_over(*dst, *top, *opacity);
                }
            }
            ((cx, cy), chunk)
        })
        .collect();

    for ((cx, cy), chunk) in blended {
        let base_x = cx * CHUNK_SIZE;
        let base_y = cy * CHUNK_SIZE;
        let cw = CHUNK_SIZE.min(width.saturating_sub(base_x));
        let ch = CHUNK_SIZE.min(height.saturating_sub(base_y));
        for ly in 0..ch {
            for lx in 0..cw {
                let px: Rgba<u8> = *chunk.get_pixel(lx, ly);
                out.put_pixel(base_x + lx, base_y + ly, px);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{LayerContent, LayerKind};
    use std::sync::Arc;

    fn solid(color: [u8; 4], w: u32, h: u32) -> Layer {
        Layer::new(
            "solid",
            LayerKind::Drawing,
            LayerContent::Raster(TiledImage::new_filled(w, h, Rgba(color))),
        )
    }

    #[test]
    fn top_layer_wins_when_opaque() {
        let layers = vec![solid([255, 255, 255, 255], 70, 70), solid([255, 0, 0, 255], 70, 70)];
        let img = flatten(&layers, 70, 70, None);
        assert_eq!(*img.get_pixel(69, 69), Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn hidden_and_transparent_layers_are_skipped() {
        let mut layers = vec![solid([255, 255, 255, 255], 20, 20), solid([0, 0, 0, 255], 20, 20)];
        let base = flatten(&layers[..1], 20, 20, None);
        layers[1].visible = false;
        assert_eq!(flatten(&layers, 20, 20, None), base);
        layers[1].visible = true;
        layers[1].opacity = 0.0;
        assert_eq!(flatten(&layers, 20, 20, None), base);
    }

    #[test]
    fn live_pixels_override_committed_content() {
        let layers = vec![solid([255, 255, 255, 255], 10, 10), Layer::blank("ink")];
        let mut live = TiledImage::new(10, 10);
        live.put_pixel(2, 2, Rgba([0, 0, 255, 255]));
        let img = flatten(&layers, 10, 10, Some((1, &live)));
        assert_eq!(*img.get_pixel(2, 2), Rgba([0, 0, 255, 255]));
        assert_eq!(*img.get_pixel(3, 3), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn undecodable_layer_is_skipped() {
        let bogus = Layer::new(
            "broken",
            LayerKind::Image,
            LayerContent::Encoded(Arc::from(vec![0u8, 1, 2, 3])),
        );
        let layers = vec![solid([9, 9, 9, 255], 8, 8), bogus];
        let img = flatten(&layers, 8, 8, None);
        assert_eq!(*img.get_pixel(0, 0), Rgba([9, 9, 9, 255]));
    }

    #[test]
    fn flatten_is_deterministic() {
        let mut layers = vec![solid([255, 255, 255, 255], 90, 90), solid([10, 200, 30, 128], 90, 90)];
        layers[1].opacity = 0.4;
        assert_eq!(flatten(&layers, 90, 90, None), flatten(&layers, 90, 90, None));
    }
}
