use std::fs::File;
use std::io::{BufWriter, Cursor, Write};
use std::path::Path;

use base64::{engine::general_purpose, Engine as _};
use image::codecs::png::PngEncoder;
use image::io::{Limits, Reader as ImageReader};
use image::{ImageEncoder, RgbaImage};

use crate::canvas::LayerContent;
use crate::error::{EngineError, Result};

const DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// Maximum decoded dimension per axis, to keep crafted inputs from
/// exhausting memory.
const MAX_DECODE_DIM: u32 = 16_384;

// ============================================================================
// PNG
// ============================================================================

/// Encode an RGBA image as PNG bytes.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    let encoder = PngEncoder::new(&mut bytes);
    encoder.write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        image::ColorType::Rgba8,
    )?;
    Ok(bytes)
}

fn reader(bytes: &[u8]) -> Result<ImageReader<Cursor<&[u8]>>> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| EngineError::Decode(e.to_string()))
}

/// Decode any image format the `image` crate understands into RGBA8.
///
/// The header is checked against the size limit before any pixel data is
/// inflated.
pub fn decode_image(bytes: &[u8]) -> Result<RgbaImage> {
    let (width, height) = reader(bytes)?.into_dimensions()?;
    if width > MAX_DECODE_DIM || height > MAX_DECODE_DIM {
        return Err(EngineError::Decode(format!(
            "image {}×{} exceeds the {} pixel limit",
            width, height, MAX_DECODE_DIM
        )));
    }

    let mut limits = Limits::default();
    limits.max_image_width = Some(MAX_DECODE_DIM);
    limits.max_image_height = Some(MAX_DECODE_DIM);
    let mut reader = reader(bytes)?;
    reader.limits(limits);
    Ok(reader.decode()?.to_rgba8())
}

/// Encode and write a PNG file.
pub fn write_png(image: &RgbaImage, path: &Path) -> Result<()> {
    let bytes = encode_png(image)?;
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

// ============================================================================
// DATA URLS
// ============================================================================

pub fn png_data_url(png: &[u8]) -> String {
    format!("{}{}", DATA_URL_PREFIX, general_purpose::STANDARD.encode(png))
}

/// PNG bytes from a `data:image/png;base64,...` URL.
pub fn parse_png_data_url(url: &str) -> Result<Vec<u8>> {
    let payload = url
        .strip_prefix(DATA_URL_PREFIX)
        .ok_or_else(|| EngineError::Decode("not a PNG data URL".into()))?;
    general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| EngineError::Decode(e.to_string()))
}

/// Serialized form of layer content: `""` for an empty layer, otherwise a
/// PNG data URL.  Encoded content is passed through without re-encoding.
pub fn content_data_url(content: &LayerContent) -> Result<String> {
    match content {
        LayerContent::Empty => Ok(String::new()),
        LayerContent::Raster(pixels) => Ok(png_data_url(&encode_png(&pixels.to_rgba_image())?)),
        LayerContent::Encoded(bytes) => Ok(png_data_url(bytes)),
    }
}

/// Inverse of [`content_data_url`].
pub fn content_from_data_url(url: &str) -> Result<LayerContent> {
    if url.is_empty() {
        return Ok(LayerContent::Empty);
    }
    Ok(LayerContent::Encoded(parse_png_data_url(url)?.into()))
}

// ============================================================================
// JSON
// ============================================================================

pub fn write_json(value: &serde_json::Value, path: &Path) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::TiledImage;
    use image::Rgba;

    #[test]
    fn png_survives_encode_decode() {
        let mut img = RgbaImage::new(5, 3);
        img.put_pixel(4, 2, Rgba([1, 2, 3, 4]));
        let decoded = decode_image(&encode_png(&img).unwrap()).unwrap();
        assert_eq!(decoded, img);
    }

    #[test]
    fn garbage_fails_to_decode() {
        assert!(matches!(decode_image(b"nope"), Err(EngineError::Decode(_))));
    }

    #[test]
    fn oversized_header_is_rejected_before_decoding() {
        let wide = RgbaImage::new(MAX_DECODE_DIM + 1, 1);
        let png = encode_png(&wide).unwrap();
        let err = decode_image(&png).unwrap_err();
        assert!(err.to_string().contains("exceeds"), "{}", err);
    }

    #[test]
    fn content_data_urls() {
        assert_eq!(content_data_url(&LayerContent::Empty).unwrap(), "");
        assert!(content_from_data_url("").unwrap().is_empty());

        let mut pixels = TiledImage::new(4, 4);
        pixels.put_pixel(1, 1, Rgba([255, 0, 0, 255]));
        let url = content_data_url(&LayerContent::Raster(pixels.clone())).unwrap();
        assert!(url.starts_with("data:image/png;base64,"));

        let back = content_from_data_url(&url).unwrap().decode(4, 4).unwrap();
        assert!(back.pixels_eq(&pixels));
    }

    #[test]
    fn rejects_non_png_urls() {
        assert!(parse_png_data_url("data:text/plain;base64,aGk=").is_err());
    }
}
