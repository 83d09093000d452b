//! Source decoding: SVG sniffing and rasterisation, then raster codecs.

use anyhow::{Context, Result};
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageReader};
use std::io::Cursor;

/// Bytes inspected when sniffing for SVG markup.
const SNIFF_LEN: usize = 512;

/// Canvas used when an SVG declares no intrinsic size.
#[cfg_attr(not(feature = "svg"), allow(dead_code))]
const DEFAULT_SVG_SIZE: u32 = 100;

/// True when the first bytes of `data` contain an `<svg` tag.
pub fn is_svg(data: &[u8]) -> bool {
    let head = &data[..data.len().min(SNIFF_LEN)];
    String::from_utf8_lossy(head).contains("<svg")
}

/// Decode source bytes.
///
/// SVG input is rendered at a canvas derived from its intrinsic size and the
/// requested `width`/`height`; when that fails the same bytes go through the
/// raster decoders.
pub fn decode(data: &[u8], width: u32, height: u32) -> Result<DynamicImage> {
    if is_svg(data) {
        match render_svg(data, width, height) {
            Ok(img) => return Ok(img),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to decode as SVG, falling back to raster decode");
            }
        }
    }

    decode_raster(data)
}

/// Decode with the raster codec set, guessing the format from magic bytes.
///
/// EXIF orientation is applied, so the result is always upright.
pub fn decode_raster(data: &[u8]) -> Result<DynamicImage> {
    let reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .context("Failed to read image header")?;

    let format = reader.format();
    let mut decoder = reader
        .into_decoder()
        .with_context(|| format!("Unsupported image format (detected: {:?})", format))?;
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);

    let mut img = DynamicImage::from_decoder(decoder)
        .with_context(|| format!("Failed to decode image (detected format: {:?})", format))?;
    img.apply_orientation(orientation);
    Ok(img)
}

#[cfg(feature = "svg")]
fn render_svg(data: &[u8], width: u32, height: u32) -> Result<DynamicImage> {
    use resvg::{tiny_skia, usvg};

    let tree = usvg::Tree::from_data(data, &usvg::Options::default())
        .map_err(|e| anyhow::anyhow!("Failed to parse SVG: {}", e))?;

    let size = tree.size();
    let (source_w, source_h) = (size.width(), size.height());
    let (intrinsic_w, intrinsic_h) = if source_w >= 1.0 && source_h >= 1.0 {
        (source_w as u32, source_h as u32)
    } else {
        (DEFAULT_SVG_SIZE, DEFAULT_SVG_SIZE)
    };

    let (target_w, target_h) =
        crate::dimensions::plan(intrinsic_w, intrinsic_h, width, height, false);

    let mut pixmap = tiny_skia::Pixmap::new(target_w, target_h).ok_or_else(|| {
        anyhow::anyhow!("Failed to allocate {}x{} SVG canvas", target_w, target_h)
    })?;

    let transform = tiny_skia::Transform::from_scale(
        target_w as f32 / source_w.max(1.0),
        target_h as f32 / source_h.max(1.0),
    );
    resvg::render(&tree, transform, &mut pixmap.as_mut());

    // tiny-skia stores premultiplied alpha
    let mut rgba = Vec::with_capacity((target_w * target_h * 4) as usize);
    for pixel in pixmap.pixels() {
        let color = pixel.demultiply();
        rgba.extend_from_slice(&[color.red(), color.green(), color.blue(), color.alpha()]);
    }

    let img = image::RgbaImage::from_raw(target_w, target_h, rgba)
        .context("Failed to create image from SVG pixmap")?;

    tracing::debug!(
        width = target_w,
        height = target_h,
        "Rendered SVG source"
    );

    Ok(DynamicImage::ImageRgba8(img))
}

#[cfg(not(feature = "svg"))]
fn render_svg(_data: &[u8], _width: u32, _height: u32) -> Result<DynamicImage> {
    Err(anyhow::anyhow!("SVG support is not enabled"))
}
