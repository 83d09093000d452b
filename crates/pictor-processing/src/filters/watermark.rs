use super::{param_or, FilterContext, ImageFilter};
use anyhow::Result;
use image::{imageops, DynamicImage, GenericImageView, RgbaImage};
use pictor_core::FilterSpec;

const DEFAULT_OFFSET: i64 = 10;
const MIN_SCALE: f32 = 0.1;
const MAX_SCALE: f32 = 2.0;

/// Watermark anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WatermarkPosition {
    Center,
    TopLeft,
    TopRight,
    BottomLeft,
    #[default]
    BottomRight,
    Top,
    Bottom,
    Left,
    Right,
}

impl WatermarkPosition {
    /// Unknown names fall back to bottom-right.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "center" | "c" => WatermarkPosition::Center,
            "top-left" | "tl" | "topleft" => WatermarkPosition::TopLeft,
            "top-right" | "tr" | "topright" => WatermarkPosition::TopRight,
            "bottom-left" | "bl" | "bottomleft" => WatermarkPosition::BottomLeft,
            "top" | "t" => WatermarkPosition::Top,
            "bottom" | "b" => WatermarkPosition::Bottom,
            "left" | "l" => WatermarkPosition::Left,
            "right" | "r" => WatermarkPosition::Right,
            _ => WatermarkPosition::BottomRight,
        }
    }

    /// Top-left corner of a `mark` sized overlay on a `base` sized image.
    ///
    /// Offsets push the overlay inwards from the edges it is anchored to.
    pub fn place(self, base: (u32, u32), mark: (u32, u32), offset: (i64, i64)) -> (i64, i64) {
        let (bw, bh) = (base.0 as i64, base.1 as i64);
        let (mw, mh) = (mark.0 as i64, mark.1 as i64);
        let (ox, oy) = offset;
        let center_x = (bw - mw) / 2;
        let center_y = (bh - mh) / 2;

        match self {
            WatermarkPosition::Center => (center_x, center_y),
            WatermarkPosition::TopLeft => (ox, oy),
            WatermarkPosition::TopRight => (bw - mw - ox, oy),
            WatermarkPosition::BottomLeft => (ox, bh - mh - oy),
            WatermarkPosition::BottomRight => (bw - mw - ox, bh - mh - oy),
            WatermarkPosition::Top => (center_x, oy),
            WatermarkPosition::Bottom => (center_x, bh - mh - oy),
            WatermarkPosition::Left => (ox, center_y),
            WatermarkPosition::Right => (bw - mw - ox, center_y),
        }
    }
}

/// `watermark(source, position, alpha, x, y, scale)` overlays another image.
///
/// The overlay bytes must already be in the [`FilterContext`]; a missing or
/// undecodable overlay leaves the image untouched.
pub struct WatermarkFilter;

impl WatermarkFilter {
    /// Overlay sources referenced by `specs`, in order, without duplicates.
    pub fn overlay_sources(specs: &[FilterSpec]) -> Vec<String> {
        let mut sources: Vec<String> = Vec::new();
        for spec in specs.iter().filter(|s| s.name == "watermark") {
            if let Some(source) = spec.param(0).map(str::trim).filter(|s| !s.is_empty()) {
                if !sources.iter().any(|s| s == source) {
                    sources.push(source.to_string());
                }
            }
        }
        sources
    }

    fn prepare_overlay(data: &[u8], scale: f32, alpha: f32) -> Result<RgbaImage> {
        let mut overlay = crate::decoder::decode(data, 0, 0)?.into_rgba8();

        if (scale - 1.0).abs() > f32::EPSILON {
            let (w, h) = overlay.dimensions();
            let target_w = ((w as f32 * scale) as u32).max(1);
            let target_h = ((h as f32 * scale) as u32).max(1);
            overlay = imageops::resize(&overlay, target_w, target_h, imageops::FilterType::Lanczos3);
        }

        if alpha < 1.0 {
            for pixel in overlay.pixels_mut() {
                pixel[3] = (pixel[3] as f32 * alpha) as u8;
            }
        }

        Ok(overlay)
    }
}

impl ImageFilter for WatermarkFilter {
    fn name(&self) -> &'static str {
        "watermark"
    }

    fn apply(&self, img: DynamicImage, params: &[String], ctx: &FilterContext) -> Result<DynamicImage> {
        let Some(source) = params.first().map(|s| s.trim()).filter(|s| !s.is_empty()) else {
            tracing::warn!("Watermark filter without a source, skipping");
            return Ok(img);
        };

        let position = params
            .get(1)
            .map(|p| WatermarkPosition::parse(p))
            .unwrap_or_default();
        let alpha = param_or(params, 2, 100.0f32)?.clamp(0.0, 100.0) / 100.0;
        let offset_x = param_or(params, 3, DEFAULT_OFFSET)?;
        let offset_y = param_or(params, 4, DEFAULT_OFFSET)?;
        let scale = param_or(params, 5, 1.0f32)?.clamp(MIN_SCALE, MAX_SCALE);

        let Some(data) = ctx.overlay(source) else {
            tracing::warn!(source = %source, "Watermark overlay not loaded, skipping");
            return Ok(img);
        };

        let overlay = match Self::prepare_overlay(data, scale, alpha) {
            Ok(overlay) => overlay,
            Err(e) => {
                tracing::warn!(source = %source, error = %e, "Failed to decode watermark overlay, skipping");
                return Ok(img);
            }
        };

        let (x, y) = position.place(img.dimensions(), overlay.dimensions(), (offset_x, offset_y));

        let mut base = img.into_rgba8();
        imageops::overlay(&mut base, &overlay, x, y);

        Ok(DynamicImage::ImageRgba8(base))
    }
}
