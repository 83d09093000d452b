use super::{param_or, FilterContext, ImageFilter};
use anyhow::{anyhow, Result};
use image::{DynamicImage, Rgba};

/// Map every colour channel through a 256-entry table, keeping alpha.
pub(super) fn apply_lut(img: DynamicImage, lut: &[u8; 256]) -> DynamicImage {
    let mut rgba = img.into_rgba8();
    for pixel in rgba.pixels_mut() {
        let Rgba([r, g, b, a]) = *pixel;
        *pixel = Rgba([lut[r as usize], lut[g as usize], lut[b as usize], a]);
    }
    DynamicImage::ImageRgba8(rgba)
}

pub(super) fn build_lut(f: impl Fn(f64) -> f64) -> [u8; 256] {
    let mut lut = [0u8; 256];
    for (i, slot) in lut.iter_mut().enumerate() {
        *slot = f(i as f64).round().clamp(0.0, 255.0) as u8;
    }
    lut
}

/// Contrast table: -100..100, 0 is identity.
pub(super) fn contrast_lut(pct: f64) -> [u8; 256] {
    let factor = 1.0 + pct / 100.0;
    let intercept = 128.0 * (1.0 - factor);
    build_lut(|v| v * factor + intercept)
}

fn percentage(params: &[String]) -> Result<f64> {
    Ok(param_or(params, 0, 0.0f64)?.clamp(-100.0, 100.0))
}

fn positive_sigma(params: &[String]) -> Result<f32> {
    let sigma = param_or(params, 0, 1.0f32)?;
    if sigma <= 0.0 || !sigma.is_finite() {
        return Err(anyhow!("sigma must be positive, got {}", sigma));
    }
    Ok(sigma)
}

/// `blur(sigma)` Gaussian blur
pub struct BlurFilter;

impl ImageFilter for BlurFilter {
    fn name(&self) -> &'static str {
        "blur"
    }

    fn apply(&self, img: DynamicImage, params: &[String], _: &FilterContext) -> Result<DynamicImage> {
        let sigma = positive_sigma(params)?;
        Ok(img.blur(sigma))
    }
}

/// `sharpen(sigma)` unsharp mask
pub struct SharpenFilter;

impl ImageFilter for SharpenFilter {
    fn name(&self) -> &'static str {
        "sharpen"
    }

    fn apply(&self, img: DynamicImage, params: &[String], _: &FilterContext) -> Result<DynamicImage> {
        let sigma = positive_sigma(params)?;
        Ok(img.unsharpen(sigma, 1))
    }
}

pub struct GrayscaleFilter;

impl ImageFilter for GrayscaleFilter {
    fn name(&self) -> &'static str {
        "grayscale"
    }

    fn apply(&self, img: DynamicImage, _: &[String], _: &FilterContext) -> Result<DynamicImage> {
        Ok(img.grayscale())
    }
}

/// `brightness(pct)` shifts every channel by `pct`% of full scale
pub struct BrightnessFilter;

impl ImageFilter for BrightnessFilter {
    fn name(&self) -> &'static str {
        "brightness"
    }

    fn apply(&self, img: DynamicImage, params: &[String], _: &FilterContext) -> Result<DynamicImage> {
        let shift = percentage(params)? * 255.0 / 100.0;
        if shift == 0.0 {
            return Ok(img);
        }
        Ok(apply_lut(img, &build_lut(|v| v + shift)))
    }
}

pub struct ContrastFilter;

impl ImageFilter for ContrastFilter {
    fn name(&self) -> &'static str {
        "contrast"
    }

    fn apply(&self, img: DynamicImage, params: &[String], _: &FilterContext) -> Result<DynamicImage> {
        let pct = percentage(params)?;
        if pct == 0.0 {
            return Ok(img);
        }
        Ok(apply_lut(img, &contrast_lut(pct)))
    }
}

/// `saturation(pct)` pushes channels away from (or toward) the pixel's luma
pub struct SaturationFilter;

impl ImageFilter for SaturationFilter {
    fn name(&self) -> &'static str {
        "saturation"
    }

    fn apply(&self, img: DynamicImage, params: &[String], _: &FilterContext) -> Result<DynamicImage> {
        let factor = 1.0 + percentage(params)? as f32 / 100.0;
        let mut rgba = img.into_rgba8();

        for pixel in rgba.pixels_mut() {
            let Rgba([r, g, b, a]) = *pixel;
            let gray = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
            let saturate = |c: u8| (gray + (c as f32 - gray) * factor).clamp(0.0, 255.0) as u8;
            *pixel = Rgba([saturate(r), saturate(g), saturate(b), a]);
        }

        Ok(DynamicImage::ImageRgba8(rgba))
    }
}

pub struct InvertFilter;

impl ImageFilter for InvertFilter {
    fn name(&self) -> &'static str {
        "invert"
    }

    fn apply(&self, img: DynamicImage, _: &[String], _: &FilterContext) -> Result<DynamicImage> {
        Ok(apply_lut(img, &build_lut(|v| 255.0 - v)))
    }
}

pub struct NoopFilter;

impl ImageFilter for NoopFilter {
    fn name(&self) -> &'static str {
        "noop"
    }

    fn apply(&self, img: DynamicImage, _: &[String], _: &FilterContext) -> Result<DynamicImage> {
        Ok(img)
    }
}
