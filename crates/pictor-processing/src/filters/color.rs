use super::basic::{apply_lut, build_lut, contrast_lut};
use super::{param_or, FilterContext, ImageFilter};
use anyhow::Result;
use image::{DynamicImage, Rgba};

/// Gamma and contrast used by `equalize()`.
const EQUALIZE_GAMMA: f64 = 1.2;
const EQUALIZE_CONTRAST: f64 = 10.0;

fn gamma_lut(gamma: f64) -> [u8; 256] {
    let exponent = 1.0 / gamma;
    build_lut(|v| 255.0 * (v / 255.0).powf(exponent))
}

/// `rgb(r,g,b)` scales each channel by `1 + pct/100`
pub struct RgbFilter;

impl ImageFilter for RgbFilter {
    fn name(&self) -> &'static str {
        "rgb"
    }

    fn apply(&self, img: DynamicImage, params: &[String], _: &FilterContext) -> Result<DynamicImage> {
        let mut factors = [1.0f32; 3];
        for (i, factor) in factors.iter_mut().enumerate() {
            *factor = 1.0 + param_or(params, i, 0.0f32)?.clamp(-100.0, 100.0) / 100.0;
        }

        let mut rgba = img.into_rgba8();
        for pixel in rgba.pixels_mut() {
            let Rgba([r, g, b, a]) = *pixel;
            let scale = |c: u8, f: f32| (c as f32 * f).clamp(0.0, 255.0) as u8;
            *pixel = Rgba([
                scale(r, factors[0]),
                scale(g, factors[1]),
                scale(b, factors[2]),
                a,
            ]);
        }

        Ok(DynamicImage::ImageRgba8(rgba))
    }
}

/// `sepia(intensity)` blends the sepia tone over the original, 0..100
pub struct SepiaFilter;

impl ImageFilter for SepiaFilter {
    fn name(&self) -> &'static str {
        "sepia"
    }

    fn apply(&self, img: DynamicImage, params: &[String], _: &FilterContext) -> Result<DynamicImage> {
        let intensity = param_or(params, 0, 100.0f32)?.clamp(0.0, 100.0) / 100.0;
        if intensity == 0.0 {
            return Ok(img);
        }

        let mut rgba = img.into_rgba8();
        for pixel in rgba.pixels_mut() {
            let Rgba([r, g, b, a]) = *pixel;
            let (r, g, b) = (r as f32, g as f32, b as f32);

            let tr = (0.393 * r + 0.769 * g + 0.189 * b).min(255.0);
            let tg = (0.349 * r + 0.686 * g + 0.168 * b).min(255.0);
            let tb = (0.272 * r + 0.534 * g + 0.131 * b).min(255.0);

            let blend = |orig: f32, tone: f32| (orig + (tone - orig) * intensity) as u8;
            *pixel = Rgba([blend(r, tr), blend(g, tg), blend(b, tb), a]);
        }

        Ok(DynamicImage::ImageRgba8(rgba))
    }
}

/// `equalize()` mild tone lift: gamma then a little contrast
pub struct EqualizeFilter;

impl ImageFilter for EqualizeFilter {
    fn name(&self) -> &'static str {
        "equalize"
    }

    fn apply(&self, img: DynamicImage, _: &[String], _: &FilterContext) -> Result<DynamicImage> {
        let img = apply_lut(img, &gamma_lut(EQUALIZE_GAMMA));
        Ok(apply_lut(img, &contrast_lut(EQUALIZE_CONTRAST)))
    }
}

/// `gamma(g)`, g in 0.1..10; above 1 brightens
pub struct GammaFilter;

impl ImageFilter for GammaFilter {
    fn name(&self) -> &'static str {
        "gamma"
    }

    fn apply(&self, img: DynamicImage, params: &[String], _: &FilterContext) -> Result<DynamicImage> {
        let gamma = param_or(params, 0, 1.0f64)?.clamp(0.1, 10.0);
        if gamma == 1.0 {
            return Ok(img);
        }
        Ok(apply_lut(img, &gamma_lut(gamma)))
    }
}

/// `hue(degrees)` rotates hue in HSL space, -180..180
pub struct HueFilter;

impl ImageFilter for HueFilter {
    fn name(&self) -> &'static str {
        "hue"
    }

    fn apply(&self, img: DynamicImage, params: &[String], _: &FilterContext) -> Result<DynamicImage> {
        let degrees = param_or(params, 0, 0.0f64)?.clamp(-180.0, 180.0);
        if degrees == 0.0 {
            return Ok(img);
        }
        let shift = degrees / 360.0;

        let mut rgba = img.into_rgba8();
        for pixel in rgba.pixels_mut() {
            let Rgba([r, g, b, a]) = *pixel;
            let (h, s, l) = rgb_to_hsl(r, g, b);
            let (r, g, b) = hsl_to_rgb((h + shift).rem_euclid(1.0), s, l);
            *pixel = Rgba([r, g, b, a]);
        }

        Ok(DynamicImage::ImageRgba8(rgba))
    }
}

/// HSL with every component in 0..1.
fn rgb_to_hsl(r: u8, g: u8, b: u8) -> (f64, f64, f64) {
    let (r, g, b) = (r as f64 / 255.0, g as f64 / 255.0, b as f64 / 255.0);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;

    if max == min {
        return (0.0, 0.0, l);
    }

    let d = max - min;
    let s = if l > 0.5 {
        d / (2.0 - max - min)
    } else {
        d / (max + min)
    };

    let h = if max == r {
        (g - b) / d + if g < b { 6.0 } else { 0.0 }
    } else if max == g {
        (b - r) / d + 2.0
    } else {
        (r - g) / d + 4.0
    };

    (h / 6.0, s, l)
}

fn hsl_to_rgb(h: f64, s: f64, l: f64) -> (u8, u8, u8) {
    let to_u8 = |v: f64| (v * 255.0).round().clamp(0.0, 255.0) as u8;

    if s == 0.0 {
        let v = to_u8(l);
        return (v, v, v);
    }

    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;

    (
        to_u8(hue_to_rgb(p, q, h + 1.0 / 3.0)),
        to_u8(hue_to_rgb(p, q, h)),
        to_u8(hue_to_rgb(p, q, h - 1.0 / 3.0)),
    )
}

fn hue_to_rgb(p: f64, q: f64, t: f64) -> f64 {
    let t = t.rem_euclid(1.0);
    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 0.5 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * (2.0 / 3.0 - t) * 6.0
    } else {
        p
    }
}
