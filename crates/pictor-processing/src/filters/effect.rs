use super::{param_or, FilterContext, ImageFilter};
use anyhow::{anyhow, Result};
use image::{imageops::FilterType, DynamicImage, GenericImageView, Rgba};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use rand::Rng;

const DEFAULT_CORNER_RADIUS: u32 = 10;
const DEFAULT_NOISE: f64 = 20.0;
const DEFAULT_PIXEL_SIZE: u32 = 10;

/// `rotate(degrees)` counter-clockwise.
///
/// Right angles are lossless and swap dimensions as needed; other angles rotate
/// about the centre on a same-size transparent canvas.
pub struct RotateFilter;

impl ImageFilter for RotateFilter {
    fn name(&self) -> &'static str {
        "rotate"
    }

    fn apply(&self, img: DynamicImage, params: &[String], _: &FilterContext) -> Result<DynamicImage> {
        let degrees = param_or(params, 0, 0.0f64)?;
        if !degrees.is_finite() {
            return Err(anyhow!("invalid rotation: {}", degrees));
        }

        let degrees = degrees.rem_euclid(360.0);
        let rotated = match degrees {
            d if d == 0.0 => img,
            d if d == 90.0 => img.rotate270(),
            d if d == 180.0 => img.rotate180(),
            d if d == 270.0 => img.rotate90(),
            d => {
                // imageproc rotates clockwise
                let theta = -(d.to_radians()) as f32;
                let rgba = img.into_rgba8();
                DynamicImage::ImageRgba8(rotate_about_center(
                    &rgba,
                    theta,
                    Interpolation::Bilinear,
                    Rgba([0, 0, 0, 0]),
                ))
            }
        };

        Ok(rotated)
    }
}

/// `round_corner(radius)` makes the four corners transparent
pub struct RoundCornerFilter;

impl RoundCornerFilter {
    fn outside_rounded_rect(x: u32, y: u32, width: u32, height: u32, radius: u32) -> bool {
        let (x, y, w, h, r) = (x as i64, y as i64, width as i64, height as i64, radius as i64);

        let cx = if x < r {
            r
        } else if x >= w - r {
            w - r - 1
        } else {
            return false;
        };
        let cy = if y < r {
            r
        } else if y >= h - r {
            h - r - 1
        } else {
            return false;
        };

        let (dx, dy) = (x - cx, y - cy);
        dx * dx + dy * dy > r * r
    }
}

impl ImageFilter for RoundCornerFilter {
    fn name(&self) -> &'static str {
        "round_corner"
    }

    fn apply(&self, img: DynamicImage, params: &[String], _: &FilterContext) -> Result<DynamicImage> {
        let (width, height) = img.dimensions();
        let radius = param_or(params, 0, DEFAULT_CORNER_RADIUS)?.min(width.min(height) / 2);
        if radius == 0 {
            return Ok(img);
        }

        let mut rgba = img.into_rgba8();
        for (x, y, pixel) in rgba.enumerate_pixels_mut() {
            if Self::outside_rounded_rect(x, y, width, height, radius) {
                pixel[3] = 0;
            }
        }

        Ok(DynamicImage::ImageRgba8(rgba))
    }
}

/// `noise(amount)` adds uniform per-pixel noise, 0..100
pub struct NoiseFilter;

impl ImageFilter for NoiseFilter {
    fn name(&self) -> &'static str {
        "noise"
    }

    fn apply(&self, img: DynamicImage, params: &[String], _: &FilterContext) -> Result<DynamicImage> {
        let amount = param_or(params, 0, DEFAULT_NOISE)?.clamp(0.0, 100.0);
        let range = (amount * 2.55) as i32;
        if range == 0 {
            return Ok(img);
        }

        let mut rng = rand::rng();
        let mut rgba = img.into_rgba8();
        for pixel in rgba.pixels_mut() {
            let offset = rng.random_range(-range..=range);
            for channel in 0..3 {
                pixel[channel] = (pixel[channel] as i32 + offset).clamp(0, 255) as u8;
            }
        }

        Ok(DynamicImage::ImageRgba8(rgba))
    }
}

pub struct FlipHFilter;

impl ImageFilter for FlipHFilter {
    fn name(&self) -> &'static str {
        "fliph"
    }

    fn apply(&self, img: DynamicImage, _: &[String], _: &FilterContext) -> Result<DynamicImage> {
        Ok(img.fliph())
    }
}

pub struct FlipVFilter;

impl ImageFilter for FlipVFilter {
    fn name(&self) -> &'static str {
        "flipv"
    }

    fn apply(&self, img: DynamicImage, _: &[String], _: &FilterContext) -> Result<DynamicImage> {
        Ok(img.flipv())
    }
}

/// `pixelate(size)` downsamples by `size` and scales back with nearest neighbour
pub struct PixelateFilter;

impl ImageFilter for PixelateFilter {
    fn name(&self) -> &'static str {
        "pixelate"
    }

    fn apply(&self, img: DynamicImage, params: &[String], _: &FilterContext) -> Result<DynamicImage> {
        let size = param_or(params, 0, DEFAULT_PIXEL_SIZE)?;
        if size <= 1 {
            return Ok(img);
        }

        let (width, height) = img.dimensions();
        let small = img.resize_exact(
            width.div_ceil(size),
            height.div_ceil(size),
            FilterType::Triangle,
        );
        Ok(small.resize_exact(width, height, FilterType::Nearest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    fn params(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn marked(width: u32, height: u32) -> DynamicImage {
        // Red top-left pixel on white
        DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, y| {
            if x == 0 && y == 0 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([255, 255, 255, 255])
            }
        }))
    }

    #[test]
    fn test_rotate_right_angles() {
        let ctx = FilterContext::new();

        let out = RotateFilter.apply(marked(4, 2), &params(&["90"]), &ctx).unwrap();
        assert_eq!(out.dimensions(), (2, 4));
        // Counter-clockwise: top-left ends up bottom-left
        assert_eq!(out.to_rgba8().get_pixel(0, 3).0, [255, 0, 0, 255]);

        let out = RotateFilter.apply(marked(4, 2), &params(&["-90"]), &ctx).unwrap();
        assert_eq!(out.to_rgba8().get_pixel(1, 0).0, [255, 0, 0, 255]);

        let out = RotateFilter.apply(marked(4, 2), &params(&["0"]), &ctx).unwrap();
        assert_eq!(out.to_rgba8(), marked(4, 2).to_rgba8());
    }

    #[test]
    fn test_rotate_arbitrary_keeps_canvas() {
        let out = RotateFilter
            .apply(marked(20, 10), &params(&["45"]), &FilterContext::new())
            .unwrap();
        assert_eq!(out.dimensions(), (20, 10));
        assert_eq!(out.to_rgba8().get_pixel(0, 0)[3], 0);
    }

    #[test]
    fn test_round_corner() {
        let out = RoundCornerFilter
            .apply(marked(40, 20), &params(&["100"]), &FilterContext::new())
            .unwrap()
            .to_rgba8();
        // Radius clamps to 10
        assert_eq!(out.get_pixel(0, 0)[3], 0);
        assert_eq!(out.get_pixel(39, 19)[3], 0);
        assert_eq!(out.get_pixel(20, 10)[3], 255);
        assert_eq!(out.get_pixel(20, 0)[3], 255);
        assert_eq!(out.get_pixel(10, 10)[3], 255);
    }

    #[test]
    fn test_noise_zero_is_identity() {
        let out = NoiseFilter
            .apply(marked(5, 5), &params(&["0"]), &FilterContext::new())
            .unwrap();
        assert_eq!(out.to_rgba8(), marked(5, 5).to_rgba8());

        let out = NoiseFilter
            .apply(marked(5, 5), &params(&[]), &FilterContext::new())
            .unwrap();
        assert_eq!(out.dimensions(), (5, 5));
    }

    #[test]
    fn test_pixelate_blocks() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_fn(20, 20, |x, y| {
            Rgba([(x * 12) as u8, (y * 12) as u8, 0, 255])
        }));
        let out = PixelateFilter
            .apply(img, &params(&["10"]), &FilterContext::new())
            .unwrap()
            .to_rgba8();
        assert_eq!(out.dimensions(), (20, 20));
        assert_eq!(out.get_pixel(0, 0), out.get_pixel(9, 9));
        assert_ne!(out.get_pixel(0, 0), out.get_pixel(10, 10));
    }

    #[test]
    fn test_flips() {
        let ctx = FilterContext::new();
        let out = FlipHFilter.apply(marked(3, 3), &[], &ctx).unwrap();
        assert_eq!(out.to_rgba8().get_pixel(2, 0).0, [255, 0, 0, 255]);
        let out = FlipVFilter.apply(marked(3, 3), &[], &ctx).unwrap();
        assert_eq!(out.to_rgba8().get_pixel(0, 2).0, [255, 0, 0, 255]);
    }
}
