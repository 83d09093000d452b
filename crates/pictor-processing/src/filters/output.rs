//! Filters that steer encoding rather than pixels.
//!
//! Decoding drops every metadata block, so `strip_exif` and `strip_icc` hold
//! trivially and only exist so URLs that carry them stay valid.

use super::{param_or, FilterContext, ImageFilter};
use crate::format::OutputFormat;
use anyhow::{anyhow, Result};
use image::DynamicImage;
use pictor_core::FilterSpec;

const DEFAULT_QUALITY: u8 = 85;

fn parse_quality(params: &[String]) -> Result<u8> {
    let quality = param_or(params, 0, DEFAULT_QUALITY as i64)?;
    if !(1..=100).contains(&quality) {
        return Err(anyhow!("quality must be between 1 and 100, got {}", quality));
    }
    Ok(quality as u8)
}

/// Quality requested by the last valid `quality(n)` filter, if any.
pub fn quality_override(specs: &[FilterSpec]) -> Option<u8> {
    specs
        .iter()
        .rev()
        .filter(|spec| spec.name == "quality")
        .find_map(|spec| parse_quality(&spec.params).ok())
}

/// `quality(n)` output quality, 1..100
pub struct QualityFilter;

impl ImageFilter for QualityFilter {
    fn name(&self) -> &'static str {
        "quality"
    }

    fn apply(&self, img: DynamicImage, params: &[String], _: &FilterContext) -> Result<DynamicImage> {
        if let Err(e) = parse_quality(params) {
            tracing::debug!(error = %e, "Ignoring invalid quality, using default");
        }
        Ok(img)
    }
}

/// `format(name)` output format. Names the encoder cannot produce resolve to JPEG.
pub struct FormatFilter;

impl ImageFilter for FormatFilter {
    fn name(&self) -> &'static str {
        "format"
    }

    fn apply(&self, img: DynamicImage, params: &[String], _: &FilterContext) -> Result<DynamicImage> {
        let name = params.first().map(|p| p.trim()).unwrap_or_default();
        if OutputFormat::parse(name).is_err() {
            tracing::debug!(format = %name, "Unknown output format, using jpeg");
        }
        Ok(img)
    }
}

pub struct StripExifFilter;

impl ImageFilter for StripExifFilter {
    fn name(&self) -> &'static str {
        "strip_exif"
    }

    fn apply(&self, img: DynamicImage, _: &[String], _: &FilterContext) -> Result<DynamicImage> {
        Ok(img)
    }
}

pub struct StripIccFilter;

impl ImageFilter for StripIccFilter {
    fn name(&self) -> &'static str {
        "strip_icc"
    }

    fn apply(&self, img: DynamicImage, _: &[String], _: &FilterContext) -> Result<DynamicImage> {
        Ok(img)
    }
}

/// Orientation is applied by the decoder; accepted for URL compatibility.
pub struct AutoOrientFilter;

impl ImageFilter for AutoOrientFilter {
    fn name(&self) -> &'static str {
        "autoorient"
    }

    fn apply(&self, img: DynamicImage, _: &[String], _: &FilterContext) -> Result<DynamicImage> {
        Ok(img)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    fn spec(name: &str, params: &[&str]) -> FilterSpec {
        FilterSpec::new(name, params.iter().map(|p| p.to_string()).collect())
    }

    #[test]
    fn test_quality_override_takes_last_valid() {
        assert_eq!(quality_override(&[]), None);
        assert_eq!(quality_override(&[spec("quality", &["40"])]), Some(40));
        assert_eq!(
            quality_override(&[spec("quality", &["40"]), spec("quality", &["0"])]),
            Some(40)
        );
        assert_eq!(quality_override(&[spec("blur", &["40"])]), None);
        assert_eq!(quality_override(&[spec("quality", &[])]), Some(85));
    }

    #[test]
    fn test_quality_and_format_never_fail() {
        let img = DynamicImage::ImageRgba8(RgbaImage::new(2, 2));
        let ctx = FilterContext::new();
        for quality in ["101", "0", "abc", "70"] {
            assert!(QualityFilter.apply(img.clone(), &[quality.to_string()], &ctx).is_ok());
        }
        for format in ["jpg", "bmp", ""] {
            assert!(FormatFilter.apply(img.clone(), &[format.to_string()], &ctx).is_ok());
        }
        assert!(FormatFilter.apply(img, &[], &ctx).is_ok());
    }
}
