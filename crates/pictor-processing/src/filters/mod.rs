//! Named, parameterised image filters applied after resizing.
//!
//! Each filter implements [`ImageFilter`] and is looked up by name in a
//! [`FilterRegistry`]. The [`FilterPipeline`] applies the filters of a request in
//! URL order.

mod basic;
pub mod blind_watermark;
mod color;
pub mod dct;
mod effect;
mod output;
mod pipeline;
mod registry;
mod watermark;

pub use basic::{
    BlurFilter, BrightnessFilter, ContrastFilter, GrayscaleFilter, InvertFilter, NoopFilter,
    SaturationFilter, SharpenFilter,
};
pub use blind_watermark::{BlindWatermarkCodec, BlindWatermarkFilter, DEFAULT_STRENGTH};
pub use color::{EqualizeFilter, GammaFilter, HueFilter, RgbFilter, SepiaFilter};
pub use effect::{
    FlipHFilter, FlipVFilter, NoiseFilter, PixelateFilter, RotateFilter, RoundCornerFilter,
};
pub use output::{
    quality_override, AutoOrientFilter, FormatFilter, QualityFilter, StripExifFilter,
    StripIccFilter,
};
pub use pipeline::FilterPipeline;
pub use registry::FilterRegistry;
pub use watermark::{WatermarkFilter, WatermarkPosition};

use anyhow::{anyhow, Result};
use bytes::Bytes;
use image::DynamicImage;
use std::collections::HashMap;
use std::str::FromStr;

/// A named image filter.
///
/// `params` are the raw strings from the URL; each filter parses its own.
pub trait ImageFilter: Send + Sync {
    fn name(&self) -> &'static str;

    fn apply(
        &self,
        img: DynamicImage,
        params: &[String],
        ctx: &FilterContext,
    ) -> Result<DynamicImage>;
}

/// Per-request inputs that filters cannot fetch themselves.
///
/// Filters run on a blocking thread, so anything that needs I/O (watermark
/// overlays) is loaded beforehand and handed over here keyed by source.
#[derive(Debug, Clone, Default)]
pub struct FilterContext {
    overlays: HashMap<String, Bytes>,
}

impl FilterContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_overlay(mut self, source: impl Into<String>, data: Bytes) -> Self {
        self.insert_overlay(source, data);
        self
    }

    pub fn insert_overlay(&mut self, source: impl Into<String>, data: Bytes) {
        self.overlays.insert(source.into(), data);
    }

    pub fn overlay(&self, source: &str) -> Option<&Bytes> {
        self.overlays.get(source)
    }
}

/// Parse `params[index]`, using `default` when it is missing or blank.
pub(crate) fn param_or<T: FromStr>(params: &[String], index: usize, default: T) -> Result<T> {
    match params.get(index).map(|p| p.trim()) {
        None | Some("") => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|_| anyhow!("invalid parameter #{}: {:?}", index + 1, raw)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_param_or() {
        assert_eq!(param_or(&params(&["2.5"]), 0, 1.0f64).unwrap(), 2.5);
        assert_eq!(param_or(&params(&[]), 0, 1.0f64).unwrap(), 1.0);
        assert_eq!(param_or(&params(&[" "]), 0, 7i32).unwrap(), 7);
        assert!(param_or(&params(&["abc"]), 0, 1i32).is_err());
    }

    #[test]
    fn test_context_overlays() {
        let ctx = FilterContext::new().with_overlay("logo.png", Bytes::from_static(b"png"));
        assert_eq!(ctx.overlay("logo.png").unwrap().as_ref(), b"png");
        assert!(ctx.overlay("other.png").is_none());
    }
}
