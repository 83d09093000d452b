//! Processing engine - turns source bytes into an encoded result
//!
//! The stages run in a fixed order with no backtracking:
//! 1. Decode (SVG sniffing, raster fallback)
//! 2. Crop (smart crop when both target dimensions are set, else manual bounds)
//! 3. Resize to the planned dimensions
//! 4. Flip
//! 5. Filters, in URL order
//! 6. Encode
//!
//! Everything here is synchronous and CPU-bound; callers run it on a blocking
//! thread.

use crate::compression::ImageCompressor;
use crate::decoder;
use crate::dimensions::{clamp_to_limits, plan};
use crate::filters::{FilterContext, FilterPipeline};
use crate::format::OutputFormat;
use crate::smart_crop::SmartCrop;
use bytes::Bytes;
use image::{imageops::FilterType, DynamicImage, GenericImageView};
use pictor_core::{AppError, AppResult, CropRect, FilterSpec, TransformRequest};
use std::time::Instant;

/// Geometry and output settings for one request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProcessOptions {
    pub width: u32,
    pub height: u32,
    pub flip_h: bool,
    pub flip_v: bool,
    pub fit_in: bool,
    pub crop: CropRect,
    pub smart: bool,
    pub format: OutputFormat,
    pub quality: u8,
}

impl ProcessOptions {
    pub fn from_request(request: &TransformRequest, format: OutputFormat, quality: u8) -> Self {
        Self {
            width: request.width,
            height: request.height,
            flip_h: request.flip_h,
            flip_v: request.flip_v,
            fit_in: request.fit_in,
            crop: request.crop,
            smart: request.smart,
            format,
            quality,
        }
    }

    /// Smart crop wins over a manual crop when both target dimensions are set.
    fn wants_smart_crop(&self) -> bool {
        self.smart && self.width > 0 && self.height > 0
    }

    fn wants_resize(&self) -> bool {
        self.width > 0 || self.height > 0
    }
}

/// Encoded output and the format that was actually produced.
#[derive(Debug, Clone)]
pub struct ProcessedOutput {
    pub bytes: Bytes,
    pub format: OutputFormat,
}

#[derive(Clone)]
pub struct ProcessingEngine {
    max_width: u32,
    max_height: u32,
    pipeline: FilterPipeline,
}

impl ProcessingEngine {
    /// `max_width`/`max_height` clamp requested dimensions; 0 disables the limit.
    pub fn new(max_width: u32, max_height: u32, pipeline: FilterPipeline) -> Self {
        Self {
            max_width,
            max_height,
            pipeline,
        }
    }

    pub fn pipeline(&self) -> &FilterPipeline {
        &self.pipeline
    }

    fn target_size(&self, opts: &ProcessOptions) -> (u32, u32) {
        clamp_to_limits(opts.width, opts.height, self.max_width, self.max_height)
    }

    /// Decode source bytes. SVG sources are rasterised at the requested size.
    pub fn decode(&self, data: &[u8], opts: &ProcessOptions) -> AppResult<DynamicImage> {
        let (width, height) = self.target_size(opts);
        decoder::decode(data, width, height).map_err(AppError::decode)
    }

    /// Crop, resize and flip.
    pub fn transform(&self, img: DynamicImage, opts: &ProcessOptions) -> AppResult<DynamicImage> {
        let mut img = img;

        if opts.wants_smart_crop() {
            match SmartCrop::crop(img.clone(), opts.width, opts.height) {
                Ok(cropped) => img = cropped,
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        width = opts.width,
                        height = opts.height,
                        "Smart crop failed, continuing without crop"
                    );
                }
            }
        } else if !opts.crop.is_empty() {
            img = Self::manual_crop(img, opts.crop)?;
        }

        if opts.wants_resize() {
            let (max_w, max_h) = self.target_size(opts);
            let (orig_w, orig_h) = img.dimensions();
            let (target_w, target_h) = plan(orig_w, orig_h, max_w, max_h, opts.fit_in);

            if (target_w, target_h) != (orig_w, orig_h) {
                tracing::debug!(
                    from_width = orig_w,
                    from_height = orig_h,
                    to_width = target_w,
                    to_height = target_h,
                    "Resizing image"
                );
                img = img.resize_exact(target_w, target_h, FilterType::Lanczos3);
            }
        }

        if opts.flip_h {
            img = img.fliph();
        }
        if opts.flip_v {
            img = img.flipv();
        }

        Ok(img)
    }

    /// Crop to `rect`, clamped to the image bounds.
    fn manual_crop(img: DynamicImage, rect: CropRect) -> AppResult<DynamicImage> {
        let (width, height) = img.dimensions();
        let right = rect.right.min(width);
        let bottom = rect.bottom.min(height);

        if rect.left >= right || rect.top >= bottom {
            return Err(AppError::Processing {
                stage: "crop",
                message: format!(
                    "crop {}x{}:{}x{} lies outside the {}x{} image",
                    rect.left, rect.top, rect.right, rect.bottom, width, height
                ),
            });
        }

        Ok(img.crop_imm(rect.left, rect.top, right - rect.left, bottom - rect.top))
    }

    pub fn encode(&self, img: &DynamicImage, opts: &ProcessOptions) -> AppResult<ProcessedOutput> {
        let (bytes, format) =
            ImageCompressor::compress(img, opts.format, opts.quality).map_err(AppError::encode)?;
        Ok(ProcessedOutput { bytes, format })
    }

    /// Full decode → transform → filters → encode run.
    pub fn run(
        &self,
        data: &[u8],
        opts: &ProcessOptions,
        filters: &[FilterSpec],
        ctx: &FilterContext,
    ) -> AppResult<ProcessedOutput> {
        let start = Instant::now();

        let img = self.decode(data, opts)?;
        let (source_w, source_h) = img.dimensions();

        let img = self.transform(img, opts)?;
        let img = self.pipeline.apply(img, filters, ctx)?;
        let (out_w, out_h) = img.dimensions();

        let output = self.encode(&img, opts)?;

        tracing::debug!(
            source_width = source_w,
            source_height = source_h,
            width = out_w,
            height = out_h,
            format = %output.format,
            size_bytes = output.bytes.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Image processed"
        );

        Ok(output)
    }
}

impl Default for ProcessingEngine {
    fn default() -> Self {
        Self::new(0, 0, FilterPipeline::default())
    }
}
