//! Pictor Processing Library
//!
//! Pixel work for the transform path: decoding, output size planning, format
//! resolution, smart crop, filters and encoding. Everything in this crate is
//! synchronous.

pub mod compression;
pub mod decoder;
pub mod dimensions;
pub mod engine;
pub mod filters;
pub mod format;
pub mod smart_crop;

// Re-export commonly used types
pub use compression::ImageCompressor;
pub use dimensions::{clamp_to_limits, plan};
pub use engine::{ProcessOptions, ProcessedOutput, ProcessingEngine};
pub use filters::{
    quality_override, BlindWatermarkCodec, BlindWatermarkFilter, FilterContext, FilterPipeline,
    FilterRegistry, ImageFilter, WatermarkFilter,
};
pub use format::{FormatResolver, OutputFormat};
pub use smart_crop::SmartCrop;
