//! Pictor Services Library
//!
//! Async orchestration on top of the processing and storage crates: source
//! loaders, URL signing, the transform/upload image service and watermark
//! detection.

pub mod image_service;
pub mod loader;
pub mod security;
pub mod telemetry;
pub mod watermark_service;

// Re-export commonly used types
pub use image_service::{CacheStatus, ImageService, ImageServiceConfig, ProcessedImage};
pub use loader::{FileLoader, HttpLoader, Loader, LoaderError, LoaderRegistry, LoaderResult};
pub use security::{HmacSigner, SourceValidator, UrlSigner};
pub use telemetry::init_telemetry;
pub use watermark_service::WatermarkService;
