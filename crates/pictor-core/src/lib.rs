//! Pictor Core Library
//!
//! Domain models, the error taxonomy, configuration and the transform URL parser
//! shared by every Pictor component.

pub mod config;
pub mod error;
pub mod models;
pub mod transform_url;

// Re-export commonly used types
pub use config::{
    BlindWatermarkConfig, CacheConfig, Config, LoaderConfig, LoggingConfig, ProcessingConfig,
    SecurityConfig, StorageConfig, StorageKind,
};
pub use error::{AppError, AppResult, ErrorMetadata, LogLevel};
pub use models::{CropRect, DetectionResult, FilterSpec, TransformRequest, UploadResult};
pub use transform_url::{parse_filters, split_filters, TransformUrlBuilder, TransformUrlParser};
