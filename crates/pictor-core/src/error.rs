//! Error types module
//!
//! All failures that can reach a caller are unified under [`AppError`]. Each variant
//! describes how it should be presented through [`ErrorMetadata`], so an outer HTTP
//! layer can render it without matching on variants itself.
//!
//! The taxonomy follows the request pipeline: parse errors never reach the pipeline,
//! load errors distinguish "not found" from generic failures, and processing errors
//! carry the stage that failed (`decode_failed`, `encode_failed`, ...).

use std::io;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like malformed URLs
    Debug,
    /// Warning level - for recoverable issues like missing sources
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "decode_failed")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the client
    fn suggested_action(&self) -> Option<&'static str>;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden in production
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Source too large: {0}")]
    PayloadTooLarge(String),

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("Load failed: {0}")]
    Load(String),

    #[error("decode failed: {message}")]
    DecodeFailed {
        message: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("encode failed: {message}")]
    EncodeFailed {
        message: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("{stage} failed: {message}")]
    Processing { stage: &'static str, message: String },

    #[error("filter '{name}' failed")]
    FilterFailed {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Request cancelled: {0}")]
    Cancelled(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn decode(source: anyhow::Error) -> Self {
        AppError::DecodeFailed {
            message: source.to_string(),
            source,
        }
    }

    pub fn encode(source: anyhow::Error) -> Self {
        AppError::EncodeFailed {
            message: source.to_string(),
            source,
        }
    }

    /// True for errors caused by the request itself rather than the server.
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.http_status_code())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => AppError::NotFound(err.to_string()),
            _ => AppError::Internal(format!("IO error: {}", err)),
        }
    }
}

/// Static metadata for each variant: (http_status, error_code, recoverable, suggested_action, sensitive, log_level).
fn app_error_static_metadata(
    err: &AppError,
) -> (
    u16,
    &'static str,
    bool,
    Option<&'static str>,
    bool,
    LogLevel,
) {
    match err {
        AppError::Parse(_) => (
            400,
            "PARSE_ERROR",
            false,
            Some("Check the transformation URL syntax"),
            false,
            LogLevel::Debug,
        ),
        AppError::Forbidden(_) => (
            403,
            "FORBIDDEN",
            false,
            Some("Sign the URL or request an allowed source"),
            false,
            LogLevel::Debug,
        ),
        AppError::NotFound(_) => (
            404,
            "NOT_FOUND",
            false,
            Some("Verify the image path exists"),
            false,
            LogLevel::Debug,
        ),
        AppError::PayloadTooLarge(_) => (
            413,
            "PAYLOAD_TOO_LARGE",
            false,
            Some("Use a smaller source image"),
            false,
            LogLevel::Debug,
        ),
        AppError::UnsupportedMediaType(_) => (
            415,
            "UNSUPPORTED_MEDIA_TYPE",
            false,
            Some("Source must be served with an image/* content type"),
            false,
            LogLevel::Debug,
        ),
        AppError::Load(_) => (
            502,
            "LOAD_FAILED",
            true,
            Some("Retry after a short delay"),
            false,
            LogLevel::Warn,
        ),
        AppError::DecodeFailed { .. } => (
            422,
            "decode_failed",
            false,
            Some("Check image format and try a different file"),
            false,
            LogLevel::Warn,
        ),
        AppError::EncodeFailed { .. } => (
            500,
            "encode_failed",
            false,
            Some("Try a different output format"),
            false,
            LogLevel::Error,
        ),
        AppError::Processing { .. } => (
            500,
            "PROCESSING_FAILED",
            false,
            Some("Try different transformation parameters"),
            false,
            LogLevel::Error,
        ),
        AppError::FilterFailed { .. } => (
            400,
            "FILTER_FAILED",
            false,
            Some("Check filter parameters"),
            false,
            LogLevel::Warn,
        ),
        AppError::Cancelled(_) => (
            499,
            "CANCELLED",
            true,
            Some("Retry the request"),
            false,
            LogLevel::Debug,
        ),
        AppError::Storage(_) => (
            500,
            "STORAGE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::Internal(_) | AppError::InternalWithSource { .. } => (
            500,
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).3
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).4
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).5
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Parse(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::PayloadTooLarge(msg)
            | AppError::UnsupportedMediaType(msg)
            | AppError::Cancelled(msg) => msg.clone(),
            AppError::Load(_) => "Failed to load source image".to_string(),
            AppError::DecodeFailed { .. } => "Failed to decode source image".to_string(),
            AppError::EncodeFailed { .. } => "Failed to encode output image".to_string(),
            AppError::Processing { stage, .. } => format!("Image {} failed", stage),
            AppError::FilterFailed { name, .. } => format!("filter '{}' failed", name),
            AppError::Storage(_) => "Failed to access storage".to_string(),
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                "Internal server error".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_metadata_parse() {
        let err = AppError::Parse("empty path".to_string());
        assert_eq!(err.http_status_code(), 400);
        assert_eq!(err.error_code(), "PARSE_ERROR");
        assert!(!err.is_recoverable());
        assert_eq!(err.client_message(), "empty path");
        assert!(err.is_client_error());
        assert_eq!(err.log_level(), LogLevel::Debug);
    }

    #[test]
    fn test_decode_and_encode_are_stage_tagged() {
        let err = AppError::decode(anyhow::anyhow!("bad magic"));
        assert_eq!(err.error_code(), "decode_failed");
        assert!(err.to_string().contains("bad magic"));

        let err = AppError::encode(anyhow::anyhow!("encoder exploded"));
        assert_eq!(err.error_code(), "encode_failed");
        assert_eq!(err.http_status_code(), 500);
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_filter_failed_message() {
        let err = AppError::FilterFailed {
            name: "blur".to_string(),
            source: anyhow::anyhow!("sigma out of range"),
        };
        assert_eq!(err.to_string(), "filter 'blur' failed");
        assert_eq!(err.client_message(), "filter 'blur' failed");
    }

    #[test]
    fn test_io_not_found_maps_to_not_found() {
        let err: AppError = io::Error::new(io::ErrorKind::NotFound, "gone").into();
        assert_eq!(err.http_status_code(), 404);

        let err: AppError = io::Error::other("disk on fire").into();
        assert_eq!(err.error_code(), "INTERNAL_ERROR");
        assert!(err.is_sensitive());
    }
}
