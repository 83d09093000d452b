//! Storage abstraction trait
//!
//! Every storage backend implements [`Storage`]. A missing object is always signalled
//! with [`StorageError::NotFound`] so callers can tell a miss apart from a failure.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use pictor_core::AppError;
use std::pin::Pin;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => AppError::NotFound(key),
            StorageError::InvalidKey(msg) => AppError::Parse(msg),
            other => AppError::Storage(other.to_string()),
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Chunked object body.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

/// Streaming upload source.
pub type ByteReader = Pin<Box<dyn AsyncRead + Send + Unpin>>;

/// Storage abstraction trait
///
/// Implementations must be safe for concurrent use; the request path and detached
/// write-back tasks share one instance.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Read a whole object.
    async fn get(&self, key: &str) -> StorageResult<Bytes>;

    /// Write a whole object, replacing any previous value.
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()>;

    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Delete an object. Deleting a missing object succeeds.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Read an object as a stream of chunks.
    async fn get_stream(&self, key: &str) -> StorageResult<ByteStream> {
        let data = self.get(key).await?;
        Ok(Box::pin(futures::stream::once(async move { Ok(data) })))
    }

    /// Write an object from a reader, returning the number of bytes written.
    async fn put_stream(&self, key: &str, mut reader: ByteReader) -> StorageResult<u64> {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await?;
        let len = buf.len() as u64;
        self.put(key, Bytes::from(buf)).await?;
        Ok(len)
    }

    /// Short backend name for logs.
    fn backend_name(&self) -> &'static str;
}

/// Drain a [`ByteStream`] into a single buffer.
pub async fn collect_stream(mut stream: ByteStream) -> StorageResult<Bytes> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        buf.extend_from_slice(&chunk?);
    }
    Ok(buf.freeze())
}

/// Reject keys that could escape a backend's namespace.
pub(crate) fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey("Storage key is empty".to_string()));
    }
    if key.contains("..") || key.starts_with('/') || key.contains('\0') {
        return Err(StorageError::InvalidKey(
            "Storage key contains invalid characters".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key() {
        assert!(validate_key("cache/ab/cdef/a.jpg").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("../etc/passwd").is_err());
        assert!(validate_key("/etc/passwd").is_err());
    }

    #[test]
    fn test_not_found_maps_to_app_not_found() {
        let err: AppError = StorageError::NotFound("a.jpg".to_string()).into();
        assert!(matches!(err, AppError::NotFound(_)));

        let err: AppError = StorageError::WriteFailed("disk full".to_string()).into();
        assert!(matches!(err, AppError::Storage(_)));
    }

    #[tokio::test]
    async fn test_collect_stream() {
        let chunks = vec![Ok(Bytes::from_static(b"ab")), Ok(Bytes::from_static(b"cd"))];
        let stream: ByteStream = Box::pin(futures::stream::iter(chunks));
        assert_eq!(collect_stream(stream).await.unwrap(), Bytes::from_static(b"abcd"));
    }
}
