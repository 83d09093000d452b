//! Cache abstraction
//!
//! The cache sits in front of storage on the read path. A miss is signalled with
//! [`CacheError::Miss`], never with an empty value.

mod memory;
mod noop;

pub use memory::MemoryCache;
pub use noop::NoOpCache;

use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache miss")]
    Miss,

    #[error("Cache backend error: {0}")]
    Backend(String),
}

impl CacheError {
    pub fn is_miss(&self) -> bool {
        matches!(self, CacheError::Miss)
    }
}

pub type CacheResult<T> = Result<T, CacheError>;

#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> CacheResult<Bytes>;

    /// Store a value. A zero `ttl` uses the backend's default.
    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> CacheResult<()>;

    async fn delete(&self, key: &str) -> CacheResult<()>;

    async fn exists(&self, key: &str) -> CacheResult<bool>;
}
