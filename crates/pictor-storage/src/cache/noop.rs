use super::{Cache, CacheError, CacheResult};
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

/// Cache used when caching is disabled: every lookup misses.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpCache;

#[async_trait]
impl Cache for NoOpCache {
    async fn get(&self, _key: &str) -> CacheResult<Bytes> {
        Err(CacheError::Miss)
    }

    async fn set(&self, _key: &str, _value: Bytes, _ttl: Duration) -> CacheResult<()> {
        Ok(())
    }

    async fn delete(&self, _key: &str) -> CacheResult<()> {
        Ok(())
    }

    async fn exists(&self, _key: &str) -> CacheResult<bool> {
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_always_misses() {
        let cache = NoOpCache;
        cache
            .set("k", Bytes::from_static(b"v"), Duration::ZERO)
            .await
            .unwrap();
        assert!(cache.get("k").await.unwrap_err().is_miss());
        assert!(!cache.exists("k").await.unwrap());
    }
}
