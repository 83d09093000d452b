use super::{Cache, CacheError, CacheResult};
use async_trait::async_trait;
use bytes::Bytes;
use lru::LruCache;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

struct Entry {
    data: Bytes,
    /// `None` never expires.
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

struct Inner {
    entries: LruCache<String, Entry>,
    size_bytes: u64,
}

impl Inner {
    fn remove(&mut self, key: &str) {
        if let Some(old) = self.entries.pop(key) {
            self.size_bytes -= old.data.len() as u64;
        }
    }
}

/// In-process LRU cache bounded by total payload bytes, with per-entry expiry.
pub struct MemoryCache {
    inner: Mutex<Inner>,
    max_size_bytes: u64,
    default_ttl: Duration,
}

impl MemoryCache {
    pub fn new(max_size_bytes: u64, default_ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: LruCache::unbounded(),
                size_bytes: 0,
            }),
            max_size_bytes,
            default_ttl,
        }
    }

    /// Total bytes currently held.
    pub async fn size_bytes(&self) -> u64 {
        self.inner.lock().await.size_bytes
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.entries.is_empty()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> CacheResult<Bytes> {
        let mut inner = self.inner.lock().await;
        let now = Instant::now();

        let hit = inner
            .entries
            .get(key)
            .map(|entry| (entry.is_expired(now), entry.data.clone()));

        match hit {
            Some((false, data)) => Ok(data),
            Some((true, _)) => {
                inner.remove(key);
                Err(CacheError::Miss)
            }
            None => Err(CacheError::Miss),
        }
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> CacheResult<()> {
        let size = value.len() as u64;
        if size > self.max_size_bytes {
            tracing::debug!(
                key = %key,
                size_bytes = size,
                max_size_bytes = self.max_size_bytes,
                "Value larger than cache budget, not cached"
            );
            return Ok(());
        }

        let ttl = if ttl.is_zero() { self.default_ttl } else { ttl };
        let mut inner = self.inner.lock().await;

        inner.remove(key);
        inner.entries.push(
            key.to_string(),
            Entry {
                data: value,
                expires_at: Instant::now().checked_add(ttl),
            },
        );
        inner.size_bytes += size;

        while inner.size_bytes > self.max_size_bytes {
            match inner.entries.pop_lru() {
                Some((evicted, entry)) => {
                    inner.size_bytes -= entry.data.len() as u64;
                    tracing::debug!(key = %evicted, "Evicted cache entry");
                }
                None => break,
            }
        }

        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.inner.lock().await.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        let inner = self.inner.lock().await;
        Ok(inner
            .entries
            .peek(key)
            .is_some_and(|e| !e.is_expired(Instant::now())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes(n: usize) -> Bytes {
        Bytes::from(vec![7u8; n])
    }

    #[tokio::test]
    async fn test_set_get_delete() {
        let cache = MemoryCache::new(1024, Duration::from_secs(60));
        assert!(cache.get("a").await.unwrap_err().is_miss());

        cache.set("a", bytes(10), Duration::ZERO).await.unwrap();
        assert_eq!(cache.get("a").await.unwrap().len(), 10);
        assert!(cache.exists("a").await.unwrap());
        assert_eq!(cache.size_bytes().await, 10);

        cache.delete("a").await.unwrap();
        assert!(!cache.exists("a").await.unwrap());
        assert_eq!(cache.size_bytes().await, 0);
    }

    #[tokio::test]
    async fn test_huge_ttl_never_expires() {
        let cache = MemoryCache::new(1024, Duration::MAX);
        cache.set("a", bytes(10), Duration::ZERO).await.unwrap();
        cache.set("b", bytes(10), Duration::MAX).await.unwrap();
        assert_eq!(cache.get("a").await.unwrap().len(), 10);
        assert!(cache.exists("b").await.unwrap());
    }

    #[tokio::test]
    async fn test_overwrite_keeps_size_accurate() {
        let cache = MemoryCache::new(1024, Duration::from_secs(60));
        cache.set("a", bytes(100), Duration::ZERO).await.unwrap();
        cache.set("a", bytes(40), Duration::ZERO).await.unwrap();
        assert_eq!(cache.size_bytes().await, 40);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_evicts_least_recently_used() {
        let cache = MemoryCache::new(100, Duration::from_secs(60));
        cache.set("a", bytes(40), Duration::ZERO).await.unwrap();
        cache.set("b", bytes(40), Duration::ZERO).await.unwrap();
        // touch a so b becomes the eviction candidate
        cache.get("a").await.unwrap();
        cache.set("c", bytes(40), Duration::ZERO).await.unwrap();

        assert!(cache.exists("a").await.unwrap());
        assert!(!cache.exists("b").await.unwrap());
        assert!(cache.exists("c").await.unwrap());
        assert!(cache.size_bytes().await <= 100);
    }

    #[tokio::test]
    async fn test_oversized_value_not_stored() {
        let cache = MemoryCache::new(10, Duration::from_secs(60));
        cache.set("big", bytes(11), Duration::ZERO).await.unwrap();
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_expired_entry_misses() {
        let cache = MemoryCache::new(1024, Duration::from_secs(60));
        cache
            .set("a", bytes(5), Duration::from_millis(20))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(cache.get("a").await.unwrap_err().is_miss());
        assert_eq!(cache.size_bytes().await, 0);
    }
}
