#[cfg(feature = "storage-local")]
use crate::LocalStorage;
#[cfg(not(feature = "storage-local"))]
use crate::StorageError;
use crate::{
    Cache, MemoryCache, MemoryStorage, MixedStorage, NoOpCache, NoStorage, Storage, StorageResult,
};
use pictor_core::{CacheConfig, StorageConfig, StorageKind};
use std::sync::Arc;
use std::time::Duration;

/// Create a storage backend based on configuration
pub async fn create_storage(config: &StorageConfig) -> StorageResult<Arc<dyn Storage>> {
    let storage: Arc<dyn Storage> = match config.kind {
        #[cfg(feature = "storage-local")]
        StorageKind::Local => {
            let source: Arc<dyn Storage> = Arc::new(LocalStorage::new(&config.root_path).await?);
            match &config.result_root_path {
                Some(result_root) => {
                    let result: Arc<dyn Storage> =
                        Arc::new(LocalStorage::new(result_root).await?);
                    Arc::new(MixedStorage::new(source, result))
                }
                None => source,
            }
        }

        #[cfg(not(feature = "storage-local"))]
        StorageKind::Local => {
            return Err(StorageError::ConfigError(
                "Local storage backend not available (storage-local feature not enabled)"
                    .to_string(),
            ))
        }

        StorageKind::Memory => Arc::new(MemoryStorage::new()),
        StorageKind::None => Arc::new(NoStorage),
    };

    tracing::info!(backend = storage.backend_name(), "Storage backend initialized");
    Ok(storage)
}

/// Create the result cache; a disabled cache always misses.
pub fn create_cache(config: &CacheConfig) -> Arc<dyn Cache> {
    if !config.enabled {
        return Arc::new(NoOpCache);
    }

    tracing::info!(
        max_size_bytes = config.max_size_bytes,
        ttl_secs = config.ttl_secs,
        "Memory cache initialized"
    );
    Arc::new(MemoryCache::new(
        config.max_size_bytes,
        Duration::from_secs(config.ttl_secs),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_create_memory_and_none() {
        let config = StorageConfig {
            kind: StorageKind::Memory,
            ..Default::default()
        };
        let storage = create_storage(&config).await.unwrap();
        assert_eq!(storage.backend_name(), "memory");

        let config = StorageConfig {
            kind: StorageKind::None,
            ..Default::default()
        };
        assert_eq!(create_storage(&config).await.unwrap().backend_name(), "none");
    }

    #[tokio::test]
    async fn test_create_local_with_result_root_is_mixed() {
        let src = tempdir().unwrap();
        let res = tempdir().unwrap();
        let config = StorageConfig {
            kind: StorageKind::Local,
            root_path: src.path().to_path_buf(),
            result_root_path: Some(res.path().to_path_buf()),
        };
        let storage = create_storage(&config).await.unwrap();
        assert_eq!(storage.backend_name(), "mixed");

        storage.put("r.jpg", Bytes::from_static(b"x")).await.unwrap();
        assert!(res.path().join("r.jpg").exists());
        assert!(!src.path().join("r.jpg").exists());
    }

    #[tokio::test]
    async fn test_create_cache_respects_enabled() {
        let disabled = create_cache(&CacheConfig::default());
        disabled
            .set("k", Bytes::from_static(b"v"), Duration::ZERO)
            .await
            .unwrap();
        assert!(disabled.get("k").await.is_err());

        let enabled = create_cache(&CacheConfig {
            enabled: true,
            ..Default::default()
        });
        enabled
            .set("k", Bytes::from_static(b"v"), Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(enabled.get("k").await.unwrap(), Bytes::from_static(b"v"));
    }
}
