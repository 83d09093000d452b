use crate::traits::{validate_key, Storage, StorageError, StorageResult};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-process storage backed by a map. Contents are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    objects: RwLock<HashMap<String, Bytes>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        validate_key(key)?;
        self.objects
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        validate_key(key)?;
        self.objects.write().await.insert(key.to_string(), data);
        Ok(())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        validate_key(key)?;
        Ok(self.objects.read().await.contains_key(key))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        validate_key(key)?;
        self.objects.write().await.remove(key);
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{collect_stream, ByteReader};

    #[tokio::test]
    async fn test_memory_storage_basic_ops() {
        let storage = MemoryStorage::new();
        assert!(matches!(
            storage.get("a.jpg").await,
            Err(StorageError::NotFound(_))
        ));

        storage.put("a.jpg", Bytes::from_static(b"abc")).await.unwrap();
        assert!(storage.exists("a.jpg").await.unwrap());
        assert_eq!(storage.get("a.jpg").await.unwrap(), Bytes::from_static(b"abc"));
        assert_eq!(storage.len().await, 1);

        storage.delete("a.jpg").await.unwrap();
        assert!(storage.is_empty().await);
    }

    #[tokio::test]
    async fn test_default_stream_methods() {
        let storage = MemoryStorage::new();
        let reader: ByteReader = Box::pin(std::io::Cursor::new(b"streamed".to_vec()));
        assert_eq!(storage.put_stream("s.png", reader).await.unwrap(), 8);

        let stream = storage.get_stream("s.png").await.unwrap();
        assert_eq!(collect_stream(stream).await.unwrap(), Bytes::from_static(b"streamed"));
    }
}
