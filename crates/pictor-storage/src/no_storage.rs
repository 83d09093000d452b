use crate::traits::{Storage, StorageError, StorageResult};
use async_trait::async_trait;
use bytes::Bytes;

/// Storage that keeps nothing: reads always miss and writes are discarded.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoStorage;

#[async_trait]
impl Storage for NoStorage {
    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        Err(StorageError::NotFound(key.to_string()))
    }

    async fn put(&self, _key: &str, _data: Bytes) -> StorageResult<()> {
        Ok(())
    }

    async fn exists(&self, _key: &str) -> StorageResult<bool> {
        Ok(false)
    }

    async fn delete(&self, _key: &str) -> StorageResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "none"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_no_storage_discards_writes() {
        let storage = NoStorage;
        storage.put("a.jpg", Bytes::from_static(b"x")).await.unwrap();
        assert!(!storage.exists("a.jpg").await.unwrap());
        assert!(storage.get("a.jpg").await.unwrap_err().is_not_found());
    }
}
