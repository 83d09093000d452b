use crate::traits::{ByteReader, ByteStream, Storage, StorageError, StorageResult};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

/// Two-tier storage: originals are read from `source`, processed results are
/// written to and read first from `result`.
#[derive(Clone)]
pub struct MixedStorage {
    source: Arc<dyn Storage>,
    result: Arc<dyn Storage>,
}

impl MixedStorage {
    pub fn new(source: Arc<dyn Storage>, result: Arc<dyn Storage>) -> Self {
        Self { source, result }
    }
}

fn miss_or(err: StorageError) -> StorageResult<()> {
    if err.is_not_found() {
        Ok(())
    } else {
        Err(err)
    }
}

#[async_trait]
impl Storage for MixedStorage {
    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        match self.result.get(key).await {
            Ok(data) => return Ok(data),
            Err(e) => miss_or(e)?,
        }
        self.source.get(key).await
    }

    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        self.result.put(key, data).await
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        if self.result.exists(key).await? {
            return Ok(true);
        }
        self.source.exists(key).await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.result.delete(key).await
    }

    async fn get_stream(&self, key: &str) -> StorageResult<ByteStream> {
        match self.result.get_stream(key).await {
            Ok(stream) => return Ok(stream),
            Err(e) => miss_or(e)?,
        }
        self.source.get_stream(key).await
    }

    async fn put_stream(&self, key: &str, reader: ByteReader) -> StorageResult<u64> {
        self.result.put_stream(key, reader).await
    }

    fn backend_name(&self) -> &'static str {
        "mixed"
    }
}
