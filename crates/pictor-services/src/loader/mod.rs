//! Source image loaders
//!
//! A [`LoaderRegistry`] holds loaders in registration order and hands each
//! source to the first loader whose [`Loader::can_load`] accepts it.

mod file;
mod http;

pub use file::FileLoader;
pub use http::HttpLoader;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use pictor_core::{AppError, LoaderConfig};
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("Source not found: {0}")]
    NotFound(String),

    #[error("Source too large: {size} bytes (limit: {limit})")]
    TooLarge { size: u64, limit: u64 },

    #[error("Invalid content type: {0}")]
    UnsupportedContentType(String),

    #[error("Illegal source path: {0}")]
    InvalidPath(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No loader can handle: {0}")]
    NoLoader(String),
}

impl From<LoaderError> for AppError {
    fn from(err: LoaderError) -> Self {
        match err {
            LoaderError::NotFound(source) => AppError::NotFound(source),
            LoaderError::TooLarge { .. } => AppError::PayloadTooLarge(err.to_string()),
            LoaderError::UnsupportedContentType(_) => AppError::UnsupportedMediaType(err.to_string()),
            LoaderError::InvalidPath(_) => AppError::Forbidden(err.to_string()),
            other => AppError::Load(other.to_string()),
        }
    }
}

pub type LoaderResult<T> = Result<T, LoaderError>;

/// Chunked source body.
pub type LoaderStream = Pin<Box<dyn Stream<Item = LoaderResult<Bytes>> + Send>>;

/// True for `http://` and `https://` sources.
pub fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

#[async_trait]
pub trait Loader: Send + Sync {
    /// Short loader name for logs.
    fn name(&self) -> &'static str;

    fn can_load(&self, source: &str) -> bool;

    async fn load(&self, source: &str) -> LoaderResult<Bytes>;

    async fn load_stream(&self, source: &str) -> LoaderResult<LoaderStream> {
        let data = self.load(source).await?;
        Ok(Box::pin(futures::stream::once(async move { Ok(data) })))
    }
}

/// Drain a [`LoaderStream`] into one buffer.
pub async fn collect(mut stream: LoaderStream) -> LoaderResult<Bytes> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        buf.extend_from_slice(&chunk?);
    }
    Ok(buf.freeze())
}

/// Ordered set of loaders; the first one that accepts a source wins.
#[derive(Clone, Default)]
pub struct LoaderRegistry {
    loaders: Vec<Arc<dyn Loader>>,
}

impl LoaderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// HTTP loader followed by a file loader rooted at `file_root`, or at
    /// `config.file_root` when set.
    pub fn from_config(config: &LoaderConfig, file_root: PathBuf) -> anyhow::Result<Self> {
        let root = config.file_root.clone().unwrap_or(file_root);
        let mut registry = Self::new();
        registry.register(Arc::new(HttpLoader::new(config)?));
        registry.register(Arc::new(FileLoader::new(root, config.max_size_bytes)));
        Ok(registry)
    }

    pub fn register(&mut self, loader: Arc<dyn Loader>) {
        self.loaders.push(loader);
    }

    pub fn with(mut self, loader: Arc<dyn Loader>) -> Self {
        self.register(loader);
        self
    }

    pub fn len(&self) -> usize {
        self.loaders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaders.is_empty()
    }

    pub fn find(&self, source: &str) -> LoaderResult<&Arc<dyn Loader>> {
        self.loaders
            .iter()
            .find(|loader| loader.can_load(source))
            .ok_or_else(|| LoaderError::NoLoader(source.to_string()))
    }

    pub async fn load(&self, source: &str) -> LoaderResult<Bytes> {
        let loader = self.find(source)?;
        tracing::debug!(loader = loader.name(), source = %source, "Loading source");
        loader.load(source).await
    }

    pub async fn load_stream(&self, source: &str) -> LoaderResult<LoaderStream> {
        self.find(source)?.load_stream(source).await
    }
}
