use super::{is_remote, Loader, LoaderError, LoaderResult};
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Component, Path, PathBuf};

/// Loads non-URL sources from a directory.
///
/// Sources are always resolved inside the root; a leading `/` is ignored and
/// any `..` component is rejected.
pub struct FileLoader {
    root: PathBuf,
    max_size: u64,
}

impl FileLoader {
    pub fn new(root: impl Into<PathBuf>, max_size: u64) -> Self {
        Self {
            root: root.into(),
            max_size,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, source: &str) -> LoaderResult<PathBuf> {
        let relative = Path::new(source.trim_start_matches('/'));
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes || source.trim_start_matches('/').is_empty() {
            return Err(LoaderError::InvalidPath(source.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl Loader for FileLoader {
    fn name(&self) -> &'static str {
        "file"
    }

    fn can_load(&self, source: &str) -> bool {
        !is_remote(source)
    }

    async fn load(&self, source: &str) -> LoaderResult<Bytes> {
        let path = self.resolve(source)?;

        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(LoaderError::NotFound(source.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        if metadata.is_dir() {
            return Err(LoaderError::InvalidPath(format!("{} is a directory", source)));
        }
        if self.max_size > 0 && metadata.len() > self.max_size {
            return Err(LoaderError::TooLarge {
                size: metadata.len(),
                limit: self.max_size,
            });
        }

        let data = tokio::fs::read(&path).await?;
        Ok(Bytes::from(data))
    }
}
