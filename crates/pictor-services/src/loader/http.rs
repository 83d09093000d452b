use super::{collect, is_remote, Loader, LoaderError, LoaderResult, LoaderStream};
use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use pictor_core::LoaderConfig;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use std::time::Duration;

/// Loads `http://` and `https://` sources.
///
/// Only `200 OK` responses with an `image/*` content type are accepted; bodies
/// larger than the size limit are rejected up front when `Content-Length` says
/// so, and otherwise aborted while streaming.
pub struct HttpLoader {
    client: reqwest::Client,
    max_size: u64,
}

impl HttpLoader {
    pub fn new(config: &LoaderConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .context("Failed to create HTTP client for source loading")?;

        Ok(Self {
            client,
            max_size: config.max_size_bytes,
        })
    }

    fn is_image_content_type(value: &str) -> bool {
        let main = value.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        main.starts_with("image/")
    }
}

#[async_trait]
impl Loader for HttpLoader {
    fn name(&self) -> &'static str {
        "http"
    }

    fn can_load(&self, source: &str) -> bool {
        is_remote(source)
    }

    async fn load(&self, source: &str) -> LoaderResult<Bytes> {
        let data = collect(self.load_stream(source).await?).await?;

        tracing::debug!(
            url = %source,
            size_bytes = data.len(),
            "HTTP load successful"
        );
        Ok(data)
    }

    async fn load_stream(&self, source: &str) -> LoaderResult<LoaderStream> {
        let response = self.client.get(source).send().await.map_err(|e| {
            tracing::debug!(url = %source, error = %e, "HTTP request failed");
            LoaderError::Http(format!("request failed: {}", e))
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(LoaderError::NotFound(source.to_string()));
        }
        if status != StatusCode::OK {
            return Err(LoaderError::Http(format!("unexpected status {}", status)));
        }

        let limit = self.max_size;
        if let Some(length) = response.content_length() {
            if limit > 0 && length > limit {
                return Err(LoaderError::TooLarge {
                    size: length,
                    limit,
                });
            }
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        if !Self::is_image_content_type(&content_type) {
            return Err(LoaderError::UnsupportedContentType(content_type));
        }

        let mut received: u64 = 0;
        let stream = response.bytes_stream().map(move |chunk| {
            let chunk = chunk.map_err(|e| LoaderError::Http(format!("failed to read body: {}", e)))?;
            received += chunk.len() as u64;
            if limit > 0 && received > limit {
                return Err(LoaderError::TooLarge {
                    size: received,
                    limit,
                });
            }
            Ok(chunk)
        });

        Ok(Box::pin(stream))
    }
}
