//! Image service - the request orchestrator
//!
//! Read path for a transform request:
//!
//! 1. Parse and authorise the URL
//! 2. Resolve format and quality, derive the result key
//! 3. Cache lookup, then storage lookup (with write-through to the cache)
//! 4. Acquire a worker slot (miss path only, cancellable)
//! 5. Load the source, preload watermark overlays
//! 6. Decode, transform, filter and encode on a blocking thread
//! 7. Return, while a detached task persists the result to storage and cache

use crate::loader::{is_remote, LoaderRegistry};
use crate::security::{HmacSigner, SourceValidator, UrlSigner, SIGNATURE_LEN};
use bytes::Bytes;
use chrono::Utc;
use pictor_core::{
    AppError, AppResult, BlindWatermarkConfig, Config, SecurityConfig, TransformRequest,
    TransformUrlParser, UploadResult,
};
use pictor_processing::filters::DEFAULT_STRENGTH;
use pictor_processing::{
    quality_override, BlindWatermarkCodec, BlindWatermarkFilter, FilterContext, FilterPipeline,
    FilterRegistry, FormatResolver, ImageCompressor, OutputFormat, ProcessOptions,
    ProcessingEngine, WatermarkFilter,
};
use pictor_storage::{cache_key, collect_stream, upload_key, Cache, Storage};
use std::io::Cursor;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// Explicit settings for [`ImageService`].
#[derive(Clone, Debug)]
pub struct ImageServiceConfig {
    pub default_quality: u8,
    pub default_format: OutputFormat,
    pub max_width: u32,
    pub max_height: u32,
    pub workers: usize,
    pub security: SecurityConfig,
    pub blind_watermark: BlindWatermarkConfig,
}

impl Default for ImageServiceConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl ImageServiceConfig {
    pub fn from_config(config: &Config) -> Self {
        let default_format =
            OutputFormat::parse(&config.processing.default_format).unwrap_or_default();

        Self {
            default_quality: config.processing.default_quality,
            default_format,
            max_width: config.processing.max_width,
            max_height: config.processing.max_height,
            workers: config.processing.workers.max(1),
            security: config.security.clone(),
            blind_watermark: config.blind_watermark.clone(),
        }
    }
}

/// Where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    CacheHit,
    StorageHit,
    Miss,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::CacheHit => "HIT",
            CacheStatus::StorageHit => "STORAGE",
            CacheStatus::Miss => "MISS",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProcessedImage {
    pub bytes: Bytes,
    pub format: OutputFormat,
    pub content_type: &'static str,
    pub cache_status: CacheStatus,
}

impl ProcessedImage {
    fn new(bytes: Bytes, format: OutputFormat, cache_status: CacheStatus) -> Self {
        Self {
            bytes,
            format,
            content_type: format.mime_type(),
            cache_status,
        }
    }
}

pub struct ImageService {
    config: ImageServiceConfig,
    storage: Arc<dyn Storage>,
    cache: Arc<dyn Cache>,
    loaders: Arc<LoaderRegistry>,
    engine: Arc<ProcessingEngine>,
    signer: Option<Arc<dyn UrlSigner>>,
    sources: SourceValidator,
    semaphore: Arc<Semaphore>,
}

impl ImageService {
    pub fn new(
        config: ImageServiceConfig,
        storage: Arc<dyn Storage>,
        cache: Arc<dyn Cache>,
        loaders: Arc<LoaderRegistry>,
    ) -> anyhow::Result<Self> {
        let blind = BlindWatermarkFilter::new(config.blind_watermark.text.clone(), DEFAULT_STRENGTH);
        let registry = FilterRegistry::with_blind_watermark(blind);
        let engine = ProcessingEngine::new(
            config.max_width,
            config.max_height,
            FilterPipeline::new(Arc::new(registry)),
        );

        let signer: Option<Arc<dyn UrlSigner>> = if config.security.enabled {
            Some(Arc::new(HmacSigner::new(&config.security.security_key)?))
        } else {
            None
        };

        let workers = config.workers.max(1);
        let sources = SourceValidator::new(config.security.allowed_sources.clone());

        tracing::info!(
            workers = workers,
            default_quality = config.default_quality,
            default_format = %config.default_format,
            max_width = config.max_width,
            max_height = config.max_height,
            storage = storage.backend_name(),
            signing = signer.is_some(),
            "Image service initialized"
        );

        Ok(Self {
            config,
            storage,
            cache,
            loaders,
            engine: Arc::new(engine),
            signer,
            sources,
            semaphore: Arc::new(Semaphore::new(workers)),
        })
    }

    pub fn config(&self) -> &ImageServiceConfig {
        &self.config
    }

    /// Parse, authorise and serve a transformation URL path.
    pub async fn process(
        &self,
        path: &str,
        accept: &str,
        cancel: &CancellationToken,
    ) -> AppResult<ProcessedImage> {
        let request = TransformUrlParser::parse(path)?.with_accept(accept);
        self.authorize(path, &request)?;
        self.process_request(request, cancel).await
    }

    fn authorize(&self, path: &str, request: &TransformRequest) -> AppResult<()> {
        let security = &self.config.security;

        if security.enabled {
            if request.is_unsafe {
                if !security.allow_unsafe {
                    return Err(AppError::Forbidden("unsafe URLs are disabled".to_string()));
                }
            } else {
                let signer = self
                    .signer
                    .as_ref()
                    .ok_or_else(|| AppError::Internal("URL signer not configured".to_string()))?;
                let valid = TransformUrlParser::split_signature(path).is_some_and(|(sig, payload)| {
                    sig.len() == SIGNATURE_LEN && signer.verify(sig, payload)
                });
                if !valid {
                    return Err(AppError::Forbidden("invalid signature".to_string()));
                }
            }

            if (security.max_width > 0 && request.width > security.max_width)
                || (security.max_height > 0 && request.height > security.max_height)
            {
                return Err(AppError::Forbidden(format!(
                    "requested size {}x{} exceeds the {}x{} limit",
                    request.width, request.height, security.max_width, security.max_height
                )));
            }
        }

        if is_remote(&request.image_path) && !self.sources.is_allowed(&request.image_path) {
            return Err(AppError::Forbidden(format!(
                "source not allowed: {}",
                request.image_path
            )));
        }

        Ok(())
    }

    /// Serve an already parsed and authorised request.
    pub async fn process_request(
        &self,
        request: TransformRequest,
        cancel: &CancellationToken,
    ) -> AppResult<ProcessedImage> {
        let start = Instant::now();
        let format = FormatResolver::resolve(&request, self.config.default_format);
        let quality = quality_override(&request.filters).unwrap_or(self.config.default_quality);
        let key = cache_key(&request, format.extension(), quality);
        let served_format = format.encoded_as();

        tracing::debug!(
            image_path = %request.image_path,
            width = request.width,
            height = request.height,
            format = %format,
            quality = quality,
            key = %key,
            "Processing request"
        );

        match self.cache.get(&key).await {
            Ok(data) => {
                tracing::debug!(key = %key, "Cache hit");
                return Ok(ProcessedImage::new(data, served_format, CacheStatus::CacheHit));
            }
            Err(e) if !e.is_miss() => {
                tracing::warn!(key = %key, error = %e, "Cache lookup failed");
            }
            Err(_) => {}
        }

        match self.storage.get(&key).await {
            Ok(data) => {
                tracing::debug!(key = %key, "Storage hit");
                if let Err(e) = self.cache.set(&key, data.clone(), Duration::ZERO).await {
                    tracing::warn!(key = %key, error = %e, "Failed to set cache");
                }
                return Ok(ProcessedImage::new(data, served_format, CacheStatus::StorageHit));
            }
            Err(e) if !e.is_not_found() => {
                tracing::warn!(key = %key, error = %e, "Storage lookup failed");
            }
            Err(_) => {}
        }

        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(AppError::Cancelled(
                    "request cancelled while waiting for a worker slot".to_string(),
                ));
            }
            permit = Arc::clone(&self.semaphore).acquire_owned() => permit
                .map_err(|e| AppError::Internal(format!("worker pool closed: {}", e)))?,
        };

        let source = self.load_source(&request.image_path).await?;
        let ctx = self.preload_overlays(&request).await;

        if cancel.is_cancelled() {
            return Err(AppError::Cancelled(
                "request cancelled before processing".to_string(),
            ));
        }

        let opts = ProcessOptions::from_request(&request, format, quality);
        let engine = Arc::clone(&self.engine);
        let filters = request.filters;
        let output = tokio::task::spawn_blocking(move || engine.run(&source, &opts, &filters, &ctx))
            .await
            .map_err(|e| AppError::Internal(format!("processing task failed: {}", e)))??;

        drop(permit);

        tracing::info!(
            image_path = %request.image_path,
            format = %output.format,
            size_bytes = output.bytes.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Image processed"
        );

        self.persist(key, output.bytes.clone());

        Ok(ProcessedImage::new(output.bytes, output.format, CacheStatus::Miss))
    }

    /// Remote sources go through the loaders; anything else is read from
    /// storage first, falling back to the loaders.
    async fn load_source(&self, path: &str) -> AppResult<Bytes> {
        if !is_remote(path) {
            let stored = match self.storage.get_stream(path).await {
                Ok(stream) => collect_stream(stream).await,
                Err(e) => Err(e),
            };
            match stored {
                Ok(data) => return Ok(data),
                Err(e) => {
                    tracing::debug!(
                        image_path = %path,
                        error = %e,
                        "Storage read failed, falling back to loader"
                    );
                }
            }
        }

        self.loaders.load(path).await.map_err(|e| {
            tracing::warn!(image_path = %path, error = %e, "Failed to load source");
            AppError::from(e)
        })
    }

    /// Fetch every watermark overlay the request references. Failures are
    /// logged and leave the overlay out, so the filter skips it.
    async fn preload_overlays(&self, request: &TransformRequest) -> FilterContext {
        let mut ctx = FilterContext::new();

        for source in WatermarkFilter::overlay_sources(&request.filters) {
            if is_remote(&source) && !self.sources.is_allowed(&source) {
                tracing::warn!(source = %source, "Watermark source not allowed, skipping");
                continue;
            }

            match self.load_source(&source).await {
                Ok(data) => ctx.insert_overlay(source, data),
                Err(e) => {
                    tracing::warn!(source = %source, error = %e, "Failed to load watermark, skipping");
                }
            }
        }

        ctx
    }

    /// Write the result to storage and cache on a detached task.
    fn persist(&self, key: String, data: Bytes) {
        let storage = Arc::clone(&self.storage);
        let cache = Arc::clone(&self.cache);

        tokio::spawn(async move {
            if let Err(e) = storage.put(&key, data.clone()).await {
                tracing::warn!(key = %key, error = %e, "Failed to save result to storage");
            }
            if let Err(e) = cache.set(&key, data, Duration::ZERO).await {
                tracing::warn!(key = %key, error = %e, "Failed to set cache");
            }
        });
    }

    /// Store an uploaded original and return its key and access URL.
    ///
    /// With blind watermarking enabled the image is marked and re-encoded in the
    /// format its filename suggests before it is stored.
    pub async fn upload(&self, filename: &str, data: Bytes) -> AppResult<UploadResult> {
        let watermark = &self.config.blind_watermark;
        let data = if watermark.enabled && !watermark.text.is_empty() {
            tracing::debug!(filename = %filename, "Applying blind watermark");
            let text = watermark.text.clone();
            let format = OutputFormat::from_path(filename).unwrap_or_default();
            let quality = self.config.default_quality;

            tokio::task::spawn_blocking(move || -> AppResult<Bytes> {
                let img = pictor_processing::decoder::decode(&data, 0, 0).map_err(AppError::decode)?;
                let marked = BlindWatermarkCodec::default().embed(img, &text);
                let (bytes, _) =
                    ImageCompressor::compress(&marked, format, quality).map_err(AppError::encode)?;
                Ok(bytes)
            })
            .await
            .map_err(|e| AppError::Internal(format!("watermark task failed: {}", e)))??
        } else {
            data
        };

        let key = upload_key(filename, Utc::now());
        let written = self
            .storage
            .put_stream(&key, Box::pin(Cursor::new(data)))
            .await
            .map_err(|e| {
                tracing::error!(key = %key, error = %e, "Failed to upload image");
                AppError::from(e)
            })?;

        let url = match &self.signer {
            Some(signer) => signer.sign_url(&key),
            None => format!("/unsafe/{}", key),
        };

        tracing::info!(key = %key, size_bytes = written, "Image uploaded");

        Ok(UploadResult { path: key, url })
    }
}
