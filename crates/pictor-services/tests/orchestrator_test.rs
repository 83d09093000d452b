use async_trait::async_trait;
use bytes::Bytes;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use pictor_core::{AppError, TransformUrlParser};
use pictor_services::{
    CacheStatus, ImageService, ImageServiceConfig, Loader, LoaderRegistry, LoaderResult,
};
use pictor_storage::{cache_key, Cache, MemoryCache, MemoryStorage, Storage};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

const DELAY: Duration = Duration::from_millis(200);

fn png(width: u32, height: u32) -> Bytes {
    let img = DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 200) as u8, (y % 200) as u8, 90, 255])
    }));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    Bytes::from(buf)
}

/// Serves a fixed PNG for every remote source after a delay, counting calls.
struct SlowLoader {
    calls: AtomicUsize,
    delay: Duration,
    body: Bytes,
}

impl SlowLoader {
    fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            delay,
            body: png(64, 64),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Loader for SlowLoader {
    fn name(&self) -> &'static str {
        "slow"
    }

    fn can_load(&self, source: &str) -> bool {
        source.starts_with("http://")
    }

    async fn load(&self, _source: &str) -> LoaderResult<Bytes> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(self.body.clone())
    }
}

struct Harness {
    service: Arc<ImageService>,
    storage: Arc<MemoryStorage>,
    cache: Arc<MemoryCache>,
    loader: Arc<SlowLoader>,
}

fn harness(workers: usize) -> Harness {
    let storage = Arc::new(MemoryStorage::new());
    let cache = Arc::new(MemoryCache::new(16 * 1024 * 1024, Duration::from_secs(60)));
    let loader = SlowLoader::new(DELAY);
    let loaders = LoaderRegistry::new().with(loader.clone());

    let config = ImageServiceConfig {
        workers,
        ..Default::default()
    };
    let service = ImageService::new(config, storage.clone(), cache.clone(), Arc::new(loaders))
        .unwrap();

    Harness {
        service: Arc::new(service),
        storage,
        cache,
        loader,
    }
}

fn key_for(path: &str) -> String {
    let request = TransformUrlParser::parse(path).unwrap();
    cache_key(&request, "png", 85)
}

async fn wait_for_cache(cache: &MemoryCache, key: &str) {
    for _ in 0..100 {
        if cache.exists(key).await.unwrap_or(false) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("result for {} was never cached", key);
}

#[tokio::test]
async fn test_second_request_is_cache_hit_without_reload() {
    let h = harness(2);
    let path = "/unsafe/32x32/filters:blur(1)/http://origin.test/a.png";
    let cancel = CancellationToken::new();

    let first = h.service.process(path, "", &cancel).await.unwrap();
    assert_eq!(first.cache_status, CacheStatus::Miss);
    assert_eq!(h.loader.calls(), 1);

    let key = key_for(path);
    wait_for_cache(&h.cache, &key).await;
    assert_eq!(h.storage.get(&key).await.unwrap(), first.bytes);

    let second = h.service.process(path, "", &cancel).await.unwrap();
    assert_eq!(second.cache_status, CacheStatus::CacheHit);
    assert_eq!(second.bytes, first.bytes);
    assert_eq!(second.content_type, "image/png");
    assert_eq!(h.loader.calls(), 1);
}

#[tokio::test]
async fn test_different_filter_params_miss_separately() {
    let h = harness(2);
    let cancel = CancellationToken::new();

    h.service
        .process("/unsafe/32x32/filters:blur(1)/http://origin.test/a.png", "", &cancel)
        .await
        .unwrap();
    let out = h
        .service
        .process("/unsafe/32x32/filters:blur(2)/http://origin.test/a.png", "", &cancel)
        .await
        .unwrap();

    assert_eq!(out.cache_status, CacheStatus::Miss);
    assert_eq!(h.loader.calls(), 2);
}

#[tokio::test]
async fn test_single_worker_serializes_misses() {
    let h = harness(1);
    let start = Instant::now();

    let a = {
        let service = h.service.clone();
        tokio::spawn(async move {
            service
                .process("/unsafe/20x20/http://origin.test/a.png", "", &CancellationToken::new())
                .await
        })
    };
    let b = {
        let service = h.service.clone();
        tokio::spawn(async move {
            service
                .process("/unsafe/30x30/http://origin.test/b.png", "", &CancellationToken::new())
                .await
        })
    };

    a.await.unwrap().unwrap();
    b.await.unwrap().unwrap();

    assert!(
        start.elapsed() >= DELAY * 2,
        "misses overlapped: {:?}",
        start.elapsed()
    );
    assert_eq!(h.loader.calls(), 2);
}

#[tokio::test]
async fn test_two_workers_run_misses_in_parallel() {
    let h = harness(2);
    let start = Instant::now();

    let requests = ["/unsafe/20x20/http://origin.test/a.png", "/unsafe/30x30/http://origin.test/b.png"]
        .into_iter()
        .map(|path| {
            let service = h.service.clone();
            tokio::spawn(async move { service.process(path, "", &CancellationToken::new()).await })
        })
        .collect::<Vec<_>>();

    for request in requests {
        request.await.unwrap().unwrap();
    }

    assert!(
        start.elapsed() < DELAY * 2,
        "misses were serialized: {:?}",
        start.elapsed()
    );
}

#[tokio::test]
async fn test_storage_hit_bypasses_busy_workers() {
    let h = harness(1);
    let stored_path = "/unsafe/40x40/http://origin.test/stored.png";
    h.storage
        .put(&key_for(stored_path), Bytes::from_static(b"stored result"))
        .await
        .unwrap();

    let slow = {
        let service = h.service.clone();
        tokio::spawn(async move {
            service
                .process("/unsafe/20x20/http://origin.test/slow.png", "", &CancellationToken::new())
                .await
        })
    };
    // Let the slow miss take the only slot
    tokio::time::sleep(Duration::from_millis(50)).await;

    let start = Instant::now();
    let hit = h
        .service
        .process(stored_path, "", &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(hit.cache_status, CacheStatus::StorageHit);
    assert_eq!(hit.bytes, Bytes::from_static(b"stored result"));
    assert!(start.elapsed() < DELAY, "storage hit waited for a slot");

    // Written through to the cache
    assert!(h.cache.exists(&key_for(stored_path)).await.unwrap());

    slow.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_cancellation_while_waiting_for_slot() {
    let h = harness(1);

    let slow = {
        let service = h.service.clone();
        tokio::spawn(async move {
            service
                .process("/unsafe/20x20/http://origin.test/slow.png", "", &CancellationToken::new())
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        trigger.cancel();
    });

    let start = Instant::now();
    let err = h
        .service
        .process("/unsafe/30x30/http://origin.test/other.png", "", &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Cancelled(_)));
    assert!(start.elapsed() < DELAY);

    slow.await.unwrap().unwrap();
    assert_eq!(h.loader.calls(), 1);
}
