//! Pictor Storage Library
//!
//! Storage and cache contracts plus the in-process backends the server ships with.
//!
//! # Key format
//!
//! Processed results live under `cache/{h[0..2]}/{h[2..16]}/{basename}` where `h` is a
//! truncated SHA-256 over the canonical transform parameters; uploaded originals live
//! under `uploads/{YYYY}/{MM}/{DD}/{hash8}_{basename}`. Key generation is centralized in
//! the `keys` module so the cache and storage tiers always agree.
//!
//! Keys must not contain `..` or a leading `/`.

pub mod cache;
pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod memory;
pub mod mixed;
pub mod no_storage;
pub mod traits;

// Re-export commonly used types
pub use cache::{Cache, CacheError, CacheResult, MemoryCache, NoOpCache};
pub use factory::{create_cache, create_storage};
pub use keys::{basename, cache_key, upload_key};
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use memory::MemoryStorage;
pub use mixed::MixedStorage;
pub use no_storage::NoStorage;
pub use traits::{collect_stream, ByteReader, ByteStream, Storage, StorageError, StorageResult};
