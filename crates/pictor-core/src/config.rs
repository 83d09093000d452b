//! Configuration module
//!
//! Configuration is read from `PICTOR_*` environment variables (with `.env` support)
//! into plain sections. Every field has a default so a bare environment yields a
//! working development setup.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

const DEFAULT_QUALITY: u8 = 85;
const MAX_DIMENSION: u32 = 4096;
const WORKERS: usize = 4;
const MAX_WORKERS: usize = 128;
const CACHE_MAX_SIZE_BYTES: u64 = 512 * 1024 * 1024;
const CACHE_TTL_SECS: u64 = 3600;
const LOADER_TIMEOUT_SECS: u64 = 30;
const LOADER_MAX_SIZE_BYTES: u64 = 10 * 1024 * 1024;
const MIN_SECURITY_KEY_LEN: usize = 16;

/// Output format names accepted for `PICTOR_PROCESSING_DEFAULT_FORMAT`.
pub const OUTPUT_FORMAT_NAMES: &[&str] =
    &["jpeg", "jpg", "png", "gif", "webp", "avif", "jxl", "heic", "heif"];

/// Image processing defaults and limits
#[derive(Clone, Debug)]
pub struct ProcessingConfig {
    pub default_quality: u8,
    pub max_width: u32,
    pub max_height: u32,
    pub workers: usize,
    pub default_format: String,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            default_quality: DEFAULT_QUALITY,
            max_width: MAX_DIMENSION,
            max_height: MAX_DIMENSION,
            workers: WORKERS,
            default_format: "jpeg".to_string(),
        }
    }
}

/// URL signing and source restrictions
#[derive(Clone, Debug)]
pub struct SecurityConfig {
    pub enabled: bool,
    pub security_key: String,
    pub allow_unsafe: bool,
    pub allowed_sources: Vec<String>,
    pub max_width: u32,
    pub max_height: u32,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            security_key: String::new(),
            allow_unsafe: true,
            allowed_sources: Vec::new(),
            max_width: MAX_DIMENSION,
            max_height: MAX_DIMENSION,
        }
    }
}

#[derive(Clone, Debug)]
pub struct CacheConfig {
    pub enabled: bool,
    pub max_size_bytes: u64,
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_size_bytes: CACHE_MAX_SIZE_BYTES,
            ttl_secs: CACHE_TTL_SECS,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum StorageKind {
    #[default]
    Local,
    Memory,
    None,
}

impl FromStr for StorageKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(StorageKind::Local),
            "memory" => Ok(StorageKind::Memory),
            "none" | "noop" => Ok(StorageKind::None),
            other => Err(anyhow::anyhow!("Unknown storage kind: {}", other)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub kind: StorageKind,
    pub root_path: PathBuf,
    /// When set, processed results are written here while sources stay under `root_path`.
    pub result_root_path: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            kind: StorageKind::Local,
            root_path: PathBuf::from("./data/images"),
            result_root_path: None,
        }
    }
}

/// Source loader limits
#[derive(Clone, Debug)]
pub struct LoaderConfig {
    pub http_timeout_secs: u64,
    pub max_size_bytes: u64,
    pub user_agent: String,
    pub file_root: Option<PathBuf>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            http_timeout_secs: LOADER_TIMEOUT_SECS,
            max_size_bytes: LOADER_MAX_SIZE_BYTES,
            user_agent: "Pictor/1.0".to_string(),
            file_root: None,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct BlindWatermarkConfig {
    pub enabled: bool,
    pub security_key: String,
    pub text: String,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: true,
        }
    }
}

/// Complete server configuration
#[derive(Clone, Debug, Default)]
pub struct Config {
    pub processing: ProcessingConfig,
    pub security: SecurityConfig,
    pub cache: CacheConfig,
    pub storage: StorageConfig,
    pub loader: LoaderConfig,
    pub blind_watermark: BlindWatermarkConfig,
    pub logging: LoggingConfig,
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_list(name: &str) -> Vec<String> {
    env::var(name)
        .map(|v| {
            v.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let processing = ProcessingConfig {
            default_quality: env_or("PICTOR_PROCESSING_DEFAULT_QUALITY", DEFAULT_QUALITY),
            max_width: env_or("PICTOR_PROCESSING_MAX_WIDTH", MAX_DIMENSION),
            max_height: env_or("PICTOR_PROCESSING_MAX_HEIGHT", MAX_DIMENSION),
            workers: env_or("PICTOR_PROCESSING_WORKERS", WORKERS).max(1),
            default_format: env_string("PICTOR_PROCESSING_DEFAULT_FORMAT", "jpeg").to_lowercase(),
        };

        let security = SecurityConfig {
            enabled: env_or("PICTOR_SECURITY_ENABLED", false),
            security_key: env_string("PICTOR_SECURITY_KEY", ""),
            allow_unsafe: env_or("PICTOR_SECURITY_ALLOW_UNSAFE", true),
            allowed_sources: env_list("PICTOR_SECURITY_ALLOWED_SOURCES"),
            max_width: env_or("PICTOR_SECURITY_MAX_WIDTH", MAX_DIMENSION),
            max_height: env_or("PICTOR_SECURITY_MAX_HEIGHT", MAX_DIMENSION),
        };

        let cache = CacheConfig {
            enabled: env_or("PICTOR_CACHE_ENABLED", false),
            max_size_bytes: env_or("PICTOR_CACHE_MAX_SIZE_BYTES", CACHE_MAX_SIZE_BYTES),
            ttl_secs: env_or("PICTOR_CACHE_TTL_SECS", CACHE_TTL_SECS),
        };

        let storage = StorageConfig {
            kind: env::var("PICTOR_STORAGE_KIND")
                .ok()
                .map(|v| v.parse())
                .transpose()?
                .unwrap_or_default(),
            root_path: PathBuf::from(env_string("PICTOR_STORAGE_ROOT_PATH", "./data/images")),
            result_root_path: env::var("PICTOR_STORAGE_RESULT_ROOT_PATH")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
        };

        let loader = LoaderConfig {
            http_timeout_secs: env_or("PICTOR_LOADER_HTTP_TIMEOUT_SECS", LOADER_TIMEOUT_SECS),
            max_size_bytes: env_or("PICTOR_LOADER_MAX_SIZE_BYTES", LOADER_MAX_SIZE_BYTES),
            user_agent: env_string("PICTOR_LOADER_USER_AGENT", "Pictor/1.0"),
            file_root: env::var("PICTOR_LOADER_FILE_ROOT")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
        };

        let blind_watermark = BlindWatermarkConfig {
            enabled: env_or("PICTOR_BLIND_WATERMARK_ENABLED", false),
            security_key: env_string("PICTOR_BLIND_WATERMARK_SECURITY_KEY", ""),
            text: env_string("PICTOR_BLIND_WATERMARK_TEXT", ""),
        };

        let logging = LoggingConfig {
            level: env_string("PICTOR_LOG_LEVEL", "info"),
            json: env_or("PICTOR_LOG_JSON", true),
        };

        let config = Self {
            processing,
            security,
            cache,
            storage,
            loader,
            blind_watermark,
            logging,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !(1..=100).contains(&self.processing.default_quality) {
            return Err(anyhow::anyhow!(
                "PICTOR_PROCESSING_DEFAULT_QUALITY must be between 1 and 100"
            ));
        }

        if !OUTPUT_FORMAT_NAMES.contains(&self.processing.default_format.trim()) {
            return Err(anyhow::anyhow!(
                "PICTOR_PROCESSING_DEFAULT_FORMAT must be one of {}, got '{}'",
                OUTPUT_FORMAT_NAMES.join(", "),
                self.processing.default_format
            ));
        }

        if self.processing.workers == 0 || self.processing.workers > MAX_WORKERS {
            return Err(anyhow::anyhow!(
                "PICTOR_PROCESSING_WORKERS must be between 1 and {}",
                MAX_WORKERS
            ));
        }

        if self.processing.max_width == 0 || self.processing.max_height == 0 {
            return Err(anyhow::anyhow!("Processing max dimensions must be positive"));
        }

        if self.security.enabled && self.security.security_key.len() < MIN_SECURITY_KEY_LEN {
            return Err(anyhow::anyhow!(
                "PICTOR_SECURITY_KEY must be at least {} characters when security is enabled",
                MIN_SECURITY_KEY_LEN
            ));
        }

        if self.blind_watermark.enabled && self.blind_watermark.text.is_empty() {
            return Err(anyhow::anyhow!(
                "PICTOR_BLIND_WATERMARK_TEXT must be set when blind watermarking is enabled"
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.processing.default_quality, 85);
        assert_eq!(config.processing.workers, 4);
        assert_eq!(config.cache.ttl_secs, 3600);
        assert!(config.security.allow_unsafe);
    }

    #[test]
    fn test_validate_rejects_short_security_key() {
        let mut config = Config::default();
        config.security.enabled = true;
        config.security.security_key = "short".to_string();
        assert!(config.validate().is_err());

        config.security.security_key = "0123456789abcdef".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_quality_and_workers() {
        let mut config = Config::default();
        config.processing.default_quality = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.processing.workers = 129;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_default_format() {
        let mut config = Config::default();
        config.processing.default_format = "jpgg".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("PICTOR_PROCESSING_DEFAULT_FORMAT"));

        config.processing.default_format = "webp".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_storage_kind_parse() {
        assert_eq!("LOCAL".parse::<StorageKind>().unwrap(), StorageKind::Local);
        assert_eq!("memory".parse::<StorageKind>().unwrap(), StorageKind::Memory);
        assert_eq!("none".parse::<StorageKind>().unwrap(), StorageKind::None);
        assert!("s3".parse::<StorageKind>().is_err());
    }
}
