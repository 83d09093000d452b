//! Shared key generation for the cache and storage tiers.
//!
//! Processed results: `cache/{h[0..2]}/{h[2..16]}/{basename}` where `h` is the hex
//! SHA-256 of the canonical parameter string, truncated to 64 bits. Uploaded
//! originals: `uploads/{YYYY}/{MM}/{DD}/{hash8}_{basename}`.

use chrono::{DateTime, Utc};
use pictor_core::TransformRequest;
use sha2::{Digest, Sha256};

const CACHE_HASH_LEN: usize = 16;
const UPLOAD_HASH_LEN: usize = 8;

fn sha256_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

/// Last path component of a key, URL or filename.
pub fn basename(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rsplit_once('/') {
        Some((_, name)) if !name.is_empty() => name,
        Some(_) => "image",
        None if trimmed.is_empty() => "image",
        None => trimmed,
    }
}

/// Canonical parameter string hashed into the cache key.
///
/// `format` and `quality` are the resolved values, not the requested ones.
pub fn canonical_params(request: &TransformRequest, format: &str, quality: u8) -> String {
    let crop = request.crop;
    let mut params = vec![
        format!("src_{}", request.image_path),
        format!("w{}", request.width),
        format!("h{}", request.height),
        format!("fh{}", request.flip_h),
        format!("fv{}", request.flip_v),
        format!("fit{}", request.fit_in),
        format!("sm{}", request.smart),
        format!("c{}_{}_{}_{}", crop.left, crop.top, crop.right, crop.bottom),
    ];
    params.extend(request.filters.iter().map(|f| f.canonical()));
    params.push(format!("fmt_{}", format));
    params.push(format!("q{}", quality));
    params.join("-")
}

/// Key under which a processed result is cached and stored.
pub fn cache_key(request: &TransformRequest, format: &str, quality: u8) -> String {
    let hash = sha256_hex(&canonical_params(request, format, quality));
    let hash = &hash[..CACHE_HASH_LEN];
    format!(
        "cache/{}/{}/{}",
        &hash[..2],
        &hash[2..],
        basename(&request.image_path)
    )
}

/// Collision-resistant key for an uploaded original.
pub fn upload_key(filename: &str, now: DateTime<Utc>) -> String {
    let nanos = now.timestamp_nanos_opt().unwrap_or_else(|| now.timestamp_micros());
    let hash = sha256_hex(&format!("{}-{}", filename, nanos));
    format!(
        "uploads/{}/{}_{}",
        now.format("%Y/%m/%d"),
        &hash[..UPLOAD_HASH_LEN],
        basename(filename)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pictor_core::FilterSpec;

    fn request() -> TransformRequest {
        TransformRequest {
            is_unsafe: true,
            width: 300,
            height: 200,
            filters: vec![FilterSpec::new("blur", vec!["5".into()])],
            image_path: "http://example.com/a.jpg".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_basename() {
        assert_eq!(basename("http://example.com/a.jpg"), "a.jpg");
        assert_eq!(basename("photos/cat.png"), "cat.png");
        assert_eq!(basename("cat.png"), "cat.png");
        assert_eq!(basename("dir/"), "dir");
        assert_eq!(basename(""), "image");
    }

    #[test]
    fn test_cache_key_layout() {
        let key = cache_key(&request(), "jpeg", 85);
        let parts: Vec<&str> = key.split('/').collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], "cache");
        assert_eq!(parts[1].len(), 2);
        assert_eq!(parts[2].len(), 14);
        assert_eq!(parts[3], "a.jpg");
    }

    #[test]
    fn test_cache_key_deterministic() {
        assert_eq!(cache_key(&request(), "jpeg", 85), cache_key(&request(), "jpeg", 85));
    }

    #[test]
    fn test_cache_key_changes_with_any_field() {
        let base = cache_key(&request(), "jpeg", 85);

        let mut r = request();
        r.width = 301;
        assert_ne!(cache_key(&r, "jpeg", 85), base);

        let mut r = request();
        r.filters[0].params[0] = "6".to_string();
        assert_ne!(cache_key(&r, "jpeg", 85), base);

        assert_ne!(cache_key(&request(), "webp", 85), base);
        assert_ne!(cache_key(&request(), "jpeg", 80), base);

        let mut r = request();
        r.image_path = "http://other.com/a.jpg".to_string();
        assert_ne!(cache_key(&r, "jpeg", 85), base);
    }

    #[test]
    fn test_upload_key_layout() {
        let now = Utc.with_ymd_and_hms(2024, 3, 7, 12, 0, 0).unwrap();
        let key = upload_key("holiday/beach.jpg", now);
        assert!(key.starts_with("uploads/2024/03/07/"));
        assert!(key.ends_with("_beach.jpg"));
        let name = key.rsplit('/').next().unwrap();
        assert_eq!(name.split('_').next().unwrap().len(), 8);
    }
}
