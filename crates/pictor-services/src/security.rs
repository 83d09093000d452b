//! URL signing and source allowlisting

use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Length of a base64 (padded) SHA-256 signature.
pub const SIGNATURE_LEN: usize = 44;

pub trait UrlSigner: Send + Sync {
    /// Signature over `path`; a leading `/` is ignored.
    fn sign(&self, path: &str) -> String;

    fn verify(&self, signature: &str, path: &str) -> bool;

    /// `/{signature}/{path}`
    fn sign_url(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        format!("/{}/{}", self.sign(path), path)
    }
}

/// HMAC-SHA256 signer producing URL-safe base64 signatures.
#[derive(Clone)]
pub struct HmacSigner {
    mac: HmacSha256,
}

impl HmacSigner {
    pub fn new(key: &str) -> anyhow::Result<Self> {
        let mac = HmacSha256::new_from_slice(key.as_bytes())
            .map_err(|e| anyhow::anyhow!("Invalid signing key: {}", e))?;
        Ok(Self { mac })
    }

    fn keyed(&self, path: &str) -> HmacSha256 {
        let mut mac = self.mac.clone();
        mac.update(path.trim_start_matches('/').as_bytes());
        mac
    }
}

impl UrlSigner for HmacSigner {
    fn sign(&self, path: &str) -> String {
        URL_SAFE.encode(self.keyed(path).finalize().into_bytes())
    }

    fn verify(&self, signature: &str, path: &str) -> bool {
        if signature.len() != SIGNATURE_LEN {
            return false;
        }
        let Ok(raw) = URL_SAFE.decode(signature) else {
            return false;
        };
        self.keyed(path).verify_slice(&raw).is_ok()
    }
}

/// Host allowlist for remote sources.
///
/// Patterns are exact hosts or `*.example.com`, which matches one subdomain
/// level and `example.com` itself. An empty list allows everything.
#[derive(Debug, Clone, Default)]
pub struct SourceValidator {
    allowed: Vec<String>,
}

impl SourceValidator {
    pub fn new(allowed: Vec<String>) -> Self {
        Self {
            allowed: allowed.into_iter().map(|p| p.to_lowercase()).collect(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.allowed.is_empty()
    }

    pub fn is_allowed(&self, source: &str) -> bool {
        if !self.is_enabled() {
            return true;
        }

        match extract_host(source) {
            Some(host) => self.allowed.iter().any(|p| matches_pattern(p, &host)),
            None => false,
        }
    }
}

fn extract_host(source: &str) -> Option<String> {
    let host = if source.contains("://") {
        reqwest::Url::parse(source).ok()?.host_str()?.to_string()
    } else {
        let host = source.split('/').next().unwrap_or("");
        host.split(':').next().unwrap_or("").to_string()
    };

    (!host.is_empty()).then(|| host.to_lowercase())
}

fn matches_pattern(pattern: &str, host: &str) -> bool {
    if pattern == host {
        return true;
    }

    let Some(apex) = pattern.strip_prefix("*.") else {
        return false;
    };
    if host == apex {
        return true;
    }

    host.strip_suffix(apex)
        .and_then(|rest| rest.strip_suffix('.'))
        .is_some_and(|label| !label.is_empty() && !label.contains('.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "0123456789abcdef";

    #[test]
    fn test_sign_and_verify() {
        let signer = HmacSigner::new(KEY).unwrap();
        let sig = signer.sign("300x200/a.jpg");
        assert_eq!(sig.len(), SIGNATURE_LEN);
        assert_eq!(sig, signer.sign("/300x200/a.jpg"));

        assert!(signer.verify(&sig, "300x200/a.jpg"));
        assert!(!signer.verify(&sig, "300x201/a.jpg"));
        assert!(!signer.verify("short", "300x200/a.jpg"));

        let other = HmacSigner::new("another-key-entirely").unwrap();
        assert!(!other.verify(&sig, "300x200/a.jpg"));
    }

    #[test]
    fn test_sign_url() {
        let signer = HmacSigner::new(KEY).unwrap();
        let url = signer.sign_url("/uploads/a.jpg");
        let (sig, path) = url.trim_start_matches('/').split_once('/').unwrap();
        assert_eq!(path, "uploads/a.jpg");
        assert!(signer.verify(sig, path));
    }

    #[test]
    fn test_source_validator() {
        let open = SourceValidator::default();
        assert!(!open.is_enabled());
        assert!(open.is_allowed("http://anything.test/a.jpg"));

        let validator = SourceValidator::new(vec![
            "images.example.com".to_string(),
            "*.cdn.test".to_string(),
        ]);
        assert!(validator.is_allowed("https://images.example.com/a.jpg"));
        assert!(validator.is_allowed("https://IMAGES.example.com:8443/a.jpg"));
        assert!(validator.is_allowed("http://eu.cdn.test/a.jpg"));
        assert!(validator.is_allowed("http://cdn.test/a.jpg"));
        assert!(!validator.is_allowed("http://a.b.cdn.test/a.jpg"));
        assert!(!validator.is_allowed("http://evilcdn.test/a.jpg"));
        assert!(!validator.is_allowed("http://example.com/a.jpg"));
        assert!(!validator.is_allowed(""));
    }
}
