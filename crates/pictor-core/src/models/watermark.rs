use serde::{Deserialize, Serialize};

/// Outcome of a blind watermark extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub detected: bool,
    pub text: String,
    /// Match confidence in `[0, 1]`.
    pub confidence: f64,
}

/// Result of storing an uploaded image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResult {
    /// Storage key of the stored original.
    pub path: String,
    /// Access URL, either signed or `/unsafe/`-prefixed.
    pub url: String,
}
