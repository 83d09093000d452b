//! Blind watermark detection

use bytes::Bytes;
use pictor_core::{AppError, AppResult, DetectionResult};
use pictor_processing::filters::blind_watermark::DEFAULT_TEXT_LEN;
use pictor_processing::{decoder, BlindWatermarkCodec};
use pictor_storage::Storage;
use std::sync::Arc;

/// Share of matching characters at which a damaged mark still counts.
const DETECTION_THRESHOLD: f64 = 0.7;

/// Confidence reported when there is no expected text to compare against.
const UNKNOWN_CONFIDENCE: f64 = 0.5;

pub struct WatermarkService {
    storage: Arc<dyn Storage>,
    expected_text: String,
}

impl WatermarkService {
    /// `expected_text` is the configured watermark; empty means unknown.
    pub fn new(storage: Arc<dyn Storage>, expected_text: impl Into<String>) -> Self {
        Self {
            storage,
            expected_text: expected_text.into(),
        }
    }

    pub async fn detect_from_path(&self, path: &str) -> AppResult<DetectionResult> {
        let data = self.storage.get(path).await.map_err(|e| {
            tracing::error!(path = %path, error = %e, "Failed to get image from storage");
            AppError::from(e)
        })?;
        self.detect(data).await
    }

    pub async fn detect(&self, data: Bytes) -> AppResult<DetectionResult> {
        let length = match self.expected_text.len() {
            0 => DEFAULT_TEXT_LEN,
            n => n,
        };

        let extracted = tokio::task::spawn_blocking(move || -> AppResult<String> {
            let img = decoder::decode(&data, 0, 0).map_err(AppError::decode)?;
            Ok(BlindWatermarkCodec::extract(&img, length))
        })
        .await
        .map_err(|e| AppError::Internal(format!("detection task failed: {}", e)))??;

        let text = extracted.trim_matches('\0').to_string();
        let result = Self::score(&self.expected_text, text);

        tracing::debug!(
            detected = result.detected,
            confidence = result.confidence,
            "Watermark detection finished"
        );
        Ok(result)
    }

    fn score(expected: &str, text: String) -> DetectionResult {
        if expected.is_empty() {
            return DetectionResult {
                detected: true,
                text,
                confidence: UNKNOWN_CONFIDENCE,
            };
        }

        if text == expected {
            return DetectionResult {
                detected: true,
                text,
                confidence: 1.0,
            };
        }

        let matches = expected
            .bytes()
            .zip(text.bytes())
            .filter(|(a, b)| a == b)
            .count();
        let confidence = matches as f64 / expected.len() as f64;

        DetectionResult {
            detected: confidence >= DETECTION_THRESHOLD,
            text,
            confidence,
        }
    }
}
