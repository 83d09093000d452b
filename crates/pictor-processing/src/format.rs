use anyhow::{anyhow, Result};
use pictor_core::TransformRequest;
use std::fmt;

/// Output format for encoded images
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OutputFormat {
    #[default]
    Jpeg,
    Png,
    Gif,
    WebP,
    Avif,
    Jxl,
    Heic,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Result<Self> {
        match normalize(s).as_str() {
            "jpeg" => Ok(OutputFormat::Jpeg),
            "png" => Ok(OutputFormat::Png),
            "gif" => Ok(OutputFormat::Gif),
            "webp" => Ok(OutputFormat::WebP),
            "avif" => Ok(OutputFormat::Avif),
            "jxl" => Ok(OutputFormat::Jxl),
            "heic" | "heif" => Ok(OutputFormat::Heic),
            _ => Err(anyhow!("Invalid format: {}", s)),
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::Png => "png",
            OutputFormat::Gif => "gif",
            OutputFormat::WebP => "webp",
            OutputFormat::Avif => "avif",
            OutputFormat::Jxl => "jxl",
            OutputFormat::Heic => "heic",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
            OutputFormat::Gif => "image/gif",
            OutputFormat::WebP => "image/webp",
            OutputFormat::Avif => "image/avif",
            OutputFormat::Jxl => "image/jxl",
            OutputFormat::Heic => "image/heic",
        }
    }

    /// The format actually produced by the encoder for this request.
    ///
    /// JPEG XL and HEIC have no encoder in the stack and are served as JPEG.
    pub fn encoded_as(self) -> Self {
        match self {
            OutputFormat::Jxl | OutputFormat::Heic => OutputFormat::Jpeg,
            other => other,
        }
    }

    /// Format named by a path's file extension, ignoring any query string.
    pub fn from_path(path: &str) -> Option<Self> {
        let path = path.split(['?', '#']).next().unwrap_or(path);
        let file = path.rsplit('/').next().unwrap_or(path);
        let (_, ext) = file.rsplit_once('.')?;
        Self::parse(ext).ok()
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Lowercase a format name and fold `jpg` into `jpeg`.
pub fn normalize(format: &str) -> String {
    let lower = format.trim().to_lowercase();
    if lower == "jpg" {
        "jpeg".to_string()
    } else {
        lower
    }
}

/// Picks the output format for a request.
pub struct FormatResolver;

impl FormatResolver {
    /// Precedence: `format()` filter, Accept header (avif > jxl > webp), path
    /// extension, then `default`. An unrecognised `format()` value resolves to JPEG.
    pub fn resolve(request: &TransformRequest, default: OutputFormat) -> OutputFormat {
        if let Some(spec) = request.filter("format") {
            if let Some(value) = spec.param(0).filter(|v| !v.trim().is_empty()) {
                return OutputFormat::parse(value).unwrap_or(OutputFormat::Jpeg);
            }
        }

        if let Some(format) = Self::negotiate(&request.accept_header) {
            return format;
        }

        OutputFormat::from_path(&request.image_path).unwrap_or(default)
    }

    /// Substring-based negotiation; q-values are not considered.
    pub fn negotiate(accept: &str) -> Option<OutputFormat> {
        if accept.contains("image/avif") {
            Some(OutputFormat::Avif)
        } else if accept.contains("image/jxl") {
            Some(OutputFormat::Jxl)
        } else if accept.contains("image/webp") {
            Some(OutputFormat::WebP)
        } else {
            None
        }
    }
}
