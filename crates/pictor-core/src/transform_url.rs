//! Transformation URL parser and builder
//!
//! Paths follow the grammar
//!
//! ```text
//! /{signature|unsafe}/[fit-in/][-][W]x[-][H]/[L]x[T]:[R]x[B]/[smart/][filters:f1(a,b):f2()/]{image path}
//! ```
//!
//! Modifier segments may appear in any order. Each segment is classified by its
//! shape; the first segment that matches no known shape starts the image path,
//! which may itself contain `/` (remote URLs) and is percent-decoded.
//!
//! # Example
//!
//! ```rust
//! use pictor_core::transform_url::TransformUrlParser;
//!
//! let req = TransformUrlParser::parse("/unsafe/300x200/filters:blur(5)/http://example.com/a.jpg").unwrap();
//! assert!(req.is_unsafe);
//! assert_eq!((req.width, req.height), (300, 200));
//! assert_eq!(req.filters[0].name, "blur");
//! assert_eq!(req.image_path, "http://example.com/a.jpg");
//! ```

use std::sync::LazyLock;

use percent_encoding::percent_decode_str;
use regex::Regex;

use crate::error::AppError;
use crate::models::{CropRect, FilterSpec, TransformRequest};

const UNSAFE_SEGMENT: &str = "unsafe";
const FIT_IN_SEGMENT: &str = "fit-in";
const SMART_SEGMENT: &str = "smart";
const FILTERS_PREFIX: &str = "filters:";

static SIZE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(-)?(\d*)x(-)?(\d*)$").expect("size pattern is valid"));
static CROP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)x(\d+):(\d+)x(\d+)$").expect("crop pattern is valid"));
static FILTER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\w+)\((.*)\)$").expect("filter pattern is valid"));

/// Parser for transformation URL paths. Pure: never touches network or disk.
pub struct TransformUrlParser;

impl TransformUrlParser {
    pub fn parse(path: &str) -> Result<TransformRequest, AppError> {
        let path = path.strip_prefix('/').unwrap_or(path);
        if path.is_empty() {
            return Err(AppError::Parse("empty URL path".to_string()));
        }

        let parts: Vec<&str> = path.split('/').collect();
        if parts.len() < 2 {
            return Err(AppError::Parse(
                "URL path is missing required segments".to_string(),
            ));
        }

        let mut request = TransformRequest::default();
        if parts[0] == UNSAFE_SEGMENT {
            request.is_unsafe = true;
        } else {
            request.signature = parts[0].to_string();
        }

        for (idx, part) in parts.iter().enumerate().skip(1) {
            match *part {
                FIT_IN_SEGMENT => request.fit_in = true,
                SMART_SEGMENT => request.smart = true,
                _ if Self::parse_size(part, &mut request) => {}
                _ if Self::parse_crop(part, &mut request) => {}
                _ => {
                    if let Some(list) = part.strip_prefix(FILTERS_PREFIX) {
                        if list.is_empty() {
                            return Err(AppError::Parse(format!(
                                "invalid filter segment: {}",
                                part
                            )));
                        }
                        request.filters.extend(parse_filters(list)?);
                        continue;
                    }

                    let raw = parts[idx..].join("/");
                    request.image_path = match percent_decode_str(&raw).decode_utf8() {
                        Ok(decoded) => decoded.into_owned(),
                        Err(_) => raw,
                    };
                    break;
                }
            }
        }

        if request.image_path.is_empty() {
            return Err(AppError::Parse("missing image path".to_string()));
        }

        Ok(request)
    }

    /// Splits a signed path into `(signature, payload)` where the payload is what
    /// the signature was computed over.
    pub fn split_signature(path: &str) -> Option<(&str, &str)> {
        let path = path.strip_prefix('/').unwrap_or(path);
        path.split_once('/')
    }

    fn parse_size(segment: &str, request: &mut TransformRequest) -> bool {
        let Some(caps) = SIZE_RE.captures(segment) else {
            return false;
        };

        request.flip_h = caps.get(1).is_some();
        request.flip_v = caps.get(3).is_some();
        // Overflowing numbers leave the axis unconstrained.
        request.width = caps
            .get(2)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0);
        request.height = caps
            .get(4)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0);
        true
    }

    fn parse_crop(segment: &str, request: &mut TransformRequest) -> bool {
        let Some(caps) = CROP_RE.captures(segment) else {
            return false;
        };

        let num = |i: usize| -> u32 {
            caps.get(i)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(0)
        };
        request.crop = CropRect {
            left: num(1),
            top: num(2),
            right: num(3),
            bottom: num(4),
        };
        true
    }
}

/// Parses a `:`-separated filter list (without the `filters:` prefix).
pub fn parse_filters(list: &str) -> Result<Vec<FilterSpec>, AppError> {
    split_filters(list)
        .into_iter()
        .map(|part| parse_filter(&part))
        .collect()
}

fn parse_filter(segment: &str) -> Result<FilterSpec, AppError> {
    let caps = FILTER_RE
        .captures(segment)
        .ok_or_else(|| AppError::Parse(format!("invalid filter: {}", segment)))?;

    let name = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
    let args = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
    let params = if args.is_empty() {
        Vec::new()
    } else {
        args.split(',').map(|p| p.trim().to_string()).collect()
    };

    Ok(FilterSpec::new(name, params))
}

/// Splits on `:` only outside parentheses, dropping empty pieces.
pub fn split_filters(list: &str) -> Vec<String> {
    let mut filters = Vec::new();
    let mut current = String::new();
    let mut depth: i32 = 0;

    for c in list.chars() {
        match c {
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth -= 1;
                current.push(c);
            }
            ':' if depth == 0 => {
                if !current.is_empty() {
                    filters.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }

    if !current.is_empty() {
        filters.push(current);
    }

    filters
}

/// Fluent builder for transformation paths (without the signature segment).
#[derive(Debug, Clone, Default)]
pub struct TransformUrlBuilder {
    fit_in: bool,
    width: u32,
    height: u32,
    flip_h: bool,
    flip_v: bool,
    crop: Option<CropRect>,
    smart: bool,
    filters: Vec<FilterSpec>,
}

impl TransformUrlBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fit_in(mut self) -> Self {
        self.fit_in = true;
        self
    }

    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn flip_h(mut self) -> Self {
        self.flip_h = true;
        self
    }

    pub fn flip_v(mut self) -> Self {
        self.flip_v = true;
        self
    }

    pub fn crop(mut self, left: u32, top: u32, right: u32, bottom: u32) -> Self {
        self.crop = Some(CropRect {
            left,
            top,
            right,
            bottom,
        });
        self
    }

    pub fn smart(mut self) -> Self {
        self.smart = true;
        self
    }

    pub fn filter(mut self, name: &str, params: &[&str]) -> Self {
        self.filters.push(FilterSpec::new(
            name,
            params.iter().map(|p| p.to_string()).collect(),
        ));
        self
    }

    /// Renders the payload part of a URL, e.g. `fit-in/300x200/filters:blur(5)/a.jpg`.
    pub fn build_path(&self, image_path: &str) -> String {
        let mut segments: Vec<String> = Vec::new();
        if self.fit_in {
            segments.push(FIT_IN_SEGMENT.to_string());
        }
        if self.width > 0 || self.height > 0 || self.flip_h || self.flip_v {
            let axis = |flip: bool, n: u32| {
                let sign = if flip { "-" } else { "" };
                let num = if n > 0 { n.to_string() } else { String::new() };
                format!("{}{}", sign, num)
            };
            segments.push(format!(
                "{}x{}",
                axis(self.flip_h, self.width),
                axis(self.flip_v, self.height)
            ));
        }
        if let Some(c) = self.crop {
            segments.push(format!("{}x{}:{}x{}", c.left, c.top, c.right, c.bottom));
        }
        if self.smart {
            segments.push(SMART_SEGMENT.to_string());
        }
        if !self.filters.is_empty() {
            let list: Vec<String> = self.filters.iter().map(FilterSpec::canonical).collect();
            segments.push(format!("{}{}", FILTERS_PREFIX, list.join(":")));
        }
        segments.push(image_path.trim_start_matches('/').to_string());
        segments.join("/")
    }

    /// Renders an unsigned `/unsafe/...` path.
    pub fn build_unsafe(&self, image_path: &str) -> String {
        format!("/{}/{}", UNSAFE_SEGMENT, self.build_path(image_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_end_to_end_example() {
        let req =
            TransformUrlParser::parse("/unsafe/300x200/filters:blur(5)/http://example.com/a.jpg")
                .unwrap();
        assert!(req.is_unsafe);
        assert!(req.signature.is_empty());
        assert_eq!(req.width, 300);
        assert_eq!(req.height, 200);
        assert_eq!(req.filters, vec![FilterSpec::new("blur", vec!["5".into()])]);
        assert_eq!(req.image_path, "http://example.com/a.jpg");
    }

    #[test]
    fn test_parse_size_flips() {
        let req = TransformUrlParser::parse("/unsafe/-300x200/a.jpg").unwrap();
        assert!(req.flip_h);
        assert!(!req.flip_v);
        assert_eq!((req.width, req.height), (300, 200));

        let req = TransformUrlParser::parse("/unsafe/300x-/a.jpg").unwrap();
        assert!(!req.flip_h);
        assert!(req.flip_v);
        assert_eq!((req.width, req.height), (300, 0));

        let req = TransformUrlParser::parse("/unsafe/300x0/a.jpg").unwrap();
        assert_eq!((req.width, req.height), (300, 0));

        let req = TransformUrlParser::parse("/unsafe/x/a.jpg").unwrap();
        assert_eq!((req.width, req.height), (0, 0));
    }

    #[test]
    fn test_parse_signature_and_modifiers_any_order() {
        let req = TransformUrlParser::parse(
            "abcSIG/smart/10x20:110x220/fit-in/400x300/images/cat.png",
        )
        .unwrap();
        assert!(!req.is_unsafe);
        assert_eq!(req.signature, "abcSIG");
        assert!(req.smart);
        assert!(req.fit_in);
        assert_eq!(
            req.crop,
            CropRect {
                left: 10,
                top: 20,
                right: 110,
                bottom: 220
            }
        );
        assert_eq!((req.width, req.height), (400, 300));
        assert_eq!(req.image_path, "images/cat.png");
    }

    #[test]
    fn test_parse_percent_decodes_path() {
        let req = TransformUrlParser::parse("/unsafe/my%20photo.jpg").unwrap();
        assert_eq!(req.image_path, "my photo.jpg");

        // invalid UTF-8 after decoding keeps the raw text
        let req = TransformUrlParser::parse("/unsafe/bad%FF.jpg").unwrap();
        assert_eq!(req.image_path, "bad%FF.jpg");
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(TransformUrlParser::parse(""), Err(AppError::Parse(_))));
        assert!(matches!(TransformUrlParser::parse("/"), Err(AppError::Parse(_))));
        assert!(matches!(
            TransformUrlParser::parse("/unsafe"),
            Err(AppError::Parse(_))
        ));
        assert!(matches!(
            TransformUrlParser::parse("/unsafe/300x200"),
            Err(AppError::Parse(_))
        ));
        assert!(matches!(
            TransformUrlParser::parse("/unsafe/300x200/filters:blur(5)"),
            Err(AppError::Parse(_))
        ));
    }

    #[test]
    fn test_parse_malformed_filter_names_segment() {
        let err = TransformUrlParser::parse("/unsafe/filters:blur(5):oops/a.jpg").unwrap_err();
        assert!(err.to_string().contains("oops"));

        let err = TransformUrlParser::parse("/unsafe/filters:/a.jpg").unwrap_err();
        assert!(matches!(err, AppError::Parse(_)));
    }

    #[test]
    fn test_split_filters_paren_aware() {
        let parts = split_filters("blur(7):grayscale():watermark(a,b,c)");
        assert_eq!(parts, vec!["blur(7)", "grayscale()", "watermark(a,b,c)"]);
        assert!(parts.iter().all(|p| !p.contains(':')));

        let parts = split_filters("watermark(http://x.com/w.png,br):grayscale()");
        assert_eq!(
            parts,
            vec!["watermark(http://x.com/w.png,br)", "grayscale()"]
        );

        assert_eq!(split_filters("::blur(1)::"), vec!["blur(1)"]);
    }

    #[test]
    fn test_parse_filters_params() {
        let filters = parse_filters("watermark( a.png , br ,50):grayscale()").unwrap();
        assert_eq!(filters.len(), 2);
        assert_eq!(filters[0].params, vec!["a.png", "br", "50"]);
        assert!(filters[1].params.is_empty());
    }

    #[test]
    fn test_split_signature() {
        assert_eq!(
            TransformUrlParser::split_signature("/sig/300x200/a.jpg"),
            Some(("sig", "300x200/a.jpg"))
        );
        assert_eq!(TransformUrlParser::split_signature("/nosplit"), None);
    }

    #[test]
    fn test_builder_round_trips_through_parser() {
        let path = TransformUrlBuilder::new()
            .fit_in()
            .size(300, 0)
            .flip_v()
            .smart()
            .filter("blur", &["5"])
            .filter("format", &["webp"])
            .build_unsafe("photos/a.jpg");
        assert_eq!(
            path,
            "/unsafe/fit-in/300x-/smart/filters:blur(5):format(webp)/photos/a.jpg"
        );

        let req = TransformUrlParser::parse(&path).unwrap();
        assert!(req.fit_in && req.smart && req.flip_v);
        assert_eq!(req.width, 300);
        assert_eq!(req.filters.len(), 2);
        assert_eq!(req.image_path, "photos/a.jpg");
    }
}
