use serde::{Deserialize, Serialize};

/// A named filter invocation, e.g. `blur(5)`.
///
/// Params are opaque strings; each filter interprets its own.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FilterSpec {
    pub name: String,
    pub params: Vec<String>,
}

impl FilterSpec {
    pub fn new(name: impl Into<String>, params: Vec<String>) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }

    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }

    /// Canonical `name(p1,p2)` rendering used in cache keys.
    pub fn canonical(&self) -> String {
        format!("{}({})", self.name, self.params.join(","))
    }
}

/// Manual crop bounds in absolute pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CropRect {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl CropRect {
    pub fn is_empty(&self) -> bool {
        self.left == 0 && self.top == 0 && self.right == 0 && self.bottom == 0
    }

    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }
}

/// A parsed transformation URL.
///
/// `width`/`height` of 0 mean "unconstrained" on that axis.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TransformRequest {
    /// Empty when the request is unsafe.
    pub signature: String,
    pub is_unsafe: bool,
    pub width: u32,
    pub height: u32,
    pub flip_h: bool,
    pub flip_v: bool,
    pub fit_in: bool,
    pub crop: CropRect,
    pub smart: bool,
    pub filters: Vec<FilterSpec>,
    /// Remote URL or opaque storage key.
    pub image_path: String,
    #[serde(default)]
    pub accept_header: String,
}

impl TransformRequest {
    pub fn filter(&self, name: &str) -> Option<&FilterSpec> {
        self.filters.iter().find(|f| f.name == name)
    }

    pub fn with_accept(mut self, accept: impl Into<String>) -> Self {
        self.accept_header = accept.into();
        self
    }
}
