//! Data models shared across crates
//!
//! Request-scoped transform descriptions plus the result types produced by the
//! upload and watermark detection entry points.

mod transform;
mod watermark;

pub use transform::*;
pub use watermark::*;
