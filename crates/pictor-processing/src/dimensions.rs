//! Output size planning

/// Clamp requested dimensions to server limits. A limit of 0 means unlimited.
pub fn clamp_to_limits(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    let width = if max_width > 0 { width.min(max_width) } else { width };
    let height = if max_height > 0 { height.min(max_height) } else { height };
    (width, height)
}

/// Compute the output size for an image of `orig_w`x`orig_h`.
///
/// - both requested dimensions 0: original size
/// - one of them 0: the other axis follows the original aspect ratio
/// - both set without `fit_in`: exactly the requested size
/// - both set with `fit_in`: the largest size with the original aspect ratio that fits the box
///
/// Derived axes are truncated, never rounded, and never drop below 1.
pub fn plan(orig_w: u32, orig_h: u32, req_w: u32, req_h: u32, fit_in: bool) -> (u32, u32) {
    if req_w == 0 && req_h == 0 {
        return (orig_w, orig_h);
    }

    if orig_w == 0 || orig_h == 0 {
        return (req_w.max(1), req_h.max(1));
    }

    let ratio = orig_w as f64 / orig_h as f64;
    let by_width = |w: u32| (w, ((w as f64 / ratio) as u32).max(1));
    let by_height = |h: u32| (((h as f64 * ratio) as u32).max(1), h);

    if req_h == 0 {
        return by_width(req_w);
    }
    if req_w == 0 {
        return by_height(req_h);
    }

    if !fit_in {
        return (req_w, req_h);
    }

    let target_ratio = req_w as f64 / req_h as f64;
    if ratio > target_ratio {
        by_width(req_w)
    } else {
        by_height(req_h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_keeps_original_without_request() {
        assert_eq!(plan(800, 600, 0, 0, false), (800, 600));
        assert_eq!(plan(800, 600, 0, 0, true), (800, 600));
    }

    #[test]
    fn test_plan_single_axis_preserves_ratio() {
        assert_eq!(plan(800, 600, 400, 0, false), (400, 300));
        assert_eq!(plan(800, 600, 0, 300, false), (400, 300));
        assert_eq!(plan(1000, 3, 1, 0, false), (1, 1));
        assert_eq!(plan(3, 2, 100, 0, false), (100, 66));
    }

    #[test]
    fn test_plan_fit_in() {
        assert_eq!(plan(800, 400, 300, 300, true), (300, 150));
        assert_eq!(plan(400, 800, 300, 300, true), (150, 300));
    }

    #[test]
    fn test_plan_fill_returns_exact_request() {
        assert_eq!(plan(800, 400, 300, 300, false), (300, 300));
    }

    #[test]
    fn test_clamp_to_limits() {
        assert_eq!(clamp_to_limits(5000, 100, 4096, 4096), (4096, 100));
        assert_eq!(clamp_to_limits(5000, 5000, 0, 0), (5000, 5000));
    }
}
