//! Pure dimension math. No I/O, no pixels.

/// Fit `source` inside `bounds`, preserving aspect ratio and never upscaling.
///
/// Returns `None` when the source already fits. Otherwise the long side (by
/// aspect) snaps to its bound and the other side rounds down:
///
/// ```text
/// aspect > 1 → (max_w, floor(max_w / aspect))
/// aspect < 1 → (floor(max_h * aspect), max_h)
/// aspect = 1 → (max_w, max_w)
/// ```
///
/// Neither side is ever below 1.
pub fn calculate_bounded_dimensions(source: (u32, u32), bounds: (u32, u32)) -> Option<(u32, u32)> {
    let (w, h) = source;
    let (max_w, max_h) = bounds;
    if w <= max_w && h <= max_h {
        return None;
    }
    let aspect = w as f64 / h.max(1) as f64;
    let (out_w, out_h) = if w > h {
        (max_w, (max_w as f64 / aspect).floor() as u32)
    } else if w < h {
        ((max_h as f64 * aspect).floor() as u32, max_h)
    } else {
        (max_w, max_w)
    };
    // Unequal bounds can make the snapped side grow; fall back to a plain fit.
    let (out_w, out_h) = if out_w > w || out_h > h {
        let scale = (max_w as f64 / w as f64).min(max_h as f64 / h as f64);
        (
            (w as f64 * scale).floor() as u32,
            (h as f64 * scale).floor() as u32,
        )
    } else {
        (out_w, out_h)
    };
    Some((out_w.max(1), out_h.max(1)))
}
