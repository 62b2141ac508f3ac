//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

/// Dimensions of `source` scaled so its longer edge is at most `max_edge`.
///
/// Aspect ratio is preserved and the result is never larger than the source:
/// a source whose longer edge already fits is returned unchanged. The shorter
/// edge is rounded and never drops below one pixel.
///
/// ```text
/// (6000, 4000) fit 1600 → (1600, 1067)
/// (3000, 4500) fit 1600 → (1067, 1600)
/// ( 800,  600) fit 1600 → ( 800,  600)
/// ```
pub fn fit_within(source: (u32, u32), max_edge: u32) -> (u32, u32) {
    let (w, h) = source;
    let longer = w.max(h);
    if longer <= max_edge || longer == 0 {
        return source;
    }

    let ratio = max_edge as f64 / longer as f64;
    if w >= h {
        let scaled = ((h as f64 * ratio).round() as u32).max(1);
        (max_edge, scaled)
    } else {
        let scaled = ((w as f64 * ratio).round() as u32).max(1);
        (scaled, max_edge)
    }
}

/// Whether producing a `max_edge` variant of `source` requires resampling.
pub fn needs_downscale(source: (u32, u32), max_edge: u32) -> bool {
    source.0.max(source.1) > max_edge
}
