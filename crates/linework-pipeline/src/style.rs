//! Style recipes: five fixed compositions of blur, detectors, morphology
//! and subject masks.
//!
//! Every recipe is a pure function of the normalized grayscale image, the
//! validated [`StyleParams`] and the engine [`PipelineConfig`]. Thresholds
//! scale with contrast through [`StyleParams::scale_factor`] and are
//! floored by [`scaled`] so extreme settings never collapse to zero.
//!
//! Independent sub-passes may run on the rayon pool when
//! [`PipelineConfig::parallel`] is set. Merge order is fixed in every
//! recipe, so parallel and sequential runs produce identical maps.

pub mod detailed;
pub mod hatching;
pub mod outline;
pub mod simple;
pub mod solid;

use image::GrayImage;
use rayon::prelude::*;

use crate::morphology::{close, remove_small_components};
use crate::types::{EdgeMap, PipelineConfig, Style, StyleParams};

/// Contrast divisor for Outline, Simple, Hatching and Solid.
pub const STANDARD_DIVISOR: f32 = 100.0;

/// Contrast divisor for Detailed, which keeps more texture at every
/// contrast setting.
pub const DETAILED_DIVISOR: f32 = 150.0;

/// Contrast-scaled threshold with a hard floor:
/// `max(floor, round(base * scale))`.
#[must_use]
pub fn scaled(base: f32, floor: f32, scale: f32) -> f32 {
    (base * scale).round().max(floor)
}

/// Render `gray` in the requested style, then apply the optional
/// cleanup passes: gap closing, then small-fragment removal.
#[must_use = "returns the binary edge map"]
pub fn render(gray: &GrayImage, params: StyleParams, config: &PipelineConfig) -> EdgeMap {
    let mut edges = match params.style() {
        Style::Outline => outline::render(gray, params, config),
        Style::Simple => simple::render(gray, params, config),
        Style::Detailed => detailed::render(gray, params, config),
        Style::Hatching => hatching::render(gray, params, config),
        Style::Solid => solid::render(gray, params, config),
    };
    if config.gap_close_radius > 0 {
        edges = close(&edges, config.gap_close_radius);
    }
    if config.min_component_area > 1 {
        edges = remove_small_components(&edges, config.min_component_area);
    }
    edges
}

/// Line thickness as a morphology radius.
fn thickness(params: StyleParams) -> u32 {
    u32::from(params.line_thickness())
}

/// Run two independent sub-passes, concurrently when `parallel` is set.
pub(crate) fn join<A, B, RA, RB>(parallel: bool, a: A, b: B) -> (RA, RB)
where
    A: FnOnce() -> RA + Send,
    B: FnOnce() -> RB + Send,
    RA: Send,
    RB: Send,
{
    if parallel {
        rayon::join(a, b)
    } else {
        (a(), b())
    }
}

/// Map `f` over `items`, concurrently when `parallel` is set. Output
/// order always matches input order.
pub(crate) fn map_all<T, R, F>(parallel: bool, items: &[T], f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync + Send,
{
    if parallel {
        items.par_iter().map(f).collect()
    } else {
        items.iter().map(f).collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::edge::count_edge_pixels;
    use image::Luma;

    /// Soft radial blob on a light background with some texture.
    fn portrait(w: u32, h: u32) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| {
            let dx = f64::from(x) - f64::from(w) / 2.0;
            let dy = f64::from(y) - f64::from(h) / 2.0;
            let r = dx.hypot(dy);
            let v = if r < f64::from(w.min(h)) / 3.0 {
                40 + (x * 7 + y * 3) % 50
            } else {
                230
            };
            Luma([u8::try_from(v).unwrap()])
        })
    }

    #[test]
    fn scaled_applies_floor() {
        assert!((scaled(15.0, 8.0, 1.0) - 15.0).abs() < f32::EPSILON);
        assert!((scaled(15.0, 8.0, 0.5) - 8.0).abs() < f32::EPSILON);
        assert!((scaled(45.0, 20.0, 1.5) - 68.0).abs() < f32::EPSILON);
        // round half away from zero: 12 * 0.625 = 7.5 -> 8
        assert!((scaled(12.0, 6.0, 0.625) - 8.0).abs() < f32::EPSILON);
    }

    #[test]
    fn cleanup_passes_only_remove_fragments() {
        let gray = portrait(48, 36);
        let plain = PipelineConfig::default();
        let cleaned = PipelineConfig {
            min_component_area: 12,
            ..PipelineConfig::default()
        };
        for style in Style::ALL {
            let params = StyleParams::new(style, 1, 70).unwrap();
            let before = render(&gray, params, &plain);
            let after = render(&gray, params, &cleaned);
            assert!(count_edge_pixels(&after) <= count_edge_pixels(&before), "{style}");
            assert!(
                after
                    .pixels()
                    .zip(before.pixels())
                    .all(|(a, b)| a.0[0] == 0 || b.0[0] == 255),
                "{style} gained pixels"
            );
        }
    }

    #[test]
    fn every_style_matches_input_dimensions() {
        let gray = portrait(40, 28);
        let config = PipelineConfig::default();
        for style in Style::ALL {
            let params = StyleParams::new(style, 3, 50).unwrap();
            let edges = render(&gray, params, &config);
            assert_eq!(edges.dimensions(), (40, 28), "{style}");
            assert!(
                edges.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255),
                "{style} produced a non-binary map"
            );
        }
    }

    #[test]
    fn parallel_and_sequential_agree() {
        let gray = portrait(48, 48);
        let parallel = PipelineConfig::default();
        let sequential = PipelineConfig {
            parallel: false,
            ..PipelineConfig::default()
        };
        for style in Style::ALL {
            let params = StyleParams::new(style, 2, 60).unwrap();
            assert_eq!(
                render(&gray, params, &parallel),
                render(&gray, params, &sequential),
                "{style}"
            );
        }
    }

    #[test]
    fn flat_image_has_no_contours() {
        let gray = GrayImage::from_pixel(32, 32, Luma([240]));
        let config = PipelineConfig::default();
        for style in [Style::Outline, Style::Simple, Style::Detailed] {
            let params = StyleParams::new(style, 3, 50).unwrap();
            assert_eq!(count_edge_pixels(&render(&gray, params, &config)), 0, "{style}");
        }
    }

    #[test]
    fn map_all_preserves_order() {
        let items = [3, 1, 2];
        assert_eq!(map_all(true, &items, |v| v * 10), vec![30, 10, 20]);
        assert_eq!(map_all(false, &items, |v| v * 10), vec![30, 10, 20]);
    }
}
