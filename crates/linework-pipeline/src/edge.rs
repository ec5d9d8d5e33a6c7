//! Edge detectors: heuristic Sobel + difference-of-Gaussians, Canny, and
//! Laplacian.
//!
//! This module defines the [`EdgeDetector`] trait for pluggable detectors
//! and the [`EdgeDetectorKind`] enum for selecting one at runtime. The
//! style recipes call the free functions directly with recipe-specific
//! thresholds; the enum exists for callers that pick a detector by value
//! (the CLI, tests, custom recipes).
//!
//! All detectors share one boundary policy: only interior pixels are ever
//! classified, so row 0, row `h-1`, column 0 and column `w-1` of every
//! returned [`EdgeMap`] are 0.

use image::{GrayImage, Luma};

use crate::gradient::{interior, sobel_at};
use crate::types::EdgeMap;

/// Sigma of the sharper blur in the difference-of-Gaussians response.
const DOG_SIGMA_SMALL: f32 = 1.0;

/// Sigma of the wider blur in the difference-of-Gaussians response.
const DOG_SIGMA_LARGE: f32 = 2.0;

/// Divisor that maps raw Sobel magnitude onto the 0–255 range the
/// heuristic thresholds were tuned for.
const HEURISTIC_GRADIENT_DIVISOR: f32 = 4.0;

/// Weak-to-strong promotion passes in the heuristic detector.
const HEURISTIC_HYSTERESIS_PASSES: usize = 2;

/// Value of a confirmed edge pixel.
pub const EDGE: u8 = 255;

/// Trait for edge detection strategies.
///
/// Input: a grayscale image. Output: a binary edge map (255 = edge).
pub trait EdgeDetector {
    /// Detect edges in `gray`.
    fn detect(&self, gray: &GrayImage) -> EdgeMap;
}

/// Heuristic Sobel + difference-of-Gaussians detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SobelDetector {
    /// Weak-edge threshold.
    pub low: f32,
    /// Strong-edge threshold.
    pub high: f32,
}

impl EdgeDetector for SobelDetector {
    fn detect(&self, gray: &GrayImage) -> EdgeMap {
        sobel_edges(gray, self.low, self.high)
    }
}

/// Canny detector with optional thinning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CannyDetector {
    /// Weak-edge threshold.
    pub low: f32,
    /// Strong-edge threshold.
    pub high: f32,
    /// Thin ridges to one pixel with non-maximum suppression.
    pub thin: bool,
}

impl EdgeDetector for CannyDetector {
    fn detect(&self, gray: &GrayImage) -> EdgeMap {
        crate::canny::canny_edges(gray, self.low, self.high, self.thin)
    }
}

/// Single-pass Laplacian detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LaplacianDetector {
    /// Minimum absolute Laplacian response.
    pub threshold: f32,
}

impl EdgeDetector for LaplacianDetector {
    fn detect(&self, gray: &GrayImage) -> EdgeMap {
        laplacian_edges(gray, self.threshold)
    }
}

/// Selects an edge detector and its thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EdgeDetectorKind {
    /// Sobel magnitude plus difference-of-Gaussians with two-pass
    /// hysteresis (see [`sobel_edges`]).
    Sobel(SobelDetector),
    /// Canny with optional non-maximum suppression and three-pass
    /// hysteresis (see [`crate::canny::canny_edges`]).
    Canny(CannyDetector),
    /// Single-pass Laplacian (see [`laplacian_edges`]).
    Laplacian(LaplacianDetector),
}

impl EdgeDetector for EdgeDetectorKind {
    fn detect(&self, gray: &GrayImage) -> EdgeMap {
        match self {
            Self::Sobel(detector) => detector.detect(gray),
            Self::Canny(detector) => detector.detect(gray),
            Self::Laplacian(detector) => detector.detect(gray),
        }
    }
}

/// Heuristic edge detector combining Sobel magnitude and a
/// difference-of-Gaussians response.
///
/// 1. Blur copies at sigma 1.0 and 2.0; `dog = |small - large|`.
/// 2. Sobel magnitude on the unblurred input, `min(255, round(√(gx²+gy²) / 4))`.
/// 3. `combined = min(255, grad + 2 * dog)`.
/// 4. `combined >= high` is strong; `low <= combined < high` is weak.
/// 5. Two in-place passes promote weak pixels with any strong 8-neighbour
///    in the result buffer, so strength can travel two hops per call.
#[must_use = "returns the binary edge map"]
pub fn sobel_edges(gray: &GrayImage, low: f32, high: f32) -> EdgeMap {
    let (width, height) = gray.dimensions();
    let w = width as usize;
    let raw = gray.as_raw();

    let blur_small = crate::filter::gaussian_blur(gray, DOG_SIGMA_SMALL);
    let blur_large = crate::filter::gaussian_blur(gray, DOG_SIGMA_LARGE);

    let mut strong = vec![0_u8; raw.len()];
    let mut weak = vec![false; raw.len()];
    for (x, y) in interior(width, height) {
        let idx = y as usize * w + x as usize;
        let dog = blur_small.as_raw()[idx].abs_diff(blur_large.as_raw()[idx]);
        let grad = heuristic_magnitude(raw, w, x as usize, y as usize);
        let combined = (u16::from(grad) + 2 * u16::from(dog)).min(255);
        let combined = f32::from(combined);
        if combined >= high {
            strong[idx] = EDGE;
        } else if combined >= low {
            weak[idx] = true;
        }
    }

    from_raw_or_blank(width, height, promote_weak(width, height, strong, &weak))
}

/// Promote weak pixels that touch a set 8-neighbour, in place, for
/// exactly [`HEURISTIC_HYSTERESIS_PASSES`] row-major passes.
fn promote_weak(width: u32, height: u32, mut result: Vec<u8>, weak: &[bool]) -> Vec<u8> {
    let w = width as usize;
    for _ in 0..HEURISTIC_HYSTERESIS_PASSES {
        for (x, y) in interior(width, height) {
            let idx = y as usize * w + x as usize;
            if weak[idx] && result[idx] == 0 && has_edge_neighbour(&result, w, x, y) {
                result[idx] = EDGE;
            }
        }
    }
    result
}

/// Normalized Sobel magnitude used by [`sobel_edges`].
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn heuristic_magnitude(raw: &[u8], width: usize, x: usize, y: usize) -> u8 {
    let (gx, gy) = sobel_at(raw, width, x, y);
    let magnitude = (gx as f32).hypot(gy as f32) / HEURISTIC_GRADIENT_DIVISOR;
    // Clamped to [0, 255] before the cast.
    magnitude.min(255.0).round() as u8
}

/// Whether any 8-neighbour of interior pixel `(x, y)` is set in `buf`.
pub(crate) fn has_edge_neighbour(buf: &[u8], width: usize, x: u32, y: u32) -> bool {
    let (x, y) = (x as usize, y as usize);
    (y - 1..=y + 1).any(|ny| {
        (x - 1..=x + 1).any(|nx| (nx, ny) != (x, y) && buf[ny * width + nx] == EDGE)
    })
}

/// Laplacian edge detector: `lap = 4·c − N − S − E − W`, edge where
/// `|lap| >= threshold`. Single pass, no hysteresis.
#[must_use = "returns the binary edge map"]
#[allow(clippy::cast_precision_loss)]
pub fn laplacian_edges(gray: &GrayImage, threshold: f32) -> EdgeMap {
    let (width, height) = gray.dimensions();
    let mut out = GrayImage::new(width, height);
    for (x, y) in interior(width, height) {
        let p = |dx: i32, dy: i32| {
            i32::from(
                gray.get_pixel(x.wrapping_add_signed(dx), y.wrapping_add_signed(dy))
                    .0[0],
            )
        };
        let lap = 4 * p(0, 0) - p(0, -1) - p(0, 1) - p(-1, 0) - p(1, 0);
        if lap.abs() as f32 >= threshold {
            out.put_pixel(x, y, Luma([EDGE]));
        }
    }
    out
}

/// Wrap a row-major buffer built for `width × height`.
///
/// Every caller allocates exactly `width * height` samples, so the
/// fallback blank image is unreachable in practice.
pub(crate) fn from_raw_or_blank(width: u32, height: u32, raw: Vec<u8>) -> GrayImage {
    GrayImage::from_raw(width, height, raw).unwrap_or_else(|| GrayImage::new(width, height))
}

/// Number of set (non-zero) pixels in an edge map.
#[must_use]
pub fn count_edge_pixels(edges: &GrayImage) -> u64 {
    edges.as_raw().iter().map(|&v| u64::from(v != 0)).sum()
}
