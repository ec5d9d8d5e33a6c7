//! Subject masks: separate textured "subject" pixels from flat background.
//!
//! Two heuristics exist and are kept as distinct variants because each
//! shading recipe's look depends on which one it was tuned against:
//!
//! - [`SubjectMaskKind::BlockVariance`] partitions the image into 16×16
//!   blocks and keeps blocks whose variance exceeds 5% of the busiest
//!   block. Flat sky or studio backdrops drop out; faces, fur and foliage
//!   stay in.
//! - [`SubjectMaskKind::Brightness`] keeps every pixel darker than a
//!   near-white backdrop level.

use std::fmt;

use image::{GrayImage, Luma};
use serde::{Deserialize, Serialize};

/// Side length of a variance block in pixels.
pub const BLOCK_SIZE: u32 = 16;

/// Fraction of the maximum block variance a block must exceed to count
/// as subject.
pub const VARIANCE_FRACTION: f64 = 0.05;

/// Pixels darker than this count as subject under the brightness mask.
pub const BRIGHTNESS_LEVEL: u8 = 200;

/// Selects which subject mask heuristic to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubjectMaskKind {
    /// Per-block texture energy (see [`block_variance_mask`]).
    #[default]
    BlockVariance,
    /// Fixed darkness threshold (see [`brightness_mask`]).
    Brightness,
}

impl SubjectMaskKind {
    /// Compute the mask for `gray`: 255 = subject, 0 = background.
    #[must_use]
    pub fn detect(self, gray: &GrayImage) -> GrayImage {
        match self {
            Self::BlockVariance => block_variance_mask(gray),
            Self::Brightness => brightness_mask(gray, BRIGHTNESS_LEVEL),
        }
    }
}

impl fmt::Display for SubjectMaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BlockVariance => f.write_str("block-variance"),
            Self::Brightness => f.write_str("brightness"),
        }
    }
}

/// Block-variance subject mask.
///
/// Blocks on the right and bottom edges may be smaller than
/// [`BLOCK_SIZE`]; their variance is computed over the pixels they
/// actually cover. A uniform image has zero variance everywhere and
/// yields an all-background mask.
#[must_use]
pub fn block_variance_mask(gray: &GrayImage) -> GrayImage {
    let (w, h) = gray.dimensions();
    let blocks_x = w.div_ceil(BLOCK_SIZE);
    let blocks_y = h.div_ceil(BLOCK_SIZE);

    let variances: Vec<f64> = (0..blocks_y)
        .flat_map(|by| (0..blocks_x).map(move |bx| (bx, by)))
        .map(|(bx, by)| block_variance(gray, bx * BLOCK_SIZE, by * BLOCK_SIZE))
        .collect();

    let max_variance = variances.iter().copied().fold(0.0_f64, f64::max);
    let cutoff = VARIANCE_FRACTION * max_variance;

    GrayImage::from_fn(w, h, |x, y| {
        let block = (y / BLOCK_SIZE) * blocks_x + x / BLOCK_SIZE;
        Luma([if variances[block as usize] > cutoff {
            255
        } else {
            0
        }])
    })
}

/// Variance `E[x²] - E[x]²` of the block whose top-left corner is `(x0, y0)`.
#[allow(clippy::cast_precision_loss)]
fn block_variance(gray: &GrayImage, x0: u32, y0: u32) -> f64 {
    let x1 = (x0 + BLOCK_SIZE).min(gray.width());
    let y1 = (y0 + BLOCK_SIZE).min(gray.height());

    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    for y in y0..y1 {
        for x in x0..x1 {
            let v = f64::from(gray.get_pixel(x, y).0[0]);
            sum += v;
            sum_sq += v * v;
        }
    }
    let n = f64::from((x1 - x0) * (y1 - y0));
    if n == 0.0 {
        return 0.0;
    }
    let mean = sum / n;
    mean.mul_add(-mean, sum_sq / n)
}

/// Brightness subject mask: 255 where `gray < level`.
#[must_use]
pub fn brightness_mask(gray: &GrayImage, level: u8) -> GrayImage {
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        Luma([if gray.get_pixel(x, y).0[0] < level {
            255
        } else {
            0
        }])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 32×32: left half flat white, right half a checkerboard.
    fn half_textured() -> GrayImage {
        GrayImage::from_fn(32, 32, |x, y| {
            if x < 16 {
                Luma([255])
            } else if (x + y) % 2 == 0 {
                Luma([0])
            } else {
                Luma([255])
            }
        })
    }

    #[test]
    fn default_is_block_variance() {
        assert_eq!(SubjectMaskKind::default(), SubjectMaskKind::BlockVariance);
    }

    #[test]
    fn uniform_image_has_no_subject() {
        let gray = GrayImage::from_pixel(40, 24, Luma([90]));
        let mask = block_variance_mask(&gray);
        assert!(mask.pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn textured_blocks_are_subject() {
        let mask = block_variance_mask(&half_textured());
        assert_eq!(mask.get_pixel(3, 3).0[0], 0);
        assert_eq!(mask.get_pixel(15, 31).0[0], 0);
        assert_eq!(mask.get_pixel(16, 0).0[0], 255);
        assert_eq!(mask.get_pixel(31, 31).0[0], 255);
    }

    #[test]
    fn partial_edge_blocks_are_covered() {
        // 20×20 leaves a 4-pixel strip of partial blocks on two sides.
        let gray = GrayImage::from_fn(20, 20, |x, y| {
            if x >= 16 && (x + y) % 2 == 0 {
                Luma([0])
            } else {
                Luma([200])
            }
        });
        let mask = block_variance_mask(&gray);
        assert_eq!(mask.get_pixel(18, 2).0[0], 255);
        assert_eq!(mask.get_pixel(2, 2).0[0], 0);
    }

    #[test]
    fn brightness_mask_threshold_is_exclusive() {
        let gray = GrayImage::from_fn(3, 1, |x, _| Luma([[199, 200, 201][x as usize]]));
        let mask = brightness_mask(&gray, BRIGHTNESS_LEVEL);
        assert_eq!(mask.as_raw(), &vec![255, 0, 0]);
    }

    #[test]
    fn kind_dispatches_to_variant() {
        let gray = half_textured();
        assert_eq!(
            SubjectMaskKind::BlockVariance.detect(&gray),
            block_variance_mask(&gray)
        );
        assert_eq!(
            SubjectMaskKind::Brightness.detect(&gray),
            brightness_mask(&gray, BRIGHTNESS_LEVEL)
        );
    }
}
