//! Hatching: contours plus procedural line shading.
//!
//! Shading is driven by two soft maps computed from the normalized image:
//!
//! - a darkness map, `255 - gray` blurred at sigma 3,
//! - a subject map, the configured [`SubjectMaskKind`] dilated by 8 and
//!   blurred at sigma 4, so shading fades out at the subject's edge.
//!
//! Three line families are drawn where both maps allow it: 45° hatch
//! lines, 135° cross-hatch in darker areas, and optional horizontal fill
//! in the darkest areas.
//!
//! [`SubjectMaskKind`]: crate::mask::SubjectMaskKind

use image::{GrayImage, Luma};

use crate::edge::{EDGE, sobel_edges};
use crate::filter::gaussian_blur;
use crate::morphology::{dilate, merge_edges};
use crate::types::{EdgeMap, PipelineConfig, StyleParams};

use super::{STANDARD_DIVISOR, join, scaled, thickness};

const CONTOUR_SIGMA: f32 = 1.5;
const MASK_GROW_RADIUS: u32 = 8;
const MASK_SIGMA: f32 = 4.0;
const DARKNESS_SIGMA: f32 = 3.0;

/// Blurred subject map value a pixel must exceed to receive shading.
const MIN_SUBJECT: u8 = 30;

/// Darkness a pixel must exceed for the 45° family.
pub const HATCH_DARKNESS: u8 = 40;
/// Darkness a pixel must exceed for the 135° family.
pub const CROSS_HATCH_DARKNESS: u8 = 90;
/// Darkness a pixel must exceed for horizontal fill.
pub const FILL_DARKNESS: u8 = 160;

/// Soft maps that decide where shading lines may be drawn.
#[derive(Debug, Clone)]
pub struct ShadeMap {
    darkness: GrayImage,
    subject: GrayImage,
}

impl ShadeMap {
    /// Build the darkness and subject maps for `gray`.
    #[must_use]
    pub fn new(gray: &GrayImage, config: &PipelineConfig) -> Self {
        let (darkness, subject) = join(
            config.parallel,
            || {
                let mut inverted = gray.clone();
                image::imageops::invert(&mut inverted);
                gaussian_blur(&inverted, DARKNESS_SIGMA)
            },
            || {
                let mask = config.subject_mask.detect(gray);
                gaussian_blur(&dilate(&mask, MASK_GROW_RADIUS), MASK_SIGMA)
            },
        );
        Self { darkness, subject }
    }

    /// Build a shade map from precomputed darkness and subject maps.
    #[must_use]
    pub const fn from_parts(darkness: GrayImage, subject: GrayImage) -> Self {
        Self { darkness, subject }
    }

    /// Whether `(x, y)` is inside the subject and darker than `min_darkness`.
    #[must_use]
    pub fn allows(&self, x: u32, y: u32, min_darkness: u8) -> bool {
        self.subject.get_pixel(x, y).0[0] > MIN_SUBJECT
            && self.darkness.get_pixel(x, y).0[0] > min_darkness
    }

    fn dimensions(&self) -> (u32, u32) {
        self.darkness.dimensions()
    }
}

/// Direction of a diagonal line family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Diagonal {
    /// `x = offset + y`.
    Deg45,
    /// `x = offset - y + h`.
    Deg135,
}

pub(super) fn render(gray: &GrayImage, params: StyleParams, config: &PipelineConfig) -> EdgeMap {
    let s = params.scale_factor(STANDARD_DIVISOR);
    let t = params.line_thickness();

    let (contours, shade) = join(
        config.parallel,
        || {
            let blurred = gaussian_blur(gray, CONTOUR_SIGMA);
            let primary = sobel_edges(&blurred, scaled(15.0, 8.0, s), scaled(45.0, 20.0, s));
            let secondary = sobel_edges(&blurred, scaled(10.0, 5.0, s), scaled(25.0, 12.0, s));
            dilate(&merge_edges(&primary, &secondary), thickness(params).saturating_sub(1))
        },
        || ShadeMap::new(gray, config),
    );

    let mut pattern = GrayImage::new(gray.width(), gray.height());
    draw_diagonal(
        &mut pattern,
        &shade,
        Diagonal::Deg45,
        hatch_spacing(t),
        HATCH_DARKNESS,
        t,
    );
    draw_diagonal(
        &mut pattern,
        &shade,
        Diagonal::Deg135,
        cross_hatch_spacing(t),
        CROSS_HATCH_DARKNESS,
        t,
    );
    if config.dense_fill {
        draw_rows(&mut pattern, &shade, fill_spacing(t), FILL_DARKNESS);
    }

    merge_edges(&contours, &pattern)
}

/// Spacing of the 45° family: `max(3, 10 - t)`.
#[must_use]
pub fn hatch_spacing(thickness: u8) -> u32 {
    10_u32.saturating_sub(u32::from(thickness)).max(3)
}

/// Spacing of the 135° family: `max(4, 12 - t)`.
#[must_use]
pub fn cross_hatch_spacing(thickness: u8) -> u32 {
    12_u32.saturating_sub(u32::from(thickness)).max(4)
}

/// Row spacing of the horizontal fill: `max(3, 8 - t)`.
#[must_use]
pub fn fill_spacing(thickness: u8) -> u32 {
    8_u32.saturating_sub(u32::from(thickness)).max(3)
}

/// Draw one diagonal line family into `out`.
///
/// Offsets run over `[-h, w + h)` in steps of `spacing`. Each line pixel
/// that lies inside the image and passes the shade test is set; at
/// thickness 2 and above the pixel to the right is set too, and at 3 and
/// above (45° only) the pixel to the left.
pub fn draw_diagonal(
    out: &mut GrayImage,
    shade: &ShadeMap,
    diagonal: Diagonal,
    spacing: u32,
    min_darkness: u8,
    thickness: u8,
) {
    let (w, h) = shade.dimensions();
    let (wi, hi) = (i64::from(w), i64::from(h));
    let step = usize::try_from(spacing.max(1)).unwrap_or(1);

    for offset in (-hi..wi + hi).step_by(step) {
        for y in 0..h {
            let yi = i64::from(y);
            let xi = match diagonal {
                Diagonal::Deg45 => offset + yi,
                Diagonal::Deg135 => offset - yi + hi,
            };
            let Ok(x) = u32::try_from(xi) else { continue };
            if x >= w || !shade.allows(x, y, min_darkness) {
                continue;
            }
            out.put_pixel(x, y, Luma([EDGE]));
            if thickness >= 2 && x + 1 < w {
                out.put_pixel(x + 1, y, Luma([EDGE]));
            }
            if diagonal == Diagonal::Deg45 && thickness >= 3 && x >= 1 {
                out.put_pixel(x - 1, y, Luma([EDGE]));
            }
        }
    }
}

/// Draw horizontal fill rows every `spacing` rows, starting at row 0.
pub fn draw_rows(out: &mut GrayImage, shade: &ShadeMap, spacing: u32, min_darkness: u8) {
    let (w, h) = shade.dimensions();
    let step = usize::try_from(spacing.max(1)).unwrap_or(1);
    for y in (0..h).step_by(step) {
        for x in 0..w {
            if shade.allows(x, y, min_darkness) {
                out.put_pixel(x, y, Luma([EDGE]));
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::edge::count_edge_pixels;
    use crate::types::Style;

    fn uniform_shade(w: u32, h: u32, darkness: u8) -> ShadeMap {
        ShadeMap::from_parts(
            GrayImage::from_pixel(w, h, Luma([darkness])),
            GrayImage::from_pixel(w, h, Luma([255])),
        )
    }

    #[test]
    fn spacings_follow_thickness() {
        assert_eq!(hatch_spacing(1), 9);
        assert_eq!(hatch_spacing(5), 5);
        assert_eq!(cross_hatch_spacing(3), 9);
        assert_eq!(fill_spacing(5), 3);
        assert_eq!(fill_spacing(1), 7);
    }

    #[test]
    fn deg45_lines_follow_offset_plus_y() {
        let shade = uniform_shade(12, 12, 200);
        let mut out = GrayImage::new(12, 12);
        draw_diagonal(&mut out, &shade, Diagonal::Deg45, 6, HATCH_DARKNESS, 1);
        // Offsets -12, -6, 0, 6, 12, 18: in-bounds lines are x = y,
        // x = y + 6 and x = y - 6.
        for y in 0..12_u32 {
            for x in 0..12_u32 {
                let on_line = (i64::from(x) - i64::from(y)).rem_euclid(6) == 0;
                assert_eq!(out.get_pixel(x, y).0[0] == EDGE, on_line, "({x}, {y})");
            }
        }
    }

    #[test]
    fn deg135_lines_follow_offset_minus_y() {
        let shade = uniform_shade(10, 10, 200);
        let mut out = GrayImage::new(10, 10);
        draw_diagonal(&mut out, &shade, Diagonal::Deg135, 5, CROSS_HATCH_DARKNESS, 1);
        // x = offset - y + 10 with offset in {-10, -5, 0, 5, ...}:
        // lines satisfy (x + y) % 5 == 0.
        for y in 0..10_u32 {
            for x in 0..10_u32 {
                assert_eq!(out.get_pixel(x, y).0[0] == EDGE, (x + y) % 5 == 0, "({x}, {y})");
            }
        }
    }

    #[test]
    fn thickness_widens_lines() {
        let shade = uniform_shade(20, 20, 200);
        let mut thin = GrayImage::new(20, 20);
        let mut wide = GrayImage::new(20, 20);
        draw_diagonal(&mut thin, &shade, Diagonal::Deg45, 7, HATCH_DARKNESS, 1);
        draw_diagonal(&mut wide, &shade, Diagonal::Deg45, 7, HATCH_DARKNESS, 3);
        // Offsets start at -20, so lines satisfy x - y = 1 (mod 7).
        assert_eq!(thin.get_pixel(6, 5).0[0], EDGE);
        assert_eq!(thin.get_pixel(7, 5).0[0], 0);
        assert_eq!(thin.get_pixel(5, 5).0[0], 0);
        assert_eq!(wide.get_pixel(7, 5).0[0], EDGE);
        assert_eq!(wide.get_pixel(5, 5).0[0], EDGE);
    }

    #[test]
    fn darkness_threshold_is_exclusive() {
        let shade = uniform_shade(8, 8, HATCH_DARKNESS);
        let mut out = GrayImage::new(8, 8);
        draw_diagonal(&mut out, &shade, Diagonal::Deg45, 3, HATCH_DARKNESS, 1);
        assert_eq!(count_edge_pixels(&out), 0);
    }

    #[test]
    fn background_is_never_shaded() {
        let shade = ShadeMap::from_parts(
            GrayImage::from_pixel(16, 16, Luma([255])),
            GrayImage::from_pixel(16, 16, Luma([MIN_SUBJECT])),
        );
        let mut out = GrayImage::new(16, 16);
        draw_diagonal(&mut out, &shade, Diagonal::Deg45, 3, HATCH_DARKNESS, 2);
        draw_rows(&mut out, &shade, 3, FILL_DARKNESS);
        assert_eq!(count_edge_pixels(&out), 0);
    }

    #[test]
    fn rows_start_at_zero() {
        let shade = uniform_shade(5, 10, 255);
        let mut out = GrayImage::new(5, 10);
        draw_rows(&mut out, &shade, 4, FILL_DARKNESS);
        for y in 0..10 {
            let expected = if y % 4 == 0 { EDGE } else { 0 };
            assert_eq!(out.get_pixel(2, y).0[0], expected, "row {y}");
        }
    }

    #[test]
    fn dense_fill_can_be_disabled() {
        // Dark textured subject: enough variance for the block mask and
        // darkness well above the fill level.
        let gray = GrayImage::from_fn(48, 48, |x, y| Luma([if (x / 2 + y / 2) % 2 == 0 { 0 } else { 40 }]));
        let params = StyleParams::new(Style::Hatching, 1, 50).unwrap();
        let with_fill = render(&gray, params, &PipelineConfig::default());
        let without_fill = render(
            &gray,
            params,
            &PipelineConfig {
                dense_fill: false,
                ..PipelineConfig::default()
            },
        );
        assert!(count_edge_pixels(&with_fill) > count_edge_pixels(&without_fill));
        for (a, b) in with_fill.pixels().zip(without_fill.pixels()) {
            assert!(a.0[0] >= b.0[0]);
        }
    }
}
