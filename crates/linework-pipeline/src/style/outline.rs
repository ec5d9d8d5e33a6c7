//! Outline: thin contour lines.
//!
//! A fine heuristic pass catches texture boundaries; an un-thinned Canny
//! pass on a softer blur keeps long structural contours continuous.

use image::GrayImage;

use crate::canny::canny_edges;
use crate::edge::sobel_edges;
use crate::filter::gaussian_blur;
use crate::morphology::{dilate, merge_edges};
use crate::types::{EdgeMap, PipelineConfig, StyleParams};

use super::{STANDARD_DIVISOR, join, scaled, thickness};

const FINE_SIGMA: f32 = 1.5;
const STRUCTURAL_SIGMA: f32 = 2.0;

pub(super) fn render(gray: &GrayImage, params: StyleParams, config: &PipelineConfig) -> EdgeMap {
    let s = params.scale_factor(STANDARD_DIVISOR);

    let (fine, structural) = join(
        config.parallel,
        || {
            sobel_edges(
                &gaussian_blur(gray, FINE_SIGMA),
                scaled(15.0, 8.0, s),
                scaled(45.0, 20.0, s),
            )
        },
        || {
            canny_edges(
                &gaussian_blur(gray, STRUCTURAL_SIGMA),
                scaled(15.0, 8.0, s),
                scaled(40.0, 18.0, s),
                false,
            )
        },
    );

    let radius = thickness(params).saturating_sub(1).max(1);
    dilate(&merge_edges(&fine, &structural), radius)
}
