//! Simple: bold contours with speckle removal.

use image::GrayImage;

use crate::edge::sobel_edges;
use crate::filter::gaussian_blur;
use crate::morphology::{dilate, open};
use crate::types::{EdgeMap, PipelineConfig, StyleParams};

use super::{STANDARD_DIVISOR, scaled, thickness};

const SIGMA: f32 = 2.0;

/// Opening radius that removes isolated detections before thickening.
const SPECKLE_RADIUS: u32 = 1;

pub(super) fn render(gray: &GrayImage, params: StyleParams, _config: &PipelineConfig) -> EdgeMap {
    let s = params.scale_factor(STANDARD_DIVISOR);
    let edges = sobel_edges(
        &gaussian_blur(gray, SIGMA),
        scaled(15.0, 8.0, s),
        scaled(50.0, 20.0, s),
    );
    dilate(&open(&edges, SPECKLE_RADIUS), thickness(params))
}
