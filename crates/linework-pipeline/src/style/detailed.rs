//! Detailed: two heuristic scales plus a Laplacian texture layer.

use image::GrayImage;

use crate::edge::{laplacian_edges, sobel_edges};
use crate::filter::gaussian_blur;
use crate::morphology::{dilate, merge_all};
use crate::types::{EdgeMap, PipelineConfig, StyleParams};

use super::{DETAILED_DIVISOR, join, scaled, thickness};

const FINE_SIGMA: f32 = 1.2;
const COARSE_SIGMA: f32 = 2.5;

pub(super) fn render(gray: &GrayImage, params: StyleParams, config: &PipelineConfig) -> EdgeMap {
    let s = params.scale_factor(DETAILED_DIVISOR);

    // The fine blur feeds both the fine heuristic pass and the Laplacian.
    let ((fine, texture), coarse) = join(
        config.parallel,
        || {
            let blurred = gaussian_blur(gray, FINE_SIGMA);
            join(
                config.parallel,
                || sobel_edges(&blurred, scaled(12.0, 6.0, s), scaled(35.0, 15.0, s)),
                || laplacian_edges(&blurred, scaled(18.0, 8.0, s)),
            )
        },
        || {
            sobel_edges(
                &gaussian_blur(gray, COARSE_SIGMA),
                scaled(20.0, 10.0, s),
                scaled(60.0, 25.0, s),
            )
        },
    );

    let merged = merge_all(&fine, [&coarse, &texture]);
    dilate(&merged, thickness(params).saturating_sub(1))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::edge::count_edge_pixels;
    use crate::types::Style;
    use image::Luma;

    #[test]
    fn thickness_one_is_undilated() {
        // A single bright dot: after the fine blur its Laplacian response
        // at the center is about 25, above the scaled threshold of 18.
        let mut gray = GrayImage::from_pixel(21, 21, Luma([60]));
        gray.put_pixel(10, 10, Luma([255]));
        let params = StyleParams::new(Style::Detailed, 1, 50).unwrap();
        let edges = render(&gray, params, &PipelineConfig::default());
        assert_eq!(edges.get_pixel(10, 10).0[0], 255);
        assert_eq!(edges.get_pixel(0, 0).0[0], 0);
        assert_eq!(edges.get_pixel(3, 17).0[0], 0);
        assert!(count_edge_pixels(&edges) < 121);
    }
}
