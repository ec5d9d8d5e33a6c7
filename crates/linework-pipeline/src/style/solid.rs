//! Solid: bold contours, posterization boundaries and dark fill.

use image::{GrayImage, Luma};

use crate::edge::{EDGE, sobel_edges};
use crate::filter::{gaussian_blur, threshold};
use crate::gradient::interior;
use crate::morphology::{dilate, merge_all, merge_edges};
use crate::types::{EdgeMap, PipelineConfig, StyleParams};

use super::{STANDARD_DIVISOR, join, map_all, scaled, thickness};

const BOLD_SIGMA: f32 = 2.0;
const DETAIL_SIGMA: f32 = 1.2;
const POSTER_SIGMA: f32 = 2.5;

/// Gray levels whose threshold boundaries become poster edges.
pub const POSTER_LEVELS: [u8; 3] = [64, 128, 192];

/// Pixels darker than this inside the subject are filled solid.
pub const FILL_LEVEL: u8 = 50;

pub(super) fn render(gray: &GrayImage, params: StyleParams, config: &PipelineConfig) -> EdgeMap {
    let s = params.scale_factor(STANDARD_DIVISOR);
    let t = thickness(params);

    let ((bold, detail), poster) = join(
        config.parallel,
        || {
            join(
                config.parallel,
                || {
                    let edges = sobel_edges(
                        &gaussian_blur(gray, BOLD_SIGMA),
                        scaled(15.0, 8.0, s),
                        scaled(45.0, 20.0, s),
                    );
                    dilate(&edges, t)
                },
                || {
                    let edges = sobel_edges(
                        &gaussian_blur(gray, DETAIL_SIGMA),
                        scaled(12.0, 6.0, s),
                        scaled(40.0, 18.0, s),
                    );
                    dilate(&edges, t.saturating_sub(1))
                },
            )
        },
        || poster_edges(gray, t.saturating_sub(2), config.parallel),
    );

    let merged = merge_all(&bold, [&detail, &poster]);
    if config.solid_fill {
        merge_edges(&merged, &dark_fill(gray, &config.subject_mask.detect(gray)))
    } else {
        merged
    }
}

/// Posterization boundaries: the blurred image is thresholded at each of
/// [`POSTER_LEVELS`], each binary map is reduced to its 4-neighbour
/// boundary and grown by `radius`, and the levels are merged in order.
#[must_use]
pub fn poster_edges(gray: &GrayImage, radius: u32, parallel: bool) -> EdgeMap {
    let blurred = gaussian_blur(gray, POSTER_SIGMA);
    let mut levels = map_all(parallel, &POSTER_LEVELS, |&level| {
        dilate(&boundary(&threshold(&blurred, level)), radius)
    })
    .into_iter();
    let first = levels
        .next()
        .unwrap_or_else(|| GrayImage::new(gray.width(), gray.height()));
    levels.fold(first, |acc, level| merge_edges(&acc, &level))
}

/// Interior pixels whose value differs from any 4-neighbour.
#[must_use]
pub fn boundary(binary: &GrayImage) -> EdgeMap {
    let (w, h) = binary.dimensions();
    let mut out = GrayImage::new(w, h);
    for (x, y) in interior(w, h) {
        let v = binary.get_pixel(x, y).0[0];
        let differs = [(x, y - 1), (x, y + 1), (x - 1, y), (x + 1, y)]
            .into_iter()
            .any(|(nx, ny)| binary.get_pixel(nx, ny).0[0] != v);
        if differs {
            out.put_pixel(x, y, Luma([EDGE]));
        }
    }
    out
}

/// Subject pixels darker than [`FILL_LEVEL`].
#[must_use]
pub fn dark_fill(gray: &GrayImage, subject: &GrayImage) -> EdgeMap {
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let dark = gray.get_pixel(x, y).0[0] < FILL_LEVEL;
        Luma([if dark && subject.get_pixel(x, y).0[0] != 0 {
            EDGE
        } else {
            0
        }])
    })
}
