//! Binary morphology over square (Chebyshev) neighbourhoods.
//!
//! All operations treat any non-zero sample as set and emit strictly
//! 0/255 maps. [`dilate`] and [`erode`] are separable: a square window of
//! radius `r` is a horizontal run of `2r + 1` followed by a vertical run of
//! `2r + 1`, so each pass is a sliding-window count along one axis.

use image::{GrayImage, Luma};
use imageproc::region_labelling::{Connectivity, connected_components};

use crate::edge::EDGE;

/// Grow set regions: a pixel is set if any pixel within Chebyshev
/// distance `radius` is set. The window is clamped to the image.
///
/// Radius 0 returns an unchanged copy.
#[must_use = "returns the dilated map"]
pub fn dilate(map: &GrayImage, radius: u32) -> GrayImage {
    if radius == 0 {
        return map.clone();
    }
    let rows = sweep(map, radius, Axis::Row, Rule::Any);
    sweep(&rows, radius, Axis::Column, Rule::Any)
}

/// Shrink set regions: a pixel stays set only if every pixel within
/// Chebyshev distance `radius` is set. Out-of-bounds neighbours count as
/// unset, so shapes touching the border erode inward from it.
///
/// Radius 0 returns an unchanged copy.
#[must_use = "returns the eroded map"]
pub fn erode(map: &GrayImage, radius: u32) -> GrayImage {
    if radius == 0 {
        return map.clone();
    }
    let rows = sweep(map, radius, Axis::Row, Rule::All);
    sweep(&rows, radius, Axis::Column, Rule::All)
}

/// Morphological opening, `dilate(erode(map))`: removes specks smaller
/// than the window without growing what survives.
#[must_use = "returns the opened map"]
pub fn open(map: &GrayImage, radius: u32) -> GrayImage {
    dilate(&erode(map, radius), radius)
}

/// Morphological closing, `erode(dilate(map))`: bridges gaps up to
/// `2 * radius` pixels wide without thickening straight runs.
///
/// Erosion treats out-of-bounds neighbours as unset, so set pixels
/// within `radius` of the border are cleared.
#[must_use = "returns the closed map"]
pub fn close(map: &GrayImage, radius: u32) -> GrayImage {
    erode(&dilate(map, radius), radius)
}

/// Drop 8-connected set components with fewer than `min_area` pixels.
///
/// Survivors come back as 255. `min_area` 0 or 1 only binarizes.
#[must_use = "returns the filtered map"]
pub fn remove_small_components(map: &GrayImage, min_area: u32) -> GrayImage {
    if min_area <= 1 {
        return binarize(map);
    }
    let labels = connected_components(&binarize(map), Connectivity::Eight, Luma([0_u8]));
    let mut areas: Vec<u32> = Vec::new();
    for label in labels.pixels().map(|p| p.0[0] as usize) {
        if label >= areas.len() {
            areas.resize(label + 1, 0);
        }
        areas[label] += 1;
    }
    GrayImage::from_fn(map.width(), map.height(), |x, y| {
        let label = labels.get_pixel(x, y).0[0] as usize;
        Luma([if label != 0 && areas[label] >= min_area {
            EDGE
        } else {
            0
        }])
    })
}

/// Pixel-wise OR of two maps. Any non-zero sample in either input
/// becomes 255.
///
/// The output takes `a`'s dimensions; samples `b` does not cover count
/// as unset.
#[must_use = "returns the merged map"]
pub fn merge_edges(a: &GrayImage, b: &GrayImage) -> GrayImage {
    GrayImage::from_fn(a.width(), a.height(), |x, y| {
        let in_b = b.get_pixel_checked(x, y).is_some_and(|p| p.0[0] != 0);
        Luma([if a.get_pixel(x, y).0[0] != 0 || in_b {
            EDGE
        } else {
            0
        }])
    })
}

/// Fold [`merge_edges`] over `maps` in order, starting from `first`.
#[must_use = "returns the merged map"]
pub fn merge_all<'a>(first: &GrayImage, rest: impl IntoIterator<Item = &'a GrayImage>) -> GrayImage {
    rest.into_iter()
        .fold(binarize(first), |acc, map| merge_edges(&acc, map))
}

/// Map every non-zero sample to 255.
#[must_use]
pub fn binarize(map: &GrayImage) -> GrayImage {
    merge_edges(map, map)
}

#[derive(Clone, Copy)]
enum Axis {
    Row,
    Column,
}

#[derive(Clone, Copy)]
enum Rule {
    /// At least one set sample in the window.
    Any,
    /// Every sample in the window is set and in bounds.
    All,
}

/// One separable pass: slide a `2 * radius + 1` window along `axis` and
/// apply `rule` to the count of set samples inside it.
fn sweep(map: &GrayImage, radius: u32, axis: Axis, rule: Rule) -> GrayImage {
    let (width, height) = map.dimensions();
    let (len, lines) = match axis {
        Axis::Row => (width, height),
        Axis::Column => (height, width),
    };
    let at = |line: u32, pos: u32| match axis {
        Axis::Row => (pos, line),
        Axis::Column => (line, pos),
    };
    let window = u64::from(radius) * 2 + 1;

    let mut out = GrayImage::new(width, height);
    let mut prefix = vec![0_u32; len as usize + 1];
    for line in 0..lines {
        for pos in 0..len {
            let (x, y) = at(line, pos);
            prefix[pos as usize + 1] = prefix[pos as usize] + u32::from(map.get_pixel(x, y).0[0] != 0);
        }
        for pos in 0..len {
            let lo = pos.saturating_sub(radius);
            let hi = pos.saturating_add(radius).min(len - 1);
            let count = prefix[hi as usize + 1] - prefix[lo as usize];
            let set = match rule {
                Rule::Any => count > 0,
                Rule::All => u64::from(count) == window,
            };
            if set {
                let (x, y) = at(line, pos);
                out.put_pixel(x, y, Luma([EDGE]));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Direct square-window reference for checking the separable passes.
    fn naive(map: &GrayImage, radius: u32, all: bool) -> GrayImage {
        let (w, h) = map.dimensions();
        let r = i64::from(radius);
        GrayImage::from_fn(w, h, |x, y| {
            let mut any = false;
            let mut every = true;
            for dy in -r..=r {
                for dx in -r..=r {
                    let nx = i64::from(x) + dx;
                    let ny = i64::from(y) + dy;
                    let set = nx >= 0
                        && ny >= 0
                        && nx < i64::from(w)
                        && ny < i64::from(h)
                        && map.get_pixel(nx as u32, ny as u32).0[0] != 0;
                    any |= set;
                    every &= set;
                }
            }
            Luma([if (all && every) || (!all && any) { 255 } else { 0 }])
        })
    }

    fn speckled(w: u32, h: u32) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| {
            Luma([if (x * 7 + y * 13 + x * y) % 5 < 2 { 255 } else { 0 }])
        })
    }

    #[test]
    fn dilate_matches_reference() {
        let map = speckled(23, 17);
        for radius in 1..4 {
            assert_eq!(dilate(&map, radius), naive(&map, radius, false), "r={radius}");
        }
    }

    #[test]
    fn erode_matches_reference() {
        let mut map = GrayImage::from_pixel(20, 14, Luma([255]));
        map.put_pixel(9, 6, Luma([0]));
        for radius in 1..4 {
            assert_eq!(erode(&map, radius), naive(&map, radius, true), "r={radius}");
        }
        let map = speckled(19, 21);
        assert_eq!(erode(&map, 1), naive(&map, 1, true));
    }

    #[test]
    fn zero_radius_is_identity() {
        let map = speckled(9, 9);
        assert_eq!(dilate(&map, 0), map);
        assert_eq!(erode(&map, 0), map);
        assert_eq!(open(&map, 0), map);
    }

    #[test]
    fn single_pixel_dilates_to_square() {
        let mut map = GrayImage::new(9, 9);
        map.put_pixel(4, 4, Luma([255]));
        let grown = dilate(&map, 2);
        assert_eq!(grown.pixels().filter(|p| p.0[0] == 255).count(), 25);
        assert_eq!(grown.get_pixel(2, 2).0[0], 255);
        assert_eq!(grown.get_pixel(1, 4).0[0], 0);
    }

    #[test]
    fn dilate_clamps_at_border() {
        let mut map = GrayImage::new(5, 5);
        map.put_pixel(0, 0, Luma([255]));
        let grown = dilate(&map, 1);
        assert_eq!(grown.pixels().filter(|p| p.0[0] == 255).count(), 4);
    }

    #[test]
    fn erode_eats_border() {
        let map = GrayImage::from_pixel(6, 6, Luma([255]));
        let shrunk = erode(&map, 1);
        assert_eq!(shrunk.get_pixel(0, 3).0[0], 0);
        assert_eq!(shrunk.get_pixel(3, 3).0[0], 255);
        assert_eq!(shrunk.pixels().filter(|p| p.0[0] == 255).count(), 16);
    }

    #[test]
    fn open_removes_specks_and_keeps_blocks() {
        let mut map = GrayImage::new(16, 16);
        map.put_pixel(2, 2, Luma([255]));
        for y in 6..12 {
            for x in 6..12 {
                map.put_pixel(x, y, Luma([255]));
            }
        }
        let opened = open(&map, 1);
        assert_eq!(opened.get_pixel(2, 2).0[0], 0);
        for y in 6..12 {
            for x in 6..12 {
                assert_eq!(opened.get_pixel(x, y).0[0], 255);
            }
        }
        assert_eq!(opened.pixels().filter(|p| p.0[0] == 255).count(), 36);
    }

    #[test]
    fn close_bridges_a_gap_without_thickening() {
        let mut map = GrayImage::new(20, 9);
        for x in (3..17).filter(|&x| x != 10) {
            map.put_pixel(x, 4, Luma([255]));
        }
        let closed = close(&map, 1);
        assert_eq!(closed.get_pixel(10, 4).0[0], 255);
        for x in 3..17 {
            assert_eq!(closed.get_pixel(x, 3).0[0], 0, "above x={x}");
            assert_eq!(closed.get_pixel(x, 5).0[0], 0, "below x={x}");
        }
        assert_eq!(close(&map, 0), map);
    }

    #[test]
    fn small_components_are_dropped() {
        let mut map = GrayImage::new(16, 12);
        map.put_pixel(1, 1, Luma([255]));
        map.put_pixel(2, 2, Luma([255]));
        for x in 3..13 {
            map.put_pixel(x, 8, Luma([200]));
        }
        let filtered = remove_small_components(&map, 3);
        assert_eq!(filtered.get_pixel(1, 1).0[0], 0);
        assert_eq!(filtered.get_pixel(2, 2).0[0], 0);
        assert!((3..13).all(|x| filtered.get_pixel(x, 8).0[0] == 255));
        assert_eq!(filtered.pixels().filter(|p| p.0[0] != 0).count(), 10);

        // The diagonal pair is one 8-connected component of area 2.
        assert_eq!(remove_small_components(&map, 2).get_pixel(2, 2).0[0], 255);
        assert_eq!(remove_small_components(&map, 0), binarize(&map));
    }

    #[test]
    fn merge_is_or_and_binarizes() {
        let a = GrayImage::from_fn(3, 1, |x, _| Luma([[0, 7, 0][x as usize]]));
        let b = GrayImage::from_fn(3, 1, |x, _| Luma([[0, 0, 128][x as usize]]));
        assert_eq!(merge_edges(&a, &b).as_raw(), &vec![0, 255, 255]);
        assert_eq!(merge_edges(&a, &b), merge_edges(&b, &a));
        assert_eq!(binarize(&a).as_raw(), &vec![0, 255, 0]);
    }

    #[test]
    fn merge_all_folds_in_order() {
        let maps: Vec<GrayImage> = (0..3)
            .map(|i| GrayImage::from_fn(3, 1, |x, _| Luma([if x == i { 9 } else { 0 }])))
            .collect();
        let merged = merge_all(&maps[0], &maps[1..]);
        assert_eq!(merged.as_raw(), &vec![255, 255, 255]);
    }

    #[test]
    fn empty_image_is_fine() {
        let map = GrayImage::new(0, 0);
        assert_eq!(dilate(&map, 3).dimensions(), (0, 0));
        assert_eq!(erode(&map, 3).dimensions(), (0, 0));
        assert_eq!(remove_small_components(&map, 4).dimensions(), (0, 0));
    }
}
