//! Sobel gradients: the foundation of every edge detector.
//!
//! Gradients are only defined for interior pixels. The one-pixel border
//! keeps magnitude 0 so no detector can ever classify it as an edge.

use image::GrayImage;

/// Per-pixel gradient magnitude and direction.
///
/// Both buffers are row-major and `width * height` long. Direction is
/// `atan2(gy, gx)` in radians, range (−π, π].
#[derive(Debug, Clone, PartialEq)]
pub struct GradientField {
    width: u32,
    height: u32,
    magnitude: Vec<f32>,
    direction: Vec<f32>,
}

impl GradientField {
    /// Image width.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Image height.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Row-major magnitude buffer.
    #[must_use]
    pub fn magnitudes(&self) -> &[f32] {
        &self.magnitude
    }

    /// Row-major direction buffer.
    #[must_use]
    pub fn directions(&self) -> &[f32] {
        &self.direction
    }

    /// Magnitude at `(x, y)`.
    #[must_use]
    pub fn magnitude(&self, x: u32, y: u32) -> f32 {
        self.magnitude[self.index(x, y)]
    }

    /// Direction at `(x, y)`.
    #[must_use]
    pub fn direction(&self, x: u32, y: u32) -> f32 {
        self.direction[self.index(x, y)]
    }

    const fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }
}

/// Raw 3×3 Sobel responses `(gx, gy)` at interior pixel `(x, y)` of a
/// row-major buffer `width` samples wide.
///
/// Kernel X is `[[-1,0,1],[-2,0,2],[-1,0,1]]`; kernel Y is its transpose.
/// The caller guarantees `1 <= x < width - 1` and `1 <= y < height - 1`.
#[must_use]
pub(crate) fn sobel_at(raw: &[u8], width: usize, x: usize, y: usize) -> (i32, i32) {
    let p = |dx: usize, dy: usize| i32::from(raw[(y + dy - 1) * width + (x + dx - 1)]);
    let gx = -p(0, 0) - 2 * p(0, 1) - p(0, 2) + p(2, 0) + 2 * p(2, 1) + p(2, 2);
    let gy = -p(0, 0) - 2 * p(1, 0) - p(2, 0) + p(0, 2) + 2 * p(1, 2) + p(2, 2);
    (gx, gy)
}

/// Iterate the interior coordinates of a `width × height` grid, row by row.
///
/// Empty when either side is below 3.
pub(crate) fn interior(width: u32, height: u32) -> impl Iterator<Item = (u32, u32)> {
    let xs = 1..width.saturating_sub(1);
    (1..height.saturating_sub(1)).flat_map(move |y| xs.clone().map(move |x| (x, y)))
}

/// Compute the Sobel gradient field of a grayscale image.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn sobel(gray: &GrayImage) -> GradientField {
    let (width, height) = gray.dimensions();
    let len = width as usize * height as usize;
    let mut magnitude = vec![0.0_f32; len];
    let mut direction = vec![0.0_f32; len];

    let raw = gray.as_raw();
    let w = width as usize;
    for (x, y) in interior(width, height) {
        let (x, y) = (x as usize, y as usize);
        let (gx, gy) = sobel_at(raw, w, x, y);
        let (gx, gy) = (gx as f32, gy as f32);
        let idx = y * w + x;
        magnitude[idx] = gx.hypot(gy);
        direction[idx] = gy.atan2(gx);
    }

    GradientField {
        width,
        height,
        magnitude,
        direction,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn vertical_step() -> GrayImage {
        GrayImage::from_fn(8, 6, |x, _| Luma([if x < 4 { 0 } else { 200 }]))
    }

    #[test]
    fn border_is_zero() {
        let field = sobel(&vertical_step());
        for x in 0..8 {
            assert!(field.magnitude(x, 0).abs() < f32::EPSILON);
            assert!(field.magnitude(x, 5).abs() < f32::EPSILON);
        }
        for y in 0..6 {
            assert!(field.magnitude(0, y).abs() < f32::EPSILON);
            assert!(field.magnitude(7, y).abs() < f32::EPSILON);
        }
    }

    #[test]
    fn vertical_step_has_horizontal_gradient() {
        let field = sobel(&vertical_step());
        // At x=3 the right column is 200 and the left column 0:
        // gx = (1 + 2 + 1) * 200 = 800, gy = 0.
        assert!((field.magnitude(3, 2) - 800.0).abs() < 1e-3);
        assert!(field.direction(3, 2).abs() < 1e-6);
        // Flat interior far from the step.
        assert!(field.magnitude(1, 2).abs() < f32::EPSILON);
    }

    #[test]
    fn horizontal_step_points_down() {
        let gray = GrayImage::from_fn(6, 8, |_, y| Luma([if y < 4 { 0 } else { 100 }]));
        let field = sobel(&gray);
        let angle = field.direction(2, 3);
        assert!((angle - std::f32::consts::FRAC_PI_2).abs() < 1e-6, "got {angle}");
    }

    #[test]
    fn direction_stays_in_range() {
        let gray = GrayImage::from_fn(12, 12, |x, y| Luma([((x * 37 + y * 91) % 256) as u8]));
        let field = sobel(&gray);
        for &angle in field.directions() {
            assert!(angle > -std::f32::consts::PI - 1e-6);
            assert!(angle <= std::f32::consts::PI + 1e-6);
        }
    }

    #[test]
    fn degenerate_images_have_no_interior() {
        assert_eq!(interior(2, 10).count(), 0);
        assert_eq!(interior(0, 0).count(), 0);
        assert_eq!(interior(3, 3).collect::<Vec<_>>(), vec![(1, 1)]);
        let field = sobel(&GrayImage::new(2, 2));
        assert!(field.magnitudes().iter().all(|m| *m == 0.0));
    }
}
