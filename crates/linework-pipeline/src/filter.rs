//! Thin wrappers over the `image`/`imageproc` filters the pipeline uses.
//!
//! [`gaussian_blur`] smooths a single grayscale channel (with
//! [`gaussian_blur_rounded`] as the exact-rounding variant the compositor
//! needs), [`threshold`] binarizes one, and [`downsample`] caps the
//! longest side of a decoded image. Everything else in the pipeline is
//! hand-written pixel math on top of these.

use image::{DynamicImage, GrayImage, ImageBuffer, Luma};

/// Apply Gaussian blur to a grayscale image.
///
/// Higher `sigma` values produce more smoothing. Non-positive sigma values
/// (zero or negative) return the image unchanged, since `imageproc`'s
/// underlying function panics on `sigma <= 0.0`.
#[must_use = "returns the blurred image"]
pub fn gaussian_blur(image: &GrayImage, sigma: f32) -> GrayImage {
    if sigma <= 0.0 {
        return image.clone();
    }

    imageproc::filter::gaussian_blur_f32(image, sigma)
}

/// Gaussian blur accumulated in `f32` and rounded once at the end.
///
/// [`gaussian_blur`] stores the horizontal pass back into `u8`, and the
/// store truncates, so a flat 255 run comes out as 253. The compositor
/// uses this variant so full-strength lines stay at 255 and flat zero
/// stays at 0. Non-positive sigma returns a copy.
#[must_use = "returns the blurred image"]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn gaussian_blur_rounded(image: &GrayImage, sigma: f32) -> GrayImage {
    if sigma <= 0.0 {
        return image.clone();
    }

    let lifted: ImageBuffer<Luma<f32>, Vec<f32>> =
        ImageBuffer::from_fn(image.width(), image.height(), |x, y| {
            Luma([f32::from(image.get_pixel(x, y).0[0])])
        });
    let blurred = imageproc::filter::gaussian_blur_f32(&lifted, sigma);
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        // Clamped to [0, 255] before the cast.
        Luma([blurred.get_pixel(x, y).0[0].round().clamp(0.0, 255.0) as u8])
    })
}

/// Binary threshold: samples at or above `level` become 255, the rest 0.
#[must_use = "returns the thresholded image"]
pub fn threshold(image: &GrayImage, level: u8) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        Luma([if image.get_pixel(x, y).0[0] >= level {
            255
        } else {
            0
        }])
    })
}

/// Downsample a decoded image so the longest axis is at most
/// `max_dimension` pixels, preserving aspect ratio (fit-inside).
///
/// Returns the (possibly unchanged) image and whether downsampling
/// was actually applied.
#[must_use]
pub fn downsample(image: &DynamicImage, max_dimension: u32) -> (DynamicImage, bool) {
    let long_axis = image.width().max(image.height());

    if long_axis <= max_dimension {
        return (image.clone(), false);
    }

    let resized = image.resize(
        max_dimension,
        max_dimension,
        image::imageops::FilterType::Triangle,
    );
    (resized, true)
}
