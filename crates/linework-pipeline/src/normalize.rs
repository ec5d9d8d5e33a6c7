//! Image decoding and normalization.
//!
//! Accepts raw image bytes (PNG, JPEG, BMP, WebP) and produces the
//! single-channel, contrast-adjusted grayscale image every style recipe
//! starts from:
//!
//! 1. decode, honouring the EXIF orientation tag,
//! 2. downscale so the longer side is at most `max_dimension`,
//! 3. convert to one channel,
//! 4. stretch or compress contrast around mid-gray.

use std::io::Cursor;

use image::{DynamicImage, GrayImage, ImageDecoder, ImageReader, Luma};

use crate::types::{Dimensions, PipelineError, Stage};

/// Mid-gray, the fixed point of the contrast transform.
const MID_GRAY: f32 = 128.0;

/// Smallest contrast gain; keeps contrast 0 from flattening the image.
const MIN_CONTRAST_ALPHA: f32 = 0.1;

/// Output of [`normalize`].
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    /// Contrast-adjusted single-channel image.
    pub gray: GrayImage,
    /// Dimensions of the decoded (oriented) image before downscaling.
    pub source: Dimensions,
    /// Whether the image was downscaled.
    pub downsampled: bool,
    /// Gain used by the contrast transform.
    pub contrast_alpha: f32,
}

impl NormalizedImage {
    /// Dimensions after normalization.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::of(&self.gray)
    }
}

/// Decode raw image bytes and apply the EXIF orientation.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let mut decoder = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(image::ImageError::IoError)?
        .into_decoder()?;
    let orientation = decoder.orientation()?;
    let mut image = DynamicImage::from_decoder(decoder)?;
    image.apply_orientation(orientation);
    Ok(image)
}

/// Run the full normalizer on encoded image bytes.
///
/// # Errors
///
/// Returns the [`decode`] errors, [`PipelineError::Dimension`] if either
/// side of the normalized image is below `min_dimension`, and
/// [`PipelineError::Internal`] if the grayscale buffer cannot be built.
pub fn normalize(
    bytes: &[u8],
    contrast: u8,
    max_dimension: u32,
    min_dimension: u32,
) -> Result<NormalizedImage, PipelineError> {
    let decoded = decode(bytes)?;
    let source = Dimensions {
        width: decoded.width(),
        height: decoded.height(),
    };

    let (resized, downsampled) = crate::filter::downsample(&decoded, max_dimension);
    let dimensions = Dimensions {
        width: resized.width(),
        height: resized.height(),
    };
    if dimensions.width < min_dimension || dimensions.height < min_dimension {
        return Err(PipelineError::Dimension {
            width: dimensions.width,
            height: dimensions.height,
            reason: format!("both sides must be at least {min_dimension} pixels"),
        });
    }

    let single = to_single_channel(&resized).ok_or_else(|| {
        PipelineError::internal(
            Stage::Normalize,
            dimensions,
            None,
            "grayscale buffer does not match image dimensions",
        )
    })?;

    let contrast_alpha = contrast_alpha(contrast);
    Ok(NormalizedImage {
        gray: adjust_contrast(&single, contrast_alpha),
        source,
        downsampled,
        contrast_alpha,
    })
}

/// Reduce a decoded image to exactly one channel.
///
/// Gray-plus-alpha inputs keep their luma channel (the first sample of
/// every pixel group) rather than being re-derived; everything else goes
/// through the standard luminance conversion. Returns `None` only if the
/// raw sample count does not match the dimensions.
#[must_use]
pub fn to_single_channel(image: &DynamicImage) -> Option<GrayImage> {
    match image {
        DynamicImage::ImageLuma8(gray) => Some(gray.clone()),
        DynamicImage::ImageLumaA8(gray_alpha) => {
            first_channel(
                gray_alpha.as_raw(),
                gray_alpha.width(),
                gray_alpha.height(),
                2,
            )
        }
        other => Some(other.to_luma8()),
    }
}

/// Build a grayscale image from the first sample of each `channels`-wide
/// pixel group in `raw`.
#[must_use]
pub fn first_channel(raw: &[u8], width: u32, height: u32, channels: usize) -> Option<GrayImage> {
    let samples: Vec<u8> = raw.chunks_exact(channels.max(1)).map(|px| px[0]).collect();
    GrayImage::from_raw(width, height, samples)
}

/// Contrast gain for a `0..=100` setting: `max(0.1, 1 + (contrast - 50) / 50)`.
///
/// Contrast 50 is the identity, 100 doubles deviations from mid-gray,
/// 0 compresses them to a tenth.
#[must_use]
pub fn contrast_alpha(contrast: u8) -> f32 {
    (1.0 + (f32::from(contrast) - 50.0) / 50.0).max(MIN_CONTRAST_ALPHA)
}

/// Linear contrast transform around mid-gray:
/// `clamp(alpha * v + 128 * (1 - alpha), 0, 255)`.
///
/// 128 maps to itself for every `alpha`, so the transform never shifts
/// overall brightness.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn adjust_contrast(gray: &GrayImage, alpha: f32) -> GrayImage {
    let offset = MID_GRAY * (1.0 - alpha);
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let v = f32::from(gray.get_pixel(x, y).0[0]);
        // Clamped to [0, 255] before the cast.
        Luma([alpha.mul_add(v, offset).round().clamp(0.0, 255.0) as u8])
    })
}
