//! Compositor: turn a binary edge map into an anti-aliased RGBA stencil.
//!
//! The edge map is blurred slightly and the blurred value is used as a
//! per-pixel line strength. In opaque mode the line color is blended over
//! a solid background; in transparent mode the strength becomes alpha.

use base64::Engine;
use image::{ImageEncoder, Rgba, RgbaImage};

use crate::types::{Dimensions, EdgeMap, PipelineError, RenderOptions, Stage};

/// Background level for normal (dark lines on light) stencils.
pub const LIGHT_BACKGROUND: u8 = 255;

/// Background level for inverted stencils.
pub const DARK_BACKGROUND: u8 = 30;

/// Prefix of every stencil data URL.
pub const DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// Composite `edges` into an RGBA stencil.
///
/// `effective = inverted ? 255 - blurred : blurred`. Opaque output blends
/// `round(line * t + bg * (1 - t))` with `t = effective / 255` and
/// alpha 255. Transparent output uses the line color with alpha
/// `effective`, but only on pixels that are lines in the (possibly
/// inverted) edge map; every other pixel has alpha 0.
#[must_use = "returns the composited stencil"]
pub fn composite(edges: &EdgeMap, options: &RenderOptions, sigma: f32) -> RgbaImage {
    let strength = crate::filter::gaussian_blur_rounded(edges, sigma);
    let [r, g, b] = options.line_color.channels();
    let background = if options.inverted {
        DARK_BACKGROUND
    } else {
        LIGHT_BACKGROUND
    };

    RgbaImage::from_fn(edges.width(), edges.height(), |x, y| {
        let blurred = strength.get_pixel(x, y).0[0];
        let effective = if options.inverted {
            255 - blurred
        } else {
            blurred
        };

        if options.transparent_bg {
            let is_line = (edges.get_pixel(x, y).0[0] != 0) != options.inverted;
            Rgba([r, g, b, if is_line { effective } else { 0 }])
        } else {
            let t = f32::from(effective) / 255.0;
            Rgba([
                blend(r, background, t),
                blend(g, background, t),
                blend(b, background, t),
                255,
            ])
        }
    })
}

/// `round(line * t + bg * (1 - t))`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn blend(line: u8, background: u8, t: f32) -> u8 {
    let value = f32::from(line).mul_add(t, f32::from(background) * (1.0 - t));
    // t is in [0, 1], so the blend stays in [0, 255].
    value.round().clamp(0.0, 255.0) as u8
}

/// Encode an RGBA stencil as PNG.
///
/// # Errors
///
/// Returns [`PipelineError::Internal`] for the encode stage if the PNG
/// encoder fails.
pub fn encode_png(stencil: &RgbaImage) -> Result<Vec<u8>, PipelineError> {
    let mut buf = Vec::new();
    image::codecs::png::PngEncoder::new(&mut buf)
        .write_image(
            stencil.as_raw(),
            stencil.width(),
            stencil.height(),
            image::ExtendedColorType::Rgba8,
        )
        .map_err(|e| {
            PipelineError::internal(Stage::Encode, Dimensions::of(stencil), None, e.to_string())
        })?;
    Ok(buf)
}

/// Wrap PNG bytes in a `data:image/png;base64,` URL.
#[must_use]
pub fn to_data_url(png: &[u8]) -> String {
    let mut url = String::with_capacity(DATA_URL_PREFIX.len() + png.len().div_ceil(3) * 4);
    url.push_str(DATA_URL_PREFIX);
    base64::engine::general_purpose::STANDARD.encode_string(png, &mut url);
    url
}
