//! linework-pipeline: turn photographs into binary line-art stencils.
//!
//! The pipeline is pure and synchronous: it takes encoded image bytes and
//! a request, and returns an encoded PNG stencil.
//!
//! validate -> normalize (decode, orient, downscale, gray, contrast) ->
//! style recipe (blur, edge detectors, morphology, subject masks) ->
//! composite (anti-alias, color) -> encode (PNG, data URL).
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! byte slices and returns structured data. File and terminal handling
//! lives in the `linework` CLI.

pub mod canny;
pub mod composite;
pub mod diagnostics;
pub mod edge;
pub mod filter;
pub mod gradient;
pub mod mask;
pub mod morphology;
pub mod normalize;
pub mod pipeline;
pub mod style;
pub mod types;

use base64::Engine;

pub use diagnostics::{Clock, PipelineDiagnostics, process_staged_with_diagnostics};
pub use edge::{
    CannyDetector, EdgeDetector, EdgeDetectorKind, LaplacianDetector, SobelDetector,
};
pub use mask::SubjectMaskKind;
pub use pipeline::Pipeline;
pub use types::{
    Dimensions, EdgeMap, ErrorKind, GenerateRequest, GrayImage, LineColor, PipelineConfig,
    PipelineError, RenderOptions, RgbaImage, Stage, StagedResult, StencilResult, Style,
    StyleParams,
};

/// Generate a stencil with the default engine configuration.
///
/// Returns a `data:image/png;base64,...` URL.
///
/// # Errors
///
/// Returns [`PipelineError::Validation`] for out-of-contract parameters
/// (checked before any decoding), [`PipelineError::EmptyInput`] or
/// [`PipelineError::ImageDecode`] for unusable bytes,
/// [`PipelineError::Dimension`] for images too small to process, and
/// [`PipelineError::Internal`] if encoding fails.
pub fn generate(image_bytes: &[u8], request: &GenerateRequest) -> Result<String, PipelineError> {
    generate_with_config(image_bytes, request, &PipelineConfig::default())
}

/// Generate a stencil data URL with an explicit engine configuration.
///
/// # Errors
///
/// See [`generate`].
pub fn generate_with_config(
    image_bytes: &[u8],
    request: &GenerateRequest,
    config: &PipelineConfig,
) -> Result<String, PipelineError> {
    process(image_bytes, request, config).map(|result| result.data_url())
}

/// Run the pipeline and return the PNG bytes, edge map and dimensions.
///
/// # Errors
///
/// See [`generate`].
pub fn process(
    image_bytes: &[u8],
    request: &GenerateRequest,
    config: &PipelineConfig,
) -> Result<StencilResult, PipelineError> {
    process_staged(image_bytes, request, config).map(StencilResult::from)
}

/// Run the pipeline and return every intermediate.
///
/// # Errors
///
/// See [`generate`].
pub fn process_staged(
    image_bytes: &[u8],
    request: &GenerateRequest,
    config: &PipelineConfig,
) -> Result<StagedResult, PipelineError> {
    let span = tracing::debug_span!("generate", style = %request.style, bytes = image_bytes.len());
    let _enter = span.enter();

    Ok(
        Pipeline::new(image_bytes.to_vec(), request.clone(), config.clone())
            .validate()?
            .normalize()?
            .render_style()
            .composite()
            .encode()?
            .into_result(),
    )
}

/// Decode the image payload of a `data:<mime>;base64,<payload>` URL.
///
/// A bare base64 string without the `data:` prefix is accepted too.
///
/// # Errors
///
/// Returns [`PipelineError::Validation`] on field `image` if a `data:`
/// URL has no comma or is not base64-encoded, or if the payload is not
/// valid base64.
pub fn decode_data_url(url: &str) -> Result<Vec<u8>, PipelineError> {
    let payload = if let Some(rest) = url.strip_prefix("data:") {
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| PipelineError::validation("image", "data URL has no payload"))?;
        if !header.ends_with(";base64") {
            return Err(PipelineError::validation(
                "image",
                "data URL is not base64-encoded",
            ));
        }
        payload
    } else {
        url
    };

    base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| PipelineError::validation("image", format!("invalid base64: {e}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Create a minimal PNG with a sharp black/white boundary for testing.
    fn sharp_edge_png(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbaImage::from_fn(width, height, |x, _y| {
            if x < width / 2 {
                image::Rgba([0, 0, 0, 255])
            } else {
                image::Rgba([255, 255, 255, 255])
            }
        });
        composite::encode_png(&img).unwrap()
    }

    #[test]
    fn generate_empty_input() {
        let result = generate(&[], &GenerateRequest::default());
        assert!(matches!(result, Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn generate_corrupt_input() {
        let result = generate(&[0xFF, 0x00], &GenerateRequest::default());
        assert!(matches!(result, Err(PipelineError::ImageDecode(_))));
    }

    #[test]
    fn generate_returns_png_data_url() {
        let url = generate(&sharp_edge_png(40, 40), &GenerateRequest::default()).unwrap();
        let png = url.strip_prefix("data:image/png;base64,").unwrap();
        let bytes = decode_data_url(&url).unwrap();
        assert_eq!(&bytes[..4], b"\x89PNG");
        assert!(!png.is_empty());
    }

    #[test]
    fn process_reports_dimensions_and_style() {
        let request = GenerateRequest {
            style: "solid".into(),
            ..GenerateRequest::default()
        };
        let result = process(&sharp_edge_png(60, 40), &request, &PipelineConfig::default()).unwrap();
        assert_eq!(
            result.dimensions,
            Dimensions {
                width: 60,
                height: 40
            }
        );
        assert_eq!(result.style, Style::Solid);
        assert_eq!(result.edges.dimensions(), (60, 40));
    }

    #[test]
    fn max_dimension_caps_output() {
        let config = PipelineConfig {
            max_dimension: 32,
            ..PipelineConfig::default()
        };
        let result = process(&sharp_edge_png(128, 64), &GenerateRequest::default(), &config).unwrap();
        assert_eq!(
            result.dimensions,
            Dimensions {
                width: 32,
                height: 16
            }
        );
    }

    #[test]
    fn decode_data_url_accepts_prefixed_and_bare() {
        assert_eq!(decode_data_url("data:image/png;base64,AQID").unwrap(), vec![1, 2, 3]);
        assert_eq!(decode_data_url("AQID").unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn decode_data_url_rejects_malformed() {
        for bad in [
            "data:image/png;base64",
            "data:image/png,AQID",
            "data:image/png;base64,@@@",
        ] {
            let err = decode_data_url(bad).unwrap_err();
            assert!(
                matches!(err, PipelineError::Validation { field: "image", .. }),
                "{bad}: {err:?}"
            );
        }
    }
}
