//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! ```rust
//! # use linework_pipeline::{GenerateRequest, Pipeline, PipelineConfig, PipelineError};
//! # fn run(png: Vec<u8>) -> Result<(), PipelineError> {
//! let staged = Pipeline::new(png, GenerateRequest::default(), PipelineConfig::default())
//!     .validate()?
//!     .normalize()?
//!     .render_style()
//!     .composite()
//!     .encode()?
//!     .into_result();
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next pipeline state
//! (or `Result` for fallible stages), carrying the previously computed
//! intermediates. Validation runs first and touches no pixels, so a bad
//! request is rejected before the image is even decoded.
//!
//! Callers that only need the encoded stencil should prefer
//! [`crate::generate`] or [`crate::process`].

use image::GrayImage;

use crate::diagnostics::StageMetrics;
use crate::edge::count_edge_pixels;
use crate::normalize::NormalizedImage;
use crate::types::{
    Dimensions, EdgeMap, GenerateRequest, PipelineConfig, PipelineError, RenderOptions, RgbaImage,
    Stage, StagedResult, StyleParams,
};

/// Behaviour shared by every pipeline state past [`Pending`].
pub trait PipelineStage {
    /// Human-readable name of this stage (e.g. `"normalize"`).
    const NAME: &'static str;

    /// Metrics describing the work done to reach this state.
    fn metrics(&self) -> StageMetrics;
}

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
///
/// Call [`validate`](Self::validate) to advance.
#[must_use = "pipeline stages are consumed by advancing; call .validate() to continue"]
pub struct Pending {
    source: Vec<u8>,
    request: GenerateRequest,
    config: PipelineConfig,
}

impl Pending {
    /// The raw source image bytes.
    #[must_use]
    pub fn source(&self) -> &[u8] {
        &self.source
    }

    /// Validate the request and the engine config.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Validation`] for any out-of-contract
    /// parameter. No image bytes are inspected.
    pub fn validate(self) -> Result<Validated, PipelineError> {
        self.config.validate()?;
        let (params, render) = self.request.validate().inspect_err(|e| {
            tracing::debug!(error = %e, "request rejected");
        })?;
        tracing::debug!(
            style = %params.style(),
            line_thickness = params.line_thickness(),
            contrast = params.contrast(),
            inverted = render.inverted,
            transparent_bg = render.transparent_bg,
            "request validated"
        );
        Ok(Validated {
            source: self.source,
            config: self.config,
            params,
            render,
        })
    }
}

// ───────────────────────── Stage 1: Validated ────────────────────────

/// Pipeline state after request validation.
///
/// Call [`normalize`](Self::normalize) to advance.
#[must_use = "pipeline stages are consumed by advancing; call .normalize() to continue"]
pub struct Validated {
    source: Vec<u8>,
    config: PipelineConfig,
    params: StyleParams,
    render: RenderOptions,
}

impl Validated {
    /// The validated recipe parameters.
    #[must_use]
    pub const fn params(&self) -> &StyleParams {
        &self.params
    }

    /// The validated compositor options.
    #[must_use]
    pub const fn render_options(&self) -> &RenderOptions {
        &self.render
    }

    /// Decode, orient, downscale, convert to gray and adjust contrast.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::EmptyInput`], [`PipelineError::ImageDecode`]
    /// or [`PipelineError::Dimension`] from the normalizer.
    pub fn normalize(self) -> Result<Normalized, PipelineError> {
        let normalized = crate::normalize::normalize(
            &self.source,
            self.params.contrast(),
            self.config.max_dimension,
            self.config.min_dimension,
        )
        .map_err(|e| e.with_style(self.params.style()))
        .inspect_err(|e| {
            if let PipelineError::Internal { dimensions, .. } = e {
                tracing::error!(
                    stage = %Stage::Normalize,
                    %dimensions,
                    style = %self.params.style(),
                    error = %e,
                    "normalization failed"
                );
            }
        })?;
        tracing::debug!(
            source = %normalized.source,
            dimensions = %normalized.dimensions(),
            downsampled = normalized.downsampled,
            contrast_alpha = normalized.contrast_alpha,
            "image normalized"
        );
        Ok(Normalized {
            config: self.config,
            params: self.params,
            render: self.render,
            normalized,
        })
    }
}

impl PipelineStage for Validated {
    const NAME: &'static str = "validate";

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Validate {
            style: self.params.style(),
            line_thickness: self.params.line_thickness(),
            contrast: self.params.contrast(),
        }
    }
}

// ───────────────────────── Stage 2: Normalized ───────────────────────

/// Pipeline state after normalization.
///
/// Call [`render_style`](Self::render_style) to advance.
#[must_use = "pipeline stages are consumed by advancing; call .render_style() to continue"]
pub struct Normalized {
    config: PipelineConfig,
    params: StyleParams,
    render: RenderOptions,
    normalized: NormalizedImage,
}

impl Normalized {
    /// The contrast-adjusted grayscale image.
    #[must_use]
    pub const fn grayscale(&self) -> &GrayImage {
        &self.normalized.gray
    }

    /// Dimensions after normalization.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        self.normalized.dimensions()
    }

    /// Run the style recipe.
    pub fn render_style(self) -> Styled {
        let edges = crate::style::render(&self.normalized.gray, self.params, &self.config);
        tracing::debug!(
            style = %self.params.style(),
            edge_pixels = count_edge_pixels(&edges),
            "style rendered"
        );
        Styled {
            config: self.config,
            params: self.params,
            render: self.render,
            gray: self.normalized.gray,
            edges,
        }
    }
}

impl PipelineStage for Normalized {
    const NAME: &'static str = "normalize";

    fn metrics(&self) -> StageMetrics {
        let dimensions = self.dimensions();
        StageMetrics::Normalize {
            source_width: self.normalized.source.width,
            source_height: self.normalized.source.height,
            width: dimensions.width,
            height: dimensions.height,
            downsampled: self.normalized.downsampled,
            contrast_alpha: self.normalized.contrast_alpha,
        }
    }
}

// ───────────────────────── Stage 3: Styled ───────────────────────────

/// Pipeline state after the style recipe produced a binary edge map.
///
/// Call [`composite`](Self::composite) to advance.
#[must_use = "pipeline stages are consumed by advancing; call .composite() to continue"]
pub struct Styled {
    config: PipelineConfig,
    params: StyleParams,
    render: RenderOptions,
    gray: GrayImage,
    edges: EdgeMap,
}

impl Styled {
    /// The binary edge map.
    #[must_use]
    pub const fn edges(&self) -> &EdgeMap {
        &self.edges
    }

    /// Anti-alias and color the edge map.
    pub fn composite(self) -> Composited {
        let stencil =
            crate::composite::composite(&self.edges, &self.render, self.config.antialias_sigma);
        tracing::debug!(
            line_color = %self.render.line_color,
            inverted = self.render.inverted,
            transparent_bg = self.render.transparent_bg,
            "stencil composited"
        );
        Composited {
            params: self.params,
            render: self.render,
            gray: self.gray,
            edges: self.edges,
            stencil,
        }
    }
}

impl PipelineStage for Styled {
    const NAME: &'static str = "style";

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Style {
            style: self.params.style(),
            edge_pixel_count: count_edge_pixels(&self.edges),
            total_pixel_count: Dimensions::of(&self.edges).pixel_count(),
        }
    }
}

// ───────────────────────── Stage 4: Composited ───────────────────────

/// Pipeline state after compositing.
///
/// Call [`encode`](Self::encode) to advance.
#[must_use = "pipeline stages are consumed by advancing; call .encode() to continue"]
pub struct Composited {
    params: StyleParams,
    render: RenderOptions,
    gray: GrayImage,
    edges: EdgeMap,
    stencil: RgbaImage,
}

impl Composited {
    /// The RGBA stencil.
    #[must_use]
    pub const fn stencil(&self) -> &RgbaImage {
        &self.stencil
    }

    /// Encode the stencil as PNG.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Internal`] for the encode stage if the
    /// PNG encoder fails. The failure is logged with stage, dimensions
    /// and style.
    pub fn encode(self) -> Result<Encoded, PipelineError> {
        let style = self.params.style();
        let png = crate::composite::encode_png(&self.stencil)
            .map_err(|e| e.with_style(style))
            .inspect_err(|e| {
                tracing::error!(
                    stage = %Stage::Encode,
                    dimensions = %Dimensions::of(&self.stencil),
                    %style,
                    error = %e,
                    "stencil encoding failed"
                );
            })?;
        tracing::debug!(png_bytes = png.len(), "stencil encoded");
        Ok(Encoded {
            params: self.params,
            render: self.render,
            gray: self.gray,
            edges: self.edges,
            stencil: self.stencil,
            png,
        })
    }
}

impl PipelineStage for Composited {
    const NAME: &'static str = "composite";

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Composite {
            inverted: self.render.inverted,
            transparent_bg: self.render.transparent_bg,
            line_color: self.render.line_color.to_string(),
        }
    }
}

// ───────────────────────── Stage 5: Encoded ──────────────────────────

/// Final pipeline state.
///
/// Call [`into_result`](Self::into_result) to extract the
/// [`StagedResult`] containing all intermediates.
#[must_use = "call .into_result() to extract the StagedResult"]
pub struct Encoded {
    params: StyleParams,
    render: RenderOptions,
    gray: GrayImage,
    edges: EdgeMap,
    stencil: RgbaImage,
    png: Vec<u8>,
}

impl Encoded {
    /// The PNG-encoded stencil.
    #[must_use]
    pub fn png(&self) -> &[u8] {
        &self.png
    }

    /// The stencil as a `data:image/png;base64,` URL.
    #[must_use]
    pub fn data_url(&self) -> String {
        crate::composite::to_data_url(&self.png)
    }

    /// Consume the pipeline and return the full [`StagedResult`].
    #[must_use]
    pub fn into_result(self) -> StagedResult {
        let dimensions = Dimensions::of(&self.stencil);
        StagedResult {
            params: self.params,
            render: self.render,
            grayscale: self.gray,
            edges: self.edges,
            stencil: self.stencil,
            png: self.png,
            dimensions,
        }
    }
}

impl PipelineStage for Encoded {
    const NAME: &'static str = "encode";

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Encode {
            png_bytes: self.png.len(),
        }
    }
}

// ───────────────────── Pipeline entry point ──────────────────────────

/// Incremental stencil pipeline.
///
/// Created via [`Pipeline::new`], which stores the source image, request
/// and config without doing any processing.
pub struct Pipeline;

impl Pipeline {
    /// Create a new pipeline in the [`Pending`] state.
    #[allow(clippy::new_ret_no_self)]
    pub fn new(source: Vec<u8>, request: GenerateRequest, config: PipelineConfig) -> Pending {
        Pending {
            source,
            request,
            config,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::Style;

    fn diagonal_png(size: u32) -> Vec<u8> {
        let img = image::RgbaImage::from_fn(size, size, |x, y| {
            if x.abs_diff(y) <= 1 {
                image::Rgba([0, 0, 0, 255])
            } else {
                image::Rgba([255, 255, 255, 255])
            }
        });
        crate::composite::encode_png(&img).unwrap()
    }

    #[test]
    fn stages_advance_to_result() {
        let png = diagonal_png(32);
        let request = GenerateRequest {
            style: "simple".into(),
            ..GenerateRequest::default()
        };
        let validated = Pipeline::new(png, request, PipelineConfig::default())
            .validate()
            .unwrap();
        assert_eq!(validated.params().style(), Style::Simple);

        let normalized = validated.normalize().unwrap();
        assert_eq!(
            normalized.dimensions(),
            Dimensions {
                width: 32,
                height: 32
            }
        );

        let styled = normalized.render_style();
        assert!(count_edge_pixels(styled.edges()) > 0);

        let composited = styled.composite();
        assert_eq!(composited.stencil().dimensions(), (32, 32));

        let encoded = composited.encode().unwrap();
        assert!(encoded.data_url().starts_with("data:image/png;base64,"));

        let result = encoded.into_result();
        assert_eq!(result.params.style(), Style::Simple);
        assert_eq!(result.edges.dimensions(), (32, 32));
        assert_eq!(result.grayscale.dimensions(), (32, 32));
    }

    #[test]
    fn validation_precedes_decoding() {
        let request = GenerateRequest {
            style: "spiral".into(),
            ..GenerateRequest::default()
        };
        let err = Pipeline::new(Vec::new(), request, PipelineConfig::default())
            .validate()
            .err()
            .unwrap();
        assert!(matches!(err, PipelineError::Validation { field: "style", .. }));
    }

    #[test]
    fn bad_config_is_rejected() {
        let config = PipelineConfig {
            min_dimension: 1,
            ..PipelineConfig::default()
        };
        let err = Pipeline::new(diagonal_png(8), GenerateRequest::default(), config)
            .validate()
            .err()
            .unwrap();
        assert!(matches!(err, PipelineError::Validation { .. }));
    }

    #[test]
    fn stage_metrics_describe_work() {
        let pending = Pipeline::new(
            diagonal_png(16),
            GenerateRequest::default(),
            PipelineConfig::default(),
        );
        let normalized = pending.validate().unwrap().normalize().unwrap();
        assert!(matches!(
            normalized.metrics(),
            StageMetrics::Normalize {
                width: 16,
                height: 16,
                downsampled: false,
                ..
            }
        ));
        let styled = normalized.render_style();
        assert!(matches!(
            styled.metrics(),
            StageMetrics::Style {
                style: Style::Outline,
                total_pixel_count: 256,
                ..
            }
        ));
    }
}
