//! Shared types for the linework stencil pipeline.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::mask::SubjectMaskKind;

/// Re-export `GrayImage` so downstream crates can reference
/// intermediate raster data without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbaImage` so downstream crates can reference the
/// composited stencil without depending on `image` directly.
pub use image::RgbaImage;

/// Binary edge map: 255 marks a line pixel, 0 marks background.
pub type EdgeMap = GrayImage;

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Dimensions of an existing image buffer.
    #[must_use]
    pub fn of<P: image::Pixel>(image: &image::ImageBuffer<P, Vec<P::Subpixel>>) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
        }
    }

    /// Total pixel count (`width * height`).
    #[must_use]
    pub const fn pixel_count(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

// ───────────────────────── Style ─────────────────────────────────────

/// The five line-art families a stencil can be rendered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Style {
    /// Thin contour lines: fine heuristic pass plus un-thinned structural pass.
    #[default]
    Outline,
    /// Bold, simplified contours with speckle removal.
    Simple,
    /// Multi-scale contours plus a Laplacian detail layer.
    Detailed,
    /// Contours plus procedural diagonal hatching in dark subject areas.
    Hatching,
    /// Bold contours plus posterization boundaries and solid dark fill.
    Solid,
}

impl Style {
    /// Every style, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::Outline,
        Self::Simple,
        Self::Detailed,
        Self::Hatching,
        Self::Solid,
    ];

    /// The lower-case wire name of the style.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Outline => "outline",
            Self::Simple => "simple",
            Self::Detailed => "detailed",
            Self::Hatching => "hatching",
            Self::Solid => "solid",
        }
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Style {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|style| style.name() == s)
            .ok_or_else(|| PipelineError::validation("style", format!("unknown style `{s}`")))
    }
}

// ───────────────────────── LineColor ─────────────────────────────────

/// An opaque RGB line color, written as `#RRGGBB` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LineColor {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
}

impl LineColor {
    /// Pure black, the default stencil color.
    pub const BLACK: Self = Self::new(0, 0, 0);

    /// Create a color from its channels.
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// The color as an `[r, g, b]` array.
    #[must_use]
    pub const fn channels(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

impl Default for LineColor {
    fn default() -> Self {
        Self::BLACK
    }
}

impl FromStr for LineColor {
    type Err = PipelineError;

    /// Parse `^#[0-9a-fA-F]{6}$`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || PipelineError::validation("lineColor", format!("`{s}` is not a #RRGGBB color"));
        let hex = s.strip_prefix('#').ok_or_else(invalid)?;
        if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
        Ok(Self::new(channel(0)?, channel(2)?, channel(4)?))
    }
}

impl TryFrom<String> for LineColor {
    type Error = PipelineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<LineColor> for String {
    fn from(color: LineColor) -> Self {
        color.to_string()
    }
}

impl fmt::Display for LineColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

// ───────────────────────── StyleParams / RenderOptions ───────────────

/// Validated recipe parameters.
///
/// Construct through [`StyleParams::new`] or [`GenerateRequest::validate`];
/// both enforce the `line_thickness` and `contrast` ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleParams {
    style: Style,
    line_thickness: u8,
    contrast: u8,
}

impl StyleParams {
    /// Smallest accepted line thickness.
    pub const MIN_LINE_THICKNESS: u8 = 1;
    /// Largest accepted line thickness.
    pub const MAX_LINE_THICKNESS: u8 = 5;
    /// Largest accepted contrast setting.
    pub const MAX_CONTRAST: u8 = 100;

    /// Create validated parameters.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Validation`] if `line_thickness` is
    /// outside `1..=5` or `contrast` exceeds 100.
    pub fn new(style: Style, line_thickness: u8, contrast: u8) -> Result<Self, PipelineError> {
        if !(Self::MIN_LINE_THICKNESS..=Self::MAX_LINE_THICKNESS).contains(&line_thickness) {
            return Err(PipelineError::validation(
                "lineThickness",
                format!("{line_thickness} is outside 1-5"),
            ));
        }
        if contrast > Self::MAX_CONTRAST {
            return Err(PipelineError::validation(
                "contrast",
                format!("{contrast} is outside 0-100"),
            ));
        }
        Ok(Self {
            style,
            line_thickness,
            contrast,
        })
    }

    /// The selected style.
    #[must_use]
    pub const fn style(self) -> Style {
        self.style
    }

    /// Line thickness in `1..=5`.
    #[must_use]
    pub const fn line_thickness(self) -> u8 {
        self.line_thickness
    }

    /// Contrast in `0..=100`.
    #[must_use]
    pub const fn contrast(self) -> u8 {
        self.contrast
    }

    /// Threshold scale derived from contrast: `1 - (contrast - 50) / divisor`.
    ///
    /// Detector thresholds are multiplied by this factor, so higher
    /// contrast lowers them (down to their floors) and keeps more lines.
    #[must_use]
    pub fn scale_factor(self, divisor: f32) -> f32 {
        1.0 - (f32::from(self.contrast) - 50.0) / divisor
    }
}

/// Compositor options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderOptions {
    /// Draw background pixels in the line color instead of line pixels.
    pub inverted: bool,
    /// Color used for line pixels.
    pub line_color: LineColor,
    /// Leave the background fully transparent instead of painting it.
    pub transparent_bg: bool,
}

// ───────────────────────── GenerateRequest ───────────────────────────

/// Wire-level parameters of a stencil request.
///
/// Mirrors the JSON body accepted by the surrounding service: numeric
/// fields arrive as floating point and are rounded during validation,
/// `style` and `line_color` arrive as strings. Omitted fields take the
/// defaults (`outline`, 3, 50, `#000000`, not inverted, opaque).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GenerateRequest {
    /// One of `outline`, `simple`, `detailed`, `hatching`, `solid`.
    pub style: String,
    /// Line thickness in `[1, 5]`; rounded to the nearest integer.
    pub line_thickness: f64,
    /// Contrast in `[0, 100]`; rounded to the nearest integer.
    pub contrast: f64,
    /// Invert lines and background.
    pub inverted: bool,
    /// Line color as `#RRGGBB`.
    pub line_color: String,
    /// Transparent background.
    pub transparent_bg: bool,
}

impl GenerateRequest {
    /// Default line thickness.
    pub const DEFAULT_LINE_THICKNESS: f64 = 3.0;
    /// Default contrast.
    pub const DEFAULT_CONTRAST: f64 = 50.0;

    /// Check every parameter against its contract and return the typed
    /// recipe parameters and compositor options.
    ///
    /// Runs before any pixel work so invalid requests fail cheaply.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Validation`] naming the offending field.
    pub fn validate(&self) -> Result<(StyleParams, RenderOptions), PipelineError> {
        let style: Style = self.style.parse()?;
        let line_thickness = round_in_range("lineThickness", self.line_thickness, 1.0, 5.0)?;
        let contrast = round_in_range("contrast", self.contrast, 0.0, 100.0)?;
        let line_color: LineColor = self.line_color.parse()?;
        let params = StyleParams::new(style, line_thickness, contrast)?;
        let render = RenderOptions {
            inverted: self.inverted,
            line_color,
            transparent_bg: self.transparent_bg,
        };
        Ok((params, render))
    }
}

impl Default for GenerateRequest {
    fn default() -> Self {
        Self {
            style: Style::default().name().to_owned(),
            line_thickness: Self::DEFAULT_LINE_THICKNESS,
            contrast: Self::DEFAULT_CONTRAST,
            inverted: false,
            line_color: LineColor::default().to_string(),
            transparent_bg: false,
        }
    }
}

impl From<(StyleParams, RenderOptions)> for GenerateRequest {
    fn from((params, render): (StyleParams, RenderOptions)) -> Self {
        Self {
            style: params.style().name().to_owned(),
            line_thickness: f64::from(params.line_thickness()),
            contrast: f64::from(params.contrast()),
            inverted: render.inverted,
            line_color: render.line_color.to_string(),
            transparent_bg: render.transparent_bg,
        }
    }
}

/// Range-check `value` against `[min, max]`, then round it.
///
/// The check happens before rounding, so for a `[1, 5]` range both
/// `0.6` and `5.4` are rejected while `4.6` is accepted and becomes 5.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn round_in_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<u8, PipelineError> {
    if !value.is_finite() || value < min || value > max {
        return Err(PipelineError::validation(
            field,
            format!("{value} is outside {min}-{max}"),
        ));
    }
    // In range [0, 100] after the check above, so the cast is lossless.
    Ok(value.round() as u8)
}

// ───────────────────────── PipelineConfig ────────────────────────────

/// Engine tunables that are not part of a request.
///
/// The defaults reproduce the reference stencil look; the CLI exposes
/// them for experimentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Longest side after normalization; larger images are downscaled
    /// (fit-inside, aspect ratio preserved).
    pub max_dimension: u32,

    /// Smallest accepted side after normalization. Detectors need a
    /// one-pixel border plus at least one interior pixel.
    pub min_dimension: u32,

    /// Sigma of the anti-aliasing blur applied by the compositor.
    pub antialias_sigma: f32,

    /// Subject mask heuristic used by the shading recipes.
    pub subject_mask: SubjectMaskKind,

    /// Whether Hatching adds dense horizontal fill in very dark areas.
    pub dense_fill: bool,

    /// Whether Solid fills very dark subject pixels solid.
    pub solid_fill: bool,

    /// Radius of a closing applied to every recipe's map, bridging line
    /// gaps up to twice this wide. 0 disables it.
    pub gap_close_radius: u32,

    /// Connected line fragments with fewer pixels than this are dropped
    /// after the recipe. 0 disables it.
    pub min_component_area: u32,

    /// Whether independent sub-passes run concurrently. Output is
    /// identical either way.
    pub parallel: bool,
}

impl PipelineConfig {
    /// Default for [`max_dimension`](Self::max_dimension).
    pub const DEFAULT_MAX_DIMENSION: u32 = 2048;
    /// Default for [`min_dimension`](Self::min_dimension).
    pub const DEFAULT_MIN_DIMENSION: u32 = 3;
    /// Default for [`antialias_sigma`](Self::antialias_sigma).
    pub const DEFAULT_ANTIALIAS_SIGMA: f32 = 0.6;
    /// Default for [`subject_mask`](Self::subject_mask).
    pub const DEFAULT_SUBJECT_MASK: SubjectMaskKind = SubjectMaskKind::BlockVariance;

    /// Check the tunables themselves.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Validation`] when `min_dimension` is
    /// below 3, `max_dimension` is below `min_dimension`, or the
    /// anti-aliasing sigma is negative or not finite.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.min_dimension < Self::DEFAULT_MIN_DIMENSION {
            return Err(PipelineError::validation(
                "min_dimension",
                format!("{} is below 3", self.min_dimension),
            ));
        }
        if self.max_dimension < self.min_dimension {
            return Err(PipelineError::validation(
                "max_dimension",
                format!(
                    "{} is below min_dimension {}",
                    self.max_dimension, self.min_dimension
                ),
            ));
        }
        if !self.antialias_sigma.is_finite() || self.antialias_sigma < 0.0 {
            return Err(PipelineError::validation(
                "antialias_sigma",
                format!("{} is not a non-negative number", self.antialias_sigma),
            ));
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_dimension: Self::DEFAULT_MAX_DIMENSION,
            min_dimension: Self::DEFAULT_MIN_DIMENSION,
            antialias_sigma: Self::DEFAULT_ANTIALIAS_SIGMA,
            subject_mask: Self::DEFAULT_SUBJECT_MASK,
            dense_fill: true,
            solid_fill: true,
            gap_close_radius: 0,
            min_component_area: 0,
            parallel: true,
        }
    }
}

// ───────────────────────── Results ───────────────────────────────────

/// Output of [`crate::process`]: the encoded stencil plus the binary
/// edge map it was composited from.
#[derive(Debug, Clone)]
pub struct StencilResult {
    /// PNG-encoded RGBA stencil.
    pub png: Vec<u8>,
    /// Binary edge map produced by the style recipe.
    pub edges: EdgeMap,
    /// Dimensions after normalization.
    pub dimensions: Dimensions,
    /// Style the stencil was rendered in.
    pub style: Style,
}

impl StencilResult {
    /// The stencil as a `data:image/png;base64,...` URL.
    #[must_use]
    pub fn data_url(&self) -> String {
        crate::composite::to_data_url(&self.png)
    }
}

/// Result of running the pipeline with every intermediate preserved.
#[derive(Debug, Clone)]
pub struct StagedResult {
    /// Validated recipe parameters.
    pub params: StyleParams,
    /// Validated compositor options.
    pub render: RenderOptions,
    /// Normalized, contrast-adjusted grayscale image.
    pub grayscale: GrayImage,
    /// Binary edge map from the style recipe.
    pub edges: EdgeMap,
    /// Composited RGBA stencil.
    pub stencil: RgbaImage,
    /// PNG encoding of `stencil`.
    pub png: Vec<u8>,
    /// Dimensions after normalization.
    pub dimensions: Dimensions,
}

impl From<StagedResult> for StencilResult {
    fn from(staged: StagedResult) -> Self {
        Self {
            png: staged.png,
            edges: staged.edges,
            dimensions: staged.dimensions,
            style: staged.params.style(),
        }
    }
}

// ───────────────────────── Errors ────────────────────────────────────

/// Pipeline stage names used for error context and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Parameter validation.
    Validate,
    /// Decode, orientation, downscale, grayscale, contrast.
    Normalize,
    /// Style recipe (edge detection, morphology, shading).
    Style,
    /// Anti-aliasing and colorization.
    Composite,
    /// PNG encoding.
    Encode,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Validate => "validate",
            Self::Normalize => "normalize",
            Self::Style => "style",
            Self::Composite => "composite",
            Self::Encode => "encode",
        })
    }
}

/// Coarse error classification for the orchestration layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The input bytes are not a supported image.
    Decode,
    /// The image is too small (or degenerate) to process.
    Dimension,
    /// A request parameter is outside its contract.
    Validation,
    /// Unexpected failure mid-pipeline.
    Internal,
}

/// Errors that can occur during stencil generation.
///
/// Uses custom `Serialize`/`Deserialize` because `image::ImageError`
/// does not implement serde traits. The `ImageDecode` variant is
/// serialized as its `Display` string.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The image is too small to process after normalization.
    #[error("unsupported image dimensions {width}x{height}: {reason}")]
    Dimension {
        /// Width after normalization.
        width: u32,
        /// Height after normalization.
        height: u32,
        /// Why the dimensions were rejected.
        reason: String,
    },

    /// A request parameter is outside its contract.
    #[error("invalid {field}: {reason}")]
    Validation {
        /// Wire name of the offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// Unexpected failure inside a pipeline stage.
    #[error("{stage} stage failed ({dimensions}, style {}): {reason}", .style.map_or("-", Style::name))]
    Internal {
        /// Stage that failed.
        stage: Stage,
        /// Image dimensions when the failure happened.
        dimensions: Dimensions,
        /// Requested style, when known.
        style: Option<Style>,
        /// Underlying cause.
        reason: String,
    },
}

impl PipelineError {
    /// Shorthand for [`PipelineError::Validation`].
    #[must_use]
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    /// Shorthand for [`PipelineError::Internal`].
    #[must_use]
    pub fn internal(
        stage: Stage,
        dimensions: Dimensions,
        style: Option<Style>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Internal {
            stage,
            dimensions,
            style,
            reason: reason.into(),
        }
    }

    /// Fill in the style of an [`Internal`](Self::Internal) error raised
    /// by a stage that does not know it.
    #[must_use]
    pub fn with_style(self, style: Style) -> Self {
        match self {
            Self::Internal {
                stage,
                dimensions,
                style: None,
                reason,
            } => Self::Internal {
                stage,
                dimensions,
                style: Some(style),
                reason,
            },
            other => other,
        }
    }

    /// Classify the error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyInput | Self::ImageDecode(_) => ErrorKind::Decode,
            Self::Dimension { .. } => ErrorKind::Dimension,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Whether retrying the same request could succeed.
    ///
    /// The pipeline is a pure function of its inputs, so only internal
    /// failures (allocation, encoder) are worth retrying.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Internal)
    }
}

/// Serde-compatible proxy for `PipelineError`.
///
/// `image::ImageError` does not implement serde, so the `ImageDecode`
/// variant stores its `Display` string instead. `Validation` fields are
/// owned strings because a deserialized error cannot borrow.
#[derive(Serialize, Deserialize)]
enum PipelineErrorProxy {
    EmptyInput,
    ImageDecode(String),
    Dimension {
        width: u32,
        height: u32,
        reason: String,
    },
    Validation {
        field: String,
        reason: String,
    },
    Internal {
        stage: Stage,
        dimensions: Dimensions,
        style: Option<Style>,
        reason: String,
    },
}

impl Serialize for PipelineError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let proxy = match self {
            Self::EmptyInput => PipelineErrorProxy::EmptyInput,
            Self::ImageDecode(e) => PipelineErrorProxy::ImageDecode(e.to_string()),
            Self::Dimension {
                width,
                height,
                reason,
            } => PipelineErrorProxy::Dimension {
                width: *width,
                height: *height,
                reason: reason.clone(),
            },
            Self::Validation { field, reason } => PipelineErrorProxy::Validation {
                field: (*field).to_owned(),
                reason: reason.clone(),
            },
            Self::Internal {
                stage,
                dimensions,
                style,
                reason,
            } => PipelineErrorProxy::Internal {
                stage: *stage,
                dimensions: *dimensions,
                style: *style,
                reason: reason.clone(),
            },
        };
        proxy.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PipelineError {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let proxy = PipelineErrorProxy::deserialize(deserializer)?;
        Ok(match proxy {
            PipelineErrorProxy::EmptyInput => Self::EmptyInput,
            PipelineErrorProxy::ImageDecode(msg) => {
                // The typed image error cannot be rebuilt; keep the message.
                Self::ImageDecode(image::ImageError::IoError(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    msg,
                )))
            }
            PipelineErrorProxy::Dimension {
                width,
                height,
                reason,
            } => Self::Dimension {
                width,
                height,
                reason,
            },
            PipelineErrorProxy::Validation { field, reason } => Self::Validation {
                field: known_field(&field),
                reason,
            },
            PipelineErrorProxy::Internal {
                stage,
                dimensions,
                style,
                reason,
            } => Self::Internal {
                stage,
                dimensions,
                style,
                reason,
            },
        })
    }
}

/// Map a deserialized field name back onto its static spelling.
fn known_field(field: &str) -> &'static str {
    const FIELDS: [&str; 10] = [
        "image",
        "style",
        "lineThickness",
        "contrast",
        "inverted",
        "lineColor",
        "transparentBg",
        "min_dimension",
        "max_dimension",
        "antialias_sigma",
    ];
    FIELDS
        .into_iter()
        .find(|known| *known == field)
        .unwrap_or("unknown")
}
