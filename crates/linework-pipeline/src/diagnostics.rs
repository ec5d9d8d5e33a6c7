//! Pipeline diagnostics: timing, counts, and other metrics for each stage.
//!
//! These diagnostics are permanent instrumentation intended for
//! threshold tuning and style experimentation. The core crate never
//! reads the system clock itself; callers pass a [`Clock`] so the same
//! code runs under test with a scripted clock.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::pipeline::{Pipeline, PipelineStage};
use crate::types::{GenerateRequest, PipelineConfig, PipelineError, StagedResult, Style};

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// A monotonic time source.
///
/// `now` returns the time elapsed since an arbitrary fixed origin; only
/// differences between readings are meaningful.
pub trait Clock {
    /// Current reading.
    fn now(&self) -> Duration;
}

/// Diagnostics collected from a single pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Request validation.
    pub validate: StageDiagnostics,
    /// Decode, orientation, downscale, grayscale and contrast.
    pub normalize: StageDiagnostics,
    /// Style recipe.
    pub style: StageDiagnostics,
    /// Anti-aliasing and coloring.
    pub composite: StageDiagnostics,
    /// PNG encoding.
    pub encode: StageDiagnostics,
    /// Total wall-clock duration of the entire pipeline (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts across all stages.
    pub summary: PipelineSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics that vary by pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Validated request parameters.
    Validate {
        /// Selected style.
        style: Style,
        /// Line thickness after rounding.
        line_thickness: u8,
        /// Contrast after rounding.
        contrast: u8,
    },
    /// Normalization metrics.
    Normalize {
        /// Decoded width before downscaling.
        source_width: u32,
        /// Decoded height before downscaling.
        source_height: u32,
        /// Width after downscaling.
        width: u32,
        /// Height after downscaling.
        height: u32,
        /// Whether downscaling was applied.
        downsampled: bool,
        /// Contrast gain.
        contrast_alpha: f32,
    },
    /// Style recipe metrics.
    Style {
        /// Style rendered.
        style: Style,
        /// Number of set pixels in the edge map.
        edge_pixel_count: u64,
        /// Total pixel count for computing edge density.
        total_pixel_count: u64,
    },
    /// Compositor metrics.
    Composite {
        /// Whether the edge map was inverted.
        inverted: bool,
        /// Whether the background is transparent.
        transparent_bg: bool,
        /// Line color as `#rrggbb`.
        line_color: String,
    },
    /// PNG encoding metrics.
    Encode {
        /// Size of the encoded PNG.
        png_bytes: usize,
    },
}

/// High-level summary for the entire pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Working image width in pixels.
    pub image_width: u32,
    /// Working image height in pixels.
    pub image_height: u32,
    /// Total pixel count.
    pub pixel_count: u64,
    /// Style rendered.
    pub style: Style,
    /// Number of set pixels in the edge map.
    pub edge_pixel_count: u64,
    /// Size of the encoded PNG.
    pub png_bytes: usize,
}

/// Run the full pipeline, timing every stage with `clock`.
///
/// # Errors
///
/// Returns the first [`PipelineError`] raised by any stage.
pub fn process_staged_with_diagnostics(
    source: Vec<u8>,
    request: GenerateRequest,
    config: PipelineConfig,
    clock: &impl Clock,
) -> Result<(StagedResult, PipelineDiagnostics), PipelineError> {
    let start = clock.now();

    let (validated, validate) = timed(clock, || Pipeline::new(source, request, config).validate())?;
    let (normalized, normalize) = timed(clock, || validated.normalize())?;
    let (styled, style) = timed(clock, || Ok(normalized.render_style()))?;
    let (composited, composite) = timed(clock, || Ok(styled.composite()))?;
    let (encoded, encode) = timed(clock, || composited.encode())?;

    let total_duration = clock.now().saturating_sub(start);
    let result = encoded.into_result();
    let summary = PipelineSummary {
        image_width: result.dimensions.width,
        image_height: result.dimensions.height,
        pixel_count: result.dimensions.pixel_count(),
        style: result.params.style(),
        edge_pixel_count: crate::edge::count_edge_pixels(&result.edges),
        png_bytes: result.png.len(),
    };

    Ok((
        result,
        PipelineDiagnostics {
            validate,
            normalize,
            style,
            composite,
            encode,
            total_duration,
            summary,
        },
    ))
}

/// Run one stage transition and capture its duration and metrics.
fn timed<S: PipelineStage>(
    clock: &impl Clock,
    advance: impl FnOnce() -> Result<S, PipelineError>,
) -> Result<(S, StageDiagnostics), PipelineError> {
    let start = clock.now();
    let stage = advance()?;
    let duration = clock.now().saturating_sub(start);
    tracing::trace!(stage = S::NAME, ?duration, "stage finished");
    let metrics = stage.metrics();
    Ok((stage, StageDiagnostics { duration, metrics }))
}

impl PipelineDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Pipeline Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} ({} pixels), style {}",
            self.summary.image_width,
            self.summary.image_height,
            self.summary.pixel_count,
            self.summary.style,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        let stages = [
            ("Validate", &self.validate),
            ("Normalize", &self.normalize),
            ("Style", &self.style),
            ("Composite", &self.composite),
            ("Encode", &self.encode),
        ];
        for (name, diag) in stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Edge pixels: {}  |  PNG bytes: {}",
            self.summary.edge_pixel_count, self.summary.png_bytes,
        ));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Validate {
            style,
            line_thickness,
            contrast,
        } => format!("{style} thickness={line_thickness} contrast={contrast}"),
        StageMetrics::Normalize {
            source_width,
            source_height,
            width,
            height,
            downsampled,
            contrast_alpha,
        } => {
            let scaled = if *downsampled { " (downsampled)" } else { "" };
            format!(
                "{source_width}x{source_height} -> {width}x{height}{scaled} alpha={contrast_alpha:.2}"
            )
        }
        StageMetrics::Style {
            style,
            edge_pixel_count,
            total_pixel_count,
        } => {
            #[allow(clippy::cast_precision_loss)]
            let density = if *total_pixel_count > 0 {
                *edge_pixel_count as f64 / *total_pixel_count as f64 * 100.0
            } else {
                0.0
            };
            format!("{style} edges={edge_pixel_count} ({density:.1}%)")
        }
        StageMetrics::Composite {
            inverted,
            transparent_bg,
            line_color,
        } => format!("color={line_color} inverted={inverted} transparent={transparent_bg}"),
        StageMetrics::Encode { png_bytes } => format!("{png_bytes} bytes"),
    }
}
