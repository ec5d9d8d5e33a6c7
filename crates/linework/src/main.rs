//! linework: command-line stencil generator with per-stage diagnostics.
//!
//! Runs the stencil pipeline on an image file, optionally writing the
//! PNG stencil or printing it as a data URL, and prints per-stage timing
//! and metrics. Useful for:
//!
//! - Comparing styles and subject mask heuristics on the same photo
//! - Tuning line thickness and contrast
//! - Measuring per-stage durations to identify bottlenecks
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin linework -- [OPTIONS] <IMAGE_PATH>
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use linework_pipeline::diagnostics::{Clock, PipelineDiagnostics};
use linework_pipeline::{GenerateRequest, PipelineConfig, SubjectMaskKind};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Turn a photograph into a line-art stencil.
///
/// Prints detailed per-stage timing and metrics for every run.
#[derive(Parser)]
#[command(name = "linework", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    image_path: PathBuf,

    /// Stencil style (outline, simple, detailed, hatching, solid).
    #[arg(long, default_value = "outline")]
    style: String,

    /// Line thickness, 1-5.
    #[arg(long, default_value_t = GenerateRequest::DEFAULT_LINE_THICKNESS)]
    line_thickness: f64,

    /// Contrast, 0-100.
    #[arg(long, default_value_t = GenerateRequest::DEFAULT_CONTRAST)]
    contrast: f64,

    /// Light lines on a dark background.
    #[arg(long)]
    inverted: bool,

    /// Line color as #RRGGBB.
    #[arg(long, default_value = "#000000")]
    line_color: String,

    /// Transparent background instead of a solid one.
    #[arg(long)]
    transparent_bg: bool,

    /// Full request as a JSON string.
    ///
    /// When provided, the individual request flags are ignored.
    #[arg(long)]
    request_json: Option<String>,

    /// Longest side of the working image in pixels.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_MAX_DIMENSION, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(3..))]
    max_dimension: u32,

    /// Subject mask heuristic for hatching and solid fill.
    #[arg(long, value_enum, default_value_t = Mask::BlockVariance)]
    subject_mask: Mask,

    /// Disable dense horizontal fill in hatching.
    #[arg(long)]
    no_dense_fill: bool,

    /// Disable solid dark fill in the solid style.
    #[arg(long)]
    no_solid_fill: bool,

    /// Close line gaps up to twice this many pixels wide.
    #[arg(long, default_value_t = 0)]
    gap_close_radius: u32,

    /// Drop connected line fragments smaller than this many pixels.
    #[arg(long, default_value_t = 0)]
    min_component_area: u32,

    /// Run every sub-pass on the calling thread.
    #[arg(long)]
    sequential: bool,

    /// Full engine config as a JSON string.
    ///
    /// When provided, the individual config flags are ignored.
    /// The JSON must be a valid `PipelineConfig` serialization.
    #[arg(long)]
    config_json: Option<String>,

    /// Write the PNG stencil to this file.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Print the stencil as a `data:image/png;base64,` URL on stdout.
    ///
    /// Diagnostics move to stderr so stdout carries only the URL.
    #[arg(long)]
    data_url: bool,

    /// Number of runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output diagnostics as JSON instead of a human-readable report.
    #[arg(long)]
    json: bool,
}

/// Subject mask selection.
#[derive(Clone, Copy, ValueEnum)]
enum Mask {
    /// Per-block texture energy.
    BlockVariance,
    /// Fixed darkness threshold.
    Brightness,
}

impl From<Mask> for SubjectMaskKind {
    fn from(mask: Mask) -> Self {
        match mask {
            Mask::BlockVariance => Self::BlockVariance,
            Mask::Brightness => Self::Brightness,
        }
    }
}

/// Build a [`GenerateRequest`] from CLI arguments.
fn request_from_cli(cli: &Cli) -> Result<GenerateRequest, String> {
    if let Some(ref json) = cli.request_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --request-json: {e}"));
    }

    Ok(GenerateRequest {
        style: cli.style.clone(),
        line_thickness: cli.line_thickness,
        contrast: cli.contrast,
        inverted: cli.inverted,
        line_color: cli.line_color.clone(),
        transparent_bg: cli.transparent_bg,
    })
}

/// Build a [`PipelineConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual config flags are ignored.
fn config_from_cli(cli: &Cli) -> Result<PipelineConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    Ok(PipelineConfig {
        max_dimension: cli.max_dimension,
        subject_mask: cli.subject_mask.into(),
        dense_fill: !cli.no_dense_fill,
        solid_fill: !cli.no_solid_fill,
        gap_close_radius: cli.gap_close_radius,
        min_component_area: cli.min_component_area,
        parallel: !cli.sequential,
        ..PipelineConfig::default()
    })
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "linework=warn,linework_pipeline=warn".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .init();

    let (request, config) = match request_from_cli(&cli).and_then(|r| Ok((r, config_from_cli(&cli)?))) {
        Ok(parsed) => parsed,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let image_bytes = match std::fs::read(&cli.image_path) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error reading {}: {e}", cli.image_path.display());
            return ExitCode::FAILURE;
        }
    };

    eprintln!(
        "Image: {} ({} bytes)",
        cli.image_path.display(),
        image_bytes.len(),
    );
    eprintln!("Request: {request:#?}");
    eprintln!("Config: {config:#?}");
    eprintln!("Runs: {}", cli.runs);
    eprintln!();

    let clock = StdClock::new();
    let mut all_diagnostics = Vec::with_capacity(cli.runs);

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        let (staged, diagnostics) = match linework_pipeline::process_staged_with_diagnostics(
            image_bytes.clone(),
            request.clone(),
            config.clone(),
            &clock,
        ) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::debug!(kind = ?e.kind(), "pipeline failed");
                eprintln!("Pipeline error: {e}");
                return ExitCode::FAILURE;
            }
        };

        let rendered = if cli.json {
            match serde_json::to_string_pretty(&diagnostics) {
                Ok(json) => json,
                Err(e) => {
                    eprintln!("Error serializing diagnostics: {e}");
                    return ExitCode::FAILURE;
                }
            }
        } else {
            diagnostics.report()
        };
        if cli.data_url {
            eprintln!("{rendered}");
        } else {
            println!("{rendered}");
        }

        // Stencil output comes from the first run only.
        if run == 0 {
            if let Some(ref path) = cli.output {
                if let Err(e) = std::fs::write(path, &staged.png) {
                    eprintln!("Error writing PNG to {}: {e}", path.display());
                    return ExitCode::FAILURE;
                }
                eprintln!(
                    "PNG written to {} ({} bytes)",
                    path.display(),
                    staged.png.len(),
                );
            }
            if cli.data_url {
                println!("{}", linework_pipeline::composite::to_data_url(&staged.png));
            }
        }

        all_diagnostics.push(diagnostics);

        if cli.runs > 1 {
            eprintln!();
        }
    }

    if cli.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }

    ExitCode::SUCCESS
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock {
    origin: Instant,
}

impl StdClock {
    fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for StdClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Function pointer type for extracting a stage duration from diagnostics.
type StageExtractor = fn(&PipelineDiagnostics) -> Duration;

/// Print aggregated statistics across multiple runs to stderr.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[PipelineDiagnostics]) {
    if all_diagnostics.is_empty() {
        eprintln!("Warning: no diagnostics to summarize");
        return;
    }

    eprintln!();
    eprintln!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    eprintln!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    eprintln!();
    eprintln!("{:<24} {:>12}", "Stage", "Mean (ms)");
    eprintln!("{}", "-".repeat(40));

    let stage_extractors: &[(&str, StageExtractor)] = &[
        ("Validate", |d| d.validate.duration),
        ("Normalize", |d| d.normalize.duration),
        ("Style", |d| d.style.duration),
        ("Composite", |d| d.composite.duration),
        ("Encode", |d| d.encode.duration),
    ];

    for (name, extractor) in stage_extractors {
        let stage_mean = all_diagnostics
            .iter()
            .map(|d| extractor(d).as_secs_f64() * 1000.0)
            .sum::<f64>()
            / all_diagnostics.len() as f64;
        eprintln!("{name:<24} {stage_mean:>10.3}ms");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn flags_build_request_and_config() {
        let cli = Cli::parse_from([
            "linework",
            "photo.png",
            "--style",
            "hatching",
            "--line-thickness",
            "2",
            "--inverted",
            "--subject-mask",
            "brightness",
            "--min-component-area",
            "6",
            "--sequential",
        ]);
        let request = request_from_cli(&cli).unwrap();
        assert_eq!(request.style, "hatching");
        assert!((request.line_thickness - 2.0).abs() < f64::EPSILON);
        assert!(request.inverted);
        assert!(!request.transparent_bg);

        let config = config_from_cli(&cli).unwrap();
        assert_eq!(config.subject_mask, SubjectMaskKind::Brightness);
        assert!(!config.parallel);
        assert!(config.dense_fill);
        assert_eq!(config.min_component_area, 6);
        assert_eq!(config.gap_close_radius, 0);
    }

    #[test]
    fn request_json_overrides_flags() {
        let cli = Cli::parse_from([
            "linework",
            "photo.png",
            "--style",
            "solid",
            "--request-json",
            r##"{"style":"detailed","lineColor":"#ff0000"}"##,
        ]);
        let request = request_from_cli(&cli).unwrap();
        assert_eq!(request.style, "detailed");
        assert_eq!(request.line_color, "#ff0000");
        assert!((request.contrast - GenerateRequest::DEFAULT_CONTRAST).abs() < f64::EPSILON);
    }

    #[test]
    fn bad_config_json_is_reported() {
        let cli = Cli::parse_from(["linework", "photo.png", "--config-json", "{"]);
        let err = config_from_cli(&cli).unwrap_err();
        assert!(err.contains("--config-json"), "{err}");
    }

    #[test]
    fn std_clock_is_monotonic() {
        let clock = StdClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
