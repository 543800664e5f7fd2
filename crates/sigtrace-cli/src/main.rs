//! sigtrace: trace a signature image into ordered strokes and timed pen
//! motion.
//!
//! Reads an image file, runs the tracing pipeline, plans pen motion on a
//! canvas and writes whichever outputs were requested. With no output
//! flags the analysis JSON is printed to stdout.
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin sigtrace -- [OPTIONS] <IMAGE_PATH>
//! ```
//!
//! Logging goes to stderr. `RUST_LOG` takes precedence over `-v`.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use sigtrace_export::SvgMetadata;
use sigtrace_motion::{HandwritingStyle, StylePreset, StrokePath};
use sigtrace_pipeline::diagnostics::{Clock, trace_bytes_with_diagnostics};
use sigtrace_pipeline::{DownsampleFilter, MaskConfig, SignatureAnalysis, TraceConfig};
use tracing_subscriber::EnvFilter;

/// Trace a handwritten signature into pen strokes and timed motion.
#[derive(Parser)]
#[command(name = "sigtrace", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    image_path: PathBuf,

    /// Write the traced analysis as JSON.
    #[arg(long)]
    analysis_json: Option<PathBuf>,

    /// Write the planned motion timeline as JSON.
    #[arg(long)]
    timeline_json: Option<PathBuf>,

    /// Write an SVG preview of the traced strokes.
    #[arg(long)]
    svg: Option<PathBuf>,

    /// Write an SVG of the planned timeline on its canvas.
    #[arg(long)]
    timeline_svg: Option<PathBuf>,

    /// Motion canvas size as WIDTHxHEIGHT. Defaults to the image size.
    #[arg(long, value_parser = parse_canvas)]
    canvas: Option<(u32, u32)>,

    /// Named handwriting style. Without one, strokes are planned with no
    /// tremor and no inertia.
    #[arg(long, value_enum)]
    style_preset: Option<Preset>,

    /// Style overrides as a JSON object, applied over the preset.
    #[arg(long)]
    style_json: Option<String>,

    /// Full trace config as a JSON string.
    ///
    /// When provided, the individual trace flags below are ignored.
    #[arg(long)]
    config_json: Option<String>,

    /// Ink components smaller than this many pixels are removed as specks.
    #[arg(long, default_value_t = MaskConfig::DEFAULT_MIN_COMPONENT_SIZE)]
    min_component_size: u32,

    /// Working resolution (max dimension in pixels after downsampling).
    #[arg(long, default_value_t = TraceConfig::DEFAULT_WORKING_RESOLUTION, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    working_resolution: u32,

    /// Downsample filter.
    #[arg(long, value_enum, default_value_t = CLI_DEFAULT_FILTER)]
    downsample_filter: Filter,

    /// Rescale the timeline to last this many milliseconds.
    #[arg(long)]
    duration_ms: Option<f64>,

    /// Print the per-stage diagnostics report to stdout.
    #[arg(long)]
    report: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Handwriting preset selection.
#[derive(Clone, Copy, ValueEnum)]
enum Preset {
    /// Slow and deliberate, no tremor.
    Steady,
    /// Everyday signing pace.
    Natural,
    /// Fast and loose.
    Hurried,
}

impl From<Preset> for StylePreset {
    fn from(preset: Preset) -> Self {
        match preset {
            Preset::Steady => Self::Steady,
            Preset::Natural => Self::Natural,
            Preset::Hurried => Self::Hurried,
        }
    }
}

/// Downsample resampling filter selection.
#[derive(Clone, Copy, ValueEnum)]
enum Filter {
    /// Disabled: skip downsampling regardless of image size.
    Disabled,
    /// Nearest-neighbor (fastest, blocky).
    Nearest,
    /// Bilinear interpolation (fast, decent quality).
    Triangle,
    /// Bicubic Catmull-Rom (moderate, good quality).
    CatmullRom,
    /// Gaussian (moderate, smooth).
    Gaussian,
    /// Lanczos with 3 lobes (slowest, sharpest).
    Lanczos3,
}

/// Maps a [`DownsampleFilter`] to the local CLI [`Filter`] enum.
const fn filter_from_pipeline(f: DownsampleFilter) -> Filter {
    match f {
        DownsampleFilter::Disabled => Filter::Disabled,
        DownsampleFilter::Nearest => Filter::Nearest,
        DownsampleFilter::Triangle => Filter::Triangle,
        DownsampleFilter::CatmullRom => Filter::CatmullRom,
        DownsampleFilter::Gaussian => Filter::Gaussian,
        DownsampleFilter::Lanczos3 => Filter::Lanczos3,
    }
}

/// The CLI default filter, derived from
/// [`TraceConfig::DEFAULT_DOWNSAMPLE_FILTER`] so the two cannot drift.
const CLI_DEFAULT_FILTER: Filter = filter_from_pipeline(TraceConfig::DEFAULT_DOWNSAMPLE_FILTER);

/// Parse `WIDTHxHEIGHT` into a non-zero canvas size.
fn parse_canvas(value: &str) -> Result<(u32, u32), String> {
    let (w, h) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {value:?}"))?;
    let parse = |s: &str| {
        s.trim()
            .parse::<u32>()
            .ok()
            .filter(|&n| n > 0)
            .ok_or_else(|| format!("canvas dimensions must be positive integers, got {value:?}"))
    };
    Ok((parse(w)?, parse(h)?))
}

/// Build a [`TraceConfig`] from CLI arguments.
///
/// `--config-json` wins over the individual flags.
fn config_from_cli(cli: &Cli) -> Result<TraceConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    Ok(TraceConfig {
        working_resolution: cli.working_resolution,
        downsample_filter: match cli.downsample_filter {
            Filter::Disabled => DownsampleFilter::Disabled,
            Filter::Nearest => DownsampleFilter::Nearest,
            Filter::Triangle => DownsampleFilter::Triangle,
            Filter::CatmullRom => DownsampleFilter::CatmullRom,
            Filter::Gaussian => DownsampleFilter::Gaussian,
            Filter::Lanczos3 => DownsampleFilter::Lanczos3,
        },
        mask: MaskConfig {
            min_component_size: cli.min_component_size,
            ..MaskConfig::default()
        },
        ..TraceConfig::default()
    })
}

/// Build the handwriting style: the preset (or the empty style), overlaid
/// by `--style-json`.
fn style_from_cli(cli: &Cli) -> Result<HandwritingStyle, String> {
    let preset = cli
        .style_preset
        .map(|p| StylePreset::from(p).style())
        .unwrap_or_default();
    match cli.style_json {
        Some(ref json) => serde_json::from_str::<HandwritingStyle>(json)
            .map(|overrides| overrides.overlay(&preset))
            .map_err(|e| format!("Error parsing --style-json: {e}")),
        None => Ok(preset),
    }
}

/// Install the stderr log subscriber.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn write_output(path: &Path, contents: &str, what: &str) -> Result<(), String> {
    std::fs::write(path, contents)
        .map_err(|e| format!("Error writing {what} to {}: {e}", path.display()))?;
    tracing::info!(path = %path.display(), bytes = contents.len(), "{what} written");
    Ok(())
}

fn to_json<T: serde::Serialize>(value: &T, what: &str) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("Error serializing {what}: {e}"))
}

/// Plan motion for `analysis` and apply `--duration-ms`.
fn timeline(
    cli: &Cli,
    analysis: &SignatureAnalysis,
    canvas: (u32, u32),
) -> Result<Vec<StrokePath>, String> {
    let style = style_from_cli(cli)?.resolve();
    let mut paths = sigtrace_motion::plan(analysis, canvas.0, canvas.1, &style)
        .map_err(|e| format!("Motion planning error: {e}"))?;

    if let Some(target) = cli.duration_ms
        && sigtrace_motion::rescale_to_duration(&mut paths, target).is_none()
    {
        tracing::warn!(target_ms = target, "timeline not rescaled");
    }
    Ok(paths)
}

fn run(cli: &Cli) -> Result<(), String> {
    let config = config_from_cli(cli)?;
    tracing::debug!(?config, "trace config");

    let image_bytes = std::fs::read(&cli.image_path)
        .map_err(|e| format!("Error reading {}: {e}", cli.image_path.display()))?;
    tracing::info!(
        path = %cli.image_path.display(),
        bytes = image_bytes.len(),
        "image loaded",
    );

    let (analysis, diagnostics) = trace_bytes_with_diagnostics(&image_bytes, &config, &StdClock)
        .map_err(|e| format!("Pipeline error: {e}"))?;

    if cli.report {
        println!("{}", diagnostics.report());
    }

    if analysis.metadata.truncated {
        tracing::warn!("walk limits were hit; some ink is not represented");
    }

    let title = cli
        .image_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("signature");
    let config_json = to_json(&config, "config")?;
    let metadata = SvgMetadata {
        title: Some(title),
        description: Some(&analysis.metadata.notes),
        config_json: Some(&config_json),
    };

    if let Some(ref path) = cli.analysis_json {
        write_output(path, &to_json(&analysis, "analysis")?, "analysis JSON")?;
    }

    if let Some(ref path) = cli.svg {
        let svg = sigtrace_export::analysis_to_svg(&analysis, &metadata);
        write_output(path, &svg, "SVG")?;
    }

    if cli.timeline_json.is_some() || cli.timeline_svg.is_some() {
        let [image_width, image_height] = analysis.metadata.original_size;
        let canvas = cli.canvas.unwrap_or((image_width, image_height));
        let paths = timeline(cli, &analysis, canvas)?;

        if let Some(ref path) = cli.timeline_json {
            write_output(path, &to_json(&paths, "timeline")?, "timeline JSON")?;
        }
        if let Some(ref path) = cli.timeline_svg {
            let svg = sigtrace_export::timeline_to_svg(&paths, canvas.0, canvas.1, &metadata);
            write_output(path, &svg, "timeline SVG")?;
        }
    }

    let wrote_any = cli.analysis_json.is_some()
        || cli.svg.is_some()
        || cli.timeline_json.is_some()
        || cli.timeline_svg.is_some();
    if !wrote_any && !cli.report {
        println!("{}", to_json(&analysis, "analysis")?);
    }

    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("{msg}");
            ExitCode::FAILURE
        }
    }
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}
