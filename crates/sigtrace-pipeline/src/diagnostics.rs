//! Pipeline diagnostics: timing, counts, and other metrics for each stage.
//!
//! These diagnostics are permanent instrumentation intended for
//! threshold tuning. [`trace_rgba_with_diagnostics`] and
//! [`trace_bytes_with_diagnostics`] collect them alongside the
//! [`SignatureAnalysis`]; the plain entry points in the crate root run
//! the same stages and discard them.
//!
//! Timestamps come from a caller-supplied [`Clock`] so the crate stays
//! free of platform time sources. Durations are serialized as
//! fractional seconds (`f64`) for JSON compatibility, since
//! `std::time::Duration` does not implement serde traits.

use std::borrow::Cow;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::downsample::{DownsampleFilter, downsample};
use crate::mask::{build_mask, despeckle};
use crate::order::{OrderHypothesis, order_strokes};
use crate::postprocess::postprocess;
use crate::types::{
    AnalysisMetadata, Dimensions, PipelineError, RgbaImage, SignatureAnalysis, TraceConfig,
};
use crate::walker::walk_strokes;

/// Source of timestamps for stage timing.
pub trait Clock {
    /// Opaque point in time.
    type Instant;

    /// The current instant.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// A [`Clock`] that never advances. Every stage reports zero duration.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullClock;

impl Clock for NullClock {
    type Instant = ();

    fn now(&self) {}

    fn elapsed(&self, _since: &()) -> Duration {
        Duration::ZERO
    }
}

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

/// Diagnostics collected from a single pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Stage 0: image decoding (only when tracing from encoded bytes).
    pub decode: Option<StageDiagnostics>,
    /// Stage 1: downsampling to the working resolution.
    pub downsample: StageDiagnostics,
    /// Stage 2: ink classification and despeckling.
    pub mask: StageDiagnostics,
    /// Stage 3: centerline walk.
    pub walk: StageDiagnostics,
    /// Stage 4: writing-order reconstruction.
    pub order: StageDiagnostics,
    /// Stage 5: merge / smooth / simplify / validate.
    pub cleanup: StageDiagnostics,
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
    /// Stage-specific metrics (counts, sizes, etc.).
    pub metrics: StageMetrics,
}

/// Stage-specific metrics that vary by pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Image decoding metrics.
    Decode {
        /// Size of the input image bytes.
        input_bytes: usize,
        /// Decoded image width in pixels.
        width: u32,
        /// Decoded image height in pixels.
        height: u32,
        /// Total pixel count (`width * height`).
        pixel_count: u64,
    },
    /// Downsampling metrics.
    Downsample {
        /// Source width in pixels.
        original_width: u32,
        /// Source height in pixels.
        original_height: u32,
        /// Processing width in pixels.
        width: u32,
        /// Processing height in pixels.
        height: u32,
        /// Filter requested by the config.
        filter: DownsampleFilter,
        /// Whether the image was actually resized.
        applied: bool,
    },
    /// Ink mask metrics.
    Mask {
        /// Ink pixels before despeckling.
        ink_pixels: usize,
        /// 4-connected ink components before despeckling.
        components: usize,
        /// Components removed as speckle.
        removed_components: usize,
        /// Pixels removed as speckle.
        removed_pixels: usize,
    },
    /// Centerline walk metrics.
    Walk {
        /// Strokes kept.
        stroke_count: usize,
        /// Walks discarded as noise.
        discarded: usize,
        /// Points across kept strokes.
        point_count: usize,
        /// Whether a walk cap was hit.
        truncated: bool,
    },
    /// Ordering metrics.
    Order {
        /// Hypothesis whose ordering was kept.
        chosen: OrderHypothesis,
        /// Score of the neutral ordering.
        neutral_score: f64,
        /// Score of the biased ordering.
        biased_score: f64,
        /// Strokes set aside as decorations.
        decorations: usize,
    },
    /// Cleanup metrics.
    Cleanup {
        /// Strokes entering cleanup.
        input_strokes: usize,
        /// Strokes surviving cleanup.
        output_strokes: usize,
        /// Fragment joins.
        merges: usize,
        /// Strokes dropped for too few points.
        dropped_short: usize,
        /// Strokes dropped by coverage validation.
        dropped_coverage: usize,
        /// Points entering cleanup.
        points_before: usize,
        /// Points after cleanup.
        points_after: usize,
    },
}

/// High-level summary counts for the entire pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Source image width in pixels.
    pub image_width: u32,
    /// Source image height in pixels.
    pub image_height: u32,
    /// Processing raster width in pixels.
    pub processing_width: u32,
    /// Processing raster height in pixels.
    pub processing_height: u32,
    /// Strokes in the final analysis.
    pub stroke_count: usize,
    /// Points in the final analysis.
    pub point_count: usize,
    /// Whether a bounded-effort cap was hit.
    pub truncated: bool,
}

impl PipelineDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Pipeline Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} (traced at {}x{})",
            self.summary.image_width,
            self.summary.image_height,
            self.summary.processing_width,
            self.summary.processing_height,
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

        let mut stages: Vec<(&str, &StageDiagnostics)> = Vec::new();
        if let Some(ref decode) = self.decode {
            stages.push(("Decode", decode));
        }
        stages.extend([
            ("Downsample", &self.downsample),
            ("Mask", &self.mask),
            ("Walk", &self.walk),
            ("Order", &self.order),
            ("Cleanup", &self.cleanup),
        ]);

        for (name, diag) in &stages {
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
            "Strokes: {}  |  Points: {}{}",
            self.summary.stroke_count,
            self.summary.point_count,
            if self.summary.truncated {
                "  |  TRUNCATED"
            } else {
                ""
            },
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
        StageMetrics::Decode {
            input_bytes,
            width,
            height,
            ..
        } => format!("{input_bytes} bytes -> {width}x{height}"),
        StageMetrics::Downsample {
            original_width,
            original_height,
            width,
            height,
            filter,
            applied,
        } => {
            if *applied {
                format!("{original_width}x{original_height} -> {width}x{height} ({filter})")
            } else {
                format!("{width}x{height} (unchanged)")
            }
        }
        StageMetrics::Mask {
            ink_pixels,
            components,
            removed_components,
            removed_pixels,
        } => format!(
            "ink={ink_pixels} components={components} speckle={removed_components} ({removed_pixels} px)",
        ),
        StageMetrics::Walk {
            stroke_count,
            discarded,
            point_count,
            truncated,
        } => format!(
            "{stroke_count} strokes, {point_count} pts, {discarded} discarded{}",
            if *truncated { ", truncated" } else { "" },
        ),
        StageMetrics::Order {
            chosen,
            neutral_score,
            biased_score,
            decorations,
        } => format!(
            "{chosen} (neutral={neutral_score:.0} biased={biased_score:.0}) decorations={decorations}",
        ),
        StageMetrics::Cleanup {
            input_strokes,
            output_strokes,
            merges,
            dropped_short,
            dropped_coverage,
            points_before,
            points_after,
        } => format!(
            "strokes {input_strokes}->{output_strokes} (merged {merges}, short {dropped_short}, coverage {dropped_coverage}) pts {points_before}->{points_after}",
        ),
    }
}

/// Time `f` on `clock`.
fn timed<C: Clock, T>(clock: &C, f: impl FnOnce() -> T) -> (T, Duration) {
    let start = clock.now();
    let value = f();
    (value, clock.elapsed(&start))
}

/// Trace an already-decoded image, collecting per-stage diagnostics.
///
/// `decode` is `None` in the returned diagnostics.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if `config` fails
/// validation and [`PipelineError::EmptyImage`] if `image` has no
/// pixels.
pub fn trace_rgba_with_diagnostics<C: Clock>(
    image: &RgbaImage,
    config: &TraceConfig,
    clock: &C,
) -> Result<(SignatureAnalysis, PipelineDiagnostics), PipelineError> {
    let total_start = clock.now();
    config.validate()?;

    let original = Dimensions {
        width: image.width(),
        height: image.height(),
    };
    if original.width == 0 || original.height == 0 {
        return Err(PipelineError::EmptyImage);
    }

    // 1. Downsample.
    let (processing, duration) = timed(clock, || {
        downsample(image, config.working_resolution, config.downsample_filter)
    });
    let applied = matches!(processing, Cow::Owned(_));
    let processed = Dimensions {
        width: processing.width(),
        height: processing.height(),
    };
    let downsample_diag = StageDiagnostics {
        duration,
        metrics: StageMetrics::Downsample {
            original_width: original.width,
            original_height: original.height,
            width: processed.width,
            height: processed.height,
            filter: config.downsample_filter,
            applied,
        },
    };

    // 2. Mask + despeckle.
    let ((mut mask, ink_pixels, despeckled), duration) = timed(clock, || {
        let mut mask = build_mask(&processing, &config.mask);
        let ink_pixels = mask.ink_count();
        let report = despeckle(&mut mask, config.mask.min_component_size);
        (mask, ink_pixels, report)
    });
    let mask_diag = StageDiagnostics {
        duration,
        metrics: StageMetrics::Mask {
            ink_pixels,
            components: despeckled.components,
            removed_components: despeckled.removed_components,
            removed_pixels: despeckled.removed_pixels,
        },
    };

    // 3. Walk.
    let (walked, duration) = timed(clock, || walk_strokes(&mut mask, &processing, &config.walk));
    let walk_diag = StageDiagnostics {
        duration,
        metrics: StageMetrics::Walk {
            stroke_count: walked.strokes.len(),
            discarded: walked.discarded,
            point_count: walked.strokes.iter().map(crate::Stroke::len).sum(),
            truncated: walked.truncated,
        },
    };

    // 4. Order.
    let (ordered, duration) = timed(clock, || order_strokes(&walked.strokes, &config.order));
    let order_diag = StageDiagnostics {
        duration,
        metrics: StageMetrics::Order {
            chosen: ordered.report.chosen,
            neutral_score: ordered.report.neutral_score,
            biased_score: ordered.report.biased_score,
            decorations: ordered.report.decorations,
        },
    };
    let chosen = ordered.report.chosen;

    // 5. Cleanup.
    let ((strokes, cleaned), duration) =
        timed(clock, || postprocess(ordered.strokes, &mask, &config.cleanup));
    let cleanup_diag = StageDiagnostics {
        duration,
        metrics: StageMetrics::Cleanup {
            input_strokes: cleaned.input_strokes,
            output_strokes: strokes.len(),
            merges: cleaned.merges,
            dropped_short: cleaned.dropped_short,
            dropped_coverage: cleaned.dropped_coverage,
            points_before: cleaned.input_points,
            points_after: cleaned.output_points,
        },
    };

    let analysis = SignatureAnalysis {
        metadata: AnalysisMetadata {
            original_size: original.to_array(),
            processing_size: processed.to_array(),
            notes: format!(
                "centerline trace at {}x{}, {} stroke(s), {chosen} order{}",
                processed.width,
                processed.height,
                strokes.len(),
                if walked.truncated {
                    ", truncated by walk limits"
                } else {
                    ""
                },
            ),
            truncated: walked.truncated,
        },
        strokes,
    };

    tracing::info!(
        width = original.width,
        height = original.height,
        strokes = analysis.strokes.len(),
        points = analysis.point_count(),
        truncated = walked.truncated,
        "traced signature"
    );

    let diagnostics = PipelineDiagnostics {
        decode: None,
        downsample: downsample_diag,
        mask: mask_diag,
        walk: walk_diag,
        order: order_diag,
        cleanup: cleanup_diag,
        total_duration: clock.elapsed(&total_start),
        summary: PipelineSummary {
            image_width: original.width,
            image_height: original.height,
            processing_width: processed.width,
            processing_height: processed.height,
            stroke_count: analysis.strokes.len(),
            point_count: analysis.point_count(),
            truncated: walked.truncated,
        },
    };

    Ok((analysis, diagnostics))
}

/// Decode and trace encoded image bytes, collecting per-stage
/// diagnostics including the decode stage.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] or
/// [`PipelineError::ImageDecode`] if the bytes cannot be decoded, plus
/// everything [`trace_rgba_with_diagnostics`] can return.
pub fn trace_bytes_with_diagnostics<C: Clock>(
    image_bytes: &[u8],
    config: &TraceConfig,
    clock: &C,
) -> Result<(SignatureAnalysis, PipelineDiagnostics), PipelineError> {
    let start = clock.now();
    let image = crate::decode::decode(image_bytes)?;
    let decode_duration = clock.elapsed(&start);
    tracing::debug!(
        bytes = image_bytes.len(),
        width = image.width(),
        height = image.height(),
        "decoded image"
    );

    let (analysis, mut diagnostics) = trace_rgba_with_diagnostics(&image, config, clock)?;
    diagnostics.decode = Some(StageDiagnostics {
        duration: decode_duration,
        metrics: StageMetrics::Decode {
            input_bytes: image_bytes.len(),
            width: image.width(),
            height: image.height(),
            pixel_count: u64::from(image.width()) * u64::from(image.height()),
        },
    });
    diagnostics.total_duration += decode_duration;

    Ok((analysis, diagnostics))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::Cell;

    use super::*;

    /// Clock that advances one millisecond per reading.
    struct TickClock(Cell<u64>);

    impl Clock for TickClock {
        type Instant = u64;

        fn now(&self) -> u64 {
            let t = self.0.get();
            self.0.set(t + 1);
            t
        }

        fn elapsed(&self, since: &u64) -> Duration {
            Duration::from_millis(self.now() - since)
        }
    }

    fn bar_image() -> RgbaImage {
        RgbaImage::from_fn(120, 40, |x, y| {
            if (10..110).contains(&x) && (17..23).contains(&y) {
                image::Rgba([0, 0, 0, 255])
            } else {
                image::Rgba([255, 255, 255, 255])
            }
        })
    }

    #[test]
    fn duration_ms_converts_correctly() {
        let d = Duration::from_millis(1234);
        let ms = duration_ms(d);
        assert!((ms - 1234.0).abs() < 0.01);
    }

    #[test]
    fn null_clock_reports_zero() {
        let (_, diag) =
            trace_rgba_with_diagnostics(&bar_image(), &TraceConfig::default(), &NullClock)
                .unwrap();
        assert_eq!(diag.total_duration, Duration::ZERO);
        assert_eq!(diag.walk.duration, Duration::ZERO);
    }

    #[test]
    fn stages_are_timed_with_the_given_clock() {
        let clock = TickClock(Cell::new(0));
        let (_, diag) =
            trace_rgba_with_diagnostics(&bar_image(), &TraceConfig::default(), &clock).unwrap();
        assert!(diag.downsample.duration > Duration::ZERO);
        assert!(diag.cleanup.duration > Duration::ZERO);
        assert!(diag.total_duration >= diag.downsample.duration + diag.cleanup.duration);
    }

    #[test]
    fn summary_matches_analysis() {
        let (analysis, diag) =
            trace_rgba_with_diagnostics(&bar_image(), &TraceConfig::default(), &NullClock)
                .unwrap();
        assert_eq!(diag.summary.stroke_count, analysis.strokes.len());
        assert_eq!(diag.summary.point_count, analysis.point_count());
        assert_eq!(diag.summary.image_width, 120);
        assert!(diag.decode.is_none());
        assert!(matches!(
            diag.mask.metrics,
            StageMetrics::Mask { ink_pixels: 600, removed_pixels: 0, .. }
        ));
    }

    #[test]
    fn bytes_entry_point_records_decode() {
        let img = bar_image();
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgba8,
        )
        .unwrap();

        let (_, diag) =
            trace_bytes_with_diagnostics(&buf, &TraceConfig::default(), &NullClock).unwrap();
        assert!(matches!(
            diag.decode,
            Some(StageDiagnostics {
                metrics: StageMetrics::Decode { width: 120, height: 40, .. },
                ..
            })
        ));
    }

    #[test]
    fn report_lists_every_stage() {
        let (_, diag) =
            trace_rgba_with_diagnostics(&bar_image(), &TraceConfig::default(), &NullClock)
                .unwrap();
        let report = diag.report();
        assert!(report.contains("Pipeline Diagnostics Report"));
        for stage in ["Downsample", "Mask", "Walk", "Order", "Cleanup"] {
            assert!(report.contains(stage), "missing {stage} in:\n{report}");
        }
        assert!(!report.contains("Decode"));
    }

    #[test]
    fn diagnostics_serialize_durations_as_seconds() {
        let clock = TickClock(Cell::new(0));
        let (_, diag) =
            trace_rgba_with_diagnostics(&bar_image(), &TraceConfig::default(), &clock).unwrap();
        let json = serde_json::to_value(&diag).unwrap();
        assert!(json["walk"]["duration"].is_f64());
        let back: PipelineDiagnostics = serde_json::from_value(json).unwrap();
        let drift = back.walk.duration.as_secs_f64() - diag.walk.duration.as_secs_f64();
        assert!(drift.abs() < 1e-9);
    }
}
