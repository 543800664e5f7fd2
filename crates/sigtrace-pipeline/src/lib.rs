//! sigtrace-pipeline: signature raster to ordered strokes (sans-IO).
//!
//! Converts an image of a handwritten signature into pen strokes in a
//! plausible writing order through:
//! downsample -> ink mask -> despeckle -> centerline walk ->
//! stroke ordering -> cleanup.
//!
//! Coordinates in the result are normalized to `0..=10000` against the
//! processing raster, so the strokes can be replayed on a canvas of any
//! size. This crate has **no I/O dependencies**: it operates on in-memory
//! pixels or bytes and returns structured data.

pub mod bounded;
pub mod decode;
pub mod diagnostics;
pub mod downsample;
pub mod mask;
pub mod order;
pub mod postprocess;
pub mod simplify;
pub mod types;
pub mod walker;

pub use downsample::DownsampleFilter;
pub use mask::{Cell, InkMask, MaskConfig};
pub use order::{OrderConfig, OrderHypothesis};
pub use postprocess::CleanupConfig;
pub use types::{
    AnalysisMetadata, Dimensions, NORMALIZED_MAX, PipelineError, Point, RawPoint, RgbaImage,
    SignatureAnalysis, Stroke, TraceConfig,
};
pub use walker::WalkConfig;

use diagnostics::NullClock;

/// Trace a decoded RGBA image into a [`SignatureAnalysis`].
///
/// # Pipeline steps
///
/// 1. Downsample so the longest axis fits `working_resolution`
/// 2. Classify ink by luminance and alpha, then despeckle
/// 3. Walk ink centerlines into raw strokes
/// 4. Reconstruct writing order (decorations last)
/// 5. Merge, smooth, dedup, reproject, de-jitter, simplify, validate
///
/// An image with no ink yields an analysis with no strokes.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if `config` fails
/// validation.
/// Returns [`PipelineError::EmptyImage`] if `image` has no pixels.
pub fn trace_rgba(image: &RgbaImage, config: &TraceConfig) -> Result<SignatureAnalysis, PipelineError> {
    diagnostics::trace_rgba_with_diagnostics(image, config, &NullClock).map(|(analysis, _)| analysis)
}

/// Decode image bytes (PNG, JPEG, BMP, WebP) and trace them.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `image_bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is unrecognized.
/// Otherwise as [`trace_rgba`].
pub fn trace_bytes(image_bytes: &[u8], config: &TraceConfig) -> Result<SignatureAnalysis, PipelineError> {
    diagnostics::trace_bytes_with_diagnostics(image_bytes, config, &NullClock)
        .map(|(analysis, _)| analysis)
}
