//! Shared types for the sigtrace pipeline.

use serde::{Deserialize, Serialize};

use crate::downsample::DownsampleFilter;
use crate::mask::MaskConfig;
use crate::order::OrderConfig;
use crate::postprocess::CleanupConfig;
use crate::walker::WalkConfig;

/// Re-export `RgbaImage` so downstream crates can hand decoded pixel
/// buffers to the pipeline without depending on `image` directly.
pub use image::RgbaImage;

/// Upper bound of the resolution-independent coordinate space.
///
/// Stroke coordinates and thicknesses are expressed on a `0..=10000`
/// scale relative to the processing raster, so a traced signature can be
/// replayed on a canvas of any size.
pub const NORMALIZED_MAX: u16 = 10_000;

/// A real-valued 2D point.
///
/// Used for sub-pixel positions (walker state, raster sampling) and for
/// geometry on normalized coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    /// Horizontal position.
    pub x: f64,
    /// Vertical position.
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    ///
    /// Avoids the square root for comparison purposes.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }
}

/// One traced sample on a stroke, in normalized `0..=10000` units.
///
/// `z` (thickness, normalized against the processing width) and `a`
/// (opacity) are absent for points whose source did not measure them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawPoint {
    /// Horizontal position, normalized against the processing width.
    pub x: u16,
    /// Vertical position, normalized against the processing height.
    pub y: u16,
    /// Stroke thickness on the same normalized scale as `x`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<u16>,
    /// Ink opacity in `[0, 1]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub a: Option<f64>,
}

impl RawPoint {
    /// Create a point with no thickness or opacity.
    #[must_use]
    pub const fn new(x: u16, y: u16) -> Self {
        Self {
            x,
            y,
            z: None,
            a: None,
        }
    }

    /// Create a point from real-valued normalized coordinates, rounding
    /// and clamping them into `0..=10000`.
    #[must_use]
    pub fn from_normalized(x: f64, y: f64) -> Self {
        Self::new(to_normalized_unit(x), to_normalized_unit(y))
    }

    /// Attach a normalized thickness.
    #[must_use]
    pub const fn with_thickness(mut self, z: u16) -> Self {
        self.z = Some(z);
        self
    }

    /// Attach an opacity.
    #[must_use]
    pub const fn with_opacity(mut self, a: f64) -> Self {
        self.a = Some(a);
        self
    }

    /// The position as a real-valued [`Point`].
    #[must_use]
    pub fn position(self) -> Point {
        Point::new(f64::from(self.x), f64::from(self.y))
    }

    /// Squared distance between the positions of two points.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        self.position().distance_squared(other.position())
    }

    /// Distance between the positions of two points.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.position().distance(other.position())
    }
}

/// Round and clamp a real value into the normalized `0..=10000` range.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn to_normalized_unit(value: f64) -> u16 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, f64::from(NORMALIZED_MAX)) as u16
}

/// An ordered sequence of traced points.
///
/// A stroke is directionless until ordering assigns one; afterwards
/// `points()[0]` is where the pen lands and the last point is where it
/// lifts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Stroke(Vec<RawPoint>);

impl Stroke {
    /// Create a new stroke from a vector of points.
    #[must_use]
    pub const fn new(points: Vec<RawPoint>) -> Self {
        Self(points)
    }

    /// Returns `true` if the stroke has no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of points in the stroke.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns the first point, if any.
    #[must_use]
    pub fn first(&self) -> Option<&RawPoint> {
        self.0.first()
    }

    /// Returns the last point, if any.
    #[must_use]
    pub fn last(&self) -> Option<&RawPoint> {
        self.0.last()
    }

    /// Returns a slice of all points.
    #[must_use]
    pub fn points(&self) -> &[RawPoint] {
        &self.0
    }

    /// Consumes the stroke and returns the underlying vector of points.
    #[must_use]
    pub fn into_points(self) -> Vec<RawPoint> {
        self.0
    }

    /// Returns the same stroke traversed in the opposite direction.
    #[must_use]
    pub fn reversed(mut self) -> Self {
        self.0.reverse();
        self
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// `[width, height]` pair as stored in [`AnalysisMetadata`].
    #[must_use]
    pub const fn to_array(self) -> [u32; 2] {
        [self.width, self.height]
    }
}

/// Provenance attached to a [`SignatureAnalysis`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    /// Size of the decoded source image, `[width, height]`.
    pub original_size: [u32; 2],

    /// Size of the raster the strokes were traced on, `[width, height]`.
    ///
    /// Differs from `original_size` when the source was downsampled to
    /// the working resolution.
    #[serde(default)]
    pub processing_size: [u32; 2],

    /// Free-text provenance. Not machine-parsed.
    pub notes: String,

    /// `true` when a bounded-effort cap stopped the walker early, so
    /// some ink may not be represented in `strokes`.
    #[serde(default)]
    pub truncated: bool,
}

/// The traced, ordered and cleaned strokes of one signature image.
///
/// An empty `strokes` list is a valid result: the image held no ink (or
/// every fragment was rejected as noise).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureAnalysis {
    /// Strokes in writing order.
    pub strokes: Vec<Stroke>,
    /// Source sizes and provenance.
    pub metadata: AnalysisMetadata,
}

impl SignatureAnalysis {
    /// Total number of points across all strokes.
    #[must_use]
    pub fn point_count(&self) -> usize {
        self.strokes.iter().map(Stroke::len).sum()
    }
}

/// Configuration for the tracing pipeline.
///
/// Every tuned threshold lives here (grouped per stage) so callers can
/// override it per run. Defaults suit scans of dark ink on light paper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    /// Longest axis, in pixels, of the raster the walker runs on. Larger
    /// sources are downsampled before masking.
    pub working_resolution: u32,

    /// Resampling filter used when downsampling.
    pub downsample_filter: DownsampleFilter,

    /// Ink classification and despeckling.
    pub mask: MaskConfig,

    /// Centerline walk.
    pub walk: WalkConfig,

    /// Writing-order reconstruction.
    pub order: OrderConfig,

    /// Merge / smooth / simplify / validate.
    pub cleanup: CleanupConfig,
}

impl TraceConfig {
    /// Default working resolution (longest axis in pixels).
    pub const DEFAULT_WORKING_RESOLUTION: u32 = 800;

    /// Default resampling filter for downsampling.
    pub const DEFAULT_DOWNSAMPLE_FILTER: DownsampleFilter = DownsampleFilter::Triangle;

    /// Check the invariants the pipeline relies on.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] naming the first
    /// offending field.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.working_resolution == 0 {
            return Err(PipelineError::InvalidConfig(
                "working_resolution must be at least 1".to_string(),
            ));
        }
        if !(self.walk.pen_radius.is_finite() && self.walk.pen_radius > 0.0) {
            return Err(PipelineError::InvalidConfig(
                "walk.pen_radius must be a positive number".to_string(),
            ));
        }
        if !(self.walk.search_radius.is_finite() && self.walk.search_radius > 0.0) {
            return Err(PipelineError::InvalidConfig(
                "walk.search_radius must be a positive number".to_string(),
            ));
        }
        if !(self.cleanup.coverage_step_px.is_finite() && self.cleanup.coverage_step_px > 0.0) {
            return Err(PipelineError::InvalidConfig(
                "cleanup.coverage_step_px must be a positive number".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.cleanup.min_coverage) {
            return Err(PipelineError::InvalidConfig(
                "cleanup.min_coverage must be within 0.0..=1.0".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            working_resolution: Self::DEFAULT_WORKING_RESOLUTION,
            downsample_filter: Self::DEFAULT_DOWNSAMPLE_FILTER,
            mask: MaskConfig::default(),
            walk: WalkConfig::default(),
            order: OrderConfig::default(),
            cleanup: CleanupConfig::default(),
        }
    }
}

/// Errors that can occur during pipeline processing.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// The decoded raster has no pixels.
    #[error("image has zero width or height")]
    EmptyImage,

    /// Pipeline configuration is invalid.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),
}
