//! sigtrace-motion: timed pen motion for traced signatures (sans-IO).
//!
//! Turns the ordered, normalized strokes of a
//! [`SignatureAnalysis`](sigtrace_pipeline::SignatureAnalysis) into
//! [`StrokePath`]s on a concrete canvas: pixel positions, line widths,
//! opacities and absolute timestamps an external renderer can replay.
//!
//! Planning is a pure function of the analysis, the canvas size and a
//! [`ResolvedStyle`]; nothing is shared between calls.

pub mod planner;
pub mod rescale;
pub mod style;

pub use planner::{PhysicsPoint, StrokePath, plan};
pub use rescale::{natural_duration, rescale_to_duration};
pub use style::{HandwritingStyle, ResolvedStyle, StylePreset};

use sigtrace_pipeline::SignatureAnalysis;

/// Errors that can occur while planning motion.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MotionError {
    /// The target canvas has no area.
    #[error("canvas must be at least 1x1 pixels, got {width}x{height}")]
    InvalidCanvas {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },
}

/// Plan motion with an optional, unresolved style.
///
/// Absent style means every default applies.
///
/// # Errors
///
/// Returns [`MotionError::InvalidCanvas`] if either dimension is zero.
pub fn plan_with_style(
    analysis: &SignatureAnalysis,
    width: u32,
    height: u32,
    style: Option<&HandwritingStyle>,
) -> Result<Vec<StrokePath>, MotionError> {
    let resolved = style.map(HandwritingStyle::resolve).unwrap_or_default();
    plan(analysis, width, height, &resolved)
}
