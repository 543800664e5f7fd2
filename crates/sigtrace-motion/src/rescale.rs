//! Linear retiming of a planned timeline.
//!
//! Renderers often need an animation of a fixed length. Scaling every
//! timestamp by the same positive ratio keeps the ordering of all
//! samples intact.

use crate::planner::StrokePath;

/// The natural length of a timeline: the end time of its last path.
#[must_use]
pub fn natural_duration(paths: &[StrokePath]) -> f64 {
    paths.last().map_or(0.0, |p| p.end_time)
}

/// Scale every timestamp so the timeline lasts `target_ms`.
///
/// Returns the ratio applied, or `None` (leaving `paths` untouched) when
/// the timeline has no duration or `target_ms` is not a positive finite
/// number.
pub fn rescale_to_duration(paths: &mut [StrokePath], target_ms: f64) -> Option<f64> {
    let natural = natural_duration(paths);
    if !(natural > 0.0 && target_ms.is_finite() && target_ms > 0.0) {
        return None;
    }

    let ratio = target_ms / natural;
    for path in paths.iter_mut() {
        path.start_time *= ratio;
        path.end_time *= ratio;
        for point in &mut path.points {
            point.time *= ratio;
        }
    }
    tracing::debug!(natural_ms = natural, target_ms, ratio, "rescaled timeline");
    Some(ratio)
}
