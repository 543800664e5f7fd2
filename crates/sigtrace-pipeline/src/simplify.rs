//! Pointwise deviation simplification.
//!
//! A single forward pass in the spirit of Ramer-Douglas-Peucker: each
//! interior point is compared against the chord from the last point that
//! was kept to the next raw point, and survives only if it deviates from
//! that chord by more than the threshold. Unlike RDP there is no
//! recursion, so the cost is linear and the result depends only on local
//! geometry.
//!
//! Thresholds are squared distances in normalized units, matching the
//! post-processor's other squared-distance knobs.

use crate::types::{Point, RawPoint, Stroke};

/// Simplify a stroke, keeping interior points whose squared deviation
/// from the chord (last kept point → next raw point) exceeds
/// `threshold_sq`.
///
/// The first and last points are always kept. Strokes with fewer than
/// 3 points are returned unchanged. Thickness and opacity travel with
/// the points that survive.
#[must_use = "returns the simplified stroke"]
pub fn simplify(stroke: &Stroke, threshold_sq: f64) -> Stroke {
    let points = stroke.points();
    let (Some(&first), Some(&last)) = (points.first(), points.last()) else {
        return stroke.clone();
    };
    if points.len() < 3 {
        return stroke.clone();
    }

    let mut kept: Vec<RawPoint> = Vec::with_capacity(points.len());
    kept.push(first);

    for window in points.windows(3) {
        let anchor = kept.last().map_or(first, |p| *p).position();
        let candidate = window[1];
        let next = window[2].position();
        if deviation_squared(candidate.position(), anchor, next) > threshold_sq {
            kept.push(candidate);
        }
    }

    kept.push(last);
    Stroke::new(kept)
}

/// Squared perpendicular distance from `p` to the line through `a` and
/// `b`, via the doubled triangle area.
///
/// When `a` and `b` coincide, returns the squared distance from `p` to
/// `a`.
pub(crate) fn deviation_squared(p: Point, a: Point, b: Point) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let length_sq = dx.mul_add(dx, dy * dy);

    if length_sq == 0.0 {
        return p.distance_squared(a);
    }

    let area2 = dx.mul_add(p.y - a.y, -(dy * (p.x - a.x)));
    area2 * area2 / length_sq
}
