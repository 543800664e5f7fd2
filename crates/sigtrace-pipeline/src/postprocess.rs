//! Stroke cleanup after ordering.
//!
//! The walker produces noisy, fragmented centerlines. This module runs a
//! fixed sequence over the ordered stroke list:
//!
//! 1. [`merge`] fragments whose end and next start nearly touch
//! 2. [`smooth`] with a 3-tap weighted average, anchors untouched
//! 3. [`dedup`] near-coincident consecutive points
//! 4. [`keep_on_ink`] drops interior points that drifted off the ink
//! 5. [`remove_jitter`] drops short zig-zag spikes
//! 6. [`simplify`](crate::simplify::simplify) with the pointwise reducer
//! 7. [`coverage`] rejects strokes that no longer follow the ink
//!
//! A stroke that falls below `min_points` after any of steps 1–5 is
//! discarded. All distances are in normalized `0..=10000` units except
//! the coverage step, which is in processing pixels.

use serde::{Deserialize, Serialize};

use crate::mask::InkMask;
use crate::simplify::simplify;
use crate::types::{NORMALIZED_MAX, Point, RawPoint, Stroke, to_normalized_unit};

/// Cleanup thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupConfig {
    /// Consecutive strokes are joined when the gap between them is below
    /// this distance.
    pub merge_distance: f64,

    /// Weights of the previous, current and next point in the smoothing
    /// average.
    pub smoothing_weights: [f64; 3],

    /// Consecutive points closer than this squared distance are dropped.
    pub dedup_distance_sq: f64,

    /// Half-size, in processing pixels, of the square an interior point
    /// must find ink in to survive.
    pub on_ink_radius: u32,

    /// Segments shorter than this can form a jitter spike.
    pub jitter_segment_length: f64,

    /// Number of jitter-removal passes.
    pub jitter_passes: u32,

    /// Squared deviation above which the simplifier keeps a point.
    pub simplify_deviation_sq: f64,

    /// Sampling step along a stroke's segments, in processing pixels.
    pub coverage_step_px: f64,

    /// Minimum fraction of samples that must land on ink.
    pub min_coverage: f64,

    /// Strokes with fewer points than this are discarded.
    pub min_points: usize,
}

impl CleanupConfig {
    /// Default merge distance.
    pub const DEFAULT_MERGE_DISTANCE: f64 = 300.0;
    /// Default smoothing weights.
    pub const DEFAULT_SMOOTHING_WEIGHTS: [f64; 3] = [0.1, 0.8, 0.1];
    /// Default dedup threshold (squared).
    pub const DEFAULT_DEDUP_DISTANCE_SQ: f64 = 100.0;
    /// Default on-ink neighbourhood half-size.
    pub const DEFAULT_ON_INK_RADIUS: u32 = 2;
    /// Default jitter segment length.
    pub const DEFAULT_JITTER_SEGMENT_LENGTH: f64 = 50.0;
    /// Default number of jitter passes.
    pub const DEFAULT_JITTER_PASSES: u32 = 2;
    /// Default simplification threshold (squared).
    pub const DEFAULT_SIMPLIFY_DEVIATION_SQ: f64 = 30.0;
    /// Default coverage sampling step.
    pub const DEFAULT_COVERAGE_STEP_PX: f64 = 1.0;
    /// Default minimum coverage.
    pub const DEFAULT_MIN_COVERAGE: f64 = 0.55;
    /// Default minimum point count.
    pub const DEFAULT_MIN_POINTS: usize = 3;
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            merge_distance: Self::DEFAULT_MERGE_DISTANCE,
            smoothing_weights: Self::DEFAULT_SMOOTHING_WEIGHTS,
            dedup_distance_sq: Self::DEFAULT_DEDUP_DISTANCE_SQ,
            on_ink_radius: Self::DEFAULT_ON_INK_RADIUS,
            jitter_segment_length: Self::DEFAULT_JITTER_SEGMENT_LENGTH,
            jitter_passes: Self::DEFAULT_JITTER_PASSES,
            simplify_deviation_sq: Self::DEFAULT_SIMPLIFY_DEVIATION_SQ,
            coverage_step_px: Self::DEFAULT_COVERAGE_STEP_PX,
            min_coverage: Self::DEFAULT_MIN_COVERAGE,
            min_points: Self::DEFAULT_MIN_POINTS,
        }
    }
}

/// Counts produced by [`postprocess`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PostProcessReport {
    /// Strokes entering cleanup.
    pub input_strokes: usize,
    /// Joins performed by the merge step.
    pub merges: usize,
    /// Strokes discarded for having too few points.
    pub dropped_short: usize,
    /// Strokes discarded by coverage validation.
    pub dropped_coverage: usize,
    /// Points entering cleanup.
    pub input_points: usize,
    /// Points in the surviving strokes.
    pub output_points: usize,
}

/// Join consecutive strokes whose end-to-start gap is below
/// `max_distance`. Empty strokes are dropped.
///
/// Returns the merged list and the number of joins.
#[must_use]
pub fn merge(strokes: Vec<Stroke>, max_distance: f64) -> (Vec<Stroke>, usize) {
    let mut merged: Vec<Vec<RawPoint>> = Vec::with_capacity(strokes.len());
    let mut joins = 0;

    for stroke in strokes.into_iter().filter(|s| !s.is_empty()) {
        let points = stroke.into_points();
        let touches = merged
            .last()
            .and_then(|current| current.last())
            .zip(points.first())
            .is_some_and(|(end, start)| end.distance(*start) < max_distance);

        if let (true, Some(current)) = (touches, merged.last_mut()) {
            current.extend(points);
            joins += 1;
        } else {
            merged.push(points);
        }
    }

    (merged.into_iter().map(Stroke::new).collect(), joins)
}

/// Weighted 3-tap average over position, thickness and opacity.
///
/// The first and last points are untouched. Thickness and opacity are
/// averaged only where all three taps carry them.
#[must_use]
pub fn smooth(stroke: &Stroke, weights: [f64; 3]) -> Stroke {
    let points = stroke.points();
    if points.len() < 3 {
        return stroke.clone();
    }

    let [wp, wc, wn] = weights;
    let mix = |p: f64, c: f64, n: f64| wp.mul_add(p, wc.mul_add(c, wn * n));

    let mut out = Vec::with_capacity(points.len());
    out.extend(points.first().copied());
    for w in points.windows(3) {
        let (p, c, n) = (w[0], w[1], w[2]);
        let mut point = RawPoint::from_normalized(
            mix(f64::from(p.x), f64::from(c.x), f64::from(n.x)),
            mix(f64::from(p.y), f64::from(c.y), f64::from(n.y)),
        );
        point.z = match (p.z, c.z, n.z) {
            (Some(pz), Some(cz), Some(nz)) => Some(to_normalized_unit(mix(
                f64::from(pz),
                f64::from(cz),
                f64::from(nz),
            ))),
            _ => c.z,
        };
        point.a = match (p.a, c.a, n.a) {
            (Some(pa), Some(ca), Some(na)) => Some(mix(pa, ca, na).clamp(0.0, 1.0)),
            _ => c.a,
        };
        out.push(point);
    }
    out.extend(points.last().copied());
    Stroke::new(out)
}

/// Drop points closer than `min_distance_sq` (squared) to the last kept
/// point.
#[must_use]
pub fn dedup(stroke: &Stroke, min_distance_sq: f64) -> Stroke {
    let mut kept: Vec<RawPoint> = Vec::with_capacity(stroke.len());
    for &p in stroke.points() {
        if kept
            .last()
            .is_none_or(|last| last.distance_squared(p) >= min_distance_sq)
        {
            kept.push(p);
        }
    }
    Stroke::new(kept)
}

/// Position of a normalized point on the mask's pixel grid, with pixel
/// centres at integer coordinates.
fn to_pixel(p: RawPoint, mask: &InkMask) -> Point {
    let max = f64::from(NORMALIZED_MAX);
    Point::new(
        f64::from(p.x) / max * f64::from(mask.width()) - 0.5,
        f64::from(p.y) / max * f64::from(mask.height()) - 0.5,
    )
}

#[allow(clippy::cast_possible_truncation)]
fn nearest_cell(p: Point) -> (i64, i64) {
    (p.x.round() as i64, p.y.round() as i64)
}

/// Drop interior points with no ink within `radius` cells; endpoints are
/// kept regardless.
#[must_use]
pub fn keep_on_ink(stroke: &Stroke, mask: &InkMask, radius: u32) -> Stroke {
    let points = stroke.points();
    let last = points.len().saturating_sub(1);
    let radius = i64::from(radius);
    Stroke::new(
        points
            .iter()
            .enumerate()
            .filter(|&(i, &p)| {
                if i == 0 || i == last {
                    return true;
                }
                let (x, y) = nearest_cell(to_pixel(p, mask));
                mask.has_ink_near(x, y, radius)
            })
            .map(|(_, &p)| p)
            .collect(),
    )
}

/// Remove short spikes: an interior point is dropped when both of its
/// segments are shorter than `max_segment` and they point in opposing
/// directions. The previous segment starts at the last kept point.
#[must_use]
pub fn remove_jitter(stroke: &Stroke, max_segment: f64, passes: u32) -> Stroke {
    let mut current = stroke.clone();
    for _ in 0..passes {
        let points = current.points();
        let (Some(&first), Some(&last)) = (points.first(), points.last()) else {
            break;
        };
        if points.len() < 3 {
            break;
        }

        let mut kept: Vec<RawPoint> = Vec::with_capacity(points.len());
        kept.push(first);
        for w in points.windows(3) {
            let prev = kept.last().map_or(first, |p| *p).position();
            let (cur, next) = (w[1].position(), w[2].position());
            let (ax, ay) = (cur.x - prev.x, cur.y - prev.y);
            let (bx, by) = (next.x - cur.x, next.y - cur.y);

            let spike = prev.distance(cur) < max_segment
                && cur.distance(next) < max_segment
                && ax.mul_add(bx, ay * by) < 0.0;
            if !spike {
                kept.push(w[1]);
            }
        }
        kept.push(last);
        current = Stroke::new(kept);
    }
    current
}

/// Fraction of samples along the stroke's segments whose 3×3
/// neighbourhood contains ink. Samples are `step_px` apart in
/// processing pixels and include both ends of every segment.
#[must_use]
pub fn coverage(stroke: &Stroke, mask: &InkMask, step_px: f64) -> f64 {
    let pixels: Vec<Point> = stroke.points().iter().map(|&p| to_pixel(p, mask)).collect();

    let mut samples: Vec<Point> = Vec::new();
    for w in pixels.windows(2) {
        let (a, b) = (w[0], w[1]);
        let length = a.distance(b);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let steps = (length / step_px).ceil().max(1.0) as u32;
        samples.extend((0..steps).map(|k| {
            let t = f64::from(k) / f64::from(steps);
            Point::new(t.mul_add(b.x - a.x, a.x), t.mul_add(b.y - a.y, a.y))
        }));
    }
    samples.extend(pixels.last().copied());

    if samples.is_empty() {
        return 0.0;
    }
    let hits = samples
        .iter()
        .filter(|&&p| {
            let (x, y) = nearest_cell(p);
            mask.has_ink_near(x, y, 1)
        })
        .count();

    #[allow(clippy::cast_precision_loss)]
    let ratio = hits as f64 / samples.len() as f64;
    ratio
}

/// Run the full cleanup sequence over an ordered stroke list.
///
/// `mask` is the ink mask the strokes were traced from; consumed cells
/// count as ink.
#[must_use]
pub fn postprocess(
    strokes: Vec<Stroke>,
    mask: &InkMask,
    config: &CleanupConfig,
) -> (Vec<Stroke>, PostProcessReport) {
    let mut report = PostProcessReport {
        input_strokes: strokes.len(),
        input_points: strokes.iter().map(Stroke::len).sum(),
        ..PostProcessReport::default()
    };

    let (merged, merges) = merge(strokes, config.merge_distance);
    report.merges = merges;

    let long_enough = |s: &Stroke| s.len() >= config.min_points;
    let mut out = Vec::with_capacity(merged.len());

    for stroke in merged {
        let cleaned = Some(stroke)
            .filter(long_enough)
            .map(|s| smooth(&s, config.smoothing_weights))
            .filter(long_enough)
            .map(|s| dedup(&s, config.dedup_distance_sq))
            .filter(long_enough)
            .map(|s| keep_on_ink(&s, mask, config.on_ink_radius))
            .filter(long_enough)
            .map(|s| remove_jitter(&s, config.jitter_segment_length, config.jitter_passes))
            .filter(long_enough);

        let Some(cleaned) = cleaned else {
            report.dropped_short += 1;
            continue;
        };

        let simplified = simplify(&cleaned, config.simplify_deviation_sq);
        if coverage(&simplified, mask, config.coverage_step_px) < config.min_coverage {
            report.dropped_coverage += 1;
            continue;
        }
        out.push(simplified);
    }

    report.output_points = out.iter().map(Stroke::len).sum();
    tracing::debug!(
        input = report.input_strokes,
        output = out.len(),
        merges = report.merges,
        dropped_short = report.dropped_short,
        dropped_coverage = report.dropped_coverage,
        "cleaned strokes"
    );

    (out, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mask::Cell;

    fn stroke(points: &[(u16, u16)]) -> Stroke {
        Stroke::new(points.iter().map(|&(x, y)| RawPoint::new(x, y)).collect())
    }

    /// 100×100 mask with a horizontal ink band on rows 40..=45, x 10..=89.
    fn band_mask() -> InkMask {
        InkMask::from_fn(100, 100, |x, y| {
            if (10..90).contains(&x) && (40..46).contains(&y) {
                Cell::Ink
            } else {
                Cell::Background
            }
        })
    }

    /// Normalized coordinate of pixel centre `px` on a 100-pixel axis.
    fn norm(px: u16) -> u16 {
        px * 100 + 50
    }

    // --- merge ---

    #[test]
    fn merge_joins_close_fragments() {
        let strokes = vec![
            stroke(&[(0, 0), (1000, 0)]),
            stroke(&[(1200, 0), (2000, 0)]),
            stroke(&[(2400, 0), (3000, 0)]),
        ];
        let (merged, joins) = merge(strokes, 300.0);
        assert_eq!(joins, 1);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].len(), 4);
        assert_eq!(merged[1], stroke(&[(2400, 0), (3000, 0)]));
    }

    #[test]
    fn merge_threshold_is_exclusive() {
        let strokes = vec![stroke(&[(0, 0), (1000, 0)]), stroke(&[(1300, 0), (2000, 0)])];
        let (merged, joins) = merge(strokes, 300.0);
        assert_eq!(joins, 0);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn merge_skips_empty_strokes() {
        let strokes = vec![Stroke::new(vec![]), stroke(&[(0, 0), (10, 0)])];
        let (merged, _) = merge(strokes, 300.0);
        assert_eq!(merged.len(), 1);
    }

    // --- smooth ---

    #[test]
    fn smooth_keeps_anchors_and_averages_interior() {
        let s = stroke(&[(0, 0), (100, 100), (200, 0)]);
        let result = smooth(&s, CleanupConfig::DEFAULT_SMOOTHING_WEIGHTS);
        assert_eq!(result.first(), s.first());
        assert_eq!(result.last(), s.last());
        assert_eq!(result.points()[1], RawPoint::new(100, 80));
    }

    #[test]
    fn smooth_averages_thickness_only_when_all_present() {
        let s = Stroke::new(vec![
            RawPoint::new(0, 0).with_thickness(100).with_opacity(1.0),
            RawPoint::new(100, 0).with_thickness(200).with_opacity(0.5),
            RawPoint::new(200, 0).with_opacity(0.0),
            RawPoint::new(300, 0).with_thickness(100).with_opacity(0.5),
        ]);
        let result = smooth(&s, CleanupConfig::DEFAULT_SMOOTHING_WEIGHTS);
        // Neighbour without z: keep own z, still average opacity.
        assert_eq!(result.points()[1].z, Some(200));
        assert!(result.points()[1].a.is_some_and(|a| (a - 0.5).abs() < 1e-9));
        assert_eq!(result.points()[2].z, None);
        assert!(result.points()[2].a.is_some_and(|a| (a - 0.1).abs() < 1e-9));
    }

    // --- dedup ---

    #[test]
    fn dedup_drops_near_coincident_points() {
        let s = stroke(&[(0, 0), (5, 5), (20, 0), (25, 0), (40, 0)]);
        let result = dedup(&s, 100.0);
        assert_eq!(result, stroke(&[(0, 0), (20, 0), (40, 0)]));
    }

    // --- keep_on_ink ---

    #[test]
    fn off_ink_interior_points_are_dropped() {
        let mask = band_mask();
        let s = stroke(&[
            (norm(5), norm(80)),
            (norm(20), norm(42)),
            (norm(30), norm(70)),
            (norm(40), norm(43)),
            (norm(95), norm(90)),
        ]);
        let result = keep_on_ink(&s, &mask, 2);
        assert_eq!(
            result,
            stroke(&[
                (norm(5), norm(80)),
                (norm(20), norm(42)),
                (norm(40), norm(43)),
                (norm(95), norm(90)),
            ])
        );
    }

    #[test]
    fn ink_within_radius_counts() {
        let mask = band_mask();
        // Row 47 is two cells below the band's last row.
        let s = stroke(&[(norm(20), norm(42)), (norm(30), norm(47)), (norm(40), norm(42))]);
        assert_eq!(keep_on_ink(&s, &mask, 2).len(), 3);
        assert_eq!(keep_on_ink(&s, &mask, 1).len(), 2);
    }

    // --- remove_jitter ---

    #[test]
    fn short_reversal_is_removed() {
        let s = stroke(&[(0, 0), (100, 0), (130, 0), (110, 0), (200, 0), (300, 0)]);
        let result = remove_jitter(&s, 50.0, 1);
        assert!(!result.points().contains(&RawPoint::new(130, 0)));
        assert_eq!(result.first(), s.first());
        assert_eq!(result.last(), s.last());
    }

    #[test]
    fn long_reversal_is_kept() {
        let s = stroke(&[(0, 0), (100, 0), (0, 10)]);
        assert_eq!(remove_jitter(&s, 50.0, 2), s);
    }

    #[test]
    fn second_pass_catches_alternating_zigzag() {
        // Dropping (140, 0) turns (130, 0) into a spike on the next pass.
        let s = stroke(&[(0, 0), (100, 0), (130, 0), (140, 0), (120, 0), (300, 0)]);
        let once = remove_jitter(&s, 50.0, 1);
        let twice = remove_jitter(&s, 50.0, 2);
        assert_eq!(once, stroke(&[(0, 0), (100, 0), (130, 0), (120, 0), (300, 0)]));
        assert_eq!(twice, stroke(&[(0, 0), (100, 0), (120, 0), (300, 0)]));
    }

    // --- coverage ---

    #[test]
    fn stroke_along_band_is_fully_covered() {
        let mask = band_mask();
        let s = stroke(&[(norm(15), norm(42)), (norm(85), norm(43))]);
        assert!((coverage(&s, &mask, 1.0) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn stroke_leaving_band_loses_coverage() {
        let mask = band_mask();
        let s = stroke(&[(norm(15), norm(42)), (norm(15), norm(95))]);
        let ratio = coverage(&s, &mask, 1.0);
        assert!(ratio < 0.55, "coverage {ratio}");
    }

    // --- postprocess ---

    #[test]
    fn straight_trace_simplifies_to_its_endpoints() {
        let mask = band_mask();
        let points: Vec<(u16, u16)> = (15..=85).step_by(5).map(|x| (norm(x), norm(42))).collect();
        let s = stroke(&points);

        let (out, report) = postprocess(vec![s], &mask, &CleanupConfig::default());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].len(), 2);
        assert_eq!(out[0].first(), Some(&RawPoint::new(norm(15), norm(42))));
        assert_eq!(out[0].last(), Some(&RawPoint::new(norm(85), norm(42))));
        assert_eq!(report.dropped_short, 0);
        assert_eq!(report.dropped_coverage, 0);
        assert_eq!(report.output_points, 2);
    }

    #[test]
    fn simplified_endpoints_match_jitter_free_endpoints() {
        let mask = band_mask();
        let config = CleanupConfig::default();
        let s = Stroke::new(
            (15..=85)
                .step_by(3)
                .map(|x| RawPoint::new(norm(x), norm(42) + (x % 2) * 40))
                .collect(),
        );

        let jitter_free = remove_jitter(
            &keep_on_ink(
                &dedup(&smooth(&s, config.smoothing_weights), config.dedup_distance_sq),
                &mask,
                config.on_ink_radius,
            ),
            config.jitter_segment_length,
            config.jitter_passes,
        );
        let (out, _) = postprocess(vec![s], &mask, &config);

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].first(), jitter_free.first());
        assert_eq!(out[0].last(), jitter_free.last());
    }

    #[test]
    fn short_strokes_are_discarded() {
        let mask = band_mask();
        let s = stroke(&[(norm(20), norm(42)), (norm(30), norm(42))]);
        let (out, report) = postprocess(vec![s], &mask, &CleanupConfig::default());
        assert!(out.is_empty());
        assert_eq!(report.dropped_short, 1);
    }

    #[test]
    fn stroke_off_the_ink_fails_coverage() {
        let mask = band_mask();
        // Endpoints survive the on-ink step; the body sits far from the band.
        let s = stroke(&[
            (norm(10), norm(10)),
            (norm(30), norm(10)),
            (norm(50), norm(12)),
            (norm(70), norm(10)),
            (norm(90), norm(10)),
        ]);
        let (out, report) = postprocess(vec![s], &mask, &CleanupConfig::default());
        assert!(out.is_empty());
        assert_eq!(report.dropped_short + report.dropped_coverage, 1);
    }

    #[test]
    fn empty_input_is_empty_output() {
        let (out, report) = postprocess(vec![], &band_mask(), &CleanupConfig::default());
        assert!(out.is_empty());
        assert_eq!(report, PostProcessReport::default());
    }
}
