//! Motion planning: normalized strokes to timed canvas paths.
//!
//! A single running clock advances across all strokes in writing order.
//! Within a stroke every segment costs time proportional to its length,
//! slowed by sharp turns when the style has inertia. Between strokes a
//! long jump costs a pen lift. Tremor, when enabled, displaces each
//! emitted point by a small oscillation of its own timestamp.

use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};
use sigtrace_pipeline::{NORMALIZED_MAX, RawPoint, SignatureAnalysis, Stroke};

use crate::MotionError;
use crate::style::ResolvedStyle;

/// Jumps longer than this, in pixels, lift the pen.
pub const PEN_LIFT_THRESHOLD_PX: f64 = 30.0;
/// Lift travel time per pixel of jump.
pub const PEN_LIFT_MS_PER_PX: f64 = 0.5;
/// Cap on lift travel time.
pub const PEN_LIFT_MAX_TRAVEL_MS: f64 = 250.0;
/// Fixed lift-and-land time added to every pen lift.
pub const PEN_LIFT_SETTLE_MS: f64 = 50.0;
/// Floor on the duration of any segment.
pub const MIN_SEGMENT_MS: f64 = 0.01;
/// Consecutive points closer than this squared distance are merged.
pub const MIN_POINT_SPACING_SQ_PX: f64 = 0.1;

/// One timed sample of the pen on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicsPoint {
    /// Horizontal canvas position in pixels.
    pub x: f64,
    /// Vertical canvas position in pixels.
    pub y: f64,
    /// Absolute time in milliseconds since the first stroke began.
    pub time: f64,
    /// Line width in pixels.
    pub line_width: f64,
    /// Opacity in `[0, 1]`.
    pub opacity: f64,
}

/// The timed trajectory of one stroke.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrokePath {
    /// Index of the path in drawing order.
    pub id: usize,
    /// Samples in drawing order. Never empty.
    pub points: Vec<PhysicsPoint>,
    /// Time of the first sample.
    pub start_time: f64,
    /// Time of the last sample.
    pub end_time: f64,
}

/// A stroke point mapped onto the canvas, before timing.
#[derive(Debug, Clone, Copy, PartialEq)]
struct CanvasPoint {
    x: f64,
    y: f64,
    line_width: f64,
    opacity: f64,
}

impl CanvasPoint {
    fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }
}

/// Canvas size in pixels, as floats.
#[derive(Debug, Clone, Copy)]
struct Canvas {
    width: f64,
    height: f64,
}

impl Canvas {
    fn map(self, p: RawPoint, style: &ResolvedStyle) -> CanvasPoint {
        let max = f64::from(NORMALIZED_MAX);
        CanvasPoint {
            x: f64::from(p.x) * self.width / max,
            y: f64::from(p.y) * self.height / max,
            line_width: p.z.map_or(style.fallback_line_width, |z| {
                f64::from(z) * self.width / max * style.pressure_scale
            }),
            opacity: p.a.unwrap_or(1.0).clamp(0.0, 1.0),
        }
    }
}

/// Map a stroke onto the canvas, dropping points that sit on top of the
/// previous kept point. The final point is always kept.
fn map_stroke(stroke: &Stroke, canvas: Canvas, style: &ResolvedStyle) -> Vec<CanvasPoint> {
    let Some((last, rest)) = stroke.points().split_last() else {
        return Vec::new();
    };

    let mut kept: Vec<CanvasPoint> = Vec::with_capacity(stroke.len());
    for &p in rest {
        let p = canvas.map(p, style);
        if kept
            .last()
            .is_none_or(|k| k.distance_squared(p) >= MIN_POINT_SPACING_SQ_PX)
        {
            kept.push(p);
        }
    }
    kept.push(canvas.map(*last, style));
    kept
}

/// Extra time to lift the pen and travel `gap` pixels, or zero when the
/// gap is short enough to keep the pen down.
#[must_use]
pub fn pen_lift_ms(gap: f64) -> f64 {
    if gap > PEN_LIFT_THRESHOLD_PX {
        (PEN_LIFT_MS_PER_PX * gap).min(PEN_LIFT_MAX_TRAVEL_MS) + PEN_LIFT_SETTLE_MS
    } else {
        0.0
    }
}

/// Turn angle in radians between segment `a -> b` and segment `b -> c`.
///
/// Zero when either segment is degenerate.
fn turn_angle(a: CanvasPoint, b: CanvasPoint, c: CanvasPoint) -> f64 {
    let (ux, uy) = (b.x - a.x, b.y - a.y);
    let (vx, vy) = (c.x - b.x, c.y - b.y);
    let norms = ux.hypot(uy) * vx.hypot(vy);
    if norms == 0.0 {
        return 0.0;
    }
    (ux.mul_add(vx, uy * vy) / norms).clamp(-1.0, 1.0).acos()
}

/// Time to draw one segment of length `distance` after turning `angle`.
fn segment_ms(distance: f64, angle: f64, style: &ResolvedStyle) -> f64 {
    let penalty = angle.mul_add(style.inertia_factor, 1.0);
    (distance * style.base_ms_per_px * penalty).max(MIN_SEGMENT_MS)
}

/// Tremor displacement at `time` milliseconds.
fn tremor(time: f64, style: &ResolvedStyle) -> (f64, f64) {
    if !style.has_tremor() {
        return (0.0, 0.0);
    }
    let phase = TAU * style.micro_tremor_freq_hz * time / 1000.0;
    (
        style.micro_tremor_amp_px * phase.sin(),
        style.micro_tremor_amp_px * phase.cos(),
    )
}

/// Plan the timed pen motion for `analysis` on a `width × height`
/// canvas.
///
/// Strokes are taken in the analysis' order; strokes with no points are
/// skipped, so path ids are dense. Times are absolute, start at zero,
/// and never decrease across the whole result.
///
/// # Errors
///
/// Returns [`MotionError::InvalidCanvas`] if either dimension is zero.
pub fn plan(
    analysis: &SignatureAnalysis,
    width: u32,
    height: u32,
    style: &ResolvedStyle,
) -> Result<Vec<StrokePath>, MotionError> {
    if width == 0 || height == 0 {
        return Err(MotionError::InvalidCanvas { width, height });
    }
    let canvas = Canvas {
        width: f64::from(width),
        height: f64::from(height),
    };

    let mut clock = 0.0;
    let mut pen_at: Option<CanvasPoint> = None;
    let mut paths: Vec<StrokePath> = Vec::with_capacity(analysis.strokes.len());
    let mut lifts = 0usize;

    for stroke in &analysis.strokes {
        let mapped = map_stroke(stroke, canvas, style);
        let (Some(&first), Some(&last)) = (mapped.first(), mapped.last()) else {
            continue;
        };

        if let Some(prev) = pen_at {
            let lift = pen_lift_ms(prev.distance(first));
            if lift > 0.0 {
                lifts += 1;
            }
            clock += lift;
        }

        let mut points = Vec::with_capacity(mapped.len());
        for (i, &p) in mapped.iter().enumerate() {
            if i > 0 {
                let angle = if i > 1 {
                    turn_angle(mapped[i - 2], mapped[i - 1], p)
                } else {
                    0.0
                };
                clock += segment_ms(mapped[i - 1].distance(p), angle, style);
            }
            let (dx, dy) = tremor(clock, style);
            points.push(PhysicsPoint {
                x: p.x + dx,
                y: p.y + dy,
                time: clock,
                line_width: p.line_width,
                opacity: p.opacity,
            });
        }

        let start_time = points.first().map_or(clock, |p| p.time);
        paths.push(StrokePath {
            id: paths.len(),
            points,
            start_time,
            end_time: clock,
        });
        pen_at = Some(last);
    }

    tracing::debug!(
        paths = paths.len(),
        pen_lifts = lifts,
        duration_ms = clock,
        "planned pen motion"
    );
    Ok(paths)
}
