//! Stroke walker: trace ink centerlines by dragging a virtual pen.
//!
//! Seeds are found in raster order. From each seed the pen follows the
//! centre of mass of nearby untraced ink, consuming ink under its nib as
//! it goes so it cannot retrace itself. Each step records a
//! [`RawPoint`] with the local stroke thickness (shortest of four axis
//! rays to the ink edge, doubled) and the ink opacity under the pen.
//!
//! Both the seed loop and the per-stroke step loop are [`Bounded`], so a
//! pathological mask stops early instead of spinning; the outcome
//! reports whether that happened.

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::bounded::BoundedExt;
use crate::mask::{Cell, InkMask};
use crate::types::{NORMALIZED_MAX, Point, RawPoint, Stroke, to_normalized_unit};

/// Centerline walk parameters. Radii are in processing pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkConfig {
    /// Radius of the disk of ink consumed around the pen at each step.
    pub pen_radius: f64,

    /// Radius around the current pixel in which untraced ink pulls the
    /// pen forward.
    pub search_radius: f64,

    /// Strokes with fewer points than this are discarded as noise.
    pub min_points: usize,

    /// Cap on the number of seeds walked per image.
    pub max_strokes: usize,

    /// Cap on the number of steps walked per stroke.
    pub max_steps_per_stroke: usize,
}

impl WalkConfig {
    /// Default pen radius in pixels.
    pub const DEFAULT_PEN_RADIUS: f64 = 4.0;
    /// Default search radius in pixels.
    pub const DEFAULT_SEARCH_RADIUS: f64 = 6.0;
    /// Strokes of three points or fewer are noise.
    pub const DEFAULT_MIN_POINTS: usize = 4;
    /// Default seed cap.
    pub const DEFAULT_MAX_STROKES: usize = 4096;
    /// Default step cap.
    pub const DEFAULT_MAX_STEPS_PER_STROKE: usize = 10_000;
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            pen_radius: Self::DEFAULT_PEN_RADIUS,
            search_radius: Self::DEFAULT_SEARCH_RADIUS,
            min_points: Self::DEFAULT_MIN_POINTS,
            max_strokes: Self::DEFAULT_MAX_STROKES,
            max_steps_per_stroke: Self::DEFAULT_MAX_STEPS_PER_STROKE,
        }
    }
}

/// Result of walking a whole mask.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WalkOutcome {
    /// Raw strokes in seed (raster-scan) order.
    pub strokes: Vec<Stroke>,
    /// Walks discarded for having too few points.
    pub discarded: usize,
    /// Whether either loop cap was hit.
    pub truncated: bool,
}

/// A single walk before the noise filter.
struct Trace {
    points: Vec<RawPoint>,
    truncated: bool,
}

/// Walk every untraced ink cell of `mask`, consuming it.
///
/// `image` is the RGBA raster the mask was built from; it is sampled
/// for opacity and must have the mask's dimensions. On return every
/// reachable ink cell is [`Cell::Consumed`] unless a cap was hit.
pub fn walk_strokes(mask: &mut InkMask, image: &RgbaImage, config: &WalkConfig) -> WalkOutcome {
    let mut outcome = WalkOutcome::default();
    let mut cursor = 0usize;

    let mut traces = std::iter::from_fn(|| {
        let (index, x, y) = mask.next_unconsumed(cursor)?;
        // Nothing before `index` can turn back into untraced ink.
        cursor = index;
        Some(walk_one(mask, image, config, x, y))
    })
    .bounded(config.max_strokes);

    for trace in traces.by_ref() {
        outcome.truncated |= trace.truncated;
        if trace.points.len() < config.min_points {
            outcome.discarded += 1;
            continue;
        }
        outcome.strokes.push(Stroke::new(trace.points));
    }
    let cap_reached = traces.cap_reached();
    outcome.truncated |= cap_reached && mask.next_unconsumed(cursor).is_some();

    tracing::debug!(
        strokes = outcome.strokes.len(),
        discarded = outcome.discarded,
        truncated = outcome.truncated,
        "walked ink mask"
    );
    outcome
}

/// Walk one stroke starting from the seed cell `(seed_x, seed_y)`.
fn walk_one(
    mask: &mut InkMask,
    image: &RgbaImage,
    config: &WalkConfig,
    seed_x: i64,
    seed_y: i64,
) -> Trace {
    #[allow(clippy::cast_precision_loss)]
    let seed = Point::new(seed_x as f64, seed_y as f64);
    let start = ink_centroid(mask, seed_x, seed_y, config.search_radius).unwrap_or(seed);
    mask.set(seed_x, seed_y, Cell::Consumed);

    let mut position = Some(start);
    let mut steps = std::iter::from_fn(|| {
        let pos = position?;
        let point = sample_point(mask, image, pos);

        if consume_disk(mask, pos, config.pen_radius) == 0 {
            // The centroid can land in a hole (e.g. the middle of a small
            // loop); take the nearest cell so every step makes progress.
            consume_nearest(mask, pos, config.search_radius);
        }

        let (ix, iy) = nearest_pixel(pos);
        position = ink_centroid(mask, ix, iy, config.search_radius);
        Some(point)
    })
    .bounded(config.max_steps_per_stroke);

    let points: Vec<RawPoint> = steps.by_ref().collect();
    let cap_reached = steps.cap_reached();
    Trace {
        points,
        truncated: cap_reached && position.is_some(),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn nearest_pixel(p: Point) -> (i64, i64) {
    (p.x.round() as i64, p.y.round() as i64)
}

/// Cell offsets within a disk of `radius` around an integer centre.
fn disk_offsets(radius: f64) -> impl Iterator<Item = (i64, i64)> {
    #[allow(clippy::cast_possible_truncation)]
    let r = radius.ceil() as i64;
    let r_sq = radius * radius;
    (-r..=r).flat_map(move |dy| {
        (-r..=r).filter_map(move |dx| {
            #[allow(clippy::cast_precision_loss)]
            let d_sq = (dx * dx + dy * dy) as f64;
            (d_sq <= r_sq).then_some((dx, dy))
        })
    })
}

/// Centroid of untraced ink within `radius` of cell `(cx, cy)`.
fn ink_centroid(mask: &InkMask, cx: i64, cy: i64, radius: f64) -> Option<Point> {
    let mut count = 0u32;
    let mut sum_x = 0i64;
    let mut sum_y = 0i64;
    for (dx, dy) in disk_offsets(radius) {
        let (x, y) = (cx + dx, cy + dy);
        if mask.get(x, y) == Cell::Ink {
            count += 1;
            sum_x += x;
            sum_y += y;
        }
    }
    if count == 0 {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    let centroid = Point::new(
        sum_x as f64 / f64::from(count),
        sum_y as f64 / f64::from(count),
    );
    Some(centroid)
}

/// Mark untraced ink within `radius` of the real-valued `center` as
/// consumed. Returns the number of cells consumed.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn consume_disk(mask: &mut InkMask, center: Point, radius: f64) -> usize {
    let r_sq = radius * radius;
    let (x0, x1) = (
        (center.x - radius).floor() as i64,
        (center.x + radius).ceil() as i64,
    );
    let (y0, y1) = (
        (center.y - radius).floor() as i64,
        (center.y + radius).ceil() as i64,
    );

    let mut consumed = 0;
    for y in y0..=y1 {
        for x in x0..=x1 {
            if mask.get(x, y) == Cell::Ink
                && center.distance_squared(Point::new(x as f64, y as f64)) <= r_sq
            {
                mask.set(x, y, Cell::Consumed);
                consumed += 1;
            }
        }
    }
    consumed
}

/// Consume the single untraced cell nearest to `center` within `radius`.
#[allow(clippy::cast_precision_loss)]
fn consume_nearest(mask: &mut InkMask, center: Point, radius: f64) {
    let (cx, cy) = nearest_pixel(center);
    let nearest = disk_offsets(radius)
        .map(|(dx, dy)| (cx + dx, cy + dy))
        .filter(|&(x, y)| mask.get(x, y) == Cell::Ink)
        .min_by(|&(ax, ay), &(bx, by)| {
            let da = center.distance_squared(Point::new(ax as f64, ay as f64));
            let db = center.distance_squared(Point::new(bx as f64, by as f64));
            da.total_cmp(&db)
        });
    if let Some((x, y)) = nearest {
        mask.set(x, y, Cell::Consumed);
    }
}

/// Distance from `pos` to the near edge of the first non-ink cell along
/// the axis direction `(dx, dy)`. Traced ink still counts as ink.
#[allow(clippy::cast_precision_loss)]
fn ray_length(mask: &InkMask, pos: Point, dx: i64, dy: i64) -> f64 {
    let (ix, iy) = nearest_pixel(pos);
    let limit = i64::from(mask.width().max(mask.height())) + 1;
    let mut k = 1;
    while k <= limit && mask.get(ix + dx * k, iy + dy * k).is_ink() {
        k += 1;
    }
    let edge = match (dx, dy) {
        (1, _) => (ix + k) as f64 - 0.5 - pos.x,
        (-1, _) => pos.x - ((ix - k) as f64 + 0.5),
        (_, 1) => (iy + k) as f64 - 0.5 - pos.y,
        _ => pos.y - ((iy - k) as f64 + 0.5),
    };
    edge.max(0.0)
}

/// Opacity of the pixel under `pos`: darker and more opaque is closer to
/// 1, never below a tenth of the alpha.
fn sample_opacity(image: &RgbaImage, pos: Point) -> f64 {
    let (ix, iy) = nearest_pixel(pos);
    let (w, h) = image.dimensions();
    let (Ok(x), Ok(y)) = (u32::try_from(ix), u32::try_from(iy)) else {
        return 0.0;
    };
    if x >= w || y >= h {
        return 0.0;
    }
    let [r, g, b, a] = image.get_pixel(x, y).0;
    let luma = 0.114f64.mul_add(
        f64::from(b),
        0.299f64.mul_add(f64::from(r), 0.587 * f64::from(g)),
    );
    let alpha = f64::from(a) / 255.0;
    let darkness = (1.0 - luma / 255.0).max(0.1);
    (alpha * darkness).clamp(0.0, 1.0)
}

/// Record the pen state at `pos` as a normalized [`RawPoint`].
fn sample_point(mask: &InkMask, image: &RgbaImage, pos: Point) -> RawPoint {
    let width = f64::from(mask.width().max(1));
    let height = f64::from(mask.height().max(1));
    let scale = f64::from(NORMALIZED_MAX);

    let shortest_ray = [(1, 0), (-1, 0), (0, 1), (0, -1)]
        .into_iter()
        .map(|(dx, dy)| ray_length(mask, pos, dx, dy))
        .fold(f64::INFINITY, f64::min);
    let thickness = 2.0 * shortest_ray;

    RawPoint::from_normalized((pos.x + 0.5) / width * scale, (pos.y + 0.5) / height * scale)
        .with_thickness(to_normalized_unit(thickness / width * scale))
        .with_opacity(sample_opacity(image, pos))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mask::{MaskConfig, build_mask};

    /// White image with black rectangles `(x0, y0, w, h)`.
    fn image_with_rects(width: u32, height: u32, rects: &[(u32, u32, u32, u32)]) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            let inside = rects
                .iter()
                .any(|&(x0, y0, w, h)| (x0..x0 + w).contains(&x) && (y0..y0 + h).contains(&y));
            if inside {
                image::Rgba([0, 0, 0, 255])
            } else {
                image::Rgba([255, 255, 255, 255])
            }
        })
    }

    fn walk(image: &RgbaImage, config: &WalkConfig) -> (WalkOutcome, InkMask) {
        let mut mask = build_mask(image, &MaskConfig::default());
        let outcome = walk_strokes(&mut mask, image, config);
        (outcome, mask)
    }

    #[test]
    fn blank_mask_yields_no_strokes() {
        let image = image_with_rects(50, 50, &[]);
        let (outcome, _) = walk(&image, &WalkConfig::default());
        assert!(outcome.strokes.is_empty());
        assert!(!outcome.truncated);
        assert_eq!(outcome.discarded, 0);
    }

    #[test]
    fn horizontal_bar_is_walked_left_to_right() {
        let image = image_with_rects(240, 60, &[(20, 27, 200, 6)]);
        let (outcome, mask) = walk(&image, &WalkConfig::default());

        assert_eq!(outcome.strokes.len(), 1);
        assert!(!outcome.truncated);
        assert_eq!(mask.unconsumed_count(), 0);

        let stroke = &outcome.strokes[0];
        assert!(stroke.len() > 20, "expected many samples, got {}", stroke.len());
        let first = stroke.first().unwrap();
        let last = stroke.last().unwrap();
        assert!(first.x < last.x);

        // Start near x=20, end near x=219 (normalized by 240).
        assert!((f64::from(first.x) - 20.5 / 240.0 * 10_000.0).abs() < 250.0);
        assert!((f64::from(last.x) - 219.5 / 240.0 * 10_000.0).abs() < 250.0);

        // Every sample stays on the bar's rows: y in 27..33 of 60.
        for p in stroke.points() {
            let y_px = f64::from(p.y) / 10_000.0 * 60.0;
            assert!((27.0..=33.0).contains(&y_px), "y={y_px}");
        }
    }

    #[test]
    fn bar_thickness_matches_bar_height() {
        let image = image_with_rects(240, 60, &[(20, 27, 200, 6)]);
        let (outcome, _) = walk(&image, &WalkConfig::default());
        let stroke = &outcome.strokes[0];

        // Interior samples measure the full 6 px height.
        let expected = 6.0 / 240.0 * 10_000.0;
        let n = stroke.len();
        for p in &stroke.points()[n / 4..3 * n / 4] {
            let z = f64::from(p.z.unwrap());
            assert!(
                (z - expected).abs() <= expected * 0.2,
                "z={z} expected≈{expected}"
            );
        }
    }

    #[test]
    fn black_ink_has_full_opacity() {
        let image = image_with_rects(100, 40, &[(10, 10, 60, 8)]);
        let (outcome, _) = walk(&image, &WalkConfig::default());
        for p in outcome.strokes[0].points() {
            assert!((p.a.unwrap() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn gray_ink_opacity_follows_luminance() {
        let image = RgbaImage::from_pixel(3, 3, image::Rgba([100, 100, 100, 255]));
        let a = sample_opacity(&image, Point::new(1.0, 1.0));
        assert!((a - (1.0 - 100.0 / 255.0)).abs() < 1e-9);
    }

    #[test]
    fn light_ink_opacity_has_floor() {
        let image = RgbaImage::from_pixel(1, 1, image::Rgba([250, 250, 250, 128]));
        let a = sample_opacity(&image, Point::new(0.0, 0.0));
        assert!((a - 0.1 * 128.0 / 255.0).abs() < 1e-9);
    }

    #[test]
    fn tiny_blob_is_discarded_as_noise() {
        let image = image_with_rects(30, 30, &[(10, 10, 3, 3)]);
        let (outcome, mask) = walk(&image, &WalkConfig::default());
        assert!(outcome.strokes.is_empty());
        assert_eq!(outcome.discarded, 1);
        assert_eq!(mask.unconsumed_count(), 0);
    }

    #[test]
    fn separate_bars_follow_raster_seed_order() {
        // The lower bar starts further left, but the upper bar is seeded
        // first because seeds are found in raster order.
        let image = image_with_rects(200, 80, &[(100, 10, 80, 5), (10, 50, 80, 5)]);
        let (outcome, _) = walk(&image, &WalkConfig::default());
        assert_eq!(outcome.strokes.len(), 2);
        assert!(outcome.strokes[0].first().unwrap().y < outcome.strokes[1].first().unwrap().y);
    }

    #[test]
    fn step_cap_marks_outcome_truncated() {
        let image = image_with_rects(240, 60, &[(20, 27, 200, 6)]);
        let config = WalkConfig {
            max_steps_per_stroke: 5,
            ..WalkConfig::default()
        };
        let (outcome, _) = walk(&image, &config);
        assert!(outcome.truncated);
        assert!(outcome.strokes.iter().all(|s| s.len() <= 5));
    }

    #[test]
    fn stroke_cap_marks_outcome_truncated() {
        let image = image_with_rects(200, 80, &[(10, 10, 80, 5), (10, 50, 80, 5)]);
        let config = WalkConfig {
            max_strokes: 1,
            ..WalkConfig::default()
        };
        let (outcome, mask) = walk(&image, &config);
        assert!(outcome.truncated);
        assert_eq!(outcome.strokes.len(), 1);
        // The second bar is left untouched.
        assert!(mask.unconsumed_count() > 300, "{}", mask.unconsumed_count());
        assert_eq!(mask.get(50, 52), Cell::Ink);
    }

    #[test]
    fn step_cap_stops_consuming_at_the_last_recorded_point() {
        let image = image_with_rects(240, 60, &[(20, 27, 200, 6)]);
        let config = WalkConfig {
            max_strokes: 1,
            max_steps_per_stroke: 5,
            ..WalkConfig::default()
        };
        let (outcome, mask) = walk(&image, &config);
        assert_eq!(outcome.strokes.len(), 1);
        assert_eq!(outcome.strokes[0].len(), 5);

        let last = outcome.strokes[0].last().unwrap();
        let last_px = f64::from(last.x) / f64::from(NORMALIZED_MAX) * 240.0 - 0.5;
        let rightmost_consumed = (0..240_i64)
            .rev()
            .find(|&x| (27..33).any(|y| mask.get(x, y) == Cell::Consumed))
            .unwrap();
        #[allow(clippy::cast_precision_loss)]
        let rightmost = rightmost_consumed as f64;
        assert!(
            rightmost <= last_px + config.pen_radius + 0.1,
            "consumed up to x={rightmost}, last point at x={last_px}",
        );
    }

    #[test]
    fn stroke_cap_truncates_only_when_ink_remains() {
        let image = image_with_rects(200, 80, &[(10, 10, 80, 5)]);
        let config = WalkConfig {
            max_strokes: 1,
            ..WalkConfig::default()
        };
        let (outcome, mask) = walk(&image, &config);
        assert_eq!(outcome.truncated, mask.unconsumed_count() > 0);
    }

    #[test]
    fn coordinates_stay_in_normalized_range() {
        // Ink touching every border.
        let image = image_with_rects(64, 64, &[(0, 0, 64, 4), (0, 60, 64, 4), (0, 0, 4, 64)]);
        let (outcome, _) = walk(&image, &WalkConfig::default());
        assert!(!outcome.strokes.is_empty());
        for p in outcome.strokes.iter().flat_map(Stroke::points) {
            assert!(p.x <= NORMALIZED_MAX && p.y <= NORMALIZED_MAX);
        }
    }

    #[test]
    fn ray_length_measures_to_cell_edge() {
        let mask = InkMask::from_fn(20, 20, |_, y| {
            if (5..11).contains(&y) { Cell::Ink } else { Cell::Background }
        });
        let pos = Point::new(10.0, 7.5);
        assert!((ray_length(&mask, pos, 0, -1) - 3.0).abs() < 1e-9);
        assert!((ray_length(&mask, pos, 0, 1) - 3.0).abs() < 1e-9);
        // Horizontal rays run to the raster edge.
        assert!((ray_length(&mask, pos, 1, 0) - 9.5).abs() < 1e-9);
    }
}
