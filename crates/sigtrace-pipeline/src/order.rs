//! Stroke ordering: reconstruct a plausible writing order.
//!
//! The walker emits strokes in raster-scan seed order, which has nothing
//! to do with how the signature was written. This module:
//!
//! 1. sets aside decorations (wide, flat strokes low in the drawing, i.e.
//!    underlines) so they are drawn last;
//! 2. chains the remaining strokes greedily from the leftmost one, always
//!    jumping to the nearest free endpoint and reversing a stroke when
//!    its end is the nearer one;
//! 3. does so under two cost functions, a neutral Euclidean one and a
//!    biased one that discourages leftward jumps and line skipping, and
//!    keeps the biased result only when it scores strictly better under
//!    a shared travel score.
//!
//! Each hypothesis is a pure function of the same borrowed input.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{Point, Stroke};

/// Writing-order thresholds, in normalized units unless noted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderConfig {
    /// Decorations are wider than this fraction of the drawing's width.
    pub decoration_min_width_ratio: f64,

    /// Decorations have their centroid within this bottom fraction of the
    /// drawing's height.
    pub decoration_bottom_ratio: f64,

    /// Decorations are wider than this multiple of their own height.
    pub decoration_min_aspect: f64,

    /// Biased cost: jumps landing further left than this of the chain end
    /// are multiplied by `backtrack_penalty`.
    pub backtrack_margin: f64,

    /// Biased cost multiplier for leftward jumps.
    pub backtrack_penalty: f64,

    /// Biased cost: added per unit of centroid height difference.
    pub vertical_penalty: f64,

    /// Score: a transition moving further left than this is a regression.
    pub regression_threshold: f64,

    /// Score: fixed cost added per regression.
    pub regression_penalty: f64,

    /// The biased hypothesis is discarded when its score exceeds this
    /// multiple of the neutral score.
    pub hypothesis_margin: f64,
}

impl OrderConfig {
    /// Default decoration width ratio.
    pub const DEFAULT_DECORATION_MIN_WIDTH_RATIO: f64 = 0.35;
    /// Default decoration bottom band.
    pub const DEFAULT_DECORATION_BOTTOM_RATIO: f64 = 0.35;
    /// Default decoration aspect ratio.
    pub const DEFAULT_DECORATION_MIN_ASPECT: f64 = 2.5;
    /// Default backtrack margin.
    pub const DEFAULT_BACKTRACK_MARGIN: f64 = 100.0;
    /// Default backtrack multiplier.
    pub const DEFAULT_BACKTRACK_PENALTY: f64 = 5.0;
    /// Default vertical penalty factor.
    pub const DEFAULT_VERTICAL_PENALTY: f64 = 5.0;
    /// Default regression threshold.
    pub const DEFAULT_REGRESSION_THRESHOLD: f64 = 100.0;
    /// Default regression penalty.
    pub const DEFAULT_REGRESSION_PENALTY: f64 = 50.0;
    /// Default hypothesis margin.
    pub const DEFAULT_HYPOTHESIS_MARGIN: f64 = 1.3;
}

impl Default for OrderConfig {
    fn default() -> Self {
        Self {
            decoration_min_width_ratio: Self::DEFAULT_DECORATION_MIN_WIDTH_RATIO,
            decoration_bottom_ratio: Self::DEFAULT_DECORATION_BOTTOM_RATIO,
            decoration_min_aspect: Self::DEFAULT_DECORATION_MIN_ASPECT,
            backtrack_margin: Self::DEFAULT_BACKTRACK_MARGIN,
            backtrack_penalty: Self::DEFAULT_BACKTRACK_PENALTY,
            vertical_penalty: Self::DEFAULT_VERTICAL_PENALTY,
            regression_threshold: Self::DEFAULT_REGRESSION_THRESHOLD,
            regression_penalty: Self::DEFAULT_REGRESSION_PENALTY,
            hypothesis_margin: Self::DEFAULT_HYPOTHESIS_MARGIN,
        }
    }
}

/// Geometry summary of a stroke, derived from its points.
///
/// Never stored: recompute it whenever the point order changes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeMeta {
    /// Smallest x.
    pub min_x: f64,
    /// Smallest y.
    pub min_y: f64,
    /// Largest x.
    pub max_x: f64,
    /// Largest y.
    pub max_y: f64,
    /// Mean of all points.
    pub centroid: Point,
    /// First point.
    pub start: Point,
    /// Last point.
    pub end: Point,
}

impl StrokeMeta {
    /// Summarize `stroke`. `None` for an empty stroke.
    #[must_use]
    pub fn of(stroke: &Stroke) -> Option<Self> {
        let start = stroke.first()?.position();
        let end = stroke.last()?.position();

        let mut meta = Self {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
            centroid: Point::new(0.0, 0.0),
            start,
            end,
        };
        let (mut sum_x, mut sum_y) = (0.0, 0.0);
        for p in stroke.points() {
            let p = p.position();
            meta.min_x = meta.min_x.min(p.x);
            meta.min_y = meta.min_y.min(p.y);
            meta.max_x = meta.max_x.max(p.x);
            meta.max_y = meta.max_y.max(p.y);
            sum_x += p.x;
            sum_y += p.y;
        }
        #[allow(clippy::cast_precision_loss)]
        let n = stroke.len() as f64;
        meta.centroid = Point::new(sum_x / n, sum_y / n);
        Some(meta)
    }

    /// Bounding-box width.
    #[must_use]
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Bounding-box height.
    #[must_use]
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

/// Which cost function produced an ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderHypothesis {
    /// Plain Euclidean endpoint distance.
    Neutral,
    /// Distance with leftward-jump and line-skip penalties.
    Biased,
}

impl fmt::Display for OrderHypothesis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Neutral => f.write_str("neutral"),
            Self::Biased => f.write_str("biased"),
        }
    }
}

/// How the final order was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderReport {
    /// The hypothesis whose ordering was kept.
    pub chosen: OrderHypothesis,
    /// Shared score of the neutral ordering.
    pub neutral_score: f64,
    /// Shared score of the biased ordering.
    pub biased_score: f64,
    /// Number of strokes set aside as decorations.
    pub decorations: usize,
}

/// Strokes in writing order plus how the order was chosen.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedStrokes {
    /// Main strokes in solved order, then decorations in input order.
    pub strokes: Vec<Stroke>,
    /// Selection details.
    pub report: OrderReport,
}

/// Split strokes into `(main, decorations)`, preserving input order in
/// both. Empty strokes are dropped.
#[must_use]
pub fn split_decorations(strokes: &[Stroke], config: &OrderConfig) -> (Vec<Stroke>, Vec<Stroke>) {
    let metas: Vec<(&Stroke, StrokeMeta)> = strokes
        .iter()
        .filter_map(|s| StrokeMeta::of(s).map(|m| (s, m)))
        .collect();

    let Some(total) = metas.iter().map(|(_, m)| *m).reduce(|a, b| StrokeMeta {
        min_x: a.min_x.min(b.min_x),
        min_y: a.min_y.min(b.min_y),
        max_x: a.max_x.max(b.max_x),
        max_y: a.max_y.max(b.max_y),
        ..a
    }) else {
        return (Vec::new(), Vec::new());
    };

    let bottom_band = (1.0 - config.decoration_bottom_ratio).mul_add(total.height(), total.min_y);

    let (decorations, main): (Vec<_>, Vec<_>) = metas.into_iter().partition(|(_, m)| {
        m.width() > config.decoration_min_width_ratio * total.width()
            && m.centroid.y > bottom_band
            && m.width() > config.decoration_min_aspect * m.height()
    });

    (
        main.into_iter().map(|(s, _)| s.clone()).collect(),
        decorations.into_iter().map(|(s, _)| s.clone()).collect(),
    )
}

/// Cost of jumping from the end of `tail` to `endpoint` of `candidate`.
fn jump_cost(
    hypothesis: OrderHypothesis,
    tail: &StrokeMeta,
    endpoint: Point,
    candidate: &StrokeMeta,
    config: &OrderConfig,
) -> f64 {
    let distance = tail.end.distance(endpoint);
    match hypothesis {
        OrderHypothesis::Neutral => distance,
        OrderHypothesis::Biased => {
            let distance = if endpoint.x < tail.end.x - config.backtrack_margin {
                distance * config.backtrack_penalty
            } else {
                distance
            };
            config
                .vertical_penalty
                .mul_add((candidate.centroid.y - tail.centroid.y).abs(), distance)
        }
    }
}

/// Greedy nearest-fragment chaining under `hypothesis`.
///
/// Starts from the leftmost stroke (turned to run left-to-right when it
/// is wider than tall and currently runs right-to-left), then repeatedly
/// appends the stroke whose start or end is cheapest to reach from the
/// chain's end, reversing it when its end was the cheaper endpoint.
#[must_use]
pub fn solve(strokes: &[Stroke], hypothesis: OrderHypothesis, config: &OrderConfig) -> Vec<Stroke> {
    let mut pool: Vec<(Stroke, StrokeMeta)> = strokes
        .iter()
        .filter_map(|s| StrokeMeta::of(s).map(|m| (s.clone(), m)))
        .collect();
    pool.sort_by(|(_, a), (_, b)| a.min_x.total_cmp(&b.min_x));

    if pool.is_empty() {
        return Vec::new();
    }

    let (seed, seed_meta) = pool.remove(0);
    let seed = if seed_meta.end.x < seed_meta.start.x && seed_meta.width() > seed_meta.height() {
        seed.reversed()
    } else {
        seed
    };

    let mut tail = StrokeMeta::of(&seed);
    let mut chain = Vec::with_capacity(strokes.len());
    chain.push(seed);

    while let Some(tail_meta) = tail {
        let mut best: Option<(usize, bool)> = None;
        let mut best_cost = f64::INFINITY;

        for (i, (_, meta)) in pool.iter().enumerate() {
            for (endpoint, reversed) in [(meta.start, false), (meta.end, true)] {
                let cost = jump_cost(hypothesis, &tail_meta, endpoint, meta, config);
                if cost < best_cost {
                    best_cost = cost;
                    best = Some((i, reversed));
                }
            }
        }

        let Some((index, reversed)) = best else {
            break;
        };
        let (next, _) = pool.remove(index);
        let next = if reversed { next.reversed() } else { next };
        tail = StrokeMeta::of(&next);
        chain.push(next);
    }

    chain
}

/// Shared score of an ordering: total end-to-start travel plus a fixed
/// penalty for every transition that moves far to the left.
#[must_use]
pub fn score(strokes: &[Stroke], config: &OrderConfig) -> f64 {
    strokes
        .windows(2)
        .filter_map(|pair| Some((pair[0].last()?.position(), pair[1].first()?.position())))
        .map(|(end, start)| {
            let regression = if start.x < end.x - config.regression_threshold {
                config.regression_penalty
            } else {
                0.0
            };
            end.distance(start) + regression
        })
        .sum()
}

/// Pick between the two hypotheses given their scores.
///
/// The biased ordering wins only when it scores strictly lower and stays
/// within `margin` times the neutral score; ties keep the neutral one.
#[must_use]
pub fn choose_hypothesis(neutral_score: f64, biased_score: f64, margin: f64) -> OrderHypothesis {
    if biased_score < neutral_score && biased_score <= neutral_score * margin {
        OrderHypothesis::Biased
    } else {
        OrderHypothesis::Neutral
    }
}

/// Compute the final writing order of `strokes`.
#[must_use]
pub fn order_strokes(strokes: &[Stroke], config: &OrderConfig) -> OrderedStrokes {
    let (main, decorations) = split_decorations(strokes, config);

    let neutral = solve(&main, OrderHypothesis::Neutral, config);
    let biased = solve(&main, OrderHypothesis::Biased, config);
    let neutral_score = score(&neutral, config);
    let biased_score = score(&biased, config);
    let chosen = choose_hypothesis(neutral_score, biased_score, config.hypothesis_margin);

    tracing::debug!(
        main = main.len(),
        decorations = decorations.len(),
        neutral_score,
        biased_score,
        %chosen,
        "solved stroke order"
    );

    let mut ordered = match chosen {
        OrderHypothesis::Neutral => neutral,
        OrderHypothesis::Biased => biased,
    };
    let decoration_count = decorations.len();
    ordered.extend(decorations);

    OrderedStrokes {
        strokes: ordered,
        report: OrderReport {
            chosen,
            neutral_score,
            biased_score,
            decorations: decoration_count,
        },
    }
}
