//! Handwriting style: caller-facing knobs and their resolved form.
//!
//! [`HandwritingStyle`] is what callers send (every field optional, any
//! JSON object deserializes). [`ResolvedStyle`] is what the planner
//! consumes: every field concrete, out-of-range values replaced by the
//! defaults. Resolution never fails, so a malformed style can only
//! change how the motion looks, never whether it is planned.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Optional style overrides as supplied by a caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandwritingStyle {
    /// Pen speed in milliseconds per pixel travelled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_ms_per_px: Option<f64>,

    /// Multiplier from traced thickness to line width.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pressure_scale: Option<f64>,

    /// How strongly turns slow the pen down. `0` disables it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inertia_factor: Option<f64>,

    /// Tremor amplitude in pixels. `0` disables tremor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub micro_tremor_amp_px: Option<f64>,

    /// Tremor frequency in hertz. `0` disables tremor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub micro_tremor_freq_hz: Option<f64>,

    /// Cosmetic ink class for the renderer. Not used for timing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ink_spread: Option<String>,
}

impl HandwritingStyle {
    /// Merge these overrides onto [`ResolvedStyle::default`].
    #[must_use]
    pub fn resolve(&self) -> ResolvedStyle {
        let defaults = ResolvedStyle::default();
        ResolvedStyle {
            base_ms_per_px: non_negative(self.base_ms_per_px, defaults.base_ms_per_px),
            pressure_scale: non_negative(self.pressure_scale, defaults.pressure_scale),
            inertia_factor: non_negative(self.inertia_factor, defaults.inertia_factor),
            micro_tremor_amp_px: non_negative(
                self.micro_tremor_amp_px,
                defaults.micro_tremor_amp_px,
            ),
            micro_tremor_freq_hz: non_negative(
                self.micro_tremor_freq_hz,
                defaults.micro_tremor_freq_hz,
            ),
            fallback_line_width: defaults.fallback_line_width,
            ink_spread: self.ink_spread.clone(),
        }
    }

    /// Fields set here win; unset fields are taken from `base`.
    #[must_use]
    pub fn overlay(&self, base: &Self) -> Self {
        Self {
            base_ms_per_px: self.base_ms_per_px.or(base.base_ms_per_px),
            pressure_scale: self.pressure_scale.or(base.pressure_scale),
            inertia_factor: self.inertia_factor.or(base.inertia_factor),
            micro_tremor_amp_px: self.micro_tremor_amp_px.or(base.micro_tremor_amp_px),
            micro_tremor_freq_hz: self.micro_tremor_freq_hz.or(base.micro_tremor_freq_hz),
            ink_spread: self.ink_spread.clone().or_else(|| base.ink_spread.clone()),
        }
    }
}

/// `value` if it is a finite non-negative number, otherwise `default`.
fn non_negative(value: Option<f64>, default: f64) -> f64 {
    value
        .filter(|v| v.is_finite() && *v >= 0.0)
        .unwrap_or(default)
}

/// A fully specified style, ready for the planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedStyle {
    /// Pen speed in milliseconds per pixel travelled.
    pub base_ms_per_px: f64,
    /// Multiplier from traced thickness to line width.
    pub pressure_scale: f64,
    /// Turn-angle slowdown factor.
    pub inertia_factor: f64,
    /// Tremor amplitude in pixels.
    pub micro_tremor_amp_px: f64,
    /// Tremor frequency in hertz.
    pub micro_tremor_freq_hz: f64,
    /// Line width, in pixels, for points without a traced thickness.
    pub fallback_line_width: f64,
    /// Cosmetic ink class passed through to the renderer.
    pub ink_spread: Option<String>,
}

impl ResolvedStyle {
    /// Default pen speed.
    pub const DEFAULT_BASE_MS_PER_PX: f64 = 1.2;
    /// Default thickness multiplier.
    pub const DEFAULT_PRESSURE_SCALE: f64 = 1.0;
    /// Inertia is off by default.
    pub const DEFAULT_INERTIA_FACTOR: f64 = 0.0;
    /// Tremor is off by default.
    pub const DEFAULT_MICRO_TREMOR_AMP_PX: f64 = 0.0;
    /// Tremor is off by default.
    pub const DEFAULT_MICRO_TREMOR_FREQ_HZ: f64 = 0.0;
    /// Default width for points without thickness.
    pub const DEFAULT_FALLBACK_LINE_WIDTH: f64 = 1.5;

    /// Whether tremor displacement applies.
    #[must_use]
    pub fn has_tremor(&self) -> bool {
        self.micro_tremor_amp_px > 0.0 && self.micro_tremor_freq_hz > 0.0
    }
}

impl Default for ResolvedStyle {
    fn default() -> Self {
        Self {
            base_ms_per_px: Self::DEFAULT_BASE_MS_PER_PX,
            pressure_scale: Self::DEFAULT_PRESSURE_SCALE,
            inertia_factor: Self::DEFAULT_INERTIA_FACTOR,
            micro_tremor_amp_px: Self::DEFAULT_MICRO_TREMOR_AMP_PX,
            micro_tremor_freq_hz: Self::DEFAULT_MICRO_TREMOR_FREQ_HZ,
            fallback_line_width: Self::DEFAULT_FALLBACK_LINE_WIDTH,
            ink_spread: None,
        }
    }
}

/// Named style bundles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StylePreset {
    /// Slow and deliberate, no tremor.
    Steady,
    /// Everyday signing pace with a faint tremor.
    #[default]
    Natural,
    /// Fast and loose.
    Hurried,
}

impl StylePreset {
    /// All presets, in display order.
    pub const ALL: [Self; 3] = [Self::Steady, Self::Natural, Self::Hurried];

    /// The overrides this preset stands for.
    #[must_use]
    pub fn style(self) -> HandwritingStyle {
        let (base, pressure, inertia, amp, freq, spread) = match self {
            Self::Steady => (1.6, 1.0, 0.3, 0.0, 0.0, "fine"),
            Self::Natural => (1.2, 1.0, 0.5, 0.3, 6.0, "medium"),
            Self::Hurried => (0.7, 0.85, 0.2, 0.6, 9.0, "bleed"),
        };
        HandwritingStyle {
            base_ms_per_px: Some(base),
            pressure_scale: Some(pressure),
            inertia_factor: Some(inertia),
            micro_tremor_amp_px: Some(amp),
            micro_tremor_freq_hz: Some(freq),
            ink_spread: Some(spread.to_string()),
        }
    }
}

impl fmt::Display for StylePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Steady => f.write_str("Steady"),
            Self::Natural => f.write_str("Natural"),
            Self::Hurried => f.write_str("Hurried"),
        }
    }
}
