//! Mask builder: classify pixels as ink and remove specks.
//!
//! A pixel is ink when it is both dark and opaque enough. Small
//! 4-connected ink components (dust, scanner noise, JPEG ringing) are
//! then zeroed so the walker never seeds on them.
//!
//! The resulting [`InkMask`] is tri-state: the walker later marks ink it
//! has traced as [`Cell::Consumed`], which stays distinct from
//! [`Cell::Background`] so the post-processor can still ask whether a
//! location was ink in the source.

use image::{GrayImage, Luma, RgbaImage};
use imageproc::region_labelling::{Connectivity, connected_components};
use serde::{Deserialize, Serialize};

/// Ink classification and despeckling thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaskConfig {
    /// A pixel is ink only when `0.299R + 0.587G + 0.114B` is below this
    /// value (0–255 channel scale).
    pub luma_threshold: f64,

    /// A pixel is ink only when its alpha is strictly above this value.
    pub alpha_threshold: u8,

    /// 4-connected ink components with fewer pixels than this are
    /// removed. `0` or `1` disables despeckling.
    pub min_component_size: u32,
}

impl MaskConfig {
    /// Default luminance threshold.
    pub const DEFAULT_LUMA_THRESHOLD: f64 = 200.0;
    /// Default alpha threshold.
    pub const DEFAULT_ALPHA_THRESHOLD: u8 = 50;
    /// Default despeckle size in pixels.
    pub const DEFAULT_MIN_COMPONENT_SIZE: u32 = 20;
}

impl Default for MaskConfig {
    fn default() -> Self {
        Self {
            luma_threshold: Self::DEFAULT_LUMA_THRESHOLD,
            alpha_threshold: Self::DEFAULT_ALPHA_THRESHOLD,
            min_component_size: Self::DEFAULT_MIN_COMPONENT_SIZE,
        }
    }
}

/// State of one mask cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cell {
    /// Not ink.
    #[default]
    Background,
    /// Ink the walker has not traced yet.
    Ink,
    /// Ink the walker has already traced.
    Consumed,
}

impl Cell {
    /// `true` for both untraced and traced ink.
    #[must_use]
    pub const fn is_ink(self) -> bool {
        !matches!(self, Self::Background)
    }
}

/// A width × height grid of [`Cell`]s.
///
/// Coordinates are signed so callers can probe neighbourhoods that run
/// off the raster; out-of-bounds reads are [`Cell::Background`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InkMask {
    width: u32,
    height: u32,
    cells: Vec<Cell>,
}

impl InkMask {
    /// An all-background mask.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        let len = usize::try_from(u64::from(width) * u64::from(height)).unwrap_or(0);
        Self {
            width,
            height,
            cells: vec![Cell::Background; len],
        }
    }

    /// Build a mask by evaluating `f(x, y)` for every cell.
    #[must_use]
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> Cell) -> Self {
        let mut mask = Self::new(width, height);
        for y in 0..height {
            for x in 0..width {
                mask.set(i64::from(x), i64::from(y), f(x, y));
            }
        }
        mask
    }

    /// Width in cells.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height in cells.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    fn index(&self, x: i64, y: i64) -> Option<usize> {
        if x < 0 || y < 0 || x >= i64::from(self.width) || y >= i64::from(self.height) {
            return None;
        }
        usize::try_from(y * i64::from(self.width) + x).ok()
    }

    /// The cell at `(x, y)`, or [`Cell::Background`] when out of bounds.
    #[must_use]
    pub fn get(&self, x: i64, y: i64) -> Cell {
        self.index(x, y)
            .and_then(|i| self.cells.get(i).copied())
            .unwrap_or_default()
    }

    /// Overwrite the cell at `(x, y)`. Out-of-bounds writes are ignored.
    pub fn set(&mut self, x: i64, y: i64, cell: Cell) {
        if let Some(slot) = self.index(x, y).and_then(|i| self.cells.get_mut(i)) {
            *slot = cell;
        }
    }

    /// Number of untraced ink cells.
    #[must_use]
    pub fn unconsumed_count(&self) -> usize {
        self.cells.iter().filter(|&&c| c == Cell::Ink).count()
    }

    /// Number of cells that are or were ink.
    #[must_use]
    pub fn ink_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_ink()).count()
    }

    /// Whether any cell within the square `±radius` neighbourhood of
    /// `(x, y)` is or was ink.
    #[must_use]
    pub fn has_ink_near(&self, x: i64, y: i64, radius: i64) -> bool {
        (y - radius..=y + radius)
            .any(|ny| (x - radius..=x + radius).any(|nx| self.get(nx, ny).is_ink()))
    }

    /// First untraced ink cell in raster order at or after `start`
    /// (a linear cell index), with its index.
    #[must_use]
    pub fn next_unconsumed(&self, start: usize) -> Option<(usize, i64, i64)> {
        let width = usize::try_from(self.width).ok()?;
        self.cells
            .get(start..)?
            .iter()
            .position(|&c| c == Cell::Ink)
            .map(|offset| {
                let i = start + offset;
                let x = i64::try_from(i % width).unwrap_or(0);
                let y = i64::try_from(i / width).unwrap_or(0);
                (i, x, y)
            })
    }
}

/// Counts produced by [`despeckle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DespeckleReport {
    /// 4-connected ink components found before removal.
    pub components: usize,
    /// Components removed for being smaller than the minimum size.
    pub removed_components: usize,
    /// Ink pixels removed.
    pub removed_pixels: usize,
}

/// Whether a pixel counts as ink under `config`.
#[must_use]
pub fn is_ink_pixel(pixel: image::Rgba<u8>, config: &MaskConfig) -> bool {
    let [r, g, b, a] = pixel.0;
    let luma = 0.114f64.mul_add(
        f64::from(b),
        0.299f64.mul_add(f64::from(r), 0.587 * f64::from(g)),
    );
    luma < config.luma_threshold && a > config.alpha_threshold
}

/// Classify every pixel of `image` into a fresh [`InkMask`].
#[must_use]
pub fn build_mask(image: &RgbaImage, config: &MaskConfig) -> InkMask {
    InkMask::from_fn(image.width(), image.height(), |x, y| {
        if is_ink_pixel(*image.get_pixel(x, y), config) {
            Cell::Ink
        } else {
            Cell::Background
        }
    })
}

/// Zero every 4-connected ink component with fewer than `min_size`
/// pixels.
///
/// After this call every remaining ink cell belongs to a component of at
/// least `min_size` pixels, and the ink count has not increased.
pub fn despeckle(mask: &mut InkMask, min_size: u32) -> DespeckleReport {
    let binary = GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
        Luma([if mask.get(i64::from(x), i64::from(y)).is_ink() {
            255
        } else {
            0
        }])
    });
    let labels = connected_components(&binary, Connectivity::Four, Luma([0u8]));

    // Labels are consecutive from 1; 0 is background.
    let max_label = labels.pixels().map(|p| p.0[0]).max().unwrap_or(0);
    let mut sizes = vec![0u32; usize::try_from(max_label).unwrap_or(0) + 1];
    for p in labels.pixels() {
        if let Some(size) = usize::try_from(p.0[0]).ok().and_then(|l| sizes.get_mut(l)) {
            *size += 1;
        }
    }

    let mut report = DespeckleReport {
        components: sizes.len().saturating_sub(1),
        ..DespeckleReport::default()
    };
    report.removed_components = sizes
        .iter()
        .skip(1)
        .filter(|&&size| size < min_size)
        .count();

    for (x, y, label) in labels.enumerate_pixels() {
        let label = label.0[0];
        if label == 0 {
            continue;
        }
        let size = usize::try_from(label)
            .ok()
            .and_then(|l| sizes.get(l).copied())
            .unwrap_or(0);
        if size < min_size {
            mask.set(i64::from(x), i64::from(y), Cell::Background);
            report.removed_pixels += 1;
        }
    }

    report
}
