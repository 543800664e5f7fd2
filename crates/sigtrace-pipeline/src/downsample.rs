//! Downsampling to the processing resolution.
//!
//! Reduces the decoded image so its longest axis matches the configured
//! `working_resolution`. The walker's pen and search radii are expressed
//! in processing pixels, so bounding the raster size keeps them
//! meaningful for very large scans and bounds the work per image.
//!
//! If the image is already at or below the target resolution, it is
//! returned unchanged.

use std::borrow::Cow;
use std::fmt;

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::types::Dimensions;

/// Resampling filter used when downsampling.
///
/// Ordered from fastest/lowest-quality to slowest/highest-quality,
/// with a `Disabled` variant to skip downsampling entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DownsampleFilter {
    /// Skip downsampling regardless of image size.
    Disabled,
    /// Nearest-neighbor: fastest, blocky artifacts.
    Nearest,
    /// Bilinear interpolation: fast, decent quality.
    #[default]
    Triangle,
    /// Bicubic (Catmull-Rom): moderate speed, good quality.
    CatmullRom,
    /// Gaussian: moderate speed, smooth output.
    Gaussian,
    /// Lanczos with 3 lobes: slowest, sharpest.
    Lanczos3,
}

impl DownsampleFilter {
    /// Convert to the `image` crate's `FilterType`.
    ///
    /// Returns `None` for [`DownsampleFilter::Disabled`].
    const fn to_image_filter(self) -> Option<image::imageops::FilterType> {
        match self {
            Self::Disabled => None,
            Self::Nearest => Some(image::imageops::FilterType::Nearest),
            Self::Triangle => Some(image::imageops::FilterType::Triangle),
            Self::CatmullRom => Some(image::imageops::FilterType::CatmullRom),
            Self::Gaussian => Some(image::imageops::FilterType::Gaussian),
            Self::Lanczos3 => Some(image::imageops::FilterType::Lanczos3),
        }
    }
}

impl fmt::Display for DownsampleFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => f.write_str("Disabled"),
            Self::Nearest => f.write_str("Nearest"),
            Self::Triangle => f.write_str("Triangle"),
            Self::CatmullRom => f.write_str("CatmullRom"),
            Self::Gaussian => f.write_str("Gaussian"),
            Self::Lanczos3 => f.write_str("Lanczos3"),
        }
    }
}

/// Size of the processing raster for a `width` x `height` source, or
/// `None` when the source already fits within `max_dimension`.
///
/// The long axis becomes exactly `max_dimension`; the short axis is
/// scaled by the same factor and never drops below one pixel.
#[must_use]
pub fn target_dimensions(width: u32, height: u32, max_dimension: u32) -> Option<Dimensions> {
    let long_axis = width.max(height);
    if max_dimension == 0 || long_axis <= max_dimension {
        return None;
    }

    let scale = f64::from(max_dimension) / f64::from(long_axis);
    Some(Dimensions {
        width: scaled_extent(width, scale),
        height: scaled_extent(height, scale),
    })
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn scaled_extent(extent: u32, scale: f64) -> u32 {
    ((f64::from(extent) * scale).round() as u32).max(1)
}

/// Reduce `image` to the processing resolution.
///
/// Borrows the input when no resize is needed (small source or
/// [`DownsampleFilter::Disabled`]) and returns an owned raster otherwise.
#[must_use]
pub fn downsample(
    image: &RgbaImage,
    max_dimension: u32,
    filter: DownsampleFilter,
) -> Cow<'_, RgbaImage> {
    let target = target_dimensions(image.width(), image.height(), max_dimension);
    match (filter.to_image_filter(), target) {
        (Some(image_filter), Some(Dimensions { width, height })) => {
            tracing::debug!(
                from_width = image.width(),
                from_height = image.height(),
                width,
                height,
                %filter,
                "downsampling",
            );
            Cow::Owned(image::imageops::resize(image, width, height, image_filter))
        }
        _ => Cow::Borrowed(image),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, _| {
            if x % 7 == 0 {
                image::Rgba([20, 20, 20, 255])
            } else {
                image::Rgba([250, 250, 250, 255])
            }
        })
    }

    #[test]
    fn default_filter_is_triangle() {
        assert_eq!(DownsampleFilter::default(), DownsampleFilter::Triangle);
    }

    #[test]
    fn small_sources_keep_their_size() {
        assert_eq!(target_dimensions(640, 200, 800), None);
        assert_eq!(target_dimensions(800, 300, 800), None);
    }

    #[test]
    fn wide_scan_is_bounded_by_its_width() {
        assert_eq!(
            target_dimensions(3200, 1000, 800),
            Some(Dimensions {
                width: 800,
                height: 250
            })
        );
    }

    #[test]
    fn tall_scan_is_bounded_by_its_height() {
        assert_eq!(
            target_dimensions(900, 1800, 800),
            Some(Dimensions {
                width: 400,
                height: 800
            })
        );
    }

    #[test]
    fn thin_strip_keeps_one_pixel() {
        assert_eq!(
            target_dimensions(5000, 1, 500),
            Some(Dimensions {
                width: 500,
                height: 1
            })
        );
    }

    #[test]
    fn zero_limit_means_no_resize() {
        assert_eq!(target_dimensions(5000, 3000, 0), None);
    }

    #[test]
    fn fitting_image_is_borrowed() {
        let img = scan(300, 100);
        assert!(matches!(
            downsample(&img, 800, DownsampleFilter::Lanczos3),
            Cow::Borrowed(_)
        ));
    }

    #[test]
    fn oversized_image_is_resized() {
        let img = scan(1600, 400);
        let out = downsample(&img, 800, DownsampleFilter::Triangle);
        assert!(matches!(out, Cow::Owned(_)));
        assert_eq!(out.dimensions(), (800, 200));
    }

    #[test]
    fn disabled_filter_borrows_even_large_image() {
        let img = scan(1600, 400);
        let out = downsample(&img, 800, DownsampleFilter::Disabled);
        assert!(matches!(out, Cow::Borrowed(_)));
        assert_eq!(out.dimensions(), (1600, 400));
    }
}
