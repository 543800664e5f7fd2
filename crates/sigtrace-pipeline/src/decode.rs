//! Image decoding into the RGBA pixel buffer the core consumes.
//!
//! Accepts raw image bytes (PNG, JPEG, BMP, WebP) and produces an
//! `RgbaImage`. The tracing core itself only ever sees decoded pixels;
//! this adapter exists so callers holding encoded bytes do not need to
//! depend on `image` themselves.

use image::RgbaImage;

use crate::types::PipelineError;

/// Decode raw image bytes into an RGBA8 buffer.
///
/// Supports PNG, JPEG, BMP, and WebP formats (whatever the `image` crate
/// can decode with the enabled features). Images without an alpha
/// channel decode as fully opaque.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
pub fn decode(bytes: &[u8]) -> Result<RgbaImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let img = image::load_from_memory(bytes)?;
    Ok(img.to_rgba8())
}
