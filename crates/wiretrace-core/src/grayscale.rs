//! Image decoding and grayscale conversion.
//!
//! Every pixel source is converted once, at ingestion, into a dedicated
//! 8-bit [`GrayImage`]. Color inputs, including palette images (which the
//! decoder expands to RGB), are reduced with the fixed weighting
//! `0.3*R + 0.6*G + 0.1*B`, so a palette image whose indices do not
//! represent gray values still yields true intensities.

use image::{GrayImage, Luma, RgbImage};

use crate::types::TraceError;

/// Weights applied to the red, green, and blue channels.
pub const LUMA_WEIGHTS: [f64; 3] = [0.3, 0.6, 0.1];

/// Weighted luminance of one RGB triple, rounded half-up.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn luminance(r: u8, g: u8, b: u8) -> u8 {
    let value = f64::from(b).mul_add(
        LUMA_WEIGHTS[2],
        f64::from(r).mul_add(LUMA_WEIGHTS[0], f64::from(g) * LUMA_WEIGHTS[1]),
    );
    (value + 0.5).floor().clamp(0.0, 255.0) as u8
}

/// Decode raw image bytes and convert to grayscale.
///
/// Supports whatever formats the `image` crate was built with.
/// Single-channel inputs are kept as-is; everything else is converted
/// through [`luminance`].
///
/// # Errors
///
/// Returns [`TraceError::EmptyInput`] if `bytes` is empty.
/// Returns [`TraceError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
pub fn decode_and_grayscale(bytes: &[u8]) -> Result<GrayImage, TraceError> {
    if bytes.is_empty() {
        return Err(TraceError::EmptyInput);
    }

    let img = image::load_from_memory(bytes)?;
    Ok(match img {
        image::DynamicImage::ImageLuma8(gray) => gray,
        other => rgb_to_gray(&other.to_rgb8()),
    })
}

/// Convert an RGB image with the fixed channel weighting.
#[must_use]
pub fn rgb_to_gray(rgb: &RgbImage) -> GrayImage {
    GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        Luma([luminance(r, g, b)])
    })
}
