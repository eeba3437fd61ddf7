//! Gaussian-derivative differentiation of grayscale images.
//!
//! The cost field needs the second-order partial derivatives of the image
//! smoothed at a given scale. This module defines the [`Differentiator`]
//! trait for pluggable differentiation operators and the default
//! [`GaussianDerivatives`] implementation, a separable convolution with
//! sampled Gaussian-derivative kernels and mirrored image borders.

use image::{GrayImage, ImageBuffer, Luma, imageops};
use imageproc::filter::{horizontal_filter, vertical_filter};

use crate::progress::Progress;
use crate::types::{FloatImage, TraceError, try_alloc};

/// Kernel half-width in units of the Gaussian scale.
const KERNEL_EXTENT: f64 = 4.0;

/// Trait for image differentiation operators.
///
/// Input: an 8-bit image, the Gaussian scale (standard deviation in
/// pixels), and the derivative order along x and y.
/// Output: the derivative image with the same dimensions.
pub trait Differentiator {
    /// Compute the `(order_x, order_y)` derivative of `image` at `scale`.
    ///
    /// # Errors
    ///
    /// Returns [`TraceError::OutOfMemory`] when working buffers cannot be
    /// allocated.
    fn derivative(
        &self,
        image: &GrayImage,
        scale: f32,
        order_x: u8,
        order_y: u8,
        progress: &mut dyn Progress,
    ) -> Result<FloatImage, TraceError>;
}

/// Separable sampled Gaussian-derivative convolution.
///
/// Supports derivative orders 0, 1, and 2 per axis. Kernels are
/// normalized so that the operator is exact on polynomials of the
/// matching degree: order 0 sums to one, order 1 returns the slope of a
/// ramp, and order 2 returns the curvature of a parabola.
#[derive(Debug, Clone, Copy, Default)]
pub struct GaussianDerivatives;

impl Differentiator for GaussianDerivatives {
    #[allow(clippy::cast_possible_truncation)]
    fn derivative(
        &self,
        image: &GrayImage,
        scale: f32,
        order_x: u8,
        order_y: u8,
        progress: &mut dyn Progress,
    ) -> Result<FloatImage, TraceError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return FloatImage::try_zeros(width, height);
        }
        // imageproc filters correlate; reversed taps make them convolve.
        let kx: Vec<f32> = gaussian_kernel(f64::from(scale), order_x)
            .into_iter()
            .rev()
            .collect();
        let ky: Vec<f32> = gaussian_kernel(f64::from(scale), order_y)
            .into_iter()
            .rev()
            .collect();
        let rx = (kx.len() / 2) as u32;
        let ry = (ky.len() / 2) as u32;

        let padded =
            pad_mirrored(image, rx, ry).ok_or(TraceError::OutOfMemory { width, height })?;
        let rows: Plane = horizontal_filter(&padded, &kx);
        progress.report(0.5);
        let filtered: Plane = vertical_filter(&rows, &ky);
        progress.report(1.0);

        let cropped = imageops::crop_imm(&filtered, rx, ry, width, height).to_image();
        FloatImage::from_raw(width, height, cropped.into_raw())
            .ok_or(TraceError::OutOfMemory { width, height })
    }
}

/// Single-channel `f32` image as imageproc's filters take it.
type Plane = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Copy `image` into a float plane grown by `rx` columns and `ry` rows
/// on each side, filled by symmetric reflection (edge sample repeated).
///
/// Returns `None` if the padded buffer cannot be allocated.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss
)]
fn pad_mirrored(image: &GrayImage, rx: u32, ry: u32) -> Option<Plane> {
    let (width, height) = image.dimensions();
    let padded_width = width + 2 * rx;
    let padded_height = height + 2 * ry;
    let reflect = |p: u32, radius: u32, n: u32| -> u32 {
        let period = 2 * i64::from(n);
        let m = (i64::from(p) - i64::from(radius)).rem_euclid(period);
        (if m >= i64::from(n) { period - 1 - m } else { m }) as u32
    };

    let mut data = try_alloc(padded_width as usize * padded_height as usize, 0.0_f32)?;
    for (i, value) in data.iter_mut().enumerate() {
        let px = (i % padded_width as usize) as u32;
        let py = (i / padded_width as usize) as u32;
        let [v] = image
            .get_pixel(reflect(px, rx, width), reflect(py, ry, height))
            .0;
        *value = f32::from(v);
    }
    ImageBuffer::from_raw(padded_width, padded_height, data)
}

/// Build a sampled Gaussian-derivative kernel of the given order.
///
/// The returned vector holds taps for offsets `-r..=r` where
/// `r = ceil(KERNEL_EXTENT * sigma)`. Orders above 2 are treated as 2.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn gaussian_kernel(sigma: f64, order: u8) -> Vec<f32> {
    let sigma = sigma.max(f64::EPSILON);
    let radius = (KERNEL_EXTENT * sigma).ceil().max(1.0) as i64;
    let s2 = sigma * sigma;
    let offsets: Vec<f64> = (-radius..=radius).map(|t| t as f64).collect();
    let gauss: Vec<f64> = offsets
        .iter()
        .map(|&t| (-t * t / (2.0 * s2)).exp())
        .collect();

    let taps: Vec<f64> = match order {
        0 => {
            let sum: f64 = gauss.iter().sum();
            gauss.iter().map(|g| g / sum).collect()
        }
        1 => {
            let raw: Vec<f64> = offsets
                .iter()
                .zip(&gauss)
                .map(|(&t, &g)| -t / s2 * g)
                .collect();
            // Convolving a unit ramp yields -sum(t * k(t)).
            let response: f64 = offsets.iter().zip(&raw).map(|(&t, &k)| -t * k).sum();
            raw.iter().map(|k| k / response).collect()
        }
        _ => {
            let mut raw: Vec<f64> = offsets
                .iter()
                .zip(&gauss)
                .map(|(&t, &g)| (t * t - s2) / (s2 * s2) * g)
                .collect();
            let mean = raw.iter().sum::<f64>() / raw.len() as f64;
            for k in &mut raw {
                *k -= mean;
            }
            // Convolving x^2 yields sum(t^2 * k(t)), which must be 2.
            let response: f64 = offsets.iter().zip(&raw).map(|(&t, &k)| t * t * k).sum();
            raw.iter().map(|k| 2.0 * k / response).collect()
        }
    };

    taps.into_iter().map(|k| k as f32).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;

    #[allow(clippy::cast_possible_truncation)]
    fn image_from_fn(w: u32, h: u32, f: impl Fn(u32, u32) -> u32) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| image::Luma([f(x, y) as u8]))
    }

    fn derivative(image: &GrayImage, ox: u8, oy: u8) -> FloatImage {
        GaussianDerivatives
            .derivative(image, 1.0, ox, oy, &mut NoProgress)
            .unwrap()
    }

    #[test]
    fn padding_reflects_edges() {
        let img = image_from_fn(5, 1, |x, _| x);
        let padded = pad_mirrored(&img, 2, 1).unwrap();
        assert_eq!(padded.dimensions(), (9, 3));
        let row: Vec<f32> = (0..9).map(|x| padded.get_pixel(x, 1).0[0]).collect();
        assert_eq!(row, [1.0, 0.0, 0.0, 1.0, 2.0, 3.0, 4.0, 4.0, 3.0]);
        assert_eq!(padded.get_pixel(4, 0).0[0], 2.0);
    }

    #[test]
    fn padding_wider_than_image_keeps_reflecting() {
        let img = image_from_fn(2, 1, |x, _| 10 * x);
        let padded = pad_mirrored(&img, 5, 0).unwrap();
        let row: Vec<f32> = (0..12).map(|x| padded.get_pixel(x, 0).0[0]).collect();
        assert_eq!(
            row,
            [0.0, 0.0, 10.0, 10.0, 0.0, 0.0, 10.0, 10.0, 0.0, 0.0, 10.0, 10.0]
        );
    }

    #[test]
    fn order_zero_kernel_sums_to_one() {
        let k = gaussian_kernel(2.0, 0);
        assert_eq!(k.len(), 17);
        let sum: f32 = k.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
    }

    #[test]
    fn odd_kernel_is_antisymmetric() {
        let k = gaussian_kernel(1.5, 1);
        let n = k.len();
        for i in 0..n / 2 {
            assert!((k[i] + k[n - 1 - i]).abs() < 1e-6);
        }
    }

    #[test]
    fn output_dimensions_preserved() {
        let img = GrayImage::new(17, 31);
        let d = derivative(&img, 2, 0);
        assert_eq!((d.width(), d.height()), (17, 31));
    }

    #[test]
    fn empty_image_gives_empty_derivative() {
        let d = derivative(&GrayImage::new(0, 4), 1, 0);
        assert_eq!((d.width(), d.height()), (0, 4));
        assert!(d.as_slice().is_empty());
    }

    #[test]
    fn uniform_image_has_zero_derivatives() {
        let img = image_from_fn(12, 12, |_, _| 128);
        for (ox, oy) in [(2, 0), (1, 1), (0, 2)] {
            let d = derivative(&img, ox, oy);
            for &v in d.as_slice() {
                assert!(v.abs() < 1e-3, "order ({ox},{oy}) gave {v}");
            }
        }
    }

    #[test]
    fn ramp_first_derivative_equals_slope() {
        let img = image_from_fn(20, 8, |x, _| 10 * x);
        let d = derivative(&img, 1, 0);
        for x in 5..15 {
            let v = d.get(x, 4);
            assert!((v - 10.0).abs() < 1e-2, "at x={x}: {v}");
        }
    }

    #[test]
    fn parabola_second_derivative_equals_curvature() {
        let img = image_from_fn(16, 16, |x, _| x * x);
        let hxx = derivative(&img, 2, 0);
        let hyy = derivative(&img, 0, 2);
        for x in 4..12 {
            let v = hxx.get(x, 8);
            assert!((v - 2.0).abs() < 1e-2, "Hxx at x={x}: {v}");
            assert!(hyy.get(x, 8).abs() < 1e-2);
        }
    }

    #[test]
    fn saddle_mixed_derivative_is_one() {
        let img = image_from_fn(16, 16, |x, y| x * y);
        let hxy = derivative(&img, 1, 1);
        for i in 4..12 {
            let v = hxy.get(i, i);
            assert!((v - 1.0).abs() < 1e-2, "Hxy at ({i},{i}): {v}");
        }
    }
}
