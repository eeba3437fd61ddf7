//! Hessian-based ridge cost field.
//!
//! For every pixel the Hessian of the image at the chosen scale is
//! decomposed into a ridge strength and a ridge orientation. Strength is
//! mapped onto an inverted `[0, 255]` cost so that pixels on elongated
//! structures of the selected [`Appearance`] are cheap to traverse. The
//! orientation is stored as a unit vector field used by the path solver
//! to penalize steps that cut across a ridge.

use std::time::Instant;

use image::{GrayImage, Luma};
use log::{debug, info};

use crate::derivatives::Differentiator;
use crate::params::Appearance;
use crate::progress::{Progress, SubRange};
use crate::types::{Dimensions, FloatImage, Point, TraceError};

/// Highest cost value; also assigned to every pixel of a featureless
/// image.
pub const MAX_COST: f32 = 255.0;

/// The cost image and its companion orientation field.
#[derive(Debug, Clone, PartialEq)]
pub struct CostField {
    costs: FloatImage,
    vx: FloatImage,
    vy: FloatImage,
}

impl CostField {
    /// Assemble a cost field from precomputed components.
    ///
    /// Returns `None` when the three images differ in size.
    #[must_use]
    pub fn from_parts(costs: FloatImage, vx: FloatImage, vy: FloatImage) -> Option<Self> {
        let dims = costs.dimensions();
        (vx.dimensions() == dims && vy.dimensions() == dims).then_some(Self { costs, vx, vy })
    }

    /// Dimensions shared by all components.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.costs.dimensions()
    }

    /// Normalized cost image.
    #[must_use]
    pub const fn costs(&self) -> &FloatImage {
        &self.costs
    }

    /// X component of the orientation field.
    #[must_use]
    pub const fn vx(&self) -> &FloatImage {
        &self.vx
    }

    /// Y component of the orientation field.
    #[must_use]
    pub const fn vy(&self) -> &FloatImage {
        &self.vy
    }

    /// Cost at `point`, `None` outside the image.
    #[must_use]
    pub fn cost_at(&self, point: Point) -> Option<f32> {
        self.costs.at(point)
    }

    /// Orientation vector at `point`, `None` outside the image.
    #[must_use]
    pub fn vector_at(&self, point: Point) -> Option<(f32, f32)> {
        Some((self.vx.at(point)?, self.vy.at(point)?))
    }

    /// The cost image truncated to 8 bits for display or export.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn to_gray_image(&self) -> GrayImage {
        GrayImage::from_fn(self.costs.width(), self.costs.height(), |x, y| {
            Luma([self.costs.get(x, y).clamp(0.0, MAX_COST) as u8])
        })
    }
}

/// Ridge strength and orientation derived from one Hessian sample.
///
/// `inv` is `+1` for bright and `-1` for dark structures. Returns the
/// strength (zero for the wrong curvature sign) and the unnormalized
/// orientation vector.
#[must_use]
pub fn ridge_response(hxx: f32, hxy: f32, hyy: f32, inv: f32) -> (f32, f32, f32) {
    let b1 = inv * (hxx + hyy);
    let b2 = inv * (hxx - hyy);
    let d = (4.0 * hxy * hxy + b2 * b2).sqrt();
    let l1 = (b1 + 2.0 * d) / 3.0;
    let l2 = (b1 - 2.0 * d) / 3.0;
    let vy = 2.0 * inv * hxy;
    if l1.abs() > l2.abs() {
        (if l1 > 0.0 { 0.0 } else { l1.abs() }, b2 - d, vy)
    } else {
        (if l2 > 0.0 { 0.0 } else { l2.abs() }, b2 + d, vy)
    }
}

/// Compute the cost field of `image`.
///
/// Progress is reported in four phases: `Hxx` (0 to 0.3), `Hxy`
/// (0.3 to 0.6), `Hyy` (0.6 to 0.9), and the eigen analysis (0.9 to 1).
///
/// # Errors
///
/// Returns [`TraceError::OutOfMemory`] if any working buffer cannot be
/// allocated. Nothing is returned in that case.
pub fn compute_cost_field(
    image: &GrayImage,
    appearance: Appearance,
    scale: f32,
    differentiator: &dyn Differentiator,
    progress: &mut dyn Progress,
) -> Result<CostField, TraceError> {
    let started = Instant::now();
    let (width, height) = image.dimensions();
    info!("computing cost field for {width}x{height} image at scale {scale}");

    progress.status("Computing derivatives...");
    let hxx = differentiator.derivative(
        image,
        scale,
        2,
        0,
        &mut SubRange::new(progress, 0.0, 0.3),
    )?;
    let hxy = differentiator.derivative(
        image,
        scale,
        1,
        1,
        &mut SubRange::new(progress, 0.3, 0.6),
    )?;
    let hyy = differentiator.derivative(
        image,
        scale,
        0,
        2,
        &mut SubRange::new(progress, 0.6, 0.9),
    )?;

    progress.status("Computing eigenimages...");
    let inv = appearance.sign();
    let mut costs = FloatImage::try_zeros(width, height)?;
    let mut vx = FloatImage::try_zeros(width, height)?;
    let mut vy = FloatImage::try_zeros(width, height)?;

    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    {
        let values = costs.as_mut_slice();
        let xs = vx.as_mut_slice();
        let ys = vy.as_mut_slice();
        for i in 0..values.len() {
            let (value, x, y) =
                ridge_response(hxx.as_slice()[i], hxy.as_slice()[i], hyy.as_slice()[i], inv);
            values[i] = value;
            xs[i] = x;
            ys[i] = y;
            min = min.min(value);
            max = max.max(value);
        }
    }
    progress.report(0.95);

    normalize_costs(costs.as_mut_slice(), min, max);
    normalize_vectors(vx.as_mut_slice(), vy.as_mut_slice());
    progress.report(1.0);

    debug!("ridge strength range [{min}, {max}]");
    info!(
        "cost field computed in {} ms",
        started.elapsed().as_millis()
    );
    Ok(CostField { costs, vx, vy })
}

/// Map strengths in `[min, max]` onto inverted costs in `[0, 255]`.
fn normalize_costs(values: &mut [f32], min: f32, max: f32) {
    let range = max - min;
    if range <= 0.0 || !range.is_finite() {
        values.fill(MAX_COST);
        return;
    }
    let factor = MAX_COST / range;
    for v in values {
        *v = MAX_COST - (*v - min) * factor;
    }
}

fn normalize_vectors(xs: &mut [f32], ys: &mut [f32]) {
    for (x, y) in xs.iter_mut().zip(ys.iter_mut()) {
        let len = x.hypot(*y);
        if len > 0.0 {
            *x /= len;
            *y /= len;
        }
    }
}
