//! User-adjustable tracing parameters.

use serde::{Deserialize, Serialize};

/// Whether the traced structures are brighter or darker than their
/// background.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Appearance {
    /// Bright structures on a dark background.
    #[default]
    Bright,
    /// Dark structures on a bright background.
    Dark,
}

impl Appearance {
    /// Sign applied to the Hessian so that ridges of this appearance
    /// produce negative eigenvalues.
    #[must_use]
    pub const fn sign(self) -> f32 {
        match self {
            Self::Bright => 1.0,
            Self::Dark => -1.0,
        }
    }

    /// Numeric code used by the data file (0 bright, 1 dark).
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Bright => 0,
            Self::Dark => 1,
        }
    }

    /// Inverse of [`Appearance::code`]; any nonzero code is dark.
    #[must_use]
    pub const fn from_code(code: i64) -> Self {
        if code == 0 { Self::Bright } else { Self::Dark }
    }
}

/// Parameters controlling cost computation, path search, cursor
/// snapping, and segment smoothing.
///
/// Fields are public and unchecked; [`TracingParams::clamped`] brings
/// every field into its supported range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracingParams {
    /// Brightness of the structures to trace.
    pub appearance: Appearance,

    /// Gaussian scale (pixels) of the Hessian used for the cost field.
    pub scale: f32,

    /// Weight of the cost image against the vector-field term in the
    /// path-search edge cost. `1.0` ignores orientation entirely.
    pub gamma: f32,

    /// Half-width of the square searched for the lowest-cost pixel
    /// around the cursor. `0` disables snapping.
    pub snap_range: u32,

    /// Side length of the square path-search window.
    pub window_size: u32,

    /// Half-width of the moving-average smoothing kernel.
    pub half_smooth_range: u32,

    /// Keep every n-th smoothed point.
    pub subsample_factor: u32,

    /// Stroke width when drawing tracings.
    pub line_width: u32,
}

impl TracingParams {
    /// Default [`TracingParams::appearance`].
    pub const DEFAULT_APPEARANCE: Appearance = Appearance::Bright;
    /// Default [`TracingParams::scale`].
    pub const DEFAULT_SCALE: f32 = 2.0;
    /// Default [`TracingParams::gamma`].
    pub const DEFAULT_GAMMA: f32 = 0.7;
    /// Default [`TracingParams::snap_range`].
    pub const DEFAULT_SNAP_RANGE: u32 = 4;
    /// Default [`TracingParams::window_size`].
    pub const DEFAULT_WINDOW_SIZE: u32 = 2500;
    /// Default [`TracingParams::half_smooth_range`].
    pub const DEFAULT_HALF_SMOOTH_RANGE: u32 = 5;
    /// Default [`TracingParams::subsample_factor`].
    pub const DEFAULT_SUBSAMPLE_FACTOR: u32 = 5;
    /// Default [`TracingParams::line_width`].
    pub const DEFAULT_LINE_WIDTH: u32 = 1;

    /// Smallest accepted Hessian scale.
    pub const MIN_SCALE: f32 = 1.0;
    /// Largest accepted snap range.
    pub const MAX_SNAP_RANGE: u32 = 9;
    /// Window sizes are multiples of this step.
    pub const WINDOW_STEP: u32 = 100;
    /// Largest accepted window size.
    pub const MAX_WINDOW_SIZE: u32 = 2500;
    /// Largest accepted half smoothing range.
    pub const MAX_HALF_SMOOTH_RANGE: u32 = 10;
    /// Largest accepted subsample factor.
    pub const MAX_SUBSAMPLE_FACTOR: u32 = 10;
    /// Largest accepted line width.
    pub const MAX_LINE_WIDTH: u32 = 10;

    /// A copy with every field forced into its supported range.
    ///
    /// Window sizes are rounded to the nearest multiple of
    /// [`TracingParams::WINDOW_STEP`]. Non-finite floats fall back to
    /// their defaults.
    #[must_use]
    pub fn clamped(&self) -> Self {
        let scale = if self.scale.is_finite() {
            self.scale.max(Self::MIN_SCALE)
        } else {
            Self::DEFAULT_SCALE
        };
        let gamma = if self.gamma.is_finite() {
            self.gamma.clamp(0.0, 1.0)
        } else {
            Self::DEFAULT_GAMMA
        };
        let step = Self::WINDOW_STEP;
        let window_size = ((self.window_size.saturating_add(step / 2)) / step * step)
            .clamp(step, Self::MAX_WINDOW_SIZE);
        Self {
            appearance: self.appearance,
            scale,
            gamma,
            snap_range: self.snap_range.min(Self::MAX_SNAP_RANGE),
            window_size,
            half_smooth_range: self.half_smooth_range.min(Self::MAX_HALF_SMOOTH_RANGE),
            subsample_factor: self.subsample_factor.clamp(1, Self::MAX_SUBSAMPLE_FACTOR),
            line_width: self.line_width.clamp(1, Self::MAX_LINE_WIDTH),
        }
    }
}

impl Default for TracingParams {
    fn default() -> Self {
        Self {
            appearance: Self::DEFAULT_APPEARANCE,
            scale: Self::DEFAULT_SCALE,
            gamma: Self::DEFAULT_GAMMA,
            snap_range: Self::DEFAULT_SNAP_RANGE,
            window_size: Self::DEFAULT_WINDOW_SIZE,
            half_smooth_range: Self::DEFAULT_HALF_SMOOTH_RANGE,
            subsample_factor: Self::DEFAULT_SUBSAMPLE_FACTOR,
            line_width: Self::DEFAULT_LINE_WIDTH,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_constants() {
        let p = TracingParams::default();
        assert_eq!(p.appearance, Appearance::Bright);
        assert!((p.scale - 2.0).abs() < f32::EPSILON);
        assert!((p.gamma - 0.7).abs() < f32::EPSILON);
        assert_eq!(p.snap_range, 4);
        assert_eq!(p.window_size, 2500);
        assert_eq!(p.half_smooth_range, 5);
        assert_eq!(p.subsample_factor, 5);
        assert_eq!(p.line_width, 1);
        assert_eq!(p.clamped(), p);
    }

    #[test]
    fn clamped_forces_ranges() {
        let p = TracingParams {
            appearance: Appearance::Dark,
            scale: 0.2,
            gamma: 1.5,
            snap_range: 40,
            window_size: 3333,
            half_smooth_range: 99,
            subsample_factor: 0,
            line_width: 0,
        }
        .clamped();
        assert_eq!(p.appearance, Appearance::Dark);
        assert!((p.scale - 1.0).abs() < f32::EPSILON);
        assert!((p.gamma - 1.0).abs() < f32::EPSILON);
        assert_eq!(p.snap_range, 9);
        assert_eq!(p.window_size, 2500);
        assert_eq!(p.half_smooth_range, 10);
        assert_eq!(p.subsample_factor, 1);
        assert_eq!(p.line_width, 1);
    }

    #[test]
    fn window_rounds_to_step() {
        let mut p = TracingParams::default();
        p.window_size = 449;
        assert_eq!(p.clamped().window_size, 400);
        p.window_size = 450;
        assert_eq!(p.clamped().window_size, 500);
        p.window_size = 3;
        assert_eq!(p.clamped().window_size, 100);
    }

    #[test]
    fn non_finite_floats_fall_back_to_defaults() {
        let mut p = TracingParams::default();
        p.scale = f32::NAN;
        p.gamma = f32::INFINITY;
        let c = p.clamped();
        assert!((c.scale - TracingParams::DEFAULT_SCALE).abs() < f32::EPSILON);
        assert!((c.gamma - TracingParams::DEFAULT_GAMMA).abs() < f32::EPSILON);
    }

    #[test]
    fn appearance_codes() {
        assert_eq!(Appearance::from_code(0), Appearance::Bright);
        assert_eq!(Appearance::from_code(1), Appearance::Dark);
        assert_eq!(Appearance::Dark.code(), 1);
    }

    #[test]
    fn serde_roundtrip_and_partial_json() {
        let p = TracingParams {
            gamma: 0.4,
            ..TracingParams::default()
        };
        let json = serde_json::to_string(&p).unwrap();
        let back: TracingParams = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);

        let partial: TracingParams = serde_json::from_str(r#"{"snap_range": 2}"#).unwrap();
        assert_eq!(partial.snap_range, 2);
        assert_eq!(partial.window_size, TracingParams::DEFAULT_WINDOW_SIZE);
    }
}
