//! Shared types for the wiretrace engine.

use serde::{Deserialize, Serialize};

/// Re-export `GrayImage` so downstream crates can pass pixel sources
/// around without depending on `image` directly.
pub use image::GrayImage;

/// An integer pixel coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: i32,
    /// Vertical position (pixels from top edge).
    pub y: i32,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    ///
    /// Avoids the square root for comparison purposes.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = f64::from(self.x - other.x);
        let dy = f64::from(self.y - other.y);
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// The point shifted by `(dx, dy)`.
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Dimensions of a grayscale image.
    #[must_use]
    pub fn of(image: &GrayImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
        }
    }

    /// Total number of pixels.
    #[must_use]
    pub const fn pixel_count(self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Whether `point` lies strictly inside the image, at least one
    /// pixel away from every border.
    #[must_use]
    pub const fn is_interior(self, point: Point) -> bool {
        point.x > 0
            && point.y > 0
            && (point.x as i64) < self.width as i64 - 1
            && (point.y as i64) < self.height as i64 - 1
    }

    /// Move `point` one pixel inward when it lies on the image border.
    ///
    /// The path solver needs a one-pixel margin around its seed, so cursor
    /// positions are nudged off the border before they are used.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn clamp_off_border(self, point: Point) -> Point {
        let max_x = self.width as i32 - 1;
        let max_y = self.height as i32 - 1;
        let mut x = point.x;
        let mut y = point.y;
        if x <= 0 {
            x = 1;
        } else if x >= max_x {
            x = max_x - 1;
        }
        if y <= 0 {
            y = 1;
        } else if y >= max_y {
            y = max_y - 1;
        }
        Point::new(x, y)
    }
}

/// Physical pixel size used for calibrated length measurements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    /// Width of one pixel in `unit`.
    pub pixel_width: f64,
    /// Height of one pixel in `unit`.
    pub pixel_height: f64,
    /// Length unit name.
    pub unit: String,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            pixel_width: 1.0,
            pixel_height: 1.0,
            unit: String::from("pixel"),
        }
    }
}

/// A single-channel `f32` raster stored row-major.
///
/// Used for the cost image, the two vector-field components, and the
/// intermediate Hessian components.
#[derive(Debug, Clone, PartialEq)]
pub struct FloatImage {
    width: u32,
    height: u32,
    data: Vec<f32>,
}

impl FloatImage {
    /// Allocate a zero-filled image.
    ///
    /// # Errors
    ///
    /// Returns [`TraceError::OutOfMemory`] if the buffer cannot be
    /// allocated.
    pub fn try_zeros(width: u32, height: u32) -> Result<Self, TraceError> {
        let data = try_alloc(width as usize * height as usize, 0.0_f32)
            .ok_or(TraceError::OutOfMemory { width, height })?;
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Wrap an existing row-major buffer.
    ///
    /// Returns `None` when `data.len() != width * height`.
    #[must_use]
    pub fn from_raw(width: u32, height: u32, data: Vec<f32>) -> Option<Self> {
        (data.len() == width as usize * height as usize).then_some(Self {
            width,
            height,
            data,
        })
    }

    /// Width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Image dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.width,
            height: self.height,
        }
    }

    /// Value at `(x, y)`. Panics on out-of-range coordinates like slice indexing.
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.data[y as usize * self.width as usize + x as usize]
    }

    /// Overwrite the value at `(x, y)`.
    pub fn set(&mut self, x: u32, y: u32, value: f32) {
        let index = y as usize * self.width as usize + x as usize;
        self.data[index] = value;
    }

    /// Value at an integer point, `None` outside the image.
    #[must_use]
    pub fn at(&self, point: Point) -> Option<f32> {
        let x = u32::try_from(point.x).ok()?;
        let y = u32::try_from(point.y).ok()?;
        (x < self.width && y < self.height).then(|| self.get(x, y))
    }

    /// Row-major pixel values.
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Mutable row-major pixel values.
    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }
}

/// Allocate `len` copies of `value`, reporting allocation failure
/// instead of aborting.
pub(crate) fn try_alloc<T: Clone>(len: usize, value: T) -> Option<Vec<T>> {
    let mut buffer = Vec::new();
    buffer.try_reserve_exact(len).ok()?;
    buffer.resize(len, value);
    Some(buffer)
}

/// Errors that can occur in the tracing engine.
#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// Buffers for an image of the given size could not be allocated.
    #[error("not enough memory for the computations on a {width}x{height} image")]
    OutOfMemory {
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
    },

    /// The path solver was seeded on or outside the image border.
    #[error("starting point ({x},{y}) on or outside border of image")]
    SeedOnBorder {
        /// Seed x coordinate.
        x: i32,
        /// Seed y coordinate.
        y: i32,
    },

    /// The search window is too large for cumulative costs to stay
    /// within the queue's integer range.
    #[error("path-search window size {size} exceeds the safe maximum {max}")]
    WindowTooLarge {
        /// Requested window size.
        size: u32,
        /// Largest accepted window size.
        max: u32,
    },

    /// A path needs at least two waypoints.
    #[error("need at least two waypoints, got {count}")]
    TooFewWaypoints {
        /// Number of waypoints given.
        count: usize,
    },

    /// An operation needed a cost field that has not been computed.
    #[error("cost image has not been computed")]
    NoCostField,

    /// An index did not refer to an existing tracing or table entry.
    #[error("index {index} out of range for {len} entries")]
    IndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Collection length.
        len: usize,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn point_distance() {
        let a = Point::new(0, 0);
        let b = Point::new(3, 4);
        assert!((a.distance(b) - 5.0).abs() < f64::EPSILON);
        assert!((a.distance_squared(b) - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn interior_excludes_border() {
        let dims = Dimensions {
            width: 10,
            height: 10,
        };
        assert!(dims.is_interior(Point::new(1, 1)));
        assert!(dims.is_interior(Point::new(8, 8)));
        assert!(!dims.is_interior(Point::new(0, 5)));
        assert!(!dims.is_interior(Point::new(9, 5)));
        assert!(!dims.is_interior(Point::new(5, -1)));
        assert!(!dims.is_interior(Point::new(5, 10)));
    }

    #[test]
    fn clamp_moves_border_points_inward() {
        let dims = Dimensions {
            width: 10,
            height: 8,
        };
        assert_eq!(dims.clamp_off_border(Point::new(0, 0)), Point::new(1, 1));
        assert_eq!(dims.clamp_off_border(Point::new(9, 7)), Point::new(8, 6));
        assert_eq!(dims.clamp_off_border(Point::new(4, 3)), Point::new(4, 3));
        assert_eq!(dims.clamp_off_border(Point::new(-5, 20)), Point::new(1, 6));
    }

    #[test]
    fn float_image_roundtrip_access() {
        let mut img = FloatImage::try_zeros(3, 2).unwrap();
        img.set(2, 1, 7.5);
        assert!((img.get(2, 1) - 7.5).abs() < f32::EPSILON);
        assert_eq!(img.at(Point::new(2, 1)), Some(7.5));
        assert_eq!(img.at(Point::new(3, 1)), None);
        assert_eq!(img.at(Point::new(-1, 0)), None);
    }

    #[test]
    fn from_raw_rejects_wrong_length() {
        assert!(FloatImage::from_raw(2, 2, vec![0.0; 3]).is_none());
        assert!(FloatImage::from_raw(2, 2, vec![0.0; 4]).is_some());
    }
}
