//! Polyline segments built from shared vertices.
//!
//! Consecutive segments of a tracing meet at one vertex. The vertex is
//! stored once and referenced from both segments, so moving it while
//! editing moves the end of one segment and the start of the next.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use crate::types::{Calibration, Point};

/// Shared, mutable handle to a vertex position.
///
/// Clones refer to the same position.
#[derive(Clone, Default)]
pub struct Vertex(Rc<Cell<Point>>);

impl Vertex {
    /// A new vertex at `point`.
    #[must_use]
    pub fn new(point: Point) -> Self {
        Self(Rc::new(Cell::new(point)))
    }

    /// Current position.
    #[must_use]
    pub fn get(&self) -> Point {
        self.0.get()
    }

    /// Move the vertex. Every segment holding this handle sees the move.
    pub fn set(&self, point: Point) {
        self.0.set(point);
    }

    /// Whether both handles refer to the same vertex.
    #[must_use]
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Rc::ptr_eq(&a.0, &b.0)
    }
}

impl fmt::Debug for Vertex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = self.get();
        write!(f, "Vertex({}, {})", p.x, p.y)
    }
}

/// An ordered list of vertices.
#[derive(Debug, Default)]
pub struct Segment {
    vertices: Vec<Vertex>,
}

impl Segment {
    /// An empty segment.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            vertices: Vec::new(),
        }
    }

    /// A segment of fresh vertices at `points`.
    #[must_use]
    pub fn from_points(points: &[Point]) -> Self {
        Self {
            vertices: points.iter().copied().map(Vertex::new).collect(),
        }
    }

    /// Append a fresh vertex.
    pub fn push(&mut self, point: Point) {
        self.vertices.push(Vertex::new(point));
    }

    /// Number of vertices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    /// Whether the segment has no vertices.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Vertex handles in order.
    #[must_use]
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// First vertex.
    #[must_use]
    pub fn first(&self) -> Option<&Vertex> {
        self.vertices.first()
    }

    /// Last vertex.
    #[must_use]
    pub fn last(&self) -> Option<&Vertex> {
        self.vertices.last()
    }

    /// Replace the first vertex with a shared handle.
    pub(crate) fn link_first(&mut self, vertex: Vertex) {
        if let Some(first) = self.vertices.first_mut() {
            *first = vertex;
        }
    }

    /// Current vertex positions.
    #[must_use]
    pub fn points(&self) -> Vec<Point> {
        self.vertices.iter().map(Vertex::get).collect()
    }

    /// Polyline length, scaled by the pixel size of `calibration`.
    #[must_use]
    pub fn length(&self, calibration: &Calibration) -> f64 {
        self.vertices
            .windows(2)
            .map(|pair| {
                let (a, b) = (pair[0].get(), pair[1].get());
                let dx = f64::from(b.x - a.x) * calibration.pixel_width;
                let dy = f64::from(b.y - a.y) * calibration.pixel_height;
                dx.hypot(dy)
            })
            .sum()
    }

    /// Squared distance from `point` to the closest vertex or edge.
    ///
    /// An edge counts only where the perpendicular from `point` lands
    /// on it. Returns `f64::MAX` for an empty segment.
    #[must_use]
    pub fn distance_squared(&self, point: Point) -> f64 {
        let mut best = f64::MAX;
        for v in &self.vertices {
            best = best.min(point.distance_squared(v.get()));
        }
        for pair in self.vertices.windows(2) {
            let (a, b) = (pair[0].get(), pair[1].get());
            let (ex, ey) = (f64::from(b.x - a.x), f64::from(b.y - a.y));
            let (px, py) = (f64::from(point.x - a.x), f64::from(point.y - a.y));
            let dot = ex.mul_add(px, ey * py);
            let edge_len2 = ex.mul_add(ex, ey * ey);
            if dot >= 0.0 && dot <= edge_len2 && edge_len2 > 0.0 {
                let along = dot * dot / edge_len2;
                best = best.min(px.mul_add(px, py * py) - along);
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_clones_share_position() {
        let a = Vertex::new(Point::new(1, 2));
        let b = a.clone();
        b.set(Point::new(5, 6));
        assert_eq!(a.get(), Point::new(5, 6));
        assert!(Vertex::ptr_eq(&a, &b));

        let c = Vertex::new(a.get());
        c.set(Point::new(0, 0));
        assert_eq!(a.get(), Point::new(5, 6));
        assert!(!Vertex::ptr_eq(&a, &c));
    }

    #[test]
    fn length_sums_edges() {
        let s = Segment::from_points(&[Point::new(0, 0), Point::new(3, 4), Point::new(3, 10)]);
        assert!((s.length(&Calibration::default()) - 11.0).abs() < 1e-12);
    }

    #[test]
    fn length_uses_calibration() {
        let s = Segment::from_points(&[Point::new(0, 0), Point::new(3, 4)]);
        let cal = Calibration {
            pixel_width: 2.0,
            pixel_height: 0.5,
            unit: "um".into(),
        };
        // dx = 6, dy = 2
        assert!((s.length(&cal) - 40.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn degenerate_segment_has_zero_length() {
        let p = Point::new(7, 7);
        assert!(Segment::from_points(&[p, p]).length(&Calibration::default()).abs() < 1e-12);
        assert!(Segment::from_points(&[p]).length(&Calibration::default()).abs() < 1e-12);
        assert!(Segment::new().length(&Calibration::default()).abs() < 1e-12);
    }

    #[test]
    fn repeated_vertex_adds_nothing_to_length() {
        let s = Segment::from_points(&[Point::new(0, 0), Point::new(0, 0), Point::new(10, 0)]);
        assert!((s.length(&Calibration::default()) - 10.0).abs() < 1e-12);
    }

    #[test]
    fn distance_to_edge_interior() {
        let s = Segment::from_points(&[Point::new(0, 0), Point::new(10, 0)]);
        assert!((s.distance_squared(Point::new(5, 3)) - 9.0).abs() < 1e-12);
    }

    #[test]
    fn distance_beyond_edge_uses_vertex() {
        let s = Segment::from_points(&[Point::new(0, 0), Point::new(10, 0)]);
        assert!((s.distance_squared(Point::new(13, 4)) - 25.0).abs() < 1e-12);
    }

    #[test]
    fn empty_segment_is_infinitely_far() {
        assert!((Segment::new().distance_squared(Point::new(0, 0)) - f64::MAX).abs() < 1.0);
    }
}
