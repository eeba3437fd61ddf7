//! A single traced neurite: a chain of segments plus annotations.

use image::GrayImage;

use crate::segment::{Segment, Vertex};
use crate::stats::ValueStats;
use crate::types::{Calibration, Point};

/// Label given to new tracings.
pub const DEFAULT_LABEL: &str = "Default";

/// Multi-segment polyline with type, cluster, and label annotations.
///
/// Adjacent segments share their joining vertex. The `changed` flag
/// tracks whether the tracing needs redrawing; it is set by geometry,
/// type, selection, and highlight changes and cleared by
/// [`Tracing::mark_drawn`].
#[derive(Debug)]
pub struct Tracing {
    id: u32,
    segments: Vec<Segment>,
    type_index: usize,
    cluster_index: usize,
    label: String,
    selected: bool,
    highlighted: bool,
    changed: bool,
}

impl Tracing {
    /// An empty tracing with the given identifier.
    #[must_use]
    pub fn new(id: u32) -> Self {
        Self {
            id,
            segments: Vec::new(),
            type_index: 0,
            cluster_index: 0,
            label: DEFAULT_LABEL.to_owned(),
            selected: false,
            highlighted: false,
            changed: false,
        }
    }

    /// Identifier, unique within the owning collection.
    #[must_use]
    pub const fn id(&self) -> u32 {
        self.id
    }

    /// Append `segment`, linking its first vertex to the last vertex of
    /// the previous segment.
    pub fn add_segment(&mut self, mut segment: Segment) {
        if let Some(joint) = self.segments.last().and_then(Segment::last) {
            segment.link_first(joint.clone());
        }
        self.segments.push(segment);
        self.changed = true;
    }

    /// Segments in order.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Number of segments.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Whether no segment has been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Every vertex handle, including shared joints once per segment.
    pub fn vertices(&self) -> impl Iterator<Item = &Vertex> {
        self.segments.iter().flat_map(Segment::vertices)
    }

    /// Joined vertex positions with shared joints listed once.
    #[must_use]
    pub fn polyline(&self) -> Vec<Point> {
        let mut points = Vec::new();
        for (i, segment) in self.segments.iter().enumerate() {
            let skip = usize::from(i > 0);
            points.extend(segment.vertices().iter().skip(skip).map(Vertex::get));
        }
        points
    }

    /// Total length of all segments.
    #[must_use]
    pub fn length(&self, calibration: &Calibration) -> f64 {
        self.segments.iter().map(|s| s.length(calibration)).sum()
    }

    /// Squared distance from `point` to the nearest segment.
    #[must_use]
    pub fn distance_squared(&self, point: Point) -> f64 {
        self.segments
            .iter()
            .map(|s| s.distance_squared(point))
            .fold(f64::MAX, f64::min)
    }

    /// Add the image intensities along the tracing to `stats`.
    ///
    /// Each edge contributes `steps_per_edge` evenly spaced bilinear
    /// samples starting at its first vertex; the final vertex of the
    /// tracing is sampled once at the end.
    #[allow(clippy::cast_precision_loss)]
    pub fn sample_values(&self, image: &GrayImage, steps_per_edge: usize, stats: &mut ValueStats) {
        let steps = steps_per_edge.max(1);
        for segment in &self.segments {
            for pair in segment.vertices().windows(2) {
                let (a, b) = (pair[0].get(), pair[1].get());
                let dx = f64::from(b.x - a.x) / steps as f64;
                let dy = f64::from(b.y - a.y) / steps as f64;
                for j in 0..steps {
                    let t = j as f64;
                    stats.push(bilinear(
                        image,
                        t.mul_add(dx, f64::from(a.x)),
                        t.mul_add(dy, f64::from(a.y)),
                    ));
                }
            }
        }
        if let Some(last) = self.segments.last().and_then(Segment::last) {
            let p = last.get();
            stats.push(bilinear(image, f64::from(p.x), f64::from(p.y)));
        }
    }

    /// Index into the type table.
    #[must_use]
    pub const fn type_index(&self) -> usize {
        self.type_index
    }

    /// Change the type. Returns whether the value changed.
    pub fn set_type_index(&mut self, index: usize) -> bool {
        if self.type_index == index {
            return false;
        }
        self.type_index = index;
        self.changed = true;
        true
    }

    /// Index into the cluster table.
    #[must_use]
    pub const fn cluster_index(&self) -> usize {
        self.cluster_index
    }

    /// Change the cluster. Returns whether the value changed.
    ///
    /// Clusters are not drawn, so this does not mark the tracing for
    /// redrawing.
    pub fn set_cluster_index(&mut self, index: usize) -> bool {
        let differs = self.cluster_index != index;
        self.cluster_index = index;
        differs
    }

    /// Free-text label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Change the label. Returns whether the value changed.
    pub fn set_label(&mut self, label: &str) -> bool {
        if self.label == label {
            return false;
        }
        label.clone_into(&mut self.label);
        true
    }

    /// Whether the tracing is selected.
    #[must_use]
    pub const fn selected(&self) -> bool {
        self.selected
    }

    /// Select or deselect.
    pub fn set_selected(&mut self, selected: bool) {
        if self.selected != selected {
            self.selected = selected;
            self.changed = true;
        }
    }

    /// Whether the tracing is highlighted.
    #[must_use]
    pub const fn highlighted(&self) -> bool {
        self.highlighted
    }

    /// Highlight or un-highlight.
    pub fn set_highlighted(&mut self, highlighted: bool) {
        if self.highlighted != highlighted {
            self.highlighted = highlighted;
            self.changed = true;
        }
    }

    /// Whether the tracing needs redrawing.
    #[must_use]
    pub const fn changed(&self) -> bool {
        self.changed
    }

    /// Flag the tracing for redrawing after an external geometry edit.
    pub fn mark_changed(&mut self) {
        self.changed = true;
    }

    /// Clear the redraw flag.
    pub fn mark_drawn(&mut self) {
        self.changed = false;
    }
}

/// Bilinear intensity at a sub-pixel position, clamped to the image.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn bilinear(image: &GrayImage, x: f64, y: f64) -> f64 {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return 0.0;
    }
    let x = x.clamp(0.0, f64::from(w - 1));
    let y = y.clamp(0.0, f64::from(h - 1));
    let (x0, y0) = (x.floor() as u32, y.floor() as u32);
    let (x1, y1) = ((x0 + 1).min(w - 1), (y0 + 1).min(h - 1));
    let (fx, fy) = (x - f64::from(x0), y - f64::from(y0));
    let at = |px: u32, py: u32| f64::from(image.get_pixel(px, py).0[0]);
    let top = fx.mul_add(at(x1, y0) - at(x0, y0), at(x0, y0));
    let bottom = fx.mul_add(at(x1, y1) - at(x0, y1), at(x0, y1));
    fy.mul_add(bottom - top, top)
}
