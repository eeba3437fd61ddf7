//! Interactive tracing session.
//!
//! [`TracingSession`] owns the image, its cost field, the path solver,
//! and the tracings, and turns cursor and click events into committed
//! segments. While a tracing is active, every cursor move re-extracts a
//! candidate segment from the last click point to the (optionally
//! snapped) cursor position. Clicking commits the candidate; a second
//! click at the same pixel within [`DOUBLE_CLICK_INTERVAL`] finishes the
//! tracing.
//!
//! The session is single-threaded and contains shared vertex handles,
//! so it is neither `Send` nor `Sync`.

use std::mem;
use std::time::Duration;

use image::GrayImage;
use log::{debug, info, warn};

use crate::costs::{CostField, compute_cost_field};
use crate::derivatives::Differentiator;
use crate::dijkstra::{DirectionMap, PathSolver, SolverParams};
use crate::labels::LabelTables;
use crate::params::TracingParams;
use crate::progress::Progress;
use crate::segment::{Segment, Vertex};
use crate::smoothing::smooth_and_subsample;
use crate::tracing::Tracing;
use crate::tracings::Tracings;
use crate::types::{Calibration, Dimensions, Point, TraceError};

/// Two clicks at the same pixel closer together than this finish the
/// active tracing.
pub const DOUBLE_CLICK_INTERVAL: Duration = Duration::from_millis(500);

/// Distance (pixels) within which the cursor highlights a tracing.
pub const NEARBY_RANGE: f64 = 2.0;

/// Squared distance within which a vertex can be picked for dragging.
const VERTEX_PICK_RANGE_SQUARED: f64 = 4.0 * NEARBY_RANGE * NEARBY_RANGE;

/// What a click did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    /// A new tracing was started at the click point.
    Started {
        /// Identifier reserved for the new tracing.
        id: u32,
    },
    /// The candidate segment ended at the click point and the tracing
    /// continues from there.
    SegmentEnded {
        /// Whether the candidate had enough points to be kept.
        committed: bool,
    },
    /// A double click finished the tracing.
    Finished {
        /// Identifier of the stored tracing, `None` when it was empty and
        /// therefore dropped.
        id: Option<u32>,
    },
}

/// Effect of a parameter update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamChange {
    /// Nothing changed.
    Unchanged,
    /// Only display, snapping, or smoothing settings changed.
    Display,
    /// Path-search settings changed; the direction map will be
    /// recomputed on the next cursor move.
    PathsStale,
    /// Appearance or scale changed; the cost field was discarded and must
    /// be recomputed.
    CostsInvalidated,
}

#[derive(Debug, Clone)]
struct PickedVertex {
    tracing: usize,
    vertex: Vertex,
}

/// State of one tracing session on one image.
pub struct TracingSession {
    image: GrayImage,
    dims: Dimensions,
    params: TracingParams,
    labels: LabelTables,
    calibration: Calibration,

    costs: Option<CostField>,
    solver: PathSolver,
    map_valid: bool,
    map_stale: bool,

    tracings: Tracings,
    active: Option<Tracing>,
    candidate: Vec<Point>,

    click_point: Point,
    last_click: Option<Duration>,
    cursor: Option<Point>,
    snap_point: Point,
    current: Point,

    snap: bool,
    manual: bool,
    smoothing: bool,

    picked: Option<PickedVertex>,
    unsaved: bool,
}

impl TracingSession {
    /// A session on `image` with no cost field and no tracings.
    #[must_use]
    pub fn new(image: GrayImage, params: TracingParams, labels: LabelTables) -> Self {
        let dims = Dimensions::of(&image);
        Self {
            image,
            dims,
            params: params.clamped(),
            labels,
            calibration: Calibration::default(),
            costs: None,
            solver: PathSolver::new(),
            map_valid: false,
            map_stale: false,
            tracings: Tracings::new(),
            active: None,
            candidate: Vec::new(),
            click_point: Point::default(),
            last_click: None,
            cursor: None,
            snap_point: Point::default(),
            current: Point::default(),
            snap: true,
            manual: false,
            smoothing: true,
            picked: None,
            unsaved: false,
        }
    }

    /// Switch to a new image, discarding tracings, the cost field, and
    /// mode switches. Tracing ids restart at 1. Parameters and label
    /// tables are kept.
    pub fn attach(&mut self, image: GrayImage) {
        self.dims = Dimensions::of(&image);
        self.image = image;
        self.calibration = Calibration::default();
        self.costs = None;
        self.map_valid = false;
        self.map_stale = false;
        self.tracings.reset();
        self.active = None;
        self.candidate.clear();
        self.click_point = Point::default();
        self.last_click = None;
        self.cursor = None;
        self.snap_point = Point::default();
        self.current = Point::default();
        self.snap = true;
        self.manual = false;
        self.smoothing = true;
        self.picked = None;
        self.unsaved = false;
        info!("attached {}x{} image", self.dims.width, self.dims.height);
    }

    // --- accessors ---

    /// The grayscale image being traced.
    #[must_use]
    pub const fn image(&self) -> &GrayImage {
        &self.image
    }

    /// Image dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dims
    }

    /// Current parameters.
    #[must_use]
    pub const fn params(&self) -> &TracingParams {
        &self.params
    }

    /// Type and cluster tables.
    #[must_use]
    pub const fn labels(&self) -> &LabelTables {
        &self.labels
    }

    /// Pixel calibration used for lengths.
    #[must_use]
    pub const fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    /// Change the pixel calibration.
    pub fn set_calibration(&mut self, calibration: Calibration) {
        self.calibration = calibration;
    }

    /// The cost field, if computed.
    #[must_use]
    pub const fn cost_field(&self) -> Option<&CostField> {
        self.costs.as_ref()
    }

    /// The direction map for the current click point, if up to date.
    #[must_use]
    pub fn direction_map(&self) -> Option<&DirectionMap> {
        (self.map_valid && !self.map_stale).then(|| self.solver.map())
    }

    /// Finished tracings.
    #[must_use]
    pub const fn tracings(&self) -> &Tracings {
        &self.tracings
    }

    /// The tracing being built, if any.
    #[must_use]
    pub const fn active_tracing(&self) -> Option<&Tracing> {
        self.active.as_ref()
    }

    /// Whether a tracing is being built.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Candidate segment from the click point to the current point.
    #[must_use]
    pub fn candidate(&self) -> &[Point] {
        &self.candidate
    }

    /// Last click point (seed of the path search).
    #[must_use]
    pub const fn click_point(&self) -> Point {
        self.click_point
    }

    /// Current point: the snapped cursor when snapping is on, the raw
    /// cursor otherwise. `None` before the first cursor event.
    #[must_use]
    pub fn current_point(&self) -> Option<Point> {
        self.cursor.map(|_| self.current)
    }

    /// Position of the vertex picked for dragging.
    #[must_use]
    pub fn picked_vertex(&self) -> Option<Point> {
        self.picked.as_ref().map(|p| p.vertex.get())
    }

    /// Whether cursor snapping is on.
    #[must_use]
    pub const fn snap_enabled(&self) -> bool {
        self.snap
    }

    /// Whether manual (straight-line) tracing is on.
    #[must_use]
    pub const fn manual_enabled(&self) -> bool {
        self.manual
    }

    /// Whether candidate smoothing is on.
    #[must_use]
    pub const fn smoothing_enabled(&self) -> bool {
        self.smoothing
    }

    /// Whether anything changed since [`TracingSession::mark_saved`].
    #[must_use]
    pub const fn has_unsaved_changes(&self) -> bool {
        self.unsaved
    }

    /// Record that the current state has been persisted.
    pub const fn mark_saved(&mut self) {
        self.unsaved = false;
    }

    /// Whether any tracing needs redrawing.
    #[must_use]
    pub fn needs_redraw(&self) -> bool {
        self.tracings.any_changed() || self.active.as_ref().is_some_and(Tracing::changed)
    }

    /// Clear the redraw flag of every tracing.
    pub fn mark_drawn(&mut self) {
        for tracing in self.tracings.iter_mut().chain(self.active.as_mut()) {
            tracing.mark_drawn();
        }
    }

    // --- cost field ---

    /// Compute the cost field with the current appearance and scale.
    ///
    /// # Errors
    ///
    /// Propagates [`TraceError::OutOfMemory`]; the previous cost field
    /// is kept in that case.
    pub fn compute_costs(
        &mut self,
        differentiator: &dyn Differentiator,
        progress: &mut dyn Progress,
    ) -> Result<(), TraceError> {
        let field = compute_cost_field(
            &self.image,
            self.params.appearance,
            self.params.scale,
            differentiator,
            progress,
        )?;
        self.install_costs(field);
        Ok(())
    }

    /// The cost field rendered as an 8-bit image.
    ///
    /// # Errors
    ///
    /// Returns [`TraceError::NoCostField`] if no cost field is available.
    pub fn cost_image(&self) -> Result<GrayImage, TraceError> {
        self.costs
            .as_ref()
            .map(CostField::to_gray_image)
            .ok_or(TraceError::NoCostField)
    }

    /// Use a precomputed cost field.
    ///
    /// Returns `false` (and keeps the current field) when the field does
    /// not match the image dimensions.
    pub fn set_cost_field(&mut self, field: CostField) -> bool {
        if field.dimensions() != self.dims {
            warn!("ignoring cost field with mismatched dimensions");
            return false;
        }
        self.install_costs(field);
        true
    }

    fn install_costs(&mut self, field: CostField) {
        self.costs = Some(field);
        self.map_valid = false;
        self.map_stale = self.active.is_some();
    }

    // --- tracing ---

    /// Handle a cursor move to `point`.
    ///
    /// Returns whether the cursor entered a new pixel.
    ///
    /// # Errors
    ///
    /// Returns solver errors from recomputing a stale direction map.
    /// The cursor is not updated in that case.
    pub fn cursor_moved(&mut self, point: Point) -> Result<bool, TraceError> {
        let point = self.dims.clamp_off_border(point);
        if self.cursor == Some(point) {
            return Ok(false);
        }
        self.refresh_map()?;

        self.cursor = Some(point);
        self.snap_point = self.find_snap_point(point);
        self.current = if self.snap { self.snap_point } else { point };
        self.update_candidate();
        Ok(true)
    }

    /// Handle a click at `point` at time `at` (any monotonic clock).
    ///
    /// # Errors
    ///
    /// Returns solver errors from the implied cursor move.
    pub fn click(&mut self, point: Point, at: Duration) -> Result<ClickOutcome, TraceError> {
        self.cursor_moved(point)?;

        let previous_click = self.click_point;
        let previous_time = self.last_click.replace(at);
        self.click_point = self.current;
        debug!(
            "clicked point ({},{})",
            self.click_point.x, self.click_point.y
        );

        if self.active.is_none() {
            let id = self.tracings.next_id();
            self.active = Some(Tracing::new(id));
            self.candidate.clear();
            self.map_valid = false;
            self.map_stale = true;
            info!("started tracing N{id}");
            return Ok(ClickOutcome::Started { id });
        }

        let committed = self.commit_candidate();
        let quick = previous_time.is_some_and(|t| at.saturating_sub(t) < DOUBLE_CLICK_INTERVAL);
        if quick && previous_click == self.click_point {
            return Ok(ClickOutcome::Finished {
                id: self.finish_active(),
            });
        }
        Ok(ClickOutcome::SegmentEnded { committed })
    }

    /// Commit the candidate and finish the active tracing.
    ///
    /// Returns the identifier of the stored tracing, or `None` if no
    /// tracing was active or it had no segments.
    pub fn finish(&mut self) -> Option<u32> {
        self.active.as_ref()?;
        self.commit_candidate();
        self.finish_active()
    }

    /// Turn cursor snapping on or off.
    ///
    /// # Errors
    ///
    /// Returns solver errors from re-extracting the candidate.
    pub fn set_snap(&mut self, on: bool) -> Result<(), TraceError> {
        if self.snap == on {
            return Ok(());
        }
        info!("switching {} local snapping", if on { "on" } else { "off" });
        self.snap = on;
        if let Some(cursor) = self.cursor {
            self.current = if on { self.snap_point } else { cursor };
        }
        self.refresh_candidate()
    }

    /// Turn manual (straight-line) tracing on or off.
    ///
    /// # Errors
    ///
    /// Returns solver errors from re-extracting the candidate.
    pub fn set_manual(&mut self, on: bool) -> Result<(), TraceError> {
        if self.manual == on {
            return Ok(());
        }
        info!(
            "{}",
            if on {
                "switching to manual tracing mode"
            } else {
                "back to automatic tracing mode"
            }
        );
        self.manual = on;
        self.refresh_candidate()
    }

    /// Turn candidate smoothing on or off.
    ///
    /// # Errors
    ///
    /// Returns solver errors from re-extracting the candidate.
    pub fn set_smoothing(&mut self, on: bool) -> Result<(), TraceError> {
        if self.smoothing == on {
            return Ok(());
        }
        info!("{} segment smoothing", if on { "enabling" } else { "disabling" });
        self.smoothing = on;
        self.refresh_candidate()
    }

    fn refresh_candidate(&mut self) -> Result<(), TraceError> {
        if self.active.is_some() {
            self.refresh_map()?;
            self.update_candidate();
        }
        Ok(())
    }

    /// Recompute the direction map if a click made it stale.
    fn refresh_map(&mut self) -> Result<(), TraceError> {
        if !self.map_stale {
            return Ok(());
        }
        let Some(field) = self.costs.as_ref() else {
            self.map_stale = false;
            self.map_valid = false;
            return Ok(());
        };
        debug!(
            "computing shortest paths to clicked point ({},{})",
            self.click_point.x, self.click_point.y
        );
        self.solver.solve(
            field,
            self.click_point,
            &SolverParams::from_params(&self.params),
        )?;
        self.map_stale = false;
        self.map_valid = true;
        Ok(())
    }

    /// Lowest-cost pixel within the snap range of `point`. Earlier
    /// pixels in row-major order win ties.
    fn find_snap_point(&self, point: Point) -> Point {
        let Some(field) = self.costs.as_ref() else {
            return point;
        };
        let Some(mut best_cost) = field.cost_at(point) else {
            return point;
        };
        let r = i32::try_from(self.params.snap_range).unwrap_or(i32::MAX);
        let max_x = i32::try_from(self.dims.width).unwrap_or(i32::MAX) - 2;
        let max_y = i32::try_from(self.dims.height).unwrap_or(i32::MAX) - 2;
        let mut best = point;
        for y in (point.y - r).max(1)..=(point.y + r).min(max_y) {
            for x in (point.x - r).max(1)..=(point.x + r).min(max_x) {
                let candidate = Point::new(x, y);
                if let Some(cost) = field.cost_at(candidate)
                    && cost < best_cost
                {
                    best = candidate;
                    best_cost = cost;
                }
            }
        }
        best
    }

    /// Re-extract the candidate segment for the current point.
    fn update_candidate(&mut self) {
        self.candidate.clear();
        if self.active.is_none() || self.cursor.is_none() || self.current == self.click_point {
            return;
        }
        if self.manual || !self.map_valid || self.map_stale {
            self.candidate.extend([self.click_point, self.current]);
            return;
        }
        let mut path = self.solver.map().trace_to_seed(self.current);
        path.reverse();
        if self.smoothing {
            path = smooth_and_subsample(
                &path,
                self.params.half_smooth_range as usize,
                self.params.subsample_factor as usize,
            );
        }
        self.candidate = path;
    }

    /// Move the candidate into the active tracing if it has at least two
    /// points. The candidate is cleared either way.
    fn commit_candidate(&mut self) -> bool {
        let candidate = mem::take(&mut self.candidate);
        self.map_stale = true;
        let Some(active) = self.active.as_mut() else {
            return false;
        };
        if candidate.len() < 2 {
            info!("dumping segment of zero length");
            return false;
        }
        let segment = Segment::from_points(&candidate);
        info!(
            "adding segment of length {:.3} {}",
            segment.length(&self.calibration),
            self.calibration.unit
        );
        active.add_segment(segment);
        self.unsaved = true;
        true
    }

    fn finish_active(&mut self) -> Option<u32> {
        let tracing = self.active.take()?;
        self.candidate.clear();
        self.map_valid = false;
        self.map_stale = false;
        if tracing.is_empty() {
            info!("dumping tracing of zero length");
            return None;
        }
        let id = tracing.id();
        info!(
            "adding tracing N{id} of length {:.3} {}",
            tracing.length(&self.calibration),
            self.calibration.unit
        );
        self.tracings.push(tracing);
        self.unsaved = true;
        Some(id)
    }

    // --- editing ---

    /// Highlight the tracing nearest to `point` if it lies within
    /// [`NEARBY_RANGE`]; all other tracings are un-highlighted.
    ///
    /// Returns the index of the highlighted tracing.
    pub fn highlight_nearest(&mut self, point: Point) -> Option<usize> {
        let mut nearest: Option<(usize, f64)> = None;
        for (index, tracing) in self.tracings.iter_mut().enumerate() {
            tracing.set_highlighted(false);
            let dist = tracing.distance_squared(point);
            if nearest.is_none_or(|(_, best)| dist < best) {
                nearest = Some((index, dist));
            }
        }
        let (index, dist) = nearest?;
        if dist > NEARBY_RANGE * NEARBY_RANGE {
            return None;
        }
        if let Some(tracing) = self.tracings.get_mut(index) {
            tracing.set_highlighted(true);
        }
        Some(index)
    }

    /// Select the tracing at `index`, or deselect (and un-highlight) it
    /// if already selected. Returns the new selection state.
    ///
    /// # Errors
    ///
    /// Returns [`TraceError::IndexOutOfRange`] for an invalid index.
    pub fn toggle_selection(&mut self, index: usize) -> Result<bool, TraceError> {
        let len = self.tracings.len();
        let tracing = self
            .tracings
            .get_mut(index)
            .ok_or(TraceError::IndexOutOfRange { index, len })?;
        let select = !tracing.selected();
        tracing.set_selected(select);
        if !select {
            tracing.set_highlighted(false);
        }
        info!(
            "{} tracing N{}",
            if select { "selecting" } else { "deselecting" },
            tracing.id()
        );
        Ok(select)
    }

    /// Delete the tracing at `index`; later tracings shift down.
    ///
    /// # Errors
    ///
    /// Returns [`TraceError::IndexOutOfRange`] for an invalid index.
    pub fn delete_tracing(&mut self, index: usize) -> Result<Tracing, TraceError> {
        let removed = self.tracings.remove(index)?;
        info!("deleting tracing N{}", removed.id());
        self.picked = None;
        self.unsaved = true;
        Ok(removed)
    }

    /// Remove all finished tracings. Identifiers are not reused.
    pub fn erase_tracings(&mut self) {
        info!("erasing {} tracings", self.tracings.len());
        self.tracings.clear();
        self.picked = None;
        self.unsaved = true;
    }

    /// Pick the vertex nearest to `point` (closer than twice
    /// [`NEARBY_RANGE`]) for dragging. Returns whether one was picked.
    pub fn pick_vertex(&mut self, point: Point) -> bool {
        let mut best: Option<(PickedVertex, f64)> = None;
        for (index, tracing) in self.tracings.iter().enumerate() {
            for vertex in tracing.vertices() {
                let dist = point.distance_squared(vertex.get());
                if dist < VERTEX_PICK_RANGE_SQUARED && best.as_ref().is_none_or(|(_, d)| dist < *d) {
                    best = Some((
                        PickedVertex {
                            tracing: index,
                            vertex: vertex.clone(),
                        },
                        dist,
                    ));
                }
            }
        }
        self.picked = best.map(|(picked, _)| picked);
        self.picked.is_some()
    }

    /// Move the picked vertex by `(dx, dy)`. Returns whether it moved.
    pub fn drag_vertex_by(&mut self, dx: i32, dy: i32) -> bool {
        if dx == 0 && dy == 0 {
            return false;
        }
        let Some(picked) = self.picked.as_ref() else {
            return false;
        };
        picked.vertex.set(picked.vertex.get().offset(dx, dy));
        if let Some(tracing) = self.tracings.get_mut(picked.tracing) {
            tracing.mark_changed();
        }
        self.unsaved = true;
        true
    }

    /// Drop the vertex pick.
    pub fn release_vertex(&mut self) {
        self.picked = None;
    }

    /// Change type, cluster, and label of the tracing at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`TraceError::IndexOutOfRange`] for an invalid tracing,
    /// type, or cluster index. Nothing is changed in that case.
    pub fn set_attributes(
        &mut self,
        index: usize,
        type_index: usize,
        cluster_index: usize,
        label: &str,
    ) -> Result<(), TraceError> {
        let types = self.labels.types.len();
        if type_index >= types {
            return Err(TraceError::IndexOutOfRange {
                index: type_index,
                len: types,
            });
        }
        let clusters = self.labels.clusters.len();
        if cluster_index >= clusters {
            return Err(TraceError::IndexOutOfRange {
                index: cluster_index,
                len: clusters,
            });
        }
        let len = self.tracings.len();
        let tracing = self
            .tracings
            .get_mut(index)
            .ok_or(TraceError::IndexOutOfRange { index, len })?;
        let mut differs = tracing.set_type_index(type_index);
        differs |= tracing.set_cluster_index(cluster_index);
        differs |= tracing.set_label(label);
        if differs {
            self.unsaved = true;
        }
        Ok(())
    }

    // --- parameters and documents ---

    /// Apply new parameters (clamped to their ranges).
    #[allow(clippy::float_cmp)]
    pub fn set_params(&mut self, params: &TracingParams) -> ParamChange {
        let new = params.clamped();
        let old = mem::replace(&mut self.params, new.clone());
        let change = if old.appearance != new.appearance || old.scale != new.scale {
            if self.costs.take().is_some() {
                warn!("appearance or scale changed; cost field must be recomputed");
            }
            self.map_valid = false;
            self.map_stale = self.active.is_some();
            ParamChange::CostsInvalidated
        } else if old.gamma != new.gamma || old.window_size != new.window_size {
            self.map_stale = self.active.is_some();
            ParamChange::PathsStale
        } else if old != new {
            ParamChange::Display
        } else {
            ParamChange::Unchanged
        };
        if change != ParamChange::Unchanged {
            self.unsaved = true;
        }
        change
    }

    /// Swap in a loaded document. Any active tracing is discarded and the
    /// session counts as saved afterwards. New ids continue after both
    /// the loaded ones and those issued before.
    pub fn replace_tracings(
        &mut self,
        params: &TracingParams,
        labels: LabelTables,
        tracings: Tracings,
    ) -> ParamChange {
        if let Some(active) = self.active.take() {
            debug!("discarding active tracing N{}", active.id());
        }
        self.candidate.clear();
        self.picked = None;
        let change = self.set_params(params);
        self.labels = labels;
        let issued = self.tracings.last_id();
        self.tracings = tracings;
        self.tracings.observe_id(issued);
        self.unsaved = false;
        info!("loaded {} tracings", self.tracings.len());
        change
    }
}
