//! Shortest-path search over the cost field.
//!
//! Dijkstra's algorithm specialised for small integer edge costs: every
//! step between 8-connected pixels costs at most 255, so pending
//! cumulative costs always fit in 256 consecutive values and a circular
//! [`BucketQueue`] keyed by `cost mod 256` replaces the heap.
//!
//! The result is a [`DirectionMap`] that stores, for each pixel of the
//! search window, the step leading back towards the seed.

use std::time::Instant;

use log::debug;

use crate::costs::CostField;
use crate::params::TracingParams;
use crate::queue::BucketQueue;
use crate::types::{Dimensions, Point, TraceError, try_alloc};

/// Upper bound of a single step cost.
pub const MAX_EDGE_COST: u32 = 255;

/// Largest search window for which cumulative costs provably stay below
/// the `u32` sentinel.
///
/// A window of size `s` spans at most `s + 1` pixels per axis. A
/// finalized pixel costs no more than the straight king-move path to it
/// (at most `s` steps) and a tentative cost exceeds the current minimum
/// by at most one step, so every cost is bounded by `255 * (s + 1)`.
pub const MAX_WINDOW_SIZE: u32 = u32::MAX / MAX_EDGE_COST - 2;

/// Direction code meaning "jump straight to the seed".
pub const DIR_SEED: u8 = 0;

/// Step taken when walking back along direction code `i` (index 0
/// unused).
pub const BACK_STEPS: [(i32, i32); 9] = [
    (0, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

const UNREACHED: u32 = u32::MAX;

/// Parameters of one path search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverParams {
    /// Weight of the cost image against the orientation term.
    pub gamma: f32,
    /// Side length of the square search window.
    pub window_size: u32,
}

impl SolverParams {
    /// The solver-relevant subset of `params`.
    #[must_use]
    pub const fn from_params(params: &TracingParams) -> Self {
        Self {
            gamma: params.gamma,
            window_size: params.window_size,
        }
    }
}

impl Default for SolverParams {
    fn default() -> Self {
        Self::from_params(&TracingParams::default())
    }
}

/// Inclusive pixel rectangle searched by one solver run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Window {
    /// Leftmost column.
    pub x_min: i32,
    /// Rightmost column.
    pub x_max: i32,
    /// Top row.
    pub y_min: i32,
    /// Bottom row.
    pub y_max: i32,
}

impl Window {
    /// The window of `size` around `seed`, shifted to fit inside the
    /// image interior `[1, W-2] x [1, H-2]`.
    #[must_use]
    pub fn around(seed: Point, dims: Dimensions, size: u32) -> Self {
        let (x_min, x_max) = axis_range(seed.x, dims.width, size);
        let (y_min, y_max) = axis_range(seed.y, dims.height, size);
        Self {
            x_min,
            x_max,
            y_min,
            y_max,
        }
    }

    /// Whether `point` lies inside the window.
    #[must_use]
    pub const fn contains(&self, point: Point) -> bool {
        point.x >= self.x_min
            && point.x <= self.x_max
            && point.y >= self.y_min
            && point.y <= self.y_max
    }
}

#[allow(clippy::cast_possible_truncation)]
fn axis_range(seed: i32, len: u32, size: u32) -> (i32, i32) {
    let inner = i64::from(len) - 2;
    let size = i64::from(size);
    let (mut lo, mut hi) = (1, inner);
    if size < inner {
        let half = size / 2;
        lo = i64::from(seed) - half;
        hi = i64::from(seed) + half;
        if lo < 1 {
            lo = 1;
            hi = size;
        }
        if hi > inner {
            hi = inner;
            lo = inner + 1 - size;
        }
    }
    (lo as i32, hi as i32)
}

/// Unit vector of the step `(dx, dy)`.
fn unit_direction(dx: i32, dy: i32) -> (f32, f32) {
    #[allow(clippy::cast_precision_loss)]
    let (fx, fy) = (dx as f32, dy as f32);
    let len = fx.hypot(fy);
    (fx / len, fy / len)
}

/// Cost of stepping onto a pixel with cost `cost_to`, given the
/// orientation vectors of both pixels and the unit step direction.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn step_cost(cost_to: f32, from: (f32, f32), to: (f32, f32), dir: (f32, f32), gamma: f32) -> u32 {
    let misalignment = |v: (f32, f32)| (1.0 - v.0.mul_add(dir.0, v.1 * dir.1).abs()).max(0.0).sqrt();
    let value = gamma.mul_add(
        cost_to,
        (1.0 - gamma) * 127.0 * (misalignment(from) + misalignment(to)),
    );
    value.max(0.0) as u32
}

/// Cost of the single step from `from` to the 8-neighbor `to`.
///
/// Returns `None` if either point lies outside the field.
#[must_use]
pub fn edge_cost(field: &CostField, from: Point, to: Point, gamma: f32) -> Option<u32> {
    let cost_to = field.cost_at(to)?;
    let dir = unit_direction(to.x - from.x, to.y - from.y);
    Some(step_cost(
        cost_to,
        field.vector_at(from)?,
        field.vector_at(to)?,
        dir,
        gamma,
    ))
}

/// Per-pixel back-pointers towards the seed of the last search.
#[derive(Debug, Clone, Default)]
pub struct DirectionMap {
    dimensions: Option<Dimensions>,
    seed: Point,
    window: Window,
    dirs: Vec<u8>,
    costs: Vec<u32>,
}

impl DirectionMap {
    /// Seed of the last search.
    #[must_use]
    pub const fn seed(&self) -> Point {
        self.seed
    }

    /// Window of the last search.
    #[must_use]
    pub const fn window(&self) -> Window {
        self.window
    }

    fn index(&self, point: Point) -> Option<usize> {
        let dims = self.dimensions?;
        let x = u32::try_from(point.x).ok()?;
        let y = u32::try_from(point.y).ok()?;
        (x < dims.width && y < dims.height)
            .then(|| y as usize * dims.width as usize + x as usize)
    }

    /// Direction code at `point`, `None` outside the image.
    #[must_use]
    pub fn direction(&self, point: Point) -> Option<u8> {
        self.index(point).map(|i| self.dirs[i])
    }

    /// Cumulative path cost from the seed to `point`.
    ///
    /// `None` outside the window or for pixels the search never reached.
    #[must_use]
    pub fn cumulative_cost(&self, point: Point) -> Option<u32> {
        if !self.window.contains(point) {
            return None;
        }
        let cost = self.costs[self.index(point)?];
        (cost != UNREACHED).then_some(cost)
    }

    /// Walk back from `from` to the seed.
    ///
    /// The returned points start at `from` and end at the seed. Pixels
    /// with code [`DIR_SEED`] (including everything outside the window)
    /// jump straight to the seed.
    #[must_use]
    pub fn trace_to_seed(&self, from: Point) -> Vec<Point> {
        let mut points = vec![from];
        let limit = self.dirs.len() + 1;
        let mut p = from;
        while p != self.seed {
            let code = self.direction(p).unwrap_or(DIR_SEED);
            p = if code == DIR_SEED || points.len() > limit {
                self.seed
            } else {
                let (dx, dy) = BACK_STEPS[usize::from(code)];
                p.offset(dx, dy)
            };
            points.push(p);
        }
        points
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeState {
    Free,
    Queued(usize),
    Processed,
}

/// Reusable shortest-path solver.
///
/// Buffers are kept between runs and reallocated only when the image
/// dimensions change.
#[derive(Debug, Default)]
pub struct PathSolver {
    state: Vec<NodeState>,
    queue: BucketQueue,
    map: DirectionMap,
}

impl PathSolver {
    /// A solver with no buffers allocated yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Result of the last successful run.
    #[must_use]
    pub const fn map(&self) -> &DirectionMap {
        &self.map
    }

    /// Run the search from `seed` over `field`.
    ///
    /// # Errors
    ///
    /// Returns [`TraceError::SeedOnBorder`] if `seed` is not strictly
    /// inside the image, [`TraceError::WindowTooLarge`] if the window
    /// exceeds [`MAX_WINDOW_SIZE`], and [`TraceError::OutOfMemory`] if
    /// buffers cannot be allocated. The previous result is untouched on
    /// error.
    pub fn solve(
        &mut self,
        field: &CostField,
        seed: Point,
        params: &SolverParams,
    ) -> Result<&DirectionMap, TraceError> {
        let dims = field.dimensions();
        if !dims.is_interior(seed) {
            return Err(TraceError::SeedOnBorder {
                x: seed.x,
                y: seed.y,
            });
        }
        if params.window_size > MAX_WINDOW_SIZE {
            return Err(TraceError::WindowTooLarge {
                size: params.window_size,
                max: MAX_WINDOW_SIZE,
            });
        }
        self.ensure_buffers(dims)?;

        let started = Instant::now();
        let window = Window::around(seed, dims, params.window_size);
        self.map.seed = seed;
        self.map.window = window;
        self.reset(dims, window);
        self.search(field, seed, params.gamma);
        debug!(
            "path search from ({},{}) over {:?} took {} ms",
            seed.x,
            seed.y,
            window,
            started.elapsed().as_millis()
        );
        Ok(&self.map)
    }

    fn ensure_buffers(&mut self, dims: Dimensions) -> Result<(), TraceError> {
        if self.map.dimensions == Some(dims) {
            return Ok(());
        }
        let oom = TraceError::OutOfMemory {
            width: dims.width,
            height: dims.height,
        };
        let count = dims.pixel_count();
        if u32::try_from(count).is_err() {
            return Err(oom);
        }
        let dirs = try_alloc(count, DIR_SEED);
        let costs = try_alloc(count, UNREACHED);
        let state = try_alloc(count, NodeState::Processed);
        let (Some(dirs), Some(costs), Some(state)) = (dirs, costs, state) else {
            return Err(oom);
        };
        self.map.dirs = dirs;
        self.map.costs = costs;
        self.map.dimensions = Some(dims);
        self.state = state;
        Ok(())
    }

    #[allow(clippy::cast_sign_loss)]
    fn reset(&mut self, dims: Dimensions, window: Window) {
        let w = dims.width as usize;
        for (y, (dirs, (costs, state))) in self
            .map
            .dirs
            .chunks_mut(w)
            .zip(self.map.costs.chunks_mut(w).zip(self.state.chunks_mut(w)))
            .enumerate()
        {
            let row_inside = (window.y_min as usize..=window.y_max as usize).contains(&y);
            for x in 0..w {
                dirs[x] = DIR_SEED;
                costs[x] = UNREACHED;
                let inside = row_inside
                    && (window.x_min as usize..=window.x_max as usize).contains(&x);
                state[x] = if inside {
                    NodeState::Free
                } else {
                    NodeState::Processed
                };
            }
        }
        self.queue.clear();
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_possible_wrap)]
    fn search(&mut self, field: &CostField, seed: Point, gamma: f32) {
        let width = field.dimensions().width as usize;
        let costs = field.costs().as_slice();
        let vx = field.vx().as_slice();
        let vy = field.vy().as_slice();

        let mut steps = [(0_isize, (0.0_f32, 0.0_f32)); 9];
        for (code, &(bx, by)) in BACK_STEPS.iter().enumerate().skip(1) {
            steps[code] = (
                -(by as isize * width as isize + bx as isize),
                unit_direction(-bx, -by),
            );
        }

        let start = seed.y as usize * width + seed.x as usize;
        self.map.costs[start] = 0;
        self.state[start] = NodeState::Queued(self.queue.add(0, start as u32));
        let mut bucket: u8 = 0;

        'search: loop {
            let Some(current) = self.queue.remove(bucket) else {
                break;
            };
            let current = current as usize;
            self.state[current] = NodeState::Processed;
            let current_cost = self.map.costs[current];
            let from = (vx[current], vy[current]);

            for (code, &(offset, dir)) in steps.iter().enumerate().skip(1) {
                let next = current.wrapping_add_signed(offset);
                let state = self.state[next];
                if state == NodeState::Processed {
                    continue;
                }
                let cost = current_cost
                    + step_cost(costs[next], from, (vx[next], vy[next]), dir, gamma);
                let old = self.map.costs[next];
                if cost >= old {
                    continue;
                }
                self.map.costs[next] = cost;
                self.map.dirs[next] = code as u8;
                if let NodeState::Queued(slot) = state {
                    let old_bucket = old.to_le_bytes()[0];
                    self.queue.remove_at(old_bucket, slot);
                    if let Some(moved) = self.queue.get(old_bucket, slot) {
                        self.state[moved as usize] = NodeState::Queued(slot);
                    }
                }
                let slot = self.queue.add(cost.to_le_bytes()[0], next as u32);
                self.state[next] = NodeState::Queued(slot);
            }

            let first = bucket;
            while self.queue.size(bucket) == 0 {
                bucket = bucket.wrapping_add(1);
                if bucket == first {
                    break 'search;
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::FloatImage;

    /// Deterministic pseudo-random cost field.
    #[allow(clippy::cast_precision_loss)]
    fn noisy_field(width: u32, height: u32, mut state: u64) -> CostField {
        let mut next = move || {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            ((state >> 33) % 10_000) as f32 / 10_000.0
        };
        let n = (width * height) as usize;
        let mut costs = Vec::with_capacity(n);
        let mut xs = Vec::with_capacity(n);
        let mut ys = Vec::with_capacity(n);
        for _ in 0..n {
            costs.push(next() * 255.0);
            let angle = next() * std::f32::consts::TAU;
            xs.push(angle.cos());
            ys.push(angle.sin());
        }
        CostField::from_parts(
            FloatImage::from_raw(width, height, costs).unwrap(),
            FloatImage::from_raw(width, height, xs).unwrap(),
            FloatImage::from_raw(width, height, ys).unwrap(),
        )
        .unwrap()
    }

    /// Uniform field with a cheap horizontal corridor along `row`.
    fn corridor_field(width: u32, height: u32, row: u32) -> CostField {
        let mut costs = FloatImage::try_zeros(width, height).unwrap();
        let mut xs = FloatImage::try_zeros(width, height).unwrap();
        let ys = FloatImage::try_zeros(width, height).unwrap();
        for y in 0..height {
            for x in 0..width {
                costs.set(x, y, if y == row { 0.0 } else { 200.0 });
                xs.set(x, y, 1.0);
            }
        }
        CostField::from_parts(costs, xs, ys).unwrap()
    }

    /// Bellman-Ford reference over the same window and edge costs.
    fn reference_costs(field: &CostField, seed: Point, window: Window, gamma: f32) -> Vec<Option<u64>> {
        let w = field.dimensions().width as i32;
        let h = field.dimensions().height as i32;
        let idx = |p: Point| (p.y * w + p.x) as usize;
        let mut dist = vec![None; (w * h) as usize];
        dist[idx(seed)] = Some(0_u64);
        let mut changed = true;
        while changed {
            changed = false;
            for y in window.y_min..=window.y_max {
                for x in window.x_min..=window.x_max {
                    let p = Point::new(x, y);
                    let Some(dp) = dist[idx(p)] else { continue };
                    for &(bx, by) in &BACK_STEPS[1..] {
                        let q = p.offset(-bx, -by);
                        if !window.contains(q) {
                            continue;
                        }
                        let nd = dp + u64::from(edge_cost(field, p, q, gamma).unwrap());
                        if dist[idx(q)].is_none_or(|dq| nd < dq) {
                            dist[idx(q)] = Some(nd);
                            changed = true;
                        }
                    }
                }
            }
        }
        dist
    }

    // --- validation ---

    #[test]
    fn seed_on_border_is_rejected() {
        let field = noisy_field(10, 10, 1);
        let mut solver = PathSolver::new();
        for seed in [Point::new(0, 5), Point::new(5, 9), Point::new(-3, 4)] {
            let err = solver.solve(&field, seed, &SolverParams::default());
            assert!(matches!(err, Err(TraceError::SeedOnBorder { .. })));
        }
    }

    #[test]
    fn failed_run_keeps_previous_result() {
        let field = noisy_field(10, 10, 2);
        let mut solver = PathSolver::new();
        solver
            .solve(&field, Point::new(4, 4), &SolverParams::default())
            .unwrap();
        let before = solver.map().cumulative_cost(Point::new(7, 7));
        assert!(solver.solve(&field, Point::new(0, 0), &SolverParams::default()).is_err());
        assert_eq!(solver.map().seed(), Point::new(4, 4));
        assert_eq!(solver.map().cumulative_cost(Point::new(7, 7)), before);
    }

    #[test]
    fn oversized_window_is_rejected() {
        let field = noisy_field(10, 10, 3);
        let params = SolverParams {
            gamma: 0.7,
            window_size: MAX_WINDOW_SIZE + 1,
        };
        let mut solver = PathSolver::new();
        let err = solver.solve(&field, Point::new(5, 5), &params);
        assert!(matches!(err, Err(TraceError::WindowTooLarge { .. })));
    }

    #[test]
    fn max_window_bound_fits_u32() {
        let side = u64::from(MAX_WINDOW_SIZE) + 1;
        assert!(side * u64::from(MAX_EDGE_COST) < u64::from(u32::MAX));
    }

    // --- window ---

    #[test]
    fn window_covers_interior_when_large() {
        let dims = Dimensions {
            width: 10,
            height: 10,
        };
        let w = Window::around(Point::new(5, 5), dims, 8);
        assert_eq!(
            w,
            Window {
                x_min: 1,
                x_max: 8,
                y_min: 1,
                y_max: 8
            }
        );
    }

    #[test]
    fn window_shifts_at_edges() {
        let dims = Dimensions {
            width: 100,
            height: 100,
        };
        let low = Window::around(Point::new(2, 50), dims, 10);
        assert_eq!((low.x_min, low.x_max), (1, 10));
        assert_eq!((low.y_min, low.y_max), (45, 55));
        let high = Window::around(Point::new(97, 50), dims, 10);
        assert_eq!((high.x_min, high.x_max), (89, 98));
    }

    #[test]
    fn full_window_finalizes_every_interior_pixel() {
        let field = noisy_field(10, 10, 4);
        let params = SolverParams {
            gamma: 0.7,
            window_size: 8,
        };
        let mut solver = PathSolver::new();
        let map = solver.solve(&field, Point::new(5, 5), &params).unwrap();
        let mut reached = 0;
        let mut border = 0;
        for y in 0..10 {
            for x in 0..10 {
                let p = Point::new(x, y);
                if (1..=8).contains(&x) && (1..=8).contains(&y) {
                    assert!(map.cumulative_cost(p).is_some(), "{p:?} unreached");
                    reached += 1;
                } else {
                    assert_eq!(map.direction(p), Some(DIR_SEED));
                    assert_eq!(map.cumulative_cost(p), None);
                    border += 1;
                }
            }
        }
        assert_eq!((reached, border), (64, 36));
        assert_eq!(map.cumulative_cost(Point::new(5, 5)), Some(0));
    }

    #[test]
    fn outside_window_jumps_to_seed() {
        let field = noisy_field(20, 20, 5);
        let params = SolverParams {
            gamma: 0.7,
            window_size: 4,
        };
        let mut solver = PathSolver::new();
        let map = solver.solve(&field, Point::new(10, 10), &params).unwrap();
        assert_eq!(
            map.trace_to_seed(Point::new(15, 10)),
            vec![Point::new(15, 10), Point::new(10, 10)]
        );
    }

    // --- optimality ---

    #[test]
    fn costs_match_bellman_ford() {
        for (seed, gamma, window_size) in [
            (Point::new(6, 5), 0.7, 2500),
            (Point::new(3, 9), 0.0, 2500),
            (Point::new(8, 8), 1.0, 6),
        ] {
            let field = noisy_field(14, 12, 17);
            let params = SolverParams { gamma, window_size };
            let mut solver = PathSolver::new();
            let map = solver.solve(&field, seed, &params).unwrap();
            let window = map.window();
            let expected = reference_costs(&field, seed, window, gamma);
            for y in window.y_min..=window.y_max {
                for x in window.x_min..=window.x_max {
                    let p = Point::new(x, y);
                    let want = expected[(y * 14 + x) as usize];
                    assert_eq!(map.cumulative_cost(p).map(u64::from), want, "at {p:?}");
                }
            }
        }
    }

    #[test]
    fn back_pointers_are_consistent_with_costs() {
        let field = noisy_field(16, 16, 23);
        let params = SolverParams::default();
        let mut solver = PathSolver::new();
        let map = solver.solve(&field, Point::new(7, 9), &params).unwrap();
        for y in 1..15 {
            for x in 1..15 {
                let p = Point::new(x, y);
                if p == map.seed() {
                    continue;
                }
                let code = map.direction(p).unwrap();
                assert!((1..=8).contains(&code));
                let (dx, dy) = BACK_STEPS[usize::from(code)];
                let prev = p.offset(dx, dy);
                let step = edge_cost(&field, prev, p, params.gamma).unwrap();
                assert_eq!(
                    map.cumulative_cost(prev).unwrap() + step,
                    map.cumulative_cost(p).unwrap()
                );
            }
        }
    }

    #[test]
    fn path_follows_cheap_corridor() {
        let field = corridor_field(20, 11, 5);
        let params = SolverParams {
            gamma: 1.0,
            window_size: 2500,
        };
        let mut solver = PathSolver::new();
        let map = solver.solve(&field, Point::new(2, 5), &params).unwrap();
        let path = map.trace_to_seed(Point::new(17, 5));
        assert_eq!(path.len(), 16);
        assert!(path.iter().all(|p| p.y == 5));
        assert_eq!(path.first(), Some(&Point::new(17, 5)));
        assert_eq!(path.last(), Some(&Point::new(2, 5)));
    }

    #[test]
    fn reused_solver_matches_fresh_solver() {
        let field = noisy_field(12, 12, 31);
        let params = SolverParams::default();
        let mut reused = PathSolver::new();
        reused.solve(&field, Point::new(3, 3), &params).unwrap();
        reused.solve(&field, Point::new(8, 6), &params).unwrap();
        let mut fresh = PathSolver::new();
        fresh.solve(&field, Point::new(8, 6), &params).unwrap();
        for y in 0..12 {
            for x in 0..12 {
                let p = Point::new(x, y);
                assert_eq!(reused.map().cumulative_cost(p), fresh.map().cumulative_cost(p));
                assert_eq!(reused.map().direction(p), fresh.map().direction(p));
            }
        }
    }

    #[test]
    fn edge_cost_never_exceeds_bound() {
        let field = noisy_field(8, 8, 41);
        for gamma in [0.0, 0.3, 0.7, 1.0] {
            for &(bx, by) in &BACK_STEPS[1..] {
                let from = Point::new(4, 4);
                let cost = edge_cost(&field, from, from.offset(-bx, -by), gamma).unwrap();
                assert!(cost <= MAX_EDGE_COST);
            }
        }
    }
}
