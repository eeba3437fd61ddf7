//! wiretrace-core: Live-wire neurite tracing engine (sans-IO).
//!
//! Traces elongated bright or dark structures in 2D grayscale images
//! through:
//! grayscale -> Hessian cost field -> bucket-queue Dijkstra ->
//! path extraction -> smoothing -> tracings.
//!
//! The interactive entry point is [`TracingSession`], which turns
//! cursor and click events into multi-segment tracings. [`trace_waypoints`]
//! runs the same machinery non-interactively.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! images and byte slices. File formats live in `wiretrace-export`.

pub mod costs;
pub mod derivatives;
pub mod dijkstra;
pub mod grayscale;
pub mod labels;
pub mod params;
pub mod progress;
pub mod queue;
pub mod render;
pub mod segment;
pub mod session;
pub mod smoothing;
pub mod stats;
pub mod tracing;
pub mod tracings;
pub mod types;

pub use costs::{CostField, compute_cost_field};
pub use derivatives::{Differentiator, GaussianDerivatives};
pub use dijkstra::{DirectionMap, PathSolver, SolverParams};
pub use labels::{LabelTables, NamedColor, TypeLabel};
pub use params::{Appearance, TracingParams};
pub use progress::{NoProgress, Progress};
pub use render::{Painter, ScreenTransform, render_session};
pub use segment::{Segment, Vertex};
pub use session::{ClickOutcome, ParamChange, TracingSession};
pub use stats::{Summary, ValueStats};
pub use tracing::Tracing;
pub use tracings::Tracings;
pub use types::{Calibration, Dimensions, FloatImage, Point, TraceError};

use std::time::Duration;

/// Trace one tracing through `waypoints` without user interaction.
///
/// Decodes the image, computes its cost field, then clicks each waypoint
/// in turn (snapping applies) and finishes the tracing. The returned
/// session holds the image, the cost field, and the finished tracing.
///
/// # Errors
///
/// Returns [`TraceError::TooFewWaypoints`] for fewer than two waypoints.
/// Returns [`TraceError::EmptyInput`] if `image_bytes` is empty.
/// Returns [`TraceError::ImageDecode`] if the image format is unrecognized.
/// Returns [`TraceError::OutOfMemory`] if the cost field cannot be allocated.
pub fn trace_waypoints(
    image_bytes: &[u8],
    params: &TracingParams,
    waypoints: &[Point],
    progress: &mut dyn Progress,
) -> Result<TracingSession, TraceError> {
    if waypoints.len() < 2 {
        return Err(TraceError::TooFewWaypoints {
            count: waypoints.len(),
        });
    }
    let gray = grayscale::decode_and_grayscale(image_bytes)?;
    let mut session = TracingSession::new(gray, params.clone(), LabelTables::default());
    session.compute_costs(&GaussianDerivatives, progress)?;

    // Clicks are spaced well apart so repeated waypoints never count as
    // a double click.
    for (second, &point) in (0_u64..).zip(waypoints) {
        session.click(point, Duration::from_secs(second))?;
    }
    session.finish();
    Ok(session)
}
