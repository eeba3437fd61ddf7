//! Overlay drawing through a backend-agnostic [`Painter`].
//!
//! [`render_session`] draws finished tracings in their type color,
//! highlighted or selected tracings in white, the active tracing and
//! candidate segment in red, the picked vertex as a dot, and the current
//! point as a cross. Image coordinates are mapped to the screen with a
//! [`ScreenTransform`].

use crate::labels::NamedColor;
use crate::session::TracingSession;
use crate::types::Point;

/// RGB color of highlighted and selected tracings.
pub const HIGHLIGHT_COLOR: [u8; 3] = [255, 255, 255];

/// RGB color of the tracing under construction.
pub const ACTIVE_COLOR: [u8; 3] = NamedColor::Red.rgb();

/// Drawing backend.
pub trait Painter {
    /// Connected line through `points` in screen coordinates.
    fn polyline(&mut self, points: &[Point], color: [u8; 3], width: u32);

    /// Filled dot centered at `center`.
    fn dot(&mut self, center: Point, diameter: u32, color: [u8; 3]);

    /// Cursor cross centered at `center`.
    fn cross(&mut self, center: Point, color: [u8; 3]);
}

/// Image-to-screen mapping of a zoomed, panned view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenTransform {
    /// Image x coordinate shown at the left edge.
    pub offset_x: f64,
    /// Image y coordinate shown at the top edge.
    pub offset_y: f64,
    /// Screen pixels per image pixel.
    pub magnification: f64,
}

impl Default for ScreenTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl ScreenTransform {
    /// One screen pixel per image pixel, no offset.
    pub const IDENTITY: Self = Self {
        offset_x: 0.0,
        offset_y: 0.0,
        magnification: 1.0,
    };

    /// Screen position of the center of image pixel `p`.
    ///
    /// # Examples
    ///
    /// ```
    /// use wiretrace_core::Point;
    /// use wiretrace_core::render::ScreenTransform;
    ///
    /// let t = ScreenTransform { offset_x: 10.0, offset_y: 0.0, magnification: 4.0 };
    /// assert_eq!(t.to_screen(Point::new(12, 1)), Point::new(10, 6));
    /// ```
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn to_screen(&self, p: Point) -> Point {
        let half = (self.magnification / 2.0).floor() as i32;
        let map = |v: i32, offset: f64| half + ((f64::from(v) - offset) * self.magnification) as i32;
        Point::new(map(p.x, self.offset_x), map(p.y, self.offset_y))
    }

    fn map_all(&self, points: &[Point]) -> Vec<Point> {
        points.iter().map(|&p| self.to_screen(p)).collect()
    }
}

/// Draw the whole session overlay and clear the redraw flags.
pub fn render_session(
    session: &mut TracingSession,
    transform: &ScreenTransform,
    painter: &mut dyn Painter,
) {
    let width = session.params().line_width;
    let labels = session.labels();

    for tracing in session.tracings() {
        let color = if tracing.highlighted() || tracing.selected() {
            HIGHLIGHT_COLOR
        } else {
            labels.type_color(tracing.type_index()).rgb()
        };
        for segment in tracing.segments() {
            painter.polyline(&transform.map_all(&segment.points()), color, width);
        }
    }

    if let Some(active) = session.active_tracing() {
        for segment in active.segments() {
            painter.polyline(&transform.map_all(&segment.points()), ACTIVE_COLOR, width);
        }
        if session.candidate().len() > 1 {
            painter.polyline(&transform.map_all(session.candidate()), ACTIVE_COLOR, width);
        }
    }

    if let Some(vertex) = session.picked_vertex() {
        painter.dot(transform.to_screen(vertex), 3 * width, HIGHLIGHT_COLOR);
    }

    if let Some(current) = session.current_point() {
        painter.cross(transform.to_screen(current), ACTIVE_COLOR);
    }

    session.mark_drawn();
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use image::GrayImage;

    use super::*;
    use crate::labels::LabelTables;
    use crate::params::TracingParams;

    #[derive(Debug, PartialEq)]
    enum Call {
        Line(Vec<Point>, [u8; 3], u32),
        Dot(Point, u32),
        Cross(Point),
    }

    #[derive(Default)]
    struct Recorder(Vec<Call>);

    impl Painter for Recorder {
        fn polyline(&mut self, points: &[Point], color: [u8; 3], width: u32) {
            self.0.push(Call::Line(points.to_vec(), color, width));
        }

        fn dot(&mut self, center: Point, diameter: u32, _color: [u8; 3]) {
            self.0.push(Call::Dot(center, diameter));
        }

        fn cross(&mut self, center: Point, _color: [u8; 3]) {
            self.0.push(Call::Cross(center));
        }
    }

    fn session_with_tracing() -> TracingSession {
        let mut s = TracingSession::new(
            GrayImage::new(20, 20),
            TracingParams::default(),
            LabelTables::default(),
        );
        s.click(Point::new(2, 2), Duration::ZERO).unwrap();
        s.click(Point::new(8, 2), Duration::from_secs(1)).unwrap();
        s.finish();
        s
    }

    #[test]
    fn magnified_transform_centers_pixels() {
        let t = ScreenTransform {
            offset_x: 0.0,
            offset_y: 2.0,
            magnification: 3.0,
        };
        assert_eq!(t.to_screen(Point::new(0, 2)), Point::new(1, 1));
        assert_eq!(t.to_screen(Point::new(2, 5)), Point::new(7, 10));
        assert_eq!(
            ScreenTransform::IDENTITY.to_screen(Point::new(4, 9)),
            Point::new(4, 9)
        );
    }

    #[test]
    fn finished_tracing_uses_type_color() {
        let mut s = session_with_tracing();
        let mut rec = Recorder::default();
        render_session(&mut s, &ScreenTransform::IDENTITY, &mut rec);
        assert_eq!(
            rec.0,
            vec![
                Call::Line(
                    vec![Point::new(2, 2), Point::new(8, 2)],
                    NamedColor::Magenta.rgb(),
                    1
                ),
                Call::Cross(Point::new(8, 2)),
            ]
        );
        assert!(!s.needs_redraw());
    }

    #[test]
    fn highlighted_tracing_and_picked_vertex_are_white() {
        let mut s = session_with_tracing();
        s.highlight_nearest(Point::new(5, 3));
        assert!(s.pick_vertex(Point::new(8, 3)));
        let mut rec = Recorder::default();
        render_session(&mut s, &ScreenTransform::IDENTITY, &mut rec);
        assert!(matches!(&rec.0[0], Call::Line(_, c, _) if *c == HIGHLIGHT_COLOR));
        assert_eq!(rec.0[1], Call::Dot(Point::new(8, 2), 3));
    }

    #[test]
    fn active_tracing_and_candidate_are_red() {
        let mut s = session_with_tracing();
        s.click(Point::new(2, 10), Duration::from_secs(5)).unwrap();
        s.cursor_moved(Point::new(6, 10)).unwrap();
        let mut rec = Recorder::default();
        render_session(&mut s, &ScreenTransform::IDENTITY, &mut rec);
        assert_eq!(
            rec.0[1],
            Call::Line(vec![Point::new(2, 10), Point::new(6, 10)], ACTIVE_COLOR, 1)
        );
        assert_eq!(rec.0[2], Call::Cross(Point::new(6, 10)));
    }
}
