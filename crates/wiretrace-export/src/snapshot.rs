//! Raster snapshots of the image and its tracings.
//!
//! [`RasterPainter`] implements the core [`Painter`] on an RGB image
//! with `imageproc` drawing primitives. [`snapshot`] uses it to render
//! the image and/or the tracings at image resolution.

use image::{GrayImage, Rgb, RgbImage};
use imageproc::drawing::{draw_cross_mut, draw_filled_circle_mut, draw_line_segment_mut};
use log::info;
use wiretrace_core::render::{ACTIVE_COLOR, Painter};
use wiretrace_core::{Point, TracingSession};

/// [`Painter`] that draws into an RGB image.
///
/// Lines wider than one pixel are drawn with a square brush.
#[derive(Debug, Clone)]
pub struct RasterPainter {
    canvas: RgbImage,
}

impl RasterPainter {
    /// A black canvas.
    #[must_use]
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            canvas: RgbImage::new(width, height),
        }
    }

    /// A canvas showing `image` in gray.
    #[must_use]
    pub fn from_gray(image: &GrayImage) -> Self {
        let canvas = RgbImage::from_fn(image.width(), image.height(), |x, y| {
            let [v] = image.get_pixel(x, y).0;
            Rgb([v, v, v])
        });
        Self { canvas }
    }

    /// The canvas drawn so far.
    #[must_use]
    pub const fn image(&self) -> &RgbImage {
        &self.canvas
    }

    /// Consume the painter and return the canvas.
    #[must_use]
    pub fn into_image(self) -> RgbImage {
        self.canvas
    }
}

impl Painter for RasterPainter {
    fn polyline(&mut self, points: &[Point], color: [u8; 3], width: u32) {
        let w = i32::try_from(width.max(1)).unwrap_or(1);
        let lo = -(w - 1) / 2;
        for pair in points.windows(2) {
            for ox in lo..lo + w {
                for oy in lo..lo + w {
                    draw_line_segment_mut(
                        &mut self.canvas,
                        shifted(pair[0], ox, oy),
                        shifted(pair[1], ox, oy),
                        Rgb(color),
                    );
                }
            }
        }
    }

    fn dot(&mut self, center: Point, diameter: u32, color: [u8; 3]) {
        let radius = i32::try_from(diameter / 2).unwrap_or(i32::MAX);
        draw_filled_circle_mut(&mut self.canvas, (center.x, center.y), radius, Rgb(color));
    }

    fn cross(&mut self, center: Point, color: [u8; 3]) {
        draw_cross_mut(&mut self.canvas, Rgb(color), center.x, center.y);
    }
}

#[allow(clippy::cast_precision_loss)]
fn shifted(p: Point, dx: i32, dy: i32) -> (f32, f32) {
    ((p.x + dx) as f32, (p.y + dy) as f32)
}

/// What a snapshot shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotContent {
    /// Draw the grayscale image; otherwise the background is black.
    pub image: bool,
    /// Draw finished tracings in their type colors, the active tracing,
    /// and the candidate segment in red.
    pub tracings: bool,
}

impl Default for SnapshotContent {
    fn default() -> Self {
        Self {
            image: true,
            tracings: true,
        }
    }
}

/// Render a snapshot of `session` at image resolution.
///
/// Returns `None` when `content` selects nothing.
#[must_use]
pub fn snapshot(session: &TracingSession, content: SnapshotContent) -> Option<RgbImage> {
    if !content.image && !content.tracings {
        return None;
    }
    let dims = session.dimensions();
    let mut painter = if content.image {
        RasterPainter::from_gray(session.image())
    } else {
        RasterPainter::blank(dims.width, dims.height)
    };

    if content.tracings {
        let width = session.params().line_width;
        let labels = session.labels();
        for tracing in session.tracings().iter().chain(session.active_tracing()) {
            let color = labels.type_color(tracing.type_index()).rgb();
            for segment in tracing.segments() {
                painter.polyline(&segment.points(), color, width);
            }
        }
        if session.is_active() {
            painter.polyline(session.candidate(), ACTIVE_COLOR, width);
        }
    }

    info!("created {}x{} snapshot image", dims.width, dims.height);
    Some(painter.into_image())
}
