//! SVG export serializer.
//!
//! Converts tracings into an SVG string with one `<path>` element per
//! tracing, using the [`svg`] crate for document construction, XML
//! escaping, and path data formatting. The `viewBox` matches the image
//! pixel grid, so the SVG can be overlaid on the traced image.
//!
//! Each path is stroked in the color of its tracing's type and carries
//! the tracing id as its `id` attribute (`N<id>`).
//!
//! Optional [`SvgMetadata`] embeds `<title>` and `<desc>` elements.
//!
//! This is a pure function with no I/O -- it returns a `String`.

use svg::Document;
use svg::node::element::path::Data;
use svg::node::element::{Description, Path, Title};
use svg::node::{Text, Value};

use wiretrace_core::{Dimensions, LabelTables, Point, Tracings};

/// Metadata to embed in the SVG document.
///
/// Both fields are optional. When present, a `<title>` and/or `<desc>`
/// element is emitted immediately after the opening `<svg>` tag.
///
/// Text values are XML-escaped automatically by the `svg` crate.
#[derive(Debug, Clone, Default)]
pub struct SvgMetadata<'a> {
    /// Document title, emitted as `<title>`.
    ///
    /// Typically the traced image's file name.
    pub title: Option<&'a str>,

    /// Document description, emitted as `<desc>`.
    pub description: Option<&'a str>,
}

/// Build an SVG path `d` attribute string from a vertex list.
///
/// Uses `M` for the first point and `L` for subsequent points.
/// Returns an empty string for fewer than 2 points.
///
/// # Examples
///
/// ```
/// use wiretrace_core::Point;
/// use wiretrace_export::build_path_data;
///
/// let d = build_path_data(&[Point::new(10, 20), Point::new(30, 40)]);
/// assert_eq!(d, "M10,20 L30,40");
/// ```
#[must_use]
pub fn build_path_data(points: &[Point]) -> String {
    let [first, rest @ ..] = points else {
        return String::new();
    };
    if rest.is_empty() {
        return String::new();
    }
    let xy = |p: &Point| (f64::from(p.x), f64::from(p.y));
    let mut data = Data::new().move_to(xy(first));
    for p in rest {
        data = data.line_to(xy(p));
    }
    String::from(Value::from(data))
}

/// Serialize tracings into an SVG document string.
///
/// Tracings are drawn in collection order with round caps and joins,
/// `line_width` pixels wide. Tracings with fewer than 2 vertices are
/// skipped.
#[must_use]
pub fn to_svg(
    tracings: &Tracings,
    labels: &LabelTables,
    dimensions: Dimensions,
    line_width: u32,
    metadata: &SvgMetadata<'_>,
) -> String {
    let w = dimensions.width;
    let h = dimensions.height;
    let mut doc = Document::new()
        .set("width", w)
        .set("height", h)
        .set("viewBox", format!("0 0 {w} {h}"));

    if let Some(title) = metadata.title {
        doc = doc.add(Title::new(title));
    }
    if let Some(description) = metadata.description {
        doc = doc.add(Description::new().add(Text::new(description)));
    }

    for tracing in tracings {
        let d = build_path_data(&tracing.polyline());
        if d.is_empty() {
            continue;
        }
        let path = Path::new()
            .set("id", format!("N{}", tracing.id()))
            .set("d", d)
            .set("fill", "none")
            .set("stroke", labels.type_color(tracing.type_index()).hex())
            .set("stroke-width", line_width)
            .set("stroke-linecap", "round")
            .set("stroke-linejoin", "round");
        doc = doc.add(path);
    }

    // The svg crate omits the XML declaration, so we prepend it.
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{doc}\n")
}
