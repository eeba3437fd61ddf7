//! Delimited vertex lists.
//!
//! Each tracing is written as its joined vertex list, one `x<d>y` line
//! per vertex, with the vertex shared by consecutive segments written
//! once. Tracings go either into one document, each preceded by a
//! `Tracing N<id>:` line, or into one document per tracing plus an
//! index that lists the per-tracing paths.

use std::fmt::Write;

use wiretrace_core::{Tracing, Tracings};

/// Column separator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Delimiter {
    /// Tab-separated values.
    #[default]
    Tab,
    /// Comma-separated values.
    Comma,
}

impl Delimiter {
    /// The separator text.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tab => "\t",
            Self::Comma => ",",
        }
    }
}

/// One per-tracing document of a separate export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracingFile {
    /// Id of the exported tracing.
    pub id: u32,
    /// Path the document is meant to be written to.
    pub path: String,
    /// Document content.
    pub contents: String,
}

/// Result of [`to_delimited_separate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeparateExport {
    /// Index document listing `Tracing N<id>: <path>` per tracing.
    pub index: String,
    /// One document per tracing, in collection order.
    pub files: Vec<TracingFile>,
}

/// All tracings in one document.
///
/// # Examples
///
/// ```
/// use wiretrace_core::{Point, Segment, Tracing, Tracings};
/// use wiretrace_export::delimited::{Delimiter, to_delimited};
///
/// let mut tracing = Tracing::new(1);
/// tracing.add_segment(Segment::from_points(&[Point::new(3, 4), Point::new(5, 6)]));
/// let mut tracings = Tracings::new();
/// tracings.push(tracing);
///
/// assert_eq!(to_delimited(&tracings, Delimiter::Comma), "Tracing N1:\n3,4\n5,6\n");
/// ```
#[must_use]
pub fn to_delimited(tracings: &Tracings, delimiter: Delimiter) -> String {
    let mut out = String::new();
    for tracing in tracings {
        let _ = writeln!(out, "Tracing N{}:", tracing.id());
        write_vertices(&mut out, tracing, delimiter);
    }
    out
}

/// One document per tracing, named after `index_path` (see
/// [`tracing_file_path`]), plus the index document.
#[must_use]
pub fn to_delimited_separate(
    tracings: &Tracings,
    delimiter: Delimiter,
    index_path: &str,
) -> SeparateExport {
    let mut index = String::new();
    let mut files = Vec::with_capacity(tracings.len());
    for tracing in tracings {
        let path = tracing_file_path(index_path, tracing.id());
        let _ = writeln!(index, "Tracing N{}: {path}", tracing.id());
        let mut contents = String::new();
        write_vertices(&mut contents, tracing, delimiter);
        files.push(TracingFile {
            id: tracing.id(),
            path,
            contents,
        });
    }
    SeparateExport { index, files }
}

/// Path of the per-tracing document: `.N<id>` is inserted before the
/// extension of the file name in `index_path`.
///
/// # Examples
///
/// ```
/// use wiretrace_export::delimited::tracing_file_path;
///
/// assert_eq!(tracing_file_path("out/cells.txt", 4), "out/cells.N4.txt");
/// assert_eq!(tracing_file_path("cells", 4), "cells.N4");
/// ```
#[must_use]
pub fn tracing_file_path(index_path: &str, id: u32) -> String {
    let name_start = index_path.rfind(['/', '\\']).map_or(0, |i| i + 1);
    let (base, ext) = index_path[name_start..]
        .rfind('.')
        .map_or((index_path, ""), |dot| index_path.split_at(name_start + dot));
    format!("{base}.N{id}{ext}")
}

fn write_vertices(out: &mut String, tracing: &Tracing, delimiter: Delimiter) {
    let d = delimiter.as_str();
    for p in tracing.polyline() {
        let _ = writeln!(out, "{}{d}{}", p.x, p.y);
    }
}
