//! NeuronJ data file (NDF) reading and writing.
//!
//! NDF is a line-oriented text format: a header and version line, the
//! tracing parameters, the type and cluster tables, then one block per
//! tracing with its segments as alternating x and y lines. Section
//! markers start with `//`.
//!
//! Files written by older versions are accepted: before 1.4.0 there is
//! no appearance line, and before 1.1.0 there is no line-width line but
//! five obsolete settings follow the parameters instead. Files from a
//! newer version are rejected.
//!
//! Loading is all-or-nothing: [`from_ndf`] either returns a complete
//! [`NdfDocument`] or an [`NdfError`].

use std::fmt::Write;
use std::str::FromStr;

use log::{debug, info};
use wiretrace_core::labels::{CLUSTER_SLOTS, TYPE_SLOTS};
use wiretrace_core::{
    Appearance, Calibration, LabelTables, NamedColor, ParamChange, Point, Segment, Tracing,
    TracingParams, TracingSession, Tracings, TypeLabel,
};

/// Version written to new files; files with a greater version are
/// rejected.
pub const NDF_VERSION: &str = "1.4.3";

const HEADER: &str = "// NeuronJ Data File - DO NOT CHANGE";
const HEADER_PREFIX: &str = "// NeuronJ Data File";
const TRAILER: &str = "// End of NeuronJ Data File";

/// First version with the appearance line.
const APPEARANCE_SINCE: &str = "1.4.0";
/// First version with the line-width line.
const LINE_WIDTH_SINCE: &str = "1.1.0";
/// Pixel x-size, pixel y-size, unit, auto-save, and log settings of
/// pre-1.1.0 files.
const LEGACY_SETTING_LINES: usize = 5;

/// Errors that can occur while reading an NDF file.
#[derive(Debug, thiserror::Error)]
pub enum NdfError {
    /// The first line is not an NDF header.
    #[error("not a NeuronJ data file")]
    MissingHeader,

    /// The file was written by a newer version.
    #[error("data file version {found} while running version {}", NDF_VERSION)]
    IncompatibleVersion {
        /// Version found in the file.
        found: String,
    },

    /// A line that should hold a number does not.
    #[error("invalid number {text:?} on line {line}")]
    InvalidNumber {
        /// 1-based line number.
        line: usize,
        /// Offending line content.
        text: String,
    },

    /// A type color refers to an index outside the palette.
    #[error("unknown color index {index} on line {line}")]
    UnknownColor {
        /// 1-based line number.
        line: usize,
        /// Offending palette index.
        index: usize,
    },

    /// A tracing refers to a type or cluster slot that does not exist.
    #[error("{table} index {index} on line {line} outside {len} slots")]
    SlotIndex {
        /// 1-based line number.
        line: usize,
        /// `"type"` or `"cluster"`.
        table: &'static str,
        /// Offending index.
        index: usize,
        /// Number of slots in the table.
        len: usize,
    },

    /// The input ended inside a section.
    #[error("unexpected end of data file after line {line}")]
    Truncated {
        /// Number of lines read.
        line: usize,
    },
}

/// Everything stored in an NDF file.
#[derive(Debug)]
pub struct NdfDocument {
    /// Version line of the file.
    pub version: String,
    /// Tracing parameters, unclamped as read.
    pub params: TracingParams,
    /// Type and cluster tables.
    pub labels: LabelTables,
    /// Tracings with their stored ids.
    pub tracings: Tracings,
}

impl NdfDocument {
    /// Install the document into `session`, replacing its tracings,
    /// parameters, and label tables.
    pub fn install(self, session: &mut TracingSession) -> ParamChange {
        session.replace_tracings(&self.params, self.labels, self.tracings)
    }
}

/// Serialize a session's parameters, label tables, and tracings.
#[must_use]
pub fn session_to_ndf(session: &TracingSession) -> String {
    to_ndf(session.params(), session.labels(), session.tracings())
}

/// Serialize parameters, label tables, and tracings as an NDF file.
///
/// Names and labels are written on one line each; embedded line breaks
/// are replaced by spaces.
#[must_use]
pub fn to_ndf(params: &TracingParams, labels: &LabelTables, tracings: &Tracings) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{HEADER}");
    let _ = writeln!(out, "{NDF_VERSION}");

    let _ = writeln!(out, "// Parameters");
    let _ = writeln!(out, "{}", params.appearance.code());
    let _ = writeln!(out, "{}", java_float(params.scale));
    let _ = writeln!(out, "{}", java_float(params.gamma));
    let _ = writeln!(out, "{}", params.snap_range);
    let _ = writeln!(out, "{}", params.window_size);
    let _ = writeln!(out, "{}", params.half_smooth_range);
    let _ = writeln!(out, "{}", params.subsample_factor);
    let _ = writeln!(out, "{}", params.line_width);

    let _ = writeln!(out, "// Type names and colors");
    for i in 0..TYPE_SLOTS {
        let _ = writeln!(out, "{}", one_line(labels.type_name(i)));
        let _ = writeln!(out, "{}", labels.type_color(i).index());
    }

    let _ = writeln!(out, "// Cluster names");
    for i in 0..CLUSTER_SLOTS {
        let _ = writeln!(out, "{}", one_line(labels.cluster_name(i)));
    }

    for tracing in tracings {
        let id = tracing.id();
        let _ = writeln!(out, "// Tracing N{id}");
        let _ = writeln!(out, "{id}");
        let _ = writeln!(out, "{}", tracing.type_index());
        let _ = writeln!(out, "{}", tracing.cluster_index());
        let _ = writeln!(out, "{}", one_line(tracing.label()));
        for (k, segment) in tracing.segments().iter().enumerate() {
            let _ = writeln!(out, "// Segment {} of Tracing N{id}", k + 1);
            for p in segment.points() {
                let _ = writeln!(out, "{}\n{}", p.x, p.y);
            }
        }
    }

    let _ = writeln!(out, "{TRAILER}");
    info!("serialized {} tracings", tracings.len());
    out
}

/// Parse an NDF file.
///
/// Segments and tracings of zero length are dropped. The trailer line
/// is optional; the end of the input also ends the tracing list.
///
/// # Errors
///
/// Returns [`NdfError::MissingHeader`] if the first line is not an NDF
/// header, [`NdfError::IncompatibleVersion`] for files from a newer
/// version, [`NdfError::InvalidNumber`] or [`NdfError::UnknownColor`]
/// for malformed values, and [`NdfError::Truncated`] if the input ends
/// before the cluster table is complete or inside a tracing header.
pub fn from_ndf(text: &str) -> Result<NdfDocument, NdfError> {
    let mut reader = LineReader::new(text);
    if !reader
        .advance()
        .is_some_and(|line| line.starts_with(HEADER_PREFIX))
    {
        return Err(NdfError::MissingHeader);
    }
    let version = reader.line()?.trim().to_owned();
    if version.as_str() > NDF_VERSION {
        return Err(NdfError::IncompatibleVersion { found: version });
    }
    debug!("reading version {version} data file");

    let params = read_params(&mut reader, &version)?;
    let labels = read_labels(&mut reader)?;
    let tracings = read_tracings(&mut reader)?;
    info!(
        "read {} tracings from version {version} data file",
        tracings.len()
    );

    Ok(NdfDocument {
        version,
        params,
        labels,
        tracings,
    })
}

fn read_params(reader: &mut LineReader<'_>, version: &str) -> Result<TracingParams, NdfError> {
    reader.line()?;
    let appearance = if version >= APPEARANCE_SINCE {
        Appearance::from_code(reader.number()?)
    } else {
        Appearance::Bright
    };
    let scale = reader.number()?;
    let gamma = reader.number()?;
    let snap_range = reader.number()?;
    let window_size = reader.number()?;
    let half_smooth_range = reader.number()?;
    let subsample_factor = reader.number()?;
    let line_width = if version >= LINE_WIDTH_SINCE {
        reader.number()?
    } else {
        for _ in 0..LEGACY_SETTING_LINES {
            reader.line()?;
        }
        TracingParams::DEFAULT_LINE_WIDTH
    };
    Ok(TracingParams {
        appearance,
        scale,
        gamma,
        snap_range,
        window_size,
        half_smooth_range,
        subsample_factor,
        line_width,
    })
}

fn read_labels(reader: &mut LineReader<'_>) -> Result<LabelTables, NdfError> {
    reader.line()?;
    let mut types = Vec::with_capacity(TYPE_SLOTS);
    for _ in 0..TYPE_SLOTS {
        let name = reader.line()?.to_owned();
        let index: usize = reader.number()?;
        let color = NamedColor::from_index(index).ok_or(NdfError::UnknownColor {
            line: reader.line_number(),
            index,
        })?;
        types.push(TypeLabel { name, color });
    }

    reader.line()?;
    let mut clusters = Vec::with_capacity(CLUSTER_SLOTS);
    for _ in 0..CLUSTER_SLOTS {
        clusters.push(reader.line()?.to_owned());
    }
    Ok(LabelTables { types, clusters })
}

fn read_tracings(reader: &mut LineReader<'_>) -> Result<Tracings, NdfError> {
    let unit = Calibration::default();
    let mut tracings = Tracings::new();
    let mut dropped_segments = 0_usize;
    let mut dropped_tracings = 0_usize;

    let mut line = reader.advance();
    while line.is_some_and(|l| l.starts_with("// Tracing")) {
        let mut tracing = Tracing::new(reader.number()?);
        tracing.set_type_index(reader.slot("type", TYPE_SLOTS)?);
        tracing.set_cluster_index(reader.slot("cluster", CLUSTER_SLOTS)?);
        tracing.set_label(reader.line()?);

        line = reader.advance();
        while line.is_some_and(|l| l.starts_with("// Segment")) {
            let mut points = Vec::new();
            line = reader.advance();
            while let Some(text) = line.filter(|l| !l.starts_with("//")) {
                let x = reader.parse(text)?;
                let y = reader.number()?;
                points.push(Point::new(x, y));
                line = reader.advance();
            }
            let segment = Segment::from_points(&points);
            if segment.length(&unit) > 0.0 {
                tracing.add_segment(segment);
            } else {
                dropped_segments += 1;
            }
        }

        if tracing.length(&unit) > 0.0 {
            tracings.push(tracing);
        } else {
            dropped_tracings += 1;
        }
    }

    if dropped_segments + dropped_tracings > 0 {
        debug!(
            "dropped {dropped_segments} zero-length segments and {dropped_tracings} zero-length tracings"
        );
    }
    Ok(tracings)
}

/// Line cursor that tracks 1-based line numbers for error reports.
struct LineReader<'a> {
    lines: std::str::Lines<'a>,
    number: usize,
}

impl<'a> LineReader<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines(),
            number: 0,
        }
    }

    const fn line_number(&self) -> usize {
        self.number
    }

    /// Next line, or `None` at the end of the input.
    fn advance(&mut self) -> Option<&'a str> {
        let line = self.lines.next()?;
        self.number += 1;
        Some(line)
    }

    /// Next line, which must exist.
    fn line(&mut self) -> Result<&'a str, NdfError> {
        self.advance().ok_or(NdfError::Truncated { line: self.number })
    }

    /// Next line parsed as a number.
    fn number<T: FromStr>(&mut self) -> Result<T, NdfError> {
        let text = self.line()?;
        self.parse(text)
    }

    /// Parse `text`, the line just read, as a number.
    fn slot(&mut self, table: &'static str, len: usize) -> Result<usize, NdfError> {
        let index: usize = self.number()?;
        if index < len {
            Ok(index)
        } else {
            Err(NdfError::SlotIndex {
                line: self.line_number(),
                table,
                index,
                len,
            })
        }
    }

    fn parse<T: FromStr>(&self, text: &str) -> Result<T, NdfError> {
        text.trim().parse().map_err(|_| NdfError::InvalidNumber {
            line: self.number,
            text: text.to_owned(),
        })
    }
}

/// Format like `Float.toString` for the values NDF files hold: integral
/// values keep a trailing `.0`.
fn java_float(value: f32) -> String {
    let text = value.to_string();
    if value.is_finite() && !text.contains('.') {
        format!("{text}.0")
    } else {
        text
    }
}

fn one_line(text: &str) -> String {
    text.replace(['\r', '\n'], " ")
}
