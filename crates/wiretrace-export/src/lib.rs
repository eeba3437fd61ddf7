//! wiretrace-export: Pure format serializers (sans-IO)
//!
//! Converts tracing sessions into NeuronJ data files (NDF), delimited
//! vertex lists, SVG documents, and raster snapshots, and reads NDF
//! files back. Everything works on in-memory strings and images.

pub mod delimited;
pub mod ndf;
pub mod snapshot;
pub mod svg;

pub use delimited::{Delimiter, SeparateExport, TracingFile, to_delimited, to_delimited_separate};
pub use ndf::{NDF_VERSION, NdfDocument, NdfError, from_ndf, session_to_ndf, to_ndf};
pub use snapshot::{RasterPainter, SnapshotContent, snapshot};
pub use svg::{SvgMetadata, build_path_data, to_svg};
