//! wiretrace: command-line front end for the live-wire neurite tracer.
//!
//! All file I/O happens here; the library crates work on in-memory
//! images and strings. Subcommands:
//!
//! - `costs`: write the cost image of an input image as PNG
//! - `trace`: trace one neurite through scripted waypoints and save it
//!   as a NeuronJ data file (NDF)
//! - `info`: print tracing counts, lengths, and optional intensity
//!   statistics of an NDF
//! - `export`: convert an NDF to tab- or comma-delimited vertex lists
//!   or to SVG
//! - `snapshot`: render an NDF's tracings over their image as PNG
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin wiretrace -- trace cells.png 12,40 80,44 130,90 -o cells.ndf
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::{Args, Parser, Subcommand, ValueEnum};
use image::GrayImage;
use log::{debug, info};
use wiretrace_core::grayscale::decode_and_grayscale;
use wiretrace_core::{
    Calibration, GaussianDerivatives, LabelTables, Point, Progress, TracingParams,
    TracingSession, ValueStats, trace_waypoints,
};
use wiretrace_export::{
    Delimiter, NdfDocument, SnapshotContent, SvgMetadata, from_ndf, session_to_ndf, snapshot,
    to_delimited, to_delimited_separate, to_svg,
};

type CliResult<T = ()> = Result<T, Box<dyn Error>>;

/// Live-wire tracing of neurites in 2-D grayscale images.
#[derive(Parser)]
#[command(name = "wiretrace", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write the cost image (dark = cheap to trace through) as PNG.
    Costs {
        /// Input image (PNG, JPEG, BMP, TIFF).
        image: PathBuf,

        /// Output PNG path.
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        params: ParamArgs,
    },

    /// Trace one neurite through the given waypoints and write an NDF.
    Trace {
        /// Input image (PNG, JPEG, BMP, TIFF).
        image: PathBuf,

        /// Waypoints as `x,y`, clicked in order. Each is snapped to the
        /// cheapest pixel within the snap range.
        #[arg(required = true, num_args = 2.., value_parser = parse_point)]
        waypoints: Vec<Point>,

        /// Output NDF path; standard output if omitted.
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        params: ParamArgs,
    },

    /// Print tracing count, length, and intensity statistics of an NDF.
    Info {
        /// NeuronJ data file.
        ndf: PathBuf,

        /// Image the tracings belong to; enables intensity statistics.
        #[arg(long)]
        image: Option<PathBuf>,

        #[command(flatten)]
        calibration: CalibrationArgs,
    },

    /// Convert an NDF to delimited vertex lists or SVG.
    Export {
        /// NeuronJ data file.
        ndf: PathBuf,

        /// Output format.
        #[arg(long, value_enum, default_value_t = Format::Tab)]
        format: Format,

        /// Write one file per tracing plus an index (delimited formats).
        #[arg(long)]
        separate: bool,

        /// Image the tracings belong to; required for SVG.
        #[arg(long)]
        image: Option<PathBuf>,

        /// Output path; standard output if omitted. Required with
        /// `--separate`, where it names the index file.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Render the tracings of an NDF over their image as PNG.
    Snapshot {
        /// NeuronJ data file.
        ndf: PathBuf,

        /// Image the tracings belong to.
        image: PathBuf,

        /// Output PNG path.
        #[arg(short, long)]
        output: PathBuf,

        /// Draw the tracings on black instead of on the image.
        #[arg(long)]
        no_image: bool,
    },
}

/// Tracing parameters, either flag by flag or as one JSON object.
#[derive(Args)]
struct ParamArgs {
    /// Brightness of the structures to trace.
    #[arg(long, value_enum, default_value_t = AppearanceArg::Bright)]
    appearance: AppearanceArg,

    /// Hessian scale in pixels.
    #[arg(long, default_value_t = TracingParams::DEFAULT_SCALE)]
    scale: f32,

    /// Cost weight against the orientation term, in [0, 1].
    #[arg(long, default_value_t = TracingParams::DEFAULT_GAMMA)]
    gamma: f32,

    /// Half-width of the cursor snapping square; 0 disables snapping.
    #[arg(long, default_value_t = TracingParams::DEFAULT_SNAP_RANGE)]
    snap_range: u32,

    /// Side length of the path search window.
    #[arg(long, default_value_t = TracingParams::DEFAULT_WINDOW_SIZE)]
    window_size: u32,

    /// Half-width of the smoothing kernel; 0 disables smoothing.
    #[arg(long, default_value_t = TracingParams::DEFAULT_HALF_SMOOTH_RANGE)]
    half_smooth_range: u32,

    /// Keep every n-th smoothed point.
    #[arg(long, default_value_t = TracingParams::DEFAULT_SUBSAMPLE_FACTOR)]
    subsample_factor: u32,

    /// Stroke width stored in the NDF.
    #[arg(long, default_value_t = TracingParams::DEFAULT_LINE_WIDTH)]
    line_width: u32,

    /// Full parameter set as JSON. Overrides all individual flags.
    ///
    /// Missing fields take their defaults, e.g.
    /// `{"appearance":"Dark","scale":3.0}`.
    #[arg(long)]
    config_json: Option<String>,
}

#[derive(Args)]
struct CalibrationArgs {
    /// Width of one pixel in `--unit`.
    #[arg(long, default_value_t = 1.0)]
    pixel_width: f64,

    /// Height of one pixel in `--unit`.
    #[arg(long, default_value_t = 1.0)]
    pixel_height: f64,

    /// Length unit name.
    #[arg(long, default_value = "pixel")]
    unit: String,
}

#[derive(Clone, Copy, ValueEnum)]
enum AppearanceArg {
    Bright,
    Dark,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    /// Tab-delimited `x<TAB>y` lines.
    Tab,
    /// Comma-delimited `x,y` lines.
    Csv,
    /// SVG document, one path per tracing.
    Svg,
}

/// Build [`TracingParams`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored.
fn params_from_args(args: &ParamArgs) -> CliResult<TracingParams> {
    if let Some(ref json) = args.config_json {
        return serde_json::from_str(json)
            .map_err(|e| format!("Error parsing --config-json: {e}").into());
    }
    Ok(TracingParams {
        appearance: match args.appearance {
            AppearanceArg::Bright => wiretrace_core::Appearance::Bright,
            AppearanceArg::Dark => wiretrace_core::Appearance::Dark,
        },
        scale: args.scale,
        gamma: args.gamma,
        snap_range: args.snap_range,
        window_size: args.window_size,
        half_smooth_range: args.half_smooth_range,
        subsample_factor: args.subsample_factor,
        line_width: args.line_width,
    })
}

impl From<&CalibrationArgs> for Calibration {
    fn from(args: &CalibrationArgs) -> Self {
        Self {
            pixel_width: args.pixel_width,
            pixel_height: args.pixel_height,
            unit: args.unit.clone(),
        }
    }
}

/// Parse an `x,y` pixel coordinate.
fn parse_point(s: &str) -> Result<Point, String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected x,y but got {s:?}"))?;
    let coord = |v: &str| {
        v.trim()
            .parse::<i32>()
            .map_err(|e| format!("invalid coordinate {v:?}: {e}"))
    };
    Ok(Point::new(coord(x)?, coord(y)?))
}

/// Logs cost-field progress in 10 % steps.
#[derive(Default)]
struct LogProgress {
    last_decile: Option<u32>,
}

impl Progress for LogProgress {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn report(&mut self, fraction: f64) {
        let decile = (fraction.clamp(0.0, 1.0) * 10.0) as u32;
        if self.last_decile != Some(decile) {
            self.last_decile = Some(decile);
            debug!("{}% done", decile * 10);
        }
    }

    fn status(&mut self, message: &str) {
        info!("{message}");
    }
}

fn read_gray(path: &Path) -> CliResult<GrayImage> {
    let bytes =
        std::fs::read(path).map_err(|e| format!("Error reading {}: {e}", path.display()))?;
    debug!("read {} ({} bytes)", path.display(), bytes.len());
    Ok(decode_and_grayscale(&bytes)?)
}

fn read_ndf(path: &Path) -> CliResult<NdfDocument> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("Error reading {}: {e}", path.display()))?;
    let doc = from_ndf(&text).map_err(|e| format!("{}: {e}", path.display()))?;
    info!(
        "loaded {} tracings from {} (version {})",
        doc.tracings.len(),
        path.display(),
        doc.version,
    );
    Ok(doc)
}

/// Write `text` to `output`, or to standard output when `None`.
fn write_text(output: Option<&Path>, text: &str) -> CliResult {
    match output {
        Some(path) => {
            std::fs::write(path, text)
                .map_err(|e| format!("Error writing {}: {e}", path.display()))?;
            info!("wrote {}", path.display());
        }
        None => print!("{text}"),
    }
    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(String::new, |n| n.to_string_lossy().into_owned())
}

fn costs(image: &Path, output: &Path, params: &ParamArgs) -> CliResult {
    let params = params_from_args(params)?;
    let gray = read_gray(image)?;
    let mut session = TracingSession::new(gray, params, LabelTables::default());
    let start = Instant::now();
    session.compute_costs(&GaussianDerivatives, &mut LogProgress::default())?;
    info!("cost field computed in {:.2?}", start.elapsed());
    session.cost_image()?.save(output)?;
    info!("wrote {}", output.display());
    Ok(())
}

fn trace(
    image: &Path,
    waypoints: &[Point],
    output: Option<&Path>,
    params: &ParamArgs,
) -> CliResult {
    let params = params_from_args(params)?;
    let bytes =
        std::fs::read(image).map_err(|e| format!("Error reading {}: {e}", image.display()))?;
    let start = Instant::now();
    let session = trace_waypoints(&bytes, &params, waypoints, &mut LogProgress::default())?;
    let Some(tracing) = session.tracings().iter().next_back() else {
        return Err("waypoints produced an empty tracing".into());
    };
    info!(
        "traced N{} through {} waypoints: {} vertices in {:.2?}",
        tracing.id(),
        waypoints.len(),
        tracing.polyline().len(),
        start.elapsed(),
    );
    write_text(output, &session_to_ndf(&session))
}

fn print_info(ndf: &Path, image: Option<&Path>, calibration: &Calibration) -> CliResult {
    let doc = read_ndf(ndf)?;
    let gray = image.map(read_gray).transpose()?;
    let steps = usize::try_from(doc.params.clamped().subsample_factor)?;

    println!("Tracings: {}", doc.tracings.len());
    let mut lengths = ValueStats::new();
    let mut intensities = ValueStats::new();
    for tracing in &doc.tracings {
        let length = tracing.length(calibration);
        lengths.push(length);
        println!(
            "N{}\t{}\t{}\t{}\t{length:.3} {}",
            tracing.id(),
            doc.labels.type_name(tracing.type_index()),
            doc.labels.cluster_name(tracing.cluster_index()),
            tracing.label(),
            calibration.unit,
        );
        if let Some(ref gray) = gray {
            tracing.sample_values(gray, steps, &mut intensities);
        }
    }

    let l = lengths.summary();
    println!(
        "Length ({}): sum {:.3}, mean {:.3}, sd {:.3}, min {:.3}, max {:.3}",
        calibration.unit, l.sum, l.mean, l.sd, l.min, l.max,
    );
    if gray.is_some() {
        let v = intensities.summary();
        println!(
            "Intensity ({} samples): mean {:.3}, sd {:.3}, min {:.3}, max {:.3}",
            v.count, v.mean, v.sd, v.min, v.max,
        );
    }
    Ok(())
}

fn export(
    ndf: &Path,
    format: Format,
    separate: bool,
    image: Option<&Path>,
    output: Option<&Path>,
) -> CliResult {
    let doc = read_ndf(ndf)?;
    let delimiter = match format {
        Format::Tab => Delimiter::Tab,
        Format::Csv => Delimiter::Comma,
        Format::Svg => {
            let image = image.ok_or("--image is required for SVG export")?;
            let gray = read_gray(image)?;
            let title = file_name(image);
            let svg = to_svg(
                &doc.tracings,
                &doc.labels,
                wiretrace_core::Dimensions::of(&gray),
                doc.params.clamped().line_width,
                &SvgMetadata {
                    title: Some(&title),
                    description: None,
                },
            );
            return write_text(output, &svg);
        }
    };

    if !separate {
        return write_text(output, &to_delimited(&doc.tracings, delimiter));
    }
    let index_path = output.ok_or("--output is required with --separate")?;
    let export = to_delimited_separate(&doc.tracings, delimiter, &index_path.to_string_lossy());
    for file in &export.files {
        write_text(Some(Path::new(&file.path)), &file.contents)?;
    }
    write_text(Some(index_path), &export.index)
}

fn render_snapshot(ndf: &Path, image: &Path, output: &Path, no_image: bool) -> CliResult {
    let doc = read_ndf(ndf)?;
    let gray = read_gray(image)?;
    let mut session = TracingSession::new(gray, TracingParams::default(), LabelTables::default());
    doc.install(&mut session);
    let content = SnapshotContent {
        image: !no_image,
        tracings: true,
    };
    let Some(rgb) = snapshot(&session, content) else {
        return Err("nothing to render".into());
    };
    rgb.save(output)?;
    info!("wrote {}", output.display());
    Ok(())
}

fn run(cli: Cli) -> CliResult {
    match cli.command {
        Command::Costs {
            image,
            output,
            params,
        } => costs(&image, &output, &params),
        Command::Trace {
            image,
            waypoints,
            output,
            params,
        } => trace(&image, &waypoints, output.as_deref(), &params),
        Command::Info {
            ndf,
            image,
            calibration,
        } => print_info(&ndf, image.as_deref(), &Calibration::from(&calibration)),
        Command::Export {
            ndf,
            format,
            separate,
            image,
            output,
        } => export(&ndf, format, separate, image.as_deref(), output.as_deref()),
        Command::Snapshot {
            ndf,
            image,
            output,
            no_image,
        } => render_snapshot(&ndf, &image, &output, no_image),
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn points_parse_with_optional_spaces() {
        assert_eq!(parse_point("12,40").unwrap(), Point::new(12, 40));
        assert_eq!(parse_point(" 3 , -1").unwrap(), Point::new(3, -1));
    }

    #[test]
    fn malformed_points_are_rejected() {
        assert!(parse_point("12").is_err());
        assert!(parse_point("a,4").is_err());
        assert!(parse_point("1.5,2").is_err());
    }

    #[test]
    fn trace_needs_two_waypoints() {
        let result = Cli::try_parse_from(["wiretrace", "trace", "img.png", "1,1"]);
        assert!(result.is_err());
    }

    #[test]
    fn flags_become_params() {
        let cli = Cli::try_parse_from([
            "wiretrace",
            "costs",
            "img.png",
            "-o",
            "costs.png",
            "--appearance",
            "dark",
            "--scale",
            "3.5",
        ])
        .unwrap();
        let Command::Costs { params, .. } = cli.command else {
            unreachable!("parsed a costs command");
        };
        let params = params_from_args(&params).unwrap();
        assert_eq!(params.appearance, wiretrace_core::Appearance::Dark);
        assert!((params.scale - 3.5).abs() < f32::EPSILON);
        assert_eq!(params.window_size, TracingParams::DEFAULT_WINDOW_SIZE);
    }

    #[test]
    fn config_json_overrides_flags() {
        let cli = Cli::try_parse_from([
            "wiretrace",
            "costs",
            "img.png",
            "-o",
            "costs.png",
            "--scale",
            "9",
            "--config-json",
            r#"{"snap_range":2}"#,
        ])
        .unwrap();
        let Command::Costs { params, .. } = cli.command else {
            unreachable!("parsed a costs command");
        };
        let params = params_from_args(&params).unwrap();
        assert_eq!(params.snap_range, 2);
        assert!((params.scale - TracingParams::DEFAULT_SCALE).abs() < f32::EPSILON);
    }

    #[test]
    fn bad_config_json_is_reported() {
        let cli = Cli::try_parse_from([
            "wiretrace",
            "costs",
            "img.png",
            "-o",
            "out.png",
            "--config-json",
            "{",
        ])
        .unwrap();
        let Command::Costs { params, .. } = cli.command else {
            unreachable!("parsed a costs command");
        };
        let err = params_from_args(&params).unwrap_err();
        assert!(err.to_string().starts_with("Error parsing --config-json"));
    }
}
