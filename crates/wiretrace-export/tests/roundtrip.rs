//! Integration test: trace a synthetic neurite image, save it as NDF,
//! load it into a fresh session, and export it in every format.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use image::{GrayImage, ImageEncoder, Luma};
use wiretrace_core::{NoProgress, Point, TracingParams, trace_waypoints};
use wiretrace_export::{
    Delimiter, SnapshotContent, SvgMetadata, from_ndf, session_to_ndf, snapshot, to_delimited,
    to_svg,
};

/// A bright diagonal-then-horizontal "neurite" on a dark background.
fn neurite_png() -> Vec<u8> {
    let img = GrayImage::from_fn(64, 48, |x, y| {
        let on_diagonal = x < 24 && y == x + 4;
        let on_branch = x >= 24 && y == 28;
        Luma([if on_diagonal || on_branch { 230 } else { 25 }])
    });
    let mut buf = Vec::new();
    image::codecs::png::PngEncoder::new(&mut buf)
        .write_image(
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::L8,
        )
        .unwrap();
    buf
}

#[test]
fn traced_session_survives_ndf_round_trip() {
    let png = neurite_png();
    let params = TracingParams::default();
    let waypoints = [Point::new(4, 8), Point::new(24, 28), Point::new(58, 28)];
    let session = trace_waypoints(&png, &params, &waypoints, &mut NoProgress)
        .expect("tracing should succeed");
    assert_eq!(session.tracings().len(), 1);
    let traced = session.tracings().get(0).unwrap().polyline();
    assert!(traced.len() >= 4, "expected a smoothed path, got {traced:?}");

    let text = session_to_ndf(&session);
    let doc = from_ndf(&text).expect("own output should parse");
    assert_eq!(doc.params, params);

    let mut reloaded = wiretrace_core::TracingSession::new(
        session.image().clone(),
        TracingParams::default(),
        wiretrace_core::LabelTables::default(),
    );
    doc.install(&mut reloaded);
    assert_eq!(reloaded.tracings().get(0).unwrap().polyline(), traced);
    assert_eq!(session_to_ndf(&reloaded), text);

    let tsv = to_delimited(reloaded.tracings(), Delimiter::Tab);
    assert_eq!(tsv.lines().count(), traced.len() + 1);
    assert!(tsv.starts_with("Tracing N1:\n"));

    let svg = to_svg(
        reloaded.tracings(),
        reloaded.labels(),
        reloaded.dimensions(),
        reloaded.params().line_width,
        &SvgMetadata {
            title: Some("neurite"),
            description: None,
        },
    );
    assert_eq!(svg.matches("<path").count(), 1);
    assert!(svg.contains(r#"viewBox="0 0 64 48""#));

    let shot = snapshot(&reloaded, SnapshotContent::default()).unwrap();
    assert_eq!(shot.dimensions(), (64, 48));
    let first = traced[0];
    let [r, g, b] = shot
        .get_pixel(first.x.unsigned_abs(), first.y.unsigned_abs())
        .0;
    assert_eq!([r, g, b], wiretrace_core::NamedColor::Magenta.rgb());
}
