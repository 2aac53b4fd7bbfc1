//! Integration tests for conversion through the engine cache and normalizer.

mod common;

use std::fs;
use std::sync::Arc;
use std::thread;

use common::fake_engine;
use mathsvg::engine::SvgAdaptor;
use mathsvg::{ConvertJob, ConvertOptions, Error, MathFont, Unit};
use tempfile::tempdir;

const FRACTION: &str = r"\frac{1}{2}";

// ==================== Markup ====================

#[test]
fn test_svg_is_bare_and_well_formed() {
    let (engine, _) = fake_engine();
    let result = engine
        .convert(FRACTION, &ConvertOptions::new(Unit::Pt))
        .unwrap();

    assert!(result.svg.starts_with("<svg"));
    assert!(result.svg.ends_with("</svg>"));
    assert!(result.svg.contains(r#"xmlns="http://www.w3.org/2000/svg""#));
    assert!(result.svg.contains("viewBox="));
    assert!(!result.svg.contains("mjx-container"));
}

#[test]
fn test_reported_size_matches_root_attributes() {
    let (engine, _) = fake_engine();
    let adaptor = SvgAdaptor::new();

    for unit in Unit::ALL {
        let result = engine
            .convert(FRACTION, &ConvertOptions::new(unit).with_font_size(11.0))
            .unwrap();
        assert_eq!(
            adaptor.root_attribute(&result.svg, "width"),
            Some(result.width.as_str())
        );
        assert_eq!(
            adaptor.root_attribute(&result.svg, "height"),
            Some(result.height.as_str())
        );
    }
}

// ==================== Units ====================

#[test]
fn test_every_unit_suffix() {
    let (engine, _) = fake_engine();
    for unit in Unit::ALL {
        let result = engine.convert("x^2", &ConvertOptions::new(unit)).unwrap();
        let suffix = unit.suffix();
        assert!(result.width.ends_with(suffix), "{}", result.width);
        assert!(result.height.ends_with(suffix), "{}", result.height);
        assert!(result.depth.ends_with(suffix), "{}", result.depth);
    }
}

#[test]
fn test_three_decimal_places() {
    let (engine, _) = fake_engine();
    let result = engine.convert("x", &ConvertOptions::new(Unit::Pt)).unwrap();

    // 0.747ex * 8pt
    assert_eq!(result.width, "5.976pt");
    assert_eq!(result.height, "8.200pt");
    assert_eq!(result.depth, "0.200pt");
}

#[test]
fn test_ex_width_independent_of_font_size() {
    let (engine, _) = fake_engine();
    let small = engine
        .convert(FRACTION, &ConvertOptions::new(Unit::Ex).with_font_size(10.0))
        .unwrap();
    let large = engine
        .convert(FRACTION, &ConvertOptions::new(Unit::Ex).with_font_size(24.0))
        .unwrap();

    assert_eq!(small.width, large.width);
    assert_eq!(small.height, large.height);
    assert_eq!(small.depth, large.depth);
}

#[test]
fn test_width_grows_with_font_size() {
    let (engine, _) = fake_engine();
    let widths: Vec<f64> = [8.0, 11.0, 16.0, 24.0]
        .into_iter()
        .map(|size| {
            engine
                .convert(FRACTION, &ConvertOptions::new(Unit::Px).with_font_size(size))
                .unwrap()
                .width_value()
                .unwrap()
        })
        .collect();

    assert!(widths.windows(2).all(|w| w[0] < w[1]), "{:?}", widths);
}

#[test]
fn test_smaller_x_height_ratio_gives_smaller_width() {
    let (engine, _) = fake_engine();
    let times = engine
        .convert(
            FRACTION,
            &ConvertOptions::new(Unit::Pt).with_x_height_ratio(0.45),
        )
        .unwrap();
    let helvetica = engine
        .convert(
            FRACTION,
            &ConvertOptions::new(Unit::Pt).with_x_height_ratio(0.52),
        )
        .unwrap();

    assert!(times.width_value().unwrap() < helvetica.width_value().unwrap());
}

#[test]
fn test_millimeters_from_point_font_size() {
    let (engine, _) = fake_engine();
    let options = ConvertOptions::new(Unit::Mm)
        .with_font_size(12.0)
        .with_font_size_unit(mathsvg::AbsoluteUnit::Pt);
    let result = engine.convert("x", &options).unwrap();

    // 0.747ex * 6pt * 25.4/72
    assert_eq!(result.width, "1.581mm");
}

// ==================== Depth ====================

#[test]
fn test_fraction_has_positive_depth() {
    let (engine, _) = fake_engine();
    let result = engine
        .convert(FRACTION, &ConvertOptions::new(Unit::Pt))
        .unwrap();
    assert!(result.depth_value().unwrap() > 0.0);
    assert_eq!(result.depth, "12.616pt");
}

#[test]
fn test_single_letter_depth_is_small() {
    let (engine, _) = fake_engine();
    let result = engine.convert("x", &ConvertOptions::new(Unit::Pt)).unwrap();
    let depth = result.depth_value().unwrap();
    assert!((0.0..1.0).contains(&depth), "{}", depth);
}

#[test]
fn test_inline_fraction_is_shallower() {
    let (engine, _) = fake_engine();
    let display = engine
        .convert(FRACTION, &ConvertOptions::new(Unit::Pt))
        .unwrap();
    let inline = engine
        .convert(FRACTION, &ConvertOptions::new(Unit::Pt).inline())
        .unwrap();
    assert!(inline.depth_value().unwrap() < display.depth_value().unwrap());
}

// ==================== Inputs ====================

#[test]
fn test_empty_input_succeeds() {
    let (engine, _) = fake_engine();
    let result = engine.convert("", &ConvertOptions::new(Unit::Pt)).unwrap();

    assert!(result.svg.starts_with("<svg"));
    assert_eq!(result.width, "0.000pt");
    assert_eq!(result.height, "0.000pt");
    assert_eq!(result.depth, "0.000pt");
}

#[test]
fn test_identical_inputs_have_identical_metrics() {
    let (engine, _) = fake_engine();
    let options = ConvertOptions::new(Unit::Px);
    let first = engine.convert(FRACTION, &options).unwrap();
    let second = engine.convert(FRACTION, &options).unwrap();

    assert!(first.same_metrics(&second));
    assert_ne!(first.svg, second.svg);
}

#[test]
fn test_tagged_display_equation() {
    let (engine, _) = fake_engine();
    let adaptor = SvgAdaptor::new();
    let result = engine
        .convert(r"x \tag{1}", &ConvertOptions::new(Unit::Pt))
        .unwrap();

    // "x\tag{1}" is 8 glyphs: 4.751ex * 8pt
    assert_eq!(result.width, "38.008pt");
    assert_eq!(result.height, "8.200pt");
    assert_eq!(result.depth, "0.200pt");
    assert_eq!(adaptor.root_attribute(&result.svg, "width"), Some("38.008pt"));
    assert!(result.svg.contains("min-width: 38.008pt;"));
    assert!(!result.svg.contains("100%"));
}

#[test]
fn test_engine_rejection_is_an_error() {
    let (engine, _) = fake_engine();
    let err = engine
        .convert(r"\undefinedcommand{x}", &ConvertOptions::new(Unit::Pt))
        .unwrap_err();
    assert!(matches!(err, Error::EngineConversion(_)));
}

#[test]
fn test_invalid_font_size_is_rejected() {
    let (engine, factory) = fake_engine();
    let err = engine
        .convert("x", &ConvertOptions::new(Unit::Pt).with_font_size(-3.0))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidOption { name: "fontSize", .. }));
    assert_eq!(factory.builds(), 0);
}

// ==================== Engine cache ====================

#[test]
fn test_one_engine_per_font() {
    let (engine, factory) = fake_engine();
    let tex = ConvertOptions::new(Unit::Pt);
    let stix = ConvertOptions::new(Unit::Pt).with_font(MathFont::Stix2);

    engine.convert("x", &tex).unwrap();
    engine.convert("y", &tex).unwrap();
    let result = engine.convert("x", &stix).unwrap();

    assert_eq!(factory.builds(), 2);
    assert_eq!(
        engine.cache().cached_fonts(),
        vec![MathFont::Tex, MathFont::Stix2]
    );
    assert!(result.svg.contains("-STIX2-"));
}

#[test]
fn test_reset_rebuilds_engines() {
    let (engine, factory) = fake_engine();
    let options = ConvertOptions::new(Unit::Ex);

    engine.convert("x", &options).unwrap();
    engine.reset();
    engine.convert("x", &options).unwrap();

    assert_eq!(factory.builds(), 2);
}

#[test]
fn test_parallel_conversions_share_one_engine() {
    let (engine, factory) = fake_engine();
    let engine = Arc::new(engine);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = engine.clone();
            thread::spawn(move || {
                engine
                    .convert(FRACTION, &ConvertOptions::new(Unit::Pt))
                    .unwrap()
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(factory.builds(), 1);
    assert!(results.windows(2).all(|w| w[0].same_metrics(&w[1])));
}

#[test]
fn test_batch_across_fonts() {
    let (engine, factory) = fake_engine();
    let jobs: Vec<_> = MathFont::ALL
        .into_iter()
        .flat_map(|font| {
            let options = ConvertOptions::new(Unit::Pt).with_font(font);
            [
                ConvertJob::new("x", options.clone()),
                ConvertJob::new(FRACTION, options),
            ]
        })
        .collect();

    let results = engine.convert_batch(&jobs);

    assert_eq!(results.len(), jobs.len());
    assert_eq!(factory.builds(), MathFont::ALL.len());
    for (job, result) in jobs.iter().zip(&results) {
        let result = result.as_ref().unwrap();
        let expected = if job.math == "x" { "5.976pt" } else { "51.736pt" };
        assert_eq!(result.width, expected);
    }
}

// ==================== Files ====================

#[test]
fn test_convert_to_file_creates_parents() {
    let (engine, _) = fake_engine();
    let dir = tempdir().unwrap();
    let path = dir.path().join("figures").join("eq1.svg");

    let saved = engine
        .convert_to_file(FRACTION, &path, &ConvertOptions::new(Unit::Mm))
        .unwrap();

    assert_eq!(saved.path, path);
    let written = fs::read_to_string(&path).unwrap();
    assert!(written.starts_with("<svg"));
    assert!(written.contains(&format!(r#"width="{}""#, saved.width)));
    assert!(saved.depth.ends_with("mm"));
}

#[test]
fn test_convert_to_file_overwrites() {
    let (engine, _) = fake_engine();
    let dir = tempdir().unwrap();
    let path = dir.path().join("eq.svg");
    fs::write(&path, "stale").unwrap();

    engine
        .convert_to_file("x", &path, &ConvertOptions::new(Unit::Px))
        .unwrap();

    assert_ne!(fs::read_to_string(&path).unwrap(), "stale");
}

#[test]
fn test_convert_to_file_failure_writes_nothing() {
    let (engine, _) = fake_engine();
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.svg");

    let result = engine.convert_to_file(r"\undefinedcommand", &path, &ConvertOptions::new(Unit::Pt));

    assert!(result.is_err());
    assert!(!path.exists());
}

#[test]
fn test_convert_to_unwritable_path() {
    let (engine, _) = fake_engine();
    let dir = tempdir().unwrap();
    let blocker = dir.path().join("file");
    fs::write(&blocker, "").unwrap();

    let err = engine
        .convert_to_file("x", blocker.join("eq.svg"), &ConvertOptions::new(Unit::Pt))
        .unwrap_err();
    assert!(matches!(err, Error::Persistence { .. }));
}
