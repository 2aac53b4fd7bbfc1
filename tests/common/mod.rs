//! Deterministic stand-in for the MathJax worker.
//!
//! Metrics depend only on the math text and the display flag, as MathJax's
//! ex-valued output does. Glyph ids change on every call so markup of two
//! identical conversions differs while their metrics do not.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use mathsvg::{
    EngineFactory, Error, FontAssets, FontResolver, MathFont, MathSvg, Result, TypesetRequest,
    Typesetter,
};

/// Typesets by counting glyphs.
pub struct FakeTypesetter {
    font: MathFont,
    calls: u64,
}

impl FakeTypesetter {
    fn metrics(request: &TypesetRequest<'_>) -> (f64, f64, f64) {
        let glyphs = request.math.chars().filter(|c| !c.is_whitespace()).count();
        if glyphs == 0 {
            return (0.0, 0.0, 0.0);
        }

        let width = 0.572 * glyphs as f64 + 0.175;
        if request.math.contains(r"\frac") {
            if request.display {
                (width, 3.680, -1.577)
            } else {
                (width, 2.577, -0.844)
            }
        } else {
            (width, 1.025, -0.025)
        }
    }
}

impl Typesetter for FakeTypesetter {
    fn typeset(&mut self, request: &TypesetRequest<'_>) -> Result<String> {
        if request.math.contains(r"\undefinedcommand") {
            return Err(Error::EngineConversion(
                r"Undefined control sequence \undefinedcommand".into(),
            ));
        }

        self.calls += 1;
        let (width, height, offset) = Self::metrics(request);
        let id = format!("MJX-{}-{}-I-1D465", self.calls, self.font.name().to_uppercase());

        // Numbered display equations span the container.
        if request.display && request.math.contains(r"\tag") {
            return Ok(format!(
                concat!(
                    r#"<svg style="vertical-align: {offset:.3}ex; min-width: {width:.3}ex;" "#,
                    r#"xmlns="http://www.w3.org/2000/svg" width="100%" height="{height:.3}ex" "#,
                    r#"role="img" focusable="false" viewBox="0 {top} {vw} {vh}">"#,
                    r##"<g data-mml-node="mtable"><use xlink:href="#{id}"></use></g></svg>"##
                ),
                offset = offset,
                width = width,
                height = height,
                top = ((offset - height) * 431.0).round(),
                vw = (width * 431.0).round(),
                vh = (height * 431.0).round(),
                id = id,
            ));
        }

        Ok(format!(
            concat!(
                r#"<svg style="vertical-align: {offset:.3}ex;" xmlns="http://www.w3.org/2000/svg" "#,
                r#"width="{width:.3}ex" height="{height:.3}ex" role="img" focusable="false" "#,
                r#"viewBox="0 {top} {vw} {vh}" xmlns:xlink="http://www.w3.org/1999/xlink">"#,
                r#"<defs><path id="{id}" d="M52 289Q59 331 106 386"></path></defs>"#,
                r#"<g stroke="currentColor" fill="currentColor" stroke-width="0" transform="scale(1,-1)">"#,
                r##"<use data-c="1D465" xlink:href="#{id}"></use></g></svg>"##
            ),
            offset = offset,
            width = width,
            height = height,
            top = ((offset - height) * 431.0).round(),
            vw = (width * 431.0).round(),
            vh = (height * 431.0).round(),
            id = id,
        ))
    }
}

/// Counts how many typesetters were built.
#[derive(Default)]
pub struct FakeFactory {
    pub builds: AtomicUsize,
}

impl FakeFactory {
    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

impl EngineFactory for FakeFactory {
    fn build(&self, assets: &FontAssets) -> Result<Box<dyn Typesetter>> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeTypesetter {
            font: assets.font,
            calls: 0,
        }))
    }
}

/// Pretends every font is installed.
pub struct AllFonts;

impl FontResolver for AllFonts {
    fn resolve(&self, font: MathFont) -> Result<FontAssets> {
        if font.is_bundled() {
            Ok(FontAssets::bundled(font))
        } else {
            Ok(FontAssets::module(font, format!("/fonts/{}/mjs/svg.js", font)))
        }
    }
}

/// A converter backed by the fake engine, plus its factory for build counts.
pub fn fake_engine() -> (MathSvg, Arc<FakeFactory>) {
    let factory = Arc::new(FakeFactory::default());
    let engine = MathSvg::with_engine(Arc::new(AllFonts), factory.clone());
    (engine, factory)
}
