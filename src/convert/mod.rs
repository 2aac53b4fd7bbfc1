//! The conversion facade.
//!
//! [`MathSvg`] ties the pieces together: it validates options, acquires the
//! engine instance for the requested font, typesets, and normalizes the box
//! into the requested unit.
//!
//! # Example
//!
//! ```no_run
//! use mathsvg::{ConvertOptions, EngineConfig, MathSvg, Unit};
//!
//! fn main() -> mathsvg::Result<()> {
//!     let engine = MathSvg::new(&EngineConfig::from_env())?;
//!     let result = engine.convert(r"\frac{1}{2}", &ConvertOptions::new(Unit::Pt))?;
//!     println!("{} x {} (depth {})", result.width, result.height, result.depth);
//!     Ok(())
//! }
//! ```

mod persist;

use std::path::Path;
use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::engine::{EngineCache, EngineFactory, NodeEngineFactory, TypesetRequest};
use crate::error::{Error, Result};
use crate::fonts::FontResolver;
use crate::normalize::{normalize, Scale};
use crate::options::{ConvertOptions, EngineConfig};
use crate::result::{ConversionResult, SavedSvg};

/// One entry of a batch conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvertJob {
    /// TeX source
    pub math: String,

    /// Conversion options
    #[serde(flatten)]
    pub options: ConvertOptions,
}

impl ConvertJob {
    /// Create a job.
    pub fn new(math: impl Into<String>, options: ConvertOptions) -> Self {
        Self {
            math: math.into(),
            options,
        }
    }
}

/// LaTeX to SVG converter with a per-font engine cache.
pub struct MathSvg {
    cache: EngineCache,
}

impl MathSvg {
    /// Create a converter that runs MathJax under Node and materializes
    /// fonts into `config.cache_dir`.
    #[cfg(feature = "fetch")]
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let resolver = crate::fonts::FetchResolver::from_config(config)?;
        Ok(Self::with_engine(
            Arc::new(resolver),
            Arc::new(NodeEngineFactory::from_config(config)),
        ))
    }

    /// Create a converter that runs MathJax under Node and only uses fonts
    /// already present in `config.cache_dir`.
    #[cfg(not(feature = "fetch"))]
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let resolver = crate::fonts::LocalResolver::new(&config.cache_dir);
        Ok(Self::with_engine(
            Arc::new(resolver),
            Arc::new(NodeEngineFactory::from_config(config)),
        ))
    }

    /// Create a converter configured from `MATHSVG_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(&EngineConfig::from_env())
    }

    /// Create a converter from explicit font and engine strategies.
    pub fn with_engine(resolver: Arc<dyn FontResolver>, factory: Arc<dyn EngineFactory>) -> Self {
        Self {
            cache: EngineCache::new(resolver, factory),
        }
    }

    /// The engine instance cache.
    pub fn cache(&self) -> &EngineCache {
        &self.cache
    }

    /// Drop all cached engine instances.
    pub fn reset(&self) {
        self.cache.reset();
    }

    /// Convert `math` to a sized SVG.
    pub fn convert(&self, math: &str, options: &ConvertOptions) -> Result<ConversionResult> {
        options.validate()?;

        let instance = self.cache.acquire(options.font)?;
        let request = TypesetRequest {
            math,
            display: options.display,
            em: options.font_size,
            ex: options.ex_size(),
            container_width: options.container_width,
        };
        let raw = match instance.typeset(&request) {
            Err(err @ Error::EngineLost(_)) => {
                self.cache.evict(&instance);
                return Err(err);
            }
            other => other?,
        };
        let result = normalize(&raw, &Scale::for_options(options), instance.adaptor())?;

        log::debug!(
            "converted {} chars with {}: {} x {}, depth {}",
            math.len(),
            options.font,
            result.width,
            result.height,
            result.depth
        );
        Ok(result)
    }

    /// Convert `math` and write the SVG to `path`.
    ///
    /// Relative paths are resolved against the current directory. Missing
    /// parent directories are created and an existing file is replaced.
    pub fn convert_to_file(
        &self,
        math: &str,
        path: impl AsRef<Path>,
        options: &ConvertOptions,
    ) -> Result<SavedSvg> {
        let path = persist::absolute_path(path.as_ref())?;
        let result = self.convert(math, options)?;
        persist::write_svg(&path, &result.svg)?;

        Ok(SavedSvg {
            path,
            width: result.width,
            height: result.height,
            depth: result.depth,
        })
    }

    /// Convert many expressions in parallel.
    ///
    /// Results are in job order. Jobs sharing a font are serialized on that
    /// font's engine instance.
    pub fn convert_batch(&self, jobs: &[ConvertJob]) -> Vec<Result<ConversionResult>> {
        jobs.par_iter()
            .map(|job| self.convert(&job.math, &job.options))
            .collect()
    }
}

impl std::fmt::Debug for MathSvg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MathSvg")
            .field("cached_fonts", &self.cache.cached_fonts())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Typesetter;
    use crate::fonts::{BundledResolver, FontAssets, MathFont};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use crate::units::Unit;

    /// Emits a box whose width is the number of characters in ex.
    struct CharWidth;

    impl Typesetter for CharWidth {
        fn typeset(&mut self, request: &TypesetRequest<'_>) -> Result<String> {
            Ok(format!(
                r#"<svg style="vertical-align: -0.5ex;" xmlns="http://www.w3.org/2000/svg" width="{}ex" height="2ex" viewBox="0 0 1 1"></svg>"#,
                request.math.chars().count()
            ))
        }
    }

    struct CharWidthFactory;

    impl EngineFactory for CharWidthFactory {
        fn build(&self, _assets: &FontAssets) -> Result<Box<dyn Typesetter>> {
            Ok(Box::new(CharWidth))
        }
    }

    fn engine() -> MathSvg {
        MathSvg::with_engine(Arc::new(BundledResolver), Arc::new(CharWidthFactory))
    }

    #[test]
    fn test_convert_scales_to_points() {
        let result = engine()
            .convert("abcd", &ConvertOptions::new(Unit::Pt))
            .unwrap();
        assert_eq!(result.width, "32.000pt");
        assert_eq!(result.height, "16.000pt");
        assert_eq!(result.depth, "4.000pt");
    }

    #[test]
    fn test_invalid_options_rejected_before_engine() {
        let engine = engine();
        let options = ConvertOptions::new(Unit::Pt).with_font_size(0.0);
        let err = engine.convert("x", &options).unwrap_err();
        assert!(matches!(err, Error::InvalidOption { .. }));
        assert!(!engine.cache().is_cached(MathFont::Tex));
    }

    #[test]
    fn test_batch_preserves_order() {
        let jobs: Vec<_> = (1..=6)
            .map(|n| ConvertJob::new("x".repeat(n), ConvertOptions::new(Unit::Ex)))
            .collect();
        let results = engine().convert_batch(&jobs);

        let widths: Vec<_> = results
            .into_iter()
            .map(|r| r.unwrap().width)
            .collect();
        assert_eq!(
            widths,
            ["1.000ex", "2.000ex", "3.000ex", "4.000ex", "5.000ex", "6.000ex"]
        );
    }

    #[test]
    fn test_batch_reports_errors_per_job() {
        let jobs = vec![
            ConvertJob::new("x", ConvertOptions::new(Unit::Ex)),
            ConvertJob::new("x", ConvertOptions::new(Unit::Ex).with_font(MathFont::Fira)),
        ];
        let results = engine().convert_batch(&jobs);
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(Error::FontMaterialization { .. })
        ));
    }

    #[test]
    fn test_job_deserializes_flat() {
        let job: ConvertJob =
            serde_json::from_str(r#"{"math": "x^2", "unit": "mm", "fontSize": 12}"#).unwrap();
        assert_eq!(job.math, "x^2");
        assert_eq!(job.options.unit, Unit::Mm);
        assert_eq!(job.options.font_size, 12.0);
        assert!(job.options.display);
    }

    /// Builds typesetters whose worker dies after `lifetime` conversions.
    struct Mortal {
        lifetime: usize,
        builds: AtomicUsize,
    }

    struct MortalTypesetter {
        left: usize,
    }

    impl Typesetter for MortalTypesetter {
        fn typeset(&mut self, request: &TypesetRequest<'_>) -> Result<String> {
            if self.left == 0 {
                return Err(Error::EngineLost("worker exited".into()));
            }
            self.left -= 1;
            CharWidth.typeset(request)
        }
    }

    impl EngineFactory for Mortal {
        fn build(&self, _assets: &FontAssets) -> Result<Box<dyn Typesetter>> {
            self.builds.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(MortalTypesetter {
                left: self.lifetime,
            }))
        }
    }

    #[test]
    fn test_lost_engine_is_rebuilt() {
        let factory = Arc::new(Mortal {
            lifetime: 1,
            builds: AtomicUsize::new(0),
        });
        let engine = MathSvg::with_engine(Arc::new(BundledResolver), factory.clone());
        let options = ConvertOptions::new(Unit::Ex);

        assert!(engine.convert("x", &options).is_ok());
        let err = engine.convert("x", &options).unwrap_err();
        assert!(matches!(err, Error::EngineLost(_)));
        assert!(!engine.cache().is_cached(MathFont::Tex));

        assert_eq!(engine.convert("xy", &options).unwrap().width, "2.000ex");
        assert_eq!(factory.builds.load(Ordering::SeqCst), 2);
    }

    struct Picky;

    impl Typesetter for Picky {
        fn typeset(&mut self, request: &TypesetRequest<'_>) -> Result<String> {
            if request.math.starts_with('\\') {
                return Err(Error::EngineConversion("Undefined control sequence".into()));
            }
            CharWidth.typeset(request)
        }
    }

    struct PickyFactory;

    impl EngineFactory for PickyFactory {
        fn build(&self, _assets: &FontAssets) -> Result<Box<dyn Typesetter>> {
            Ok(Box::new(Picky))
        }
    }

    #[test]
    fn test_rejected_math_keeps_engine() {
        let engine = MathSvg::with_engine(Arc::new(BundledResolver), Arc::new(PickyFactory));
        let options = ConvertOptions::new(Unit::Ex);
        engine.convert("x", &options).unwrap();
        let before = engine.cache().acquire(MathFont::Tex).unwrap();

        let err = engine.convert(r"\nope", &options).unwrap_err();
        assert!(matches!(err, Error::EngineConversion(_)));
        assert!(Arc::ptr_eq(
            &before,
            &engine.cache().acquire(MathFont::Tex).unwrap()
        ));
    }

    #[test]
    fn test_reset_clears_cache() {
        let engine = engine();
        engine.convert("x", &ConvertOptions::new(Unit::Ex)).unwrap();
        assert!(engine.cache().is_cached(MathFont::Tex));
        engine.reset();
        assert!(engine.cache().cached_fonts().is_empty());
    }
}
