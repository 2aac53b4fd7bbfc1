//! # mathsvg
//!
//! LaTeX math to standalone, sized SVG.
//!
//! MathJax lays expressions out in ex units. This library takes that output
//! and re-expresses it in pt, px or mm (or leaves it in ex), so the SVG can
//! be placed next to text of a known size with the right width, height and
//! baseline depth.
//!
//! ## Quick Start
//!
//! ```no_run
//! use mathsvg::{ConvertOptions, MathSvg, Unit};
//!
//! fn main() -> mathsvg::Result<()> {
//!     let engine = MathSvg::from_env()?;
//!
//!     let options = ConvertOptions::new(Unit::Pt).with_font_size(11.0);
//!     let result = engine.convert(r"\sqrt{x^2 + y^2}", &options)?;
//!
//!     println!("{} x {}, depth {}", result.width, result.height, result.depth);
//!     println!("{}", result.svg);
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Unit normalization**: pt, px, mm or ex, with baseline depth
//! - **Engine cache**: one MathJax instance per font, built on first use
//! - **Font fetching**: non-default math fonts are downloaded on demand (`fetch` feature)
//! - **Tool server**: JSON-RPC tool server over stdio
//! - **Batch conversion**: Uses Rayon across fonts

pub mod convert;
pub mod engine;
pub mod error;
pub mod fonts;
pub mod normalize;
pub mod options;
pub mod result;
pub mod server;
pub mod tool;
pub mod units;

#[cfg(feature = "ffi")]
pub mod ffi;

// Re-export commonly used types
pub use convert::{ConvertJob, MathSvg};
pub use engine::{EngineCache, EngineFactory, EngineInstance, RawBox, TypesetRequest, Typesetter};
pub use error::{Error, Result};
pub use fonts::{BundledResolver, FontAssets, FontResolver, FontSource, LocalResolver, MathFont};
#[cfg(feature = "fetch")]
pub use fonts::FetchResolver;
pub use normalize::{normalize, Scale};
pub use options::{ConvertOptions, EngineConfig};
pub use result::{ConversionResult, SavedSvg};
pub use server::ToolServer;
pub use units::{AbsoluteUnit, Unit};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Convert one expression with a converter configured from the environment.
///
/// Builds a fresh engine for every call. Keep a [`MathSvg`] around when
/// converting more than once.
pub fn latex_to_svg(math: &str, options: &ConvertOptions) -> Result<ConversionResult> {
    MathSvg::from_env()?.convert(math, options)
}
