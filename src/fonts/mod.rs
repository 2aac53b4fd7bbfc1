//! Math font identities and the resolvers that locate their metric data.
//!
//! A [`FontResolver`] answers one question: where can the engine load this
//! font's metrics from? Three strategies are provided:
//!
//! - [`BundledResolver`]: only the TeX font shipped with the engine.
//! - [`LocalResolver`]: fonts already unpacked in a cache directory; never
//!   touches the network.
//! - `FetchResolver` (feature `fetch`): downloads missing font packages from
//!   the npm registry into the cache directory on first use.

#[cfg(feature = "fetch")]
mod fetch;

#[cfg(feature = "fetch")]
pub use fetch::{unpack_package, FetchResolver, FontManifest, MANIFEST_FILE};

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A math font family the engine can typeset with.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum MathFont {
    /// MathJax TeX font, bundled with the engine
    #[default]
    Tex,
    Stix2,
    Newcm,
    Fira,
    Bonum,
    Pagella,
    Schola,
    Termes,
    Modern,
    Dejavu,
    Asana,
}

impl MathFont {
    /// Every supported font.
    pub const ALL: [MathFont; 11] = [
        MathFont::Tex,
        MathFont::Stix2,
        MathFont::Newcm,
        MathFont::Fira,
        MathFont::Bonum,
        MathFont::Pagella,
        MathFont::Schola,
        MathFont::Termes,
        MathFont::Modern,
        MathFont::Dejavu,
        MathFont::Asana,
    ];

    /// Lowercase name used in options and cache directories.
    pub fn name(self) -> &'static str {
        match self {
            MathFont::Tex => "tex",
            MathFont::Stix2 => "stix2",
            MathFont::Newcm => "newcm",
            MathFont::Fira => "fira",
            MathFont::Bonum => "bonum",
            MathFont::Pagella => "pagella",
            MathFont::Schola => "schola",
            MathFont::Termes => "termes",
            MathFont::Modern => "modern",
            MathFont::Dejavu => "dejavu",
            MathFont::Asana => "asana",
        }
    }

    /// npm package carrying the font's SVG metrics; `None` when bundled.
    pub fn package(self) -> Option<&'static str> {
        match self {
            MathFont::Tex => None,
            MathFont::Stix2 => Some("@mathjax/mathjax-stix2-font"),
            MathFont::Newcm => Some("@mathjax/mathjax-newcm-font"),
            MathFont::Fira => Some("@mathjax/mathjax-fira-font"),
            MathFont::Bonum => Some("@mathjax/mathjax-bonum-font"),
            MathFont::Pagella => Some("@mathjax/mathjax-pagella-font"),
            MathFont::Schola => Some("@mathjax/mathjax-schola-font"),
            MathFont::Termes => Some("@mathjax/mathjax-termes-font"),
            MathFont::Modern => Some("@mathjax/mathjax-modern-font"),
            MathFont::Dejavu => Some("@mathjax/mathjax-dejavu-font"),
            MathFont::Asana => Some("@mathjax/mathjax-asana-font"),
        }
    }

    /// True for the font shipped with the engine.
    pub fn is_bundled(self) -> bool {
        self.package().is_none()
    }
}

impl fmt::Display for MathFont {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MathFont {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        MathFont::ALL
            .into_iter()
            .find(|font| font.name() == wanted)
            .ok_or_else(|| Error::UnknownFont(s.to_string()))
    }
}

/// How the engine loads a font's metrics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FontSource {
    /// Built into the engine
    Bundled,
    /// An ES module (`mjs/svg.js`) exporting the font class
    Module(PathBuf),
}

/// A font that is ready for engine construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontAssets {
    pub font: MathFont,
    pub source: FontSource,
}

impl FontAssets {
    /// Assets for the engine's built-in font.
    pub fn bundled(font: MathFont) -> Self {
        Self {
            font,
            source: FontSource::Bundled,
        }
    }

    /// Assets loaded from an unpacked package module.
    pub fn module(font: MathFont, path: impl Into<PathBuf>) -> Self {
        Self {
            font,
            source: FontSource::Module(path.into()),
        }
    }
}

/// Maps a font identity to loadable metric data.
pub trait FontResolver: Send + Sync {
    /// Locate (and if the strategy allows, materialize) the font's metrics.
    fn resolve(&self, font: MathFont) -> Result<FontAssets>;
}

/// Directory a font package is unpacked into.
pub fn font_dir(cache_dir: &Path, font: MathFont) -> PathBuf {
    cache_dir.join(font.name())
}

/// The font-class module inside an unpacked package.
pub fn module_path(package_dir: &Path) -> PathBuf {
    package_dir.join("mjs").join("svg.js")
}

/// Resolves only the bundled TeX font.
#[derive(Debug, Clone, Copy, Default)]
pub struct BundledResolver;

impl FontResolver for BundledResolver {
    fn resolve(&self, font: MathFont) -> Result<FontAssets> {
        if font.is_bundled() {
            Ok(FontAssets::bundled(font))
        } else {
            Err(Error::font(font, "only the bundled tex font is available"))
        }
    }
}

/// Resolves fonts already present in a cache directory.
#[derive(Debug, Clone)]
pub struct LocalResolver {
    cache_dir: PathBuf,
}

impl LocalResolver {
    /// Create a resolver reading from `cache_dir`.
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    /// The directory searched for unpacked fonts.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }
}

impl FontResolver for LocalResolver {
    fn resolve(&self, font: MathFont) -> Result<FontAssets> {
        if font.is_bundled() {
            return Ok(FontAssets::bundled(font));
        }

        let module = module_path(&font_dir(&self.cache_dir, font));
        if module.is_file() {
            log::debug!("font {} found at {}", font, module.display());
            Ok(FontAssets::module(font, module))
        } else {
            Err(Error::font(
                font,
                format!("not installed (expected {})", module.display()),
            ))
        }
    }
}
