//! Conversion options and engine configuration.

use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::fonts::MathFont;
use crate::units::{AbsoluteUnit, Unit};

/// Default em size.
pub const DEFAULT_FONT_SIZE: f64 = 16.0;

/// Default ratio of x-height to em size.
pub const DEFAULT_X_HEIGHT_RATIO: f64 = 0.5;

/// Default container width used for line breaking.
pub const DEFAULT_CONTAINER_WIDTH: f64 = 800.0;

/// Default npm registry for font packages.
pub const DEFAULT_REGISTRY: &str = "https://registry.npmjs.org";

/// Options for a single conversion.
///
/// Field names serialize in camelCase to match the tool arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertOptions {
    /// Display (block) mode instead of inline mode
    #[serde(default = "default_display")]
    pub display: bool,

    /// Em size, in `font_size_unit` (or in `unit` when that is absent)
    #[serde(default = "default_font_size")]
    pub font_size: f64,

    /// Ratio of x-height to em size (Times 0.45, Helvetica 0.52, Computer Modern 0.43)
    #[serde(default = "default_x_height_ratio")]
    pub x_height_ratio: f64,

    /// Container width for line breaking
    #[serde(default = "default_container_width")]
    pub container_width: f64,

    /// Output unit for width, height and depth
    pub unit: Unit,

    /// Math font
    #[serde(default)]
    pub font: MathFont,

    /// Physical unit `font_size` is declared in, when it differs from `unit`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size_unit: Option<AbsoluteUnit>,
}

fn default_display() -> bool {
    true
}

fn default_font_size() -> f64 {
    DEFAULT_FONT_SIZE
}

fn default_x_height_ratio() -> f64 {
    DEFAULT_X_HEIGHT_RATIO
}

fn default_container_width() -> f64 {
    DEFAULT_CONTAINER_WIDTH
}

impl ConvertOptions {
    /// Create options for the given output unit with every other field defaulted.
    pub fn new(unit: Unit) -> Self {
        Self {
            display: default_display(),
            font_size: DEFAULT_FONT_SIZE,
            x_height_ratio: DEFAULT_X_HEIGHT_RATIO,
            container_width: DEFAULT_CONTAINER_WIDTH,
            unit,
            font: MathFont::default(),
            font_size_unit: None,
        }
    }

    /// Set display (block) or inline mode.
    pub fn with_display(mut self, display: bool) -> Self {
        self.display = display;
        self
    }

    /// Set inline mode.
    pub fn inline(self) -> Self {
        self.with_display(false)
    }

    /// Set the em size.
    pub fn with_font_size(mut self, size: f64) -> Self {
        self.font_size = size;
        self
    }

    /// Set the x-height to em ratio.
    pub fn with_x_height_ratio(mut self, ratio: f64) -> Self {
        self.x_height_ratio = ratio;
        self
    }

    /// Set the container width.
    pub fn with_container_width(mut self, width: f64) -> Self {
        self.container_width = width;
        self
    }

    /// Set the math font.
    pub fn with_font(mut self, font: MathFont) -> Self {
        self.font = font;
        self
    }

    /// Declare the font size in a physical unit other than the output unit.
    pub fn with_font_size_unit(mut self, unit: AbsoluteUnit) -> Self {
        self.font_size_unit = Some(unit);
        self
    }

    /// The ex size: `font_size * x_height_ratio`.
    pub fn ex_size(&self) -> f64 {
        self.font_size * self.x_height_ratio
    }

    /// Reject sizes that cannot scale a box.
    pub fn validate(&self) -> Result<()> {
        positive("fontSize", self.font_size)?;
        positive("xHeightRatio", self.x_height_ratio)?;
        positive("containerWidth", self.container_width)?;
        Ok(())
    }
}

fn positive(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidOption {
            name,
            reason: format!("expected a positive number, got {}", value),
        })
    }
}

/// Where the engine and font packages live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Node.js executable
    pub node: PathBuf,

    /// Directory whose `node_modules` holds `mathjax-full`
    pub mathjax_dir: PathBuf,

    /// Directory that downloaded font packages are unpacked into
    pub cache_dir: PathBuf,

    /// npm registry base URL
    pub registry: String,
}

impl EngineConfig {
    /// Create a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `MATHSVG_NODE`, `MATHSVG_MATHJAX_DIR`,
    /// `MATHSVG_FONT_CACHE` and `MATHSVG_REGISTRY`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(node) = env_value("MATHSVG_NODE") {
            config.node = node.into();
        }
        if let Some(dir) = env_value("MATHSVG_MATHJAX_DIR") {
            config.mathjax_dir = dir.into();
        }
        if let Some(dir) = env_value("MATHSVG_FONT_CACHE") {
            config.cache_dir = dir.into();
        }
        if let Some(registry) = env_value("MATHSVG_REGISTRY") {
            config.registry = registry;
        }
        config
    }

    /// Set the node executable.
    pub fn with_node(mut self, node: impl Into<PathBuf>) -> Self {
        self.node = node.into();
        self
    }

    /// Set the directory holding `node_modules/mathjax-full`.
    pub fn with_mathjax_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.mathjax_dir = dir.into();
        self
    }

    /// Set the font cache directory.
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    /// Set the npm registry base URL.
    pub fn with_registry(mut self, registry: impl Into<String>) -> Self {
        self.registry = registry.into().trim_end_matches('/').to_string();
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            node: PathBuf::from("node"),
            mathjax_dir: PathBuf::from("."),
            cache_dir: default_cache_dir(),
            registry: DEFAULT_REGISTRY.to_string(),
        }
    }
}

/// `<user cache>/math-svg-mcp/fonts`, falling back to the temp directory.
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(env::temp_dir)
        .join("math-svg-mcp")
        .join("fonts")
}

fn env_value(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}
