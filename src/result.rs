//! Conversion results.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::units::parse_length;

/// SVG markup and box metrics for one expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionResult {
    /// Bare `<svg>` element sized in the requested unit
    pub svg: String,

    /// Box width, e.g. `"14.360pt"`
    pub width: String,

    /// Box height, e.g. `"37.104pt"`
    pub height: String,

    /// Distance below the text baseline, for vertical alignment
    pub depth: String,
}

impl ConversionResult {
    /// Numeric width, without the unit.
    pub fn width_value(&self) -> Option<f64> {
        parse_length(&self.width).map(|(v, _)| v)
    }

    /// Numeric height, without the unit.
    pub fn height_value(&self) -> Option<f64> {
        parse_length(&self.height).map(|(v, _)| v)
    }

    /// Numeric depth, without the unit.
    pub fn depth_value(&self) -> Option<f64> {
        parse_length(&self.depth).map(|(v, _)| v)
    }

    /// True when width, height and depth match, ignoring markup.
    ///
    /// Markup of two identical conversions can differ in engine-assigned ids.
    pub fn same_metrics(&self, other: &ConversionResult) -> bool {
        self.width == other.width && self.height == other.height && self.depth == other.depth
    }
}

/// Metrics of an SVG written to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedSvg {
    /// Absolute path of the written file
    pub path: PathBuf,
    pub width: String,
    pub height: String,
    pub depth: String,
}
