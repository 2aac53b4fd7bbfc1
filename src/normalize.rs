//! Unit normalization of engine boxes.
//!
//! Engine output is measured in ex. For `ex` output the numbers pass through
//! unscaled. For pt, px and mm each ex is worth `font_size * x_height_ratio`
//! in the unit the font size was given in; a family constant is applied only
//! when that unit differs from the output unit.

use crate::engine::{RawBox, SvgAdaptor};
use crate::error::{Error, Result};
use crate::options::ConvertOptions;
use crate::result::ConversionResult;
use crate::units::{format_length, AbsoluteUnit, Unit};

/// Multiplier from ex to the output unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scale {
    unit: Unit,
    factor: f64,
}

impl Scale {
    /// Keep ex values as they are.
    pub fn relative() -> Self {
        Self {
            unit: Unit::Ex,
            factor: 1.0,
        }
    }

    /// Scale ex by `ex_size`, which is expressed in `declared_in`, into `unit`.
    pub fn absolute(unit: AbsoluteUnit, ex_size: f64, declared_in: AbsoluteUnit) -> Self {
        Self {
            unit: unit.into(),
            factor: ex_size * declared_in.factor_to(unit),
        }
    }

    /// The scale a set of options asks for.
    pub fn for_options(options: &ConvertOptions) -> Self {
        match options.unit.absolute() {
            None => Self::relative(),
            Some(unit) => Self::absolute(
                unit,
                options.ex_size(),
                options.font_size_unit.unwrap_or(unit),
            ),
        }
    }

    /// Output unit.
    pub fn unit(&self) -> Unit {
        self.unit
    }

    /// Output units per ex.
    pub fn factor(&self) -> f64 {
        self.factor
    }

    /// Format an ex magnitude in the output unit.
    pub fn length(&self, ex: f64) -> String {
        format_length(ex * self.factor, self.unit)
    }
}

/// Re-express `raw` in the scale's unit.
///
/// The size attributes are substituted into the markup first, and the
/// reported width and height are read back from the rewritten root, so the
/// result never disagrees with its own markup. Depth is how far the box
/// extends below the baseline and is zero for boxes resting on or above it.
pub fn normalize(raw: &RawBox, scale: &Scale, adaptor: &SvgAdaptor) -> Result<ConversionResult> {
    let svg = raw
        .template
        .fill(&scale.length(raw.width), &scale.length(raw.height));

    let width = adaptor
        .root_attribute(&svg, "width")
        .ok_or_else(|| Error::EngineConversion("rewritten markup lost its width".into()))?
        .to_string();
    let height = adaptor
        .root_attribute(&svg, "height")
        .ok_or_else(|| Error::EngineConversion("rewritten markup lost its height".into()))?
        .to_string();

    let depth_ex = if raw.vertical_offset < 0.0 {
        -raw.vertical_offset
    } else {
        0.0
    };

    Ok(ConversionResult {
        width,
        height,
        depth: scale.length(depth_ex),
        svg,
    })
}
