//! Output units and length formatting.
//!
//! The typesetting engine measures everything in `ex`. Absolute output is
//! derived from the request's ex size; the only fixed constants are the
//! conversions between the three physical unit families.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// CSS pixels per point (96 DPI).
pub const PX_PER_PT: f64 = 96.0 / 72.0;

/// Millimeters per point.
pub const MM_PER_PT: f64 = 25.4 / 72.0;

/// Fractional digits in every emitted length.
pub const LENGTH_PRECISION: usize = 3;

/// Unit for the width, height and depth of a conversion result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    /// Typographic points, for print and InDesign
    Pt,
    /// CSS pixels, for web and browsers
    Px,
    /// Millimeters, for metric print
    Mm,
    /// Engine-relative ex units, left unscaled
    Ex,
}

impl Unit {
    /// All units, in the order tools advertise them.
    pub const ALL: [Unit; 4] = [Unit::Pt, Unit::Px, Unit::Mm, Unit::Ex];

    /// The literal suffix written after a number.
    pub fn suffix(self) -> &'static str {
        match self {
            Unit::Pt => "pt",
            Unit::Px => "px",
            Unit::Mm => "mm",
            Unit::Ex => "ex",
        }
    }

    /// True for `ex`, which is never scaled.
    pub fn is_relative(self) -> bool {
        self == Unit::Ex
    }

    /// The physical unit family, or `None` for `ex`.
    pub fn absolute(self) -> Option<AbsoluteUnit> {
        match self {
            Unit::Pt => Some(AbsoluteUnit::Pt),
            Unit::Px => Some(AbsoluteUnit::Px),
            Unit::Mm => Some(AbsoluteUnit::Mm),
            Unit::Ex => None,
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

impl FromStr for Unit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pt" => Ok(Unit::Pt),
            "px" => Ok(Unit::Px),
            "mm" => Ok(Unit::Mm),
            "ex" => Ok(Unit::Ex),
            _ => Err(Error::InvalidUnit(s.to_string())),
        }
    }
}

/// A physical unit a font size can be declared in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AbsoluteUnit {
    Pt,
    Px,
    Mm,
}

impl AbsoluteUnit {
    /// Length of one point expressed in this unit.
    fn per_point(self) -> f64 {
        match self {
            AbsoluteUnit::Pt => 1.0,
            AbsoluteUnit::Px => PX_PER_PT,
            AbsoluteUnit::Mm => MM_PER_PT,
        }
    }

    /// Multiplier taking a length in `self` to a length in `target`.
    ///
    /// Exactly `1.0` when the units match, so values declared in the output
    /// unit are never touched by the family constants.
    pub fn factor_to(self, target: AbsoluteUnit) -> f64 {
        if self == target {
            1.0
        } else {
            target.per_point() / self.per_point()
        }
    }
}

impl From<AbsoluteUnit> for Unit {
    fn from(unit: AbsoluteUnit) -> Self {
        match unit {
            AbsoluteUnit::Pt => Unit::Pt,
            AbsoluteUnit::Px => Unit::Px,
            AbsoluteUnit::Mm => Unit::Mm,
        }
    }
}

impl fmt::Display for AbsoluteUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Unit::from(*self).fmt(f)
    }
}

impl FromStr for AbsoluteUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.parse::<Unit>()?
            .absolute()
            .ok_or_else(|| Error::InvalidUnit(s.to_string()))
    }
}

/// Format a length with three decimals and the unit suffix.
pub fn format_length(value: f64, unit: Unit) -> String {
    // Keep "-0.000" out of the output.
    let value = if value.abs() < 0.0005 { 0.0 } else { value };
    format!("{:.*}{}", LENGTH_PRECISION, value, unit.suffix())
}

/// Split a formatted length such as `"12.500pt"` into its number and unit.
pub fn parse_length(text: &str) -> Option<(f64, Unit)> {
    let text = text.trim();
    if text.len() < 2 || !text.is_char_boundary(text.len() - 2) {
        return None;
    }
    let (number, suffix) = text.split_at(text.len() - 2);
    let unit = suffix.parse().ok()?;
    let value = number.parse().ok()?;
    Some((value, unit))
}
