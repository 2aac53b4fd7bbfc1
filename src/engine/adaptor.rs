//! Reading engine markup into structured boxes.
//!
//! The engine hands back a bare `<svg>` element whose root carries the box
//! metrics: `width="..ex"`, `height="..ex"` and a `vertical-align: ..ex`
//! style. [`SvgAdaptor::read`] pulls those numbers out once and remembers
//! where the size values sit, so later stages substitute new values into
//! known slots instead of searching the markup again.
//!
//! Display equations with a `\tag` span the container: their root has
//! `width="100%"` and the box width lives in a `min-width: ..ex` style.

use std::ops::Range;

use regex::Regex;

use crate::error::{Error, Result};

/// Engine output measured in ex, with its markup.
#[derive(Debug, Clone, PartialEq)]
pub struct RawBox {
    /// Box width in ex
    pub width: f64,
    /// Box height in ex
    pub height: f64,
    /// Offset of the box's reference point from the baseline in ex;
    /// negative means below
    pub vertical_offset: f64,
    /// Markup with the size attribute slots located
    pub template: SvgTemplate,
}

/// SVG markup with the value spans of the root `width` and `height` attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SvgTemplate {
    markup: String,
    width: Range<usize>,
    height: Range<usize>,
    min_width: Option<Range<usize>>,
}

impl SvgTemplate {
    /// The markup exactly as the engine produced it.
    pub fn markup(&self) -> &str {
        &self.markup
    }

    /// The original width attribute value.
    pub fn width_value(&self) -> &str {
        &self.markup[self.width.clone()]
    }

    /// The original height attribute value.
    pub fn height_value(&self) -> &str {
        &self.markup[self.height.clone()]
    }

    /// True when the root spans its container (`width="100%"`).
    pub fn is_full_width(&self) -> bool {
        self.min_width.is_some()
    }

    /// Copy of the markup with new width and height values.
    ///
    /// A full-width root gets `width` in both its width attribute and its
    /// `min-width` style. Every byte outside the value spans is kept as is.
    pub fn fill(&self, width: &str, height: &str) -> String {
        let mut slots = vec![(&self.width, width), (&self.height, height)];
        if let Some(min_width) = &self.min_width {
            slots.push((min_width, width));
        }
        slots.sort_by_key(|(span, _)| span.start);

        let mut out = String::with_capacity(self.markup.len() + 2 * width.len() + height.len());
        let mut pos = 0;
        for (span, value) in slots {
            out.push_str(&self.markup[pos..span.start]);
            out.push_str(value);
            pos = span.end;
        }
        out.push_str(&self.markup[pos..]);
        out
    }
}

/// Markup reader shared by every engine instance.
#[derive(Debug)]
pub struct SvgAdaptor {
    root: Regex,
    width: Regex,
    height: Regex,
    full_width: Regex,
    min_width: Regex,
    vertical_align: Regex,
}

impl SvgAdaptor {
    /// Compile the attribute patterns.
    pub fn new() -> Self {
        Self {
            root: Regex::new(r"<svg\b[^>]*>").unwrap(),
            width: Regex::new(r#"\swidth="((-?[0-9]*\.?[0-9]+)(?:ex)?)""#).unwrap(),
            height: Regex::new(r#"\sheight="((-?[0-9]*\.?[0-9]+)(?:ex)?)""#).unwrap(),
            full_width: Regex::new(r#"\swidth="([0-9]*\.?[0-9]+%)""#).unwrap(),
            min_width: Regex::new(r"min-width:\s*((-?[0-9]*\.?[0-9]+)(?:ex)?)").unwrap(),
            vertical_align: Regex::new(r"vertical-align:\s*(-?[0-9]*\.?[0-9]+)ex").unwrap(),
        }
    }

    /// Parse engine markup into a [`RawBox`].
    ///
    /// The markup must be a bare `<svg>` element with ex-valued `width` and
    /// `height` on its root, or a percentage `width` with an ex-valued
    /// `min-width` style. A missing `vertical-align` means the box sits on
    /// the baseline.
    pub fn read(&self, markup: String) -> Result<RawBox> {
        if !markup.trim_start().starts_with("<svg") {
            return Err(Error::EngineConversion(
                "engine output is not a bare <svg> element".into(),
            ));
        }

        let root = self
            .root
            .find(&markup)
            .ok_or_else(|| Error::EngineConversion("unterminated <svg> root tag".into()))?;
        let tag = root.as_str();

        let (width, width_span, min_width_span) = match self.full_width.captures(tag) {
            Some(captures) => {
                let percent = captures
                    .get(1)
                    .map(|m| m.range())
                    .ok_or_else(|| Error::EngineConversion("empty width attribute".into()))?;
                let (width, span) = measure(&self.min_width, tag, "min-width")?;
                (width, percent, Some(span))
            }
            None => {
                let (width, span) = measure(&self.width, tag, "width")?;
                (width, span, None)
            }
        };
        let (height, height_span) = measure(&self.height, tag, "height")?;
        let vertical_offset = self
            .vertical_align
            .captures(tag)
            .and_then(|c| c[1].parse::<f64>().ok())
            .unwrap_or(0.0);

        let offset = root.start();
        Ok(RawBox {
            width,
            height,
            vertical_offset,
            template: SvgTemplate {
                width: shift(width_span, offset),
                height: shift(height_span, offset),
                min_width: min_width_span.map(|span| shift(span, offset)),
                markup,
            },
        })
    }

    /// Value of a `width` or `height` attribute on the root `<svg>` tag.
    pub fn root_attribute<'a>(&self, svg: &'a str, name: &str) -> Option<&'a str> {
        let tag = self.root.find(svg)?.as_str();
        let needle = format!(" {}=\"", name);
        let start = tag.find(&needle)? + needle.len();
        let len = tag[start..].find('"')?;
        Some(&tag[start..start + len])
    }
}

impl Default for SvgAdaptor {
    fn default() -> Self {
        Self::new()
    }
}

fn measure(pattern: &Regex, tag: &str, name: &str) -> Result<(f64, Range<usize>)> {
    let captures = pattern.captures(tag).ok_or_else(|| {
        Error::EngineConversion(format!("engine output has no numeric {} attribute", name))
    })?;
    let value = captures
        .get(1)
        .map(|m| m.range())
        .ok_or_else(|| Error::EngineConversion(format!("empty {} attribute", name)))?;
    let number = captures[2]
        .parse::<f64>()
        .map_err(|e| Error::EngineConversion(format!("bad {} attribute: {}", name, e)))?;
    Ok((number, value))
}

fn shift(range: Range<usize>, by: usize) -> Range<usize> {
    range.start + by..range.end + by
}
