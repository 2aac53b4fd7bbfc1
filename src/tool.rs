//! Tool surface: named operations with JSON arguments and text results.
//!
//! Two tools are exposed. `latex_to_svg` returns the SVG and its metrics as
//! pretty-printed JSON text, `latex_to_svg_file` writes the SVG to disk and
//! returns the path and metrics. Every failure, including bad arguments,
//! becomes a text message flagged with `isError`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::convert::MathSvg;
use crate::error::{Error, Result};
use crate::fonts::MathFont;
use crate::options::ConvertOptions;
use crate::units::Unit;

/// Name of the inline conversion tool.
pub const LATEX_TO_SVG: &str = "latex_to_svg";

/// Name of the file conversion tool.
pub const LATEX_TO_SVG_FILE: &str = "latex_to_svg_file";

/// A tool as advertised to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    /// JSON Schema of the arguments object
    pub input_schema: Value,
}

/// One block of tool output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

/// Result of a tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolOutput {
    pub content: Vec<Content>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl ToolOutput {
    /// A successful text result.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![Content {
                kind: "text".to_string(),
                text: text.into(),
            }],
            is_error: false,
        }
    }

    /// A failed result carrying `message`.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            is_error: true,
            ..Self::text(message)
        }
    }

    /// Concatenated text of all blocks.
    pub fn joined_text(&self) -> String {
        self.content.iter().map(|c| c.text.as_str()).collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolArgs {
    latex: String,
    unit: String,
    #[serde(default)]
    output_path: Option<String>,
    #[serde(default)]
    display: Option<bool>,
    #[serde(default)]
    font_size: Option<f64>,
    #[serde(default)]
    x_height_ratio: Option<f64>,
    #[serde(default)]
    container_width: Option<f64>,
    #[serde(default)]
    font: Option<String>,
}

impl ToolArgs {
    fn parse(arguments: Value) -> Result<Self> {
        Ok(serde_json::from_value(arguments)?)
    }

    fn options(&self) -> Result<ConvertOptions> {
        let mut options = ConvertOptions::new(self.unit.parse::<Unit>()?);
        if let Some(display) = self.display {
            options = options.with_display(display);
        }
        if let Some(size) = self.font_size {
            options = options.with_font_size(size);
        }
        if let Some(ratio) = self.x_height_ratio {
            options = options.with_x_height_ratio(ratio);
        }
        if let Some(width) = self.container_width {
            options = options.with_container_width(width);
        }
        if let Some(font) = &self.font {
            options = options.with_font(font.parse::<MathFont>()?);
        }
        Ok(options)
    }
}

/// Definitions of every tool, in a stable order.
pub fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: LATEX_TO_SVG,
            description: "Convert a LaTeX math expression to SVG and return the SVG content \
                          directly. Best for small expressions where you need the SVG inline.",
            input_schema: schema(false),
        },
        ToolDefinition {
            name: LATEX_TO_SVG_FILE,
            description: "Convert a LaTeX math expression to SVG and save it to a file. Best for \
                          larger expressions or when you need to reference the SVG by path.",
            input_schema: schema(true),
        },
    ]
}

/// True when `name` is one of the tools.
pub fn is_known(name: &str) -> bool {
    name == LATEX_TO_SVG || name == LATEX_TO_SVG_FILE
}

/// Run the tool `name`.
///
/// Returns `Err` only for an unknown tool name. Conversion and argument
/// failures are reported inside the [`ToolOutput`].
pub fn call(engine: &MathSvg, name: &str, arguments: Value) -> Result<ToolOutput> {
    let (prefix, outcome) = match name {
        LATEX_TO_SVG => ("Error converting LaTeX", latex_to_svg(engine, arguments)),
        LATEX_TO_SVG_FILE => (
            "Error converting LaTeX to file",
            latex_to_svg_file(engine, arguments),
        ),
        _ => return Err(Error::Protocol(format!("Tool {} not found", name))),
    };

    Ok(match outcome {
        Ok(text) => ToolOutput::text(text),
        Err(e) => {
            log::debug!("{} failed: {}", name, e);
            ToolOutput::error(format!("{}: {}", prefix, e))
        }
    })
}

fn latex_to_svg(engine: &MathSvg, arguments: Value) -> Result<String> {
    let args = ToolArgs::parse(arguments)?;
    let result = engine.convert(&args.latex, &args.options()?)?;
    Ok(serde_json::to_string_pretty(&result)?)
}

fn latex_to_svg_file(engine: &MathSvg, arguments: Value) -> Result<String> {
    let args = ToolArgs::parse(arguments)?;
    let path = args
        .output_path
        .as_deref()
        .ok_or_else(|| Error::InvalidOption {
            name: "outputPath",
            reason: "required".to_string(),
        })?;
    let saved = engine.convert_to_file(&args.latex, path, &args.options()?)?;
    Ok(serde_json::to_string_pretty(&saved)?)
}

fn schema(with_output_path: bool) -> Value {
    let units: Vec<&str> = Unit::ALL.iter().map(|u| u.suffix()).collect();
    let fonts: Vec<&str> = MathFont::ALL.iter().map(|f| f.name()).collect();

    let mut properties = json!({
        "latex": {
            "type": "string",
            "description": "The LaTeX math expression to convert"
        },
        "unit": {
            "type": "string",
            "enum": units,
            "description": "Output unit for width/height. Use pt for print/InDesign, px for \
                            web/browsers, mm for metric print, ex to keep relative units"
        },
        "display": {
            "type": "boolean",
            "description": "Display mode (block) vs inline mode. Default: true"
        },
        "fontSize": {
            "type": "number",
            "description": "Font size (em size) in the same unit as the output. E.g., 11 for \
                            11pt when unit=pt, or 16 for 16px when unit=px. Default: 16"
        },
        "xHeightRatio": {
            "type": "number",
            "description": "Ratio of x-height to font size. Varies by font: Times 0.45, \
                            Helvetica 0.52, Computer Modern 0.43. Default: 0.5"
        },
        "containerWidth": {
            "type": "number",
            "description": "Container width used for line breaking. Default: 800"
        },
        "font": {
            "type": "string",
            "enum": fonts,
            "description": "Math font. Fonts other than tex are downloaded on first use. Default: tex"
        }
    });

    let mut required = vec!["latex", "unit"];
    if with_output_path {
        properties["outputPath"] = json!({
            "type": "string",
            "description": "The file path where the SVG should be saved"
        });
        required.insert(1, "outputPath");
    }

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}
