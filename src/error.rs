//! Error types for mathsvg library.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::fonts::MathFont;

/// Result type alias for mathsvg operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while converting math to SVG.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The requested output unit is not one of pt, px, mm, ex.
    #[error("Invalid unit '{0}': expected one of pt, px, mm, ex")]
    InvalidUnit(String),

    /// The requested font name does not map to a known math font.
    #[error("Unknown font '{0}'")]
    UnknownFont(String),

    /// A numeric or required option is out of range or missing.
    #[error("Invalid option {name}: {reason}")]
    InvalidOption {
        /// Option name as the caller spelled it
        name: &'static str,
        /// What is wrong with the value
        reason: String,
    },

    /// The font's metric package could not be fetched, unpacked, or loaded.
    #[error("Failed to materialize font '{font}': {reason}")]
    FontMaterialization {
        /// Font being materialized
        font: MathFont,
        /// Underlying cause
        reason: String,
    },

    /// The typesetting engine could not be started.
    #[error("Failed to start typesetting engine: {0}")]
    EngineConstruction(String),

    /// The typesetting engine rejected the math text or produced unusable output.
    #[error("Typesetting failed: {0}")]
    EngineConversion(String),

    /// A running engine stopped answering; its instance is discarded.
    #[error("Typesetting engine stopped: {0}")]
    EngineLost(String),

    /// The SVG could not be written to the requested path.
    #[error("Cannot write {}: {source}", path.display())]
    Persistence {
        /// Path that was being written
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: io::Error,
    },

    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A peer spoke an unexpected wire format.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Build a [`Error::FontMaterialization`] from any displayable cause.
    pub fn font(font: MathFont, reason: impl std::fmt::Display) -> Self {
        Error::FontMaterialization {
            font,
            reason: reason.to_string(),
        }
    }

    /// Build a [`Error::Persistence`] for `path`.
    pub fn persistence(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Persistence {
            path: path.into(),
            source,
        }
    }
}
