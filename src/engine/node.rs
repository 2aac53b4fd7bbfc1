//! MathJax running in a long-lived Node.js worker process.
//!
//! Each [`NodeMathJax`] owns one `node` child that has loaded MathJax with a
//! single font. Requests and responses are newline-delimited JSON on the
//! child's stdin and stdout; stderr is passed through for diagnostics.

use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use serde::{Deserialize, Serialize};

use super::{EngineFactory, TypesetRequest, Typesetter};
use crate::error::{Error, Result};
use crate::fonts::{FontAssets, FontSource, MathFont};
use crate::options::EngineConfig;

const DRIVER: &str = include_str!("../../assets/mathjax-driver.mjs");

#[derive(Serialize)]
struct WireRequest<'a> {
    id: u64,
    #[serde(flatten)]
    request: &'a TypesetRequest<'a>,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    id: Option<u64>,
    markup: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Ready {
    ready: bool,
    stage: Option<String>,
    error: Option<String>,
}

/// Typesetter backed by a Node.js MathJax worker.
pub struct NodeMathJax {
    font: MathFont,
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    next_id: u64,
}

impl NodeMathJax {
    /// Start a worker for `assets` using the `node` executable and the
    /// `mathjax-full` installation under `mathjax_dir`.
    pub fn spawn(node: &Path, mathjax_dir: &Path, assets: &FontAssets) -> Result<Self> {
        let font_module = match &assets.source {
            FontSource::Bundled => PathBuf::new(),
            FontSource::Module(path) => path.clone(),
        };

        log::info!(
            "starting MathJax worker for font {} ({})",
            assets.font,
            node.display()
        );
        let mut child = Command::new(node)
            .arg("--input-type=module")
            .arg("--eval")
            .arg(DRIVER)
            .env("MATHSVG_MATHJAX_DIR", mathjax_dir)
            .env("MATHSVG_FONT_MODULE", &font_module)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| {
                Error::EngineConstruction(format!("cannot run {}: {}", node.display(), e))
            })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            let _ = child.kill();
            return Err(Error::EngineConstruction("worker pipes unavailable".into()));
        };

        let mut worker = Self {
            font: assets.font,
            child,
            stdin,
            stdout: BufReader::new(stdout),
            next_id: 0,
        };
        worker.handshake()?;
        Ok(worker)
    }

    /// Font the worker has loaded.
    pub fn font(&self) -> MathFont {
        self.font
    }

    fn handshake(&mut self) -> Result<()> {
        let line = self
            .read_line()?
            .ok_or_else(|| Error::EngineConstruction("worker exited during startup".into()))?;
        let ready: Ready = serde_json::from_str(&line)
            .map_err(|e| Error::EngineConstruction(format!("unexpected startup line: {}", e)))?;

        if ready.ready {
            return Ok(());
        }

        let reason = ready.error.unwrap_or_else(|| "unknown failure".into());
        match ready.stage.as_deref() {
            Some("font") => Err(Error::font(self.font, reason)),
            _ => Err(Error::EngineConstruction(reason)),
        }
    }

    fn read_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        if self.stdout.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line))
    }
}

impl Typesetter for NodeMathJax {
    fn typeset(&mut self, request: &TypesetRequest<'_>) -> Result<String> {
        self.next_id += 1;
        let id = self.next_id;

        let mut line = serde_json::to_string(&WireRequest { id, request })?;
        line.push('\n');
        // Any transport failure means the worker is gone or out of step.
        self.stdin
            .write_all(line.as_bytes())
            .and_then(|()| self.stdin.flush())
            .map_err(|e| Error::EngineLost(format!("worker unavailable: {}", e)))?;

        let reply = self
            .read_line()
            .map_err(|e| Error::EngineLost(e.to_string()))?
            .ok_or_else(|| Error::EngineLost("worker exited".into()))?;
        let response: WireResponse = serde_json::from_str(&reply)
            .map_err(|e| Error::EngineLost(format!("unreadable response: {}", e)))?;

        if response.id != Some(id) {
            return Err(Error::EngineLost(format!(
                "expected response {}, got {:?}",
                id, response.id
            )));
        }
        match (response.markup, response.error) {
            (_, Some(error)) => Err(Error::EngineConversion(error)),
            (Some(markup), None) => Ok(markup),
            (None, None) => Err(Error::Protocol("response has neither markup nor error".into())),
        }
    }
}

impl Drop for NodeMathJax {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Builds [`NodeMathJax`] workers.
#[derive(Debug, Clone)]
pub struct NodeEngineFactory {
    node: PathBuf,
    mathjax_dir: PathBuf,
}

impl NodeEngineFactory {
    /// Create a factory for the given node executable and MathJax install.
    pub fn new(node: impl Into<PathBuf>, mathjax_dir: impl Into<PathBuf>) -> Self {
        Self {
            node: node.into(),
            mathjax_dir: mathjax_dir.into(),
        }
    }

    /// Create a factory from an engine configuration.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(&config.node, &config.mathjax_dir)
    }
}

impl EngineFactory for NodeEngineFactory {
    fn build(&self, assets: &FontAssets) -> Result<Box<dyn Typesetter>> {
        let worker = NodeMathJax::spawn(&self.node, &self.mathjax_dir, assets)?;
        Ok(Box::new(worker))
    }
}
