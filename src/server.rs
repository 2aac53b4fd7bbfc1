//! Newline-delimited JSON-RPC 2.0 tool server.
//!
//! Speaks the subset of the Model Context Protocol a tool host needs:
//! `initialize`, `ping`, `tools/list` and `tools/call`. Each request is one
//! line; each response is one line. Notifications get no response.

use std::io::{BufRead, Write};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::convert::MathSvg;
use crate::error::Result;
use crate::tool;

/// Protocol revision reported by `initialize`.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Server name reported by `initialize`.
pub const SERVER_NAME: &str = "math-svg-mcp";

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;

#[derive(Debug, Deserialize)]
struct Request {
    #[serde(default)]
    jsonrpc: Option<String>,
    #[serde(default)]
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Serialize)]
struct Response {
    jsonrpc: &'static str,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<RpcError>,
}

#[derive(Debug, Serialize)]
struct RpcError {
    code: i64,
    message: String,
}

impl Response {
    fn ok(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    fn err(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

/// Serves tool calls against one converter.
pub struct ToolServer {
    engine: MathSvg,
    version: String,
}

impl ToolServer {
    /// Create a server reporting the library version.
    pub fn new(engine: MathSvg) -> Self {
        Self::with_version(engine, crate::VERSION)
    }

    /// Create a server reporting `version`.
    pub fn with_version(engine: MathSvg, version: impl Into<String>) -> Self {
        Self {
            engine,
            version: version.into(),
        }
    }

    /// The converter behind the tools.
    pub fn engine(&self) -> &MathSvg {
        &self.engine
    }

    /// Handle one input line. Returns the response line, if any.
    pub fn handle_line(&self, line: &str) -> Option<String> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let response = match serde_json::from_str::<Value>(line) {
            Err(e) => Some(Response::err(Value::Null, PARSE_ERROR, format!("Parse error: {}", e))),
            Ok(value) => self.handle_value(value),
        }?;

        match serde_json::to_string(&response) {
            Ok(text) => Some(text),
            Err(e) => {
                log::error!("cannot encode response: {}", e);
                None
            }
        }
    }

    /// Read requests from `input` until EOF, writing responses to `output`.
    pub fn serve<R: BufRead, W: Write>(&self, input: R, mut output: W) -> Result<()> {
        log::info!("{} {} serving on stdio", SERVER_NAME, self.version);
        for line in input.lines() {
            let line = line?;
            if let Some(response) = self.handle_line(&line) {
                writeln!(output, "{}", response)?;
                output.flush()?;
            }
        }
        log::info!("input closed, shutting down");
        Ok(())
    }

    fn handle_value(&self, value: Value) -> Option<Response> {
        let id_hint = value.get("id").cloned().unwrap_or(Value::Null);
        let request: Request = match serde_json::from_value(value) {
            Ok(request) => request,
            Err(e) => {
                return Some(Response::err(
                    id_hint,
                    INVALID_REQUEST,
                    format!("Invalid request: {}", e),
                ))
            }
        };

        if request.jsonrpc.as_deref() != Some("2.0") {
            log::warn!("request without jsonrpc 2.0 marker: {}", request.method);
        }

        // Notifications carry no id and receive no response.
        let Some(id) = request.id else {
            log::debug!("notification {}", request.method);
            return None;
        };

        log::debug!("request {} ({})", request.method, id);
        Some(match self.dispatch(&request.method, request.params) {
            Ok(result) => Response::ok(id, result),
            Err((code, message)) => Response::err(id, code, message),
        })
    }

    fn dispatch(&self, method: &str, params: Value) -> std::result::Result<Value, (i64, String)> {
        match method {
            "initialize" => Ok(json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": { "tools": {} },
                "serverInfo": { "name": SERVER_NAME, "version": self.version },
            })),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": tool::definitions() })),
            "tools/call" => {
                let params: CallParams = serde_json::from_value(params)
                    .map_err(|e| (INVALID_PARAMS, format!("Invalid params: {}", e)))?;
                if !tool::is_known(&params.name) {
                    return Err((INVALID_PARAMS, format!("Unknown tool: {}", params.name)));
                }
                let output = tool::call(&self.engine, &params.name, params.arguments)
                    .map_err(|e| (INVALID_PARAMS, e.to_string()))?;
                serde_json::to_value(output).map_err(|e| (INVALID_PARAMS, e.to_string()))
            }
            _ => Err((METHOD_NOT_FOUND, format!("Method not found: {}", method))),
        }
    }
}
