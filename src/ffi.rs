//! C-ABI FFI bindings for cross-language integration.
//!
//! A converter is created with `mathsvg_new` and passed to the conversion
//! functions as an opaque handle. Options are given as the same JSON object
//! the tool layer accepts (`{"unit": "pt", "fontSize": 11}`).

use std::ffi::{c_char, CStr, CString};
use std::ptr;

use crate::{ConvertOptions, MathSvg};

/// Result structure returned by FFI functions.
#[repr(C)]
pub struct MathSvgResult {
    /// Whether the operation succeeded.
    pub success: bool,
    /// The result data as JSON (null if failed). Must be freed with `mathsvg_free_result`.
    pub data: *mut c_char,
    /// Error message (null if succeeded). Must be freed with `mathsvg_free_result`.
    pub error: *mut c_char,
}

impl MathSvgResult {
    fn success(data: String) -> Self {
        Self {
            success: true,
            data: CString::new(data).unwrap_or_default().into_raw(),
            error: ptr::null_mut(),
        }
    }

    fn error(message: String) -> Self {
        Self {
            success: false,
            data: ptr::null_mut(),
            error: CString::new(message).unwrap_or_default().into_raw(),
        }
    }
}

unsafe fn read_str<'a>(ptr: *const c_char, name: &str) -> Result<&'a str, String> {
    if ptr.is_null() {
        return Err(format!("{} cannot be null", name));
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map_err(|_| format!("Invalid UTF-8 {}", name))
}

/// Create a converter configured from `MATHSVG_*` environment variables.
///
/// Returns null on failure. The handle must be released with `mathsvg_free`.
#[no_mangle]
pub extern "C" fn mathsvg_new() -> *mut MathSvg {
    match MathSvg::from_env() {
        Ok(engine) => Box::into_raw(Box::new(engine)),
        Err(e) => {
            log::error!("mathsvg_new failed: {}", e);
            ptr::null_mut()
        }
    }
}

/// Release a converter and its engine processes.
///
/// # Safety
///
/// `handle` must be null or come from `mathsvg_new`, and must not be used afterwards.
#[no_mangle]
pub unsafe extern "C" fn mathsvg_free(handle: *mut MathSvg) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

/// Convert LaTeX to SVG. On success `data` holds `{svg, width, height, depth}`.
///
/// # Safety
///
/// `handle` must come from `mathsvg_new`. `latex` and `options_json` must be
/// valid null-terminated UTF-8 strings. The returned result must be freed
/// with `mathsvg_free_result`.
#[no_mangle]
pub unsafe extern "C" fn mathsvg_convert(
    handle: *const MathSvg,
    latex: *const c_char,
    options_json: *const c_char,
) -> MathSvgResult {
    let Some(engine) = handle.as_ref() else {
        return MathSvgResult::error("Handle cannot be null".to_string());
    };
    let (latex, options) = match (read_str(latex, "latex"), read_str(options_json, "options")) {
        (Ok(latex), Ok(options)) => (latex, options),
        (Err(e), _) | (_, Err(e)) => return MathSvgResult::error(e),
    };

    match convert_internal(engine, latex, options) {
        Ok(json) => MathSvgResult::success(json),
        Err(e) => MathSvgResult::error(e.to_string()),
    }
}

fn convert_internal(engine: &MathSvg, latex: &str, options_json: &str) -> crate::Result<String> {
    let options: ConvertOptions = serde_json::from_str(options_json)?;
    let result = engine.convert(latex, &options)?;
    Ok(serde_json::to_string(&result)?)
}

/// Convert LaTeX to SVG and write it to `path`. On success `data` holds
/// `{path, width, height, depth}`.
///
/// # Safety
///
/// `handle` must come from `mathsvg_new`. `latex`, `path` and `options_json`
/// must be valid null-terminated UTF-8 strings. The returned result must be
/// freed with `mathsvg_free_result`.
#[no_mangle]
pub unsafe extern "C" fn mathsvg_convert_to_file(
    handle: *const MathSvg,
    latex: *const c_char,
    path: *const c_char,
    options_json: *const c_char,
) -> MathSvgResult {
    let Some(engine) = handle.as_ref() else {
        return MathSvgResult::error("Handle cannot be null".to_string());
    };
    let args = (
        read_str(latex, "latex"),
        read_str(path, "path"),
        read_str(options_json, "options"),
    );
    let (latex, path, options) = match args {
        (Ok(latex), Ok(path), Ok(options)) => (latex, path, options),
        (Err(e), _, _) | (_, Err(e), _) | (_, _, Err(e)) => return MathSvgResult::error(e),
    };

    match convert_to_file_internal(engine, latex, path, options) {
        Ok(json) => MathSvgResult::success(json),
        Err(e) => MathSvgResult::error(e.to_string()),
    }
}

fn convert_to_file_internal(
    engine: &MathSvg,
    latex: &str,
    path: &str,
    options_json: &str,
) -> crate::Result<String> {
    let options: ConvertOptions = serde_json::from_str(options_json)?;
    let saved = engine.convert_to_file(latex, path, &options)?;
    Ok(serde_json::to_string(&saved)?)
}

/// Drop every cached engine instance held by `handle`.
///
/// # Safety
///
/// `handle` must be null or come from `mathsvg_new`.
#[no_mangle]
pub unsafe extern "C" fn mathsvg_reset(handle: *const MathSvg) {
    if let Some(engine) = handle.as_ref() {
        engine.reset();
    }
}

/// Free a result returned by any mathsvg function.
///
/// # Safety
///
/// The `result` must have been returned by a mathsvg function.
/// This function should only be called once per result.
#[no_mangle]
pub unsafe extern "C" fn mathsvg_free_result(result: MathSvgResult) {
    if !result.data.is_null() {
        drop(CString::from_raw(result.data));
    }
    if !result.error.is_null() {
        drop(CString::from_raw(result.error));
    }
}

/// Get the version of the mathsvg library.
///
/// The returned string is statically allocated and should not be freed.
#[no_mangle]
pub extern "C" fn mathsvg_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
