//! Writing converted markup to disk.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Resolve `path` against the current directory when it is relative.
pub(crate) fn absolute_path(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = env::current_dir().map_err(|e| Error::persistence(path, e))?;
    Ok(cwd.join(path))
}

/// Write `svg` to `path`, creating missing parent directories and
/// replacing any existing file.
pub(crate) fn write_svg(path: &Path, svg: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| Error::persistence(parent, e))?;
    }
    fs::write(path, svg).map_err(|e| Error::persistence(path, e))?;
    log::debug!("wrote {} bytes to {}", svg.len(), path.display());
    Ok(())
}
