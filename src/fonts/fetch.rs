//! On-demand download of font packages from an npm registry.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};

use super::{font_dir, module_path, FontAssets, FontResolver, MathFont};
use crate::error::{Error, Result};
use crate::options::EngineConfig;

/// Marker written last into a fully materialized font directory.
pub const MANIFEST_FILE: &str = ".mathsvg.json";

const ABBREVIATED_METADATA: &str = "application/vnd.npm.install-v1+json";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Record of where a cached font came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FontManifest {
    pub package: String,
    pub version: String,
    pub fetched_at: DateTime<Utc>,
}

impl FontManifest {
    /// Read the manifest of a font directory, if it has one.
    pub fn load(package_dir: &Path) -> Option<Self> {
        let data = fs::read(package_dir.join(MANIFEST_FILE)).ok()?;
        serde_json::from_slice(&data).ok()
    }
}

#[derive(Debug, Deserialize)]
struct Packument {
    #[serde(rename = "dist-tags")]
    dist_tags: HashMap<String, String>,
    versions: HashMap<String, PackageVersion>,
}

#[derive(Debug, Deserialize)]
struct PackageVersion {
    dist: Dist,
}

#[derive(Debug, Deserialize)]
struct Dist {
    tarball: String,
}

/// Resolver that fetches missing fonts into a local cache directory.
///
/// A font directory is only trusted once its manifest exists, so an
/// interrupted download is detected and fetched again. Failures are
/// returned, never remembered.
pub struct FetchResolver {
    cache_dir: PathBuf,
    registry: String,
    client: reqwest::blocking::Client,
}

impl FetchResolver {
    /// Create a resolver caching into `cache_dir` and downloading from `registry`.
    pub fn new(cache_dir: impl Into<PathBuf>, registry: impl Into<String>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("mathsvg/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Other(format!("HTTP client: {}", e)))?;

        Ok(Self {
            cache_dir: cache_dir.into(),
            registry: registry.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Create a resolver from an engine configuration.
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        Self::new(&config.cache_dir, &config.registry)
    }

    /// The directory fonts are unpacked into.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// True when `font` can be used without network access.
    pub fn is_materialized(&self, font: MathFont) -> bool {
        font.is_bundled() || is_complete(&font_dir(&self.cache_dir, font))
    }

    fn materialize(&self, font: MathFont, package: &str, target: &Path) -> Result<()> {
        fs::create_dir_all(&self.cache_dir).map_err(|e| Error::font(font, e))?;

        let (version, tarball) = self.fetch_package(font, package)?;

        let staging = self
            .cache_dir
            .join(format!(".{}.partial-{}", font, std::process::id()));
        if staging.exists() {
            let _ = fs::remove_dir_all(&staging);
        }

        let result = stage_package(&tarball, &staging, package, &version)
            .map_err(|e| Error::font(font, e))
            .and_then(|()| publish(&staging, target).map_err(|e| Error::font(font, e)));

        if result.is_err() {
            let _ = fs::remove_dir_all(&staging);
        }
        result
    }

    fn fetch_package(&self, font: MathFont, package: &str) -> Result<(String, Vec<u8>)> {
        let url = format!("{}/{}", self.registry, package.replace('/', "%2f"));
        log::debug!("fetching package metadata {}", url);

        let packument: Packument = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, ABBREVIATED_METADATA)
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.json())
            .map_err(|e| Error::font(font, e))?;

        let version = packument
            .dist_tags
            .get("latest")
            .cloned()
            .ok_or_else(|| Error::font(font, format!("{} has no latest version", package)))?;
        let dist = packument
            .versions
            .get(&version)
            .map(|v| &v.dist)
            .ok_or_else(|| Error::font(font, format!("{}@{} is not listed", package, version)))?;

        log::info!("downloading {}@{} from {}", package, version, dist.tarball);
        let bytes = self
            .client
            .get(&dist.tarball)
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.bytes())
            .map_err(|e| Error::font(font, e))?;

        Ok((version, bytes.to_vec()))
    }
}

impl FontResolver for FetchResolver {
    fn resolve(&self, font: MathFont) -> Result<FontAssets> {
        let Some(package) = font.package() else {
            return Ok(FontAssets::bundled(font));
        };

        let dir = font_dir(&self.cache_dir, font);
        if is_complete(&dir) {
            log::debug!("font {} cached at {}", font, dir.display());
            return Ok(FontAssets::module(font, module_path(&dir)));
        }

        if dir.exists() {
            log::warn!("discarding incomplete font directory {}", dir.display());
            fs::remove_dir_all(&dir).map_err(|e| Error::font(font, e))?;
        }

        self.materialize(font, package, &dir)?;
        log::info!("font {} materialized at {}", font, dir.display());
        Ok(FontAssets::module(font, module_path(&dir)))
    }
}

fn is_complete(dir: &Path) -> bool {
    dir.join(MANIFEST_FILE).is_file() && module_path(dir).is_file()
}

fn stage_package(tarball: &[u8], staging: &Path, package: &str, version: &str) -> io::Result<()> {
    fs::create_dir_all(staging)?;
    unpack_package(tarball, staging)?;

    if !module_path(staging).is_file() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("{} does not contain mjs/svg.js", package),
        ));
    }

    let manifest = FontManifest {
        package: package.to_string(),
        version: version.to_string(),
        fetched_at: Utc::now(),
    };
    let json = serde_json::to_vec_pretty(&manifest)?;
    fs::write(staging.join(MANIFEST_FILE), json)
}

fn publish(staging: &Path, target: &Path) -> io::Result<()> {
    match fs::rename(staging, target) {
        Ok(()) => Ok(()),
        // Another process finished the same font first.
        Err(_) if is_complete(target) => fs::remove_dir_all(staging),
        Err(e) => Err(e),
    }
}

/// Unpack an npm package tarball (gzip'd tar) into `dest`.
///
/// The leading `package/` directory npm puts in every tarball is stripped.
/// Entries that would escape `dest` are rejected.
pub fn unpack_package(tarball: &[u8], dest: &Path) -> io::Result<()> {
    let mut archive = tar::Archive::new(GzDecoder::new(tarball));

    for entry in archive.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.into_owned();
        let relative: PathBuf = path.components().skip(1).collect();
        if relative.as_os_str().is_empty() {
            continue;
        }
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unsafe path in package: {}", path.display()),
            ));
        }

        let target = dest.join(&relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        entry.unpack(&target)?;
    }

    Ok(())
}
