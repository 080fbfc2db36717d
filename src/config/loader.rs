// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{Manifest, RawManifest};
use crate::errors::Result;

/// Load a manifest from a given path and return the raw `RawManifest`.
///
/// This only performs TOML deserialization; it does **not** perform
/// semantic validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawManifest> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let manifest: RawManifest = toml::from_str(&contents)?;

    Ok(manifest)
}

/// Load a manifest, resolve fixture paths against its directory, and
/// validate it.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<Manifest> {
    let path = path.as_ref();
    let mut raw = load_from_path(path)?;
    raw.resolve_paths(&manifest_dir(path));
    Manifest::try_from(raw)
}

/// Directory relative fixture paths are resolved against.
///
/// A bare filename like `prunecheck.toml` has an empty parent, which means
/// the current working directory.
fn manifest_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}
