// src/suite/workdir.rs

//! Scratch directories and the filesystem plumbing around them.
//!
//! All filesystem work here is synchronous; callers run it inline on the
//! group's task.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tempfile::TempDir;
use tracing::{debug, warn};

/// Directory inside a scratch dir that holds the linked prune binary.
pub const LOCAL_BIN_DIR: &str = ".bin";

/// A temporary directory removed when dropped, on every exit path.
///
/// Unlike a bare [`TempDir`], a failed removal is logged instead of being
/// silently ignored.
#[derive(Debug)]
pub struct ScratchDir {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl ScratchDir {
    pub fn new(prefix: &str) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(prefix)
            .tempdir()
            .with_context(|| format!("creating temp dir with prefix {prefix}"))?;
        let path = dir.path().to_path_buf();
        debug!(path = ?path, "created scratch dir");
        Ok(Self {
            dir: Some(dir),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            match dir.close() {
                Ok(()) => debug!(path = ?self.path, "removed scratch dir"),
                Err(e) => warn!(path = ?self.path, error = %e, "failed to remove scratch dir"),
            }
        }
    }
}

/// Recursively copy `src` into `dst`, preserving symlinks.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    let metadata = fs::symlink_metadata(src)
        .with_context(|| format!("failed to stat source path: {}", src.display()))?;

    if metadata.is_dir() {
        fs::create_dir_all(dst)
            .with_context(|| format!("failed to create directory: {}", dst.display()))?;
        for entry in
            fs::read_dir(src).with_context(|| format!("failed to read directory: {}", src.display()))?
        {
            let entry =
                entry.with_context(|| format!("failed to iterate directory: {}", src.display()))?;
            copy_tree(&entry.path(), &dst.join(entry.file_name()))?;
        }
        return Ok(());
    }

    #[cfg(unix)]
    if metadata.file_type().is_symlink() {
        let target = fs::read_link(src)
            .with_context(|| format!("failed to read symlink: {}", src.display()))?;
        std::os::unix::fs::symlink(&target, dst).with_context(|| {
            format!(
                "failed to copy symlink {} -> {}",
                dst.display(),
                target.display()
            )
        })?;
        return Ok(());
    }

    fs::copy(src, dst)
        .with_context(|| format!("failed to copy {} to {}", src.display(), dst.display()))?;
    Ok(())
}

/// Place `binary` at `<dir>/.bin/<name>` and return the `.bin` directory.
///
/// Each scratch dir gets its own link so PATH lookup resolves the same way
/// in every one of them.
pub fn link_binary(dir: &Path, binary: &Path, name: &str) -> Result<PathBuf> {
    let local_bin = dir.join(LOCAL_BIN_DIR);
    fs::create_dir_all(&local_bin)
        .with_context(|| format!("failed to create directory: {}", local_bin.display()))?;

    let link = local_bin.join(name);

    #[cfg(unix)]
    std::os::unix::fs::symlink(binary, &link)
        .with_context(|| format!("failed to link {} -> {}", link.display(), binary.display()))?;

    #[cfg(not(unix))]
    fs::copy(binary, &link)
        .with_context(|| format!("failed to copy {} to {}", binary.display(), link.display()))?;

    Ok(local_bin)
}

/// `[env dirs..., local bin, inherited]` as a PATH value.
pub fn compose_search_path(
    env_dirs: &[PathBuf],
    local_bin: &Path,
    inherited: Option<OsString>,
) -> Result<String> {
    let mut entries: Vec<PathBuf> = env_dirs.to_vec();
    entries.push(local_bin.to_path_buf());
    if let Some(inherited) = inherited {
        entries.extend(std::env::split_paths(&inherited));
    }

    std::env::join_paths(entries)
        .context("building search path")?
        .into_string()
        .map_err(|_| anyhow!("search path is not valid UTF-8"))
}

/// Like [`compose_search_path`], inheriting this process's `PATH`.
pub fn search_path(env_dirs: &[PathBuf], local_bin: &Path) -> Result<String> {
    compose_search_path(env_dirs, local_bin, std::env::var_os("PATH"))
}

/// Remove a directory tree if present; failures are logged only.
pub fn remove_dir_best_effort(path: &Path) {
    match fs::remove_dir_all(path) {
        Ok(()) => debug!(path = ?path, "removed directory"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = ?path, error = %e, "failed to remove directory"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scratch_dir_is_removed_on_drop() {
        let scratch = ScratchDir::new("prunecheck-test-").unwrap();
        let path = scratch.path().to_path_buf();
        fs::write(path.join("file"), b"x").unwrap();
        assert!(path.exists());

        drop(scratch);
        assert!(!path.exists());
    }

    #[test]
    fn copy_tree_copies_nested_files() {
        let src = tempfile::tempdir().unwrap();
        fs::create_dir_all(src.path().join("apps/web")).unwrap();
        fs::write(src.path().join("package.json"), b"{}").unwrap();
        fs::write(src.path().join("apps/web/package.json"), b"{\"name\":\"web\"}").unwrap();

        let dst = tempfile::tempdir().unwrap();
        copy_tree(src.path(), dst.path()).unwrap();

        assert_eq!(fs::read(dst.path().join("package.json")).unwrap(), b"{}");
        assert_eq!(
            fs::read_to_string(dst.path().join("apps/web/package.json")).unwrap(),
            "{\"name\":\"web\"}"
        );
    }

    #[test]
    fn search_path_orders_env_dirs_first() {
        let path = compose_search_path(
            &[PathBuf::from("/pm/bun"), PathBuf::from("/pm/corepack")],
            Path::new("/work/.bin"),
            Some(OsString::from("/usr/bin")),
        )
        .unwrap();

        let parts: Vec<PathBuf> = std::env::split_paths(&path).collect();
        assert_eq!(
            parts,
            vec![
                PathBuf::from("/pm/bun"),
                PathBuf::from("/pm/corepack"),
                PathBuf::from("/work/.bin"),
                PathBuf::from("/usr/bin"),
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn link_binary_places_named_link() {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("real-binary");
        fs::write(&bin, b"#!/bin/sh\n").unwrap();

        let local_bin = link_binary(dir.path(), &bin, "turbo").unwrap();
        assert_eq!(local_bin, dir.path().join(LOCAL_BIN_DIR));
        assert_eq!(fs::read_link(local_bin.join("turbo")).unwrap(), bin);
    }

    #[test]
    fn removing_missing_dir_is_quiet() {
        let dir = tempfile::tempdir().unwrap();
        remove_dir_best_effort(&dir.path().join("absent"));
    }
}
