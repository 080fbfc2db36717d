#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use prunecheck::suite::{Fixture, SystemUnderTest, TestCase};
use prunecheck::types::PackageManager;

/// Builder for an on-disk fixture template plus its `Fixture` descriptor.
///
/// The template lives in a `TempDir` owned by the returned `FixtureDir`.
pub struct FixtureBuilder {
    name: String,
    package_manager: PackageManager,
    version: String,
    frozen_install: Option<Vec<String>>,
    workspaces: Vec<String>,
    files: Vec<(PathBuf, String)>,
}

impl FixtureBuilder {
    pub fn new(name: &str, package_manager: PackageManager, version: &str) -> Self {
        Self {
            name: name.to_string(),
            package_manager,
            version: version.to_string(),
            frozen_install: None,
            workspaces: Vec::new(),
            files: Vec::new(),
        }
    }

    /// Adds `apps/<name>/package.json`.
    pub fn workspace(mut self, name: &str) -> Self {
        self.workspaces.push(name.to_string());
        self.files.push((
            PathBuf::from(format!("apps/{name}/package.json")),
            format!("{{\"name\":\"{name}\",\"version\":\"0.0.0\"}}"),
        ));
        self
    }

    pub fn file(mut self, rel: &str, contents: &str) -> Self {
        self.files.push((PathBuf::from(rel), contents.to_string()));
        self
    }

    pub fn frozen_install(mut self, tokens: &[&str]) -> Self {
        self.frozen_install = Some(tokens.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn build(self) -> FixtureDir {
        let dir = tempfile::Builder::new()
            .prefix("prunecheck-fixture-")
            .tempdir()
            .expect("create fixture dir");

        fs::write(
            dir.path().join("package.json"),
            format!(
                "{{\"name\":\"{}\",\"private\":true,\"workspaces\":[\"apps/*\"],\"packageManager\":\"{}@{}\"}}",
                self.name,
                self.package_manager.binary_name(),
                self.version
            ),
        )
        .expect("write root package.json");

        for (rel, contents) in &self.files {
            let path = dir.path().join(rel);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).expect("create fixture subdir");
            }
            fs::write(&path, contents).expect("write fixture file");
        }

        let fixture = Arc::new(Fixture {
            name: self.name,
            path: dir.path().to_path_buf(),
            package_manager: self.package_manager,
            version: self.version,
            frozen_install: self
                .frozen_install
                .unwrap_or_else(|| self.package_manager.default_frozen_install()),
        });

        FixtureDir {
            _dir: dir,
            fixture,
            workspaces: self.workspaces,
        }
    }
}

/// A fixture template on disk; removed when dropped.
pub struct FixtureDir {
    _dir: TempDir,
    pub fixture: Arc<Fixture>,
    pub workspaces: Vec<String>,
}

impl FixtureDir {
    pub fn path(&self) -> &Path {
        &self.fixture.path
    }

    /// One test case per workspace, in declaration order.
    pub fn cases(&self) -> Vec<TestCase> {
        self.workspaces
            .iter()
            .map(|ws| TestCase::new(Arc::clone(&self.fixture), ws.as_str()))
            .collect()
    }
}

/// A stand-in prune binary: an empty file in its own temp dir.
///
/// Only ever linked, never executed, when paired with `FakeRunner`.
pub struct FakeBinary {
    _dir: TempDir,
    pub sut: SystemUnderTest,
}

impl FakeBinary {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create binary dir");
        let path = dir.path().join("turbo-bin");
        fs::write(&path, b"#!/bin/sh\nexit 0\n").expect("write fake binary");
        Self {
            _dir: dir,
            sut: SystemUnderTest::new(path),
        }
    }
}

impl Default for FakeBinary {
    fn default() -> Self {
        Self::new()
    }
}
