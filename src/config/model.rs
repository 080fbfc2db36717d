// src/config/model.rs

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::exec::backend::{DEFAULT_MAX_OUTPUT_BYTES, DEFAULT_TIMEOUT};
use crate::suite::group::DEFAULT_PRUNE_OUTPUT_DIR;
use crate::suite::{Fixture, SystemUnderTest, TestCase};
use crate::types::PackageManager;

/// Manifest as read from a TOML file.
///
/// ```toml
/// [settings]
/// command_timeout = "10m"
///
/// [[fixture]]
/// name = "npm-basic"
/// path = "fixtures/npm-basic"
/// package_manager = "npm"
/// version = "10.2.0"
/// workspaces = ["web", "docs"]
/// expected_failures = ["docs"]
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RawManifest {
    #[serde(default)]
    pub settings: SettingsSection,

    /// All `[[fixture]]` entries, in file order.
    #[serde(default, rename = "fixture")]
    pub fixtures: Vec<FixtureConfig>,
}

/// `[settings]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct SettingsSection {
    /// Per-command timeout, e.g. `"90s"` or `"10m"`.
    #[serde(default = "default_command_timeout")]
    pub command_timeout: String,

    /// Capture limit for each of stdout and stderr.
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,

    /// Where the prune tool writes its output, relative to the repo root.
    #[serde(default = "default_prune_output_dir")]
    pub prune_output_dir: String,

    /// Name the prune binary is exposed under on the search path.
    #[serde(default = "default_sut_name")]
    pub sut_name: String,
}

fn default_command_timeout() -> String {
    "10m".to_string()
}

fn default_max_output_bytes() -> usize {
    DEFAULT_MAX_OUTPUT_BYTES
}

fn default_prune_output_dir() -> String {
    DEFAULT_PRUNE_OUTPUT_DIR.to_string()
}

fn default_sut_name() -> String {
    SystemUnderTest::DEFAULT_LINK_NAME.to_string()
}

impl Default for SettingsSection {
    fn default() -> Self {
        Self {
            command_timeout: default_command_timeout(),
            max_output_bytes: default_max_output_bytes(),
            prune_output_dir: default_prune_output_dir(),
            sut_name: default_sut_name(),
        }
    }
}

/// `[[fixture]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct FixtureConfig {
    pub name: String,

    /// Template repository; relative paths resolve against the manifest.
    pub path: PathBuf,

    pub package_manager: PackageManager,

    /// Bare version, e.g. `"9.15.0"`.
    pub version: String,

    /// Overrides the package manager's default frozen install.
    #[serde(default)]
    pub frozen_install: Option<Vec<String>>,

    /// Workspace targets to prune, one test case each.
    pub workspaces: Vec<String>,

    /// Workspaces whose prune/install is known to fail.
    #[serde(default)]
    pub expected_failures: Vec<String>,
}

impl FixtureConfig {
    pub fn effective_frozen_install(&self) -> Vec<String> {
        self.frozen_install
            .clone()
            .unwrap_or_else(|| self.package_manager.default_frozen_install())
    }

    pub fn to_fixture(&self) -> Fixture {
        Fixture {
            name: self.name.clone(),
            path: self.path.clone(),
            package_manager: self.package_manager,
            version: self.version.clone(),
            frozen_install: self.effective_frozen_install(),
        }
    }
}

/// Typed, validated settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub command_timeout: Duration,
    pub max_output_bytes: usize,
    pub prune_output_dir: PathBuf,
    pub sut_name: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            command_timeout: DEFAULT_TIMEOUT,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            prune_output_dir: PathBuf::from(DEFAULT_PRUNE_OUTPUT_DIR),
            sut_name: SystemUnderTest::DEFAULT_LINK_NAME.to_string(),
        }
    }
}

/// Validated manifest.
///
/// Only constructed via `TryFrom<RawManifest>` (see `validate.rs`).
#[derive(Debug, Clone)]
pub struct Manifest {
    settings: Settings,
    fixtures: Vec<FixtureConfig>,
}

impl Manifest {
    pub(crate) fn new_unchecked(settings: Settings, fixtures: Vec<FixtureConfig>) -> Self {
        Self { settings, fixtures }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn fixtures(&self) -> &[FixtureConfig] {
        &self.fixtures
    }

    /// Test cases grouped by fixture, in manifest order.
    pub fn test_groups(&self) -> Vec<Vec<TestCase>> {
        self.fixtures
            .iter()
            .map(|cfg| {
                let fixture = Arc::new(cfg.to_fixture());
                cfg.workspaces
                    .iter()
                    .map(|ws| {
                        TestCase::new(Arc::clone(&fixture), ws.as_str())
                            .expect_failure(cfg.expected_failures.contains(ws))
                    })
                    .collect()
            })
            .collect()
    }
}

impl RawManifest {
    /// Make relative fixture paths relative to `base` instead of the cwd.
    ///
    /// Existing paths are canonicalized, so `fixtures/a` and `./fixtures/a`
    /// end up as the same validation cache key.
    pub fn resolve_paths(&mut self, base: &Path) {
        for fixture in &mut self.fixtures {
            let joined = base.join(&fixture.path);
            fixture.path = std::fs::canonicalize(&joined).unwrap_or_else(|_| {
                joined
                    .components()
                    .filter(|c| !matches!(c, Component::CurDir))
                    .collect()
            });
        }
    }
}
