// src/suite/fixture.rs

//! Data model shared by the validator, provisioner and group runner.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::types::PackageManager;

/// A template repository plus the package manager it is installed with.
///
/// Immutable for the whole run; test cases share it through an `Arc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fixture {
    pub name: String,
    pub path: PathBuf,
    pub package_manager: PackageManager,
    /// Bare version, e.g. `9.15.0`.
    pub version: String,
    pub frozen_install: Vec<String>,
}

impl Fixture {
    pub fn toolchain_id(&self) -> ToolchainId {
        ToolchainId::new(self.package_manager, &self.version)
    }

    pub fn frozen_install_command(&self) -> String {
        self.frozen_install.join(" ")
    }
}

/// `<name>@<version>` as understood by corepack, e.g. `pnpm@9.15.0`.
///
/// Fixtures with equal identifiers share one provisioned environment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ToolchainId(String);

impl ToolchainId {
    pub fn new(package_manager: PackageManager, version: &str) -> Self {
        Self(format!("{}@{}", package_manager.binary_name(), version))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The part after `@`.
    pub fn version(&self) -> &str {
        self.0.split_once('@').map_or("", |(_, v)| v)
    }
}

impl fmt::Display for ToolchainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The pruning tool under test, consumed as an opaque executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemUnderTest {
    pub binary: PathBuf,
    /// Name the binary is linked under on the search path.
    pub link_name: String,
}

impl SystemUnderTest {
    pub const DEFAULT_LINK_NAME: &'static str = "turbo";

    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            link_name: Self::DEFAULT_LINK_NAME.to_string(),
        }
    }

    pub fn with_link_name(mut self, name: impl Into<String>) -> Self {
        self.link_name = name.into();
        self
    }

    pub fn prune_command(&self, workspace: &str) -> String {
        format!("{} prune {}", self.link_name, workspace)
    }
}

/// One workspace target to prune and install.
#[derive(Debug, Clone)]
pub struct TestCase {
    pub fixture: Arc<Fixture>,
    pub target_workspace: String,
    pub label: String,
    /// Only affects log verbosity, never the recorded result.
    pub expected_failure: bool,
}

impl TestCase {
    pub fn new(fixture: Arc<Fixture>, target_workspace: impl Into<String>) -> Self {
        let target_workspace = target_workspace.into();
        let label = format!("{}/{}", fixture.name, target_workspace);
        Self {
            fixture,
            target_workspace,
            label,
            expected_failure: false,
        }
    }

    pub fn expect_failure(mut self, expected: bool) -> Self {
        self.expected_failure = expected;
        self
    }
}

/// Outcome of one test case.
///
/// `success` is derived: it is only ever set through
/// [`TestResult::mark_install_succeeded`], which requires a prior prune
/// success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub label: String,
    pub success: bool,
    pub prune_success: bool,
    pub install_success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prune_output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub install_output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl TestResult {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            success: false,
            prune_success: false,
            install_success: false,
            prune_output: None,
            install_output: None,
            error: None,
            duration_ms: 0,
        }
    }

    /// A result that never ran: every flag false, zero duration.
    pub fn failed(label: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(label)
        }
    }

    pub fn mark_install_succeeded(&mut self) {
        self.install_success = true;
        self.success = self.prune_success;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(pm: PackageManager, version: &str) -> Fixture {
        Fixture {
            name: "basic".into(),
            path: PathBuf::from("/fixtures/basic"),
            package_manager: pm,
            version: version.into(),
            frozen_install: pm.default_frozen_install(),
        }
    }

    #[test]
    fn toolchain_id_uses_corepack_name() {
        let id = fixture(PackageManager::YarnBerry, "4.1.0").toolchain_id();
        assert_eq!(id.as_str(), "yarn@4.1.0");
        assert_eq!(id.version(), "4.1.0");
    }

    #[test]
    fn default_label_is_fixture_slash_workspace() {
        let tc = TestCase::new(Arc::new(fixture(PackageManager::Npm, "10.2.0")), "web");
        assert_eq!(tc.label, "basic/web");
        assert!(!tc.expected_failure);
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let mut result = TestResult::new("basic/web");
        result.prune_success = true;
        result.mark_install_succeeded();

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["pruneSuccess"], true);
        assert_eq!(json["installSuccess"], true);
        assert_eq!(json["success"], true);
        assert_eq!(json["durationMs"], 0);
        assert!(json.get("error").is_none());
    }

    #[test]
    fn install_without_prune_is_not_success() {
        let mut result = TestResult::new("x");
        result.mark_install_succeeded();
        assert!(!result.success);
    }
}
