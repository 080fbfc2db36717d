// src/suite/group.rs

//! Runs every test case of one fixture against a single shared working copy.
//!
//! Per group:
//! 1. validate the fixture (cached across groups);
//! 2. copy it once into a fresh scratch dir and link the prune binary;
//! 3. `git init` + one commit, since prune reads version-control state;
//! 4. for each case, in order: prune, then frozen install inside the pruned
//!    output, then remove the pruned output before the next case.
//!
//! Cases run strictly sequentially: they all mutate the same working copy.
//! The working copy is removed when the group finishes, however it finishes.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::errors::Result;
use crate::exec::{CommandSpec, ProcessRunner};

use super::fixture::{Fixture, SystemUnderTest, TestCase, TestResult};
use super::provision::EnvProvisioner;
use super::validator::FixtureValidator;
use super::workdir::{ScratchDir, copy_tree, link_binary, remove_dir_best_effort, search_path};

/// Relative path the prune tool writes its output to.
pub const DEFAULT_PRUNE_OUTPUT_DIR: &str = "out";

const GIT_INIT: &str = "git init && git add . && git commit --allow-empty -m \"init\"";

/// Logs a per-case progress step; expected-failure cases log at debug only.
macro_rules! step {
    ($quiet:expr, $($arg:tt)+) => {
        if $quiet {
            debug!($($arg)+)
        } else {
            info!($($arg)+)
        }
    };
}

#[derive(Debug, Clone)]
pub struct GroupOptions {
    pub prune_output_dir: PathBuf,
}

impl Default for GroupOptions {
    fn default() -> Self {
        Self {
            prune_output_dir: PathBuf::from(DEFAULT_PRUNE_OUTPUT_DIR),
        }
    }
}

/// Top-level orchestrator.
///
/// Owns the two run-wide caches (toolchains and fixture validation); one
/// instance is shared by every concurrently running group.
pub struct FixtureGroupRunner {
    runner: Arc<dyn ProcessRunner>,
    provisioner: Arc<EnvProvisioner>,
    validator: Arc<FixtureValidator>,
    options: GroupOptions,
}

/// The group's copy of the fixture plus the PATH every step runs with.
struct WorkingCopy {
    scratch: ScratchDir,
    search_path: String,
}

impl WorkingCopy {
    fn root(&self) -> &Path {
        self.scratch.path()
    }
}

impl FixtureGroupRunner {
    pub fn new(runner: Arc<dyn ProcessRunner>, options: GroupOptions) -> Self {
        let provisioner = Arc::new(EnvProvisioner::new(Arc::clone(&runner)));
        let validator = Arc::new(FixtureValidator::new(
            Arc::clone(&runner),
            Arc::clone(&provisioner),
        ));
        Self {
            runner,
            provisioner,
            validator,
            options,
        }
    }

    /// Run all `cases`, which must share one fixture, and return their
    /// results in input order.
    pub async fn run_group(&self, cases: &[TestCase], sut: &SystemUnderTest) -> Vec<TestResult> {
        let Some(first) = cases.first() else {
            return Vec::new();
        };
        let fixture = Arc::clone(&first.fixture);
        debug_assert!(
            cases.iter().all(|c| c.fixture.path == fixture.path),
            "fixture group mixes fixtures"
        );

        let validation = self.validator.validate(&fixture, sut).await;
        if let Some(msg) = validation.error() {
            return fail_all(cases, msg);
        }

        let working_copy = match self.prepare(&fixture, sut).await {
            Ok(wc) => wc,
            Err(e) => {
                error!(fixture = %fixture.name, error = %e, "failed to set up working copy");
                return fail_all(cases, &e.to_string());
            }
        };

        self.init_repository(&fixture, &working_copy).await;

        let mut results = Vec::with_capacity(cases.len());
        for case in cases {
            results.push(self.run_case(&fixture, sut, &working_copy, case).await);
        }

        debug!(fixture = %fixture.name, path = ?working_copy.root(), "removing working copy");
        drop(working_copy);

        results
    }

    async fn prepare(&self, fixture: &Fixture, sut: &SystemUnderTest) -> Result<WorkingCopy> {
        let scratch = ScratchDir::new("prunecheck-test-")?;
        info!(fixture = %fixture.name, path = ?scratch.path(), "copying fixture");
        copy_tree(&fixture.path, scratch.path())?;

        let local_bin = link_binary(scratch.path(), &sut.binary, &sut.link_name)?;
        let env = self.provisioner.environment_for(fixture).await?;
        let search_path = search_path(&env.bin_dirs, &local_bin)?;

        Ok(WorkingCopy {
            scratch,
            search_path,
        })
    }

    /// One commit of the pristine fixture, shared by every case.
    async fn init_repository(&self, fixture: &Fixture, wc: &WorkingCopy) {
        let spec = CommandSpec::new(GIT_INIT, wc.root())
            .env("PATH", wc.search_path.as_str())
            .env("GIT_AUTHOR_NAME", "test")
            .env("GIT_AUTHOR_EMAIL", "test@test.com")
            .env("GIT_COMMITTER_NAME", "test")
            .env("GIT_COMMITTER_EMAIL", "test@test.com");

        match self.runner.run(spec).await {
            Ok(out) if !out.succeeded() => warn!(
                fixture = %fixture.name,
                exit_code = out.exit_code,
                "git init failed: {}",
                out.combined()
            ),
            Ok(_) => {}
            Err(e) => warn!(fixture = %fixture.name, error = %e, "git init could not run"),
        }
    }

    async fn run_case(
        &self,
        fixture: &Fixture,
        sut: &SystemUnderTest,
        wc: &WorkingCopy,
        case: &TestCase,
    ) -> TestResult {
        let quiet = case.expected_failure;
        let start = Instant::now();
        let mut result = TestResult::new(&case.label);

        if let Err(e) = self.prune_and_install(fixture, sut, wc, case, &mut result).await {
            let msg = e.to_string();
            if !quiet {
                error!(case = %case.label, error = %msg, "test case error");
            }
            result.error = Some(msg);
        }

        remove_dir_best_effort(&wc.root().join(&self.options.prune_output_dir));
        result.duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        result
    }

    async fn prune_and_install(
        &self,
        fixture: &Fixture,
        sut: &SystemUnderTest,
        wc: &WorkingCopy,
        case: &TestCase,
        result: &mut TestResult,
    ) -> Result<()> {
        let quiet = case.expected_failure;
        let label = case.label.as_str();
        let prune_cmd = sut.prune_command(&case.target_workspace);

        step!(quiet, case = %label, "{prune_cmd}");
        let prune = self
            .runner
            .run(CommandSpec::new(prune_cmd, wc.root()).env("PATH", wc.search_path.as_str()))
            .await?;

        let prune_output = prune.combined();
        result.prune_output = Some(prune_output.clone());

        if !prune.succeeded() {
            step!(quiet, case = %label, exit_code = prune.exit_code, "PRUNE FAILED");
            result.error = Some(format!("Prune failed:\n{prune_output}"));
            return Ok(());
        }

        result.prune_success = true;
        step!(quiet, case = %label, "prune succeeded");

        let install_cmd = fixture.frozen_install_command();
        let out_dir = wc.root().join(&self.options.prune_output_dir);
        step!(quiet, case = %label, "{install_cmd} (in {})", self.options.prune_output_dir.display());

        let install = self
            .runner
            .run(
                CommandSpec::new(install_cmd, &out_dir)
                    .env("PATH", wc.search_path.as_str())
                    .env("COREPACK_ENABLE_STRICT", "0"),
            )
            .await?;

        let install_output = install.combined();
        result.install_output = Some(install_output.clone());

        if !install.succeeded() {
            step!(quiet, case = %label, exit_code = install.exit_code, "FROZEN INSTALL FAILED");
            result.error = Some(format!("Frozen install failed:\n{install_output}"));
            return Ok(());
        }

        result.mark_install_succeeded();
        step!(quiet, case = %label, "PASSED");
        Ok(())
    }
}

impl std::fmt::Debug for FixtureGroupRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixtureGroupRunner")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

fn fail_all(cases: &[TestCase], error: &str) -> Vec<TestResult> {
    cases
        .iter()
        .map(|case| TestResult::failed(&case.label, error))
        .collect()
}
