// src/suite/validator.rs

//! One-time fixture sanity check.
//!
//! Before any pruning, each fixture's committed lockfile is checked against
//! its manifests with a lightweight, script-free install in a throwaway
//! copy. The outcome is cached for the whole run, keyed by fixture path:
//! fixture contents do not change mid-run.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use crate::errors::Result;
use crate::exec::{CommandSpec, ProcessRunner};

use super::fixture::{Fixture, SystemUnderTest};
use super::provision::EnvProvisioner;
use super::singleflight::SingleFlight;
use super::workdir::{ScratchDir, copy_tree, link_binary, search_path};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Valid,
    Invalid(String),
}

impl ValidationOutcome {
    pub fn error(&self) -> Option<&str> {
        match self {
            ValidationOutcome::Valid => None,
            ValidationOutcome::Invalid(msg) => Some(msg),
        }
    }
}

/// Memoizing, single-flight fixture validator.
pub struct FixtureValidator {
    runner: Arc<dyn ProcessRunner>,
    provisioner: Arc<EnvProvisioner>,
    flight: Arc<SingleFlight<PathBuf, ValidationOutcome>>,
}

impl FixtureValidator {
    pub fn new(runner: Arc<dyn ProcessRunner>, provisioner: Arc<EnvProvisioner>) -> Self {
        Self {
            runner,
            provisioner,
            flight: Arc::new(SingleFlight::new()),
        }
    }

    /// Validate `fixture` at most once per run.
    ///
    /// Anything that prevents the check from running (copy failure,
    /// toolchain provisioning failure) is reported as `Invalid` so the
    /// fixture's group short-circuits with that message.
    pub async fn validate(&self, fixture: &Arc<Fixture>, sut: &SystemUnderTest) -> ValidationOutcome {
        let runner = Arc::clone(&self.runner);
        let provisioner = Arc::clone(&self.provisioner);
        let task_fixture = Arc::clone(fixture);
        let sut = sut.clone();

        let outcome = self
            .flight
            .get_or_run(fixture.path.clone(), move || async move {
                match check_lockfile(runner.as_ref(), &provisioner, &task_fixture, &sut).await {
                    Ok(outcome) => outcome,
                    Err(e) => ValidationOutcome::Invalid(format!(
                        "fixture validation could not run: {e}"
                    )),
                }
            })
            .await;

        outcome.unwrap_or_else(|e| ValidationOutcome::Invalid(e.to_string()))
    }
}

impl std::fmt::Debug for FixtureValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixtureValidator").finish_non_exhaustive()
    }
}

async fn check_lockfile(
    runner: &dyn ProcessRunner,
    provisioner: &EnvProvisioner,
    fixture: &Fixture,
    sut: &SystemUnderTest,
) -> Result<ValidationOutcome> {
    let scratch = ScratchDir::new("prunecheck-validate-")?;
    copy_tree(&fixture.path, scratch.path())?;
    let local_bin = link_binary(scratch.path(), &sut.binary, &sut.link_name)?;

    let env = match provisioner.environment_for(fixture).await {
        Ok(env) => env,
        Err(e) => return Ok(ValidationOutcome::Invalid(e.to_string())),
    };
    let path = search_path(&env.bin_dirs, &local_bin)?;

    let cmd = fixture
        .package_manager
        .lightweight_validation_command(&fixture.frozen_install);
    info!(fixture = %fixture.name, cmd = %cmd, "validating fixture");

    let out = runner
        .run(
            CommandSpec::new(cmd, scratch.path())
                .env("PATH", path)
                .env("COREPACK_ENABLE_STRICT", "0"),
        )
        .await?;

    if !out.succeeded() {
        warn!(fixture = %fixture.name, exit_code = out.exit_code, "fixture lockfile is out of sync");
        return Ok(ValidationOutcome::Invalid(invalid_fixture_message(
            out.exit_code,
            &out.combined(),
        )));
    }

    info!(fixture = %fixture.name, "fixture validated");
    Ok(ValidationOutcome::Valid)
}

fn invalid_fixture_message(exit_code: i32, output: &str) -> String {
    format!(
        "INVALID FIXTURE: frozen install fails on unpruned original (exit {exit_code}).\n\
         This means the fixture's package.jsons don't match its lockfile.\n\
         Fix the fixture or rebuild it from a real repo.\n\n{output}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_message_names_the_lockfile_mismatch() {
        let msg = invalid_fixture_message(1, "ERR_PNPM_OUTDATED_LOCKFILE");
        assert!(msg.starts_with("INVALID FIXTURE"));
        assert!(msg.contains("(exit 1)"));
        assert!(msg.contains("don't match its lockfile"));
        assert!(msg.ends_with("ERR_PNPM_OUTDATED_LOCKFILE"));
    }

    #[test]
    fn outcome_accessors() {
        assert_eq!(ValidationOutcome::Valid.error(), None);
        assert_eq!(ValidationOutcome::Invalid("x".into()).error(), Some("x"));
    }
}
