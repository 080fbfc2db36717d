// src/suite/provision.rs

//! Package-manager toolchain provisioning.
//!
//! Each distinct [`ToolchainId`] is provisioned once per run into its own
//! scratch directory: corepack is enabled into `corepack-bin/`, then either
//! corepack activates the requested version or, for bun (which corepack
//! does not manage), the official install script is run into
//! `bun-install/`. The resulting directories are shared read-only by every
//! test that uses the same toolchain.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::errors::{PrunecheckError, Result};
use crate::exec::{CommandSpec, ProcessRunner};
use crate::types::PackageManager;

use super::fixture::{Fixture, ToolchainId};
use super::singleflight::SingleFlight;
use super::workdir::{ScratchDir, search_path};

const COREPACK_BIN_DIR: &str = "corepack-bin";
const BUN_INSTALL_DIR: &str = "bun-install";

/// Search-path directories for one toolchain, most specific first.
///
/// Owns its scratch directory: it is removed once the last reference is
/// dropped, which is the end of the run.
#[derive(Debug)]
pub struct ProvisionedEnvironment {
    pub id: ToolchainId,
    pub bin_dirs: Vec<PathBuf>,
    _scratch: ScratchDir,
}

type Provisioned = std::result::Result<Arc<ProvisionedEnvironment>, String>;

/// Memoizing, single-flight toolchain provisioner.
pub struct EnvProvisioner {
    runner: Arc<dyn ProcessRunner>,
    flight: Arc<SingleFlight<ToolchainId, Provisioned>>,
}

impl EnvProvisioner {
    pub fn new(runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            runner,
            flight: Arc::new(SingleFlight::new()),
        }
    }

    /// Environment for `fixture`'s toolchain.
    pub async fn environment_for(&self, fixture: &Fixture) -> Result<Arc<ProvisionedEnvironment>> {
        self.get_environment(fixture.toolchain_id(), fixture.package_manager)
            .await
    }

    /// Provision `id` at most once, however many callers race for it.
    ///
    /// A failure is memoized too: every caller for `id` sees the same error
    /// for the rest of the run.
    pub async fn get_environment(
        &self,
        id: ToolchainId,
        package_manager: PackageManager,
    ) -> Result<Arc<ProvisionedEnvironment>> {
        let runner = Arc::clone(&self.runner);
        let task_id = id.clone();

        let provisioned = self
            .flight
            .get_or_run(id, move || async move {
                provision(runner.as_ref(), task_id, package_manager)
                    .await
                    .map(Arc::new)
            })
            .await?;

        provisioned.map_err(PrunecheckError::Provision)
    }
}

impl std::fmt::Debug for EnvProvisioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvProvisioner").finish_non_exhaustive()
    }
}

async fn provision(
    runner: &dyn ProcessRunner,
    id: ToolchainId,
    package_manager: PackageManager,
) -> std::result::Result<ProvisionedEnvironment, String> {
    let scratch = ScratchDir::new("prunecheck-pmenv-").map_err(|e| format!("{e:#}"))?;
    let root = scratch.path().to_path_buf();

    let corepack_bin = root.join(COREPACK_BIN_DIR);
    std::fs::create_dir_all(&corepack_bin)
        .map_err(|e| format!("creating {}: {e}", corepack_bin.display()))?;

    enable_corepack(runner, &root, &corepack_bin).await;

    let path = search_path(&[], &corepack_bin).map_err(|e| format!("{e:#}"))?;
    let mut bin_dirs = vec![corepack_bin];

    if package_manager.corepack_managed() {
        activate_with_corepack(runner, &root, &id, &path).await;
    } else {
        let bun_bin = install_bun(runner, &root, &id, &path).await?;
        bin_dirs.insert(0, bun_bin);
    }

    debug!(toolchain = %id, ?bin_dirs, "toolchain provisioned");

    Ok(ProvisionedEnvironment {
        id,
        bin_dirs,
        _scratch: scratch,
    })
}

async fn enable_corepack(runner: &dyn ProcessRunner, root: &Path, corepack_bin: &Path) {
    let cmd = format!(
        "corepack enable --install-directory \"{}\"",
        corepack_bin.display()
    );
    match runner.run(CommandSpec::new(cmd, root)).await {
        Ok(out) if !out.succeeded() => {
            debug!(exit_code = out.exit_code, "corepack enable exited non-zero")
        }
        Ok(_) => {}
        Err(e) => warn!(error = %e, "corepack enable could not run"),
    }
}

/// Corepack failures are only warnings: the base install may already
/// satisfy the requested version.
async fn activate_with_corepack(runner: &dyn ProcessRunner, root: &Path, id: &ToolchainId, path: &str) {
    info!(toolchain = %id, "corepack prepare (shared)");

    let spec = CommandSpec::new(format!("corepack prepare {id} --activate"), root)
        .env("PATH", path)
        .env("COREPACK_ENABLE_STRICT", "0");

    match runner.run(spec).await {
        Ok(out) if !out.succeeded() => {
            let detail = if out.stderr.is_empty() { &out.stdout } else { &out.stderr };
            warn!(toolchain = %id, exit_code = out.exit_code, "corepack prepare warning: {detail}");
        }
        Ok(_) => {}
        Err(e) => warn!(toolchain = %id, error = %e, "corepack prepare could not run"),
    }
}

/// Bun has no fallback, so any failure here is fatal for the toolchain.
async fn install_bun(
    runner: &dyn ProcessRunner,
    root: &Path,
    id: &ToolchainId,
    path: &str,
) -> std::result::Result<PathBuf, String> {
    let version = id.version();
    let bun_dir = root.join(BUN_INSTALL_DIR);

    info!(toolchain = %id, "installing bun (shared)");

    let spec = CommandSpec::new(
        format!("curl -fsSL https://bun.sh/install | bash -s \"bun-v{version}\""),
        root,
    )
    .env("BUN_INSTALL", bun_dir.display().to_string())
    .env("PATH", path);

    let out = runner
        .run(spec)
        .await
        .map_err(|e| format!("Failed to install bun@{version}: {e}"))?;

    if !out.succeeded() {
        return Err(format!("Failed to install bun@{version}: {}", out.stderr));
    }

    Ok(bun_dir.join("bin"))
}
