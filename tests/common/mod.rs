#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use prunecheck::exec::{CommandOutput, CommandSpec};
use prunecheck_test_utils::fake_runner::FakeRunner;

pub use prunecheck_test_utils::{init_tracing, with_timeout};

/// File the fake prune writes into `out/` so the fake install knows which
/// workspace it is installing.
pub const WORKSPACE_MARKER: &str = ".pruned-workspace";

/// Paths the fake prune saw an existing `out/` dir at (should stay empty).
pub type Leaks = Arc<Mutex<Vec<PathBuf>>>;

/// A `FakeRunner` that emulates `turbo prune` and a frozen install.
///
/// - prune of a workspace in `fail_prune` exits 1; otherwise it creates
///   `out/` with a marker naming the workspace.
/// - the install (any command containing `install_pattern` run inside
///   `out/`) exits 1 for workspaces in `fail_install`.
/// - everything else, including fixture validation, succeeds.
pub fn pruning_runner(
    install_pattern: &str,
    fail_prune: &[&str],
    fail_install: &[&str],
) -> (FakeRunner, Leaks) {
    let leaks: Leaks = Arc::new(Mutex::new(Vec::new()));
    let fail_prune: Vec<String> = fail_prune.iter().map(|s| s.to_string()).collect();
    let fail_install: Vec<String> = fail_install.iter().map(|s| s.to_string()).collect();

    let prune_leaks = Arc::clone(&leaks);
    let runner = FakeRunner::new()
        .respond_with(" prune ", move |spec| fake_prune(spec, &fail_prune, &prune_leaks))
        .respond_with(install_pattern, move |spec| fake_install(spec, &fail_install));

    (runner, leaks)
}

fn fake_prune(spec: &CommandSpec, fail: &[String], leaks: &Leaks) -> CommandOutput {
    let workspace = spec.command.rsplit(' ').next().unwrap_or_default().to_string();
    let out = spec.cwd.join("out");
    if out.exists() {
        leaks.lock().unwrap().push(out.clone());
    }

    if fail.contains(&workspace) {
        return CommandOutput::failure(1, format!("x Invalid scope. Package with name {workspace} not found"));
    }

    fs::create_dir_all(&out).unwrap();
    fs::write(out.join(WORKSPACE_MARKER), &workspace).unwrap();
    CommandOutput::success(format!("Generating pruned monorepo for {workspace} in out"))
}

fn fake_install(spec: &CommandSpec, fail: &[String]) -> CommandOutput {
    if !spec.cwd.ends_with("out") {
        // Fixture validation against the unpruned copy.
        return CommandOutput::success("lockfile ok");
    }

    let workspace = fs::read_to_string(spec.cwd.join(WORKSPACE_MARKER)).unwrap_or_default();
    fs::create_dir_all(spec.cwd.join("node_modules")).unwrap();

    if fail.contains(&workspace) {
        return CommandOutput::failure(1, format!("lockfile needs updating for {workspace}"));
    }
    CommandOutput::success(format!("installed {workspace}"))
}
