// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod report;
pub mod suite;
pub mod types;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use globset::Glob;
use tokio::sync::Semaphore;
use tracing::{debug, error, info};

use crate::cli::CliArgs;
use crate::config::{Manifest, load_and_validate};
use crate::exec::RealProcessRunner;
use crate::suite::{FixtureGroupRunner, GroupOptions, SystemUnderTest, TestCase, TestResult};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - manifest loading and case filtering
/// - the shared orchestrator (process runner + both run-wide caches)
/// - one task per fixture group, bounded by `--concurrency`
/// - reporting
///
/// Returns whether every case met its expectation.
pub async fn run(args: CliArgs) -> Result<bool> {
    let manifest_path = PathBuf::from(&args.manifest);
    let manifest = load_and_validate(&manifest_path)
        .with_context(|| format!("loading manifest {}", manifest_path.display()))?;

    let groups = select_groups(&manifest, args.filter.as_deref())?;

    if args.dry_run {
        print_dry_run(&manifest, &groups);
        return Ok(true);
    }

    let binary = args
        .prune_binary
        .as_ref()
        .context("--prune-binary is required")?;
    let binary = std::fs::canonicalize(binary)
        .with_context(|| format!("resolving prune binary {}", binary.display()))?;

    let settings = manifest.settings();
    let sut = SystemUnderTest::new(binary).with_link_name(&settings.sut_name);
    let runner = Arc::new(RealProcessRunner::new(
        settings.command_timeout,
        settings.max_output_bytes,
    ));
    let orchestrator = Arc::new(FixtureGroupRunner::new(
        runner,
        GroupOptions {
            prune_output_dir: settings.prune_output_dir.clone(),
        },
    ));

    let concurrency = args.concurrency.unwrap_or_else(default_concurrency);
    info!(
        fixtures = groups.len(),
        cases = groups.iter().map(Vec::len).sum::<usize>(),
        concurrency,
        "starting run"
    );

    let results = run_groups(orchestrator, groups.clone(), sut, concurrency).await;

    let cases: Vec<TestCase> = groups.into_iter().flatten().collect();
    let results: Vec<TestResult> = results.into_iter().flatten().collect();

    let summary = report::print_summary(&cases, &results);
    if let Some(path) = &args.json {
        report::write_json(path, &results)
            .with_context(|| format!("writing results to {}", path.display()))?;
    }

    Ok(summary.is_ok())
}

/// Run every group on its own task, at most `concurrency` at a time.
///
/// All groups share `orchestrator`, and with it the toolchain and
/// validation caches. Results come back in group order.
pub async fn run_groups(
    orchestrator: Arc<FixtureGroupRunner>,
    groups: Vec<Vec<TestCase>>,
    sut: SystemUnderTest,
    concurrency: usize,
) -> Vec<Vec<TestResult>> {
    let permits = Arc::new(Semaphore::new(concurrency.max(1)));

    let handles: Vec<_> = groups
        .iter()
        .map(|cases| {
            let orchestrator = Arc::clone(&orchestrator);
            let permits = Arc::clone(&permits);
            let sut = sut.clone();
            let cases = cases.clone();
            tokio::spawn(async move {
                let _permit = permits.acquire_owned().await;
                orchestrator.run_group(&cases, &sut).await
            })
        })
        .collect();

    let mut results = Vec::with_capacity(groups.len());
    for (cases, handle) in groups.iter().zip(handles) {
        match handle.await {
            Ok(group_results) => results.push(group_results),
            Err(e) => {
                error!(error = %e, "fixture group task failed");
                results.push(
                    cases
                        .iter()
                        .map(|c| TestResult::failed(&c.label, format!("fixture group task failed: {e}")))
                        .collect(),
                );
            }
        }
    }
    results
}

/// Test cases grouped by fixture, keeping only labels matching `filter`.
fn select_groups(manifest: &Manifest, filter: Option<&str>) -> Result<Vec<Vec<TestCase>>> {
    let groups = manifest.test_groups();
    let Some(pattern) = filter else {
        return Ok(groups);
    };

    let matcher = Glob::new(pattern)
        .with_context(|| format!("invalid --filter glob '{pattern}'"))?
        .compile_matcher();

    Ok(groups
        .into_iter()
        .map(|cases| {
            cases
                .into_iter()
                .filter(|c| matcher.is_match(&c.label))
                .collect::<Vec<_>>()
        })
        .filter(|cases| !cases.is_empty())
        .collect())
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Simple dry-run output: print fixtures and their test cases.
fn print_dry_run(manifest: &Manifest, groups: &[Vec<TestCase>]) {
    let settings = manifest.settings();
    println!("prunecheck dry-run");
    println!("  settings.command_timeout = {:?}", settings.command_timeout);
    println!("  settings.max_output_bytes = {}", settings.max_output_bytes);
    println!("  settings.prune_output_dir = {}", settings.prune_output_dir.display());
    println!("  settings.sut_name = {}", settings.sut_name);
    println!();

    println!("fixtures ({}):", groups.len());
    for cases in groups {
        let Some(first) = cases.first() else {
            continue;
        };
        let fixture = &first.fixture;
        println!("  - {}", fixture.name);
        println!("      path: {}", fixture.path.display());
        println!("      toolchain: {} ({})", fixture.toolchain_id(), fixture.package_manager);
        println!("      frozen install: {}", fixture.frozen_install_command());
        for case in cases {
            let marker = if case.expected_failure { " (expected failure)" } else { "" };
            println!("      case: {}{marker}", case.label);
        }
    }

    debug!("dry-run complete (no execution)");
}
