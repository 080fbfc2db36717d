// tests/provisioning.rs

mod common;
use crate::common::init_tracing;

use std::sync::Arc;
use std::time::Duration;

use prunecheck::errors::PrunecheckError;
use prunecheck::exec::CommandOutput;
use prunecheck::suite::{EnvProvisioner, ToolchainId};
use prunecheck::types::PackageManager;
use prunecheck_test_utils::fake_runner::FakeRunner;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_provision_once() {
    init_tracing();

    let runner = Arc::new(FakeRunner::new().with_delay(Duration::from_millis(20)));
    let provisioner = Arc::new(EnvProvisioner::new(runner.clone()));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let provisioner = Arc::clone(&provisioner);
        handles.push(tokio::spawn(async move {
            provisioner
                .get_environment(ToolchainId::new(PackageManager::Pnpm, "9.15.0"), PackageManager::Pnpm)
                .await
                .unwrap()
        }));
    }

    let mut envs = Vec::new();
    for h in handles {
        envs.push(h.await.unwrap());
    }

    assert_eq!(runner.count("corepack enable"), 1);
    assert_eq!(runner.count("corepack prepare pnpm@9.15.0 --activate"), 1);

    let first = &envs[0];
    assert_eq!(first.bin_dirs.len(), 1);
    assert!(first.bin_dirs[0].ends_with("corepack-bin"));
    for env in &envs {
        assert!(Arc::ptr_eq(env, first));
    }
}

#[tokio::test]
async fn distinct_versions_provision_separately() {
    let runner = Arc::new(FakeRunner::new());
    let provisioner = EnvProvisioner::new(runner.clone());

    let a = provisioner
        .get_environment(ToolchainId::new(PackageManager::Npm, "10.2.0"), PackageManager::Npm)
        .await
        .unwrap();
    let b = provisioner
        .get_environment(ToolchainId::new(PackageManager::Npm, "10.9.0"), PackageManager::Npm)
        .await
        .unwrap();

    assert_eq!(runner.count("corepack enable"), 2);
    assert_ne!(a.bin_dirs, b.bin_dirs);
    assert_eq!(a.id.as_str(), "npm@10.2.0");
}

#[tokio::test]
async fn corepack_prepare_failure_is_only_a_warning() {
    let runner = Arc::new(FakeRunner::new().respond(
        "corepack prepare",
        CommandOutput::failure(1, "Usage Error: network unavailable"),
    ));
    let provisioner = EnvProvisioner::new(runner.clone());

    let env = provisioner
        .get_environment(ToolchainId::new(PackageManager::YarnBerry, "4.1.0"), PackageManager::YarnBerry)
        .await
        .unwrap();

    assert_eq!(env.id.as_str(), "yarn@4.1.0");
    assert!(env.bin_dirs[0].ends_with("corepack-bin"));
}

#[tokio::test]
async fn bun_is_installed_into_its_own_directory() {
    let runner = Arc::new(FakeRunner::new().respond("bun.sh/install", CommandOutput::success("bun installed")));
    let provisioner = EnvProvisioner::new(runner.clone());

    let env = provisioner
        .get_environment(ToolchainId::new(PackageManager::Bun, "1.1.38"), PackageManager::Bun)
        .await
        .unwrap();

    assert_eq!(runner.count("corepack prepare"), 0);
    assert_eq!(env.bin_dirs.len(), 2);
    assert!(env.bin_dirs[0].ends_with("bun-install/bin"));
    assert!(env.bin_dirs[1].ends_with("corepack-bin"));

    let install = runner
        .calls()
        .into_iter()
        .find(|c| c.command.contains("bun.sh/install"))
        .unwrap();
    assert!(install.command.contains("\"bun-v1.1.38\""));
    let bun_install = install.env_value("BUN_INSTALL").unwrap();
    assert!(bun_install.ends_with("bun-install"));
    assert!(install.env_value("PATH").unwrap().contains("corepack-bin"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn bun_install_failure_is_fatal_for_every_waiter() {
    let runner = Arc::new(
        FakeRunner::new()
            .with_delay(Duration::from_millis(10))
            .respond("bun.sh/install", CommandOutput::failure(6, "curl: (6) Could not resolve host")),
    );
    let provisioner = Arc::new(EnvProvisioner::new(runner.clone()));
    let id = ToolchainId::new(PackageManager::Bun, "1.1.0");

    let (a, b) = tokio::join!(
        provisioner.get_environment(id.clone(), PackageManager::Bun),
        provisioner.get_environment(id.clone(), PackageManager::Bun),
    );
    let late = provisioner.get_environment(id, PackageManager::Bun).await;

    for res in [a, b, late] {
        match res {
            Err(PrunecheckError::Provision(msg)) => {
                assert_eq!(msg, "Failed to install bun@1.1.0: curl: (6) Could not resolve host")
            }
            other => panic!("expected provisioning error, got {other:?}"),
        }
    }
    assert_eq!(runner.count("bun.sh/install"), 1);
}

#[tokio::test]
async fn environment_lives_as_long_as_its_references() {
    let runner = Arc::new(FakeRunner::new());
    let provisioner = EnvProvisioner::new(runner);

    let env = provisioner
        .get_environment(ToolchainId::new(PackageManager::Pnpm, "9.15.0"), PackageManager::Pnpm)
        .await
        .unwrap();
    let corepack_bin = env.bin_dirs[0].clone();
    assert!(corepack_bin.is_dir());

    drop(provisioner);
    assert!(corepack_bin.is_dir(), "still referenced by `env`");

    drop(env);
    assert!(!corepack_bin.exists());
}
