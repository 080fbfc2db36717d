// tests/properties.rs

mod common;
use crate::common::pruning_runner;

use std::sync::Arc;

use proptest::prelude::*;
use prunecheck::suite::{FixtureGroupRunner, GroupOptions};
use prunecheck::types::PackageManager;
use prunecheck_test_utils::builders::{FakeBinary, FixtureBuilder};

/// Per workspace: (prune fails, install fails).
fn outcomes_strategy(max: usize) -> impl Strategy<Value = Vec<(bool, bool)>> {
    proptest::collection::vec((any::<bool>(), any::<bool>()), 1..=max)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn each_case_reflects_only_its_own_outcome(outcomes in outcomes_strategy(6)) {
        let names: Vec<String> = (0..outcomes.len()).map(|i| format!("ws{i}")).collect();
        let fail_prune: Vec<&str> = names
            .iter()
            .zip(&outcomes)
            .filter(|(_, (p, _))| *p)
            .map(|(n, _)| n.as_str())
            .collect();
        let fail_install: Vec<&str> = names
            .iter()
            .zip(&outcomes)
            .filter(|(_, (_, i))| *i)
            .map(|(n, _)| n.as_str())
            .collect();

        let mut builder = FixtureBuilder::new("prop", PackageManager::Npm, "10.2.0");
        for name in &names {
            builder = builder.workspace(name);
        }
        let fixture = builder.build();
        let bin = FakeBinary::new();
        let (runner, leaks) = pruning_runner("npm ci", &fail_prune, &fail_install);
        let orchestrator = FixtureGroupRunner::new(Arc::new(runner), GroupOptions::default());

        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let results = rt.block_on(orchestrator.run_group(&fixture.cases(), &bin.sut));

        prop_assert_eq!(results.len(), names.len());
        prop_assert!(leaks.lock().unwrap().is_empty());

        for ((result, name), (prune_fails, install_fails)) in results.iter().zip(&names).zip(&outcomes) {
            prop_assert_eq!(&result.label, &format!("prop/{name}"));
            prop_assert_eq!(result.prune_success, !prune_fails);
            prop_assert_eq!(result.install_success, !prune_fails && !install_fails);
            prop_assert_eq!(result.success, result.prune_success && result.install_success);
            prop_assert_eq!(result.error.is_none(), result.success);
            prop_assert_eq!(result.install_output.is_some(), !prune_fails);
        }
    }
}
