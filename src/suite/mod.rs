// src/suite/mod.rs

//! Fixture validation and grouped test execution.
//!
//! - [`fixture`] defines fixtures, test cases and results.
//! - [`singleflight`] is the memo table both caches are built on.
//! - [`provision`] prepares package-manager toolchains once per version.
//! - [`validator`] checks each fixture's lockfile once per run.
//! - [`workdir`] handles scratch dirs, copying and search paths.
//! - [`group`] runs one fixture's test cases against a shared working copy.

pub mod fixture;
pub mod group;
pub mod provision;
pub mod singleflight;
pub mod validator;
pub mod workdir;

pub use fixture::{Fixture, SystemUnderTest, TestCase, TestResult, ToolchainId};
pub use group::{FixtureGroupRunner, GroupOptions};
pub use provision::{EnvProvisioner, ProvisionedEnvironment};
pub use singleflight::SingleFlight;
pub use validator::{FixtureValidator, ValidationOutcome};
