// src/config/mod.rs

//! Fixture manifest loading and validation for prunecheck.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a manifest from disk (`loader.rs`).
//! - Validate basic invariants like unique fixture names (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path};
pub use model::{FixtureConfig, Manifest, RawManifest, Settings, SettingsSection};
