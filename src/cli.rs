// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `prunecheck`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "prunecheck",
    version,
    about = "Check that pruned workspaces still install from their frozen lockfiles.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the fixture manifest (TOML).
    #[arg(long, value_name = "PATH", default_value = "prunecheck.toml")]
    pub manifest: String,

    /// Pre-built prune binary to test.
    #[arg(long, value_name = "PATH", required_unless_present = "dry_run")]
    pub prune_binary: Option<PathBuf>,

    /// Maximum number of fixtures processed at the same time.
    ///
    /// Defaults to the number of available CPUs.
    #[arg(long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// Only run test cases whose label (`<fixture>/<workspace>`) matches
    /// this glob.
    #[arg(long, value_name = "GLOB")]
    pub filter: Option<String>,

    /// Also write all results as JSON to this file.
    #[arg(long, value_name = "PATH")]
    pub json: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PRUNECHECK_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate the manifest and list test cases, without running.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
