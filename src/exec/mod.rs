// src/exec/mod.rs

//! Process execution layer.
//!
//! Every external step of a test run (toolchain activation, lockfile checks,
//! git init, prune, frozen install) is a shell command run through a
//! [`ProcessRunner`]. Commands never fail by returning `Err` just because
//! they exited non-zero: callers branch on [`CommandOutput::exit_code`].
//!
//! - [`command`] holds the request/response types.
//! - [`backend`] provides the `ProcessRunner` trait and the concrete
//!   `RealProcessRunner` used in production, which tests replace with a
//!   scripted fake.

pub mod backend;
pub mod command;

pub use backend::{ProcessRunner, RealProcessRunner};
pub use command::{CommandOutput, CommandSpec};
