//! Support library for the `resource-report` binary.
//!
//! Exposes the CLI pipeline and logging setup so doctests and integration
//! tests can drive them without spawning a process.

pub mod cli;
pub mod logging;
