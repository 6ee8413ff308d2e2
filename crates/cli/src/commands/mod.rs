//! Subcommand implementations.

pub mod check;
pub mod graph;
pub mod run;

use std::io::Write;

/// Write one line to stdout.
pub fn emit(line: &str) -> std::io::Result<()> {
    let mut out = std::io::stdout().lock();
    writeln!(out, "{line}")
}
