//! AryanBlock CLI entry point: `run <file>`, `repl`, `version`, plus the
//! legacy bare `<file.ab>` positional.

use clap::Parser;

use aryanblock::cli::{dispatch, AryanCli};

fn main() -> anyhow::Result<()> {
    dispatch(AryanCli::parse())
}
