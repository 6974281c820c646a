//! Lowercase alias binary with the same surface as `aryanblock`.

use clap::Parser;

use aryanblock::cli::{dispatch, AryanCli};

fn main() -> anyhow::Result<()> {
    dispatch(AryanCli::parse())
}
