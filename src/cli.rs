use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

use crate::commands;
use crate::config;

#[derive(Debug, Parser)]
#[command(
    name = "aryanblock",
    about = "AryanBlock — run .ab scripts or explore the language in a REPL",
    disable_help_subcommand = true
)]
pub struct AryanCli {
    /// Global: pretty caret diagnostics
    #[arg(long = "pretty-errors", action = ArgAction::SetTrue, global = true)]
    pub pretty_errors: bool,

    /// Global: disable semantic analysis
    #[arg(long = "no-sema", action = ArgAction::SetTrue, global = true)]
    pub no_sema: bool,

    /// Global: path to config (TOML); default: ~/.aryanblock/config.toml
    #[arg(long = "config", value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    // Back-compat positional: `aryanblock script.ab` behaves like `run`.
    #[arg(value_name = "input_pos", hide = true)]
    pub input_pos: Option<PathBuf>,

    #[command(subcommand)]
    pub cmd: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a .ab file (the extension is appended when missing)
    Run {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Start the interactive REPL
    Repl,

    /// Show version info
    Version,
}

pub const VERSION: &str = "1.0.0";

pub fn dispatch(args: AryanCli) -> anyhow::Result<()> {
    let cfg = config::load(&config::resolve_config_path(&args.config));
    let pretty = args.pretty_errors || cfg.pretty_errors;
    let no_sema = args.no_sema || cfg.no_sema;

    match args.cmd {
        Some(Command::Run { file }) => {
            let code = commands::run::run_file(&file, pretty, no_sema);
            if code != 0 {
                std::process::exit(code);
            }
            Ok(())
        }
        Some(Command::Repl) => commands::repl::main(),
        Some(Command::Version) => {
            println!("AryanBlock v{}", VERSION);
            Ok(())
        }
        None => match args.input_pos {
            // Legacy: a bare .ab path runs directly.
            Some(path) => {
                if path.to_string_lossy().ends_with(".ab") {
                    let code = commands::run::run_file(&path, pretty, no_sema);
                    if code != 0 {
                        std::process::exit(code);
                    }
                } else {
                    println!("Unknown command: {}", path.display());
                }
                Ok(())
            }
            None => {
                print_usage();
                Ok(())
            }
        },
    }
}

fn print_usage() {
    println!("AryanBlock v{}", VERSION);
    println!("Usage: aryanblock <command>");
    println!("Commands:");
    println!("  repl           Start interactive REPL");
    println!("  run <file>     Run a .ab file");
    println!("  version        Show version info");
    println!("  <file.ab>      Run a .ab file");
}
