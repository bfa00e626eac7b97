use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use levelmake::{exit_code, Orchestrator, Verb};

/// Build every element declared in the level documents of the current directory.
#[derive(Parser, Debug)]
#[command(name = "levelmake", version)]
struct Cli {
    /// Print every command run and its output
    #[arg(short, long)]
    verbose: bool,

    /// Verbs to run; `all` when none are given
    #[arg(value_enum)]
    verbs: Vec<Verb>,
}

fn run(cli: Cli) -> Result<()> {
    let root = std::env::current_dir().context("reading the working directory")?;
    Orchestrator::new(root, cli.verbose).run(&cli.verbs)?;
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("FATAL: {err:#}");
            std::process::exit(exit_code(&err))
        }
    }
}
