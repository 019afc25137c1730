#![doc = include_str!("../README.md")]

mod cli;
mod commands;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};

fn main() -> miette::Result<()> {
    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Explain { inputs, solver, run } => {
            commands::explain::run_explain_command(inputs, solver, run, cli.verbose)?;
        }
        Commands::Check {
            inputs,
            explanations,
            solver,
        } => {
            commands::check::run_check_command(inputs, explanations, solver)?;
        }
        Commands::Expand {
            inputs,
            explanations,
            solver,
            run,
        } => {
            commands::explain::run_expand_command(inputs, explanations, solver, run, cli.verbose)?;
        }
    }
    Ok(())
}
