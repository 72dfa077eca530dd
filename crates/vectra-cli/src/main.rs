//! Vectra CLI - Command-line interface for the vectra graph engine.

mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "vectra")]
#[command(author, version, about = "Vectra DSP graph engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build and compile a patch, then print its structure
    Info(commands::info::InfoArgs),

    /// Drive a patch offline and report published signals and statistics
    Run(commands::run::RunArgs),

    /// List the registered processor classes
    Classes(commands::classes::ClassesArgs),
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Info(args) => commands::info::run(args),
        Commands::Run(args) => commands::run::run(args),
        Commands::Classes(args) => commands::classes::run(args),
    }
}
