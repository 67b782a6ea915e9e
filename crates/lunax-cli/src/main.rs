//! Lunax CLI - run Lua 5.1 scripts on the lunax runtime.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::filter::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(
    name = "lunax",
    version,
    about = "Run Lua 5.1 scripts on the lunax runtime",
    long_about = "Lunax runs Lua 5.1 scripts with native bindings.\n\n\
                  Run a script:  lunax run script.lua\n\
                  Eval a chunk:  lunax eval 'return 1 + 1'"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a script file
    Run(commands::run::RunCommand),

    /// Evaluate a chunk and print its results
    Eval(commands::eval::EvalCommand),

    /// Show runtime information
    Info(commands::info::InfoCommand),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.parse()?))
        .with_writer(std::io::stderr)
        .init();

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run(cmd) => cmd.run(config),
        Commands::Eval(cmd) => cmd.run(config),
        Commands::Info(cmd) => cmd.run(&config),
    }
}
