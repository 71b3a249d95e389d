//! bs - build, lint, format and API tooling for TypeScript libraries
//!
//! Wraps the package manager and the tools it runs behind one CLI with a
//! shared config file, consistent logging and machine readable output.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod command;
mod config;
mod error;
mod files;
mod flags;
mod logger;
mod package;
mod process;

use cli::{Commands, GlobalArgs};
use command::Session;

/// Environment variable holding the filter for internal diagnostics
const LOG_ENV: &str = "BS_LOG";

/// Build, lint, format and API tooling for TypeScript libraries
#[derive(Parser)]
#[command(name = "bs")]
#[command(version)]
#[command(about = "Build, lint, format and API tooling for TypeScript libraries", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Internal diagnostics, separate from the user facing output
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    logger::init_colors();

    let session = Session::from_env();
    let code = cli::execute(&session, cli.command, &cli.global);

    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
