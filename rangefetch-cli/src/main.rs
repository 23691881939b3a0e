//! Rangefetch CLI - Command-line interface
//!
//! This binary drives the rangefetch library against a local directory
//! store: import files, inspect objects and download byte ranges.

mod commands;
mod error;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use rangefetch::logging::init_logging;
use rangefetch::ConfigFile;

use crate::error::CliError;

#[derive(Debug, Parser)]
#[command(name = "rangefetch", version, about = "Byte-range downloads over chunked object storage")]
struct Cli {
    /// Configuration file (defaults to ~/.rangefetch/config.ini)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Import a local file into the store
    Put(commands::put::PutArgs),
    /// Show metadata of a stored object
    Info(commands::info::InfoArgs),
    /// Download a byte range of a stored object
    Get(commands::get::GetArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config = match &cli.config {
        Some(path) => ConfigFile::load(path)?,
        None => ConfigFile::load_default()?,
    };

    let _logging = init_logging(&config.logging, cli.verbose)
        .map_err(|e| CliError::Config(format!("Failed to initialize logging: {}", e)))?;

    match cli.command {
        Command::Put(args) => commands::put::run(args, &config),
        Command::Info(args) => commands::info::run(args, &config),
        Command::Get(args) => commands::get::run(args, &config),
    }
}
